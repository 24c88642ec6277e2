//! Checkout flow: states, session, rates, notices and the controller that
//! sequences backend calls.

pub mod controller;
pub mod notice;
pub mod rates;
pub mod session;
pub mod state;

pub use controller::CheckoutController;
pub use notice::{Notice, NoticeBoard, NoticeKind};
pub use rates::{cheapest, ShippingRate};
pub use session::{CheckoutSession, PickupSlot};
pub use state::{transition, CheckoutState, ConfirmationFlags, DeliveryMode, TransitionError};
