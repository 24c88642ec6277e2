//! Aggregates module
pub mod cart;
pub mod customer;
pub mod inbound;
pub mod order;

pub use cart::{Cart, CartError, CartLine};
pub use customer::CustomerDetails;
pub use inbound::{InboundCart, InboundLine};
pub use order::{DraftOrder, OrderError, OrderStatus};
