//! Storefront Checkout
//!
//! Client side of the ERP storefront. Pricing, stock, tax, fulfillment and
//! payment all live in the backend; this crate keeps the session state and
//! sequences the HTTP calls.
//!
//! ## Features
//! - Cart management with downstream invalidation
//! - Checkout flow controller (address, carrier, payment)
//! - Shipping rate selection
//! - Inbound purchase order placement
//! - Typed backend client over HTTP

use thiserror::Error;

pub mod backend;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod inbound;

pub use backend::{Backend, BackendError, HttpBackend};
pub use checkout::{CheckoutController, CheckoutSession, CheckoutState, ConfirmationFlags, DeliveryMode};
pub use config::Config;

use crate::checkout::TransitionError;
use crate::domain::aggregates::{CartError, OrderError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Missing required field(s): {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Customer email is required")]
    MissingEmail,

    #[error("No draft order for this session")]
    NoDraftOrder,

    #[error("No shipping rates available")]
    NoRates,

    #[error("Unknown shipping rate #{0}")]
    UnknownRate(usize),

    #[error("Pickup slots require pickup delivery")]
    PickupNotSelected,

    #[error("Pickup slot must end after it starts")]
    InvalidPickupSlot,

    #[error("Digital delivery requires a cart of digital items only")]
    DigitalModeUnavailable,

    #[error("Failed to start payment")]
    MissingCheckoutUrl,

    #[error("Order {0} has no lines to return")]
    NothingToReturn(String),

    #[error("{message}")]
    Backend {
        message: String,
        #[source]
        source: BackendError,
    },
}

impl CheckoutError {
    /// Wraps a backend failure with the text shown to the user: the backend's
    /// own detail when it sent one, otherwise `fallback`.
    pub fn backend(source: BackendError, fallback: &str) -> Self {
        Self::Backend { message: source.user_message(fallback), source }
    }

    /// Local validation failures never reach the network.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingFields(_) | Self::MissingEmail | Self::InvalidPickupSlot | Self::DigitalModeUnavailable
        )
    }
}

pub type Result<T> = std::result::Result<T, CheckoutError>;
