//! Checkout events
//!
//! Inputs to the checkout transition table. Payloads (rates, the chosen
//! carrier, the address form) live on the session; events only carry what
//! the table needs to pick the next state.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckoutEvent {
    CartChanged { empty: bool },
    ProceedToCheckout,
    AddressEdited,
    DeliveryModeChanged,
    /// Customer, draft order and lines were all accepted by the backend.
    AddressAccepted,
    RatesLoaded,
    CarrierSelected,
    CarrierConfirmed { has_selection: bool },
    /// The payment session was created and a redirect URL issued.
    PaymentAccepted,
    Cancelled { cart_empty: bool },
}

impl CheckoutEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CartChanged { .. } => "cart_changed",
            Self::ProceedToCheckout => "proceed_to_checkout",
            Self::AddressEdited => "address_edited",
            Self::DeliveryModeChanged => "delivery_mode_changed",
            Self::AddressAccepted => "address_accepted",
            Self::RatesLoaded => "rates_loaded",
            Self::CarrierSelected => "carrier_selected",
            Self::CarrierConfirmed { .. } => "carrier_confirmed",
            Self::PaymentAccepted => "payment_accepted",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

impl fmt::Display for CheckoutEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}
