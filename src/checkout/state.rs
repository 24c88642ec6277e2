//! Checkout states and the transition table.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::events::CheckoutEvent;

/// Ordered: every state implies the confirmations of the states before it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CheckoutState {
    #[default]
    Empty,
    CartReady,
    AddressPending,
    AddressConfirmed,
    ShippingPending,
    ShippingConfirmed,
    PaymentReady,
    PaymentSubmitted,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    #[default]
    Ship,
    Pickup,
    Digital,
}

impl DeliveryMode {
    pub fn requires_shipping(self) -> bool { matches!(self, Self::Ship) }
    /// Pick-and-pack applies to anything physical.
    pub fn requires_packing(self) -> bool { !matches!(self, Self::Digital) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConfirmationFlags {
    pub cart_confirmed: bool,
    pub address_confirmed: bool,
    pub carrier_confirmed: bool,
    pub payment_confirmed: bool,
}

impl ConfirmationFlags {
    pub fn derive(state: CheckoutState, mode: DeliveryMode) -> Self {
        use CheckoutState::*;
        Self {
            cart_confirmed: state >= AddressPending,
            address_confirmed: state >= AddressConfirmed,
            carrier_confirmed: mode.requires_shipping() && state >= ShippingConfirmed,
            payment_confirmed: state == PaymentSubmitted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cart is empty!")]
    EmptyCart,
    #[error("Select a shipping rate first")]
    NoCarrierSelected,
    #[error("Payment was already issued for this checkout")]
    SessionClosed,
    #[error("Cannot apply {event} while {state:?}")]
    Invalid { state: CheckoutState, event: &'static str },
}

/// Pure transition function: `(state, mode, event) -> next state`, settled.
pub fn transition(state: CheckoutState, mode: DeliveryMode, event: CheckoutEvent) -> Result<CheckoutState, TransitionError> {
    use CheckoutEvent::*;
    use CheckoutState::*;

    let shipping = mode.requires_shipping();
    let next = match (state, event) {
        (_, CartChanged { empty: true }) | (_, Cancelled { cart_empty: true }) => Empty,
        (_, CartChanged { empty: false }) | (_, Cancelled { cart_empty: false }) => CartReady,
        (PaymentSubmitted, _) => return Err(TransitionError::SessionClosed),

        (Empty, ProceedToCheckout) => return Err(TransitionError::EmptyCart),
        (CartReady, ProceedToCheckout) => AddressPending,

        (s, AddressEdited) | (s, DeliveryModeChanged) => s.min(AddressPending),
        (AddressPending, AddressAccepted) => AddressConfirmed,

        (AddressConfirmed | ShippingPending | PaymentReady, RatesLoaded) if shipping => ShippingPending,
        (ShippingPending | PaymentReady, CarrierSelected) if shipping => ShippingPending,
        (ShippingPending, CarrierConfirmed { has_selection: true }) => ShippingConfirmed,
        (ShippingPending, CarrierConfirmed { has_selection: false }) => return Err(TransitionError::NoCarrierSelected),

        (PaymentReady, PaymentAccepted) => PaymentSubmitted,

        (s, e) => return Err(TransitionError::Invalid { state: s, event: e.name() }),
    };
    Ok(settle(next, mode))
}

/// Moves to `PaymentReady` once every confirmation the mode needs is held.
fn settle(state: CheckoutState, mode: DeliveryMode) -> CheckoutState {
    match state {
        CheckoutState::AddressConfirmed if !mode.requires_shipping() => CheckoutState::PaymentReady,
        CheckoutState::ShippingConfirmed => CheckoutState::PaymentReady,
        s => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CheckoutEvent::*;
    use CheckoutState::*;

    const ALL_STATES: [CheckoutState; 8] =
        [Empty, CartReady, AddressPending, AddressConfirmed, ShippingPending, ShippingConfirmed, PaymentReady, PaymentSubmitted];

    #[test]
    fn test_ship_happy_path() {
        let mode = DeliveryMode::Ship;
        let mut s = transition(Empty, mode, CartChanged { empty: false }).unwrap();
        for event in [ProceedToCheckout, AddressAccepted, RatesLoaded, CarrierConfirmed { has_selection: true }, PaymentAccepted] {
            s = transition(s, mode, event).unwrap();
        }
        assert_eq!(s, PaymentSubmitted);
    }

    #[test]
    fn test_pickup_skips_shipping() {
        let s = transition(AddressPending, DeliveryMode::Pickup, AddressAccepted).unwrap();
        assert_eq!(s, PaymentReady);
        assert!(transition(s, DeliveryMode::Pickup, RatesLoaded).is_err());
    }

    #[test]
    fn test_ship_waits_for_rates_after_address() {
        assert_eq!(transition(AddressPending, DeliveryMode::Ship, AddressAccepted).unwrap(), AddressConfirmed);
    }

    #[test]
    fn test_empty_cart_cannot_proceed() {
        assert_eq!(transition(Empty, DeliveryMode::Ship, ProceedToCheckout), Err(TransitionError::EmptyCart));
    }

    #[test]
    fn test_cart_change_resets_from_every_state() {
        for state in ALL_STATES {
            for mode in [DeliveryMode::Ship, DeliveryMode::Pickup, DeliveryMode::Digital] {
                let next = transition(state, mode, CartChanged { empty: false }).unwrap();
                assert_eq!(next, CartReady);
                let flags = ConfirmationFlags::derive(next, mode);
                assert_eq!(flags, ConfirmationFlags::default());
            }
        }
    }

    #[test]
    fn test_address_edit_clears_downstream() {
        for state in [AddressConfirmed, ShippingPending, PaymentReady] {
            let next = transition(state, DeliveryMode::Ship, AddressEdited).unwrap();
            assert_eq!(next, AddressPending);
            let flags = ConfirmationFlags::derive(next, DeliveryMode::Ship);
            assert!(flags.cart_confirmed);
            assert!(!flags.address_confirmed && !flags.carrier_confirmed && !flags.payment_confirmed);
        }
        assert_eq!(transition(CartReady, DeliveryMode::Ship, AddressEdited).unwrap(), CartReady);
    }

    #[test]
    fn test_mode_change_past_address_clears_downstream() {
        for state in [AddressConfirmed, ShippingPending, PaymentReady] {
            for mode in [DeliveryMode::Ship, DeliveryMode::Pickup, DeliveryMode::Digital] {
                let next = transition(state, mode, DeliveryModeChanged).unwrap();
                assert_eq!(next, AddressPending, "{state:?} {mode:?}");
                let flags = ConfirmationFlags::derive(next, mode);
                assert!(flags.cart_confirmed);
                assert!(!flags.address_confirmed && !flags.carrier_confirmed && !flags.payment_confirmed);
            }
        }
        for state in [Empty, CartReady, AddressPending] {
            assert_eq!(transition(state, DeliveryMode::Pickup, DeliveryModeChanged).unwrap(), state);
        }
        assert_eq!(transition(PaymentSubmitted, DeliveryMode::Ship, DeliveryModeChanged), Err(TransitionError::SessionClosed));
    }

    #[test]
    fn test_carrier_change_resets_confirmation() {
        let next = transition(PaymentReady, DeliveryMode::Ship, CarrierSelected).unwrap();
        assert_eq!(next, ShippingPending);
        assert!(!ConfirmationFlags::derive(next, DeliveryMode::Ship).carrier_confirmed);
    }

    #[test]
    fn test_carrier_confirmation_needs_selection() {
        assert_eq!(
            transition(ShippingPending, DeliveryMode::Ship, CarrierConfirmed { has_selection: false }),
            Err(TransitionError::NoCarrierSelected)
        );
    }

    #[test]
    fn test_payment_only_from_payment_ready() {
        for state in ALL_STATES.into_iter().filter(|s| *s != PaymentReady) {
            assert!(transition(state, DeliveryMode::Ship, PaymentAccepted).is_err(), "{state:?}");
        }
    }

    #[test]
    fn test_submitted_is_terminal_until_reset() {
        assert_eq!(transition(PaymentSubmitted, DeliveryMode::Ship, AddressEdited), Err(TransitionError::SessionClosed));
        assert_eq!(transition(PaymentSubmitted, DeliveryMode::Ship, Cancelled { cart_empty: true }).unwrap(), Empty);
    }

    #[test]
    fn test_flags_follow_dependency_order() {
        for state in ALL_STATES {
            for mode in [DeliveryMode::Ship, DeliveryMode::Pickup, DeliveryMode::Digital] {
                let f = ConfirmationFlags::derive(state, mode);
                if f.payment_confirmed { assert!(f.address_confirmed); }
                if f.carrier_confirmed { assert!(f.address_confirmed); }
                if f.address_confirmed { assert!(f.cart_confirmed); }
            }
        }
    }
}
