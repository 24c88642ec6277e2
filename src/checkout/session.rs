//! Checkout session: all state one checkout flow carries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::checkout::rates::{cheapest, ShippingRate};
use crate::checkout::state::{transition, CheckoutState, ConfirmationFlags, DeliveryMode, TransitionError};
use crate::domain::aggregates::{Cart, CustomerDetails, DraftOrder};
use crate::domain::events::CheckoutEvent;
use crate::domain::value_objects::PartnerId;

/// Reservable window for in-person collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupSlot {
    pub id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl PickupSlot {
    pub fn is_well_formed(&self) -> bool { self.ends_at > self.starts_at }
}

#[derive(Clone, Debug)]
pub struct CheckoutSession {
    id: Uuid,
    state: CheckoutState,
    mode: DeliveryMode,
    cart: Cart,
    customer: CustomerDetails,
    customer_id: Option<PartnerId>,
    draft: Option<DraftOrder>,
    rates: Vec<ShippingRate>,
    selected_rate: Option<usize>,
    pickup_slot: Option<PickupSlot>,
    checkout_url: Option<String>,
}

impl Default for CheckoutSession {
    fn default() -> Self { Self::new() }
}

impl CheckoutSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(), state: CheckoutState::Empty, mode: DeliveryMode::default(),
            cart: Cart::new(), customer: CustomerDetails::default(), customer_id: None, draft: None,
            rates: vec![], selected_rate: None, pickup_slot: None, checkout_url: None,
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn state(&self) -> CheckoutState { self.state }
    pub fn mode(&self) -> DeliveryMode { self.mode }
    pub fn flags(&self) -> ConfirmationFlags { ConfirmationFlags::derive(self.state, self.mode) }
    pub fn cart(&self) -> &Cart { &self.cart }
    pub fn customer(&self) -> &CustomerDetails { &self.customer }
    pub fn customer_id(&self) -> Option<PartnerId> { self.customer_id }
    pub fn draft(&self) -> Option<&DraftOrder> { self.draft.as_ref() }
    pub fn rates(&self) -> &[ShippingRate] { &self.rates }
    pub fn selected_rate_index(&self) -> Option<usize> { self.selected_rate }
    pub fn selected_rate(&self) -> Option<&ShippingRate> { self.selected_rate.and_then(|i| self.rates.get(i)) }
    pub fn pickup_slot(&self) -> Option<&PickupSlot> { self.pickup_slot.as_ref() }
    pub fn checkout_url(&self) -> Option<&str> { self.checkout_url.as_deref() }

    /// Checks that `event` is legal now without changing anything.
    pub fn check(&self, event: CheckoutEvent) -> Result<CheckoutState, TransitionError> {
        transition(self.state, self.mode, event)
    }

    /// Applies `event` and drops whatever the new state no longer vouches for.
    pub fn apply(&mut self, event: CheckoutEvent) -> Result<CheckoutState, TransitionError> {
        let previous = self.state;
        let next = transition(previous, self.mode, event)?;
        self.state = next;

        if matches!(event, CheckoutEvent::CartChanged { .. } | CheckoutEvent::Cancelled { .. }) {
            self.id = Uuid::new_v4();
            self.pickup_slot = None;
        }
        if next < CheckoutState::AddressConfirmed {
            self.customer_id = None;
            self.draft = None;
            self.rates.clear();
            self.selected_rate = None;
        }
        if next < CheckoutState::PaymentSubmitted {
            self.checkout_url = None;
        }
        debug!(session = %self.id, %event, from = ?previous, to = ?next, "checkout transition");
        Ok(next)
    }

    pub(crate) fn cart_mut(&mut self) -> &mut Cart { &mut self.cart }
    pub(crate) fn customer_mut(&mut self) -> &mut CustomerDetails { &mut self.customer }
    pub(crate) fn set_mode(&mut self, mode: DeliveryMode) {
        self.mode = mode;
        if mode != DeliveryMode::Pickup { self.pickup_slot = None; }
    }

    pub(crate) fn record_registration(&mut self, customer_id: PartnerId, draft: DraftOrder) {
        self.customer_id = Some(customer_id);
        self.draft = Some(draft);
    }

    pub(crate) fn draft_mut(&mut self) -> Option<&mut DraftOrder> { self.draft.as_mut() }

    /// Stores fresh candidates and selects the default (cheapest) one.
    pub(crate) fn load_rates(&mut self, rates: Vec<ShippingRate>) {
        self.selected_rate = cheapest(&rates);
        self.rates = rates;
    }

    pub(crate) fn select_rate(&mut self, index: usize) -> bool {
        if index >= self.rates.len() { return false; }
        self.selected_rate = Some(index);
        true
    }

    pub(crate) fn reserve_pickup_slot(&mut self, slot: PickupSlot) { self.pickup_slot = Some(slot); }
    pub(crate) fn release_pickup_slot(&mut self) -> Option<PickupSlot> { self.pickup_slot.take() }
    pub(crate) fn set_checkout_url(&mut self, url: String) { self.checkout_url = Some(url); }
}
