//! Checkout Flow Controller
//!
//! Owns one [`CheckoutSession`], runs each step against the [`Backend`] and
//! feeds the outcome back into the transition table. Every failure is turned
//! into a transient error notice; the session stays at its last confirmed state.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::types::{
    CatalogItem, CheckoutSessionRequest, Decision, DecisionKind, OrderLineIn, PartnerCreate, QuotationCreate,
    RateAddress, RatesRequest, ReturnLineIn, ReturnOrderCreate, ReturnOrderCreated, SaleOrderView,
};
use crate::backend::Backend;
use crate::checkout::notice::{Notice, NoticeBoard, NoticeKind};
use crate::checkout::rates::ShippingRate;
use crate::checkout::session::{CheckoutSession, PickupSlot};
use crate::checkout::state::{CheckoutState, ConfirmationFlags, DeliveryMode, TransitionError};
use crate::config::Config;
use crate::domain::aggregates::{CartError, CartLine, CustomerDetails, DraftOrder};
use crate::domain::events::CheckoutEvent;
use crate::domain::value_objects::ItemId;
use crate::{CheckoutError, Result};

pub struct CheckoutController<B> {
    backend: B,
    session: CheckoutSession,
    notices: NoticeBoard,
    ship_from: RateAddress,
}

impl<B: Backend> CheckoutController<B> {
    pub fn new(backend: B, config: &Config) -> Self {
        Self::with_parts(backend, config.notice_ttl, config.ship_from.clone())
    }

    pub fn with_parts(backend: B, notice_ttl: Duration, ship_from: RateAddress) -> Self {
        Self { backend, session: CheckoutSession::new(), notices: NoticeBoard::new(notice_ttl), ship_from }
    }

    pub fn session(&self) -> &CheckoutSession { &self.session }
    pub fn state(&self) -> CheckoutState { self.session.state() }
    pub fn flags(&self) -> ConfirmationFlags { self.session.flags() }
    pub fn backend(&self) -> &B { &self.backend }

    /// The current notice, if it has not expired yet.
    pub fn notice(&self) -> Option<&Notice> { self.notices.active() }
    pub fn dismiss_notice(&mut self) { self.notices.dismiss(); }

    /// True exactly when every confirmation the delivery mode needs is held.
    pub fn is_payment_enabled(&self) -> bool { self.session.state() == CheckoutState::PaymentReady }

    // =========================================================================
    // Cart
    // =========================================================================

    pub fn add_to_cart(&mut self, line: CartLine) -> Result<CheckoutState> {
        let result = self.session.cart_mut().add(line).map_err(CheckoutError::from).and_then(|_| self.cart_changed());
        self.report("add_to_cart", result)
    }

    pub fn add_catalog_item(&mut self, item: &CatalogItem, quantity: u32) -> Result<CheckoutState> {
        self.add_to_cart(item.to_cart_line(quantity))
    }

    /// Adds `quantity` more units of an item already in the cart.
    pub fn add_quantity(&mut self, item_id: ItemId, quantity: u32) -> Result<CheckoutState> {
        let result = self.try_add_quantity(item_id, quantity);
        self.report("add_quantity", result)
    }

    fn try_add_quantity(&mut self, item_id: ItemId, quantity: u32) -> Result<CheckoutState> {
        let current = self.session.cart().get(item_id).ok_or(CartError::ItemNotFound(item_id))?.quantity;
        self.session.cart_mut().update_quantity(item_id, current.add(quantity).value())?;
        self.cart_changed()
    }

    /// Sets the quantity of a line; anything below 1 removes it.
    pub fn update_quantity(&mut self, item_id: ItemId, quantity: u32) -> Result<CheckoutState> {
        let result =
            self.session.cart_mut().update_quantity(item_id, quantity).map_err(CheckoutError::from).and_then(|_| self.cart_changed());
        self.report("update_quantity", result)
    }

    pub fn remove_from_cart(&mut self, item_id: ItemId) -> Result<CheckoutState> {
        let result = self.session.cart_mut().remove(item_id).map_err(CheckoutError::from).and_then(|_| self.cart_changed());
        self.report("remove_from_cart", result)
    }

    pub fn clear_cart(&mut self) -> Result<CheckoutState> {
        self.session.cart_mut().clear();
        let result = self.cart_changed();
        self.report("clear_cart", result)
    }

    fn cart_changed(&mut self) -> Result<CheckoutState> {
        let empty = self.session.cart().is_empty();
        Ok(self.session.apply(CheckoutEvent::CartChanged { empty })?)
    }

    // =========================================================================
    // Address
    // =========================================================================

    pub fn proceed_to_checkout(&mut self) -> Result<CheckoutState> {
        let result = self.try_proceed();
        self.report("proceed_to_checkout", result)
    }

    fn try_proceed(&mut self) -> Result<CheckoutState> {
        self.session.check(CheckoutEvent::ProceedToCheckout)?;
        if self.session.mode() == DeliveryMode::Digital && !self.session.cart().is_digital_only() {
            return Err(CheckoutError::DigitalModeUnavailable);
        }
        Ok(self.session.apply(CheckoutEvent::ProceedToCheckout)?)
    }

    pub fn set_delivery_mode(&mut self, mode: DeliveryMode) -> Result<CheckoutState> {
        let result = self.try_set_delivery_mode(mode);
        self.report("set_delivery_mode", result)
    }

    fn try_set_delivery_mode(&mut self, mode: DeliveryMode) -> Result<CheckoutState> {
        if mode == self.session.mode() {
            return Ok(self.session.state());
        }
        self.session.check(CheckoutEvent::DeliveryModeChanged)?;
        if mode == DeliveryMode::Digital && !self.session.cart().is_digital_only() {
            return Err(CheckoutError::DigitalModeUnavailable);
        }
        self.session.set_mode(mode);
        Ok(self.session.apply(CheckoutEvent::DeliveryModeChanged)?)
    }

    /// Edits the address form in place. Past `AddressPending` this drops the
    /// address, carrier and payment confirmations.
    pub fn edit_address(&mut self, edit: impl FnOnce(&mut CustomerDetails)) -> Result<CheckoutState> {
        let result = match self.session.check(CheckoutEvent::AddressEdited) {
            Ok(_) => {
                edit(self.session.customer_mut());
                self.session.apply(CheckoutEvent::AddressEdited).map_err(CheckoutError::from)
            }
            Err(err) => Err(err.into()),
        };
        self.report("edit_address", result)
    }

    /// Validates the form, then registers the customer, the draft order and its
    /// lines. The address is confirmed only when all three calls succeed.
    pub async fn submit_address(&mut self) -> Result<CheckoutState> {
        let result = self.try_submit_address().await;
        self.report("submit_address", result)
    }

    async fn try_submit_address(&mut self) -> Result<CheckoutState> {
        self.session.check(CheckoutEvent::AddressAccepted)?;
        let missing = self.session.customer().invalid_fields();
        if !missing.is_empty() {
            return Err(CheckoutError::MissingFields(missing));
        }

        let partner = PartnerCreate::from(self.session.customer());
        let customer = self
            .backend
            .create_partner(&partner)
            .await
            .map_err(|e| CheckoutError::backend(e, "Failed to create customer"))?;
        debug!(session = %self.session.id(), partner = %customer.id, "customer registered");

        let quotation = QuotationCreate::for_mode(customer.id, self.session.mode());
        let created = self
            .backend
            .create_quotation(&quotation)
            .await
            .map_err(|e| CheckoutError::backend(e, "Failed to create quotation"))?;

        let lines: Vec<OrderLineIn> = self.session.cart().lines().map(OrderLineIn::from).collect();
        self.backend
            .add_quotation_lines(created.quotation_id, &lines)
            .await
            .map_err(|e| CheckoutError::backend(e, "Failed to add quotation lines"))?;

        let subtotal = self.session.cart().subtotal().ok().flatten().map(|m| m.to_string()).unwrap_or_default();
        info!(session = %self.session.id(), quotation = %created.code, lines = lines.len(), %subtotal, "draft order created");
        let draft = DraftOrder::create(created.quotation_id, created.code, customer.id, lines.len());
        self.session.record_registration(customer.id, draft);
        Ok(self.session.apply(CheckoutEvent::AddressAccepted)?)
    }

    // =========================================================================
    // Carrier
    // =========================================================================

    /// Loads rate candidates for the confirmed address and selects the cheapest.
    pub async fn fetch_shipping_rates(&mut self) -> Result<ShippingRate> {
        let result = self.try_fetch_shipping_rates().await;
        self.report("fetch_shipping_rates", result)
    }

    async fn try_fetch_shipping_rates(&mut self) -> Result<ShippingRate> {
        self.session.check(CheckoutEvent::RatesLoaded)?;
        let request = RatesRequest {
            from_address: self.ship_from.clone(),
            to_address: RateAddress::from(self.session.customer()),
        };
        let rates = self
            .backend
            .shipping_rates(&request)
            .await
            .map_err(|e| CheckoutError::backend(e, "Error fetching rates"))?;
        if rates.is_empty() {
            return Err(CheckoutError::NoRates);
        }

        self.session.load_rates(rates);
        self.session.apply(CheckoutEvent::RatesLoaded)?;
        let selected = self.session.selected_rate().cloned().ok_or(CheckoutError::NoRates)?;
        info!(
            session = %self.session.id(),
            candidates = self.session.rates().len(),
            provider = %selected.provider_id,
            amount = %selected.amount,
            "shipping rates loaded"
        );
        Ok(selected)
    }

    /// Chooses another candidate. Carrier confirmation is dropped.
    pub fn select_rate(&mut self, index: usize) -> Result<CheckoutState> {
        let result = self.try_select_rate(index);
        self.report("select_rate", result)
    }

    fn try_select_rate(&mut self, index: usize) -> Result<CheckoutState> {
        self.session.check(CheckoutEvent::CarrierSelected)?;
        if !self.session.select_rate(index) {
            return Err(CheckoutError::UnknownRate(index));
        }
        Ok(self.session.apply(CheckoutEvent::CarrierSelected)?)
    }

    pub fn confirm_carrier(&mut self) -> Result<CheckoutState> {
        let has_selection = self.session.selected_rate().is_some();
        let result = self.session.apply(CheckoutEvent::CarrierConfirmed { has_selection }).map_err(CheckoutError::from);
        self.report("confirm_carrier", result)
    }

    // =========================================================================
    // Pickup
    // =========================================================================

    pub fn reserve_pickup_slot(&mut self, slot: PickupSlot) -> Result<()> {
        let result = self.try_reserve_pickup_slot(slot);
        self.report("reserve_pickup_slot", result)
    }

    fn try_reserve_pickup_slot(&mut self, slot: PickupSlot) -> Result<()> {
        if self.session.state() == CheckoutState::PaymentSubmitted {
            return Err(TransitionError::SessionClosed.into());
        }
        if self.session.mode() != DeliveryMode::Pickup {
            return Err(CheckoutError::PickupNotSelected);
        }
        if !slot.is_well_formed() {
            return Err(CheckoutError::InvalidPickupSlot);
        }
        debug!(session = %self.session.id(), slot = %slot.id, "pickup slot reserved");
        self.session.reserve_pickup_slot(slot);
        Ok(())
    }

    pub fn release_pickup_slot(&mut self) -> Result<Option<PickupSlot>> {
        let result = if self.session.mode() == DeliveryMode::Pickup {
            Ok(self.session.release_pickup_slot())
        } else {
            Err(CheckoutError::PickupNotSelected)
        };
        self.report("release_pickup_slot", result)
    }

    // =========================================================================
    // Payment
    // =========================================================================

    /// Confirms the draft order and opens a payment session. Returns the URL
    /// the customer is redirected to.
    pub async fn pay(&mut self) -> Result<String> {
        let result = self.try_pay().await;
        self.report("pay", result)
    }

    async fn try_pay(&mut self) -> Result<String> {
        self.session.check(CheckoutEvent::PaymentAccepted)?;
        if !self.session.customer().has_email() {
            return Err(CheckoutError::MissingEmail);
        }
        let draft = self.session.draft().cloned().ok_or(CheckoutError::NoDraftOrder)?;

        // A retried payment reuses the sale order from the first attempt.
        if draft.sale_order_code().is_none() {
            let confirmed = self
                .backend
                .confirm_quotation(draft.quotation_id())
                .await
                .map_err(|e| CheckoutError::backend(e, "Failed to confirm quotation"))?;
            if let Some(order) = self.session.draft_mut() {
                order.confirm(confirmed.sale_order_code)?;
            }
        }

        let request = CheckoutSessionRequest {
            order_number: draft.code().to_string(),
            email: self.session.customer().email.trim().to_string(),
        };
        let created = self
            .backend
            .create_checkout_session(&request)
            .await
            .map_err(|e| CheckoutError::backend(e, "Failed to start payment"))?;
        let url = created.checkout_url.filter(|u| !u.trim().is_empty()).ok_or(CheckoutError::MissingCheckoutUrl)?;

        self.session.set_checkout_url(url.clone());
        self.session.apply(CheckoutEvent::PaymentAccepted)?;
        info!(session = %self.session.id(), order = %request.order_number, "payment session opened");
        Ok(url)
    }

    /// Discards the draft order, rates and pickup slot. The cart is kept.
    pub fn cancel(&mut self) -> Result<CheckoutState> {
        let cart_empty = self.session.cart().is_empty();
        let result = self.session.apply(CheckoutEvent::Cancelled { cart_empty }).map_err(CheckoutError::from);
        if result.is_ok() {
            info!(session = %self.session.id(), "checkout cancelled");
        }
        self.report("cancel", result)
    }

    // =========================================================================
    // Catalog, orders & decisions
    // =========================================================================

    pub async fn catalog(&mut self) -> Result<Vec<CatalogItem>> {
        let result = self.backend.list_items().await.map_err(|e| CheckoutError::backend(e, "Could not load items"));
        self.report("catalog", result)
    }

    pub async fn order_status(&mut self, code: &str) -> Result<SaleOrderView> {
        let result = self.backend.sale_order_by_code(code.trim()).await.map_err(|e| CheckoutError::backend(e, "Order not found"));
        self.report("order_status", result)
    }

    /// Opens a return for every line of a confirmed sale order.
    pub async fn return_whole_order(&mut self, sale_order_code: &str, reason: &str) -> Result<ReturnOrderCreated> {
        let order = self.order_status(sale_order_code).await?;
        if order.lines.is_empty() {
            return self.report("return_whole_order", Err(CheckoutError::NothingToReturn(order.code)));
        }
        let lines = order.lines.iter().map(|line| ReturnLineIn::whole_line(line, reason)).collect();
        self.request_return(&order.code, lines).await
    }

    /// Opens a return for the given lines of a confirmed sale order.
    pub async fn request_return(&mut self, sale_order_code: &str, lines: Vec<ReturnLineIn>) -> Result<ReturnOrderCreated> {
        let request = ReturnOrderCreate::for_sale_order(sale_order_code, lines);
        let result = self
            .backend
            .create_return_order(&request)
            .await
            .map_err(|e| CheckoutError::backend(e, "Failed to create return order"));
        if let Ok(created) = &result {
            info!(order = %request.origin_code, return_order = %created.return_order_id, "return order created");
            self.notices.post(NoticeKind::Info, "Return order created!");
        }
        self.report("request_return", result)
    }

    /// Asks a decision service about the current draft order.
    pub async fn fulfillment_advice(&mut self, kind: DecisionKind) -> Result<Decision> {
        let result = self.try_fulfillment_advice(kind).await;
        self.report("fulfillment_advice", result)
    }

    async fn try_fulfillment_advice(&mut self, kind: DecisionKind) -> Result<Decision> {
        let draft = self.session.draft().ok_or(CheckoutError::NoDraftOrder)?;
        let mut query = vec![
            ("quotation_id".to_string(), draft.quotation_id().to_string()),
            ("order".to_string(), draft.code().to_string()),
        ];
        if let Some(rate) = self.session.selected_rate() {
            query.push(("carrier".to_string(), rate.provider_id.clone()));
        }
        self.backend
            .decide(kind, &query)
            .await
            .map_err(|e| CheckoutError::backend(e, "Decision service unavailable"))
    }

    fn report<T>(&mut self, operation: &'static str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            warn!(session = %self.session.id(), operation, state = ?self.session.state(), error = %err, "checkout step failed");
            self.notices.post(NoticeKind::Error, err.to_string());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{Call, FakeBackend};
    use crate::backend::types::SaleOrderLineView;
    use crate::backend::BackendError;
    use crate::checkout::rates::tests::rate;
    use crate::domain::aggregates::cart::tests::line;
    use crate::domain::aggregates::customer::tests::complete_form;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn controller(backend: FakeBackend) -> CheckoutController<FakeBackend> {
        CheckoutController::new(backend, &Config::default())
    }

    fn ups_and_usps() -> FakeBackend {
        FakeBackend::new().with_rates(vec![rate("UPS", "12.5"), rate("USPS", "9.0")])
    }

    async fn at_address_pending(backend: FakeBackend) -> CheckoutController<FakeBackend> {
        let mut c = controller(backend);
        c.add_to_cart(line(1, 2, 10)).unwrap();
        c.add_to_cart(line(5, 1, 4)).unwrap();
        c.proceed_to_checkout().unwrap();
        c.edit_address(|form| *form = complete_form()).unwrap();
        c
    }

    async fn at_payment_ready(backend: FakeBackend) -> CheckoutController<FakeBackend> {
        let mut c = at_address_pending(backend).await;
        c.submit_address().await.unwrap();
        c.fetch_shipping_rates().await.unwrap();
        c.confirm_carrier().unwrap();
        c
    }

    #[tokio::test]
    async fn test_empty_cart_cannot_proceed() {
        let backend = FakeBackend::new();
        let mut c = controller(backend.clone());

        let err = c.proceed_to_checkout().unwrap_err();
        assert_eq!(err.to_string(), "Cart is empty!");
        assert_eq!(c.notice().map(|n| n.message.as_str()), Some("Cart is empty!"));
        assert_eq!(c.state(), CheckoutState::Empty);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ship_checkout_end_to_end() {
        let backend = ups_and_usps();
        let mut c = at_address_pending(backend.clone()).await;

        assert_eq!(c.submit_address().await.unwrap(), CheckoutState::AddressConfirmed);
        assert_eq!(backend.call_names(), vec!["create_partner", "create_quotation", "add_quotation_lines"]);
        match &backend.calls()[2] {
            Call::AddQuotationLines(_, lines) => {
                let items: Vec<i64> = lines.iter().map(|l| l.item_id.0).collect();
                assert_eq!(items, vec![1, 5]);
            }
            other => panic!("unexpected call {other:?}"),
        }

        let selected = c.fetch_shipping_rates().await.unwrap();
        assert_eq!(selected.provider_id, "USPS");
        assert_eq!(selected.amount, Decimal::new(90, 1));
        assert!(!c.is_payment_enabled());

        assert_eq!(c.confirm_carrier().unwrap(), CheckoutState::PaymentReady);
        assert!(c.is_payment_enabled());

        let url = c.pay().await.unwrap();
        assert_eq!(url, "https://pay.example.com/c/Q-00000002");
        assert_eq!(c.state(), CheckoutState::PaymentSubmitted);
        assert_eq!(
            c.flags(),
            ConfirmationFlags { cart_confirmed: true, address_confirmed: true, carrier_confirmed: true, payment_confirmed: true }
        );
        assert_eq!(
            backend.calls().last(),
            Some(&Call::CreateCheckoutSession(CheckoutSessionRequest {
                order_number: "Q-00000002".into(),
                email: "ada@example.com".into(),
            }))
        );
    }

    #[tokio::test]
    async fn test_pickup_reaches_payment_without_carrier() {
        let backend = FakeBackend::new();
        let mut c = controller(backend.clone());
        c.add_to_cart(line(1, 1, 10)).unwrap();
        c.set_delivery_mode(DeliveryMode::Pickup).unwrap();
        c.proceed_to_checkout().unwrap();
        c.edit_address(|form| *form = complete_form()).unwrap();

        assert_eq!(c.submit_address().await.unwrap(), CheckoutState::PaymentReady);
        assert!(c.is_payment_enabled());
        assert!(!c.flags().carrier_confirmed);
        match &backend.calls()[1] {
            Call::CreateQuotation(q) => assert!(!q.ship && q.pick_pack),
            other => panic!("unexpected call {other:?}"),
        }

        assert!(c.fetch_shipping_rates().await.is_err());
        assert!(!backend.call_names().contains(&"shipping_rates"));
    }

    #[tokio::test]
    async fn test_missing_fields_block_submission_locally() {
        let backend = FakeBackend::new();
        let mut c = at_address_pending(backend.clone()).await;
        c.edit_address(|form| form.city = "  ".into()).unwrap();

        let err = c.submit_address().await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Missing required field(s): city");
        assert_eq!(c.state(), CheckoutState::AddressPending);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_address_edit_after_payment_ready_clears_confirmations() {
        let mut c = at_payment_ready(ups_and_usps()).await;
        assert!(c.flags().carrier_confirmed);

        assert_eq!(c.edit_address(|form| form.zip = "EC1A 1BB".into()).unwrap(), CheckoutState::AddressPending);
        let flags = c.flags();
        assert!(flags.cart_confirmed);
        assert!(!flags.address_confirmed && !flags.carrier_confirmed && !flags.payment_confirmed);
        assert!(c.session().draft().is_none());
        assert!(c.session().selected_rate().is_none());
        assert!(!c.is_payment_enabled());
    }

    #[tokio::test]
    async fn test_cart_edit_resets_every_flag() {
        let mut c = at_payment_ready(ups_and_usps()).await;
        let before = c.session().id();

        assert_eq!(c.add_quantity(ItemId(1), 1).unwrap(), CheckoutState::CartReady);
        assert_eq!(c.flags(), ConfirmationFlags::default());
        assert_ne!(c.session().id(), before);
        assert_eq!(c.session().cart().get(ItemId(1)).map(|l| l.quantity.value()), Some(3));
    }

    #[tokio::test]
    async fn test_pay_disabled_until_ready() {
        let backend = ups_and_usps();
        let mut c = at_address_pending(backend.clone()).await;
        c.submit_address().await.unwrap();
        c.fetch_shipping_rates().await.unwrap();

        assert!(c.pay().await.is_err());
        assert_eq!(c.state(), CheckoutState::ShippingPending);
        assert!(!backend.call_names().contains(&"confirm_quotation"));
    }

    #[tokio::test]
    async fn test_rejected_lines_keep_address_unconfirmed() {
        let backend = FakeBackend::new().fail_on(
            "add_quotation_lines",
            1,
            BackendError::Rejected { status: 400, detail: "Item 5 is archived".into() },
        );
        let mut c = at_address_pending(backend.clone()).await;

        let err = c.submit_address().await.unwrap_err();
        assert_eq!(err.to_string(), "Item 5 is archived");
        assert_eq!(c.notice().map(|n| n.kind), Some(NoticeKind::Error));
        assert_eq!(c.state(), CheckoutState::AddressPending);
        assert!(!c.flags().address_confirmed);
        assert!(c.session().draft().is_none());
        // Records created before the failure stay on the backend.
        assert_eq!(backend.call_names(), vec!["create_partner", "create_quotation", "add_quotation_lines"]);
    }

    #[tokio::test]
    async fn test_payment_retry_confirms_once() {
        let backend = ups_and_usps().fail_on("create_checkout_session", 1, BackendError::Transport("connection reset".into()));
        let mut c = at_payment_ready(backend.clone()).await;

        let err = c.pay().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to start payment");
        assert_eq!(c.state(), CheckoutState::PaymentReady);
        assert!(c.session().draft().and_then(|d| d.sale_order_code()).is_some());

        assert!(c.pay().await.is_ok());
        let confirms = backend.call_names().into_iter().filter(|n| *n == "confirm_quotation").count();
        assert_eq!(confirms, 1);
    }

    #[tokio::test]
    async fn test_no_rates_is_an_error() {
        let backend = FakeBackend::new();
        let mut c = at_address_pending(backend).await;
        c.submit_address().await.unwrap();

        assert!(matches!(c.fetch_shipping_rates().await, Err(CheckoutError::NoRates)));
        assert_eq!(c.state(), CheckoutState::AddressConfirmed);
        assert_eq!(c.notice().map(|n| n.message.as_str()), Some("No shipping rates available"));
    }

    #[tokio::test]
    async fn test_rate_failure_uses_generic_message() {
        let backend = FakeBackend::new().fail_on("shipping_rates", 1, BackendError::Transport("timed out".into()));
        let mut c = at_address_pending(backend).await;
        c.submit_address().await.unwrap();

        let err = c.fetch_shipping_rates().await.unwrap_err();
        assert_eq!(err.to_string(), "Error fetching rates");
        assert_eq!(c.state(), CheckoutState::AddressConfirmed);
    }

    #[tokio::test]
    async fn test_changing_carrier_drops_confirmation() {
        let mut c = at_payment_ready(ups_and_usps()).await;

        assert!(matches!(c.select_rate(7), Err(CheckoutError::UnknownRate(7))));
        assert_eq!(c.state(), CheckoutState::PaymentReady);

        assert_eq!(c.select_rate(0).unwrap(), CheckoutState::ShippingPending);
        assert!(!c.flags().carrier_confirmed);
        assert_eq!(c.session().selected_rate().map(|r| r.provider_id.as_str()), Some("UPS"));
        assert_eq!(c.confirm_carrier().unwrap(), CheckoutState::PaymentReady);
    }

    #[tokio::test]
    async fn test_pickup_slot_requires_pickup_mode() {
        let mut c = controller(FakeBackend::new());
        c.add_to_cart(line(1, 1, 10)).unwrap();
        let now = Utc::now();
        let slot = PickupSlot { id: "sat-10".into(), starts_at: now, ends_at: now + chrono::Duration::hours(1) };

        assert!(matches!(c.reserve_pickup_slot(slot.clone()), Err(CheckoutError::PickupNotSelected)));

        c.set_delivery_mode(DeliveryMode::Pickup).unwrap();
        let backwards = PickupSlot { ends_at: now, starts_at: now + chrono::Duration::hours(1), ..slot.clone() };
        assert!(matches!(c.reserve_pickup_slot(backwards), Err(CheckoutError::InvalidPickupSlot)));

        c.reserve_pickup_slot(slot.clone()).unwrap();
        assert_eq!(c.release_pickup_slot().unwrap(), Some(slot));
    }

    #[tokio::test]
    async fn test_digital_mode_needs_digital_cart() {
        let mut c = controller(FakeBackend::new());
        c.add_to_cart(line(1, 1, 10)).unwrap();
        assert!(matches!(c.set_delivery_mode(DeliveryMode::Digital), Err(CheckoutError::DigitalModeUnavailable)));
        assert_eq!(c.session().mode(), DeliveryMode::Ship);

        let mut c = controller(FakeBackend::new());
        c.add_to_cart(CartLine { digital: true, ..line(2, 1, 10) }).unwrap();
        c.set_delivery_mode(DeliveryMode::Digital).unwrap();
        c.proceed_to_checkout().unwrap();
        c.edit_address(|form| *form = complete_form()).unwrap();
        assert_eq!(c.submit_address().await.unwrap(), CheckoutState::PaymentReady);
    }

    #[tokio::test]
    async fn test_cart_edit_after_payment_starts_fresh_session() {
        let mut c = at_payment_ready(ups_and_usps()).await;
        c.pay().await.unwrap();
        assert!(c.edit_address(|form| form.city = "Paris".into()).is_err());

        c.remove_from_cart(ItemId(5)).unwrap();
        assert_eq!(c.state(), CheckoutState::CartReady);
        assert!(c.session().checkout_url().is_none());
        assert!(c.session().draft().is_none());
    }

    #[tokio::test]
    async fn test_cancel_keeps_cart() {
        let mut c = at_payment_ready(ups_and_usps()).await;
        assert_eq!(c.cancel().unwrap(), CheckoutState::CartReady);
        assert_eq!(c.session().cart().len(), 2);
        assert!(c.session().draft().is_none());
        assert!(c.session().rates().is_empty());

        c.clear_cart().unwrap();
        assert_eq!(c.cancel().unwrap(), CheckoutState::Empty);
    }

    #[tokio::test]
    async fn test_mode_change_past_address_acts_as_address_edit() {
        let backend = ups_and_usps();
        let mut c = at_payment_ready(backend.clone()).await;

        assert_eq!(c.set_delivery_mode(DeliveryMode::Pickup).unwrap(), CheckoutState::AddressPending);
        let flags = c.flags();
        assert!(flags.cart_confirmed);
        assert!(!flags.address_confirmed && !flags.carrier_confirmed && !flags.payment_confirmed);
        assert!(c.session().draft().is_none());
        assert!(c.session().rates().is_empty());
        assert!(c.session().selected_rate().is_none());

        assert_eq!(c.submit_address().await.unwrap(), CheckoutState::PaymentReady);
        match backend.calls().iter().filter(|call| matches!(call, Call::CreateQuotation(_))).last() {
            Some(Call::CreateQuotation(q)) => assert!(!q.ship && q.pick_pack),
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_catalog_items_fill_the_cart() {
        let items: Vec<CatalogItem> = serde_json::from_value(serde_json::json!([
            {"id": 4, "name": "Espresso Beans", "sales_price": 12.5, "sales_currency_code": "EUR", "cost": 6.5},
            {"id": 8, "name": "Brewing Guide", "sales_price": "3.00", "digital": true}
        ]))
        .unwrap();
        let backend = FakeBackend::new().with_items(items);
        let mut c = controller(backend.clone());

        let catalog = c.catalog().await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(c.add_catalog_item(&catalog[0], 2).unwrap(), CheckoutState::CartReady);
        c.add_catalog_item(&catalog[1], 1).unwrap();

        let beans = c.session().cart().get(ItemId(4)).unwrap();
        assert_eq!(beans.quantity.value(), 2);
        assert_eq!(beans.unit_price.amount(), Decimal::new(125, 1));
        assert!(c.session().cart().get(ItemId(8)).unwrap().digital);
        assert!(!c.session().cart().is_digital_only());
        assert_eq!(backend.call_names(), vec!["list_items"]);
    }

    #[tokio::test]
    async fn test_catalog_failure_posts_notice() {
        let backend = FakeBackend::new().fail_on("list_items", 1, BackendError::Transport("refused".into()));
        let mut c = controller(backend);
        assert_eq!(c.catalog().await.unwrap_err().to_string(), "Could not load items");
        assert_eq!(c.notice().map(|n| n.message.as_str()), Some("Could not load items"));
    }

    fn order_line(item: i64, lot: Option<i64>, quantity: i64, price: &str) -> SaleOrderLineView {
        SaleOrderLineView {
            item_id: ItemId(item),
            lot_id: lot,
            quantity: Decimal::from(quantity),
            item_name: None,
            price: Some(price.parse().unwrap()),
            currency_code: Some("EUR".into()),
        }
    }

    #[tokio::test]
    async fn test_selected_lines_return() {
        let backend = FakeBackend::new();
        let mut c = controller(backend.clone());
        let line = ReturnLineIn::whole_line(&order_line(7, Some(3), 2, "12.50"), "damaged");

        let created = c.request_return(" SO-00000004 ", vec![line.clone()]).await.unwrap();
        assert_eq!(created.return_order_id.0, 1);
        assert_eq!(c.notice().map(|n| (n.kind, n.message.as_str())), Some((NoticeKind::Info, "Return order created!")));
        assert_eq!(
            backend.calls(),
            vec![Call::CreateReturnOrder(ReturnOrderCreate::for_sale_order("SO-00000004", vec![line]))]
        );
    }

    #[tokio::test]
    async fn test_whole_order_return_lists_every_line() {
        let backend = FakeBackend::new().with_order_lines(vec![order_line(7, None, 2, "12.50"), order_line(9, Some(4), 1, "3")]);
        let mut c = controller(backend.clone());

        c.return_whole_order("SO-7", "changed mind").await.unwrap();
        assert_eq!(backend.call_names(), vec!["sale_order_by_code", "create_return_order"]);
        let Some(Call::CreateReturnOrder(request)) = backend.calls().pop() else { panic!("no return order") };
        assert_eq!(request.origin_code, "SO-7");
        let lines: Vec<_> = request.lines.iter().map(|l| (l.item_id.0, l.lot_id, l.quantity, l.reason.as_str())).collect();
        assert_eq!(lines, vec![(7, None, 2, "changed mind"), (9, Some(4), 1, "changed mind")]);
        assert_eq!(request.lines[0].price, "12.50".parse::<Decimal>().unwrap());
    }

    #[tokio::test]
    async fn test_whole_order_return_needs_lines() {
        let backend = FakeBackend::new();
        let mut c = controller(backend.clone());
        let err = c.return_whole_order("SO-7", "").await.unwrap_err();
        assert!(matches!(err, CheckoutError::NothingToReturn(ref code) if code == "SO-7"));
        assert_eq!(c.notice().map(|n| n.message.as_str()), Some("Order SO-7 has no lines to return"));
        assert_eq!(backend.call_names(), vec!["sale_order_by_code"]);
    }

    #[tokio::test]
    async fn test_return_rejection_shows_backend_detail() {
        let backend = FakeBackend::new().fail_on(
            "create_return_order",
            1,
            BackendError::Rejected { status: 404, detail: "Sale Order not found or not confirmed".into() },
        );
        let mut c = controller(backend);
        let err = c.request_return("SO-DRAFT", vec![]).await.unwrap_err();
        assert_eq!(err.to_string(), "Sale Order not found or not confirmed");
        assert_eq!(c.notice().map(|n| n.kind), Some(NoticeKind::Error));
    }

    #[tokio::test]
    async fn test_fulfillment_advice_needs_draft() {
        let backend = ups_and_usps();
        let mut c = at_address_pending(backend.clone()).await;
        assert!(matches!(c.fulfillment_advice(DecisionKind::Packing).await, Err(CheckoutError::NoDraftOrder)));

        c.submit_address().await.unwrap();
        let decision = c.fulfillment_advice(DecisionKind::Packing).await.unwrap();
        assert_eq!(decision.as_bool(), Some(true));
        assert!(matches!(backend.calls().last(), Some(Call::Decide(DecisionKind::Packing, q)) if q[1].1 == "Q-00000002"));
    }
}
