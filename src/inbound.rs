//! Inbound purchasing: turns the vendor-grouped cart into one confirmed
//! purchase order per vendor.

use thiserror::Error;
use tracing::{info, warn};

use crate::backend::types::{CatalogItem, PurchaseOrderCreate, PurchaseOrderLineIn, Vendor};
use crate::backend::{Backend, BackendError};
use crate::domain::aggregates::{CartError, InboundCart, InboundLine};
use crate::domain::value_objects::{ItemId, PartnerId, PurchaseOrderId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedPurchaseOrder {
    pub vendor: PartnerId,
    pub purchase_order_id: PurchaseOrderId,
    pub code: Option<String>,
    pub line_count: usize,
}

#[derive(Error, Debug)]
pub enum InboundError {
    #[error("Cart is empty!")]
    EmptyCart,

    #[error("Catalog item {0} has no vendor")]
    NoVendor(ItemId),

    #[error(transparent)]
    Cart(#[from] CartError),

    /// Orders already confirmed for earlier vendors are listed in `placed`.
    /// `unconfirmed` is the failing vendor's order when it was created but
    /// never confirmed; it stays a draft on the backend until cancelled.
    #[error("{message}")]
    PlacementFailed {
        vendor: PartnerId,
        message: String,
        placed: Vec<PlacedPurchaseOrder>,
        unconfirmed: Option<PurchaseOrderId>,
        #[source]
        source: BackendError,
    },

    #[error("{message}")]
    Backend {
        message: String,
        #[source]
        source: BackendError,
    },
}

impl InboundError {
    fn backend(source: BackendError, fallback: &str) -> Self {
        Self::Backend { message: source.user_message(fallback), source }
    }
}

struct PlacementError {
    message: String,
    source: BackendError,
    unconfirmed: Option<PurchaseOrderId>,
}

pub struct InboundOrdering<B> {
    backend: B,
    cart: InboundCart,
}

impl<B: Backend> InboundOrdering<B> {
    pub fn new(backend: B) -> Self { Self { backend, cart: InboundCart::new() } }

    pub fn cart(&self) -> &InboundCart { &self.cart }

    pub async fn vendors(&self) -> Result<Vec<Vendor>, InboundError> {
        self.backend.list_vendors().await.map_err(|e| InboundError::backend(e, "Could not load vendors"))
    }

    pub fn add(&mut self, vendor: PartnerId, line: InboundLine) -> Result<(), InboundError> {
        Ok(self.cart.add(vendor, line)?)
    }

    /// Adds a catalog item under its own vendor.
    pub fn add_catalog_item(&mut self, item: &CatalogItem, quantity: u32) -> Result<(), InboundError> {
        let vendor = item.vendor_id.ok_or(InboundError::NoVendor(item.id))?;
        self.add(vendor, item.to_inbound_line(quantity))
    }

    pub fn update_quantity(&mut self, vendor: PartnerId, item_id: ItemId, quantity: u32) -> Result<(), InboundError> {
        Ok(self.cart.update_quantity(vendor, item_id, quantity)?)
    }

    pub fn remove(&mut self, vendor: PartnerId, item_id: ItemId) -> Result<(), InboundError> {
        Ok(self.cart.remove(vendor, item_id)?)
    }

    /// Creates, fills and confirms one purchase order per vendor, in vendor
    /// order. Stops at the first failure; vendors already placed leave the cart
    /// so a retry does not order them twice. The cart is cleared on success.
    pub async fn place_orders(&mut self) -> Result<Vec<PlacedPurchaseOrder>, InboundError> {
        if self.cart.is_empty() {
            return Err(InboundError::EmptyCart);
        }

        let groups: Vec<(PartnerId, Vec<PurchaseOrderLineIn>)> = self
            .cart
            .vendors()
            .map(|(vendor, lines)| (vendor, lines.into_iter().map(PurchaseOrderLineIn::from).collect()))
            .collect();

        let mut placed = Vec::with_capacity(groups.len());
        for (vendor, lines) in groups {
            match self.place_one(vendor, &lines).await {
                Ok(order) => {
                    info!(vendor = %vendor, purchase_order = %order.purchase_order_id, lines = lines.len(), "purchase order placed");
                    self.cart.remove_vendor(vendor);
                    placed.push(order);
                }
                Err(PlacementError { message, source, unconfirmed }) => {
                    warn!(vendor = %vendor, placed = placed.len(), ?unconfirmed, error = %source, "purchase order placement stopped");
                    return Err(InboundError::PlacementFailed { vendor, message, placed, unconfirmed, source });
                }
            }
        }

        self.cart.clear();
        Ok(placed)
    }

    /// Cancels a purchase order that is still a draft.
    pub async fn cancel_order(&self, order_id: PurchaseOrderId) -> Result<(), InboundError> {
        self.backend
            .cancel_purchase_order(order_id)
            .await
            .map_err(|e| InboundError::backend(e, "Error cancelling purchase order"))?;
        info!(purchase_order = %order_id, "purchase order cancelled");
        Ok(())
    }

    async fn place_one(&self, vendor: PartnerId, lines: &[PurchaseOrderLineIn]) -> Result<PlacedPurchaseOrder, PlacementError> {
        let created = self
            .backend
            .create_purchase_order(&PurchaseOrderCreate { partner_id: vendor, code: String::new() })
            .await
            .map_err(placement_error("Failed to create PO", None))?;
        let draft = Some(created.purchase_order_id);
        self.backend
            .add_purchase_order_lines(created.purchase_order_id, lines)
            .await
            .map_err(placement_error("Failed to add PO lines", draft))?;
        self.backend
            .confirm_purchase_order(created.purchase_order_id)
            .await
            .map_err(placement_error("Failed to confirm PO", draft))?;

        Ok(PlacedPurchaseOrder {
            vendor,
            purchase_order_id: created.purchase_order_id,
            code: created.code,
            line_count: lines.len(),
        })
    }
}

fn placement_error(
    fallback: &'static str,
    unconfirmed: Option<PurchaseOrderId>,
) -> impl Fn(BackendError) -> PlacementError {
    move |source| PlacementError { message: source.user_message(fallback), source, unconfirmed }
}
