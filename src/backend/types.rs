//! Request and response bodies exchanged with the backend.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::checkout::DeliveryMode;
use crate::domain::aggregates::{CartLine, CustomerDetails, InboundLine};
use crate::domain::value_objects::{
    CurrencyId, ItemId, Money, PartnerId, PurchaseOrderId, Quantity, QuotationId, ReturnOrderId, SaleOrderId,
    DEFAULT_CURRENCY_CODE, DEFAULT_CURRENCY_ID,
};

/// Purchase order lines are routed through the default inbound route.
pub const DEFAULT_ROUTE_ID: i64 = 1;

// =============================================================================
// Catalog
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub vendor_id: Option<PartnerId>,
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default)]
    pub cost_currency_code: Option<String>,
    #[serde(default)]
    pub cost_currency_id: Option<CurrencyId>,
    #[serde(default)]
    pub sales_price: Option<Decimal>,
    #[serde(default)]
    pub sales_currency_code: Option<String>,
    #[serde(default)]
    pub sales_currency_id: Option<CurrencyId>,
    #[serde(default)]
    pub digital: bool,
}

impl CatalogItem {
    /// Cart line for `quantity` units. Missing prices count as zero; a missing
    /// cost currency follows the sales currency.
    pub fn to_cart_line(&self, quantity: u32) -> CartLine {
        let currency_code = self.sales_currency_code.as_deref().unwrap_or(DEFAULT_CURRENCY_CODE);
        let currency_id = self.sales_currency_id.unwrap_or(DEFAULT_CURRENCY_ID);
        let cost_code = self.cost_currency_code.as_deref().unwrap_or(currency_code);
        CartLine {
            item_id: self.id,
            name: self.name.clone(),
            quantity: Quantity::new(quantity),
            unit_price: Money::new(self.sales_price.unwrap_or_default(), currency_code),
            currency_id,
            cost: Money::new(self.cost.unwrap_or_default(), cost_code),
            cost_currency_id: self.cost_currency_id.unwrap_or(currency_id),
            digital: self.digital,
        }
    }

    /// Purchasing line priced at the vendor cost.
    pub fn to_inbound_line(&self, quantity: u32) -> InboundLine {
        let code = self.cost_currency_code.as_deref().unwrap_or(DEFAULT_CURRENCY_CODE);
        let currency_id = self.cost_currency_id.unwrap_or(DEFAULT_CURRENCY_ID);
        InboundLine {
            item_id: self.id,
            name: self.name.clone(),
            quantity: Quantity::new(quantity),
            price: Money::new(self.cost.unwrap_or_default(), code),
            currency_id,
            cost: self.cost.map(|c| Money::new(c, code)),
            cost_currency_id: currency_id,
        }
    }
}

// =============================================================================
// Partners & Quotations
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PartnerCreate {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub zip: String,
    pub country: String,
    pub billing_street: String,
    pub billing_city: String,
    pub billing_zip: String,
    pub billing_country: String,
    pub partner_type: String,
}

impl From<&CustomerDetails> for PartnerCreate {
    fn from(c: &CustomerDetails) -> Self {
        Self {
            name: c.name.trim().to_string(),
            email: c.email.trim().to_string(),
            phone: c.phone.trim().to_string(),
            street: c.street.trim().to_string(),
            city: c.city.trim().to_string(),
            zip: c.zip.trim().to_string(),
            country: c.country.trim().to_string(),
            billing_street: c.billing_street.trim().to_string(),
            billing_city: c.billing_city.trim().to_string(),
            billing_zip: c.billing_zip.trim().to_string(),
            billing_country: c.billing_country.trim().to_string(),
            partner_type: "customer".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PartnerCreated {
    pub id: PartnerId,
}

/// Row from the vendor listing (`GET /partners?vendor=1`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: PartnerId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuotationCreate {
    pub partner_id: PartnerId,
    /// Blank lets the backend generate the code.
    pub code: String,
    pub ship: bool,
    pub pick_pack: bool,
    pub split_parcel: bool,
    pub carrier_id: Option<i64>,
}

impl QuotationCreate {
    pub fn for_mode(partner_id: PartnerId, mode: DeliveryMode) -> Self {
        Self {
            partner_id,
            code: String::new(),
            ship: mode.requires_shipping(),
            pick_pack: mode.requires_packing(),
            split_parcel: false,
            carrier_id: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct QuotationCreated {
    pub quotation_id: QuotationId,
    pub code: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderLineIn {
    pub item_id: ItemId,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub currency_id: CurrencyId,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost: Decimal,
    pub cost_currency_id: CurrencyId,
}

impl From<&CartLine> for OrderLineIn {
    fn from(line: &CartLine) -> Self {
        Self {
            item_id: line.item_id,
            quantity: line.quantity.value(),
            price: line.unit_price.amount(),
            currency_id: line.currency_id,
            cost: line.cost.amount(),
            cost_currency_id: line.cost_currency_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct QuotationConfirmed {
    pub sale_order_code: String,
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckoutSessionRequest {
    pub order_number: String,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CheckoutSessionCreated {
    #[serde(default)]
    pub checkout_url: Option<String>,
}

// =============================================================================
// Shipping
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateAddress {
    pub name: String,
    pub street1: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub email: String,
    pub phone: String,
}

impl From<&CustomerDetails> for RateAddress {
    fn from(c: &CustomerDetails) -> Self {
        Self {
            name: c.name.trim().to_string(),
            street1: c.street.trim().to_string(),
            city: c.city.trim().to_string(),
            state: String::new(),
            zip: c.zip.trim().to_string(),
            country: c.country.trim().to_string(),
            email: c.email.trim().to_string(),
            phone: c.phone.trim().to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RatesRequest {
    pub from_address: RateAddress,
    pub to_address: RateAddress,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RatesResponse {
    #[serde(default)]
    pub rates: Vec<crate::checkout::ShippingRate>,
}

// =============================================================================
// Fulfillment decisions
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecisionKind { Dropship, Fulfillment, Packing, ParcelSplit }

impl DecisionKind {
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Dropship => "dropship",
            Self::Fulfillment => "fulfillment",
            Self::Packing => "packing",
            Self::ParcelSplit => "parcel-split",
        }
    }
}

impl std::str::FromStr for DecisionKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "dropship" => Ok(Self::Dropship),
            "fulfillment" => Ok(Self::Fulfillment),
            "packing" => Ok(Self::Packing),
            "parcel-split" => Ok(Self::ParcelSplit),
            other => Err(format!("unknown decision kind: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub answer: serde_json::Value,
}

impl Decision {
    /// Reads yes/no style answers (`true`, `1`, `"yes"`).
    pub fn as_bool(&self) -> Option<bool> {
        match &self.answer {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::Number(n) => n.as_i64().map(|v| v != 0),
            serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" | "1" => Some(true),
                "no" | "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

// =============================================================================
// Orders & Documents
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaleOrderLineView {
    pub item_id: ItemId,
    #[serde(default)]
    pub lot_id: Option<i64>,
    pub quantity: Decimal,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub currency_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaleOrderView {
    pub id: SaleOrderId,
    pub code: String,
    pub status: String,
    #[serde(default)]
    pub partner_name: Option<String>,
    #[serde(default)]
    pub lines: Vec<SaleOrderLineView>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Document {
    SaleOrder(SaleOrderId),
    SaleShipment(SaleOrderId),
    SaleLabel(SaleOrderId),
    PurchaseOrder(PurchaseOrderId),
}

impl Document {
    pub fn path(self) -> String {
        match self {
            Self::SaleOrder(id) => format!("sale-orders/{id}/print-order"),
            Self::SaleShipment(id) => format!("sale-orders/{id}/print-shipment"),
            Self::SaleLabel(id) => format!("sale-orders/{id}/print-label"),
            Self::PurchaseOrder(id) => format!("purchase-orders/{id}/print-order"),
        }
    }

    pub fn file_name(self) -> String {
        match self {
            Self::SaleOrder(id) => format!("SaleOrder_{id}.pdf"),
            Self::SaleShipment(id) => format!("SaleOrder_Shipping_{id}.pdf"),
            Self::SaleLabel(id) => format!("SaleOrder_Label_{id}.pdf"),
            Self::PurchaseOrder(id) => format!("PurchaseOrder_{id}.pdf"),
        }
    }
}

// =============================================================================
// Purchasing
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PurchaseOrderCreate {
    pub partner_id: PartnerId,
    pub code: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PurchaseOrderCreated {
    #[serde(alias = "id", alias = "po_id", alias = "order_id")]
    pub purchase_order_id: PurchaseOrderId,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PurchaseOrderLineIn {
    pub item_id: ItemId,
    pub quantity: u32,
    pub route_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub currency_id: CurrencyId,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost: Decimal,
    pub cost_currency_id: CurrencyId,
}

impl From<&InboundLine> for PurchaseOrderLineIn {
    fn from(line: &InboundLine) -> Self {
        Self {
            item_id: line.item_id,
            quantity: line.quantity.value(),
            route_id: DEFAULT_ROUTE_ID,
            price: line.price.amount(),
            currency_id: line.currency_id,
            cost: line.effective_cost().amount(),
            cost_currency_id: line.cost_currency_id,
        }
    }
}

// =============================================================================
// Returns
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnOrigin { SaleOrder, PurchaseOrder }

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReturnLineIn {
    pub item_id: ItemId,
    pub lot_id: Option<i64>,
    pub quantity: u32,
    pub reason: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl ReturnLineIn {
    /// Returns the full ordered quantity of `line` at its order price.
    pub fn whole_line(line: &SaleOrderLineView, reason: &str) -> Self {
        Self {
            item_id: line.item_id,
            lot_id: line.lot_id,
            quantity: line.quantity.trunc().to_u32().unwrap_or(0),
            reason: reason.to_string(),
            price: line.price.unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReturnOrderCreate {
    pub origin_model: ReturnOrigin,
    pub origin_code: String,
    /// Empty returns the whole order.
    pub lines: Vec<ReturnLineIn>,
    pub ship: bool,
}

impl ReturnOrderCreate {
    /// Return of a confirmed sale order, collected by carrier.
    pub fn for_sale_order(code: &str, lines: Vec<ReturnLineIn>) -> Self {
        Self { origin_model: ReturnOrigin::SaleOrder, origin_code: code.trim().to_string(), lines, ship: true }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ReturnOrderCreated {
    pub return_order_id: ReturnOrderId,
}
