//! Backend seam. The storefront owns no business rules; everything below is a
//! request to the ERP service.

use async_trait::async_trait;
use thiserror::Error;

pub mod http;
pub mod types;

pub use http::HttpBackend;

use crate::checkout::ShippingRate;
use crate::domain::value_objects::{PurchaseOrderId, QuotationId};
use types::{
    CatalogItem, CheckoutSessionCreated, CheckoutSessionRequest, Decision, DecisionKind, Document, OrderLineIn,
    PartnerCreate, PartnerCreated, PurchaseOrderCreate, PurchaseOrderCreated, PurchaseOrderLineIn, QuotationConfirmed,
    QuotationCreate, QuotationCreated, RatesRequest, ReturnOrderCreate, ReturnOrderCreated, SaleOrderView, Vendor,
};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend rejected request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("not authenticated")]
    Unauthorized,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),
}

impl BackendError {
    /// Text for the user: rejections carry the backend's detail verbatim,
    /// transport failures get the operation's generic message.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Rejected { detail, .. } => detail.clone(),
            Self::Unauthorized => "Not authenticated".to_string(),
            Self::Transport(_) | Self::Url(_) => fallback.to_string(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self { Self::Transport(err.to_string()) }
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn list_items(&self) -> Result<Vec<CatalogItem>, BackendError>;

    async fn create_partner(&self, partner: &PartnerCreate) -> Result<PartnerCreated, BackendError>;

    async fn list_vendors(&self) -> Result<Vec<Vendor>, BackendError>;

    async fn create_quotation(&self, quotation: &QuotationCreate) -> Result<QuotationCreated, BackendError>;

    /// Replaces the quotation's lines with `lines`, in order.
    async fn add_quotation_lines(&self, quotation_id: QuotationId, lines: &[OrderLineIn]) -> Result<(), BackendError>;

    async fn confirm_quotation(&self, quotation_id: QuotationId) -> Result<QuotationConfirmed, BackendError>;

    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSessionCreated, BackendError>;

    async fn shipping_rates(&self, request: &RatesRequest) -> Result<Vec<ShippingRate>, BackendError>;

    async fn decide(&self, kind: DecisionKind, query: &[(String, String)]) -> Result<Decision, BackendError>;

    async fn sale_order_by_code(&self, code: &str) -> Result<SaleOrderView, BackendError>;

    async fn create_purchase_order(&self, order: &PurchaseOrderCreate) -> Result<PurchaseOrderCreated, BackendError>;

    async fn add_purchase_order_lines(&self, order_id: PurchaseOrderId, lines: &[PurchaseOrderLineIn]) -> Result<(), BackendError>;

    async fn confirm_purchase_order(&self, order_id: PurchaseOrderId) -> Result<(), BackendError>;

    async fn cancel_purchase_order(&self, order_id: PurchaseOrderId) -> Result<(), BackendError>;

    async fn create_return_order(&self, order: &ReturnOrderCreate) -> Result<ReturnOrderCreated, BackendError>;

    /// Raw PDF bytes.
    async fn download_document(&self, document: Document) -> Result<Vec<u8>, BackendError>;
}
