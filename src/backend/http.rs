//! reqwest-backed [`Backend`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::types::{
    CatalogItem, CheckoutSessionCreated, CheckoutSessionRequest, Decision, DecisionKind, Document, OrderLineIn,
    PartnerCreate, PartnerCreated, PurchaseOrderCreate, PurchaseOrderCreated, PurchaseOrderLineIn, QuotationConfirmed,
    QuotationCreate, QuotationCreated, RatesRequest, RatesResponse, ReturnOrderCreate, ReturnOrderCreated, SaleOrderView,
    Vendor,
};
use super::{Backend, BackendError};
use crate::checkout::ShippingRate;
use crate::config::Config;
use crate::domain::value_objects::{PurchaseOrderId, QuotationId};

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// FastAPI-style error body. `detail` is a string for handled errors and a
/// list for validation failures.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

impl ErrorBody {
    fn detail_text(self) -> Option<String> {
        match self.detail? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
            serde_json::Value::String(_) | serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpBackend {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base, token: None })
    }

    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let backend = Self::new(&config.backend_url, config.request_timeout)?;
        Ok(match &config.backend_token {
            Some(token) => backend.with_token(token.clone()),
            None => backend,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url { &self.base }
    pub fn is_authenticated(&self) -> bool { self.token.is_some() }

    /// Exchanges credentials for a bearer token used on every later request.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), BackendError> {
        let request = self.request(Method::POST, "login")?.json(&LoginRequest { username, password });
        let body: LoginResponse = self.send_json(request, "Login failed").await?;
        self.token = Some(body.access_token);
        info!(username, "logged in to backend");
        Ok(())
    }

    pub fn logout(&mut self) { self.token = None; }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, BackendError> {
        let url = self.base.join(path)?;
        debug!(%method, %url, "backend request");
        let builder = self.http.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send(&self, request: RequestBuilder, fallback: &str) -> Result<Response, BackendError> {
        let response = request.send().await?;
        classify(response, fallback).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, fallback: &str) -> Result<T, BackendError> {
        let response = self.send(request, fallback).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_unit(&self, request: RequestBuilder, fallback: &str) -> Result<(), BackendError> {
        self.send(request, fallback).await.map(|_| ())
    }
}

/// Maps a response onto the error taxonomy: 2xx passes through, 401/403 is
/// `Unauthorized`, anything else is `Rejected` with the backend's detail.
async fn classify(response: Response, fallback: &str) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        warn!(%status, "backend refused credentials");
        return Err(BackendError::Unauthorized);
    }
    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(ErrorBody::detail_text)
        .unwrap_or_else(|| fallback.to_string());
    warn!(%status, %detail, "backend rejected request");
    Err(BackendError::Rejected { status: status.as_u16(), detail })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_items(&self) -> Result<Vec<CatalogItem>, BackendError> {
        let request = self.request(Method::GET, "items")?;
        self.send_json(request, "Could not load items").await
    }

    async fn create_partner(&self, partner: &PartnerCreate) -> Result<PartnerCreated, BackendError> {
        let request = self.request(Method::POST, "partners")?.json(partner);
        self.send_json(request, "Failed to create customer").await
    }

    async fn list_vendors(&self) -> Result<Vec<Vendor>, BackendError> {
        let request = self.request(Method::GET, "partners")?.query(&[("vendor", "1")]);
        self.send_json(request, "Could not load vendors").await
    }

    async fn create_quotation(&self, quotation: &QuotationCreate) -> Result<QuotationCreated, BackendError> {
        let request = self.request(Method::POST, "quotations/")?.json(quotation);
        self.send_json(request, "Failed to create quotation").await
    }

    async fn add_quotation_lines(&self, quotation_id: QuotationId, lines: &[OrderLineIn]) -> Result<(), BackendError> {
        let request = self.request(Method::POST, &format!("quotations/{quotation_id}/lines"))?.json(lines);
        self.send_unit(request, "Failed to add quotation lines").await
    }

    async fn confirm_quotation(&self, quotation_id: QuotationId) -> Result<QuotationConfirmed, BackendError> {
        let request = self.request(Method::POST, &format!("quotations/{quotation_id}/confirm"))?;
        self.send_json(request, "Failed to confirm quotation").await
    }

    async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<CheckoutSessionCreated, BackendError> {
        let builder = self.request(Method::POST, "create-checkout-session")?.json(request);
        self.send_json(builder, "Failed to start payment").await
    }

    async fn shipping_rates(&self, request: &RatesRequest) -> Result<Vec<ShippingRate>, BackendError> {
        let builder = self.request(Method::POST, "shippo/rates")?.json(request);
        let body: RatesResponse = self.send_json(builder, "Error fetching rates").await?;
        Ok(body.rates)
    }

    async fn decide(&self, kind: DecisionKind, query: &[(String, String)]) -> Result<Decision, BackendError> {
        let request = self.request(Method::GET, &format!("decisions/{}", kind.path_segment()))?.query(query);
        self.send_json(request, "Decision service unavailable").await
    }

    async fn sale_order_by_code(&self, code: &str) -> Result<SaleOrderView, BackendError> {
        let mut url = self.base.join("sale-orders/by-code/")?;
        url.path_segments_mut()
            .map_err(|_| BackendError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push(code);
        let request = self.request(Method::GET, url.as_str())?;
        self.send_json(request, "Order not found").await
    }

    async fn create_purchase_order(&self, order: &PurchaseOrderCreate) -> Result<PurchaseOrderCreated, BackendError> {
        let request = self.request(Method::POST, "purchase-orders/")?.json(order);
        self.send_json(request, "Failed to create PO").await
    }

    async fn add_purchase_order_lines(&self, order_id: PurchaseOrderId, lines: &[PurchaseOrderLineIn]) -> Result<(), BackendError> {
        let request = self.request(Method::POST, &format!("purchase-orders/{order_id}/lines"))?.json(lines);
        self.send_unit(request, "Failed to add PO lines").await
    }

    async fn confirm_purchase_order(&self, order_id: PurchaseOrderId) -> Result<(), BackendError> {
        let request = self.request(Method::POST, &format!("purchase-orders/{order_id}/confirm"))?;
        self.send_unit(request, "Failed to confirm PO").await
    }

    async fn cancel_purchase_order(&self, order_id: PurchaseOrderId) -> Result<(), BackendError> {
        let request = self.request(Method::POST, &format!("purchase-orders/{order_id}/cancel"))?;
        self.send_unit(request, "Error cancelling purchase order").await
    }

    async fn create_return_order(&self, order: &ReturnOrderCreate) -> Result<ReturnOrderCreated, BackendError> {
        let request = self.request(Method::POST, "return-orders/")?.json(order);
        self.send_json(request, "Failed to create return order").await
    }

    async fn download_document(&self, document: Document) -> Result<Vec<u8>, BackendError> {
        let request = self.request(Method::GET, &document.path())?;
        let response = self.send(request, "Failed to download document").await?;
        Ok(response.bytes().await?.to_vec())
    }
}
