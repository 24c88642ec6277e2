//! Draft Order Aggregate
//!
//! Local record of the quotation the backend created for this checkout.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::value_objects::{PartnerId, QuotationId};

#[derive(Clone, Debug, PartialEq)]
pub struct DraftOrder {
    quotation_id: QuotationId,
    code: String,
    partner_id: PartnerId,
    line_count: usize,
    status: OrderStatus,
    sale_order_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrderStatus { #[default] Draft, Confirmed }

impl DraftOrder {
    pub fn create(quotation_id: QuotationId, code: impl Into<String>, partner_id: PartnerId, line_count: usize) -> Self {
        let now = Utc::now();
        Self {
            quotation_id, code: code.into(), partner_id, line_count,
            status: OrderStatus::Draft, sale_order_code: None, created_at: now, updated_at: now,
        }
    }

    pub fn quotation_id(&self) -> QuotationId { self.quotation_id }
    /// Quotation code; the payment session is keyed on it.
    pub fn code(&self) -> &str { &self.code }
    pub fn partner_id(&self) -> PartnerId { self.partner_id }
    pub fn line_count(&self) -> usize { self.line_count }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn sale_order_code(&self) -> Option<&str> { self.sale_order_code.as_deref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    /// Records the sale order the backend produced when the quotation was confirmed.
    pub fn confirm(&mut self, sale_order_code: impl Into<String>) -> Result<(), OrderError> {
        if self.line_count == 0 { return Err(OrderError::NoItems); }
        if self.status == OrderStatus::Confirmed { return Err(OrderError::AlreadyConfirmed(self.code.clone())); }
        self.status = OrderStatus::Confirmed;
        self.sale_order_code = Some(sale_order_code.into());
        self.touch();
        Ok(())
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Order has no items")]
    NoItems,
    #[error("Quotation {0} is already confirmed")]
    AlreadyConfirmed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_workflow() {
        let mut order = DraftOrder::create(QuotationId(5), "Q-1A2B3C4D", PartnerId(9), 2);
        assert_eq!(order.status(), OrderStatus::Draft);
        order.confirm("SO-00000001").unwrap();
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert_eq!(order.sale_order_code(), Some("SO-00000001"));
        assert!(matches!(order.confirm("SO-2"), Err(OrderError::AlreadyConfirmed(_))));
    }

    #[test]
    fn test_confirm_requires_lines() {
        let mut order = DraftOrder::create(QuotationId(5), "Q-EMPTY", PartnerId(9), 0);
        assert_eq!(order.confirm("SO-1"), Err(OrderError::NoItems));
    }
}
