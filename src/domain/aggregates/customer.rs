//! Customer address form

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Shipping and billing details captured at checkout. Every field is required.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CustomerDetails {
    #[validate(custom = "non_blank")]
    pub name: String,
    #[validate(custom = "non_blank")]
    pub email: String,
    #[validate(custom = "non_blank")]
    pub phone: String,
    #[validate(custom = "non_blank")]
    pub street: String,
    #[validate(custom = "non_blank")]
    pub city: String,
    #[validate(custom = "non_blank")]
    pub zip: String,
    #[validate(custom = "non_blank")]
    pub country: String,
    #[validate(custom = "non_blank")]
    pub billing_street: String,
    #[validate(custom = "non_blank")]
    pub billing_city: String,
    #[validate(custom = "non_blank")]
    pub billing_zip: String,
    #[validate(custom = "non_blank")]
    pub billing_country: String,
}

fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() { Err(ValidationError::new("blank")) } else { Ok(()) }
}

impl CustomerDetails {
    /// Names of the fields that fail validation, sorted. Empty when the form is complete.
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        match self.validate() {
            Ok(()) => vec![],
            Err(errors) => {
                let mut fields: Vec<&'static str> = errors.field_errors().into_keys().collect();
                fields.sort_unstable();
                fields
            }
        }
    }

    pub fn has_email(&self) -> bool { !self.email.trim().is_empty() }

    /// Copies the shipping address into the billing fields.
    pub fn bill_to_shipping_address(&mut self) {
        self.billing_street = self.street.clone();
        self.billing_city = self.city.clone();
        self.billing_zip = self.zip.clone();
        self.billing_country = self.country.clone();
    }
}
