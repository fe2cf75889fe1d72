//! Checkout Form Validation
//!
//! Field rules for the customer, shipping and billing form groups. A form
//! that fails here never reaches a remote backend.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::address::AddressForm;
use crate::error::{CheckoutError, Result};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,5}$").expect("email pattern is valid")
});

/// Rejects values made only of whitespace
pub fn not_only_whitespace(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("not_only_whitespace");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

fn storefront_email(value: &str) -> std::result::Result<(), ValidationError> {
    if EMAIL_RE.is_match(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("email");
        err.message = Some("must be a valid email address".into());
        Err(err)
    }
}

/// Customer contact details
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    #[validate(length(min = 2), custom = "not_only_whitespace")]
    pub first_name: String,

    #[validate(length(min = 2), custom = "not_only_whitespace")]
    pub last_name: String,

    #[validate(length(min = 1), custom = "storefront_email")]
    pub email: String,
}

/// The whole checkout form as submitted by the storefront
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForm {
    #[validate]
    pub customer: CustomerInfo,

    #[validate]
    pub shipping_address: AddressForm,

    #[validate]
    pub billing_address: AddressForm,
}

impl CheckoutForm {
    /// Copy the shipping address into the billing address
    pub fn copy_shipping_to_billing(&mut self) {
        self.billing_address = self.shipping_address.clone();
    }

    /// Run every field rule, reporting failing fields by dotted path
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(|errors| {
            let mut fields = Vec::new();
            collect_fields("", &errors, &mut fields);
            fields.sort();
            CheckoutError::Validation(format!("invalid fields: {}", fields.join(", ")))
        })
    }
}

fn collect_fields(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            (*field).to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(_) => out.push(path),
            ValidationErrorsKind::Struct(nested) => collect_fields(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_fields(&format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
}
