//! Address Normalization
//!
//! The form selects states and countries as `{code, name}` pairs from the
//! directory. Submitted addresses carry only the display names.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation::not_only_whitespace;

/// A selectable country or state
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct Region {
    #[validate(length(min = 1), custom = "not_only_whitespace")]
    pub code: String,

    #[validate(length(min = 1), custom = "not_only_whitespace")]
    pub name: String,
}

impl Region {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Address as entered in the form, with structured selections
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressForm {
    #[validate(length(min = 2), custom = "not_only_whitespace")]
    pub street: String,

    #[validate(length(min = 2), custom = "not_only_whitespace")]
    pub city: String,

    #[validate]
    pub state: Region,

    #[validate]
    pub country: Region,

    #[validate(length(min = 2), custom = "not_only_whitespace")]
    pub zip_code: String,
}

impl AddressForm {
    /// Flatten the state and country selections to their display names
    pub fn normalize(&self) -> Address {
        Address {
            street: self.street.clone(),
            city: self.city.clone(),
            state: self.state.name.clone(),
            country: self.country.name.clone(),
            zip_code: self.zip_code.clone(),
        }
    }
}

/// Address as submitted to the backends
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    /// State display name
    pub state: String,
    /// Country display name
    pub country: String,
    pub zip_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_keeps_display_names_only() {
        let form = AddressForm {
            street: "1 Infinite Loop".into(),
            city: "Cupertino".into(),
            state: Region::new("CA", "California"),
            country: Region::new("US", "United States"),
            zip_code: "95014".into(),
        };

        let address = form.normalize();
        assert_eq!(address.state, "California");
        assert_eq!(address.country, "United States");

        let json = serde_json::to_string(&address).unwrap();
        assert!(!json.contains("\"CA\""));
        assert!(!json.contains("\"US\""));
        assert!(json.contains("\"zipCode\":\"95014\""));
    }
}
