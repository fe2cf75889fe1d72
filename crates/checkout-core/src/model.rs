//! Domain Models
//!
//! Order, purchase and payment types exchanged with the remote backends.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::cart::{CartItem, CartSnapshot};
use crate::error::{CheckoutError, Result};
use crate::validation::{CheckoutForm, CustomerInfo};

/// Charge currency
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Eur,
    Usd,
    Gbp,
}

impl Currency {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eur => "EUR",
            Self::Usd => "USD",
            Self::Gbp => "GBP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "EUR" => Some(Self::Eur),
            "USD" => Some(Self::Usd),
            "GBP" => Some(Self::Gbp),
            _ => None,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line of the order, snapshotted from the cart
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub product_id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl From<&CartItem> for OrderLineItem {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id,
            name: item.name.clone(),
            image_url: item.image_url.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
        }
    }
}

/// Order totals as shown to the customer at submission time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    pub total_price: Decimal,
    pub total_quantity: u32,
    #[serde(skip)]
    items: Vec<OrderLineItem>,
}

impl OrderDraft {
    /// Snapshot the cart; later cart changes do not affect this draft
    pub fn from_cart(cart: &CartSnapshot) -> Self {
        Self {
            total_price: cart.total_price,
            total_quantity: cart.total_quantity,
            items: cart.items.iter().map(OrderLineItem::from).collect(),
        }
    }

    pub fn items(&self) -> &[OrderLineItem] {
        &self.items
    }

    /// Charge amount in minor currency units: `round(total_price * 100)`
    pub fn amount_minor_units(&self) -> Result<i64> {
        let cents = (self.total_price * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

        if cents.is_sign_negative() && !cents.is_zero() {
            return Err(CheckoutError::Validation(format!(
                "order total {} is negative",
                self.total_price
            )));
        }

        cents.to_i64().ok_or_else(|| {
            CheckoutError::Validation(format!("order total {} is out of range", self.total_price))
        })
    }
}

/// Everything the order-placement backend needs to record an order
///
/// Only constructible from a validated [`CheckoutForm`], so holding a
/// `Purchase` means the form passed every field rule.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    customer: CustomerInfo,
    shipping_address: Address,
    billing_address: Address,
    order: OrderDraft,
    order_items: Vec<OrderLineItem>,
    #[serde(skip)]
    billing_country_code: String,
}

impl Purchase {
    /// Validate the form, flatten its address selections and snapshot the cart
    pub fn from_form(form: &CheckoutForm, cart: &CartSnapshot) -> Result<Self> {
        form.check()?;

        if cart.items.is_empty() || cart.total_quantity == 0 {
            return Err(CheckoutError::Validation("cart is empty".into()));
        }

        let order = OrderDraft::from_cart(cart);
        let order_items = order.items().to_vec();

        Ok(Self {
            customer: form.customer.clone(),
            shipping_address: form.shipping_address.normalize(),
            billing_address: form.billing_address.normalize(),
            billing_country_code: form.billing_address.country.code.trim().to_string(),
            order,
            order_items,
        })
    }

    pub const fn customer(&self) -> &CustomerInfo {
        &self.customer
    }

    pub const fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    pub const fn billing_address(&self) -> &Address {
        &self.billing_address
    }

    pub const fn order(&self) -> &OrderDraft {
        &self.order
    }

    pub fn order_items(&self) -> &[OrderLineItem] {
        &self.order_items
    }

    /// Derive the intent request; the amount is fixed by the draft
    pub fn payment_intent_request(&self, currency: Currency) -> Result<PaymentIntentRequest> {
        Ok(PaymentIntentRequest {
            amount: self.order.amount_minor_units()?,
            currency,
            receipt_email: self.customer.email.clone(),
        })
    }

    /// Billing details handed to the payment provider with the card token
    pub fn billing_details(&self) -> BillingDetails {
        BillingDetails {
            name: format!("{} {}", self.customer.first_name, self.customer.last_name),
            email: self.customer.email.clone(),
            line1: self.billing_address.street.clone(),
            city: self.billing_address.city.clone(),
            state: self.billing_address.state.clone(),
            postal_code: self.billing_address.zip_code.clone(),
            country: self.billing_country_code.clone(),
        }
    }
}

/// Request body for the payment intent backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    /// Amount in minor currency units (cents)
    pub amount: i64,
    pub currency: Currency,
    pub receipt_email: String,
}

/// A payment intent as returned by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Provider intent id (`pi_...`)
    pub id: String,

    /// Secret the confirmation step authenticates with
    pub client_secret: String,
}

impl PaymentIntent {
    /// Stripe client secrets are `{intent id}_secret_{random}`
    pub fn from_client_secret(client_secret: impl Into<String>) -> Self {
        let client_secret = client_secret.into();
        let id = client_secret
            .split_once("_secret_")
            .map_or_else(|| client_secret.clone(), |(id, _)| id.to_string());
        Self { id, client_secret }
    }
}

/// Opaque card handle produced by the hosted payment fields
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMethodToken(String);

impl PaymentMethodToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PaymentMethodToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PaymentMethodToken(..)")
    }
}

/// Billing details sent with the confirmation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDetails {
    pub name: String,
    pub email: String,
    pub line1: String,
    pub city: String,
    /// Display name of the state
    pub state: String,
    pub postal_code: String,
    /// ISO country code
    pub country: String,
}

/// Outcome of the confirmation step
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentConfirmationResult {
    Success,
    Failure { reason: String },
}

/// Successful checkout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub tracking_number: String,
    pub payment_intent_id: String,
    pub amount: i64,
    pub currency: Currency,
}

/// Terminal outcome of a submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrderPlacementResult {
    Success { tracking_number: String },
    Failure { reason: String },
}

impl From<Result<OrderReceipt>> for OrderPlacementResult {
    fn from(result: Result<OrderReceipt>) -> Self {
        match result {
            Ok(receipt) => Self::Success {
                tracking_number: receipt.tracking_number,
            },
            Err(e) => Self::Failure {
                reason: e.to_string(),
            },
        }
    }
}
