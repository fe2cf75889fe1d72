//! Remote Backends (Strategy pattern)
//!
//! The three remote steps of a checkout. Implementations live in
//! `checkout-payments`; tests use in-process doubles.

use async_trait::async_trait;

use crate::error::Result;
use crate::idempotency::IdempotencyKey;
use crate::model::{
    BillingDetails, PaymentConfirmationResult, PaymentIntent, PaymentIntentRequest,
    PaymentMethodToken, Purchase,
};

/// Creates payment intents
#[async_trait]
pub trait PaymentIntentBackend: Send + Sync {
    /// Create an intent for the request; any error means no charge was made
    async fn create_intent(
        &self,
        request: &PaymentIntentRequest,
        key: &IdempotencyKey,
    ) -> Result<PaymentIntent>;

    /// Backend name for logs and health output
    fn name(&self) -> &str;
}

/// Confirms a payment intent with a tokenized card
#[async_trait]
pub trait PaymentConfirmer: Send + Sync {
    /// A declined card is `Ok(Failure)`; `Err` is reserved for transport problems
    async fn confirm(
        &self,
        intent: &PaymentIntent,
        payment_method: &PaymentMethodToken,
        billing: &BillingDetails,
        key: &IdempotencyKey,
    ) -> Result<PaymentConfirmationResult>;
}

/// Records orders
#[async_trait]
pub trait OrderPlacementBackend: Send + Sync {
    /// Returns the order tracking number
    async fn place_order(&self, purchase: &Purchase, key: &IdempotencyKey) -> Result<String>;
}
