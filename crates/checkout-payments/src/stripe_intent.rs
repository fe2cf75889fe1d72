//! Stripe Payment Intents
//!
//! Creates the intent directly against Stripe with the secret key, for
//! deployments without a shop API in front of Stripe.

use std::collections::HashMap;

use async_trait::async_trait;
use checkout_core::{Currency, IdempotencyKey, PaymentIntent, PaymentIntentBackend, PaymentIntentRequest};
use stripe::{
    Client, CreatePaymentIntent, Currency as StripeCurrency, PaymentIntent as StripePaymentIntent,
    RequestStrategy,
};

use crate::error::{PaymentError, Result};

/// Stripe intent backend
#[derive(Clone)]
pub struct StripeIntentBackend {
    client: Client,
}

impl StripeIntentBackend {
    pub fn new(secret_key: &str) -> Self {
        Self {
            client: Client::new(secret_key),
        }
    }

    async fn create(
        &self,
        request: &PaymentIntentRequest,
        key: &IdempotencyKey,
    ) -> Result<PaymentIntent> {
        // Stripe replays the original response for a repeated key
        let client = self
            .client
            .clone()
            .with_strategy(RequestStrategy::Idempotent(key.to_string()));

        let mut params = CreatePaymentIntent::new(request.amount, stripe_currency(request.currency));
        params.receipt_email = Some(&request.receipt_email);
        params.payment_method_types = Some(vec!["card".to_string()]);

        let mut metadata = HashMap::new();
        metadata.insert("idempotency_key".to_string(), key.to_string());
        params.metadata = Some(metadata);

        let intent = StripePaymentIntent::create(&client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let client_secret = intent
            .client_secret
            .ok_or_else(|| PaymentError::Stripe("No client secret returned".into()))?;

        tracing::info!(
            payment_intent_id = %intent.id,
            amount = request.amount,
            currency = %request.currency,
            "Created Stripe payment intent"
        );

        Ok(PaymentIntent {
            id: intent.id.to_string(),
            client_secret,
        })
    }
}

#[async_trait]
impl PaymentIntentBackend for StripeIntentBackend {
    async fn create_intent(
        &self,
        request: &PaymentIntentRequest,
        key: &IdempotencyKey,
    ) -> checkout_core::Result<PaymentIntent> {
        Ok(self.create(request, key).await?)
    }

    fn name(&self) -> &str {
        "stripe"
    }
}

const fn stripe_currency(currency: Currency) -> StripeCurrency {
    match currency {
        Currency::Eur => StripeCurrency::EUR,
        Currency::Usd => StripeCurrency::USD,
        Currency::Gbp => StripeCurrency::GBP,
    }
}
