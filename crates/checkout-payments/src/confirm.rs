//! Card Payment Confirmation
//!
//! Confirms a payment intent with a tokenized card, the way Stripe.js does
//! from the browser: publishable key plus the intent's client secret.
//! Next actions (3-D Secure) are not handled; an intent that needs one is
//! reported as a failure.

use async_trait::async_trait;
use checkout_core::{
    BillingDetails, IdempotencyKey, PaymentConfirmationResult, PaymentConfirmer, PaymentIntent,
    PaymentMethodToken,
};
use serde::Deserialize;

use crate::error::{PaymentError, Result};
use crate::shop_api::IDEMPOTENCY_HEADER;

/// Default Stripe API base
pub const STRIPE_API_URL: &str = "https://api.stripe.com/v1";

#[derive(Debug, Deserialize)]
struct ConfirmResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<StripeErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Stripe confirmation using the publishable key
#[derive(Clone)]
pub struct StripeCardConfirmer {
    http: reqwest::Client,
    api_url: String,
    publishable_key: String,
}

impl StripeCardConfirmer {
    pub fn new(http: reqwest::Client, publishable_key: impl Into<String>) -> Self {
        Self::with_api_url(http, publishable_key, STRIPE_API_URL)
    }

    pub fn with_api_url(
        http: reqwest::Client,
        publishable_key: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            publishable_key: publishable_key.into(),
        }
    }

    async fn post_confirm(
        &self,
        intent: &PaymentIntent,
        payment_method: &PaymentMethodToken,
        billing: &BillingDetails,
        key: &IdempotencyKey,
    ) -> Result<PaymentConfirmationResult> {
        let url = format!("{}/payment_intents/{}/confirm", self.api_url, intent.id);

        let form = [
            ("client_secret", intent.client_secret.as_str()),
            ("payment_method_data[type]", "card"),
            ("payment_method_data[card][token]", payment_method.as_str()),
            ("payment_method_data[billing_details][name]", billing.name.as_str()),
            ("payment_method_data[billing_details][email]", billing.email.as_str()),
            ("payment_method_data[billing_details][address][line1]", billing.line1.as_str()),
            ("payment_method_data[billing_details][address][city]", billing.city.as_str()),
            ("payment_method_data[billing_details][address][state]", billing.state.as_str()),
            (
                "payment_method_data[billing_details][address][postal_code]",
                billing.postal_code.as_str(),
            ),
            ("payment_method_data[billing_details][address][country]", billing.country.as_str()),
        ];

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.publishable_key)
            .header(IDEMPOTENCY_HEADER, key.as_str())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body: Option<ConfirmResponse> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let error = body.and_then(|b| b.error);
            return match error {
                Some(StripeErrorBody { message, code }) if status.is_client_error() => {
                    tracing::debug!(code = ?code, "Stripe rejected confirmation");
                    Ok(PaymentConfirmationResult::Failure {
                        reason: message.unwrap_or_else(|| "Your payment could not be confirmed.".into()),
                    })
                }
                _ => Err(PaymentError::Api {
                    status: status.as_u16(),
                    message: status.canonical_reason().unwrap_or("request failed").to_string(),
                }),
            };
        }

        let status = body
            .and_then(|b| b.status)
            .ok_or_else(|| PaymentError::Stripe("No payment intent status returned".into()))?;

        Ok(interpret_status(&status))
    }
}

/// Map a Stripe payment intent status to an outcome
fn interpret_status(status: &str) -> PaymentConfirmationResult {
    match status {
        "succeeded" | "requires_capture" | "processing" => PaymentConfirmationResult::Success,
        "requires_action" => PaymentConfirmationResult::Failure {
            reason: "additional authentication required".into(),
        },
        other => PaymentConfirmationResult::Failure {
            reason: format!("unexpected payment status: {other}"),
        },
    }
}

#[async_trait]
impl PaymentConfirmer for StripeCardConfirmer {
    async fn confirm(
        &self,
        intent: &PaymentIntent,
        payment_method: &PaymentMethodToken,
        billing: &BillingDetails,
        key: &IdempotencyKey,
    ) -> checkout_core::Result<PaymentConfirmationResult> {
        let result = match self.post_confirm(intent, payment_method, billing, key).await {
            Ok(result) => result,
            // A definite rejection means no charge; anything else leaves the outcome open
            Err(e) if !e.is_retryable() => PaymentConfirmationResult::Failure {
                reason: e.to_string(),
            },
            Err(e) => return Err(e.into()),
        };

        match &result {
            PaymentConfirmationResult::Success => {
                tracing::info!(payment_intent_id = %intent.id, "Card payment confirmed");
            }
            PaymentConfirmationResult::Failure { reason } => {
                tracing::info!(payment_intent_id = %intent.id, reason = %reason, "Card payment not confirmed");
            }
        }

        Ok(result)
    }
}
