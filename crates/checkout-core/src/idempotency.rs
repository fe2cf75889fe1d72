//! Idempotency Keys
//!
//! One key is shared by the intent and place calls of an attempt. Retrying
//! the same cart in the same session yields the same key, so the payment
//! provider never creates a second intent for it.
//!
//! Confirmation gets its own key per payment method: after a decline the
//! customer retries the same intent with another card, which the provider
//! must see as a new request.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::model::{OrderLineItem, PaymentIntentRequest, PaymentMethodToken};

type HmacSha256 = Hmac<Sha256>;

/// Key sent as the `Idempotency-Key` of every remote call in an attempt
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derives keys for one checkout scope (usually a session)
#[derive(Clone)]
pub struct IdempotencyKeys {
    mac: HmacSha256,
    scope: String,
}

impl IdempotencyKeys {
    pub fn new(secret: impl AsRef<[u8]>, scope: impl Into<String>) -> Self {
        let mac = HmacSha256::new_from_slice(secret.as_ref())
            .expect("HMAC accepts keys of any length");
        Self {
            mac,
            scope: scope.into(),
        }
    }

    /// Key for an attempt at checkout `generation` with this charge and these items
    pub fn derive(
        &self,
        generation: u64,
        request: &PaymentIntentRequest,
        items: &[OrderLineItem],
    ) -> IdempotencyKey {
        let mut mac = self.mac.clone();
        mac.update(self.scope.as_bytes());
        mac.update(&generation.to_be_bytes());
        mac.update(request.currency.as_str().as_bytes());
        mac.update(&request.amount.to_be_bytes());
        mac.update(request.receipt_email.as_bytes());
        for item in items {
            mac.update(&item.product_id.to_be_bytes());
            mac.update(&item.quantity.to_be_bytes());
            mac.update(item.unit_price.normalize().to_string().as_bytes());
        }

        IdempotencyKey(format!("chk_{}", hex::encode(mac.finalize().into_bytes())))
    }

    /// Key for confirming `attempt` with `payment_method`
    pub fn confirmation(
        &self,
        attempt: &IdempotencyKey,
        payment_method: &PaymentMethodToken,
    ) -> IdempotencyKey {
        let mut mac = self.mac.clone();
        mac.update(b"confirm");
        mac.update(attempt.as_str().as_bytes());
        mac.update(payment_method.as_str().as_bytes());

        IdempotencyKey(format!("cnf_{}", hex::encode(mac.finalize().into_bytes())))
    }
}

impl std::fmt::Debug for IdempotencyKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyKeys")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
