//! Payments Configuration

use std::sync::Arc;
use std::time::Duration;

use checkout_core::{Backends, PaymentIntentBackend};

use crate::confirm::{STRIPE_API_URL, StripeCardConfirmer};
use crate::error::{PaymentError, Result};
use crate::shop_api::ShopApiClient;
use crate::stripe_intent::StripeIntentBackend;

/// Default shop API base URL
pub const DEFAULT_SHOP_API_URL: &str = "https://localhost:8443/api";

/// Default timeout for backend requests
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Backend endpoints and credentials
#[derive(Clone)]
pub struct PaymentsConfig {
    /// Base URL of the shop REST API
    pub shop_api_url: String,

    /// Stripe API base (overridable for testing)
    pub stripe_api_url: String,

    /// Publishable key used to confirm card payments
    pub stripe_publishable_key: String,

    /// When set, intents are created directly with Stripe
    pub stripe_secret_key: Option<String>,

    /// When set, the webhook route is enabled
    pub stripe_webhook_secret: Option<String>,

    pub request_timeout: Duration,
}

impl PaymentsConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create from any variable source; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let stripe_publishable_key = var("STRIPE_PUBLISHABLE_KEY")
            .ok_or_else(|| PaymentError::Config("STRIPE_PUBLISHABLE_KEY not set".into()))?;

        let request_timeout = match var("HTTP_TIMEOUT_SECS") {
            Some(secs) => secs
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| PaymentError::Config(format!("HTTP_TIMEOUT_SECS is not a number: {secs}")))?,
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            shop_api_url: var("SHOP_API_URL").unwrap_or_else(|| DEFAULT_SHOP_API_URL.into()),
            stripe_api_url: var("STRIPE_API_URL").unwrap_or_else(|| STRIPE_API_URL.into()),
            stripe_publishable_key,
            stripe_secret_key: var("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: var("STRIPE_WEBHOOK_SECRET"),
            request_timeout,
        })
    }

    /// Build the remote backends this configuration describes
    pub fn backends(&self) -> Result<Backends> {
        let http = reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()?;

        let shop = Arc::new(ShopApiClient::new(http.clone(), &self.shop_api_url));

        let intents: Arc<dyn PaymentIntentBackend> = match &self.stripe_secret_key {
            Some(secret_key) => Arc::new(StripeIntentBackend::new(secret_key)),
            None => shop.clone(),
        };

        let confirmer = Arc::new(StripeCardConfirmer::with_api_url(
            http,
            &self.stripe_publishable_key,
            &self.stripe_api_url,
        ));

        tracing::info!(
            intent_backend = intents.name(),
            shop_api_url = %self.shop_api_url,
            "Payment backends configured"
        );

        Ok(Backends {
            intents,
            confirmer,
            orders: shop,
        })
    }
}

impl std::fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("shop_api_url", &self.shop_api_url)
            .field("stripe_api_url", &self.stripe_api_url)
            .field("stripe_secret_key", &self.stripe_secret_key.as_ref().map(|_| "***"))
            .field("stripe_webhook_secret", &self.stripe_webhook_secret.as_ref().map(|_| "***"))
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PaymentsConfig::from_lookup(lookup(&[("STRIPE_PUBLISHABLE_KEY", "pk_test_1")])).unwrap();

        assert_eq!(config.shop_api_url, DEFAULT_SHOP_API_URL);
        assert_eq!(config.stripe_api_url, STRIPE_API_URL);
        assert!(config.stripe_secret_key.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_publishable_key_required() {
        let err = PaymentsConfig::from_lookup(lookup(&[("STRIPE_PUBLISHABLE_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, PaymentError::Config(_)));
    }

    #[test]
    fn test_secret_key_selects_stripe_intents() {
        let shop = PaymentsConfig::from_lookup(lookup(&[("STRIPE_PUBLISHABLE_KEY", "pk_test_1")]))
            .unwrap()
            .backends()
            .unwrap();
        assert_eq!(shop.intents.name(), "shop-api");

        let direct = PaymentsConfig::from_lookup(lookup(&[
            ("STRIPE_PUBLISHABLE_KEY", "pk_test_1"),
            ("STRIPE_SECRET_KEY", "sk_test_1"),
        ]))
        .unwrap()
        .backends()
        .unwrap();
        assert_eq!(direct.intents.name(), "stripe");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = PaymentsConfig::from_lookup(lookup(&[
            ("STRIPE_PUBLISHABLE_KEY", "pk_test_1"),
            ("STRIPE_SECRET_KEY", "sk_live_secret"),
        ]))
        .unwrap();
        assert!(!format!("{config:?}").contains("sk_live_secret"));
    }
}
