//! Server Configuration

use std::time::Duration;

use anyhow::{Context, bail};
use checkout_core::Currency;

/// Default listen address
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Sessions untouched this long are dropped
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

/// Settled ledger attempts are kept this long
pub const DEFAULT_LEDGER_RETENTION_HOURS: u64 = 7 * 24;

/// Process-level settings
#[derive(Clone)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// Currency every checkout is charged in
    pub currency: Currency,

    /// HMAC key for idempotency keys; must be stable across restarts for
    /// retries to dedupe after a crash
    pub idempotency_secret: String,

    pub session_idle_timeout: Duration,
    pub ledger_retention: Duration,
}

impl ServerConfig {
    /// Create from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let currency = match var("CHECKOUT_CURRENCY") {
            Some(code) => Currency::parse(&code)
                .with_context(|| format!("CHECKOUT_CURRENCY {code} is not supported"))?,
            None => Currency::default(),
        };

        let idempotency_secret = if let Some(secret) = var("IDEMPOTENCY_SECRET") {
            if secret.len() < 16 {
                bail!("IDEMPOTENCY_SECRET must be at least 16 characters");
            }
            secret
        } else {
            tracing::warn!("⚠ IDEMPOTENCY_SECRET not set - generated a per-process secret");
            tracing::warn!("  Retries will not dedupe across restarts");
            format!(
                "{}{}",
                uuid::Uuid::new_v4().simple(),
                uuid::Uuid::new_v4().simple()
            )
        };

        let seconds = |name: &str, default: u64, unit: u64| -> anyhow::Result<Duration> {
            let value = match var(name) {
                Some(raw) => raw
                    .parse::<u64>()
                    .with_context(|| format!("{name} must be a whole number"))?,
                None => default,
            };
            if value == 0 {
                bail!("{name} must be greater than zero");
            }
            Ok(Duration::from_secs(value.saturating_mul(unit)))
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            currency,
            idempotency_secret,
            session_idle_timeout: seconds("SESSION_IDLE_SECS", DEFAULT_SESSION_IDLE_SECS, 1)?,
            ledger_retention: seconds(
                "LEDGER_RETENTION_HOURS",
                DEFAULT_LEDGER_RETENTION_HOURS,
                60 * 60,
            )?,
        })
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("currency", &self.currency)
            .field("session_idle_timeout", &self.session_idle_timeout)
            .field("ledger_retention", &self.ledger_retention)
            .finish_non_exhaustive()
    }
}
