//! # checkout-payments
//!
//! Remote backends for the checkout orchestrator.
//!
//! ## Payment flow
//!
//! ```text
//! ┌──────────────┐  intent   ┌──────────────┐  confirm  ┌──────────────┐
//! │ Orchestrator │──────────▶│  Shop API or │──────────▶│    Stripe    │
//! │              │           │    Stripe    │           │ (pk + secret)│
//! │              │◀──────────┴──────────────┘           └──────────────┘
//! │              │  purchase ┌──────────────┐
//! │              │──────────▶│   Shop API   │──▶ orderTrackingNumber
//! └──────────────┘           └──────────────┘
//!                                   ▲
//!          Stripe webhook ──────────┘ WebhookReconciler marks captures
//! ```
//!
//! Every call of one attempt carries the same `Idempotency-Key`, so a retry
//! after a timeout cannot create a second intent or a second order.
//!
//! ## Backends
//!
//! - [`ShopApiClient`]: `POST /checkout/payment-intent` and `POST /checkout/purchase`
//! - [`StripeIntentBackend`]: creates intents with the secret key when configured
//! - [`StripeCardConfirmer`]: confirms with the publishable key and client secret
//!
//! ## Usage
//!
//! ```rust,ignore
//! use checkout_payments::PaymentsConfig;
//!
//! let config = PaymentsConfig::from_env()?;
//! let backends = config.backends()?;
//! ```

mod config;
mod confirm;
mod error;
mod shop_api;
mod stripe_intent;
mod webhook;

pub use config::{DEFAULT_SHOP_API_URL, PaymentsConfig};
pub use confirm::{STRIPE_API_URL, StripeCardConfirmer};
pub use error::{PaymentError, Result};
pub use shop_api::{IDEMPOTENCY_HEADER, ShopApiClient};
pub use stripe_intent::StripeIntentBackend;
pub use webhook::{PaymentWebhookEvent, WebhookReconciler};
