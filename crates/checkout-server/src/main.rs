//! storefront-checkout HTTP Server
//!
//! Axum-based server exposing the checkout flow, the address and card
//! expiration lookups, and Stripe webhook reconciliation.

mod config;
mod handlers;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout_core::{LedgerStore, MemoryLedger, StaticDirectory};
use checkout_payments::{PaymentsConfig, WebhookReconciler};

use crate::config::ServerConfig;
use crate::handlers::{
    card_months, card_years, checkout_status, get_cart, health_check, list_countries,
    list_states, purchase, put_cart, reconciliation, stripe_webhook,
};
use crate::state::{AppState, SessionRegistry, run_maintenance};

/// How often idle sessions and settled attempts are cleaned up
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;
    let payments = PaymentsConfig::from_env()?;
    tracing::debug!(?config, ?payments, "Loaded configuration");

    let backends = payments.backends()?;
    let ledger: Arc<dyn LedgerStore> = Arc::new(MemoryLedger::new());

    let webhooks = payments
        .stripe_webhook_secret
        .as_ref()
        .map(|secret| Arc::new(WebhookReconciler::new(ledger.clone(), secret)));

    if webhooks.is_some() {
        tracing::info!("✓ Stripe webhooks configured");
    } else {
        tracing::warn!("⚠ Stripe webhooks not configured - captures will not be reconciled");
        tracing::warn!("  Set STRIPE_WEBHOOK_SECRET in .env");
    }

    let state = AppState {
        sessions: Arc::new(SessionRegistry::new(
            backends,
            ledger.clone(),
            config.idempotency_secret.clone(),
            config.currency,
        )
        .with_idle_timeout(config.session_idle_timeout)),
        directory: Arc::new(StaticDirectory::embedded()?),
        ledger,
        webhooks,
    };

    tokio::spawn(run_maintenance(
        state.clone(),
        MAINTENANCE_INTERVAL,
        config.ledger_retention,
    ));

    let app = router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🛒 storefront-checkout running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Charging in {}", config.currency);
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                     - Health check");
    tracing::info!("  GET  /api/countries              - Countries");
    tracing::info!("  GET  /api/countries/{{code}}/states - States of a country");
    tracing::info!("  GET  /api/card/years             - Card expiration years");
    tracing::info!("  GET  /api/card/months?year=      - Card expiration months");
    tracing::info!("  GET  /api/cart                   - Session cart");
    tracing::info!("  PUT  /api/cart                   - Replace cart items");
    tracing::info!("  GET  /api/checkout/status        - Checkout state");
    tracing::info!("  POST /api/checkout/purchase      - Place order");
    tracing::info!("  GET  /api/admin/reconciliation   - Payments without orders");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router
fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))

        // Lookups
        .route("/api/countries", get(list_countries))
        .route("/api/countries/{code}/states", get(list_states))
        .route("/api/card/years", get(card_years))
        .route("/api/card/months", get(card_months))

        // Checkout
        .route("/api/cart", get(get_cart).put(put_cart))
        .route("/api/checkout/status", get(checkout_status))
        .route("/api/checkout/purchase", post(purchase))

        // Operations
        .route("/api/admin/reconciliation", get(reconciliation))
        .route("/webhook/stripe", post(stripe_webhook))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
