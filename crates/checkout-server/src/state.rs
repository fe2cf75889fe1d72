//! Application State

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use checkout_core::{
    Backends, CheckoutOrchestrator, Currency, Directory, IdempotencyKeys, LedgerStore, MemoryCart,
};
use checkout_payments::WebhookReconciler;

/// Default idle time before a session is dropped
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Per-session carts and orchestrators
    pub sessions: Arc<SessionRegistry>,

    /// Country/state lookup
    pub directory: Arc<dyn Directory>,

    /// Attempt ledger shared by every session
    pub ledger: Arc<dyn LedgerStore>,

    /// Stripe webhook reconciler (None if no webhook secret is configured)
    pub webhooks: Option<Arc<WebhookReconciler>>,
}

/// One visitor's checkout
#[derive(Clone)]
pub struct Session {
    pub cart: Arc<MemoryCart>,
    pub orchestrator: Arc<CheckoutOrchestrator>,
    last_seen: Arc<Mutex<Instant>>,
}

impl Session {
    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// In flight or used within `timeout`
    fn is_live(&self, timeout: Duration) -> bool {
        self.orchestrator.is_busy()
            || self
                .last_seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .elapsed()
                < timeout
    }
}

/// Sessions keyed by the `x-session-id` header
pub struct SessionRegistry {
    backends: Backends,
    ledger: Arc<dyn LedgerStore>,
    idempotency_secret: String,
    currency: Currency,
    idle_timeout: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new(
        backends: Backends,
        ledger: Arc<dyn LedgerStore>,
        idempotency_secret: impl Into<String>,
        currency: Currency,
    ) -> Self {
        Self {
            backends,
            ledger,
            idempotency_secret: idempotency_secret.into(),
            currency,
            idle_timeout: DEFAULT_SESSION_IDLE,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Name of the configured intent backend
    pub fn intent_backend(&self) -> String {
        self.backends.intents.name().to_string()
    }

    /// Existing live session
    pub fn get(&self, id: &str) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let session = sessions.get(id).filter(|s| s.is_live(self.idle_timeout))?.clone();
        session.touch();
        Some(session)
    }

    /// Existing session, or a new one with an empty cart
    ///
    /// Creating a session sweeps out idle ones first.
    pub fn get_or_create(&self, id: &str) -> Session {
        if let Some(session) = self.get(id) {
            return session;
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        self.evict_idle(&mut sessions);

        let session = sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id = %id, "New checkout session");
                let cart = Arc::new(MemoryCart::new());
                let orchestrator = Arc::new(CheckoutOrchestrator::new(
                    self.backends.clone(),
                    cart.clone(),
                    self.ledger.clone(),
                    IdempotencyKeys::new(&self.idempotency_secret, id),
                    self.currency,
                ));
                Session {
                    cart,
                    orchestrator,
                    last_seen: Arc::new(Mutex::new(Instant::now())),
                }
            })
            .clone();
        session.touch();
        session
    }

    /// Drop idle sessions, returning how many went
    pub fn sweep(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        self.evict_idle(&mut sessions)
    }

    fn evict_idle(&self, sessions: &mut HashMap<String, Session>) -> usize {
        let before = sessions.len();
        sessions.retain(|_, s| s.is_live(self.idle_timeout));
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Periodically sweep idle sessions and prune settled ledger attempts
pub async fn run_maintenance(state: AppState, every: Duration, retention: Duration) {
    let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
    let mut ticker = tokio::time::interval(every);

    loop {
        ticker.tick().await;

        let evicted = state.sessions.sweep();
        let cutoff = chrono::Utc::now()
            .checked_sub_signed(retention)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);

        match state.ledger.prune(cutoff) {
            Ok(pruned) => {
                tracing::debug!(evicted, pruned, "Maintenance pass");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to prune ledger");
            }
        }
    }
}
