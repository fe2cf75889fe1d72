//! Attempt Ledger
//!
//! Records every checkout attempt so that a payment confirmed without an
//! order can be found and reconciled by an operator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use crate::error::Result;
use crate::idempotency::IdempotencyKey;
use crate::model::{Currency, PaymentIntentRequest};

/// Where an attempt stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Started,
    IntentCreated,
    Confirmed,
    Placed,
    IntentFailed,
    ConfirmationFailed,

    /// Confirmation call failed in transit; the charge may or may not exist
    ConfirmationUnknown,

    PlacementFailed,
}

impl AttemptStatus {
    /// Outcome known; `ConfirmationUnknown` stays open until the provider reports
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Placed | Self::IntentFailed | Self::ConfirmationFailed | Self::PlacementFailed
        )
    }
}

/// One checkout attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attempt {
    pub id: Uuid,
    pub idempotency_key: IdempotencyKey,
    pub amount: i64,
    pub currency: Currency,
    pub receipt_email: String,
    pub status: AttemptStatus,
    pub payment_intent_id: Option<String>,
    pub tracking_number: Option<String>,
    pub failure_reason: Option<String>,

    /// Set when the provider reports the charge captured
    pub captured: bool,

    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attempt {
    pub fn new(idempotency_key: IdempotencyKey, request: &PaymentIntentRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            idempotency_key,
            amount: request.amount,
            currency: request.currency,
            receipt_email: request.receipt_email.clone(),
            status: AttemptStatus::Started,
            payment_intent_id: None,
            tracking_number: None,
            failure_reason: None,
            captured: false,
            started_at: now,
            updated_at: now,
        }
    }

    /// Money moved (or will) but no order was recorded
    pub fn needs_reconciliation(&self) -> bool {
        match self.status {
            AttemptStatus::PlacementFailed | AttemptStatus::ConfirmationUnknown => true,
            AttemptStatus::Placed => false,
            _ => self.captured,
        }
    }

    pub fn advance(&mut self, status: AttemptStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, status: AttemptStatus, reason: impl Into<String>) {
        self.failure_reason = Some(reason.into());
        self.advance(status);
    }

    /// Provider reported the charge as captured
    pub fn mark_captured(&mut self) {
        self.captured = true;
        self.updated_at = Utc::now();
    }
}

/// Ledger storage trait
pub trait LedgerStore: Send + Sync {
    /// Save or update an attempt; a stored `captured` flag is never cleared
    fn save(&self, attempt: &Attempt) -> Result<()>;

    /// Apply `change` to a stored attempt atomically
    fn update(&self, id: Uuid, change: &mut dyn FnMut(&mut Attempt)) -> Result<Option<Attempt>>;

    /// Get attempt by id
    fn get(&self, id: Uuid) -> Result<Option<Attempt>>;

    /// Get the most recent attempt for a payment intent
    fn get_by_intent(&self, payment_intent_id: &str) -> Result<Option<Attempt>>;

    /// Attempts an operator has to look at, oldest first
    fn needs_reconciliation(&self) -> Result<Vec<Attempt>>;

    /// Drop settled attempts last updated before `cutoff`, returning how many
    fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// In-memory ledger (for development and single-node deployments)
#[derive(Default)]
pub struct MemoryLedger {
    attempts: RwLock<HashMap<Uuid, Attempt>>,
    by_intent: RwLock<HashMap<String, Uuid>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedger {
    fn save(&self, attempt: &Attempt) -> Result<()> {
        let mut attempts = self.attempts.write().unwrap_or_else(PoisonError::into_inner);
        let mut by_intent = self.by_intent.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(intent_id) = &attempt.payment_intent_id {
            by_intent.insert(intent_id.clone(), attempt.id);
        }

        let mut stored = attempt.clone();
        // Captures arrive from webhooks while the orchestrator holds its own copy
        if attempts.get(&attempt.id).is_some_and(|a| a.captured) {
            stored.captured = true;
        }
        attempts.insert(attempt.id, stored);

        Ok(())
    }

    fn update(&self, id: Uuid, change: &mut dyn FnMut(&mut Attempt)) -> Result<Option<Attempt>> {
        let mut attempts = self.attempts.write().unwrap_or_else(PoisonError::into_inner);
        Ok(attempts.get_mut(&id).map(|attempt| {
            change(attempt);
            attempt.clone()
        }))
    }

    fn get(&self, id: Uuid) -> Result<Option<Attempt>> {
        let attempts = self.attempts.read().unwrap_or_else(PoisonError::into_inner);
        Ok(attempts.get(&id).cloned())
    }

    fn get_by_intent(&self, payment_intent_id: &str) -> Result<Option<Attempt>> {
        let by_intent = self.by_intent.read().unwrap_or_else(PoisonError::into_inner);
        let attempts = self.attempts.read().unwrap_or_else(PoisonError::into_inner);

        Ok(by_intent
            .get(payment_intent_id)
            .and_then(|id| attempts.get(id))
            .cloned())
    }

    fn needs_reconciliation(&self) -> Result<Vec<Attempt>> {
        let attempts = self.attempts.read().unwrap_or_else(PoisonError::into_inner);
        let mut open: Vec<Attempt> = attempts
            .values()
            .filter(|a| a.needs_reconciliation())
            .cloned()
            .collect();
        open.sort_by_key(|a| a.started_at);
        Ok(open)
    }

    fn prune(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut attempts = self.attempts.write().unwrap_or_else(PoisonError::into_inner);
        let mut by_intent = self.by_intent.write().unwrap_or_else(PoisonError::into_inner);

        let before = attempts.len();
        attempts.retain(|_, a| {
            !a.status.is_terminal() || a.needs_reconciliation() || a.updated_at >= cutoff
        });
        by_intent.retain(|_, id| attempts.contains_key(id));

        Ok(before - attempts.len())
    }
}
