//! Checkout Orchestrator
//!
//! Drives one submission through the remote protocol:
//!
//! ```text
//! Idle ──▶ AwaitingIntent ──▶ AwaitingConfirmation ──▶ AwaitingPlacement ──▶ Idle
//!               │                     │                       │
//!               └──── failure ────────┴──── failure ──────────┴──▶ Idle (cart intact)
//! ```
//!
//! At most one submission is in flight per orchestrator. The busy-guard is
//! released on every exit path, including a dropped future.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::backend::{OrderPlacementBackend, PaymentConfirmer, PaymentIntentBackend};
use crate::cart::Cart;
use crate::error::{CheckoutError, Result};
use crate::idempotency::IdempotencyKeys;
use crate::ledger::{Attempt, AttemptStatus, LedgerStore};
use crate::model::{
    Currency, OrderReceipt, PaymentConfirmationResult, PaymentMethodToken, Purchase,
};
use crate::validation::CheckoutForm;

/// Externally observable checkout state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    #[default]
    Idle,
    AwaitingIntent,
    AwaitingConfirmation,
    AwaitingPlacement,
}

/// The three remote steps, shared between orchestrators
#[derive(Clone)]
pub struct Backends {
    pub intents: Arc<dyn PaymentIntentBackend>,
    pub confirmer: Arc<dyn PaymentConfirmer>,
    pub orders: Arc<dyn OrderPlacementBackend>,
}

/// Holds the state machine out of `Idle` until dropped
struct BusyGuard<'a> {
    state: &'a Mutex<CheckoutState>,
}

impl BusyGuard<'_> {
    fn enter(&self, next: CheckoutState) {
        *lock(self.state) = next;
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        *lock(self.state) = CheckoutState::Idle;
    }
}

fn lock(state: &Mutex<CheckoutState>) -> MutexGuard<'_, CheckoutState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reason text without the variant prefix a backend may have added
fn failure_reason(err: CheckoutError) -> String {
    match err {
        CheckoutError::PaymentIntent(reason)
        | CheckoutError::PaymentConfirmation(reason)
        | CheckoutError::Backend(reason)
        | CheckoutError::Validation(reason) => reason,
        other => other.to_string(),
    }
}

/// Checkout orchestrator for one cart
pub struct CheckoutOrchestrator {
    backends: Backends,
    cart: Arc<dyn Cart>,
    ledger: Arc<dyn LedgerStore>,
    keys: IdempotencyKeys,
    currency: Currency,
    state: Mutex<CheckoutState>,
    generation: AtomicU64,
}

impl CheckoutOrchestrator {
    pub fn new(
        backends: Backends,
        cart: Arc<dyn Cart>,
        ledger: Arc<dyn LedgerStore>,
        keys: IdempotencyKeys,
        currency: Currency,
    ) -> Self {
        Self {
            backends,
            cart,
            ledger,
            keys,
            currency,
            state: Mutex::new(CheckoutState::Idle),
            generation: AtomicU64::new(0),
        }
    }

    /// Current state
    pub fn state(&self) -> CheckoutState {
        *lock(&self.state)
    }

    /// Whether a submission is in flight
    pub fn is_busy(&self) -> bool {
        self.state() != CheckoutState::Idle
    }

    /// Number of orders completed through this orchestrator
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Submit an already validated purchase
    pub async fn submit(
        &self,
        purchase: Purchase,
        payment_method: PaymentMethodToken,
    ) -> Result<OrderReceipt> {
        let guard = self.acquire()?;
        self.run(&guard, purchase, payment_method).await
    }

    /// Snapshot the cart, validate the form and submit
    ///
    /// The cart is read after the busy-guard is taken, so a submission that
    /// just cleared it cannot be charged twice.
    pub async fn checkout(
        &self,
        form: &CheckoutForm,
        payment_method: PaymentMethodToken,
    ) -> Result<OrderReceipt> {
        let guard = self.acquire()?;

        let cart = self.cart.snapshot().await?;
        let purchase = Purchase::from_form(form, &cart).inspect_err(|e| {
            tracing::debug!(error = %e, "Checkout form rejected");
        })?;

        self.run(&guard, purchase, payment_method).await
    }

    fn acquire(&self) -> Result<BusyGuard<'_>> {
        let mut state = lock(&self.state);
        if *state != CheckoutState::Idle {
            tracing::debug!(state = ?*state, "Rejected submission while busy");
            return Err(CheckoutError::Busy);
        }
        *state = CheckoutState::AwaitingIntent;
        Ok(BusyGuard { state: &self.state })
    }

    async fn run(
        &self,
        guard: &BusyGuard<'_>,
        purchase: Purchase,
        payment_method: PaymentMethodToken,
    ) -> Result<OrderReceipt> {
        let request = purchase.payment_intent_request(self.currency)?;
        let key = self
            .keys
            .derive(self.generation(), &request, purchase.order_items());

        let mut attempt = Attempt::new(key.clone(), &request);
        self.record(&attempt);

        tracing::info!(
            attempt_id = %attempt.id,
            amount = request.amount,
            currency = %request.currency,
            items = purchase.order_items().len(),
            "Checkout started"
        );

        // Payment intent
        let intent = match self.backends.intents.create_intent(&request, &key).await {
            Ok(intent) => intent,
            Err(e) => {
                let reason = failure_reason(e);
                attempt.fail(AttemptStatus::IntentFailed, &reason);
                self.record(&attempt);
                tracing::warn!(attempt_id = %attempt.id, reason = %reason, "Payment intent failed");
                return Err(CheckoutError::PaymentIntent(reason));
            }
        };

        attempt.payment_intent_id = Some(intent.id.clone());
        attempt.advance(AttemptStatus::IntentCreated);
        self.record(&attempt);

        // Confirmation
        guard.enter(CheckoutState::AwaitingConfirmation);
        let billing = purchase.billing_details();
        let confirm_key = self.keys.confirmation(&key, &payment_method);
        let confirmation = match self
            .backends
            .confirmer
            .confirm(&intent, &payment_method, &billing, &confirm_key)
            .await
        {
            Ok(confirmation) => confirmation,
            Err(e) => {
                let reason = failure_reason(e);
                attempt.fail(AttemptStatus::ConfirmationUnknown, &reason);
                self.record(&attempt);
                tracing::error!(
                    attempt_id = %attempt.id,
                    payment_intent_id = %intent.id,
                    reason = %reason,
                    "Payment confirmation outcome unknown; reconciliation required"
                );
                return Err(CheckoutError::PaymentStatusUnknown {
                    payment_intent_id: intent.id,
                    reason,
                });
            }
        };

        if let PaymentConfirmationResult::Failure { reason } = confirmation {
            attempt.fail(AttemptStatus::ConfirmationFailed, &reason);
            self.record(&attempt);
            tracing::warn!(
                attempt_id = %attempt.id,
                payment_intent_id = %intent.id,
                reason = %reason,
                "Payment confirmation failed"
            );
            return Err(CheckoutError::PaymentConfirmation(reason));
        }

        attempt.advance(AttemptStatus::Confirmed);
        self.record(&attempt);

        // Order placement
        guard.enter(CheckoutState::AwaitingPlacement);
        let tracking_number = match self.backends.orders.place_order(&purchase, &key).await {
            Ok(tracking_number) => tracking_number,
            Err(e) => {
                let reason = failure_reason(e);
                attempt.fail(AttemptStatus::PlacementFailed, &reason);
                self.record(&attempt);
                tracing::error!(
                    attempt_id = %attempt.id,
                    payment_intent_id = %intent.id,
                    amount = request.amount,
                    reason = %reason,
                    "Payment confirmed but order placement failed; reconciliation required"
                );
                return Err(CheckoutError::OrderPlacement {
                    payment_intent_id: intent.id,
                    reason,
                });
            }
        };

        attempt.tracking_number = Some(tracking_number.clone());
        attempt.advance(AttemptStatus::Placed);
        self.record(&attempt);
        self.generation.fetch_add(1, Ordering::SeqCst);

        self.reset_cart().await;

        tracing::info!(
            attempt_id = %attempt.id,
            tracking_number = %tracking_number,
            "Order placed"
        );

        Ok(OrderReceipt {
            tracking_number,
            payment_intent_id: intent.id,
            amount: request.amount,
            currency: request.currency,
        })
    }

    /// The order exists at this point; a cart failure must not turn it into an error
    async fn reset_cart(&self) {
        if let Err(e) = self.cart.clear().await {
            tracing::warn!(error = %e, "Failed to clear cart after order");
            return;
        }
        if let Err(e) = self.cart.persist().await {
            tracing::warn!(error = %e, "Failed to persist cleared cart");
        }
    }

    fn record(&self, attempt: &Attempt) {
        if let Err(e) = self.ledger.save(attempt) {
            tracing::warn!(attempt_id = %attempt.id, error = %e, "Failed to record checkout attempt");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{CartItem, MemoryCart};
    use crate::idempotency::IdempotencyKey;
    use crate::ledger::MemoryLedger;
    use crate::model::{BillingDetails, OrderPlacementResult, PaymentIntent, PaymentIntentRequest};
    use crate::validation::tests::valid_form;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MockIntents {
        fail: Mutex<Option<String>>,
        gate: Option<Arc<Notify>>,
        requests: Mutex<Vec<(PaymentIntentRequest, IdempotencyKey)>>,
    }

    impl MockIntents {
        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn keys(&self) -> Vec<IdempotencyKey> {
            self.requests.lock().unwrap().iter().map(|(_, k)| k.clone()).collect()
        }
    }

    #[async_trait]
    impl PaymentIntentBackend for MockIntents {
        async fn create_intent(
            &self,
            request: &PaymentIntentRequest,
            key: &IdempotencyKey,
        ) -> Result<PaymentIntent> {
            self.requests.lock().unwrap().push((request.clone(), key.clone()));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(reason) = self.fail.lock().unwrap().clone() {
                return Err(CheckoutError::PaymentIntent(reason));
            }
            Ok(PaymentIntent::from_client_secret("pi_test_secret_abc"))
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    #[derive(Default)]
    struct MockConfirmer {
        decline: Mutex<Option<String>>,
        transport_error: Option<String>,
        /// Ledger a capture webhook lands in while the call is in flight
        webhook_ledger: Mutex<Option<Arc<MemoryLedger>>>,
        requests: Mutex<Vec<(String, IdempotencyKey)>>,
        billing: Mutex<Option<BillingDetails>>,
    }

    impl MockConfirmer {
        fn calls(&self) -> Vec<(String, IdempotencyKey)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PaymentConfirmer for MockConfirmer {
        async fn confirm(
            &self,
            intent: &PaymentIntent,
            payment_method: &PaymentMethodToken,
            billing: &BillingDetails,
            key: &IdempotencyKey,
        ) -> Result<PaymentConfirmationResult> {
            assert_eq!(intent.id, "pi_test");
            self.requests
                .lock()
                .unwrap()
                .push((payment_method.as_str().to_string(), key.clone()));
            *self.billing.lock().unwrap() = Some(billing.clone());

            let ledger = self.webhook_ledger.lock().unwrap().clone();
            if let Some(ledger) = ledger {
                let attempt = ledger.get_by_intent(&intent.id).unwrap().unwrap();
                ledger.update(attempt.id, &mut |a| a.mark_captured()).unwrap();
            }

            if let Some(reason) = &self.transport_error {
                return Err(CheckoutError::Backend(reason.clone()));
            }

            Ok(match self.decline.lock().unwrap().clone() {
                Some(reason) => PaymentConfirmationResult::Failure { reason },
                None => PaymentConfirmationResult::Success,
            })
        }
    }

    #[derive(Default)]
    struct MockOrders {
        fail: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OrderPlacementBackend for MockOrders {
        async fn place_order(&self, _purchase: &Purchase, _key: &IdempotencyKey) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail {
                Some(reason) => Err(CheckoutError::Backend(reason.clone())),
                None => Ok("TRK123".into()),
            }
        }
    }

    struct Fixture {
        intents: Arc<MockIntents>,
        confirmer: Arc<MockConfirmer>,
        orders: Arc<MockOrders>,
        cart: Arc<MemoryCart>,
        ledger: Arc<MemoryLedger>,
        orchestrator: Arc<CheckoutOrchestrator>,
    }

    fn items() -> Vec<CartItem> {
        vec![
            CartItem {
                product_id: 1,
                name: "Coffee Mug".into(),
                image_url: Some("assets/images/products/mug.png".into()),
                unit_price: dec!(12.50),
                quantity: 2,
            },
            CartItem {
                product_id: 2,
                name: "Notebook".into(),
                image_url: None,
                unit_price: dec!(20.99),
                quantity: 1,
            },
        ]
    }

    fn fixture(intents: MockIntents, confirmer: MockConfirmer, orders: MockOrders) -> Fixture {
        let intents = Arc::new(intents);
        let confirmer = Arc::new(confirmer);
        let orders = Arc::new(orders);
        let cart = Arc::new(MemoryCart::with_items(items()));
        let ledger = Arc::new(MemoryLedger::new());

        let orchestrator = Arc::new(CheckoutOrchestrator::new(
            Backends {
                intents: intents.clone(),
                confirmer: confirmer.clone(),
                orders: orders.clone(),
            },
            cart.clone(),
            ledger.clone(),
            IdempotencyKeys::new("test-secret", "session-1"),
            Currency::Eur,
        ));

        Fixture {
            intents,
            confirmer,
            orders,
            cart,
            ledger,
            orchestrator,
        }
    }

    fn token() -> PaymentMethodToken {
        PaymentMethodToken::new("tok_visa")
    }

    async fn cart_total(cart: &MemoryCart) -> Decimal {
        cart.snapshot().await.unwrap().total_price
    }

    #[tokio::test]
    async fn test_full_success_clears_cart() {
        let f = fixture(MockIntents::default(), MockConfirmer::default(), MockOrders::default());

        let receipt = f.orchestrator.checkout(&valid_form(), token()).await.unwrap();

        assert_eq!(receipt.tracking_number, "TRK123");
        assert_eq!(receipt.amount, 4599);
        assert_eq!(receipt.payment_intent_id, "pi_test");

        let snapshot = f.cart.snapshot().await.unwrap();
        assert!(snapshot.items.is_empty());
        assert_eq!(snapshot.total_price, Decimal::ZERO);
        assert_eq!(snapshot.total_quantity, 0);
        assert_eq!(f.cart.persist_count(), 1);

        assert!(!f.orchestrator.is_busy());
        assert_eq!(f.orchestrator.generation(), 1);
        assert!(f.ledger.needs_reconciliation().unwrap().is_empty());

        let billing = f.confirmer.billing.lock().unwrap().clone().unwrap();
        assert_eq!(billing.country, "US");
        assert_eq!(billing.state, "California");
    }

    #[tokio::test]
    async fn test_amount_is_rounded_cart_total() {
        let f = fixture(MockIntents::default(), MockConfirmer::default(), MockOrders::default());
        f.cart.replace(vec![CartItem {
            product_id: 3,
            name: "Sticker".into(),
            image_url: None,
            unit_price: dec!(0.335),
            quantity: 3,
        }]);

        f.orchestrator.checkout(&valid_form(), token()).await.unwrap();

        let (request, _) = f.intents.requests.lock().unwrap()[0].clone();
        assert_eq!(request.amount, 101);
        assert_eq!(request.currency, Currency::Eur);
        assert_eq!(request.receipt_email, "jane.doe@example.com");
    }

    #[tokio::test]
    async fn test_intent_failure_leaves_cart() {
        let intents = MockIntents {
            fail: Mutex::new(Some("connection refused".into())),
            ..Default::default()
        };
        let f = fixture(intents, MockConfirmer::default(), MockOrders::default());

        let err = f.orchestrator.checkout(&valid_form(), token()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::PaymentIntent(ref r) if r == "connection refused"));
        assert!(!f.orchestrator.is_busy());
        assert_eq!(cart_total(&f.cart).await, dec!(45.99));
        assert_eq!(f.cart.persist_count(), 0);
        assert!(f.confirmer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_declined_card_never_places_order() {
        let confirmer = MockConfirmer {
            decline: Mutex::new(Some("Your card was declined.".into())),
            ..Default::default()
        };
        let f = fixture(MockIntents::default(), confirmer, MockOrders::default());

        let err = f.orchestrator.checkout(&valid_form(), token()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::PaymentConfirmation(ref r) if r == "Your card was declined."));
        assert!(err.is_retryable());
        assert_eq!(f.orders.calls.load(Ordering::SeqCst), 0);
        assert!(!f.orchestrator.is_busy());
        assert_eq!(cart_total(&f.cart).await, dec!(45.99));
    }

    #[tokio::test]
    async fn test_placement_failure_flags_reconciliation() {
        let orders = MockOrders {
            fail: Some("503 Service Unavailable".into()),
            ..Default::default()
        };
        let f = fixture(MockIntents::default(), MockConfirmer::default(), orders);

        let err = f.orchestrator.checkout(&valid_form(), token()).await.unwrap_err();

        assert!(err.requires_reconciliation());
        assert!(matches!(
            err,
            CheckoutError::OrderPlacement { ref payment_intent_id, .. } if payment_intent_id == "pi_test"
        ));
        assert!(!f.orchestrator.is_busy());
        assert_eq!(cart_total(&f.cart).await, dec!(45.99));

        let open = f.ledger.needs_reconciliation().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].payment_intent_id.as_deref(), Some("pi_test"));
        assert_eq!(open[0].status, AttemptStatus::PlacementFailed);
    }

    #[tokio::test]
    async fn test_second_submission_rejected_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let intents = MockIntents {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        let f = fixture(intents, MockConfirmer::default(), MockOrders::default());
        let form = valid_form();

        let first = f.orchestrator.checkout(&form, token());
        let second = async {
            let result = f.orchestrator.checkout(&form, token()).await;
            gate.notify_one();
            result
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap().tracking_number, "TRK123");
        assert!(matches!(second, Err(CheckoutError::Busy)));
        assert_eq!(f.intents.calls(), 1);
        assert_eq!(f.orders.calls.load(Ordering::SeqCst), 1);
        assert!(!f.orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_state_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let intents = MockIntents {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        let f = fixture(intents, MockConfirmer::default(), MockOrders::default());

        let orchestrator = f.orchestrator.clone();
        let task = tokio::spawn(async move {
            orchestrator.checkout(&valid_form(), token()).await
        });

        while f.intents.calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(f.orchestrator.state(), CheckoutState::AwaitingIntent);
        assert!(f.orchestrator.is_busy());

        gate.notify_one();
        task.await.unwrap().unwrap();
        assert_eq!(f.orchestrator.state(), CheckoutState::Idle);
    }

    #[tokio::test]
    async fn test_amount_fixed_at_submission() {
        let gate = Arc::new(Notify::new());
        let intents = MockIntents {
            gate: Some(gate.clone()),
            ..Default::default()
        };
        let f = fixture(intents, MockConfirmer::default(), MockOrders::default());

        let orchestrator = f.orchestrator.clone();
        let task = tokio::spawn(async move {
            orchestrator.checkout(&valid_form(), token()).await
        });

        while f.intents.calls() == 0 {
            tokio::task::yield_now().await;
        }
        f.cart.replace(vec![CartItem {
            product_id: 9,
            name: "Laptop".into(),
            image_url: None,
            unit_price: dec!(999.00),
            quantity: 1,
        }]);
        gate.notify_one();

        let receipt = task.await.unwrap().unwrap();
        assert_eq!(receipt.amount, 4599);
    }

    #[tokio::test]
    async fn test_invalid_form_makes_no_remote_call() {
        let f = fixture(MockIntents::default(), MockConfirmer::default(), MockOrders::default());
        let mut form = valid_form();
        form.customer.email = "not-an-email".into();

        let err = f.orchestrator.checkout(&form, token()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Validation(_)));
        assert_eq!(f.intents.calls(), 0);
        assert!(!f.orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_retry_reuses_idempotency_key() {
        let intents = MockIntents {
            fail: Mutex::new(Some("timeout".into())),
            ..Default::default()
        };
        let f = fixture(intents, MockConfirmer::default(), MockOrders::default());

        assert!(f.orchestrator.checkout(&valid_form(), token()).await.is_err());
        *f.intents.fail.lock().unwrap() = None;
        f.orchestrator.checkout(&valid_form(), token()).await.unwrap();

        f.cart.replace(items());
        f.orchestrator.checkout(&valid_form(), token()).await.unwrap();

        let keys = f.intents.keys();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
    }

    #[tokio::test]
    async fn test_retry_with_another_card_after_decline() {
        let confirmer = MockConfirmer {
            decline: Mutex::new(Some("Your card was declined.".into())),
            ..Default::default()
        };
        let f = fixture(MockIntents::default(), confirmer, MockOrders::default());

        let err = f
            .orchestrator
            .checkout(&valid_form(), PaymentMethodToken::new("tok_declined"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::PaymentConfirmation(_)));

        *f.confirmer.decline.lock().unwrap() = None;
        let receipt = f.orchestrator.checkout(&valid_form(), token()).await.unwrap();
        assert_eq!(receipt.tracking_number, "TRK123");

        // Same intent, separate confirmation per card
        let intent_keys = f.intents.keys();
        assert_eq!(intent_keys[0], intent_keys[1]);

        let confirmations = f.confirmer.calls();
        assert_eq!(confirmations.len(), 2);
        assert_eq!(confirmations[0].0, "tok_declined");
        assert_eq!(confirmations[1].0, "tok_visa");
        assert_ne!(confirmations[0].1, confirmations[1].1);
        assert_ne!(confirmations[1].1, intent_keys[1]);
        assert_eq!(f.orders.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_confirmation_transport_error_is_unknown_outcome() {
        let confirmer = MockConfirmer {
            transport_error: Some("HTTP error: operation timed out".into()),
            ..Default::default()
        };
        let f = fixture(MockIntents::default(), confirmer, MockOrders::default());

        let err = f.orchestrator.checkout(&valid_form(), token()).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::PaymentStatusUnknown { ref payment_intent_id, ref reason }
                if payment_intent_id == "pi_test" && reason.contains("timed out")
        ));
        assert!(!err.is_retryable());
        assert!(err.requires_reconciliation());
        assert_eq!(f.orders.calls.load(Ordering::SeqCst), 0);
        assert!(!f.orchestrator.is_busy());
        assert_eq!(cart_total(&f.cart).await, dec!(45.99));

        let open = f.ledger.needs_reconciliation().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].status, AttemptStatus::ConfirmationUnknown);
    }

    #[tokio::test]
    async fn test_capture_during_confirmation_survives() {
        let confirmer = MockConfirmer {
            transport_error: Some("HTTP error: operation timed out".into()),
            ..Default::default()
        };
        let f = fixture(MockIntents::default(), confirmer, MockOrders::default());
        *f.confirmer.webhook_ledger.lock().unwrap() = Some(f.ledger.clone());

        assert!(f.orchestrator.checkout(&valid_form(), token()).await.is_err());

        let attempt = f.ledger.get_by_intent("pi_test").unwrap().unwrap();
        assert!(attempt.captured);
        assert_eq!(attempt.status, AttemptStatus::ConfirmationUnknown);
        assert_eq!(f.ledger.needs_reconciliation().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_outcome() {
        let f = fixture(MockIntents::default(), MockConfirmer::default(), MockOrders::default());
        let cart = f.cart.snapshot().await.unwrap();
        let purchase = Purchase::from_form(&valid_form(), &cart).unwrap();

        let outcome = OrderPlacementResult::from(f.orchestrator.submit(purchase, token()).await);
        assert_eq!(
            outcome,
            OrderPlacementResult::Success {
                tracking_number: "TRK123".into()
            }
        );
    }
}
