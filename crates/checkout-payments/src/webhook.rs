//! Stripe Webhook Reconciliation
//!
//! Processes payment intent webhook events and records captures against the
//! attempt ledger, so that a payment without an order is found even when the
//! customer's browser went away.

use std::sync::Arc;

use checkout_core::{Attempt, AttemptStatus, LedgerStore};
use serde::Serialize;
use stripe::{Event, EventObject, EventType, Webhook};

use crate::error::{PaymentError, Result};

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PaymentWebhookEvent {
    /// Charge captured
    PaymentSucceeded { payment_intent_id: String },

    /// Charge attempt failed
    PaymentFailed {
        payment_intent_id: String,
        reason: Option<String>,
    },

    /// Unhandled event type
    Other { event_type: String },
}

/// Webhook handler backed by the attempt ledger
pub struct WebhookReconciler {
    ledger: Arc<dyn LedgerStore>,
    secret: String,
}

impl WebhookReconciler {
    pub fn new(ledger: Arc<dyn LedgerStore>, secret: impl Into<String>) -> Self {
        Self {
            ledger,
            secret: secret.into(),
        }
    }

    /// Verify webhook signature and parse event
    pub fn parse_event(&self, payload: &str, signature: &str) -> Result<Event> {
        Webhook::construct_event(payload, signature, &self.secret)
            .map_err(|e| PaymentError::WebhookSignature(e.to_string()))
    }

    /// Verify, parse and apply a webhook delivery
    pub fn handle(&self, payload: &str, signature: &str) -> Result<PaymentWebhookEvent> {
        let event = self.parse_event(payload, signature)?;
        tracing::info!(event_type = ?event.type_, "Processing Stripe webhook");

        let parsed = parse_webhook_event(&event)?;
        self.apply(&parsed)?;
        Ok(parsed)
    }

    /// Record the event against the ledger
    pub fn apply(&self, event: &PaymentWebhookEvent) -> Result<()> {
        match event {
            PaymentWebhookEvent::PaymentSucceeded { payment_intent_id } => {
                let attempt = match self.ledger.get_by_intent(payment_intent_id)? {
                    Some(found) => self.ledger.update(found.id, &mut Attempt::mark_captured)?,
                    None => None,
                };
                let Some(attempt) = attempt else {
                    tracing::warn!(
                        payment_intent_id = %payment_intent_id,
                        "Captured payment intent has no recorded attempt"
                    );
                    return Ok(());
                };

                if attempt.needs_reconciliation() {
                    tracing::error!(
                        attempt_id = %attempt.id,
                        payment_intent_id = %payment_intent_id,
                        amount = attempt.amount,
                        status = ?attempt.status,
                        "Payment captured without an order"
                    );
                } else {
                    tracing::info!(
                        attempt_id = %attempt.id,
                        payment_intent_id = %payment_intent_id,
                        "Payment capture recorded"
                    );
                }
            }

            PaymentWebhookEvent::PaymentFailed {
                payment_intent_id,
                reason,
            } => {
                tracing::warn!(
                    payment_intent_id = %payment_intent_id,
                    reason = ?reason,
                    "Payment failed"
                );

                if let Some(found) = self.ledger.get_by_intent(payment_intent_id)? {
                    let reason = reason.clone().unwrap_or_else(|| "payment failed".into());
                    self.ledger.update(found.id, &mut |attempt| {
                        // Settles an unknown confirmation outcome as well
                        if !attempt.status.is_terminal() && !attempt.captured {
                            attempt.fail(AttemptStatus::ConfirmationFailed, reason.clone());
                        }
                    })?;
                }
            }

            PaymentWebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
            }
        }

        Ok(())
    }
}

/// Parse Stripe event into our event type
fn parse_webhook_event(event: &Event) -> Result<PaymentWebhookEvent> {
    match event.type_ {
        EventType::PaymentIntentSucceeded => {
            if let EventObject::PaymentIntent(intent) = &event.data.object {
                Ok(PaymentWebhookEvent::PaymentSucceeded {
                    payment_intent_id: intent.id.to_string(),
                })
            } else {
                Err(PaymentError::WebhookParse("Invalid payment intent data".into()))
            }
        }

        EventType::PaymentIntentPaymentFailed => {
            if let EventObject::PaymentIntent(intent) = &event.data.object {
                Ok(PaymentWebhookEvent::PaymentFailed {
                    payment_intent_id: intent.id.to_string(),
                    reason: intent
                        .last_payment_error
                        .as_ref()
                        .and_then(|e| e.message.clone()),
                })
            } else {
                Err(PaymentError::WebhookParse("Invalid payment intent data".into()))
            }
        }

        _ => Ok(PaymentWebhookEvent::Other {
            event_type: format!("{:?}", event.type_),
        }),
    }
}
