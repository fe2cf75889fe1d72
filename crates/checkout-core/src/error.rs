//! Error Types

use thiserror::Error;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout error types
///
/// Each remote step of the checkout protocol has its own variant so callers
/// can tell a safe-to-retry failure from one where money has already moved.
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Another submission is in flight for this checkout
    #[error("A checkout submission is already in progress")]
    Busy,

    /// Form or cart failed local validation; nothing was sent anywhere
    #[error("Validation error: {0}")]
    Validation(String),

    /// Creating the payment intent failed; no charge was made
    #[error("Payment intent error: {0}")]
    PaymentIntent(String),

    /// The payment provider declined or rejected the confirmation
    #[error("Payment confirmation error: {0}")]
    PaymentConfirmation(String),

    /// The confirmation call broke off; the charge may exist
    #[error("Payment {payment_intent_id} confirmation did not complete: {reason}")]
    PaymentStatusUnknown {
        payment_intent_id: String,
        reason: String,
    },

    /// Payment was confirmed but the order record could not be created
    #[error("Order placement failed after payment {payment_intent_id} was confirmed: {reason}")]
    OrderPlacement {
        payment_intent_id: String,
        reason: String,
    },

    /// A remote backend failed; the orchestrator attributes it to a step
    #[error("Backend error: {0}")]
    Backend(String),

    /// Cart collaborator failure
    #[error("Cart error: {0}")]
    Cart(String),

    /// Attempt ledger failure
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CheckoutError {
    /// Check if the user may simply submit again
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Busy | Self::PaymentIntent(_) | Self::PaymentConfirmation(_)
        )
    }

    /// Payment was (or may have been) taken but no order exists; needs operator follow-up
    pub const fn requires_reconciliation(&self) -> bool {
        matches!(
            self,
            Self::OrderPlacement { .. } | Self::PaymentStatusUnknown { .. }
        )
    }

    /// Payment intent the failure is tied to, when money may have moved
    pub fn payment_intent_id(&self) -> Option<&str> {
        match self {
            Self::OrderPlacement {
                payment_intent_id, ..
            }
            | Self::PaymentStatusUnknown {
                payment_intent_id, ..
            } => Some(payment_intent_id),
            _ => None,
        }
    }

    /// Stable machine-readable code
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Busy => "CHECKOUT_IN_PROGRESS",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::PaymentIntent(_) => "PAYMENT_INTENT_FAILED",
            Self::PaymentConfirmation(_) => "PAYMENT_DECLINED",
            Self::PaymentStatusUnknown { .. } => "PAYMENT_STATUS_UNKNOWN",
            Self::OrderPlacement { .. } => "ORDER_PLACEMENT_FAILED",
            Self::Backend(_) => "BACKEND_ERROR",
            Self::Cart(_) => "CART_ERROR",
            Self::Ledger(_) => "LEDGER_ERROR",
            Self::Json(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Busy => "Your order is already being processed. Please wait.".into(),
            Self::Validation(msg) => format!("Please correct the highlighted fields: {msg}"),
            Self::PaymentIntent(reason) => format!(
                "There was an error: {reason}. You have not been charged, please try again."
            ),
            Self::PaymentConfirmation(reason) => format!("There was an error: {reason}"),
            Self::PaymentStatusUnknown { reason, .. } => format!(
                "There was an error: {reason}. We could not confirm whether your card was \
                 charged; please do not pay again before checking with support."
            ),
            Self::OrderPlacement { reason, .. } => format!(
                "There was an error: {reason}. Your payment was received but we could not \
                 record your order. Our support team has been notified; please do not pay again."
            ),
            Self::Backend(reason) => format!("There was an error: {reason}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(CheckoutError::PaymentIntent("timeout".into()).is_retryable());
        assert!(CheckoutError::PaymentConfirmation("card declined".into()).is_retryable());

        let partial = CheckoutError::OrderPlacement {
            payment_intent_id: "pi_123".into(),
            reason: "502 Bad Gateway".into(),
        };
        assert!(!partial.is_retryable());
        assert!(partial.requires_reconciliation());
        assert_eq!(partial.code(), "ORDER_PLACEMENT_FAILED");
        assert_eq!(partial.payment_intent_id(), Some("pi_123"));

        let unknown = CheckoutError::PaymentStatusUnknown {
            payment_intent_id: "pi_456".into(),
            reason: "operation timed out".into(),
        };
        assert!(!unknown.is_retryable());
        assert!(unknown.requires_reconciliation());
        assert_eq!(unknown.payment_intent_id(), Some("pi_456"));
    }

    #[test]
    fn test_declined_message_carries_reason() {
        let err = CheckoutError::PaymentConfirmation("Your card was declined.".into());
        assert_eq!(err.user_message(), "There was an error: Your card was declined.");
    }

    #[test]
    fn test_remote_failures_carry_reason() {
        let intent = CheckoutError::PaymentIntent("connection refused".into());
        assert!(intent.user_message().contains("connection refused"));

        let placement = CheckoutError::OrderPlacement {
            payment_intent_id: "pi_123".into(),
            reason: "503 Service Unavailable".into(),
        };
        assert!(placement.user_message().starts_with("There was an error: 503 Service Unavailable."));
    }
}
