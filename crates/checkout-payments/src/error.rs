//! Payment Error Types

use checkout_core::CheckoutError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Transport failure talking to a backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Attempt ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] CheckoutError),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Stripe(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::Stripe(_) | Self::Http(_) | Self::Api { .. } => {
                "Payment processing failed. Please try again."
            }
            Self::WebhookSignature(_) | Self::WebhookParse(_) => "Invalid webhook request.",
            Self::Config(_) => "Service configuration error.",
            Self::Ledger(_) => "An error occurred processing your request.",
        }
    }
}

/// Backends report failures generically; the orchestrator attributes them to a step
impl From<PaymentError> for CheckoutError {
    fn from(err: PaymentError) -> Self {
        Self::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let unavailable = PaymentError::Api {
            status: 503,
            message: "down".into(),
        };
        let rejected = PaymentError::Api {
            status: 400,
            message: "bad request".into(),
        };
        assert!(unavailable.is_retryable());
        assert!(!rejected.is_retryable());
        assert!(!PaymentError::Config("missing".into()).is_retryable());
    }

    #[test]
    fn test_into_checkout_error() {
        let err: CheckoutError = PaymentError::Api {
            status: 502,
            message: "Bad Gateway".into(),
        }
        .into();
        assert!(matches!(err, CheckoutError::Backend(ref m) if m.contains("Bad Gateway")));
    }
}
