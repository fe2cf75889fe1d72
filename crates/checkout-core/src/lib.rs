//! # checkout-core
//!
//! Checkout orchestration for the storefront: form validation, order model,
//! card expiration choices and the busy-guarded payment/order state machine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     CheckoutOrchestrator                          │
//! │  ┌────────────┐  ┌──────────────────┐  ┌──────────────────────┐  │
//! │  │ Validation │  │  State machine   │  │  Backends (Strategy) │  │
//! │  │  Purchase  │──│  + busy-guard    │──│  intent / confirm /  │  │
//! │  └────────────┘  └──────────────────┘  │  place order         │  │
//! │        │                  │            └──────────────────────┘  │
//! │      Cart          LedgerStore + IdempotencyKeys                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Remote steps are traits so the HTTP, Stripe and test implementations
//! plug in without touching the state machine.

pub mod address;
pub mod backend;
pub mod cart;
pub mod directory;
pub mod error;
pub mod idempotency;
pub mod ledger;
pub mod model;
pub mod orchestrator;
pub mod period;
pub mod validation;

pub use address::{Address, AddressForm, Region};
pub use backend::{OrderPlacementBackend, PaymentConfirmer, PaymentIntentBackend};
pub use cart::{Cart, CartItem, CartSnapshot, MemoryCart};
pub use directory::{Directory, StaticDirectory};
pub use error::{CheckoutError, Result};
pub use idempotency::{IdempotencyKey, IdempotencyKeys};
pub use ledger::{Attempt, AttemptStatus, LedgerStore, MemoryLedger};
pub use model::{
    BillingDetails, Currency, OrderDraft, OrderLineItem, OrderPlacementResult, OrderReceipt,
    PaymentConfirmationResult, PaymentIntent, PaymentIntentRequest, PaymentMethodToken, Purchase,
};
pub use orchestrator::{Backends, CheckoutOrchestrator, CheckoutState};
pub use validation::{CheckoutForm, CustomerInfo};
