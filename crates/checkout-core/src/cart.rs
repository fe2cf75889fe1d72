//! Cart Collaborator
//!
//! The orchestrator reads the cart once per submission and clears it only
//! after an order has been placed.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// An item in the cart
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: i64,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// Point-in-time view of the cart
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
    pub total_price: Decimal,
    pub total_quantity: u32,
}

impl CartSnapshot {
    /// Build a snapshot with totals computed from the items
    pub fn from_items(items: Vec<CartItem>) -> Self {
        let total_price = items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum();
        let total_quantity = items.iter().map(|i| i.quantity).sum();

        Self {
            items,
            total_price,
            total_quantity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Cart storage trait
#[async_trait]
pub trait Cart: Send + Sync {
    /// Current items and totals
    async fn snapshot(&self) -> Result<CartSnapshot>;

    /// Empty the cart and zero its totals
    async fn clear(&self) -> Result<()>;

    /// Durably store the current cart state
    async fn persist(&self) -> Result<()>;
}

#[derive(Default)]
struct CartInner {
    current: CartSnapshot,
    persisted: Option<CartSnapshot>,
    persist_count: usize,
}

/// In-memory cart (one per session)
#[derive(Default)]
pub struct MemoryCart {
    inner: Mutex<CartInner>,
}

impl MemoryCart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<CartItem>) -> Self {
        let cart = Self::new();
        cart.replace(items);
        cart
    }

    /// Replace the cart contents, recomputing totals
    pub fn replace(&self, items: Vec<CartItem>) {
        self.lock().current = CartSnapshot::from_items(items);
    }

    /// Last state written by [`Cart::persist`]
    pub fn persisted(&self) -> Option<CartSnapshot> {
        self.lock().persisted.clone()
    }

    /// How many times the persistence hook ran
    pub fn persist_count(&self) -> usize {
        self.lock().persist_count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CartInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Cart for MemoryCart {
    async fn snapshot(&self) -> Result<CartSnapshot> {
        Ok(self.lock().current.clone())
    }

    async fn clear(&self) -> Result<()> {
        self.lock().current = CartSnapshot::default();
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.persisted = Some(inner.current.clone());
        inner.persist_count += 1;
        Ok(())
    }
}
