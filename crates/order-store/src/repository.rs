//! Repository trait for order persistence.

use async_trait::async_trait;
use common::{Money, OrderId, UserId};
use domain::Order;
use serde::{Deserialize, Serialize};

use crate::query::{ListQuery, Page};
use crate::Result;

/// Aggregate figures over a user's order history.
///
/// `total_spent` sums the order totals of everything the user did not
/// cancel; delivered and cancelled counts break the total down for the
/// account page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStats {
    pub total_orders: u64,
    pub total_spent: Money,
    pub delivered_orders: u64,
    pub cancelled_orders: u64,
}

/// Durable storage for orders.
///
/// Writes are versioned: [`OrderRepository::update`] succeeds only when
/// the stored version matches the one the caller loaded, so two racing
/// mutations of the same order (confirm-payment vs. cancel) cannot both
/// win. Orders are never deleted; terminal states stay for audit.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a freshly created order at version 1.
    ///
    /// Fails with [`crate::StoreError::DuplicateOrderNumber`] if the
    /// order number is taken.
    async fn insert(&self, order: &Order) -> Result<Order>;

    /// Persists a mutated order, bumping its version.
    ///
    /// Fails with [`crate::StoreError::VersionConflict`] when the
    /// stored version differs from `order.version()`.
    async fn update(&self, order: &Order) -> Result<Order>;

    /// Loads an order by ID.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>>;

    /// Loads an order by ID, scoped to its owner.
    async fn find_for_user(&self, id: OrderId, user_id: UserId) -> Result<Option<Order>>;

    /// Loads an order by its human-readable number.
    async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>>;

    /// Returns true if an order with this number exists.
    async fn order_number_exists(&self, order_number: &str) -> Result<bool>;

    /// Lists a user's orders with filtering, sorting, and pagination.
    ///
    /// The page counts are computed from the same filter as the items.
    async fn list_for_user(&self, user_id: UserId, query: &ListQuery) -> Result<Page<Order>>;

    /// Aggregates a user's order history into [`OrderStats`].
    async fn stats_for_user(&self, user_id: UserId) -> Result<OrderStats>;
}
