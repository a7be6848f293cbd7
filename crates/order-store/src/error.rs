//! Store error types.

use common::OrderId;
use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No order with the given ID exists.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The order number is already taken.
    #[error("Order number already exists: {0}")]
    DuplicateOrderNumber(String),

    /// The order was modified concurrently.
    #[error("Version conflict on order {order_id}: expected {expected}, actual {actual}")]
    VersionConflict {
        order_id: OrderId,
        expected: i64,
        actual: i64,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Order document (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
