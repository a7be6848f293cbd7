//! Orchestrator error taxonomy.

use common::OrderId;
use domain::OrderError;
use order_store::StoreError;
use thiserror::Error;

use crate::clients::ClientError;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Errors surfaced by the order orchestrator.
///
/// Business rejections and infrastructure failures are distinct
/// variants so the HTTP layer can map them to 4xx versus 5xx without
/// string matching.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Checkout was attempted against an empty or missing cart.
    #[error("cart is empty")]
    EmptyCart,

    /// At least one line item lacked available stock.
    #[error("insufficient stock for one or more items")]
    InsufficientStock,

    /// The order does not exist or is not visible to the caller.
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// Every generated order number candidate collided.
    #[error("could not generate a unique order number after {attempts} attempts")]
    OrderNumberExhausted { attempts: u32 },

    /// A customer tried to cancel a confirmed order too late.
    #[error("cancellation window of {hours} hours has passed")]
    CancellationWindowExpired { hours: i64 },

    /// A domain rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] OrderError),

    /// A collaborating service failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The order store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
