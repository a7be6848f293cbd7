//! Shared types used across the order workflow crates.

mod identity;
mod money;
mod types;

pub use identity::{Identity, SessionId};
pub use money::Money;
pub use types::{OrderId, ProductId, UserId, VariantId};
