//! Order persistence layer.
//!
//! Exposes the [`OrderRepository`] trait with two backends: an
//! in-memory store for tests and local development, and a PostgreSQL
//! store that keeps the order document as JSONB next to the columns the
//! listing queries filter and sort on. Both enforce order-number
//! uniqueness and optimistic version checks, which is what serializes a
//! concurrent confirm-payment and cancel on the same order.

mod error;
mod memory;
mod postgres;
mod query;
mod repository;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderRepository;
pub use postgres::PostgresOrderRepository;
pub use query::{ListQuery, Page, SortField, SortOrder};
pub use repository::{OrderRepository, OrderStats};
