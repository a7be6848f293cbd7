//! Order-fulfillment orchestration.
//!
//! This crate drives the checkout saga: pull the cart, reserve
//! inventory through the reservation ledger, persist the order, clear
//! the cart (best effort), and keep the order cache coherent. It also
//! owns the follow-on operations that advance or unwind the saga:
//! payment confirmation (commits the reservation), cancellation
//! (releases it), status advances, and returns.
//!
//! Collaborating services are reached through the client traits in
//! [`clients`]; in-memory implementations back the tests, HTTP
//! implementations back production.

pub mod cache;
pub mod clients;
pub mod config;
pub mod error;
pub mod ledger;
mod orchestrator;

pub use cache::OrderCache;
pub use clients::{
    CartClient, CartItem, CartSnapshot, CartTotals, CatalogClient, ClientError, HttpCartClient,
    HttpCatalogClient, InMemoryCartClient, InMemoryCatalogClient, Product,
};
pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};
pub use ledger::{Hold, InMemoryReservationStore, ReservationLedger, ReservationStore};
pub use orchestrator::{CheckoutInput, OrderOrchestrator, PaymentData, ShipmentDetails};
