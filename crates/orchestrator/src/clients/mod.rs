//! Clients for the collaborating services.
//!
//! One trait per collaborator, one place per client for timeout and
//! error-taxonomy mapping. Connectivity failures surface as
//! [`ClientError::Unavailable`] so callers can tell "retry later" from
//! a business-rule rejection.

mod cart;
mod catalog;

pub use cart::{CartClient, CartItem, CartSnapshot, CartTotals, HttpCartClient, InMemoryCartClient};
pub use catalog::{CatalogClient, HttpCatalogClient, InMemoryCatalogClient, Product};

use serde::Deserialize;
use thiserror::Error;

/// Errors raised by collaborator clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service could not be reached or timed out.
    #[error("{service} service unavailable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },

    /// The service answered with an unexpected HTTP status.
    #[error("{service} service returned HTTP {status}")]
    UnexpectedStatus { service: &'static str, status: u16 },

    /// The response body could not be decoded.
    #[error("invalid response from {service} service: {reason}")]
    InvalidResponse {
        service: &'static str,
        reason: String,
    },
}

impl ClientError {
    /// Maps a transport error onto the taxonomy.
    fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ClientError::Unavailable {
                service,
                reason: err.to_string(),
            }
        } else {
            ClientError::InvalidResponse {
                service,
                reason: err.to_string(),
            }
        }
    }
}

/// Envelope every collaborator wraps its payloads in.
///
/// The explicit bound keeps serde from also requiring `T: Default` for
/// the defaulted `data` field; absent data is just `None`.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
struct ServiceResponse<T> {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<T>,
}
