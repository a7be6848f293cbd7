//! Cart service client.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{Identity, Money, ProductId, VariantId};
use domain::ProductSnapshot;
use serde::Deserialize;

use super::{ClientError, ServiceResponse};

const SERVICE: &str = "cart";

/// One line in the active cart.
#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub name: String,
    /// Unit price the customer saw; becomes the order's price-at-checkout.
    pub price: Money,
    pub quantity: u32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub product_snapshot: ProductSnapshot,
}

/// Cart totals as computed by the cart service. The cart is the source
/// of truth for price-at-checkout; nothing here is recomputed.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CartTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    #[serde(default)]
    pub discount: Money,
    pub total: Money,
}

/// Snapshot of the active cart for an identity.
#[derive(Debug, Clone, Deserialize)]
pub struct CartSnapshot {
    pub items: Vec<CartItem>,
    pub totals: CartTotals,
}

impl CartSnapshot {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Client for the cart collaborator.
#[async_trait]
pub trait CartClient: Send + Sync {
    /// Fetches the active cart for the identity, `None` when there is
    /// no cart.
    async fn get_cart(&self, identity: &Identity) -> Result<Option<CartSnapshot>, ClientError>;

    /// Clears the active cart. Callers treat failure as non-fatal.
    async fn clear_cart(&self, identity: &Identity) -> Result<bool, ClientError>;
}

/// HTTP implementation talking to the cart service through the gateway.
#[derive(Debug, Clone)]
pub struct HttpCartClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCartClient {
    /// Creates a client with the given base URL and request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::from_reqwest(SERVICE, e))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn identity_headers(builder: reqwest::RequestBuilder, identity: &Identity) -> reqwest::RequestBuilder {
        match identity {
            Identity::User(user_id) => builder.header("X-User-Id", user_id.to_string()),
            Identity::Guest(session_id) => builder.header("X-Session-Id", session_id.as_str()),
        }
    }
}

#[async_trait]
impl CartClient for HttpCartClient {
    async fn get_cart(&self, identity: &Identity) -> Result<Option<CartSnapshot>, ClientError> {
        let url = format!("{}/api/cart", self.base_url);
        let response = Self::identity_headers(self.client.get(&url), identity)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(SERVICE, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        let body: ServiceResponse<CartSnapshot> = response
            .json()
            .await
            .map_err(|e| ClientError::from_reqwest(SERVICE, e))?;

        if !body.success {
            return Err(ClientError::InvalidResponse {
                service: SERVICE,
                reason: body.message.unwrap_or_else(|| "cart fetch failed".to_string()),
            });
        }
        Ok(body.data)
    }

    async fn clear_cart(&self, identity: &Identity) -> Result<bool, ClientError> {
        let url = format!("{}/api/cart", self.base_url);
        let response = Self::identity_headers(self.client.delete(&url), identity)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(SERVICE, e))?;

        Ok(response.status().is_success())
    }
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<String, CartSnapshot>,
    cleared: Vec<String>,
    fail_on_fetch: bool,
    fail_on_clear: bool,
}

/// In-memory cart client for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartClient {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the active cart for an identity.
    pub fn set_cart(&self, identity: &Identity, cart: CartSnapshot) {
        self.state
            .write()
            .unwrap()
            .carts
            .insert(identity.to_string(), cart);
    }

    /// Configures the client to fail fetches with a connectivity error.
    pub fn set_fail_on_fetch(&self, fail: bool) {
        self.state.write().unwrap().fail_on_fetch = fail;
    }

    /// Configures the client to fail clears with a connectivity error.
    pub fn set_fail_on_clear(&self, fail: bool) {
        self.state.write().unwrap().fail_on_clear = fail;
    }

    /// Returns true if the identity's cart has been cleared.
    pub fn was_cleared(&self, identity: &Identity) -> bool {
        self.state
            .read()
            .unwrap()
            .cleared
            .contains(&identity.to_string())
    }

    /// Number of clears the identity's cart has received.
    pub fn cleared_count(&self, identity: &Identity) -> usize {
        let key = identity.to_string();
        self.state
            .read()
            .unwrap()
            .cleared
            .iter()
            .filter(|k| **k == key)
            .count()
    }
}

#[async_trait]
impl CartClient for InMemoryCartClient {
    async fn get_cart(&self, identity: &Identity) -> Result<Option<CartSnapshot>, ClientError> {
        let state = self.state.read().unwrap();
        if state.fail_on_fetch {
            return Err(ClientError::Unavailable {
                service: SERVICE,
                reason: "connection refused".to_string(),
            });
        }
        Ok(state.carts.get(&identity.to_string()).cloned())
    }

    async fn clear_cart(&self, identity: &Identity) -> Result<bool, ClientError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_clear {
            return Err(ClientError::Unavailable {
                service: SERVICE,
                reason: "connection refused".to_string(),
            });
        }
        let key = identity.to_string();
        let removed = state.carts.remove(&key).is_some();
        state.cleared.push(key);
        Ok(removed)
    }
}
