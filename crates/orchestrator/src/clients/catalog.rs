//! Catalog service client: product lookup and stock mutation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use super::{ClientError, ServiceResponse};

const SERVICE: &str = "catalog";

/// A catalog product as returned by the collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub available_quantity: u32,
    pub in_stock: bool,
}

/// Client for the catalog collaborator.
///
/// The stock mutations are conditional updates executed at the
/// catalog's storage layer, so a check-and-decrement is atomic there;
/// this side never performs read-then-write stock arithmetic. Each
/// call is idempotent-safe and answers `Ok(false)` for a business
/// rejection (not enough stock) as opposed to `Err` for connectivity.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Looks up a product by ID.
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, ClientError>;

    /// Places a temporary hold on `quantity` units.
    async fn reserve_stock(&self, product_id: &ProductId, quantity: u32)
    -> Result<bool, ClientError>;

    /// Gives a previous hold back.
    async fn release_stock(&self, product_id: &ProductId, quantity: u32)
    -> Result<bool, ClientError>;

    /// Converts a hold into a permanent stock decrement.
    async fn decrement_stock(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<bool, ClientError>;
}

#[derive(Debug, Serialize)]
struct StockMutation {
    quantity: u32,
}

/// HTTP implementation talking to the catalog service through the
/// gateway.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogClient {
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

    async fn stock_call(
        &self,
        product_id: &ProductId,
        action: &str,
        quantity: u32,
    ) -> Result<bool, ClientError> {
        let url = format!(
            "{}/api/products/{}/stock/{}",
            self.base_url, product_id, action
        );
        let response = self
            .client
            .post(&url)
            .json(&StockMutation { quantity })
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(SERVICE, e))?;

        let status = response.status();
        // 409 is the catalog's "not enough stock" answer
        if status == reqwest::StatusCode::CONFLICT {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        let body: ServiceResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| ClientError::from_reqwest(SERVICE, e))?;
        Ok(body.success)
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, ClientError> {
        let url = format!("{}/api/products/{}", self.base_url, product_id);
        let response = self
            .client
            .get(&url)
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

        let body: ServiceResponse<Product> = response
            .json()
            .await
            .map_err(|e| ClientError::from_reqwest(SERVICE, e))?;
        Ok(body.data)
    }

    async fn reserve_stock(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<bool, ClientError> {
        self.stock_call(product_id, "reserve", quantity).await
    }

    async fn release_stock(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<bool, ClientError> {
        self.stock_call(product_id, "release", quantity).await
    }

    async fn decrement_stock(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<bool, ClientError> {
        self.stock_call(product_id, "decrement", quantity).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StockLevel {
    total: u32,
    reserved: u32,
}

impl StockLevel {
    fn available(&self) -> u32 {
        self.total.saturating_sub(self.reserved)
    }
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    stock: HashMap<ProductId, StockLevel>,
    prices: HashMap<ProductId, Money>,
    decrement_calls: u32,
    fail_on_reserve: bool,
    fail_on_decrement: bool,
    decrement_outages: std::collections::HashSet<ProductId>,
}

/// In-memory catalog client for testing.
///
/// Each stock mutation takes the state lock once, so check-and-decrement
/// is atomic the way the real catalog's conditional update is.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogClient {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalogClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a product with total stock and a unit price.
    pub fn set_stock(&self, product_id: impl Into<ProductId>, total: u32, price: Money) {
        let product_id = product_id.into();
        let mut state = self.state.write().unwrap();
        state.stock.insert(product_id.clone(), StockLevel { total, reserved: 0 });
        state.prices.insert(product_id, price);
    }

    /// Available (unreserved) units for a product.
    pub fn available(&self, product_id: &ProductId) -> u32 {
        self.state
            .read()
            .unwrap()
            .stock
            .get(product_id)
            .map(StockLevel::available)
            .unwrap_or(0)
    }

    /// Total physical units for a product.
    pub fn total(&self, product_id: &ProductId) -> u32 {
        self.state
            .read()
            .unwrap()
            .stock
            .get(product_id)
            .map(|s| s.total)
            .unwrap_or(0)
    }

    /// Number of decrement calls the client has seen.
    pub fn decrement_calls(&self) -> u32 {
        self.state.read().unwrap().decrement_calls
    }

    /// Configures connectivity failure on reserve calls.
    pub fn set_fail_on_reserve(&self, fail: bool) {
        self.state.write().unwrap().fail_on_reserve = fail;
    }

    /// Configures connectivity failure on decrement calls.
    pub fn set_fail_on_decrement(&self, fail: bool) {
        self.state.write().unwrap().fail_on_decrement = fail;
    }

    /// Configures connectivity failure on decrements of one product.
    pub fn set_decrement_outage(&self, product_id: impl Into<ProductId>, fail: bool) {
        let mut state = self.state.write().unwrap();
        let product_id = product_id.into();
        if fail {
            state.decrement_outages.insert(product_id);
        } else {
            state.decrement_outages.remove(&product_id);
        }
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalogClient {
    async fn get_product(&self, product_id: &ProductId) -> Result<Option<Product>, ClientError> {
        let state = self.state.read().unwrap();
        Ok(state.stock.get(product_id).map(|level| Product {
            id: product_id.clone(),
            name: product_id.to_string(),
            price: state.prices.get(product_id).copied().unwrap_or_default(),
            available_quantity: level.available(),
            in_stock: level.available() > 0,
        }))
    }

    async fn reserve_stock(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<bool, ClientError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_reserve {
            return Err(ClientError::Unavailable {
                service: SERVICE,
                reason: "connection refused".to_string(),
            });
        }
        match state.stock.get_mut(product_id) {
            Some(level) if level.available() >= quantity => {
                level.reserved += quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_stock(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<bool, ClientError> {
        let mut state = self.state.write().unwrap();
        match state.stock.get_mut(product_id) {
            Some(level) => {
                level.reserved = level.reserved.saturating_sub(quantity);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn decrement_stock(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<bool, ClientError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_decrement || state.decrement_outages.contains(product_id) {
            return Err(ClientError::Unavailable {
                service: SERVICE,
                reason: "connection refused".to_string(),
            });
        }
        state.decrement_calls += 1;
        match state.stock.get_mut(product_id) {
            Some(level) => {
                level.total = level.total.saturating_sub(quantity);
                level.reserved = level.reserved.saturating_sub(quantity);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserve_checks_available_not_total() {
        let catalog = InMemoryCatalogClient::new();
        let product: ProductId = "prod-1".into();
        catalog.set_stock(product.clone(), 5, Money::from_cents(100));

        assert!(catalog.reserve_stock(&product, 3).await.unwrap());
        assert_eq!(catalog.available(&product), 2);

        // only 2 available even though total is still 5
        assert!(!catalog.reserve_stock(&product, 3).await.unwrap());
        assert!(catalog.reserve_stock(&product, 2).await.unwrap());
        assert_eq!(catalog.available(&product), 0);
    }

    #[tokio::test]
    async fn release_gives_back_held_units() {
        let catalog = InMemoryCatalogClient::new();
        let product: ProductId = "prod-1".into();
        catalog.set_stock(product.clone(), 5, Money::from_cents(100));

        catalog.reserve_stock(&product, 4).await.unwrap();
        catalog.release_stock(&product, 4).await.unwrap();
        assert_eq!(catalog.available(&product), 5);
        assert_eq!(catalog.total(&product), 5);
    }

    #[tokio::test]
    async fn decrement_removes_physical_stock() {
        let catalog = InMemoryCatalogClient::new();
        let product: ProductId = "prod-1".into();
        catalog.set_stock(product.clone(), 5, Money::from_cents(100));

        catalog.reserve_stock(&product, 2).await.unwrap();
        catalog.decrement_stock(&product, 2).await.unwrap();
        assert_eq!(catalog.total(&product), 3);
        assert_eq!(catalog.available(&product), 3);
        assert_eq!(catalog.decrement_calls(), 1);
    }

    #[tokio::test]
    async fn unknown_product_cannot_be_reserved() {
        let catalog = InMemoryCatalogClient::new();
        assert!(!catalog.reserve_stock(&"ghost".into(), 1).await.unwrap());
        assert!(catalog.get_product(&"ghost".into()).await.unwrap().is_none());
    }
}
