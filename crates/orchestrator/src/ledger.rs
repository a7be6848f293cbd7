//! Reservation ledger: temporary inventory holds keyed by order.
//!
//! A hold record is written at checkout, committed (converted into a
//! permanent decrement) on payment confirmation, or released on
//! cancellation. Every record carries a TTL so an abandoned checkout
//! cannot pin stock forever; the catalog side releases expired holds
//! on its own schedule, so expiry here only has to stop a late commit
//! or release from acting on stale state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::{OrderId, ProductId};
use metrics::counter;

use crate::clients::{CatalogClient, ClientError};

/// One line of a reservation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hold {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Storage for reservation records.
///
/// The store is a plain key-value surface with TTL semantics; the
/// all-or-nothing logic lives in [`ReservationLedger`].
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Writes the record for an order, replacing any previous one.
    async fn put(&self, order_id: OrderId, holds: Vec<Hold>, ttl: Duration);

    /// Reads the record for an order, if present and not expired.
    async fn get(&self, order_id: OrderId) -> Option<Vec<Hold>>;

    /// Deletes the record for an order. Returns the record if one was
    /// present and not expired.
    async fn remove(&self, order_id: OrderId) -> Option<Vec<Hold>>;
}

struct StoredRecord {
    holds: Vec<Hold>,
    expires_at: Instant,
}

/// In-memory reservation store with passive expiry.
///
/// Expiry is checked on read rather than by a sweeper task, which is
/// enough for the ledger's contract: an expired record behaves exactly
/// like an absent one.
#[derive(Clone, Default)]
pub struct InMemoryReservationStore {
    records: Arc<RwLock<HashMap<OrderId, StoredRecord>>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) records.
    pub fn active_count(&self) -> usize {
        let now = Instant::now();
        self.records
            .read()
            .unwrap()
            .values()
            .filter(|r| r.expires_at > now)
            .count()
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn put(&self, order_id: OrderId, holds: Vec<Hold>, ttl: Duration) {
        let record = StoredRecord {
            holds,
            expires_at: Instant::now() + ttl,
        };
        self.records.write().unwrap().insert(order_id, record);
    }

    async fn get(&self, order_id: OrderId) -> Option<Vec<Hold>> {
        let records = self.records.read().unwrap();
        records
            .get(&order_id)
            .filter(|r| r.expires_at > Instant::now())
            .map(|r| r.holds.clone())
    }

    async fn remove(&self, order_id: OrderId) -> Option<Vec<Hold>> {
        let record = self.records.write().unwrap().remove(&order_id)?;
        (record.expires_at > Instant::now()).then_some(record.holds)
    }
}

/// Coordinates stock holds between the catalog and the reservation
/// store.
///
/// `reserve` is all-or-nothing: if any line cannot be held, every
/// already-held line is given back before returning. `commit` and
/// `release` tolerate an absent record and answer `Ok(false)`, so the
/// caller stays idempotent when a reservation has already been settled
/// or has expired.
pub struct ReservationLedger<Catalog, Store> {
    catalog: Arc<Catalog>,
    store: Arc<Store>,
    ttl: Duration,
}

impl<Catalog, Store> ReservationLedger<Catalog, Store>
where
    Catalog: CatalogClient,
    Store: ReservationStore,
{
    pub fn new(catalog: Arc<Catalog>, store: Arc<Store>, ttl: Duration) -> Self {
        Self { catalog, store, ttl }
    }

    /// Places a hold for every line of an order.
    ///
    /// Returns `Ok(false)` when at least one line lacks stock; in that
    /// case no hold remains placed and no record is written.
    #[tracing::instrument(skip(self, holds), fields(order_id = %order_id, lines = holds.len()))]
    pub async fn reserve(&self, order_id: OrderId, holds: Vec<Hold>) -> Result<bool, ClientError> {
        let mut placed: Vec<&Hold> = Vec::with_capacity(holds.len());

        for hold in &holds {
            let held = match self.catalog.reserve_stock(&hold.product_id, hold.quantity).await {
                Ok(held) => held,
                Err(err) => {
                    self.unwind(order_id, &placed).await;
                    return Err(err);
                }
            };
            if !held {
                tracing::info!(product_id = %hold.product_id, "insufficient stock, rolling back holds");
                self.unwind(order_id, &placed).await;
                counter!("reservations_rejected_total").increment(1);
                return Ok(false);
            }
            placed.push(hold);
        }

        self.store.put(order_id, holds, self.ttl).await;
        counter!("reservations_placed_total").increment(1);
        Ok(true)
    }

    /// Converts the order's holds into permanent stock decrements and
    /// deletes the record.
    ///
    /// The record is deleted only after every decrement lands. On a
    /// decrement failure the lines not yet decremented are written
    /// back, so a retried commit finishes the remainder instead of
    /// double-counting. Returns `Ok(false)` when no live record
    /// exists, which covers both "already committed" and "expired".
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn commit(&self, order_id: OrderId) -> Result<bool, ClientError> {
        let Some(holds) = self.store.get(order_id).await else {
            tracing::warn!("no reservation record to commit");
            return Ok(false);
        };

        for (index, hold) in holds.iter().enumerate() {
            if let Err(err) = self
                .catalog
                .decrement_stock(&hold.product_id, hold.quantity)
                .await
            {
                self.store
                    .put(order_id, holds[index..].to_vec(), self.ttl)
                    .await;
                return Err(err);
            }
        }

        let _ = self.store.remove(order_id).await;
        counter!("reservations_committed_total").increment(1);
        Ok(true)
    }

    /// Gives the order's holds back to the catalog and deletes the
    /// record.
    ///
    /// Returns `Ok(false)` when no live record exists. After a commit
    /// the record is gone, so a release that races a commit is a
    /// no-op rather than a double adjustment.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn release(&self, order_id: OrderId) -> Result<bool, ClientError> {
        let Some(holds) = self.store.remove(order_id).await else {
            tracing::warn!("no reservation record to release");
            return Ok(false);
        };

        for hold in &holds {
            self.catalog
                .release_stock(&hold.product_id, hold.quantity)
                .await?;
        }
        counter!("reservations_released_total").increment(1);
        Ok(true)
    }

    async fn unwind(&self, order_id: OrderId, placed: &[&Hold]) {
        for hold in placed {
            if let Err(err) = self
                .catalog
                .release_stock(&hold.product_id, hold.quantity)
                .await
            {
                tracing::error!(
                    order_id = %order_id,
                    product_id = %hold.product_id,
                    error = %err,
                    "failed to roll back hold"
                );
            }
        }
    }
}
