//! The order orchestrator: checkout saga and follow-on operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{Identity, OrderId, UserId};
use domain::{
    Actor, Address, Metadata, NewOrder, Order, OrderItem, OrderNumberGenerator, OrderStatus,
    PaymentMethod, Tracking,
};
use metrics::counter;
use order_store::{ListQuery, OrderRepository, OrderStats, Page};

use crate::cache::OrderCache;
use crate::clients::{CartClient, CartSnapshot, CatalogClient};
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};
use crate::ledger::{Hold, ReservationLedger, ReservationStore};

/// Checkout data supplied by the customer on top of the cart.
#[derive(Debug, Clone)]
pub struct CheckoutInput {
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub payment_method: PaymentMethod,
    pub metadata: Metadata,
}

/// Settlement details reported by the payment gateway.
#[derive(Debug, Clone)]
pub struct PaymentData {
    pub transaction_id: String,
    pub details: Option<serde_json::Value>,
}

/// Carrier details recorded when an order ships.
#[derive(Debug, Clone)]
pub struct ShipmentDetails {
    pub carrier: String,
    pub tracking_number: String,
    pub tracking_url: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// Drives the order lifecycle across the cart, catalog, reservation
/// ledger, and order store.
///
/// Checkout is a saga: cart fetch, order-number generation, inventory
/// holds, persistence, best-effort cart clearing. Each later operation
/// (payment confirmation, cancellation, status advance, return) loads
/// the order, mutates it through the aggregate, persists with a version
/// check, and keeps the cache coherent. A version conflict means a
/// concurrent mutation won; the caller retries against fresh state.
pub struct OrderOrchestrator<Cart, Catalog, Repo, Store> {
    cart: Arc<Cart>,
    ledger: ReservationLedger<Catalog, Store>,
    repo: Arc<Repo>,
    cache: OrderCache,
    numbers: OrderNumberGenerator,
    config: OrchestratorConfig,
}

impl<Cart, Catalog, Repo, Store> OrderOrchestrator<Cart, Catalog, Repo, Store>
where
    Cart: CartClient + 'static,
    Catalog: CatalogClient,
    Repo: OrderRepository,
    Store: ReservationStore,
{
    pub fn new(
        cart: Arc<Cart>,
        catalog: Arc<Catalog>,
        repo: Arc<Repo>,
        store: Arc<Store>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            cart,
            ledger: ReservationLedger::new(catalog, store, config.reservation_ttl),
            repo,
            cache: OrderCache::new(config.cache_ttl, config.cache_capacity),
            numbers: OrderNumberGenerator::new(config.order_number_prefix.clone()),
            config,
        }
    }

    /// Places an order from the identity's active cart.
    ///
    /// The cart is looked up by `identity`, which is the guest session
    /// when the customer built the cart before signing in; the order
    /// itself always belongs to `user_id`. Inventory is held for every
    /// line before the order is persisted; if any line lacks stock, or
    /// persistence fails, every hold placed so far is given back and
    /// nothing is written. Cart clearing runs after the order exists
    /// and its failure never undoes the order.
    #[tracing::instrument(skip(self, input), fields(identity = %identity, user_id = %user_id))]
    pub async fn create_order(
        &self,
        identity: Identity,
        user_id: UserId,
        email: String,
        input: CheckoutInput,
    ) -> Result<Order> {
        let cart = self
            .cart
            .get_cart(&identity)
            .await?
            .filter(|c| !c.is_empty())
            .ok_or(OrchestratorError::EmptyCart)?;

        let order_number = self.unique_order_number().await?;
        let order = Order::create(NewOrder {
            order_number,
            user_id,
            email,
            items: cart_items(&cart),
            pricing: cart_pricing(&cart),
            shipping_address: input.shipping_address,
            billing_address: input.billing_address,
            payment_method: input.payment_method,
            metadata: input.metadata,
        })?;

        let holds: Vec<Hold> = order
            .items()
            .iter()
            .map(|item| Hold {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            })
            .collect();
        if !self.ledger.reserve(order.id(), holds).await? {
            return Err(OrchestratorError::InsufficientStock);
        }

        let persisted = match self.repo.insert(&order).await {
            Ok(persisted) => persisted,
            Err(err) => {
                // give the holds back before surfacing the failure
                if let Err(release_err) = self.ledger.release(order.id()).await {
                    tracing::error!(
                        order_id = %order.id(),
                        error = %release_err,
                        "failed to release holds after insert failure"
                    );
                }
                return Err(err.into());
            }
        };

        self.clear_cart_best_effort(identity);
        self.refresh_cache(&persisted);
        counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %persisted.id(), order_number = %persisted.order_number(), "order placed");
        Ok(persisted)
    }

    /// Records a successful charge and commits the inventory holds.
    ///
    /// Idempotent: confirming an already-paid order keeps the original
    /// transaction and never decrements stock a second time. A commit
    /// failure surfaces after the charge is persisted, so the gateway
    /// retries the webhook and a later call finishes the commit.
    #[tracing::instrument(skip(self, payment), fields(order_id = %order_id))]
    pub async fn confirm_payment(&self, order_id: OrderId, payment: PaymentData) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        if order.payment().is_completed() {
            // replayed webhook, or a retry after a failed commit
            if self.ledger.commit(order_id).await? {
                tracing::info!("committed holds left over from an earlier attempt");
            } else {
                tracing::info!("payment already recorded, skipping");
            }
            return Ok(order);
        }

        order.confirm_payment(payment.transaction_id, payment.details)?;
        let updated = self.repo.update(&order).await?;
        self.refresh_cache(&updated);

        if !self.ledger.commit(order_id).await? {
            tracing::warn!("no reservation record found to commit");
        }

        counter!("payments_confirmed_total").increment(1);
        Ok(updated)
    }

    /// Records a failed charge.
    ///
    /// The holds stay in place so a retried payment does not re-fight
    /// for stock; an abandoned retry is bounded by the reservation TTL.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn fail_payment(&self, order_id: OrderId, reason: String) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        order.fail_payment(reason)?;
        let updated = self.repo.update(&order).await?;

        self.refresh_cache(&updated);
        counter!("payments_failed_total").increment(1);
        Ok(updated)
    }

    /// Cancels an order and releases its inventory holds.
    ///
    /// When `requester` is set the order must belong to that user;
    /// admins and system callers pass `None`. Customers can cancel a
    /// pending order at any time but a confirmed one only within the
    /// cancellation window. Holds are released only when payment never
    /// completed; a paid order's holds were already committed.
    #[tracing::instrument(skip(self, reason), fields(order_id = %order_id))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        requester: Option<UserId>,
        by: Actor,
        reason: String,
    ) -> Result<Order> {
        let mut order = self.load_scoped(order_id, requester).await?;

        if by == Actor::User
            && order.status() != OrderStatus::Pending
            && age_hours(order.created_at()) > self.config.cancellation_window_hours
        {
            return Err(OrchestratorError::CancellationWindowExpired {
                hours: self.config.cancellation_window_hours,
            });
        }

        let was_paid = order.payment().is_completed();
        order.cancel(reason, by)?;
        let updated = self.repo.update(&order).await?;

        if !was_paid {
            match self.ledger.release(order_id).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!("no reservation record found to release"),
                Err(err) => tracing::error!(error = %err, "failed to release reservation"),
            }
        }

        self.refresh_cache(&updated);
        counter!("orders_cancelled_total").increment(1);
        Ok(updated)
    }

    /// Requests a return on a delivered order.
    #[tracing::instrument(skip(self, reason), fields(order_id = %order_id, user_id = %user_id))]
    pub async fn initiate_return(
        &self,
        order_id: OrderId,
        user_id: UserId,
        reason: String,
    ) -> Result<Order> {
        let mut order = self.load_scoped(order_id, Some(user_id)).await?;
        order.initiate_return(
            reason,
            Utc::now(),
            chrono::Duration::days(self.config.return_window_days),
        )?;
        let updated = self.repo.update(&order).await?;

        self.refresh_cache(&updated);
        counter!("returns_requested_total").increment(1);
        Ok(updated)
    }

    /// Moves an order to `next` on behalf of an operator.
    #[tracing::instrument(skip(self, note), fields(order_id = %order_id, next = %next))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        next: OrderStatus,
        by: Actor,
        note: Option<String>,
    ) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        order.update_status(next, by, note)?;
        let updated = self.repo.update(&order).await?;

        self.refresh_cache(&updated);
        Ok(updated)
    }

    /// Marks an order shipped and records the carrier details.
    #[tracing::instrument(skip(self, shipment), fields(order_id = %order_id))]
    pub async fn mark_shipped(&self, order_id: OrderId, shipment: ShipmentDetails) -> Result<Order> {
        let mut order = self.load(order_id).await?;
        order.update_status(OrderStatus::Shipped, Actor::Admin, None)?;
        order.set_tracking(
            shipment.carrier,
            shipment.tracking_number,
            shipment.tracking_url,
            shipment.estimated_delivery,
        );
        let updated = self.repo.update(&order).await?;

        self.refresh_cache(&updated);
        Ok(updated)
    }

    /// Loads an order, serving from the cache when possible.
    ///
    /// When `requester` is set, an order owned by someone else answers
    /// not-found rather than forbidden, so IDs cannot be probed.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        order_id: OrderId,
        requester: Option<UserId>,
    ) -> Result<Order> {
        if let Some(cached) = self.cache.get_order(order_id) {
            return match requester {
                Some(user_id) if cached.user_id() != user_id => {
                    Err(OrchestratorError::NotFound(order_id))
                }
                _ => Ok(cached),
            };
        }

        let order = self.load_scoped(order_id, requester).await?;
        self.cache.put_order(&order);
        Ok(order)
    }

    /// Returns the tracking block (carrier details plus the full status
    /// history) for an order.
    pub async fn get_tracking(
        &self,
        order_id: OrderId,
        requester: Option<UserId>,
    ) -> Result<Tracking> {
        let order = self.get_order(order_id, requester).await?;
        Ok(order.tracking().clone())
    }

    /// Lists a user's orders.
    ///
    /// Only the unfiltered first page with default sorting is cached;
    /// every other query shape goes straight to the store.
    #[tracing::instrument(skip(self, query), fields(user_id = %user_id))]
    pub async fn get_user_orders(
        &self,
        user_id: UserId,
        query: ListQuery,
    ) -> Result<Page<Order>> {
        let query = query.normalized();
        if !query.is_default_page() {
            return Ok(self.repo.list_for_user(user_id, &query).await?);
        }

        if let Some(page) = self.cache.get_first_page(user_id) {
            return Ok(page);
        }
        let page = self.repo.list_for_user(user_id, &query).await?;
        self.cache.put_first_page(user_id, page.clone());
        Ok(page)
    }

    /// Aggregates the user's order history: counts and lifetime spend.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_order_stats(&self, user_id: UserId) -> Result<OrderStats> {
        Ok(self.repo.stats_for_user(user_id).await?)
    }

    async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.repo
            .find_by_id(order_id)
            .await?
            .ok_or(OrchestratorError::NotFound(order_id))
    }

    async fn load_scoped(&self, order_id: OrderId, requester: Option<UserId>) -> Result<Order> {
        let found = match requester {
            Some(user_id) => self.repo.find_for_user(order_id, user_id).await?,
            None => self.repo.find_by_id(order_id).await?,
        };
        found.ok_or(OrchestratorError::NotFound(order_id))
    }

    async fn unique_order_number(&self) -> Result<String> {
        for _ in 0..self.config.max_order_number_attempts {
            let candidate = self.numbers.generate();
            if !self.repo.order_number_exists(&candidate).await? {
                return Ok(candidate);
            }
            tracing::warn!(order_number = %candidate, "order number collision, retrying");
        }
        Err(OrchestratorError::OrderNumberExhausted {
            attempts: self.config.max_order_number_attempts,
        })
    }

    fn clear_cart_best_effort(&self, identity: Identity) {
        let cart = self.cart.clone();
        tokio::spawn(async move {
            match cart.clear_cart(&identity).await {
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(identity = %identity, error = %err, "failed to clear cart after checkout");
                }
            }
        });
    }

    /// Drops stale cache entries for the order and its owner, then
    /// re-caches the fresh value.
    fn refresh_cache(&self, order: &Order) {
        self.cache.invalidate(order.id(), order.user_id());
        self.cache.put_order(order);
    }
}

fn cart_items(cart: &CartSnapshot) -> Vec<OrderItem> {
    cart.items
        .iter()
        .map(|item| OrderItem {
            product_id: item.product_id.clone(),
            variant_id: item.variant_id.clone(),
            name: item.name.clone(),
            unit_price: item.price,
            quantity: item.quantity,
            image: item.image.clone(),
            snapshot: item.product_snapshot.clone(),
        })
        .collect()
}

fn cart_pricing(cart: &CartSnapshot) -> domain::Pricing {
    domain::Pricing {
        subtotal: cart.totals.subtotal,
        tax: cart.totals.tax,
        shipping: cart.totals.shipping,
        discount: cart.totals.discount,
        total: cart.totals.total,
    }
}

fn age_hours(created_at: DateTime<Utc>) -> i64 {
    Utc::now().signed_duration_since(created_at).num_hours()
}
