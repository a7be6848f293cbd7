//! In-memory order repository for tests and local development.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Money, OrderId, UserId};
use domain::{Order, OrderStatus};

use crate::query::{ListQuery, Page, SortField, SortOrder};
use crate::repository::{OrderRepository, OrderStats};
use crate::{Result, StoreError};

/// In-memory [`OrderRepository`] with the same version and uniqueness
/// semantics as the PostgreSQL backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    pub fn order_count(&self) -> usize {
        self.orders.read().unwrap().len()
    }
}

fn compare(a: &Order, b: &Order, field: SortField) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at().cmp(&b.created_at()),
        SortField::Total => a.pricing().total.cmp(&b.pricing().total),
        SortField::Status => a.status().as_str().cmp(b.status().as_str()),
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, order: &Order) -> Result<Order> {
        let mut orders = self.orders.write().unwrap();

        if orders
            .values()
            .any(|existing| existing.order_number() == order.order_number())
        {
            return Err(StoreError::DuplicateOrderNumber(
                order.order_number().to_string(),
            ));
        }

        let mut stored = order.clone();
        stored.set_version(1);
        orders.insert(stored.id(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, order: &Order) -> Result<Order> {
        let mut orders = self.orders.write().unwrap();

        let current = orders
            .get(&order.id())
            .ok_or(StoreError::NotFound(order.id()))?;

        if current.version() != order.version() {
            return Err(StoreError::VersionConflict {
                order_id: order.id(),
                expected: order.version(),
                actual: current.version(),
            });
        }

        let mut stored = order.clone();
        stored.set_version(order.version() + 1);
        orders.insert(stored.id(), stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().unwrap().get(&id).cloned())
    }

    async fn find_for_user(&self, id: OrderId, user_id: UserId) -> Result<Option<Order>> {
        Ok(self
            .orders
            .read()
            .unwrap()
            .get(&id)
            .filter(|order| order.user_id() == user_id)
            .cloned())
    }

    async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>> {
        Ok(self
            .orders
            .read()
            .unwrap()
            .values()
            .find(|order| order.order_number() == order_number)
            .cloned())
    }

    async fn order_number_exists(&self, order_number: &str) -> Result<bool> {
        Ok(self
            .orders
            .read()
            .unwrap()
            .values()
            .any(|order| order.order_number() == order_number))
    }

    async fn list_for_user(&self, user_id: UserId, query: &ListQuery) -> Result<Page<Order>> {
        let query = query.normalized();
        let orders = self.orders.read().unwrap();

        let mut matching: Vec<Order> = orders
            .values()
            .filter(|order| order.user_id() == user_id)
            .filter(|order| query.status.is_none_or(|status| order.status() == status))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ordering = compare(a, b, query.sort_by);
            match query.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total_items = matching.len() as u64;
        let items: Vec<Order> = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .collect();

        Ok(Page::new(items, query.page, query.limit, total_items))
    }

    async fn stats_for_user(&self, user_id: UserId) -> Result<OrderStats> {
        let orders = self.orders.read().unwrap();

        let mut stats = OrderStats {
            total_orders: 0,
            total_spent: Money::zero(),
            delivered_orders: 0,
            cancelled_orders: 0,
        };
        for order in orders.values().filter(|order| order.user_id() == user_id) {
            stats.total_orders += 1;
            match order.status() {
                OrderStatus::Delivered => stats.delivered_orders += 1,
                OrderStatus::Cancelled => stats.cancelled_orders += 1,
                _ => {}
            }
            if order.status() != OrderStatus::Cancelled {
                stats.total_spent = stats.total_spent + order.pricing().total;
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use domain::{
        Address, Metadata, NewOrder, OrderItem, OrderStatus, PaymentMethod, Pricing,
        ProductSnapshot,
    };

    fn test_order(user_id: UserId, number: &str, total_cents: i64) -> Order {
        let item = OrderItem {
            product_id: "prod-1".into(),
            variant_id: None,
            name: "Widget".to_string(),
            unit_price: Money::from_cents(total_cents),
            quantity: 1,
            image: None,
            snapshot: ProductSnapshot::default(),
        };
        Order::create(NewOrder {
            order_number: number.to_string(),
            user_id,
            email: "a@example.com".to_string(),
            items: vec![item],
            pricing: Pricing {
                subtotal: Money::from_cents(total_cents),
                tax: Money::zero(),
                shipping: Money::zero(),
                discount: Money::zero(),
                total: Money::from_cents(total_cents),
            },
            shipping_address: Address {
                full_name: "A".to_string(),
                phone: "1".to_string(),
                street: "s".to_string(),
                city: "c".to_string(),
                state: "st".to_string(),
                zip_code: "z".to_string(),
                country: "India".to_string(),
                address_type: Default::default(),
            },
            billing_address: None,
            payment_method: PaymentMethod::Card,
            metadata: Metadata::default(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_version_one() {
        let repo = InMemoryOrderRepository::new();
        let order = test_order(UserId::new(), "ORD-1", 100);

        let stored = repo.insert(&order).await.unwrap();
        assert_eq!(stored.version(), 1);
        assert_eq!(repo.order_count(), 1);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_order_number() {
        let repo = InMemoryOrderRepository::new();
        repo.insert(&test_order(UserId::new(), "ORD-1", 100))
            .await
            .unwrap();

        let err = repo
            .insert(&test_order(UserId::new(), "ORD-1", 200))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateOrderNumber(_)));
    }

    #[tokio::test]
    async fn update_bumps_version_and_detects_conflicts() {
        let repo = InMemoryOrderRepository::new();
        let stored = repo
            .insert(&test_order(UserId::new(), "ORD-1", 100))
            .await
            .unwrap();

        let updated = repo.update(&stored).await.unwrap();
        assert_eq!(updated.version(), 2);

        // writing from the stale copy must conflict
        let err = repo.update(&stored).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn find_for_user_enforces_ownership() {
        let repo = InMemoryOrderRepository::new();
        let owner = UserId::new();
        let stored = repo.insert(&test_order(owner, "ORD-1", 100)).await.unwrap();

        assert!(repo.find_for_user(stored.id(), owner).await.unwrap().is_some());
        assert!(
            repo.find_for_user(stored.id(), UserId::new())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn list_paginates_25_orders_into_3_pages() {
        let repo = InMemoryOrderRepository::new();
        let user = UserId::new();
        for i in 0..25 {
            repo.insert(&test_order(user, &format!("ORD-{i}"), 100 + i))
                .await
                .unwrap();
        }

        let q1 = ListQuery {
            limit: 10,
            ..Default::default()
        };
        let page1 = repo.list_for_user(user, &q1).await.unwrap();
        assert_eq!(page1.items.len(), 10);
        assert_eq!(page1.total_items, 25);
        assert_eq!(page1.total_pages, 3);
        assert!(page1.has_next_page);
        assert!(!page1.has_prev_page);

        let q3 = ListQuery {
            page: 3,
            limit: 10,
            ..Default::default()
        };
        let page3 = repo.list_for_user(user, &q3).await.unwrap();
        assert_eq!(page3.items.len(), 5);
        assert!(!page3.has_next_page);
        assert!(page3.has_prev_page);
    }

    #[tokio::test]
    async fn list_filters_by_status_with_matching_count() {
        let repo = InMemoryOrderRepository::new();
        let user = UserId::new();
        for i in 0..4 {
            let order = test_order(user, &format!("ORD-{i}"), 100);
            let stored = repo.insert(&order).await.unwrap();
            if i % 2 == 0 {
                let mut cancelled = stored.clone();
                cancelled.cancel("test", domain::Actor::User).unwrap();
                repo.update(&cancelled).await.unwrap();
            }
        }

        let query = ListQuery {
            status: Some(OrderStatus::Cancelled),
            ..Default::default()
        };
        let page = repo.list_for_user(user, &query).await.unwrap();
        assert_eq!(page.total_items, 2);
        assert!(page.items.iter().all(|o| o.status() == OrderStatus::Cancelled));
    }

    #[tokio::test]
    async fn stats_count_orders_and_exclude_cancelled_spend() {
        let repo = InMemoryOrderRepository::new();
        let user = UserId::new();

        repo.insert(&test_order(user, "ORD-0", 500)).await.unwrap();
        let mut cancelled = repo.insert(&test_order(user, "ORD-1", 300)).await.unwrap();
        cancelled.cancel("test", domain::Actor::User).unwrap();
        repo.update(&cancelled).await.unwrap();
        // a stranger's order stays out of the aggregate
        repo.insert(&test_order(UserId::new(), "ORD-2", 900))
            .await
            .unwrap();

        let stats = repo.stats_for_user(user).await.unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.cancelled_orders, 1);
        assert_eq!(stats.delivered_orders, 0);
        assert_eq!(stats.total_spent.cents(), 500);
    }

    #[tokio::test]
    async fn list_sorts_by_total() {
        let repo = InMemoryOrderRepository::new();
        let user = UserId::new();
        for (i, cents) in [300i64, 100, 200].iter().enumerate() {
            repo.insert(&test_order(user, &format!("ORD-{i}"), *cents))
                .await
                .unwrap();
        }

        let query = ListQuery {
            sort_by: SortField::Total,
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        let page = repo.list_for_user(user, &query).await.unwrap();
        let totals: Vec<i64> = page.items.iter().map(|o| o.pricing().total.cents()).collect();
        assert_eq!(totals, vec![100, 200, 300]);
    }
}
