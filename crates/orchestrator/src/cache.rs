//! Read cache for orders and first-page listings.

use std::time::Duration;

use common::{OrderId, UserId};
use domain::Order;
use metrics::counter;
use moka::sync::Cache;
use order_store::Page;

/// TTL cache in front of the order repository.
///
/// Two keyspaces: single orders by ID and the default first listing
/// page per user. Every write path invalidates both so a stale page
/// never outlives the mutation that made it stale.
#[derive(Clone)]
pub struct OrderCache {
    orders: Cache<OrderId, Order>,
    first_pages: Cache<UserId, Page<Order>>,
}

impl OrderCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            orders: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            first_pages: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn get_order(&self, order_id: OrderId) -> Option<Order> {
        let hit = self.orders.get(&order_id);
        if hit.is_some() {
            counter!("order_cache_hits_total").increment(1);
        } else {
            counter!("order_cache_misses_total").increment(1);
        }
        hit
    }

    pub fn put_order(&self, order: &Order) {
        self.orders.insert(order.id(), order.clone());
    }

    pub fn get_first_page(&self, user_id: UserId) -> Option<Page<Order>> {
        self.first_pages.get(&user_id)
    }

    pub fn put_first_page(&self, user_id: UserId, page: Page<Order>) {
        self.first_pages.insert(user_id, page);
    }

    /// Drops both the order entry and the owner's listing page.
    pub fn invalidate(&self, order_id: OrderId, user_id: UserId) {
        self.orders.invalidate(&order_id);
        self.first_pages.invalidate(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use domain::{
        Address, AddressType, NewOrder, OrderItem, PaymentMethod, Pricing, ProductSnapshot,
    };

    fn sample_order() -> Order {
        let item = OrderItem {
            product_id: "prod-1".into(),
            variant_id: None,
            name: "Widget".to_string(),
            unit_price: Money::from_cents(1000),
            quantity: 2,
            image: None,
            snapshot: ProductSnapshot::default(),
        };
        let address = Address {
            full_name: "Jo Doe".to_string(),
            phone: "5550100".to_string(),
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            zip_code: "62701".to_string(),
            country: "US".to_string(),
            address_type: AddressType::default(),
        };
        Order::create(NewOrder {
            order_number: "ORD-TEST-0001".to_string(),
            user_id: common::UserId::new(),
            email: "jo@example.com".to_string(),
            items: vec![item],
            pricing: Pricing {
                subtotal: Money::from_cents(2000),
                tax: Money::from_cents(200),
                shipping: Money::zero(),
                discount: Money::zero(),
                total: Money::from_cents(2200),
            },
            shipping_address: address,
            billing_address: None,
            payment_method: PaymentMethod::Card,
            metadata: Default::default(),
        })
        .unwrap()
    }

    #[test]
    fn order_roundtrip_and_invalidation() {
        let cache = OrderCache::new(Duration::from_secs(60), 100);
        let order = sample_order();

        cache.put_order(&order);
        assert!(cache.get_order(order.id()).is_some());

        cache.invalidate(order.id(), order.user_id());
        assert!(cache.get_order(order.id()).is_none());
    }

    #[test]
    fn invalidation_drops_the_owners_first_page() {
        let cache = OrderCache::new(Duration::from_secs(60), 100);
        let order = sample_order();
        let user_id = order.user_id();

        cache.put_first_page(user_id, Page::new(vec![order.clone()], 1, 10, 1));
        assert!(cache.get_first_page(user_id).is_some());

        cache.invalidate(order.id(), user_id);
        assert!(cache.get_first_page(user_id).is_none());
    }
}
