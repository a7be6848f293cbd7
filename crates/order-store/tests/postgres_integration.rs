//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{Money, UserId};
use domain::{
    Actor, Address, Metadata, NewOrder, Order, OrderItem, OrderStatus, PaymentMethod, Pricing,
    ProductSnapshot,
};
use order_store::{ListQuery, OrderRepository, PostgresOrderRepository, StoreError};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!("../../../migrations/001_create_orders_table.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn repository() -> PostgresOrderRepository {
    let info = get_container_info().await;
    let pool = PgPool::connect(&info.connection_string).await.unwrap();
    PostgresOrderRepository::new(pool)
}

fn test_order(user_id: UserId, number: &str, total_cents: i64) -> Order {
    Order::create(NewOrder {
        order_number: number.to_string(),
        user_id,
        email: "asha@example.com".to_string(),
        items: vec![OrderItem {
            product_id: "prod-1".into(),
            variant_id: None,
            name: "Widget".to_string(),
            unit_price: Money::from_cents(total_cents),
            quantity: 1,
            image: None,
            snapshot: ProductSnapshot::default(),
        }],
        pricing: Pricing {
            subtotal: Money::from_cents(total_cents),
            tax: Money::zero(),
            shipping: Money::zero(),
            discount: Money::zero(),
            total: Money::from_cents(total_cents),
        },
        shipping_address: Address {
            full_name: "Asha Rao".to_string(),
            phone: "5550100".to_string(),
            street: "1 Main St".to_string(),
            city: "Pune".to_string(),
            state: "MH".to_string(),
            zip_code: "411001".to_string(),
            country: "India".to_string(),
            address_type: Default::default(),
        },
        billing_address: None,
        payment_method: PaymentMethod::Card,
        metadata: Metadata::default(),
    })
    .unwrap()
}

fn unique_number(tag: &str) -> String {
    format!("ORD{}{}", tag, uuid::Uuid::new_v4().simple())
}

#[tokio::test]
async fn insert_and_find_roundtrip() {
    let repo = repository().await;
    let order = test_order(UserId::new(), &unique_number("RT"), 1299);

    let stored = repo.insert(&order).await.unwrap();
    assert_eq!(stored.version(), 1);

    let loaded = repo.find_by_id(stored.id()).await.unwrap().unwrap();
    assert_eq!(loaded.id(), stored.id());
    assert_eq!(loaded.order_number(), stored.order_number());
    assert_eq!(loaded.status(), OrderStatus::Pending);
    assert_eq!(loaded.pricing().total.cents(), 1299);
    assert_eq!(loaded.version(), 1);
}

#[tokio::test]
async fn duplicate_order_number_is_rejected() {
    let repo = repository().await;
    let number = unique_number("DUP");

    repo.insert(&test_order(UserId::new(), &number, 100))
        .await
        .unwrap();

    let err = repo
        .insert(&test_order(UserId::new(), &number, 200))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateOrderNumber(_)));
}

#[tokio::test]
async fn stale_update_is_a_version_conflict() {
    let repo = repository().await;
    let stored = repo
        .insert(&test_order(UserId::new(), &unique_number("VC"), 100))
        .await
        .unwrap();

    let mut first = stored.clone();
    first.cancel("first writer", Actor::User).unwrap();
    let updated = repo.update(&first).await.unwrap();
    assert_eq!(updated.version(), 2);

    // second writer still holds version 1
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
async fn find_for_user_scopes_to_owner() {
    let repo = repository().await;
    let owner = UserId::new();
    let stored = repo
        .insert(&test_order(owner, &unique_number("OWN"), 100))
        .await
        .unwrap();

    assert!(repo.find_for_user(stored.id(), owner).await.unwrap().is_some());
    assert!(
        repo.find_for_user(stored.id(), UserId::new())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn find_by_number_and_existence_check() {
    let repo = repository().await;
    let number = unique_number("NUM");

    assert!(!repo.order_number_exists(&number).await.unwrap());
    repo.insert(&test_order(UserId::new(), &number, 100))
        .await
        .unwrap();

    assert!(repo.order_number_exists(&number).await.unwrap());
    let loaded = repo.find_by_number(&number).await.unwrap().unwrap();
    assert_eq!(loaded.order_number(), number);
}

#[tokio::test]
async fn stats_aggregate_matches_the_in_memory_semantics() {
    let repo = repository().await;
    let user = UserId::new();

    repo.insert(&test_order(user, &unique_number("ST0"), 500))
        .await
        .unwrap();
    let mut cancelled = repo
        .insert(&test_order(user, &unique_number("ST1"), 300))
        .await
        .unwrap();
    cancelled.cancel("test", Actor::User).unwrap();
    repo.update(&cancelled).await.unwrap();

    let stats = repo.stats_for_user(user).await.unwrap();
    assert_eq!(stats.total_orders, 2);
    assert_eq!(stats.cancelled_orders, 1);
    assert_eq!(stats.total_spent.cents(), 500);

    // a user with no history gets zeroes, not an error
    let empty = repo.stats_for_user(UserId::new()).await.unwrap();
    assert_eq!(empty.total_orders, 0);
    assert_eq!(empty.total_spent.cents(), 0);
}

#[tokio::test]
async fn listing_paginates_and_filters_consistently() {
    let repo = repository().await;
    let user = UserId::new();

    for i in 0..25 {
        let order = test_order(user, &unique_number(&format!("PG{i}")), 100 + i);
        let stored = repo.insert(&order).await.unwrap();
        if i < 5 {
            let mut cancelled = stored.clone();
            cancelled.cancel("test", Actor::User).unwrap();
            repo.update(&cancelled).await.unwrap();
        }
    }

    let page1 = repo
        .list_for_user(user, &ListQuery { limit: 10, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(page1.total_items, 25);
    assert_eq!(page1.total_pages, 3);
    assert_eq!(page1.items.len(), 10);
    assert!(page1.has_next_page);
    assert!(!page1.has_prev_page);

    let page3 = repo
        .list_for_user(
            user,
            &ListQuery {
                page: 3,
                limit: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(page3.items.len(), 5);
    assert!(!page3.has_next_page);

    let cancelled = repo
        .list_for_user(
            user,
            &ListQuery {
                status: Some(OrderStatus::Cancelled),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.total_items, 5);
    assert!(
        cancelled
            .items
            .iter()
            .all(|o| o.status() == OrderStatus::Cancelled)
    );
}
