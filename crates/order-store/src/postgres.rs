//! PostgreSQL-backed order repository.

use async_trait::async_trait;
use common::{Money, OrderId, UserId};
use domain::Order;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::query::{ListQuery, Page};
use crate::repository::{OrderRepository, OrderStats};
use crate::{Result, StoreError};

/// [`OrderRepository`] backed by PostgreSQL.
///
/// The full order lives in the `doc` JSONB column; `status`,
/// `total_cents`, and the timestamps are extracted so listings can
/// filter and sort without unpacking documents.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Creates a new PostgreSQL order repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let doc: serde_json::Value = row.try_get("doc")?;
        let version: i64 = row.try_get("version")?;

        let mut order: Order = serde_json::from_value(doc)?;
        order.set_version(version);
        Ok(order)
    }

    fn to_doc(order: &Order) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(order)?)
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn insert(&self, order: &Order) -> Result<Order> {
        let mut stored = order.clone();
        stored.set_version(1);

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, user_id, status, total_cents, version, created_at, updated_at, doc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(stored.id().as_uuid())
        .bind(stored.order_number())
        .bind(stored.user_id().as_uuid())
        .bind(stored.status().as_str())
        .bind(stored.pricing().total.cents())
        .bind(stored.version())
        .bind(stored.created_at())
        .bind(stored.updated_at())
        .bind(Self::to_doc(&stored)?)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_order_number")
            {
                return StoreError::DuplicateOrderNumber(order.order_number().to_string());
            }
            StoreError::Database(e)
        })?;

        Ok(stored)
    }

    async fn update(&self, order: &Order) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT version FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order.id().as_uuid())
                .fetch_optional(&mut *tx)
                .await?;

        let actual = current.ok_or(StoreError::NotFound(order.id()))?;
        if actual != order.version() {
            return Err(StoreError::VersionConflict {
                order_id: order.id(),
                expected: order.version(),
                actual,
            });
        }

        let mut stored = order.clone();
        stored.set_version(order.version() + 1);

        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, total_cents = $3, version = $4, updated_at = $5, doc = $6
            WHERE id = $1
            "#,
        )
        .bind(stored.id().as_uuid())
        .bind(stored.status().as_str())
        .bind(stored.pricing().total.cents())
        .bind(stored.version())
        .bind(stored.updated_at())
        .bind(Self::to_doc(&stored)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT doc, version FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_for_user(&self, id: OrderId, user_id: UserId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT doc, version FROM orders WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT doc, version FROM orders WHERE order_number = $1")
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn order_number_exists(&self, order_number: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE order_number = $1)")
                .bind(order_number)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn list_for_user(&self, user_id: UserId, query: &ListQuery) -> Result<Page<Order>> {
        let query = query.normalized();

        // sort column and direction come from fixed enums, never from
        // client strings
        let mut select = format!(
            "SELECT doc, version FROM orders WHERE user_id = $1{}",
            if query.status.is_some() {
                " AND status = $2"
            } else {
                ""
            }
        );
        select.push_str(&format!(
            " ORDER BY {} {} LIMIT {} OFFSET {}",
            query.sort_by.column(),
            query.sort_order.keyword(),
            query.limit,
            query.offset()
        ));

        let count_sql = format!(
            "SELECT COUNT(*) FROM orders WHERE user_id = $1{}",
            if query.status.is_some() {
                " AND status = $2"
            } else {
                ""
            }
        );

        let (rows, total): (Vec<PgRow>, i64) = match query.status {
            Some(status) => {
                let rows = sqlx::query(&select)
                    .bind(user_id.as_uuid())
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?;
                let total: i64 = sqlx::query_scalar(&count_sql)
                    .bind(user_id.as_uuid())
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await?;
                (rows, total)
            }
            None => {
                let rows = sqlx::query(&select)
                    .bind(user_id.as_uuid())
                    .fetch_all(&self.pool)
                    .await?;
                let total: i64 = sqlx::query_scalar(&count_sql)
                    .bind(user_id.as_uuid())
                    .fetch_one(&self.pool)
                    .await?;
                (rows, total)
            }
        };

        let orders: Vec<Order> = rows
            .into_iter()
            .map(Self::row_to_order)
            .collect::<Result<_>>()?;

        Ok(Page::new(orders, query.page, query.limit, total as u64))
    }

    async fn stats_for_user(&self, user_id: UserId) -> Result<OrderStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_orders,
                COALESCE(SUM(total_cents) FILTER (WHERE status <> 'cancelled'), 0)::BIGINT AS spent_cents,
                COUNT(*) FILTER (WHERE status = 'delivered') AS delivered_orders,
                COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled_orders
            FROM orders
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(OrderStats {
            total_orders: row.try_get::<i64, _>("total_orders")? as u64,
            total_spent: Money::from_cents(row.try_get("spent_cents")?),
            delivered_orders: row.try_get::<i64, _>("delivered_orders")? as u64,
            cancelled_orders: row.try_get::<i64, _>("cancelled_orders")? as u64,
        })
    }
}
