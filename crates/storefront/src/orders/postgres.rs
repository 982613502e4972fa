//! `PostgreSQL` order store.
//!
//! Orders live in `storefront.orders`; line items are a JSONB snapshot. A
//! trigger on the table sends `NOTIFY` on [`ORDER_CHANNEL`], which backs the
//! live feed. One listener connection per store serves every feed through a
//! [`ChangeRelay`].

use chrono::{DateTime, Utc};
use opticart_core::{CartLine, Email, Order, OrderId, OrderStatus, PaymentMethod, Price, UserId};
use sqlx::postgres::PgListener;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use super::relay::ChangeRelay;
use super::store::{ChangeStream, FeedScope, NewOrder, OrderStore, RepositoryError};

/// Channel the `orders_changed` trigger notifies on.
pub const ORDER_CHANNEL: &str = "opticart_orders_changed";

const SELECT_ALL: &str = r"
    SELECT id, customer_name, email, phone, address, user_id, items, total,
           payment_method, bkash_number, transaction_id, status, created_at
    FROM storefront.orders
    ORDER BY created_at DESC, id DESC
";

const SELECT_ONE: &str = r"
    SELECT id, customer_name, email, phone, address, user_id, items, total,
           payment_method, bkash_number, transaction_id, status, created_at
    FROM storefront.orders
    WHERE id = $1
";

const SELECT_OWNED: &str = r"
    SELECT id, customer_name, email, phone, address, user_id, items, total,
           payment_method, bkash_number, transaction_id, status, created_at
    FROM storefront.orders
    WHERE user_id = $1
       OR (user_id IS NULL AND $2::text IS NOT NULL AND lower(email) = lower($2))
    ORDER BY created_at DESC, id DESC
";

/// Internal row type for order queries.
#[derive(Debug, FromRow)]
struct OrderRow {
    id: OrderId,
    customer_name: String,
    email: String,
    phone: String,
    address: String,
    user_id: Option<UserId>,
    items: Json<Vec<CartLine>>,
    total: i64,
    payment_method: String,
    bkash_number: Option<String>,
    transaction_id: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status: OrderStatus = row.status.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.id))
        })?;
        let payment_method: PaymentMethod = row.payment_method.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            customer_name: row.customer_name,
            email: row.email,
            phone: row.phone,
            address: row.address,
            user_id: row.user_id,
            items: row.items.0,
            total: Price::new(row.total),
            payment_method,
            bkash_number: row.bkash_number,
            transaction_id: row.transaction_id,
            status,
            created_at: row.created_at,
        })
    }
}

/// Order store backed by a `PostgreSQL` pool. Clones share the listener.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
    changes: ChangeRelay,
}

impl PgOrderStore {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            changes: ChangeRelay::new(),
        }
    }

    async fn listen(&self) -> Result<ChangeStream, RepositoryError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(ORDER_CHANNEL).await?;

        Ok(Box::pin(async_stream::stream! {
            loop {
                match listener.recv().await {
                    Ok(_) => yield Ok(()),
                    Err(e) => {
                        yield Err(RepositoryError::Database(e));
                        break;
                    }
                }
            }
        }))
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl OrderStore for PgOrderStore {
    #[tracing::instrument(skip(self, order), fields(items = order.payload.items.len()))]
    async fn insert(&self, order: NewOrder) -> Result<OrderId, RepositoryError> {
        let id = OrderId::generate();
        let payload = order.payload;

        sqlx::query(
            r"
            INSERT INTO storefront.orders (
                id, customer_name, email, phone, address, user_id, items, total,
                payment_method, bkash_number, transaction_id, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(id.clone())
        .bind(payload.customer_name)
        .bind(payload.email)
        .bind(payload.phone)
        .bind(payload.address)
        .bind(payload.user_id)
        .bind(Json(payload.items))
        .bind(payload.total.units())
        .bind(payload.payment_method.as_str())
        .bind(payload.bkash_number)
        .bind(payload.transaction_id)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(SELECT_ONE)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Order::try_from).transpose()
    }

    async fn list(&self, scope: &FeedScope) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = match scope {
            FeedScope::All => {
                sqlx::query_as(SELECT_ALL)
                    .fetch_all(&self.pool)
                    .await?
            }
            FeedScope::Owner(identity) => {
                sqlx::query_as(SELECT_OWNED)
                    .bind(identity.user_id.as_str())
                    .bind(identity.email.as_ref().map(Email::as_str))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(Order::try_from).collect()
    }

    #[tracing::instrument(skip(self), fields(order_id = %id))]
    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        expected: Option<OrderStatus>,
    ) -> Result<(), RepositoryError> {
        let updated: Option<OrderId> = sqlx::query_scalar(
            r"
            UPDATE storefront.orders
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND ($3::text IS NULL OR status = $3)
            RETURNING id
            ",
        )
        .bind(id.as_str())
        .bind(status.as_str())
        .bind(expected.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        if updated.is_some() {
            return Ok(());
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM storefront.orders WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match current {
            None => Err(RepositoryError::NotFound),
            Some(actual) => Err(RepositoryError::Conflict(format!(
                "order {id} is {actual}, expected {}",
                expected.map_or("any", |s| s.as_str())
            ))),
        }
    }

    async fn changes(&self) -> Result<ChangeStream, RepositoryError> {
        self.changes.subscribe(|| self.listen()).await
    }
}
