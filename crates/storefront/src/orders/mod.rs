//! Order persistence, live feeds, and status administration.
//!
//! [`OrderRepository`] is the only way the rest of the crate touches orders.
//! It enforces who may see and change what; the [`OrderStore`] behind it is a
//! plain collection.

mod feed;
pub mod memory;
pub mod postgres;
pub mod relay;
pub mod store;

use std::sync::Arc;

use chrono::Utc;
use opticart_core::{Identity, Order, OrderId, OrderPayload, OrderStatus};
use tracing::{info, instrument, warn};

pub use feed::{FeedSnapshot, FeedStatus, OrderFeed};
pub use memory::MemoryOrderStore;
pub use postgres::PgOrderStore;
pub use relay::ChangeRelay;
pub use store::{ChangeStream, FeedScope, NewOrder, OrderStore, RepositoryError};

/// The store selected at startup.
#[derive(Debug, Clone)]
pub enum OrderBackend {
    Memory(MemoryOrderStore),
    Postgres(PgOrderStore),
}

impl OrderStore for OrderBackend {
    async fn insert(&self, order: NewOrder) -> Result<OrderId, RepositoryError> {
        match self {
            Self::Memory(store) => store.insert(order).await,
            Self::Postgres(store) => store.insert(order).await,
        }
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        match self {
            Self::Memory(store) => store.get(id).await,
            Self::Postgres(store) => store.get(id).await,
        }
    }

    async fn list(&self, scope: &FeedScope) -> Result<Vec<Order>, RepositoryError> {
        match self {
            Self::Memory(store) => store.list(scope).await,
            Self::Postgres(store) => store.list(scope).await,
        }
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        expected: Option<OrderStatus>,
    ) -> Result<(), RepositoryError> {
        match self {
            Self::Memory(store) => store.update_status(id, status, expected).await,
            Self::Postgres(store) => store.update_status(id, status, expected).await,
        }
    }

    async fn changes(&self) -> Result<ChangeStream, RepositoryError> {
        match self {
            Self::Memory(store) => store.changes().await,
            Self::Postgres(store) => store.changes().await,
        }
    }
}

/// Access-controlled gateway to the order store.
#[derive(Debug)]
pub struct OrderRepository<S = OrderBackend> {
    store: Arc<S>,
}

impl<S> Clone for OrderRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: OrderStore> OrderRepository<S> {
    /// Create a repository over `store`.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist a new order with status `Pending` and the current time.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged; nothing is retried.
    #[instrument(skip_all, fields(items = payload.items.len(), guest = payload.user_id.is_none()))]
    pub async fn create(&self, payload: OrderPayload) -> Result<OrderId, RepositoryError> {
        let order = NewOrder {
            payload,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        let id = self.store.insert(order).await?;
        info!(order_id = %id, "Order created");
        Ok(id)
    }

    /// Open a live feed of the orders `identity` may see.
    ///
    /// Administrators see every order, customers see their own, anonymous
    /// callers get an empty feed without touching the store. Must be called
    /// inside a Tokio runtime.
    #[must_use]
    pub fn subscribe(&self, identity: Option<&Identity>) -> OrderFeed {
        match identity {
            Some(identity) => {
                OrderFeed::spawn(Arc::clone(&self.store), FeedScope::for_identity(identity))
            }
            None => OrderFeed::empty(),
        }
    }

    /// One-shot query of the orders `identity` may see, newest first.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn list(&self, identity: Option<&Identity>) -> Result<Vec<Order>, RepositoryError> {
        match identity {
            Some(identity) => self.store.list(&FeedScope::for_identity(identity)).await,
            None => Ok(Vec::new()),
        }
    }

    /// Read one order directly from the store, bypassing any feed.
    ///
    /// No access check is made; callers decide what the caller may see.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn fetch(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        self.store.get(id).await
    }

    /// Overwrite an order's status. Administrators only.
    ///
    /// With `expected` set the write is a compare-and-set against the current
    /// status; without it the last write wins.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` for non-administrators, `NotFound` for an unknown
    /// ID, `Conflict` when `expected` does not match, or the store's error.
    #[instrument(skip(self, identity), fields(order_id = %id, user_id = %identity.user_id))]
    pub async fn update_status(
        &self,
        identity: &Identity,
        id: &OrderId,
        status: OrderStatus,
        expected: Option<OrderStatus>,
    ) -> Result<(), RepositoryError> {
        if !identity.is_admin {
            warn!("Non-admin attempted an order status change");
            return Err(RepositoryError::Forbidden(
                "only administrators can change order status".to_owned(),
            ));
        }

        self.store.update_status(id, status, expected).await?;
        info!(status = %status, "Order status updated");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use opticart_core::{CartLine, CatalogItem, Email, PaymentMethod, Price, UserId};

    use super::*;

    fn repo() -> OrderRepository<MemoryOrderStore> {
        OrderRepository::new(MemoryOrderStore::new())
    }

    fn payload(user: Option<&str>, email: &str) -> OrderPayload {
        let mut line = CartLine::from_item(CatalogItem {
            product_id: "A".into(),
            variant_key: None,
            name: "Frame A".to_owned(),
            unit_price: Price::new(1500),
            image: String::new(),
        });
        line.quantity = 2;
        OrderPayload {
            customer_name: "Rahim Uddin".to_owned(),
            email: email.to_owned(),
            user_id: user.map(UserId::new),
            address: "House 12, Road 5, Dhanmondi".to_owned(),
            phone: "01712345678".to_owned(),
            items: vec![line],
            total: Price::new(3250),
            payment_method: PaymentMethod::CashOnDelivery,
            bkash_number: None,
            transaction_id: None,
        }
    }

    async fn next_live(feed: &mut OrderFeed, len: usize) -> FeedSnapshot {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let snapshot = feed.current();
                if snapshot.status == FeedStatus::Live && snapshot.orders.len() == len {
                    return snapshot;
                }
                feed.changed().await.unwrap();
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_sets_pending_and_timestamp() {
        let repo = repo();
        let before = Utc::now();
        let id = repo.create(payload(Some("U1"), "a@example.com")).await.unwrap();

        let orders = repo.store().list(&FeedScope::All).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, id);
        assert_eq!(orders[0].status, OrderStatus::Pending);
        assert!(orders[0].created_at >= before);
    }

    #[tokio::test]
    async fn test_create_surfaces_store_failure() {
        let repo = repo();
        repo.store().set_unavailable(true);
        let err = repo.create(payload(None, "a@example.com")).await.unwrap_err();
        assert!(err.is_retryable());
        repo.store().set_unavailable(false);
        assert!(repo.store().is_empty());
    }

    #[tokio::test]
    async fn test_feed_scopes_by_identity() {
        let repo = repo();
        repo.create(payload(Some("U1"), "one@example.com")).await.unwrap();
        repo.create(payload(Some("U2"), "two@example.com")).await.unwrap();
        repo.create(payload(None, "One@Example.com")).await.unwrap();

        let customer = Identity::customer("U1", Some(Email::parse("one@example.com").unwrap()));
        let mut mine = repo.subscribe(Some(&customer));
        let snapshot = mine.ready().await;
        assert_eq!(snapshot.status, FeedStatus::Live);
        // own order plus the guest order placed with the same email
        assert_eq!(snapshot.orders.len(), 2);

        let mut all = repo.subscribe(Some(&Identity::admin("root")));
        assert_eq!(all.ready().await.orders.len(), 3);

        let mut anonymous = repo.subscribe(None);
        assert!(anonymous.ready().await.orders.is_empty());
    }

    #[tokio::test]
    async fn test_feed_receives_live_updates() {
        let repo = repo();
        let admin = Identity::admin("root");
        let mut feed = repo.subscribe(Some(&admin));
        assert!(feed.ready().await.orders.is_empty());

        let id = repo.create(payload(Some("U1"), "a@example.com")).await.unwrap();
        let snapshot = next_live(&mut feed, 1).await;
        assert_eq!(snapshot.orders[0].id, id);

        repo.update_status(&admin, &id, OrderStatus::Shipped, None)
            .await
            .unwrap();
        let updated = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(order) = feed.get_by_id(&id)
                    && order.status == OrderStatus::Shipped
                {
                    return order;
                }
                feed.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        assert_eq!(updated.status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_snapshots_are_not_mutated_by_later_updates() {
        let repo = repo();
        let admin = Identity::admin("root");
        let id = repo.create(payload(None, "a@example.com")).await.unwrap();

        let mut feed = repo.subscribe(Some(&admin));
        let before = feed.ready().await;
        repo.update_status(&admin, &id, OrderStatus::Cancelled, None)
            .await
            .unwrap();
        feed.changed().await.unwrap();

        assert_eq!(before.orders[0].status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_feed_degrades_when_store_is_down() {
        let repo = repo();
        repo.store().set_unavailable(true);
        let mut feed = repo.subscribe(Some(&Identity::customer("U1", None)));
        let snapshot = feed.ready().await;
        assert_eq!(snapshot.status, FeedStatus::Degraded);
        assert!(snapshot.orders.is_empty());
    }

    #[tokio::test]
    async fn test_non_admin_cannot_update_status() {
        let repo = repo();
        let id = repo.create(payload(Some("U1"), "a@example.com")).await.unwrap();
        let err = repo
            .update_status(
                &Identity::customer("U1", None),
                &id,
                OrderStatus::Delivered,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Forbidden(_)));

        let orders = repo.store().list(&FeedScope::All).await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_status_change_with_stale_expectation_conflicts() {
        let repo = repo();
        let admin = Identity::admin("root");
        let id = repo.create(payload(None, "a@example.com")).await.unwrap();
        repo.update_status(&admin, &id, OrderStatus::Processing, Some(OrderStatus::Pending))
            .await
            .unwrap();
        let err = repo
            .update_status(&admin, &id, OrderStatus::Cancelled, Some(OrderStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_for_anonymous_is_empty() {
        let repo = repo();
        repo.create(payload(None, "a@example.com")).await.unwrap();
        assert!(repo.list(None).await.unwrap().is_empty());
    }
}
