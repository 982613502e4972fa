//! In-process order store.
//!
//! Used when no database is configured and by tests. Clones share the same
//! collection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use opticart_core::{Order, OrderId, OrderStatus};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::store::{ChangeStream, FeedScope, NewOrder, OrderStore, RepositoryError};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Orders held in memory with broadcast change notifications.
#[derive(Debug, Clone)]
pub struct MemoryOrderStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    orders: Mutex<Vec<Order>>,
    changes: broadcast::Sender<()>,
    unavailable: AtomicBool,
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                orders: Mutex::new(Vec::new()),
                changes,
                unavailable: AtomicBool::new(false),
            }),
        }
    }

    /// Insert a fully formed order as-is, keeping its ID and timestamps.
    pub fn seed(&self, order: Order) {
        self.orders().push(order);
        self.notify();
    }

    /// Number of stored orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders().len()
    }

    /// Whether the store holds no orders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Simulate an outage: every operation fails with `Unavailable` until
    /// switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            Err(RepositoryError::Unavailable(
                "in-memory store is offline".to_owned(),
            ))
        } else {
            Ok(())
        }
    }

    fn orders(&self) -> MutexGuard<'_, Vec<Order>> {
        self.inner
            .orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        // No receivers is fine.
        let _ = self.inner.changes.send(());
    }
}

impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<OrderId, RepositoryError> {
        self.check_available()?;
        let id = OrderId::generate();
        self.orders().push(Order::from_payload(
            id.clone(),
            order.payload,
            order.status,
            order.created_at,
        ));
        self.notify();
        Ok(id)
    }

    async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        self.check_available()?;
        Ok(self.orders().iter().find(|order| &order.id == id).cloned())
    }

    async fn list(&self, scope: &FeedScope) -> Result<Vec<Order>, RepositoryError> {
        self.check_available()?;
        // Newest insert first, then a stable sort keeps that order for equal timestamps.
        let mut orders: Vec<Order> = self
            .orders()
            .iter()
            .rev()
            .filter(|order| scope.includes(order))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        expected: Option<OrderStatus>,
    ) -> Result<(), RepositoryError> {
        self.check_available()?;
        {
            let mut orders = self.orders();
            let order = orders
                .iter_mut()
                .find(|order| &order.id == id)
                .ok_or(RepositoryError::NotFound)?;
            if let Some(expected) = expected
                && order.status != expected
            {
                return Err(RepositoryError::Conflict(format!(
                    "order {id} is {}, expected {expected}",
                    order.status
                )));
            }
            order.status = status;
        }
        self.notify();
        Ok(())
    }

    async fn changes(&self) -> Result<ChangeStream, RepositoryError> {
        self.check_available()?;
        let mut rx = self.inner.changes.subscribe();
        Ok(Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    // A lagged receiver still only needs one refresh.
                    Ok(()) | Err(RecvError::Lagged(_)) => yield Ok(()),
                    Err(RecvError::Closed) => break,
                }
            }
        }))
    }
}
