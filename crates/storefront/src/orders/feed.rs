//! Live, scoped order feeds.
//!
//! A feed owns a background task that listens for store changes and re-queries
//! its scope, publishing each result as an immutable [`FeedSnapshot`]. Readers
//! hold cheap clones of the latest snapshot and never see a half-applied
//! update. Dropping the feed stops the task.

use std::sync::Arc;

use futures::StreamExt;
use opticart_core::{Order, OrderId};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::store::{FeedScope, OrderStore, RepositoryError};

/// Where a feed is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    /// Waiting for the first result.
    Loading,
    /// Showing the store's latest result.
    Live,
    /// The subscription failed; showing an empty list for this session.
    Degraded,
}

/// One published view of the feed.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    /// Orders in scope, newest first.
    pub orders: Arc<[Order]>,
    pub status: FeedStatus,
}

impl FeedSnapshot {
    fn empty(status: FeedStatus) -> Self {
        Self {
            orders: Arc::from(Vec::new()),
            status,
        }
    }

    /// Find an order in this snapshot.
    #[must_use]
    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.orders.iter().find(|order| &order.id == id)
    }
}

/// A subscription to the orders visible to one caller.
#[derive(Debug)]
pub struct OrderFeed {
    rx: watch::Receiver<FeedSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl OrderFeed {
    /// A feed that never shows anything (anonymous callers).
    pub(crate) fn empty() -> Self {
        let (_tx, rx) = watch::channel(FeedSnapshot::empty(FeedStatus::Live));
        Self { rx, task: None }
    }

    /// Start a feed for `scope`. Must be called inside a Tokio runtime.
    pub(crate) fn spawn<S: OrderStore>(store: Arc<S>, scope: FeedScope) -> Self {
        let (tx, rx) = watch::channel(FeedSnapshot::empty(FeedStatus::Loading));
        let task = tokio::spawn(run(store, scope, tx));
        Self {
            rx,
            task: Some(task),
        }
    }

    /// Wait until the first result (or a failure) has been published.
    pub async fn ready(&mut self) -> FeedSnapshot {
        let ready = self
            .rx
            .wait_for(|snapshot| snapshot.status != FeedStatus::Loading)
            .await
            .map(|snapshot| snapshot.clone());
        ready.unwrap_or_else(|_| self.rx.borrow().clone())
    }

    /// Wait for the next published snapshot.
    ///
    /// Returns `None` once the feed has stopped and will not publish again.
    pub async fn changed(&mut self) -> Option<FeedSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// The latest snapshot.
    #[must_use]
    pub fn current(&self) -> FeedSnapshot {
        self.rx.borrow().clone()
    }

    /// Look an order up in the current snapshot.
    #[must_use]
    pub fn get_by_id(&self, id: &OrderId) -> Option<Order> {
        self.rx.borrow().get(id).cloned()
    }

    /// Stop the feed. Equivalent to dropping it.
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for OrderFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run<S: OrderStore>(store: Arc<S>, scope: FeedScope, tx: watch::Sender<FeedSnapshot>) {
    // Subscribe before the first query so no write between the two is missed.
    let mut changes = match store.changes().await {
        Ok(changes) => changes,
        Err(e) => {
            degrade(&tx, &e);
            return;
        }
    };

    if let Err(e) = refresh(store.as_ref(), &scope, &tx).await {
        degrade(&tx, &e);
        return;
    }

    loop {
        tokio::select! {
            () = tx.closed() => {
                debug!("Order feed has no readers, stopping");
                return;
            }
            change = changes.next() => match change {
                Some(Ok(())) => {
                    if let Err(e) = refresh(store.as_ref(), &scope, &tx).await {
                        degrade(&tx, &e);
                        return;
                    }
                }
                Some(Err(e)) => {
                    degrade(&tx, &e);
                    return;
                }
                None => {
                    debug!("Order change stream ended");
                    return;
                }
            }
        }
    }
}

async fn refresh<S: OrderStore>(
    store: &S,
    scope: &FeedScope,
    tx: &watch::Sender<FeedSnapshot>,
) -> Result<(), RepositoryError> {
    let orders = store.list(scope).await?;
    tx.send_replace(FeedSnapshot {
        orders: orders.into(),
        status: FeedStatus::Live,
    });
    Ok(())
}

fn degrade(tx: &watch::Sender<FeedSnapshot>, error: &RepositoryError) {
    warn!(error = %error, "Order feed failed, showing no orders for this session");
    tx.send_replace(FeedSnapshot::empty(FeedStatus::Degraded));
}
