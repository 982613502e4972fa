//! Fan-out of one upstream change stream to any number of feeds.
//!
//! A store whose change source is expensive (a `LISTEN` connection held out
//! of the pool) connects it once and hands every caller of
//! [`OrderStore::changes`](super::OrderStore::changes) a broadcast receiver.
//! When the upstream fails, every subscriber sees the error and the next
//! subscription reconnects.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};

use super::store::{ChangeStream, RepositoryError};

const RELAY_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy)]
enum Signal {
    Changed,
    Lost,
}

/// Shares one upstream change stream between subscribers. Clones share it too.
#[derive(Debug, Clone, Default)]
pub struct ChangeRelay {
    upstream: Arc<Mutex<Option<broadcast::Sender<Signal>>>>,
}

impl ChangeRelay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the shared stream, calling `connect` only if no upstream
    /// is running.
    ///
    /// # Errors
    ///
    /// Returns the error from `connect`.
    pub async fn subscribe<F, Fut>(&self, connect: F) -> Result<ChangeStream, RepositoryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ChangeStream, RepositoryError>>,
    {
        let mut slot = self.upstream.lock().await;
        let rx = if let Some(tx) = slot.as_ref() {
            tx.subscribe()
        } else {
            let source = connect().await?;
            let (tx, rx) = broadcast::channel(RELAY_CAPACITY);
            *slot = Some(tx.clone());
            tokio::spawn(forward(source, tx, Arc::clone(&self.upstream)));
            debug!("Order change relay connected");
            rx
        };
        drop(slot);

        Ok(Box::pin(async_stream::stream! {
            let mut rx = rx;
            loop {
                match rx.recv().await {
                    // A lagged receiver still only needs one refresh.
                    Ok(Signal::Changed) | Err(RecvError::Lagged(_)) => yield Ok(()),
                    Ok(Signal::Lost) => {
                        yield Err(RepositoryError::Unavailable(
                            "order change notifications were interrupted".to_owned(),
                        ));
                        break;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }))
    }

    /// Number of live subscribers, zero when no upstream is connected.
    pub async fn subscriber_count(&self) -> usize {
        self.upstream
            .lock()
            .await
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

async fn forward(
    mut source: ChangeStream,
    tx: broadcast::Sender<Signal>,
    upstream: Arc<Mutex<Option<broadcast::Sender<Signal>>>>,
) {
    let failure = loop {
        match source.next().await {
            Some(Ok(())) => {
                // No subscribers is fine.
                let _ = tx.send(Signal::Changed);
            }
            Some(Err(e)) => break Some(e),
            None => break None,
        }
    };

    // Under the lock so no one subscribes between the signal and the reset.
    let mut slot = upstream.lock().await;
    match failure {
        Some(e) => {
            warn!(error = %e, "Order change relay lost its upstream");
            let _ = tx.send(Signal::Lost);
        }
        None => debug!("Order change relay upstream ended"),
    }
    *slot = None;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;

    /// An upstream driven by the test through the returned sender.
    fn scripted_source() -> (
        mpsc::UnboundedSender<Result<(), RepositoryError>>,
        ChangeStream,
    ) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stream = Box::pin(async_stream::stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        });
        (tx, stream)
    }

    async fn next(stream: &mut ChangeStream) -> Option<Result<(), RepositoryError>> {
        timeout(Duration::from_secs(1), stream.next()).await.unwrap()
    }

    #[tokio::test]
    async fn test_many_subscribers_share_one_connection() {
        let relay = ChangeRelay::new();
        let connects = AtomicUsize::new(0);
        let (source_tx, source) = scripted_source();
        let mut source = Some(source);

        let mut feeds = Vec::new();
        for _ in 0..20 {
            let stream = relay
                .subscribe(|| {
                    connects.fetch_add(1, Ordering::SeqCst);
                    let source = source.take();
                    async move {
                        source.ok_or_else(|| {
                            RepositoryError::Unavailable("connected twice".to_owned())
                        })
                    }
                })
                .await
                .unwrap();
            feeds.push(stream);
        }
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(relay.subscriber_count().await, 20);

        source_tx.send(Ok(())).unwrap();
        for feed in &mut feeds {
            assert!(matches!(next(feed).await, Some(Ok(()))));
        }

        feeds.truncate(5);
        assert_eq!(relay.subscriber_count().await, 5);
    }

    #[tokio::test]
    async fn test_lost_upstream_reaches_subscribers_and_reconnects() {
        let relay = ChangeRelay::new();
        let (first_tx, first) = scripted_source();
        let mut feed = relay.subscribe(|| async { Ok(first) }).await.unwrap();

        first_tx
            .send(Err(RepositoryError::Unavailable("connection reset".to_owned())))
            .unwrap();
        assert!(matches!(
            next(&mut feed).await,
            Some(Err(RepositoryError::Unavailable(_)))
        ));
        assert!(next(&mut feed).await.is_none());

        // The slot is cleared once the failure has been broadcast.
        timeout(Duration::from_secs(1), async {
            while relay.upstream.lock().await.is_some() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let (second_tx, second) = scripted_source();
        let mut feed = relay.subscribe(|| async { Ok(second) }).await.unwrap();
        second_tx.send(Ok(())).unwrap();
        assert!(matches!(next(&mut feed).await, Some(Ok(()))));
    }

    #[tokio::test]
    async fn test_failed_connect_is_reported_and_retried() {
        let relay = ChangeRelay::new();
        let err = relay
            .subscribe(|| async { Err(RepositoryError::Unavailable("refused".to_owned())) })
            .await
            .err()
            .unwrap();
        assert!(err.is_retryable());

        let (_tx, source) = scripted_source();
        assert!(relay.subscribe(|| async { Ok(source) }).await.is_ok());
    }
}
