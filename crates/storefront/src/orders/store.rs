//! The remote order collection, as seen by the repository.

use std::future::Future;

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use opticart_core::{Identity, Order, OrderId, OrderPayload, OrderStatus};
use thiserror::Error;

/// Errors that can occur during order store operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested order was not found.
    #[error("not found")]
    NotFound,

    /// A compare-and-set precondition did not hold.
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The caller is not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The store cannot be reached.
    #[error("order store unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Whether retrying the same operation later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Unavailable(_))
    }
}

/// An order ready to be written, before the store assigns its ID.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub payload: OrderPayload,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Which orders a query or feed may return.
#[derive(Debug, Clone)]
pub enum FeedScope {
    /// Every order (administrators).
    All,
    /// Orders owned by this identity, see [`Identity::owns`].
    Owner(Identity),
}

impl FeedScope {
    /// The widest scope the identity is entitled to.
    #[must_use]
    pub fn for_identity(identity: &Identity) -> Self {
        if identity.is_admin {
            Self::All
        } else {
            Self::Owner(identity.clone())
        }
    }

    /// Whether the order falls inside this scope.
    #[must_use]
    pub fn includes(&self, order: &Order) -> bool {
        match self {
            Self::All => true,
            Self::Owner(identity) => identity.owns(order),
        }
    }
}

/// Stream of "something changed" signals from the store.
pub type ChangeStream = BoxStream<'static, Result<(), RepositoryError>>;

/// A document-style order collection.
///
/// Implementations assign IDs on insert, return lists newest-first, overwrite
/// the status field, and expose a live change signal. They do not check who is
/// calling; [`OrderRepository`](super::OrderRepository) does that.
pub trait OrderStore: Send + Sync + 'static {
    /// Insert one order and return its new ID.
    fn insert(
        &self,
        order: NewOrder,
    ) -> impl Future<Output = Result<OrderId, RepositoryError>> + Send;

    /// Read one order by ID, regardless of owner.
    fn get(
        &self,
        id: &OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// All orders in `scope`, newest first.
    fn list(
        &self,
        scope: &FeedScope,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Overwrite an order's status.
    ///
    /// With `expected = Some(s)` the write only happens if the current status
    /// is `s`; otherwise `RepositoryError::Conflict` is returned.
    fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        expected: Option<OrderStatus>,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Subscribe to change signals. One item is yielded per insert or update.
    fn changes(&self) -> impl Future<Output = Result<ChangeStream, RepositoryError>> + Send;
}
