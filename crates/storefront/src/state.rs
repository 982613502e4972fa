//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use uuid::Uuid;

use crate::checkout::SubmissionGuard;
use crate::config::StorefrontConfig;
use crate::orders::{MemoryOrderStore, OrderBackend, OrderRepository, PgOrderStore};

/// How long an unused draft's submission guard is remembered.
const GUARD_IDLE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on remembered guards.
const GUARD_CAPACITY: u64 = 100_000;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the order repository and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: Option<PgPool>,
    orders: OrderRepository,
    guards: Cache<Uuid, SubmissionGuard>,
}

impl AppState {
    /// State backed by `PostgreSQL`.
    #[must_use]
    pub fn with_postgres(config: StorefrontConfig, pool: PgPool) -> Self {
        let orders = OrderRepository::new(OrderBackend::Postgres(PgOrderStore::new(pool.clone())));
        Self::build(config, Some(pool), orders)
    }

    /// State keeping orders in process memory.
    #[must_use]
    pub fn in_memory(config: StorefrontConfig, store: MemoryOrderStore) -> Self {
        Self::build(config, None, OrderRepository::new(OrderBackend::Memory(store)))
    }

    fn build(config: StorefrontConfig, pool: Option<PgPool>, orders: OrderRepository) -> Self {
        let guards = Cache::builder()
            .max_capacity(GUARD_CAPACITY)
            .time_to_idle(GUARD_IDLE_TTL)
            .build();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                orders,
                guards,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The database pool, if running against `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Get a reference to the order repository.
    #[must_use]
    pub fn orders(&self) -> &OrderRepository {
        &self.inner.orders
    }

    /// The submission guard for a checkout draft.
    ///
    /// Every request carrying the same draft gets the same guard.
    pub async fn submission_guard(&self, draft_id: Uuid) -> SubmissionGuard {
        self.inner
            .guards
            .get_with(draft_id, async { SubmissionGuard::new() })
            .await
    }
}
