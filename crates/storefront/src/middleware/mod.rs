//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions, `PostgreSQL` or in-memory store)
//! 5. Gateway identity (only when `STOREFRONT_TRUST_AUTH_HEADERS` is set)

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{
    OptionalIdentity, RequireAdmin, clear_current_identity, gateway_identity_middleware,
    set_current_identity,
};
pub use request_id::request_id_middleware;
pub use session::{create_memory_session_layer, create_session_layer};
