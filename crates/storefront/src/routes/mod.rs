//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Liveness check
//! GET  /health/ready                - Readiness check (database ping)
//!
//! # Cart
//! GET  /cart                        - Cart contents and totals
//! POST /cart/add                    - Add one unit of a catalog item
//! POST /cart/update                 - Set a line's quantity
//! POST /cart/remove                 - Remove a line
//! POST /cart/clear                  - Empty the cart
//! GET  /cart/count                  - Cart badge count
//!
//! # Checkout
//! GET  /checkout                    - Draft state (or empty-cart state)
//! POST /checkout/field              - Edit (and optionally blur) a field
//! POST /checkout/continue           - Shipping -> payment
//! POST /checkout/back               - Payment -> shipping
//! POST /checkout/payment-method     - Choose payment method
//! POST /checkout/submit             - Place the order
//!
//! # Orders
//! GET  /orders                      - The caller's orders
//! GET  /orders/live                 - Server-sent order updates
//! GET  /orders/{id}                 - Invoice data
//! GET  /orders/{id}/print           - Printable invoice
//! GET  /orders/{id}/tracking        - Delivery progress
//!
//! # Admin (requires administrator)
//! GET  /admin/orders                - All orders, optional ?status=
//! POST /admin/orders/{id}/status    - Change an order's status
//! ```

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod orders;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/field", post(checkout::set_field))
        .route("/continue", post(checkout::continue_to_payment))
        .route("/back", post(checkout::back))
        .route("/payment-method", post(checkout::payment_method))
        .route("/submit", post(checkout::submit))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/live", get(orders::live))
        .route("/{id}", get(orders::show))
        .route("/{id}/print", get(orders::print))
        .route("/{id}/tracking", get(orders::tracking))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(admin::index))
        .route("/orders/{id}/status", post(admin::update_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/orders", order_routes())
        .nest("/admin", admin_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Pings the database when there is one. Returns 503 Service Unavailable if
/// it is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
