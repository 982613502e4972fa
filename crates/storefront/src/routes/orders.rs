//! Order history, live updates, invoices, and tracking.

use std::convert::Infallible;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use opticart_core::{Identity, Order, OrderId, OrderStatus};
use serde::Serialize;
use tower_sessions::Session;
use tracing::{debug, instrument};

use crate::error::{AppError, Result};
use crate::invoice::{self, Invoice, InvoiceLookup, TrackingProgress};
use crate::middleware::OptionalIdentity;
use crate::models::{Receipts, session_keys};
use crate::orders::{FeedSnapshot, FeedStatus};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// The caller's orders.
#[derive(Debug, Serialize)]
pub struct OrdersView {
    pub orders: Vec<Order>,
    pub status: FeedStatus,
}

impl From<&FeedSnapshot> for OrdersView {
    fn from(snapshot: &FeedSnapshot) -> Self {
        Self {
            orders: snapshot.orders.to_vec(),
            status: snapshot.status,
        }
    }
}

/// Tracking data for one order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub progress: TrackingProgress,
}

/// One printed invoice line.
#[derive(Debug, Clone)]
pub struct InvoiceLineView {
    pub name: String,
    pub variant: Option<String>,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

/// Printable invoice.
#[derive(Template, WebTemplate)]
#[template(path = "orders/invoice.html")]
pub struct InvoiceTemplate {
    pub order_id: String,
    pub placed_at: String,
    pub status: &'static str,
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub payment_method: &'static str,
    pub transaction_id: Option<String>,
    pub lines: Vec<InvoiceLineView>,
    pub subtotal: String,
    pub shipping: String,
    pub tax: String,
    pub total: String,
    pub printed_at: String,
}

impl From<Invoice> for InvoiceTemplate {
    fn from(invoice: Invoice) -> Self {
        let Invoice { order, totals, .. } = invoice;
        let lines = order
            .items
            .iter()
            .map(|line| InvoiceLineView {
                name: line.name.clone(),
                variant: line.variant_key.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price.to_string(),
                line_total: line.line_total().to_string(),
            })
            .collect();

        Self {
            placed_at: order.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            status: order.status.label(),
            payment_method: order.payment_method.label(),
            transaction_id: order.transaction_id,
            customer_name: order.customer_name,
            email: order.email,
            phone: order.phone,
            address: order.address,
            order_id: order.id.into_inner(),
            lines,
            subtotal: totals.subtotal.to_string(),
            shipping: totals.shipping.to_string(),
            tax: totals.tax.to_string(),
            total: totals.total.to_string(),
            printed_at: chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Resolve an invoice for the caller, mapping the denials to errors.
async fn load_invoice(
    state: &AppState,
    session: &Session,
    identity: Option<&Identity>,
    id: &OrderId,
) -> Result<Invoice> {
    let receipts: Receipts = session
        .get(session_keys::RECEIPTS)
        .await?
        .unwrap_or_default();
    let order = state.orders().fetch(id).await?;

    match invoice::resolve(order, identity, receipts.as_slice()) {
        InvoiceLookup::Found(invoice) => Ok(*invoice),
        InvoiceLookup::NotFound => Err(AppError::NotFound(format!("order {id}"))),
        InvoiceLookup::AccessDenied => {
            debug!(order_id = %id, "Invoice access denied");
            Err(AppError::Forbidden(
                "you do not have access to this order".to_string(),
            ))
        }
    }
}

fn snapshot_event(snapshot: &FeedSnapshot) -> Event {
    let json = serde_json::to_string(&OrdersView::from(snapshot))
        .unwrap_or_else(|_| r#"{"orders":[],"status":"degraded"}"#.to_string());
    Event::default().event("orders").data(json)
}

// =============================================================================
// Handlers
// =============================================================================

/// The caller's orders, newest first.
///
/// Waits up to the configured feed timeout for the first result and returns
/// whatever the feed holds at that point.
#[instrument(skip(state, identity))]
pub async fn index(
    State(state): State<AppState>,
    OptionalIdentity(identity): OptionalIdentity,
) -> Json<OrdersView> {
    let mut feed = state.orders().subscribe(identity.as_ref());
    let timeout = state.config().feed_ready_timeout;

    let snapshot = match tokio::time::timeout(timeout, feed.ready()).await {
        Ok(snapshot) => snapshot,
        Err(_) => {
            debug!("Order feed not ready in time");
            feed.current()
        }
    };

    Json(OrdersView::from(&snapshot))
}

/// Stream the caller's orders, sending the full list on every change.
///
/// The feed stops when the client disconnects.
#[instrument(skip(state, identity))]
pub async fn live(
    State(state): State<AppState>,
    OptionalIdentity(identity): OptionalIdentity,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let mut feed = state.orders().subscribe(identity.as_ref());

    let events = async_stream::stream! {
        let first = feed.ready().await;
        yield Ok(snapshot_event(&first));
        while let Some(snapshot) = feed.changed().await {
            yield Ok(snapshot_event(&snapshot));
        }
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Invoice data for one order.
#[instrument(skip(state, session, identity), fields(order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(identity): OptionalIdentity,
    Path(id): Path<OrderId>,
) -> Result<Json<Invoice>> {
    let invoice = load_invoice(&state, &session, identity.as_ref(), &id).await?;
    Ok(Json(invoice))
}

/// Printable invoice page.
#[instrument(skip(state, session, identity), fields(order_id = %id))]
pub async fn print(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(identity): OptionalIdentity,
    Path(id): Path<OrderId>,
) -> Result<InvoiceTemplate> {
    let invoice = load_invoice(&state, &session, identity.as_ref(), &id).await?;
    Ok(InvoiceTemplate::from(invoice))
}

/// Delivery progress for one order.
#[instrument(skip(state, session, identity), fields(order_id = %id))]
pub async fn tracking(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(identity): OptionalIdentity,
    Path(id): Path<OrderId>,
) -> Result<Json<TrackingView>> {
    let invoice = load_invoice(&state, &session, identity.as_ref(), &id).await?;
    Ok(Json(TrackingView {
        order_id: invoice.order.id,
        status: invoice.order.status,
        progress: invoice.progress,
    }))
}
