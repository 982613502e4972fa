//! Checkout route handlers.
//!
//! The draft is kept in the session under `checkout`; its submission guard is
//! shared through [`AppState::submission_guard`] so parallel requests for the
//! same draft cannot both place an order.

use axum::{Json, extract::State};
use opticart_core::{CartLine, Identity, Order, OrderId, OrderTotals, PaymentMethod};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{instrument, warn};

use super::cart::{load_cart, save_cart};
use crate::cart::{CartStore, MemoryStorage};
use crate::checkout::{
    CheckoutDraft, CheckoutFlow, Field, PlacedOrder, SubmissionState, SubmitError,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::OptionalIdentity;
use crate::models::{Receipts, session_keys};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// Cart summary shown beside the form.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSummary {
    pub lines: Vec<CartLine>,
    pub totals: OrderTotals,
}

/// Checkout page state.
#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CheckoutView {
    /// Nothing to check out; the client should show the empty-cart page.
    EmptyCart,
    Open {
        draft: CheckoutDraft,
        summary: CheckoutSummary,
        #[serde(rename = "canSubmit")]
        can_submit: bool,
        submission: SubmissionState,
    },
}

impl CheckoutView {
    fn open(flow: &CheckoutFlow, cart: &CartStore<MemoryStorage>) -> Self {
        Self::Open {
            draft: flow.draft().clone(),
            summary: CheckoutSummary {
                lines: cart.snapshot(),
                totals: OrderTotals::for_subtotal(cart.total()),
            },
            can_submit: flow.can_submit(),
            submission: flow.guard().state(),
        }
    }
}

/// Successful submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub order_id: OrderId,
    pub invoice_url: String,
    pub order: Order,
}

// =============================================================================
// Requests
// =============================================================================

/// Edit one field.
#[derive(Debug, Deserialize)]
pub struct FieldRequest {
    pub field: Field,
    pub value: String,
    /// The customer also left the field.
    #[serde(default)]
    pub blur: bool,
}

/// Choose a payment method.
#[derive(Debug, Deserialize)]
pub struct PaymentMethodRequest {
    pub method: PaymentMethod,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Resume the session's draft, or start one. `None` when the cart is empty.
async fn load_flow(
    state: &AppState,
    session: &Session,
    cart: &CartStore<MemoryStorage>,
) -> Result<Option<CheckoutFlow>> {
    if cart.is_empty() {
        return Ok(None);
    }

    if let Some(draft) = session.get::<CheckoutDraft>(session_keys::CHECKOUT).await? {
        let guard = state.submission_guard(draft.id).await;
        if draft.placed_order.is_none() && guard.state() != SubmissionState::Completed {
            return Ok(Some(CheckoutFlow::resume(draft, guard)));
        }
    }

    let fresh = CheckoutFlow::begin(cart)?;
    let guard = state.submission_guard(fresh.draft().id).await;
    Ok(Some(CheckoutFlow::resume(fresh.into_draft(), guard)))
}

async fn save_draft(session: &Session, flow: &CheckoutFlow) -> Result<()> {
    session.insert(session_keys::CHECKOUT, flow.draft()).await?;
    Ok(())
}

/// Load the flow, apply `edit`, and save the draft.
async fn edit_flow(
    state: &AppState,
    session: &Session,
    edit: impl FnOnce(&mut CheckoutFlow),
) -> Result<Json<CheckoutView>> {
    let cart = load_cart(session).await?;
    let Some(mut flow) = load_flow(state, session, &cart).await? else {
        return Ok(Json(CheckoutView::EmptyCart));
    };
    edit(&mut flow);
    save_draft(session, &flow).await?;
    Ok(Json(CheckoutView::open(&flow, &cart)))
}

/// Record the outcome of a submission in the session and save it right away,
/// so it sticks even if the client has gone.
async fn persist_submission(
    session: &Session,
    flow: &CheckoutFlow,
    cart: CartStore<MemoryStorage>,
    placed: Option<&PlacedOrder>,
) -> Result<()> {
    match placed {
        Some(placed) => {
            save_cart(session, cart).await?;
            session.remove::<CheckoutDraft>(session_keys::CHECKOUT).await?;
            let mut receipts: Receipts = session
                .get(session_keys::RECEIPTS)
                .await?
                .unwrap_or_default();
            receipts.push(placed.id.clone());
            session.insert(session_keys::RECEIPTS, receipts).await?;
        }
        None => save_draft(session, flow).await?,
    }
    session.save().await?;
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// Display checkout.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CheckoutView>> {
    edit_flow(&state, &session, |_| {}).await
}

/// Edit a field, optionally blurring it.
#[instrument(skip(state, session, request), fields(field = ?request.field))]
pub async fn set_field(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<FieldRequest>,
) -> Result<Json<CheckoutView>> {
    edit_flow(&state, &session, |flow| {
        flow.set_field(request.field, request.value);
        if request.blur {
            flow.blur_field(request.field);
        }
    })
    .await
}

/// Move to the payment step if the shipping fields are valid.
#[instrument(skip(state, session))]
pub async fn continue_to_payment(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CheckoutView>> {
    edit_flow(&state, &session, |flow| {
        flow.continue_to_payment();
    })
    .await
}

/// Go back to the shipping step.
#[instrument(skip(state, session))]
pub async fn back(State(state): State<AppState>, session: Session) -> Result<Json<CheckoutView>> {
    edit_flow(&state, &session, CheckoutFlow::back_to_shipping).await
}

/// Choose how to pay.
#[instrument(skip(state, session))]
pub async fn payment_method(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<PaymentMethodRequest>,
) -> Result<Json<CheckoutView>> {
    edit_flow(&state, &session, |flow| {
        flow.select_payment_method(request.method);
    })
    .await
}

/// Place the order.
///
/// The submission runs on its own task so a dropped connection cannot
/// interrupt it between the store write and the cart being cleared.
#[instrument(skip(state, session, identity))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(identity): OptionalIdentity,
) -> Result<Json<SubmitResponse>> {
    let cart = load_cart(&session).await?;
    let Some(flow) = load_flow(&state, &session, &cart).await? else {
        return Err(SubmitError::EmptyCart.into());
    };

    let orders = state.orders().clone();
    let task_session = session.clone();
    let (result, persisted) = tokio::spawn(run_submission(task_session, flow, cart, identity, orders))
        .await
        .map_err(|e| AppError::Internal(format!("checkout task failed: {e}")))?;

    let placed = result?;
    if let Err(e) = persisted {
        // The order exists; the session just could not record it.
        warn!(order_id = %placed.id, error = %e, "Failed to update session after checkout");
    }

    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_id", placed.id.as_str())]),
    );

    Ok(Json(SubmitResponse {
        invoice_url: state.config().url_for(&format!("/orders/{}", placed.id)),
        order_id: placed.id,
        order: placed.order,
    }))
}

async fn run_submission(
    session: Session,
    mut flow: CheckoutFlow,
    mut cart: CartStore<MemoryStorage>,
    identity: Option<Identity>,
    orders: crate::orders::OrderRepository,
) -> (std::result::Result<PlacedOrder, SubmitError>, Result<()>) {
    let result = flow.submit(&mut cart, identity.as_ref(), &orders).await;
    let persisted = match &result {
        Ok(placed) => persist_submission(&session, &flow, cart, Some(placed)).await,
        // Someone else holds or spent the guard; leave their session state alone.
        Err(SubmitError::AlreadyInFlight | SubmitError::AlreadySubmitted) => Ok(()),
        Err(_) => persist_submission(&session, &flow, cart, None).await,
    };
    (result, persisted)
}
