//! Cart route handlers.
//!
//! The cart lives in the session under `cart` as the same JSON the cart
//! storage writes. Each handler loads a [`CartStore`] over a [`MemoryStorage`]
//! seeded from the session, runs the operation, and copies the result back.

use axum::Json;
use opticart_core::{CartLine, CatalogItem, LineKey, OrderTotals, Price, ProductId};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::cart::{CART_STORAGE_KEY, CartNotice, CartStore, MemoryStorage};
use crate::error::Result;
use crate::models::session_keys;

// =============================================================================
// Session Helpers
// =============================================================================

/// Load the session's cart.
pub(crate) async fn load_cart(session: &Session) -> Result<CartStore<MemoryStorage>> {
    let raw: Option<String> = session.get(session_keys::CART).await?;
    let storage = raw.map_or_else(MemoryStorage::new, |value| {
        MemoryStorage::with_entry(CART_STORAGE_KEY, value)
    });
    Ok(CartStore::load(storage))
}

/// Write the cart's storage back into the session.
pub(crate) async fn save_cart(session: &Session, cart: CartStore<MemoryStorage>) -> Result<()> {
    let storage = cart.into_storage();
    match storage.get(CART_STORAGE_KEY) {
        Some(value) => session.insert(session_keys::CART, value).await?,
        None => {
            session.remove::<String>(session_keys::CART).await?;
        }
    }
    Ok(())
}

// =============================================================================
// Views
// =============================================================================

/// A notice with its display message.
#[derive(Debug, Serialize)]
pub struct NoticeView {
    #[serde(flatten)]
    pub notice: CartNotice,
    pub message: String,
}

/// Cart display data.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub subtotal: Price,
    pub item_count: u32,
    /// What checkout would charge for these lines.
    pub totals: OrderTotals,
    pub notices: Vec<NoticeView>,
    pub preview_open: bool,
}

impl CartView {
    fn from_cart(cart: &mut CartStore<MemoryStorage>) -> Self {
        let notices = cart
            .take_notices()
            .into_iter()
            .map(|notice| NoticeView {
                message: notice.message(),
                notice,
            })
            .collect();
        Self {
            lines: cart.snapshot(),
            subtotal: cart.total(),
            item_count: cart.item_count(),
            totals: OrderTotals::for_subtotal(cart.total()),
            notices,
            preview_open: cart.is_preview_open(),
        }
    }
}

/// Cart badge data.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u32,
}

// =============================================================================
// Requests
// =============================================================================

/// Identifies a cart line.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_key: Option<String>,
}

impl LineRequest {
    fn key(&self) -> LineKey {
        LineKey::new(self.product_id.clone(), self.variant_key.as_deref())
    }
}

/// Update quantity request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    #[serde(flatten)]
    pub line: LineRequest,
    pub quantity: i64,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart.
#[instrument(skip(session))]
pub async fn show(session: Session) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    Ok(Json(CartView::from_cart(&mut cart)))
}

/// Add one unit of a catalog item.
#[instrument(skip(session, item), fields(product_id = %item.product_id))]
pub async fn add(session: Session, Json(item): Json<CatalogItem>) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.add_item(item);
    let view = CartView::from_cart(&mut cart);
    save_cart(&session, cart).await?;
    Ok(Json(view))
}

/// Set a line's quantity. Zero or less removes the line.
#[instrument(skip(session, request), fields(product_id = %request.line.product_id, quantity = request.quantity))]
pub async fn update(
    session: Session,
    Json(request): Json<UpdateCartRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.set_quantity(&request.line.key(), request.quantity);
    let view = CartView::from_cart(&mut cart);
    save_cart(&session, cart).await?;
    Ok(Json(view))
}

/// Remove a line.
#[instrument(skip(session, request), fields(product_id = %request.product_id))]
pub async fn remove(session: Session, Json(request): Json<LineRequest>) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.remove_item(&request.key());
    let view = CartView::from_cart(&mut cart);
    save_cart(&session, cart).await?;
    Ok(Json(view))
}

/// Empty the cart.
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.clear();
    let view = CartView::from_cart(&mut cart);
    save_cart(&session, cart).await?;
    Ok(Json(view))
}

/// Cart badge count.
#[instrument(skip(session))]
pub async fn count(session: Session) -> Result<Json<CartCount>> {
    let cart = load_cart(&session).await?;
    Ok(Json(CartCount {
        count: cart.item_count(),
    }))
}
