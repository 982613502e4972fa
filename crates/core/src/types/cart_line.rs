//! Cart line items and their identity.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// The identity of a cart line: product plus variant.
///
/// Two lines are the same line iff both parts match exactly. A `None`
/// variant only matches another `None` variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    pub product_id: ProductId,
    pub variant_key: Option<String>,
}

impl LineKey {
    /// Create a line key.
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, variant_key: Option<&str>) -> Self {
        Self {
            product_id: product_id.into(),
            variant_key: variant_key.map(str::to_owned),
        }
    }
}

/// A product record as supplied by the catalog, ready to be added to a cart.
///
/// The catalog is trusted as-is; the cart does not check price freshness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_key: Option<String>,
    pub name: String,
    pub unit_price: Price,
    #[serde(default)]
    pub image: String,
}

impl CatalogItem {
    /// The line identity this item would occupy in a cart.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id.clone(),
            variant_key: self.variant_key.clone(),
        }
    }
}

/// One line of a cart, and later of an order snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_key: Option<String>,
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
    #[serde(default)]
    pub image: String,
}

impl CartLine {
    /// Start a new line at quantity 1.
    #[must_use]
    pub fn from_item(item: CatalogItem) -> Self {
        Self {
            product_id: item.product_id,
            variant_key: item.variant_key,
            name: item.name,
            unit_price: item.unit_price,
            quantity: 1,
            image: item.image,
        }
    }

    /// Whether this line has the given identity.
    #[must_use]
    pub fn is(&self, key: &LineKey) -> bool {
        self.product_id == key.product_id && self.variant_key == key.variant_key
    }

    /// This line's identity.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id.clone(),
            variant_key: self.variant_key.clone(),
        }
    }

    /// `unit_price * quantity`, saturating on overflow.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price
            .checked_mul(self.quantity)
            .unwrap_or(Price::new(i64::MAX))
    }
}
