//! Session-owned shopping cart.
//!
//! A [`CartStore`] holds the ordered line items for one browsing session and
//! mirrors them into durable [`CartStorage`] on every mutation. Line identity
//! is the `(product_id, variant_key)` pair; quantities stay within
//! `1..=MAX_LINE_QUANTITY` at all times.
//!
//! Each store is owned by exactly one session. It is constructed explicitly
//! from its storage and passed to whoever needs it; there is no global cart.

pub mod storage;

use opticart_core::{CartLine, CatalogItem, LineKey, MAX_LINE_QUANTITY, Price};
use serde::Serialize;
use tracing::{debug, warn};

pub use storage::{CartStorage, FileStorage, MemoryStorage, StorageError};

/// Storage key under which the cart is persisted.
pub const CART_STORAGE_KEY: &str = "cart";

/// User-facing notification emitted by a cart mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartNotice {
    /// A new line was appended.
    Added { name: String },
    /// An existing line was added again.
    QuantityIncreased { name: String, quantity: u32 },
    /// A line was removed.
    Removed { name: String },
    /// The cart was emptied.
    Cleared { count: usize },
}

impl CartNotice {
    /// Message suitable for a toast.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Added { name } => format!("{name} added to cart"),
            Self::QuantityIncreased { name, quantity } => {
                format!("{name} quantity increased to {quantity}")
            }
            Self::Removed { name } => format!("{name} removed from cart"),
            Self::Cleared { count: 1 } => "Removed 1 item from cart".to_owned(),
            Self::Cleared { count } => format!("Removed {count} items from cart"),
        }
    }
}

/// A shopping cart mirrored into durable storage.
#[derive(Debug)]
pub struct CartStore<S: CartStorage> {
    lines: Vec<CartLine>,
    storage: S,
    notices: Vec<CartNotice>,
    preview_open: bool,
}

impl<S: CartStorage> CartStore<S> {
    /// Rehydrate a cart from storage.
    ///
    /// Unreadable or unparseable storage yields an empty cart.
    pub fn load(storage: S) -> Self {
        let lines = match storage.load(CART_STORAGE_KEY) {
            Ok(Some(raw)) => rehydrate(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Stored cart is corrupt, starting with an empty cart");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored cart, starting with an empty cart");
                Vec::new()
            }
        };

        Self {
            lines,
            storage,
            notices: Vec::new(),
            preview_open: false,
        }
    }

    /// Add one unit of a catalog item.
    ///
    /// Adding an item whose line already exists bumps that line's quantity
    /// (never past the maximum); otherwise a new line is appended at
    /// quantity 1. Opens the cart preview either way.
    pub fn add_item(&mut self, item: CatalogItem) {
        let key = item.key();
        if let Some(line) = self.lines.iter_mut().find(|line| line.is(&key)) {
            line.quantity = (line.quantity + 1).min(MAX_LINE_QUANTITY);
            self.notices.push(CartNotice::QuantityIncreased {
                name: line.name.clone(),
                quantity: line.quantity,
            });
        } else {
            let line = CartLine::from_item(item);
            self.notices.push(CartNotice::Added {
                name: line.name.clone(),
            });
            self.lines.push(line);
        }

        self.preview_open = true;
        self.persist();
    }

    /// Set a line's quantity.
    ///
    /// A quantity of zero or less removes the line. Larger values are clamped
    /// to the maximum. Unknown lines are ignored.
    pub fn set_quantity(&mut self, key: &LineKey, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(key);
            return;
        }

        let Some(line) = self.lines.iter_mut().find(|line| line.is(key)) else {
            debug!(product_id = %key.product_id, "Quantity change for a line not in the cart");
            return;
        };
        line.quantity = u32::try_from(quantity)
            .unwrap_or(MAX_LINE_QUANTITY)
            .clamp(1, MAX_LINE_QUANTITY);
        self.persist();
    }

    /// Remove a line if present.
    pub fn remove_item(&mut self, key: &LineKey) {
        let Some(pos) = self.lines.iter().position(|line| line.is(key)) else {
            return;
        };
        let removed = self.lines.remove(pos);
        self.notices.push(CartNotice::Removed { name: removed.name });
        self.persist();
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        let count = self.lines.len();
        self.lines.clear();
        if count > 0 {
            self.notices.push(CartNotice::Cleared { count });
        }
        self.persist();
    }

    /// Sum of `unit_price * quantity` over all lines.
    #[must_use]
    pub fn total(&self) -> Price {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Owned copy of the lines, detached from the cart.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CartLine> {
        self.lines.clone()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Drain the notifications produced since the last call.
    pub fn take_notices(&mut self) -> Vec<CartNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Whether an add has requested the cart preview to open.
    #[must_use]
    pub const fn is_preview_open(&self) -> bool {
        self.preview_open
    }

    /// Dismiss the cart preview.
    pub const fn close_preview(&mut self) {
        self.preview_open = false;
    }

    /// Borrow the backing storage.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Give back the backing storage.
    #[must_use]
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Mirror the lines into storage. Failures are logged and not retried.
    fn persist(&mut self) {
        let result = serde_json::to_string(&self.lines)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                self.storage
                    .save(CART_STORAGE_KEY, &json)
                    .map_err(|e| e.to_string())
            });
        if let Err(error) = result {
            warn!(%error, "Failed to persist cart");
        }
    }
}

/// Parse stored lines, repairing quantities and duplicate identities.
fn rehydrate(raw: &str) -> Result<Vec<CartLine>, serde_json::Error> {
    let stored: Vec<CartLine> = serde_json::from_str(raw)?;
    let mut lines: Vec<CartLine> = Vec::with_capacity(stored.len());

    for mut line in stored {
        if line.quantity == 0 {
            continue;
        }
        line.quantity = line.quantity.min(MAX_LINE_QUANTITY);

        let key = line.key();
        if let Some(existing) = lines.iter_mut().find(|l| l.is(&key)) {
            existing.quantity = (existing.quantity + line.quantity).min(MAX_LINE_QUANTITY);
        } else {
            lines.push(line);
        }
    }

    Ok(lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use opticart_core::ProductId;

    use super::*;

    fn item(product: &str, variant: Option<&str>, price: i64) -> CatalogItem {
        CatalogItem {
            product_id: ProductId::new(product),
            variant_key: variant.map(str::to_owned),
            name: format!("{product} {}", variant.unwrap_or("standard")),
            unit_price: Price::new(price),
            image: String::new(),
        }
    }

    fn empty_cart() -> CartStore<MemoryStorage> {
        CartStore::load(MemoryStorage::new())
    }

    /// Storage whose writes always fail.
    struct ReadOnlyStorage;

    impl CartStorage for ReadOnlyStorage {
        fn load(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::InvalidKey("locked".to_owned()))
        }

        fn save(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::InvalidKey("locked".to_owned()))
        }

        fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::InvalidKey("locked".to_owned()))
        }
    }

    #[test]
    fn test_same_identity_merges() {
        let mut cart = empty_cart();
        cart.add_item(item("EG-AV-001", Some("Blue Cut"), 3000));
        cart.add_item(item("EG-AV-001", Some("Blue Cut"), 3000));

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 2);
    }

    #[test]
    fn test_different_variants_are_distinct_lines() {
        let mut cart = empty_cart();
        cart.add_item(item("EG-AV-001", Some("Blue Cut"), 3000));
        cart.add_item(item("EG-AV-001", Some("Prescription Power"), 3000));
        cart.add_item(item("EG-AV-001", None, 2500));

        assert_eq!(cart.lines().len(), 3);
        assert!(cart.lines().iter().all(|line| line.quantity == 1));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut cart = empty_cart();
        cart.add_item(item("B", None, 1));
        cart.add_item(item("A", None, 1));
        cart.add_item(item("B", None, 1));

        let ids: Vec<_> = cart.lines().iter().map(|l| l.product_id.as_str()).collect();
        assert_eq!(ids, ["B", "A"]);
    }

    #[test]
    fn test_add_notices_and_preview() {
        let mut cart = empty_cart();
        assert!(!cart.is_preview_open());
        cart.add_item(item("A", None, 10));
        cart.add_item(item("A", None, 10));

        assert!(cart.is_preview_open());
        let notices = cart.take_notices();
        assert!(matches!(notices[0], CartNotice::Added { .. }));
        assert!(matches!(
            notices[1],
            CartNotice::QuantityIncreased { quantity: 2, .. }
        ));
        assert!(cart.take_notices().is_empty());

        cart.close_preview();
        assert!(!cart.is_preview_open());
    }

    #[test]
    fn test_set_quantity_clamps_to_bounds() {
        let mut cart = empty_cart();
        cart.add_item(item("A", None, 10));
        let key = LineKey::new("A", None);

        cart.set_quantity(&key, 250);
        assert_eq!(cart.lines()[0].quantity, MAX_LINE_QUANTITY);

        cart.set_quantity(&key, i64::MAX);
        assert_eq!(cart.lines()[0].quantity, MAX_LINE_QUANTITY);

        cart.set_quantity(&key, 7);
        assert_eq!(cart.lines()[0].quantity, 7);
    }

    #[test]
    fn test_set_quantity_zero_or_negative_removes() {
        for qty in [0, -1, i64::MIN] {
            let mut cart = empty_cart();
            cart.add_item(item("A", None, 10));
            cart.take_notices();
            cart.set_quantity(&LineKey::new("A", None), qty);
            assert!(cart.is_empty());
            assert_eq!(
                cart.take_notices(),
                vec![CartNotice::Removed {
                    name: "A standard".to_owned()
                }]
            );
        }
    }

    #[test]
    fn test_set_quantity_unknown_line_is_noop() {
        let mut cart = empty_cart();
        cart.add_item(item("A", None, 10));
        cart.set_quantity(&LineKey::new("A", Some("Blue Cut")), 5);
        assert_eq!(cart.lines()[0].quantity, 1);
    }

    #[test]
    fn test_repeat_add_saturates() {
        let mut cart = empty_cart();
        cart.add_item(item("A", None, 10));
        cart.set_quantity(&LineKey::new("A", None), 99);
        cart.add_item(item("A", None, 10));
        assert_eq!(cart.lines()[0].quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_total_over_operations() {
        let mut cart = empty_cart();
        assert_eq!(cart.total(), Price::ZERO);

        cart.add_item(item("A", None, 3000));
        cart.add_item(item("A", None, 3000));
        cart.add_item(item("B", Some("Large"), 450));
        cart.set_quantity(&LineKey::new("B", Some("Large")), 3);
        assert_eq!(cart.total(), Price::new(3000 * 2 + 450 * 3));
        assert_eq!(cart.item_count(), 5);

        cart.remove_item(&LineKey::new("A", None));
        assert_eq!(cart.total(), Price::new(450 * 3));

        cart.clear();
        assert_eq!(cart.total(), Price::ZERO);
    }

    #[test]
    fn test_clear_notice_only_when_non_empty() {
        let mut cart = empty_cart();
        cart.clear();
        assert!(cart.take_notices().is_empty());

        cart.add_item(item("A", None, 1));
        cart.add_item(item("B", None, 1));
        cart.take_notices();
        cart.clear();
        assert_eq!(cart.take_notices(), vec![CartNotice::Cleared { count: 2 }]);
    }

    #[test]
    fn test_mutations_are_mirrored_to_storage() {
        let mut cart = empty_cart();
        cart.add_item(item("A", Some("Blue Cut"), 3000));
        cart.set_quantity(&LineKey::new("A", Some("Blue Cut")), 4);

        let storage = cart.into_storage();
        let reloaded = CartStore::load(storage);
        assert_eq!(reloaded.lines().len(), 1);
        assert_eq!(reloaded.lines()[0].quantity, 4);
        assert_eq!(reloaded.lines()[0].variant_key.as_deref(), Some("Blue Cut"));
    }

    #[test]
    fn test_corrupt_storage_degrades_to_empty() {
        let cart = CartStore::load(MemoryStorage::with_entry(CART_STORAGE_KEY, "{not json"));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_unreadable_storage_degrades_to_empty() {
        let mut cart = CartStore::load(ReadOnlyStorage);
        assert!(cart.is_empty());

        // write failures are swallowed
        cart.add_item(item("A", None, 10));
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn test_rehydrate_repairs_invalid_lines() {
        let raw = r#"[
            {"productId":"A","variantKey":null,"name":"A","unitPrice":10,"quantity":0,"image":""},
            {"productId":"B","variantKey":null,"name":"B","unitPrice":10,"quantity":500,"image":""},
            {"productId":"C","name":"C","unitPrice":10,"quantity":60},
            {"productId":"C","name":"C","unitPrice":10,"quantity":60}
        ]"#;
        let cart = CartStore::load(MemoryStorage::with_entry(CART_STORAGE_KEY, raw));

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.lines()[0].quantity, MAX_LINE_QUANTITY);
        assert_eq!(cart.lines()[1].quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut cart = empty_cart();
        cart.add_item(item("A", None, 10));
        let snapshot = cart.snapshot();
        cart.set_quantity(&LineKey::new("A", None), 5);
        assert_eq!(snapshot[0].quantity, 1);
    }
}
