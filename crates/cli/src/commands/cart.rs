//! Terminal cart commands.
//!
//! The cart is kept in `OPTICART_DATA_DIR` and survives between invocations,
//! the same way a browser session's cart survives page reloads.

use std::fmt::Write as _;

use opticart_core::{CatalogItem, LineKey, OrderTotals, Price};
use opticart_storefront::cart::{CartStorage, CartStore};

/// Show cart lines and totals.
pub fn show() {
    let cart = super::load_cart();
    print(&render(&cart));
}

/// Add one unit of a product.
pub fn add(product: &str, name: &str, price: i64, variant: Option<String>) {
    let mut cart = super::load_cart();
    cart.add_item(CatalogItem {
        product_id: product.into(),
        variant_key: variant,
        name: name.to_owned(),
        unit_price: Price::new(price),
        image: String::new(),
    });
    report(&mut cart);
}

/// Set a line's quantity.
pub fn set_quantity(product: &str, variant: Option<&str>, quantity: i64) {
    let mut cart = super::load_cart();
    cart.set_quantity(&LineKey::new(product, variant), quantity);
    report(&mut cart);
}

/// Remove a line.
pub fn remove(product: &str, variant: Option<&str>) {
    let mut cart = super::load_cart();
    cart.remove_item(&LineKey::new(product, variant));
    report(&mut cart);
}

/// Empty the cart.
pub fn clear() {
    let mut cart = super::load_cart();
    cart.clear();
    report(&mut cart);
}

fn report<S: CartStorage>(cart: &mut CartStore<S>) {
    for notice in cart.take_notices() {
        tracing::info!("{}", notice.message());
    }
    print(&render(cart));
}

#[allow(clippy::print_stdout)]
fn print(text: &str) {
    println!("{text}");
}

/// Format the cart as a plain-text table.
pub(crate) fn render<S: CartStorage>(cart: &CartStore<S>) -> String {
    if cart.is_empty() {
        return "Your cart is empty.".to_owned();
    }

    let mut out = String::new();
    for line in cart.lines() {
        let variant = line
            .variant_key
            .as_deref()
            .map(|v| format!(" ({v})"))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{:>3} x {}{} @ {} = {}",
            line.quantity,
            line.name,
            variant,
            line.unit_price,
            line.line_total()
        );
    }

    let totals = OrderTotals::for_subtotal(cart.total());
    let _ = writeln!(out, "Items:    {}", cart.item_count());
    let _ = writeln!(out, "Subtotal: {}", totals.subtotal);
    let _ = writeln!(out, "Shipping: {}", totals.shipping);
    let _ = writeln!(out, "Tax:      {}", totals.tax);
    let _ = write!(out, "Total:    {}", totals.total);
    out
}
