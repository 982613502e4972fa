//! Session-related types.
//!
//! The cart and the checkout draft live in the session between requests, as
//! does the identity handed over by the authentication collaborator.

use opticart_core::OrderId;
use serde::{Deserialize, Serialize};

/// Orders placed by this session, newest last.
///
/// Lets a guest open the invoice they were routed to after checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Receipts(Vec<OrderId>);

impl Receipts {
    /// Remembered receipts per session.
    pub const LIMIT: usize = 20;

    /// Remember an order, dropping the oldest beyond [`Self::LIMIT`].
    pub fn push(&mut self, id: OrderId) {
        self.0.retain(|existing| *existing != id);
        self.0.push(id);
        if self.0.len() > Self::LIMIT {
            let excess = self.0.len() - Self::LIMIT;
            self.0.drain(..excess);
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[OrderId] {
        &self.0
    }
}

/// Session keys.
pub mod keys {
    /// JSON-encoded cart lines, as written by the cart's storage.
    pub const CART: &str = "cart";

    /// The checkout draft in progress.
    pub const CHECKOUT: &str = "checkout";

    /// Identity supplied by the authentication collaborator.
    pub const IDENTITY: &str = "identity";

    /// Orders placed by this session.
    pub const RECEIPTS: &str = "receipts";
}
