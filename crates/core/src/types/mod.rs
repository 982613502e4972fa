//! Core types for Opticart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart_line;
pub mod email;
pub mod id;
pub mod identity;
pub mod order;
pub mod price;
pub mod status;

pub use cart_line::{CartLine, CatalogItem, LineKey, MAX_LINE_QUANTITY};
pub use email::{Email, EmailError};
pub use id::*;
pub use identity::Identity;
pub use order::{Order, OrderPayload};
pub use price::{OrderTotals, Price, SHIPPING_FLAT_RATE, TAX_RATE_PERCENT};
pub use status::*;
