//! Session-stored models for storefront.

pub mod session;

pub use session::{Receipts, keys as session_keys};
