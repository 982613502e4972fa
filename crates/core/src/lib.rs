//! Opticart Core - Shared types library.
//!
//! This crate provides common types used across all Opticart components:
//! - `storefront` - Cart, checkout, order repository, and the HTTP surface
//! - `cli` - Command-line tools for migrations, terminal shopping, and order admin
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, statuses, cart lines, and orders
//! - [`sanitize`] - Normalization and escaping of free-text fields before persistence
//! - [`validation`] - Checkout field validators

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod sanitize;
pub mod types;
pub mod validation;

pub use types::*;
