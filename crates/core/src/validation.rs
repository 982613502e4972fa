//! Checkout field validators.
//!
//! Validators take the raw user input but judge it in the form it will be
//! stored, after the matching [`crate::sanitize`] normalization, and return
//! the user-facing reason a field is rejected.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::{Email, sanitize};

/// Minimum length of a customer name.
pub const MIN_NAME_CHARS: usize = 2;

/// Minimum length of a shipping address.
pub const MIN_ADDRESS_CHARS: usize = 10;

/// Minimum length of a wallet transaction ID.
pub const MIN_TRANSACTION_ID_CHARS: usize = 8;

/// Local mobile numbers: optional `+88`/`88`, then `01`, a carrier digit 3-9,
/// and eight subscriber digits.
static MOBILE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // literal pattern
    Regex::new(r"^(?:\+?88)?01[3-9][0-9]{8}$").unwrap()
});

/// Why a field was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// Nothing was entered.
    #[error("this field is required")]
    Required,
    /// The input is shorter than allowed.
    #[error("must be at least {min} characters")]
    TooShort {
        /// Minimum number of characters.
        min: usize,
    },
    /// Not a local mobile number.
    #[error("enter a valid mobile number, e.g. 01712345678")]
    InvalidPhone,
    /// Not a `local@domain.tld` address.
    #[error("enter a valid email address")]
    InvalidEmail,
}

/// `cleaned` is already sanitized.
fn required_min(cleaned: &str, min: usize) -> Result<(), FieldError> {
    if cleaned.is_empty() {
        return Err(FieldError::Required);
    }
    if cleaned.chars().count() < min {
        return Err(FieldError::TooShort { min });
    }
    Ok(())
}

/// Customer name: non-empty, at least two characters.
///
/// # Errors
///
/// Returns `Required` or `TooShort`.
pub fn name(input: &str) -> Result<(), FieldError> {
    required_min(&sanitize::collapse(input), MIN_NAME_CHARS)
}

/// Mobile number, with spaces and dashes ignored. Only ASCII digits count,
/// since those are all [`sanitize::phone`] keeps.
///
/// # Errors
///
/// Returns `Required` or `InvalidPhone`.
pub fn phone(input: &str) -> Result<(), FieldError> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    if compact.is_empty() {
        return Err(FieldError::Required);
    }
    if MOBILE_NUMBER.is_match(&compact) {
        Ok(())
    } else {
        Err(FieldError::InvalidPhone)
    }
}

/// Email in `local@domain.tld` shape.
///
/// # Errors
///
/// Returns `Required` or `InvalidEmail`.
pub fn email(input: &str) -> Result<(), FieldError> {
    let cleaned = sanitize::email(input);
    if cleaned.is_empty() {
        return Err(FieldError::Required);
    }
    Email::parse(&cleaned)
        .map(|_| ())
        .map_err(|_| FieldError::InvalidEmail)
}

/// Shipping address: non-empty, at least ten characters.
///
/// # Errors
///
/// Returns `Required` or `TooShort`.
pub fn address(input: &str) -> Result<(), FieldError> {
    required_min(&sanitize::collapse(input), MIN_ADDRESS_CHARS)
}

/// Wallet number; same rules as [`phone`].
///
/// # Errors
///
/// Returns `Required` or `InvalidPhone`.
pub fn wallet_number(input: &str) -> Result<(), FieldError> {
    phone(input)
}

/// Wallet transaction ID: at least eight ASCII letters or digits. Other
/// characters are ignored, as [`sanitize::transaction_id`] drops them.
///
/// # Errors
///
/// Returns `Required` or `TooShort`.
pub fn transaction_id(input: &str) -> Result<(), FieldError> {
    required_min(&sanitize::transaction_id(input), MIN_TRANSACTION_ID_CHARS)
}
