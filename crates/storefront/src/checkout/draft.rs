//! Checkout form state.

use std::collections::{BTreeMap, BTreeSet};

use opticart_core::{OrderId, PaymentMethod};
use opticart_core::validation::{self, FieldError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An input on the checkout form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Phone,
    Email,
    Address,
    WalletNumber,
    TransactionId,
}

impl Field {
    /// Fields on the shipping step.
    pub const SHIPPING: [Self; 4] = [Self::Name, Self::Phone, Self::Email, Self::Address];

    /// Fields required when paying by mobile wallet.
    pub const WALLET: [Self; 2] = [Self::WalletNumber, Self::TransactionId];

    /// Run this field's validator against `value`.
    ///
    /// # Errors
    ///
    /// Returns the reason the value is rejected.
    pub fn validate(self, value: &str) -> Result<(), FieldError> {
        match self {
            Self::Name => validation::name(value),
            Self::Phone => validation::phone(value),
            Self::Email => validation::email(value),
            Self::Address => validation::address(value),
            Self::WalletNumber => validation::wallet_number(value),
            Self::TransactionId => validation::transaction_id(value),
        }
    }

    #[must_use]
    pub const fn is_wallet(self) -> bool {
        matches!(self, Self::WalletNumber | Self::TransactionId)
    }
}

/// Which page of checkout the customer is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Shipping,
    Payment,
}

/// Shipping inputs, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

/// Mobile wallet payment inputs, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletDetails {
    pub number: String,
    pub transaction_id: String,
}

/// Everything the checkout form holds between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutDraft {
    /// Identifies this draft's submission latch.
    pub id: Uuid,
    pub step: Step,
    pub shipping: ShippingInfo,
    pub payment_method: PaymentMethod,
    pub wallet: WalletDetails,
    /// Current message per invalid field.
    #[serde(default)]
    pub field_errors: BTreeMap<Field, String>,
    /// Fields the customer has left at least once.
    #[serde(default)]
    pub touched: BTreeSet<Field>,
    /// Set once this draft has placed an order; it never submits again.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed_order: Option<OrderId>,
}

impl Default for CheckoutDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutDraft {
    /// A fresh draft on the shipping step, paying cash on delivery.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            step: Step::Shipping,
            shipping: ShippingInfo::default(),
            payment_method: PaymentMethod::CashOnDelivery,
            wallet: WalletDetails::default(),
            field_errors: BTreeMap::new(),
            touched: BTreeSet::new(),
            placed_order: None,
        }
    }

    #[must_use]
    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.shipping.name,
            Field::Phone => &self.shipping.phone,
            Field::Email => &self.shipping.email,
            Field::Address => &self.shipping.address,
            Field::WalletNumber => &self.wallet.number,
            Field::TransactionId => &self.wallet.transaction_id,
        }
    }

    pub(crate) fn value_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Name => &mut self.shipping.name,
            Field::Phone => &mut self.shipping.phone,
            Field::Email => &mut self.shipping.email,
            Field::Address => &mut self.shipping.address,
            Field::WalletNumber => &mut self.wallet.number,
            Field::TransactionId => &mut self.wallet.transaction_id,
        }
    }

    /// Fields that must be valid before the order can be placed.
    #[must_use]
    pub fn required_fields(&self) -> Vec<Field> {
        let mut fields = Field::SHIPPING.to_vec();
        if self.payment_method.requires_wallet_details() {
            fields.extend(Field::WALLET);
        }
        fields
    }

    /// Re-run one field's validator and record the outcome.
    pub(crate) fn revalidate(&mut self, field: Field) -> bool {
        match field.validate(self.value(field)) {
            Ok(()) => {
                self.field_errors.remove(&field);
                true
            }
            Err(e) => {
                self.field_errors.insert(field, e.to_string());
                false
            }
        }
    }

    /// Mark `fields` touched and validate each, recording every failure.
    pub(crate) fn touch_and_validate(&mut self, fields: &[Field]) -> bool {
        let mut all_valid = true;
        for &field in fields {
            self.touched.insert(field);
            all_valid &= self.revalidate(field);
        }
        all_valid
    }

    /// Whether every required field currently passes, without recording anything.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.required_fields()
            .into_iter()
            .all(|field| field.validate(self.value(field)).is_ok())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_draft_defaults() {
        let draft = CheckoutDraft::new();
        assert_eq!(draft.step, Step::Shipping);
        assert_eq!(draft.payment_method, PaymentMethod::CashOnDelivery);
        assert!(draft.field_errors.is_empty());
        assert!(!draft.is_complete());
    }

    #[test]
    fn test_drafts_saved_before_placement_marker_still_load() {
        let mut value = serde_json::to_value(CheckoutDraft::new()).unwrap();
        assert!(value.get("placed_order").is_none());
        value.as_object_mut().unwrap().remove("touched");
        let draft: CheckoutDraft = serde_json::from_value(value).unwrap();
        assert!(draft.placed_order.is_none());
    }

    #[test]
    fn test_wallet_fields_required_only_for_wallet() {
        let mut draft = CheckoutDraft::new();
        assert_eq!(draft.required_fields(), Field::SHIPPING.to_vec());
        draft.payment_method = PaymentMethod::MobileWallet;
        assert_eq!(draft.required_fields().len(), 6);
    }

    #[test]
    fn test_touch_and_validate_records_each_error() {
        let mut draft = CheckoutDraft::new();
        draft.shipping.name = "Rahim".to_owned();
        assert!(!draft.touch_and_validate(&Field::SHIPPING));
        assert_eq!(draft.touched.len(), 4);
        assert!(!draft.field_errors.contains_key(&Field::Name));
        assert_eq!(
            draft.field_errors.get(&Field::Phone).map(String::as_str),
            Some("this field is required")
        );
    }
}
