//! Two-step checkout: shipping details, then payment and submission.
//!
//! [`CheckoutFlow`] owns a [`CheckoutDraft`] and the draft's
//! [`SubmissionGuard`]. Fields are validated as the customer leaves them; the
//! shipping step cannot be left with invalid fields, and submission validates
//! everything again, sanitizes it, and writes exactly one order.

mod draft;
mod guard;

use std::collections::BTreeMap;

use chrono::Utc;
use opticart_core::{
    CartLine, Identity, Order, OrderId, OrderPayload, OrderStatus, OrderTotals, PaymentMethod,
    Price, sanitize,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::cart::{CartStorage, CartStore};
use crate::orders::{OrderRepository, OrderStore, RepositoryError};

pub use draft::{CheckoutDraft, Field, ShippingInfo, Step, WalletDetails};
pub use guard::{SubmissionGuard, SubmissionState, SubmissionTicket};

/// Why checkout could not proceed.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("your cart is empty")]
    EmptyCart,

    #[error("confirm shipping details before placing the order")]
    NotOnPaymentStep,

    /// One or more fields failed validation; messages keyed by field.
    #[error("some fields need attention")]
    Invalid(BTreeMap<Field, String>),

    #[error("this order is already being placed")]
    AlreadyInFlight,

    #[error("this order has already been placed")]
    AlreadySubmitted,

    #[error("the order store did not return an order id")]
    MissingIdentifier,

    #[error("could not place the order: {0}")]
    Remote(#[from] RepositoryError),
}

impl SubmitError {
    /// Whether the customer can simply try again with the same draft.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::MissingIdentifier)
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub id: OrderId,
    pub order: Order,
}

/// A checkout session.
#[derive(Debug)]
pub struct CheckoutFlow {
    draft: CheckoutDraft,
    guard: SubmissionGuard,
}

impl CheckoutFlow {
    /// Start checkout for the current cart.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart` if there is nothing to check out.
    pub fn begin<C: CartStorage>(cart: &CartStore<C>) -> Result<Self, SubmitError> {
        if cart.is_empty() {
            return Err(SubmitError::EmptyCart);
        }
        Ok(Self::resume(CheckoutDraft::new(), SubmissionGuard::new()))
    }

    /// Continue a draft saved earlier, sharing `guard` with anyone else
    /// holding the same draft.
    #[must_use]
    pub const fn resume(draft: CheckoutDraft, guard: SubmissionGuard) -> Self {
        Self { draft, guard }
    }

    #[must_use]
    pub const fn draft(&self) -> &CheckoutDraft {
        &self.draft
    }

    #[must_use]
    pub fn into_draft(self) -> CheckoutDraft {
        self.draft
    }

    #[must_use]
    pub const fn guard(&self) -> &SubmissionGuard {
        &self.guard
    }

    /// Record a keystroke. Touched fields are re-validated immediately.
    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        *self.draft.value_mut(field) = value.into();
        if self.draft.touched.contains(&field) {
            self.draft.revalidate(field);
        }
    }

    /// The customer left `field`: mark it touched and show its error, if any.
    pub fn blur_field(&mut self, field: Field) -> bool {
        self.draft.touched.insert(field);
        self.draft.revalidate(field)
    }

    /// Try to move to the payment step.
    ///
    /// Every shipping field is marked touched and validated; the step only
    /// changes when all of them pass.
    pub fn continue_to_payment(&mut self) -> bool {
        let valid = self.draft.touch_and_validate(&Field::SHIPPING);
        if valid {
            self.draft.step = Step::Payment;
        }
        valid
    }

    /// Return to the shipping step. Entered values are kept.
    pub fn back_to_shipping(&mut self) {
        self.draft.step = Step::Shipping;
    }

    /// Choose how to pay. Wallet errors are dropped when they no longer apply.
    pub fn select_payment_method(&mut self, method: PaymentMethod) {
        self.draft.payment_method = method;
        if !method.requires_wallet_details() {
            for field in Field::WALLET {
                self.draft.field_errors.remove(&field);
                self.draft.touched.remove(&field);
            }
        }
    }

    /// Whether the place-order action should be enabled.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.draft.step == Step::Payment
            && self.draft.placed_order.is_none()
            && self.guard.state() == SubmissionState::Idle
            && self.draft.is_complete()
    }

    /// The sanitized order payload for `items`.
    #[must_use]
    pub fn build_payload(&self, items: Vec<CartLine>, identity: Option<&Identity>) -> OrderPayload {
        let shipping = &self.draft.shipping;
        let wallet = &self.draft.wallet;
        let method = self.draft.payment_method;
        let subtotal: Price = items.iter().map(CartLine::line_total).sum();

        OrderPayload {
            customer_name: sanitize::name(&shipping.name),
            email: sanitize::email(&shipping.email),
            user_id: identity.map(|identity| identity.user_id.clone()),
            address: sanitize::address(&shipping.address),
            phone: sanitize::phone(&shipping.phone),
            items,
            total: OrderTotals::for_subtotal(subtotal).total,
            payment_method: method,
            bkash_number: method
                .requires_wallet_details()
                .then(|| sanitize::phone(&wallet.number)),
            transaction_id: method
                .requires_wallet_details()
                .then(|| sanitize::transaction_id(&wallet.transaction_id)),
        }
    }

    /// Place the order.
    ///
    /// On success the cart is cleared and the draft is marked placed, so it
    /// can never submit again even under a fresh guard.
    /// On failure the cart, the draft, and the entered values are untouched
    /// and the customer may retry.
    ///
    /// # Errors
    ///
    /// Returns `NotOnPaymentStep`, `Invalid`, or `EmptyCart` without writing
    /// anything; `AlreadyInFlight` / `AlreadySubmitted` if the draft's guard
    /// is held or spent or the draft is already placed; `Remote` or `MissingIdentifier` when the store write
    /// fails.
    #[instrument(skip_all, fields(draft_id = %self.draft.id, method = %self.draft.payment_method))]
    pub async fn submit<C, S>(
        &mut self,
        cart: &mut CartStore<C>,
        identity: Option<&Identity>,
        orders: &OrderRepository<S>,
    ) -> Result<PlacedOrder, SubmitError>
    where
        C: CartStorage,
        S: OrderStore,
    {
        if self.draft.placed_order.is_some() {
            return Err(SubmitError::AlreadySubmitted);
        }
        if self.draft.step != Step::Payment {
            return Err(SubmitError::NotOnPaymentStep);
        }
        let required = self.draft.required_fields();
        if !self.draft.touch_and_validate(&required) {
            return Err(SubmitError::Invalid(self.draft.field_errors.clone()));
        }
        if cart.is_empty() {
            return Err(SubmitError::EmptyCart);
        }

        let ticket = self.guard.try_begin()?;
        let payload = self.build_payload(cart.snapshot(), identity);

        match orders.create(payload.clone()).await {
            Ok(id) if !id.is_empty() => {
                ticket.complete();
                self.draft.placed_order = Some(id.clone());
                cart.clear();
                info!(order_id = %id, total = %payload.total, "Order placed");
                let order = Order::from_payload(id.clone(), payload, OrderStatus::Pending, Utc::now());
                Ok(PlacedOrder { id, order })
            }
            Ok(_) => {
                warn!("Order store accepted the order without returning an id");
                Err(SubmitError::MissingIdentifier)
            }
            Err(e) => {
                warn!(error = %e, "Order submission failed");
                Err(SubmitError::Remote(e))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use opticart_core::{CatalogItem, Email};

    use super::*;
    use crate::cart::MemoryStorage;
    use crate::orders::{FeedScope, MemoryOrderStore};

    fn cart_with(price: i64, quantity: u32) -> CartStore<MemoryStorage> {
        let mut cart = CartStore::load(MemoryStorage::new());
        for _ in 0..quantity {
            cart.add_item(CatalogItem {
                product_id: "A".into(),
                variant_key: None,
                name: "Frame A".to_owned(),
                unit_price: Price::new(price),
                image: String::new(),
            });
        }
        cart
    }

    fn fill_shipping(flow: &mut CheckoutFlow) {
        flow.set_field(Field::Name, "  Rahim   Uddin ");
        flow.set_field(Field::Phone, "017-1234-5678");
        flow.set_field(Field::Email, " Rahim@Example.com ");
        flow.set_field(Field::Address, "House 12, Road 5, Dhanmondi, Dhaka");
    }

    #[test]
    fn test_begin_refuses_empty_cart() {
        let cart = CartStore::load(MemoryStorage::new());
        assert!(matches!(
            CheckoutFlow::begin(&cart),
            Err(SubmitError::EmptyCart)
        ));
    }

    #[test]
    fn test_untouched_fields_show_no_errors_while_typing() {
        let cart = cart_with(1000, 1);
        let mut flow = CheckoutFlow::begin(&cart).unwrap();
        flow.set_field(Field::Phone, "123");
        assert!(flow.draft().field_errors.is_empty());

        assert!(!flow.blur_field(Field::Phone));
        assert!(flow.draft().field_errors.contains_key(&Field::Phone));

        // touched: fixed as soon as it becomes valid
        flow.set_field(Field::Phone, "01712345678");
        assert!(!flow.draft().field_errors.contains_key(&Field::Phone));
    }

    #[test]
    fn test_continue_blocked_until_shipping_is_valid() {
        let cart = cart_with(1000, 1);
        let mut flow = CheckoutFlow::begin(&cart).unwrap();
        assert!(!flow.continue_to_payment());
        assert_eq!(flow.draft().step, Step::Shipping);
        assert_eq!(flow.draft().field_errors.len(), 4);

        fill_shipping(&mut flow);
        assert!(flow.continue_to_payment());
        assert_eq!(flow.draft().step, Step::Payment);
        assert!(flow.draft().field_errors.is_empty());
    }

    #[test]
    fn test_back_keeps_values() {
        let cart = cart_with(1000, 1);
        let mut flow = CheckoutFlow::begin(&cart).unwrap();
        fill_shipping(&mut flow);
        assert!(flow.continue_to_payment());
        flow.back_to_shipping();
        assert_eq!(flow.draft().step, Step::Shipping);
        assert_eq!(flow.draft().shipping.phone, "017-1234-5678");
    }

    #[test]
    fn test_switching_away_from_wallet_drops_wallet_errors() {
        let cart = cart_with(1000, 1);
        let mut flow = CheckoutFlow::begin(&cart).unwrap();
        flow.select_payment_method(PaymentMethod::MobileWallet);
        flow.blur_field(Field::TransactionId);
        assert!(flow.draft().field_errors.contains_key(&Field::TransactionId));

        flow.select_payment_method(PaymentMethod::CashOnDelivery);
        assert!(flow.draft().field_errors.is_empty());
    }

    #[test]
    fn test_payload_is_sanitized_and_totalled() {
        let cart = cart_with(3000, 2);
        let mut flow = CheckoutFlow::begin(&cart).unwrap();
        fill_shipping(&mut flow);
        flow.select_payment_method(PaymentMethod::MobileWallet);
        flow.set_field(Field::WalletNumber, "01812 345 678");
        flow.set_field(Field::TransactionId, " 8n4k2x9q ");

        let payload = flow.build_payload(cart.snapshot(), None);
        assert_eq!(payload.customer_name, "Rahim Uddin");
        assert_eq!(payload.email, "rahim@example.com");
        assert_eq!(payload.phone, "01712345678");
        assert_eq!(payload.total, Price::new(6400));
        assert_eq!(payload.bkash_number.as_deref(), Some("01812345678"));
        assert!(payload.transaction_id.is_some());
        assert_eq!(payload.user_id, None);
    }

    #[tokio::test]
    async fn test_submit_places_order_and_clears_cart() {
        let orders = OrderRepository::new(MemoryOrderStore::new());
        let mut cart = cart_with(3000, 2);
        let mut flow = CheckoutFlow::begin(&cart).unwrap();
        fill_shipping(&mut flow);
        assert!(flow.continue_to_payment());
        assert!(flow.can_submit());

        let identity = Identity::customer("U1", Some(Email::parse("rahim@example.com").unwrap()));
        let placed = flow.submit(&mut cart, Some(&identity), &orders).await.unwrap();

        assert!(cart.is_empty());
        assert_eq!(placed.order.total, Price::new(6400));
        assert_eq!(placed.order.status, OrderStatus::Pending);
        assert_eq!(flow.guard().state(), SubmissionState::Completed);
        assert!(!flow.can_submit());

        let stored = orders.store().list(&FeedScope::All).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, placed.id);
        assert_eq!(stored[0].user_id.as_ref().map(|u| u.as_str()), Some("U1"));
    }

    #[tokio::test]
    async fn test_submit_twice_creates_one_order() {
        let orders = OrderRepository::new(MemoryOrderStore::new());
        let mut cart = cart_with(1000, 1);
        let mut flow = CheckoutFlow::begin(&cart).unwrap();
        fill_shipping(&mut flow);
        assert!(flow.continue_to_payment());

        flow.submit(&mut cart, None, &orders).await.unwrap();
        let mut refilled = cart_with(1000, 1);
        let err = flow.submit(&mut refilled, None, &orders).await.unwrap_err();
        assert!(matches!(err, SubmitError::AlreadySubmitted));
        assert_eq!(orders.store().len(), 1);
        assert!(!refilled.is_empty());
    }

    #[tokio::test]
    async fn test_placed_draft_refuses_under_a_new_guard() {
        let orders = OrderRepository::new(MemoryOrderStore::new());
        let mut cart = cart_with(1000, 1);
        let mut flow = CheckoutFlow::begin(&cart).unwrap();
        fill_shipping(&mut flow);
        assert!(flow.continue_to_payment());
        let placed = flow.submit(&mut cart, None, &orders).await.unwrap();
        assert_eq!(flow.draft().placed_order.as_ref(), Some(&placed.id));

        // Same draft, but its remembered guard is gone.
        let mut replay = CheckoutFlow::resume(flow.draft().clone(), SubmissionGuard::new());
        assert!(!replay.can_submit());
        let mut refilled = cart_with(1000, 1);
        let err = replay.submit(&mut refilled, None, &orders).await.unwrap_err();
        assert!(matches!(err, SubmitError::AlreadySubmitted));
        assert_eq!(orders.store().len(), 1);
        assert_eq!(replay.guard().state(), SubmissionState::Idle);
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_cart_and_allows_retry() {
        let store = MemoryOrderStore::new();
        let orders = OrderRepository::new(store.clone());
        let mut cart = cart_with(1000, 1);
        let mut flow = CheckoutFlow::begin(&cart).unwrap();
        fill_shipping(&mut flow);
        assert!(flow.continue_to_payment());

        store.set_unavailable(true);
        let err = flow.submit(&mut cart, None, &orders).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(cart.item_count(), 1);
        assert_eq!(flow.guard().state(), SubmissionState::Idle);
        assert_eq!(flow.draft().shipping.name, "  Rahim   Uddin ");

        store.set_unavailable(false);
        flow.submit(&mut cart, None, &orders).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_requires_payment_step_and_wallet_details() {
        let orders = OrderRepository::new(MemoryOrderStore::new());
        let mut cart = cart_with(1000, 1);
        let mut flow = CheckoutFlow::begin(&cart).unwrap();
        fill_shipping(&mut flow);

        let err = flow.submit(&mut cart, None, &orders).await.unwrap_err();
        assert!(matches!(err, SubmitError::NotOnPaymentStep));

        assert!(flow.continue_to_payment());
        flow.select_payment_method(PaymentMethod::MobileWallet);
        let err = flow.submit(&mut cart, None, &orders).await.unwrap_err();
        let SubmitError::Invalid(errors) = err else {
            panic!("expected validation errors");
        };
        assert!(errors.contains_key(&Field::WalletNumber));
        assert!(errors.contains_key(&Field::TransactionId));
        assert!(orders.store().is_empty());
    }

    #[tokio::test]
    async fn test_punctuation_only_transaction_id_is_refused() {
        let orders = OrderRepository::new(MemoryOrderStore::new());
        let mut cart = cart_with(1000, 1);
        let mut flow = CheckoutFlow::begin(&cart).unwrap();
        fill_shipping(&mut flow);
        assert!(flow.continue_to_payment());
        flow.select_payment_method(PaymentMethod::MobileWallet);
        flow.set_field(Field::WalletNumber, "01812345678");
        flow.set_field(Field::TransactionId, "--------");
        assert!(!flow.can_submit());

        let err = flow.submit(&mut cart, None, &orders).await.unwrap_err();
        let SubmitError::Invalid(errors) = err else {
            panic!("expected validation errors");
        };
        assert!(errors.contains_key(&Field::TransactionId));
        assert!(orders.store().is_empty());

        flow.set_field(Field::TransactionId, "8n4k-2x9q");
        let placed = flow.submit(&mut cart, None, &orders).await.unwrap();
        assert_eq!(placed.order.transaction_id.as_deref(), Some("8N4K2X9Q"));
    }

    #[test]
    fn test_control_characters_do_not_count_toward_shipping_fields() {
        let cart = cart_with(1000, 1);
        let mut flow = CheckoutFlow::begin(&cart).unwrap();
        fill_shipping(&mut flow);
        flow.set_field(Field::Name, "\u{1}\u{2}\u{3}");
        flow.set_field(Field::Address, "\u{7}".repeat(20));
        assert!(!flow.continue_to_payment());
        assert!(flow.draft().field_errors.contains_key(&Field::Name));
        assert!(flow.draft().field_errors.contains_key(&Field::Address));
    }

    #[tokio::test]
    async fn test_submit_with_emptied_cart() {
        let orders = OrderRepository::new(MemoryOrderStore::new());
        let mut cart = cart_with(1000, 1);
        let mut flow = CheckoutFlow::begin(&cart).unwrap();
        fill_shipping(&mut flow);
        assert!(flow.continue_to_payment());
        cart.clear();

        let err = flow.submit(&mut cart, None, &orders).await.unwrap_err();
        assert!(matches!(err, SubmitError::EmptyCart));
        assert!(orders.store().is_empty());
    }
}
