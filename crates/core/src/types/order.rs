//! Orders and the checkout payload that creates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cart_line::CartLine;
use super::id::{OrderId, UserId};
use super::price::{OrderTotals, Price};
use super::status::{OrderStatus, PaymentMethod};

/// The record checkout hands to the order repository.
///
/// Every string field has already been sanitized. `items` is an owned copy of
/// the cart lines at submission time, never a view into the live cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub customer_name: String,
    pub email: String,
    pub user_id: Option<UserId>,
    pub address: String,
    pub phone: String,
    pub items: Vec<CartLine>,
    pub total: Price,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bkash_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub user_id: Option<UserId>,
    pub items: Vec<CartLine>,
    pub total: Price,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bkash_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Assemble an order from a stored payload.
    #[must_use]
    pub fn from_payload(
        id: OrderId,
        payload: OrderPayload,
        status: OrderStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_name: payload.customer_name,
            email: payload.email,
            phone: payload.phone,
            address: payload.address,
            user_id: payload.user_id,
            items: payload.items,
            total: payload.total,
            payment_method: payload.payment_method,
            bkash_number: payload.bkash_number,
            transaction_id: payload.transaction_id,
            status,
            created_at,
        }
    }

    /// Sum of the snapshot line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().map(CartLine::line_total).sum()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Price breakdown. The grand total is the one recorded at checkout.
    #[must_use]
    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            total: self.total,
            ..OrderTotals::for_subtotal(self.subtotal())
        }
    }

    /// Whether this order was placed without a signed-in account.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{Email, Identity, ProductId};

    fn order(user_id: Option<&str>, email: &str) -> Order {
        let items = vec![CartLine {
            product_id: ProductId::new("EG-AV-001"),
            variant_key: Some("Prescription Power".to_owned()),
            name: "Aviator Frame".to_owned(),
            unit_price: Price::new(3000),
            quantity: 2,
            image: String::new(),
        }];
        Order::from_payload(
            OrderId::new("abc123"),
            OrderPayload {
                customer_name: "Rahim Uddin".to_owned(),
                email: email.to_owned(),
                user_id: user_id.map(UserId::new),
                address: "House 12, Road 5, Dhanmondi".to_owned(),
                phone: "01712345678".to_owned(),
                items,
                total: Price::new(6400),
                payment_method: PaymentMethod::CashOnDelivery,
                bkash_number: None,
                transaction_id: None,
            },
            OrderStatus::Pending,
            Utc::now(),
        )
    }

    #[test]
    fn test_totals_use_recorded_total() {
        let order = order(Some("U1"), "rahim@example.com");
        let totals = order.totals();
        assert_eq!(totals.subtotal, Price::new(6000));
        assert_eq!(totals.shipping, Price::new(100));
        assert_eq!(totals.tax, Price::new(300));
        assert_eq!(totals.total, Price::new(6400));
        assert_eq!(order.item_count(), 2);
    }

    #[test]
    fn test_owner_matches_on_user_id() {
        let order = order(Some("U1"), "rahim@example.com");
        assert!(Identity::customer("U1", None).owns(&order));
        assert!(!Identity::customer("U2", None).owns(&order));
    }

    #[test]
    fn test_user_id_wins_over_email() {
        let order = order(Some("U1"), "rahim@example.com");
        let other = Identity::customer("U2", Some(Email::parse("rahim@example.com").unwrap()));
        assert!(!other.owns(&order));
    }

    #[test]
    fn test_guest_order_matches_on_email() {
        let order = order(None, "Rahim@Example.com");
        assert!(order.is_guest());
        let same_email =
            Identity::customer("U9", Some(Email::parse("rahim@example.com").unwrap()));
        assert!(same_email.owns(&order));
        assert!(!Identity::customer("U9", None).owns(&order));
    }

    #[test]
    fn test_admin_can_view_everything() {
        let order = order(Some("U1"), "rahim@example.com");
        let admin = Identity::admin("A1");
        assert!(!admin.owns(&order));
        assert!(admin.can_view(&order));
    }

    #[test]
    fn test_payload_omits_absent_wallet_fields() {
        let json = serde_json::to_value(order(None, "guest@example.com")).unwrap();
        assert!(json.get("bkashNumber").is_none());
        assert!(json["userId"].is_null());
        assert_eq!(json["paymentMethod"], "cod");
    }
}
