//! Invoice and tracking views with access control.
//!
//! An order is shown to administrators, to its owner, and to the session that
//! placed it. Anyone else gets an explicit access-denied result that carries no
//! order data.

use opticart_core::{Identity, Order, OrderId, OrderStatus, OrderTotals};
use serde::Serialize;

/// Outcome of looking up an invoice.
#[derive(Debug, Clone)]
pub enum InvoiceLookup {
    NotFound,
    AccessDenied,
    Found(Box<Invoice>),
}

/// A read-only order view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub order: Order,
    pub totals: OrderTotals,
    pub progress: TrackingProgress,
}

impl Invoice {
    #[must_use]
    pub fn new(order: Order) -> Self {
        Self {
            totals: order.totals(),
            progress: TrackingProgress::for_status(order.status),
            order,
        }
    }
}

/// One step on the delivery path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStep {
    pub status: OrderStatus,
    pub label: &'static str,
    pub reached: bool,
    pub current: bool,
}

/// Delivery progress for the tracking view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingProgress {
    pub steps: Vec<TrackingStep>,
    pub cancelled: bool,
}

impl TrackingProgress {
    /// Progress for an order currently in `status`.
    ///
    /// A cancelled order has no reached steps beyond placement.
    #[must_use]
    pub fn for_status(status: OrderStatus) -> Self {
        let cancelled = status == OrderStatus::Cancelled;
        let position = status.progress_index().unwrap_or(0);
        let steps = OrderStatus::PROGRESSION
            .iter()
            .enumerate()
            .map(|(index, &step)| TrackingStep {
                status: step,
                label: step.label(),
                reached: index <= position,
                current: !cancelled && index == position,
            })
            .collect();
        Self { steps, cancelled }
    }
}

/// Decide what `identity` may see of `order`.
///
/// `receipts` are the IDs of orders placed by the current session.
#[must_use]
pub fn resolve(order: Option<Order>, identity: Option<&Identity>, receipts: &[OrderId]) -> InvoiceLookup {
    let Some(order) = order else {
        return InvoiceLookup::NotFound;
    };

    let allowed = identity.is_some_and(|identity| identity.can_view(&order))
        || receipts.contains(&order.id);
    if allowed {
        InvoiceLookup::Found(Box::new(Invoice::new(order)))
    } else {
        InvoiceLookup::AccessDenied
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::Utc;
    use opticart_core::{CartLine, CatalogItem, OrderPayload, PaymentMethod, Price, UserId};

    use super::*;

    fn order(id: &str, owner: Option<&str>) -> Order {
        let mut line = CartLine::from_item(CatalogItem {
            product_id: "EG-AV-001".into(),
            variant_key: Some("Prescription Power".to_owned()),
            name: "Aviator".to_owned(),
            unit_price: Price::new(3000),
            image: String::new(),
        });
        line.quantity = 2;
        Order::from_payload(
            OrderId::new(id),
            OrderPayload {
                customer_name: "Rahim Uddin".to_owned(),
                email: "rahim@example.com".to_owned(),
                user_id: owner.map(UserId::new),
                address: "House 12, Road 5, Dhanmondi".to_owned(),
                phone: "01712345678".to_owned(),
                items: vec![line],
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
    fn test_owner_sees_invoice_with_totals() {
        let identity = Identity::customer("U1", None);
        let InvoiceLookup::Found(invoice) =
            resolve(Some(order("abc123", Some("U1"))), Some(&identity), &[])
        else {
            panic!("owner should see the invoice");
        };
        assert_eq!(invoice.totals.subtotal, Price::new(6000));
        assert_eq!(invoice.totals.shipping, Price::new(100));
        assert_eq!(invoice.totals.tax, Price::new(300));
        assert_eq!(invoice.totals.total, Price::new(6400));
    }

    #[test]
    fn test_other_customer_is_denied() {
        let identity = Identity::customer("U2", None);
        assert!(matches!(
            resolve(Some(order("abc123", Some("U1"))), Some(&identity), &[]),
            InvoiceLookup::AccessDenied
        ));
        assert!(matches!(
            resolve(Some(order("abc123", Some("U1"))), None, &[]),
            InvoiceLookup::AccessDenied
        ));
    }

    #[test]
    fn test_admin_and_placing_session_see_invoice() {
        let admin = Identity::admin("root");
        assert!(matches!(
            resolve(Some(order("abc123", Some("U1"))), Some(&admin), &[]),
            InvoiceLookup::Found(_)
        ));
        let receipts = [OrderId::new("guest1")];
        assert!(matches!(
            resolve(Some(order("guest1", None)), None, &receipts),
            InvoiceLookup::Found(_)
        ));
    }

    #[test]
    fn test_missing_order_is_not_found() {
        assert!(matches!(
            resolve(None, Some(&Identity::admin("root")), &[]),
            InvoiceLookup::NotFound
        ));
    }

    #[test]
    fn test_tracking_progress() {
        let shipped = TrackingProgress::for_status(OrderStatus::Shipped);
        let reached: Vec<_> = shipped.steps.iter().map(|s| s.reached).collect();
        assert_eq!(reached, [true, true, true, false]);
        assert!(shipped.steps[2].current);
        assert!(!shipped.cancelled);

        let cancelled = TrackingProgress::for_status(OrderStatus::Cancelled);
        assert!(cancelled.cancelled);
        assert!(cancelled.steps.iter().all(|s| !s.current));
        assert_eq!(cancelled.steps.iter().filter(|s| s.reached).count(), 1);
    }
}
