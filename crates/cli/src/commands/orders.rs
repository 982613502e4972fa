//! Order inspection and administration.
//!
//! # Usage
//!
//! ```bash
//! opticart orders list --admin --status pending
//! opticart orders list --user-id U1 --account-email rahim@example.com
//! opticart orders show 3f2a... --admin
//! opticart orders set-status 3f2a... shipped --expected processing
//! opticart orders watch --admin
//! ```

use opticart_core::{Identity, Order, OrderId, OrderStatus};
use opticart_storefront::invoice::{self, InvoiceLookup};
use opticart_storefront::orders::FeedSnapshot;

use super::{CLI_ADMIN_ID, CommandError};

#[allow(clippy::print_stdout)]
fn print(text: &str) {
    println!("{text}");
}

/// One summary line per order.
pub(crate) fn summary(order: &Order) -> String {
    format!(
        "{}  {}  {:<10}  {:>12}  {} ({})",
        order.id,
        order.created_at.format("%Y-%m-%d %H:%M"),
        order.status.as_str(),
        order.total.to_string(),
        order.customer_name,
        order.payment_method.label(),
    )
}

/// List the orders `identity` may see, newest first.
pub async fn list(identity: Option<&Identity>, status: Option<OrderStatus>) -> Result<(), CommandError> {
    if identity.is_none() {
        tracing::warn!("No identity given; pass --user-id or --admin to see orders");
    }

    let orders = super::order_repository().await?;
    let mut visible = orders.list(identity).await?;
    if let Some(status) = status {
        visible.retain(|order| order.status == status);
    }

    for order in &visible {
        print(&summary(order));
    }
    tracing::info!("{} order(s)", visible.len());
    Ok(())
}

/// Print one order's invoice as JSON.
pub async fn show(id: &str, identity: Option<&Identity>) -> Result<(), CommandError> {
    let orders = super::order_repository().await?;
    let id = OrderId::new(id);
    let order = orders.fetch(&id).await?;

    match invoice::resolve(order, identity, &[]) {
        InvoiceLookup::Found(invoice) => {
            let json = serde_json::to_string_pretty(&invoice)
                .map_err(|e| CommandError::InvalidArgument(e.to_string()))?;
            print(&json);
            Ok(())
        }
        InvoiceLookup::NotFound => Err(CommandError::InvalidArgument(format!("order {id} not found"))),
        InvoiceLookup::AccessDenied => Err(CommandError::InvalidArgument(format!(
            "no access to order {id}; pass --admin or the owner's --user-id"
        ))),
    }
}

/// Change an order's status as the CLI administrator.
pub async fn set_status(
    id: &str,
    status: OrderStatus,
    expected: Option<OrderStatus>,
) -> Result<(), CommandError> {
    let orders = super::order_repository().await?;
    let admin = Identity::admin(CLI_ADMIN_ID);
    let id = OrderId::new(id);

    orders.update_status(&admin, &id, status, expected).await?;
    tracing::info!(order_id = %id, status = %status, "Order status changed");
    Ok(())
}

/// Print the feed every time it changes, until Ctrl+C.
pub async fn watch(identity: Option<&Identity>) -> Result<(), CommandError> {
    let orders = super::order_repository().await?;
    let mut feed = orders.subscribe(identity);

    let first = feed.ready().await;
    print_snapshot(&first);

    loop {
        tokio::select! {
            next = feed.changed() => match next {
                Some(snapshot) => print_snapshot(&snapshot),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    feed.unsubscribe();
    Ok(())
}

fn print_snapshot(snapshot: &FeedSnapshot) {
    tracing::info!(status = ?snapshot.status, "{} order(s)", snapshot.orders.len());
    for order in &*snapshot.orders {
        print(&summary(order));
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use opticart_core::{OrderPayload, PaymentMethod, Price};

    use super::*;

    #[test]
    fn test_summary_line() {
        let created_at = Utc
            .with_ymd_and_hms(2026, 3, 14, 9, 30, 0)
            .single()
            .unwrap_or_else(|| panic!("valid timestamp"));
        let order = Order::from_payload(
            OrderId::new("abc123"),
            OrderPayload {
                customer_name: "Rahim Uddin".to_owned(),
                email: "rahim@example.com".to_owned(),
                user_id: None,
                address: "Dhanmondi".to_owned(),
                phone: "01712345678".to_owned(),
                items: Vec::new(),
                total: Price::new(6400),
                payment_method: PaymentMethod::CashOnDelivery,
                bkash_number: None,
                transaction_id: None,
            },
            OrderStatus::Shipped,
            created_at,
        );

        let line = summary(&order);
        assert!(line.starts_with("abc123  2026-03-14 09:30  shipped"));
        assert!(line.contains("Tk 6,400"));
        assert!(line.ends_with("Rahim Uddin (Cash on Delivery)"));
    }
}
