//! Terminal checkout.
//!
//! Runs the same flow as the web checkout: shipping fields are validated
//! before the payment step, and the cart is only cleared once the store has
//! accepted the order.

use opticart_core::{Identity, PaymentMethod};
use opticart_storefront::checkout::{CheckoutFlow, Field, SubmitError};

use super::CommandError;

/// Everything the customer types at checkout.
#[derive(Debug, Clone)]
pub struct CheckoutDetails {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub payment: PaymentMethod,
    pub wallet_number: Option<String>,
    pub transaction_id: Option<String>,
}

/// Fill a flow from `details` and move it to the payment step.
///
/// Returns the field errors if the shipping step does not validate.
pub(crate) fn prepare(
    flow: &mut CheckoutFlow,
    details: CheckoutDetails,
) -> Result<(), SubmitError> {
    flow.set_field(Field::Name, details.name);
    flow.set_field(Field::Phone, details.phone);
    flow.set_field(Field::Email, details.email);
    flow.set_field(Field::Address, details.address);
    if !flow.continue_to_payment() {
        return Err(SubmitError::Invalid(flow.draft().field_errors.clone()));
    }

    flow.select_payment_method(details.payment);
    if let Some(number) = details.wallet_number {
        flow.set_field(Field::WalletNumber, number);
    }
    if let Some(transaction_id) = details.transaction_id {
        flow.set_field(Field::TransactionId, transaction_id);
    }
    Ok(())
}

/// Place an order for the terminal cart.
pub async fn run(details: CheckoutDetails, identity: Option<&Identity>) -> Result<(), CommandError> {
    let mut cart = super::load_cart();
    let mut flow = CheckoutFlow::begin(&cart)?;

    if let Err(err) = prepare(&mut flow, details) {
        report_field_errors(&err);
        return Err(err.into());
    }

    let orders = super::order_repository().await?;
    match flow.submit(&mut cart, identity, &orders).await {
        Ok(placed) => {
            tracing::info!(order_id = %placed.id, total = %placed.order.total, "Order placed");
            #[allow(clippy::print_stdout)]
            {
                println!("{}", placed.id);
            }
            Ok(())
        }
        Err(err) => {
            report_field_errors(&err);
            if err.is_retryable() {
                tracing::warn!("Your cart was kept; run the command again to retry");
            }
            Err(err.into())
        }
    }
}

fn report_field_errors(err: &SubmitError) {
    if let SubmitError::Invalid(errors) = err {
        for (field, message) in errors {
            tracing::error!(?field, "{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use opticart_core::{CatalogItem, Price};
    use opticart_storefront::cart::{CartStore, MemoryStorage};

    use super::*;

    fn flow() -> CheckoutFlow {
        let mut cart = CartStore::load(MemoryStorage::new());
        cart.add_item(CatalogItem {
            product_id: "EG-AV-001".into(),
            variant_key: None,
            name: "Aviator".to_owned(),
            unit_price: Price::new(3000),
            image: String::new(),
        });
        CheckoutFlow::begin(&cart).unwrap_or_else(|e| panic!("begin: {e}"))
    }

    fn details() -> CheckoutDetails {
        CheckoutDetails {
            name: "Rahim Uddin".to_owned(),
            phone: "01712345678".to_owned(),
            email: "rahim@example.com".to_owned(),
            address: "House 12, Road 5, Dhanmondi".to_owned(),
            payment: PaymentMethod::CashOnDelivery,
            wallet_number: None,
            transaction_id: None,
        }
    }

    #[test]
    fn test_valid_details_reach_payment_step() {
        let mut flow = flow();
        assert!(prepare(&mut flow, details()).is_ok());
        assert!(flow.can_submit());
    }

    #[test]
    fn test_bad_phone_stops_at_shipping() {
        let mut flow = flow();
        let mut details = details();
        details.phone = "12345".to_owned();
        let Err(SubmitError::Invalid(errors)) = prepare(&mut flow, details) else {
            panic!("expected field errors");
        };
        assert!(errors.contains_key(&Field::Phone));
    }

    #[test]
    fn test_wallet_payment_needs_wallet_fields() {
        let mut flow = flow();
        let mut details = details();
        details.payment = PaymentMethod::MobileWallet;
        assert!(prepare(&mut flow, details).is_ok());
        assert!(!flow.can_submit());
    }
}
