//! Status enums for orders and payments.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// Orders start as `Pending` and only move forward or to `Cancelled`. The
/// repository does not enforce a transition graph; administrators overwrite
/// the status with one of these fixed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Every status an administrator may assign, in display order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// The forward delivery path shown by the tracking view.
    pub const PROGRESSION: [Self; 4] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
    ];

    /// Stable lowercase name, as stored and sent over the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Position on the delivery path, or `None` for `Cancelled`.
    #[must_use]
    pub fn progress_index(&self) -> Option<usize> {
        Self::PROGRESSION.iter().position(|s| s == self)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// How the customer intends to pay.
///
/// The method is recorded on the order; payments are not settled in-system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    /// Cash collected by the courier.
    #[default]
    #[serde(rename = "cod", alias = "COD", alias = "CashOnDelivery")]
    CashOnDelivery,
    /// bKash mobile wallet transfer; requires the wallet number and transaction ID.
    #[serde(rename = "bkash", alias = "bKash", alias = "MobileWallet")]
    MobileWallet,
    /// Card payment taken on delivery or by the payment collaborator.
    #[serde(rename = "card", alias = "Card")]
    Card,
}

impl PaymentMethod {
    /// Stable lowercase name, as stored and sent over the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CashOnDelivery => "cod",
            Self::MobileWallet => "bkash",
            Self::Card => "card",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CashOnDelivery => "Cash on Delivery",
            Self::MobileWallet => "bKash",
            Self::Card => "Card",
        }
    }

    /// Whether checkout must collect wallet number and transaction ID.
    #[must_use]
    pub const fn requires_wallet_details(&self) -> bool {
        matches!(self, Self::MobileWallet)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cod" | "cashondelivery" | "cash" => Ok(Self::CashOnDelivery),
            "bkash" | "mobilewallet" | "wallet" => Ok(Self::MobileWallet),
            "card" => Ok(Self::Card),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}
