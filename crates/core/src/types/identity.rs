//! Caller identity supplied by the authentication collaborator.

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::UserId;
use super::order::Order;

/// An authenticated caller. Anonymous callers are represented by `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    #[serde(default)]
    pub email: Option<Email>,
    #[serde(default)]
    pub is_admin: bool,
}

impl Identity {
    /// A regular customer.
    #[must_use]
    pub fn customer(user_id: impl Into<UserId>, email: Option<Email>) -> Self {
        Self {
            user_id: user_id.into(),
            email,
            is_admin: false,
        }
    }

    /// An administrator.
    #[must_use]
    pub fn admin(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            is_admin: true,
        }
    }

    /// Whether this identity authored the order.
    ///
    /// Orders placed while signed in match on user ID. Guest orders
    /// (`user_id = null`) match on email, which is not verified at checkout.
    #[must_use]
    pub fn owns(&self, order: &Order) -> bool {
        match &order.user_id {
            Some(owner) => *owner == self.user_id,
            None => match (&self.email, Email::parse(&order.email)) {
                (Some(mine), Ok(theirs)) => mine.matches(&theirs),
                _ => false,
            },
        }
    }

    /// Whether this identity may see the order at all.
    #[must_use]
    pub fn can_view(&self, order: &Order) -> bool {
        self.is_admin || self.owns(order)
    }
}
