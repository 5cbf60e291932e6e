use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// `payment_status` of a Stripe Checkout Session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutPaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl CheckoutPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutPaymentStatus::Paid => "paid",
            CheckoutPaymentStatus::Unpaid => "unpaid",
            CheckoutPaymentStatus::NoPaymentRequired => "no_payment_required",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "paid" => Some(CheckoutPaymentStatus::Paid),
            "unpaid" => Some(CheckoutPaymentStatus::Unpaid),
            "no_payment_required" => Some(CheckoutPaymentStatus::NoPaymentRequired),
            _ => None,
        }
    }

    /// Whether the funds for the session are settled and credits may be granted.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            CheckoutPaymentStatus::Paid | CheckoutPaymentStatus::NoPaymentRequired
        )
    }
}

impl Display for CheckoutPaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
