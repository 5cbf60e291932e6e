use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of the `validate_coupon` stored procedure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CouponValidation {
    pub is_valid: bool,
    pub discount_amount: i32,
    pub coupon_id: Option<Uuid>,
    pub error_message: Option<String>,
}

impl CouponValidation {
    pub fn rejected(message: &str) -> Self {
        Self {
            is_valid: false,
            discount_amount: 0,
            coupon_id: None,
            error_message: Some(message.to_string()),
        }
    }
}

/// Arguments of the `apply_coupon` stored procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRedemption {
    pub coupon_id: Uuid,
    pub user_id: Uuid,
    pub payment_id: String,
    pub original_amount: i32,
    pub discount_amount: i32,
}
