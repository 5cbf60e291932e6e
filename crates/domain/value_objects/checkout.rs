use serde::{Deserialize, Serialize};

use crate::domain::value_objects::transactions::TransactionDto;

/// Keys written into the Stripe checkout session metadata and read back by the webhook.
pub mod metadata_keys {
    pub const USER_ID: &str = "user_id";
    pub const BUNDLE_ID: &str = "bundle_id";
    pub const CREDITS: &str = "credits";
    pub const ORIGINAL_AMOUNT: &str = "original_amount";
    pub const DISCOUNT_AMOUNT: &str = "discount_amount";
    pub const COUPON_ID: &str = "coupon_id";
    pub const COUPON_CODE: &str = "coupon_code";
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    #[serde(default)]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifySessionRequest {
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub payment_status: String,
    pub status: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub customer_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifySessionResponse {
    pub success: bool,
    pub session: SessionSummary,
    pub transaction: Option<TransactionDto>,
    pub plan_name: Option<String>,
    pub credits: i32,
}
