use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    entities::transactions::TransactionEntity,
    value_objects::enums::transaction_statuses::TransactionStatus,
};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bundle_id: String,
    pub stripe_session_id: String,
    pub stripe_payment_intent_id: Option<String>,
    pub amount: i32,
    pub currency: String,
    pub status: TransactionStatus,
    pub credits_purchased: i32,
    pub credits_added: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TransactionEntity> for TransactionDto {
    fn from(value: TransactionEntity) -> Self {
        let status = value.status();
        Self {
            id: value.id,
            user_id: value.user_id,
            bundle_id: value.bundle_id,
            stripe_session_id: value.stripe_session_id,
            stripe_payment_intent_id: value.stripe_payment_intent_id,
            amount: value.amount,
            currency: value.currency,
            status,
            credits_purchased: value.credits_purchased,
            credits_added: value.credits_added,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
