use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::value_objects::enums::transaction_statuses::TransactionStatus;
use crate::infra::db::postgres::schema::transactions;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = transactions)]
pub struct TransactionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bundle_id: String,
    pub stripe_session_id: String,
    pub stripe_payment_intent_id: Option<String>,
    pub amount: i32,
    pub currency: String,
    pub status: String,
    pub credits_purchased: i32,
    pub credits_added: i32,
    pub metadata: serde_json::Value,
    pub reconcile_lease_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionEntity {
    /// Unknown status strings are read as `failed` so that they never re-enter the credit path.
    pub fn status(&self) -> TransactionStatus {
        TransactionStatus::from_str(&self.status).unwrap_or(TransactionStatus::Failed)
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|value| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = transactions)]
pub struct InsertTransactionEntity {
    pub user_id: Uuid,
    pub bundle_id: String,
    pub stripe_session_id: String,
    pub stripe_payment_intent_id: Option<String>,
    pub amount: i32,
    pub currency: String,
    pub status: String,
    pub credits_purchased: i32,
    pub credits_added: i32,
    pub metadata: serde_json::Value,
}
