use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::transactions::{InsertTransactionEntity, TransactionEntity};
use crate::domain::value_objects::enums::transaction_statuses::TransactionStatus;

#[automock]
#[async_trait]
pub trait TransactionRepository {
    async fn insert_pending(&self, transaction: InsertTransactionEntity) -> Result<Uuid>;

    async fn find_by_id(&self, transaction_id: Uuid) -> Result<Option<TransactionEntity>>;

    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<TransactionEntity>>;

    /// Claims the row for reconciliation until `lease_until` when no unexpired lease exists.
    async fn acquire_reconcile_lease(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<bool>;

    async fn release_reconcile_lease(&self, transaction_id: Uuid) -> Result<()>;

    /// Moves a non-failed row to `succeeded`, adds `credits_delta` to `credits_added`
    /// and releases the lease. Returns false when the row is `failed` or missing.
    async fn record_reconciliation(
        &self,
        transaction_id: Uuid,
        payment_intent_id: Option<String>,
        credits_delta: i32,
    ) -> Result<bool>;

    /// Status-only `pending -> succeeded`. Never touches `credits_added`.
    async fn mark_succeeded_if_pending(&self, transaction_id: Uuid) -> Result<bool>;

    async fn mark_failed_by_session_id(&self, session_id: &str) -> Result<bool>;

    /// `pending -> status` for rows matching the payment intent. Returns the number of rows moved.
    async fn update_pending_status_by_payment_intent(
        &self,
        payment_intent_id: &str,
        status: TransactionStatus,
    ) -> Result<usize>;

    /// Non-failed rows with `credits_added < credits_purchased` that are either `succeeded`
    /// and last touched at or before `updated_before`, or hold a reconciliation lease that
    /// expired at or before `updated_before` (an interrupted reconciliation).
    async fn list_under_credited(
        &self,
        updated_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TransactionEntity>>;
}
