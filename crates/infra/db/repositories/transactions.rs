use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::transactions},
};
use domain::{
    entities::transactions::{InsertTransactionEntity, TransactionEntity},
    repositories::transactions::TransactionRepository,
    value_objects::enums::transaction_statuses::TransactionStatus,
};

pub struct TransactionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TransactionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TransactionRepository for TransactionPostgres {
    async fn insert_pending(&self, transaction: InsertTransactionEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let transaction_id = insert_into(transactions::table)
            .values(&transaction)
            .returning(transactions::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(transaction_id)
    }

    async fn find_by_id(&self, transaction_id: Uuid) -> Result<Option<TransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = transactions::table
            .filter(transactions::id.eq(transaction_id))
            .select(TransactionEntity::as_select())
            .first::<TransactionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_session_id(&self, session_id: &str) -> Result<Option<TransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = transactions::table
            .filter(transactions::stripe_session_id.eq(session_id))
            .select(TransactionEntity::as_select())
            .first::<TransactionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn acquire_reconcile_lease(
        &self,
        transaction_id: Uuid,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let claimed = update(transactions::table)
            .filter(transactions::id.eq(transaction_id))
            .filter(
                transactions::reconcile_lease_until
                    .is_null()
                    .or(transactions::reconcile_lease_until.lt(now)),
            )
            .set(transactions::reconcile_lease_until.eq(Some(lease_until)))
            .execute(&mut conn)?;

        Ok(claimed == 1)
    }

    async fn release_reconcile_lease(&self, transaction_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(transactions::table)
            .filter(transactions::id.eq(transaction_id))
            .set(transactions::reconcile_lease_until.eq(None::<DateTime<Utc>>))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn record_reconciliation(
        &self,
        transaction_id: Uuid,
        payment_intent_id: Option<String>,
        credits_delta: i32,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let credits_delta = credits_delta.max(0);

        let target = transactions::table
            .filter(transactions::id.eq(transaction_id))
            .filter(transactions::status.ne(TransactionStatus::Failed.to_string()))
            .filter(transactions::credits_added.le(transactions::credits_purchased - credits_delta));

        let updated = match payment_intent_id {
            Some(payment_intent_id) => update(target)
                .set((
                    transactions::status.eq(TransactionStatus::Succeeded.to_string()),
                    transactions::stripe_payment_intent_id.eq(Some(payment_intent_id)),
                    transactions::credits_added.eq(transactions::credits_added + credits_delta),
                    transactions::reconcile_lease_until.eq(None::<DateTime<Utc>>),
                    transactions::updated_at.eq(Utc::now()),
                ))
                .execute(&mut conn)?,
            None => update(target)
                .set((
                    transactions::status.eq(TransactionStatus::Succeeded.to_string()),
                    transactions::credits_added.eq(transactions::credits_added + credits_delta),
                    transactions::reconcile_lease_until.eq(None::<DateTime<Utc>>),
                    transactions::updated_at.eq(Utc::now()),
                ))
                .execute(&mut conn)?,
        };

        Ok(updated == 1)
    }

    async fn mark_succeeded_if_pending(&self, transaction_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(transactions::table)
            .filter(transactions::id.eq(transaction_id))
            .filter(transactions::status.eq(TransactionStatus::Pending.to_string()))
            .set((
                transactions::status.eq(TransactionStatus::Succeeded.to_string()),
                transactions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(updated == 1)
    }

    async fn mark_failed_by_session_id(&self, session_id: &str) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(transactions::table)
            .filter(transactions::stripe_session_id.eq(session_id))
            .filter(transactions::status.eq(TransactionStatus::Pending.to_string()))
            .set((
                transactions::status.eq(TransactionStatus::Failed.to_string()),
                transactions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(updated == 1)
    }

    async fn update_pending_status_by_payment_intent(
        &self,
        payment_intent_id: &str,
        status: TransactionStatus,
    ) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(transactions::table)
            .filter(transactions::stripe_payment_intent_id.eq(payment_intent_id))
            .filter(transactions::status.eq(TransactionStatus::Pending.to_string()))
            .set((
                transactions::status.eq(status.to_string()),
                transactions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(updated)
    }

    async fn list_under_credited(
        &self,
        updated_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<TransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = transactions::table
            .filter(transactions::status.ne(TransactionStatus::Failed.to_string()))
            .filter(transactions::credits_added.lt(transactions::credits_purchased))
            .filter(
                transactions::status
                    .eq(TransactionStatus::Succeeded.to_string())
                    .and(transactions::updated_at.le(updated_before))
                    .or(transactions::reconcile_lease_until.le(updated_before)),
            )
            .order(transactions::updated_at.asc())
            .limit(limit)
            .select(TransactionEntity::as_select())
            .load::<TransactionEntity>(&mut conn)?;

        Ok(results)
    }
}
