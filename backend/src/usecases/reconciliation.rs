use std::sync::Arc;

use chrono::{Duration, Utc};
use crates::domain::{
    entities::transactions::TransactionEntity,
    repositories::{
        coupons::CouponRepository, credits::CreditRepository,
        transactions::TransactionRepository,
    },
    value_objects::{
        checkout::metadata_keys,
        coupons::CouponRedemption,
        enums::transaction_statuses::TransactionStatus,
        reconciliation::{ReconciliationInput, ReconciliationOutcome, credits_to_add},
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ReconciliationError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        match self {
            ReconciliationError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type ReconcileResult<T> = std::result::Result<T, ReconciliationError>;

/// Tally of one credit repair sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairSummary {
    pub scanned: usize,
    pub repaired: usize,
    pub still_missing: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Brings a transaction in line with a paid checkout session, granting each
/// purchased credit at most once.
pub struct ReconciliationUseCase<T, Cr, Co>
where
    T: TransactionRepository + Send + Sync + 'static,
    Cr: CreditRepository + Send + Sync + 'static,
    Co: CouponRepository + Send + Sync + 'static,
{
    transaction_repo: Arc<T>,
    credit_repo: Arc<Cr>,
    coupon_repo: Arc<Co>,
    lease_duration: Duration,
}

impl<T, Cr, Co> ReconciliationUseCase<T, Cr, Co>
where
    T: TransactionRepository + Send + Sync + 'static,
    Cr: CreditRepository + Send + Sync + 'static,
    Co: CouponRepository + Send + Sync + 'static,
{
    pub fn new(
        transaction_repo: Arc<T>,
        credit_repo: Arc<Cr>,
        coupon_repo: Arc<Co>,
        lease_duration: Duration,
    ) -> Self {
        Self {
            transaction_repo,
            credit_repo,
            coupon_repo,
            lease_duration,
        }
    }

    pub async fn reconcile(
        &self,
        input: ReconciliationInput,
    ) -> ReconcileResult<ReconciliationOutcome> {
        info!(
            user_id = %input.user_id,
            bundle_id = %input.bundle_id,
            session_id = %input.session_id,
            intended_credits = input.intended_credits,
            "reconciliation: reconciling checkout session"
        );

        let transaction = match self
            .transaction_repo
            .find_by_session_id(&input.session_id)
            .await
            .map_err(|err| {
                error!(
                    session_id = %input.session_id,
                    db_error = ?err,
                    "reconciliation: failed to load transaction"
                );
                ReconciliationError::Internal(err)
            })? {
            Some(transaction) => transaction,
            None => {
                warn!(
                    session_id = %input.session_id,
                    user_id = %input.user_id,
                    "reconciliation: no transaction recorded for session"
                );
                return Ok(ReconciliationOutcome::NotFound {
                    session_id: input.session_id,
                });
            }
        };

        if transaction.user_id != input.user_id {
            error!(
                transaction_id = %transaction.id,
                session_id = %input.session_id,
                transaction_user_id = %transaction.user_id,
                metadata_user_id = %input.user_id,
                "reconciliation: session user does not match transaction owner"
            );
            return Ok(ReconciliationOutcome::Skipped {
                reason: "user mismatch".to_string(),
            });
        }

        if transaction.bundle_id != input.bundle_id {
            warn!(
                transaction_id = %transaction.id,
                transaction_bundle_id = %transaction.bundle_id,
                metadata_bundle_id = %input.bundle_id,
                "reconciliation: session bundle differs from transaction bundle"
            );
        }

        let outcome = self
            .settle(
                transaction,
                input.intended_credits,
                input.payment_intent_id,
            )
            .await?;

        info!(
            session_id = %input.session_id,
            outcome = outcome.label(),
            "reconciliation: checkout session reconciled"
        );
        Ok(outcome)
    }

    /// Re-grants credits still owed on `succeeded` transactions whose last update
    /// is older than `grace`.
    pub async fn repair_under_credited(
        &self,
        batch_size: i64,
        grace: Duration,
    ) -> ReconcileResult<RepairSummary> {
        let updated_before = Utc::now() - grace;
        let candidates = self
            .transaction_repo
            .list_under_credited(updated_before, batch_size)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "credit repair: failed to list under-credited transactions");
                ReconciliationError::Internal(err)
            })?;

        let mut summary = RepairSummary {
            scanned: candidates.len(),
            ..RepairSummary::default()
        };

        for transaction in candidates {
            let transaction_id = transaction.id;
            let intended = transaction.credits_purchased;
            match self.settle(transaction, intended, None).await {
                Ok(ReconciliationOutcome::Credited { credits_added, .. }) => {
                    info!(%transaction_id, credits_added, "credit repair: missing credits granted");
                    summary.repaired += 1;
                }
                Ok(ReconciliationOutcome::PartialSuccess {
                    missing_credits, ..
                }) => {
                    warn!(%transaction_id, missing_credits, "credit repair: credits still missing");
                    summary.still_missing += 1;
                }
                Ok(outcome) => {
                    info!(%transaction_id, outcome = outcome.label(), "credit repair: nothing to grant");
                    summary.skipped += 1;
                }
                Err(err) => {
                    error!(%transaction_id, error = ?err, "credit repair: transaction repair failed");
                    summary.errors += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn settle(
        &self,
        transaction: TransactionEntity,
        intended_credits: i32,
        payment_intent_id: Option<String>,
    ) -> ReconcileResult<ReconciliationOutcome> {
        let transaction_id = transaction.id;
        let payment_intent_id =
            payment_intent_id.or_else(|| transaction.stripe_payment_intent_id.clone());

        if transaction.status() == TransactionStatus::Failed {
            error!(
                %transaction_id,
                session_id = %transaction.stripe_session_id,
                "reconciliation: payment completed for a failed transaction, manual review required"
            );
            return Ok(ReconciliationOutcome::Skipped {
                reason: "transaction is failed".to_string(),
            });
        }

        let to_add = credits_to_add(
            intended_credits,
            transaction.credits_purchased,
            transaction.credits_added,
        );
        if to_add == 0 {
            return self
                .record_without_credit(transaction_id, payment_intent_id)
                .await;
        }

        let now = Utc::now();
        let acquired = self
            .transaction_repo
            .acquire_reconcile_lease(transaction_id, now, now + self.lease_duration)
            .await
            .map_err(|err| {
                error!(%transaction_id, db_error = ?err, "reconciliation: failed to acquire lease");
                ReconciliationError::Internal(err)
            })?;
        if !acquired {
            info!(%transaction_id, "reconciliation: another delivery holds the lease");
            return Ok(ReconciliationOutcome::InProgress { transaction_id });
        }

        // Counters may have moved between the first read and the lease.
        let transaction = match self.transaction_repo.find_by_id(transaction_id).await {
            Ok(Some(transaction)) => transaction,
            Ok(None) => {
                self.release_lease(transaction_id).await;
                return Ok(ReconciliationOutcome::Skipped {
                    reason: "transaction disappeared".to_string(),
                });
            }
            Err(err) => {
                error!(%transaction_id, db_error = ?err, "reconciliation: failed to reload transaction");
                self.release_lease(transaction_id).await;
                return Err(ReconciliationError::Internal(err));
            }
        };

        if transaction.status() == TransactionStatus::Failed {
            self.release_lease(transaction_id).await;
            return Ok(ReconciliationOutcome::Skipped {
                reason: "transaction is failed".to_string(),
            });
        }

        let to_add = credits_to_add(
            intended_credits,
            transaction.credits_purchased,
            transaction.credits_added,
        );
        if to_add == 0 {
            return self
                .record_without_credit(transaction_id, payment_intent_id)
                .await;
        }

        let user_id = transaction.user_id;
        if let Err(err) = self.credit_repo.add_user_credits(user_id, to_add).await {
            error!(
                %transaction_id,
                %user_id,
                missing_credits = to_add,
                error = ?err,
                "reconciliation: add_user_credits failed, transaction left under-credited"
            );
            if let Err(record_err) = self
                .transaction_repo
                .record_reconciliation(transaction_id, payment_intent_id, 0)
                .await
            {
                error!(
                    %transaction_id,
                    db_error = ?record_err,
                    "reconciliation: failed to record status after credit failure"
                );
                self.release_lease(transaction_id).await;
            }
            return Ok(ReconciliationOutcome::PartialSuccess {
                transaction_id,
                missing_credits: to_add,
                reason: err.to_string(),
            });
        }

        let recorded = self
            .transaction_repo
            .record_reconciliation(transaction_id, payment_intent_id.clone(), to_add)
            .await
            .map_err(|err| {
                error!(
                    %transaction_id,
                    %user_id,
                    credits_granted = to_add,
                    db_error = ?err,
                    "reconciliation: credits granted but counter update failed"
                );
                ReconciliationError::Internal(err)
            })?;
        if !recorded {
            error!(
                %transaction_id,
                %user_id,
                credits_granted = to_add,
                "reconciliation: credits granted but transaction rejected the counter update"
            );
            self.release_lease(transaction_id).await;
            return Ok(ReconciliationOutcome::Skipped {
                reason: "counter update rejected".to_string(),
            });
        }

        info!(
            %transaction_id,
            %user_id,
            credits_added = to_add,
            "reconciliation: credits granted"
        );

        if transaction.credits_added == 0 {
            self.redeem_coupon(&transaction, payment_intent_id).await;
        }

        Ok(ReconciliationOutcome::Credited {
            transaction_id,
            credits_added: to_add,
        })
    }

    async fn record_without_credit(
        &self,
        transaction_id: Uuid,
        payment_intent_id: Option<String>,
    ) -> ReconcileResult<ReconciliationOutcome> {
        let recorded = self
            .transaction_repo
            .record_reconciliation(transaction_id, payment_intent_id, 0)
            .await
            .map_err(|err| {
                error!(%transaction_id, db_error = ?err, "reconciliation: failed to record status");
                ReconciliationError::Internal(err)
            })?;

        if !recorded {
            return Ok(ReconciliationOutcome::Skipped {
                reason: "transaction is failed".to_string(),
            });
        }

        info!(%transaction_id, "reconciliation: transaction already fully credited");
        Ok(ReconciliationOutcome::AlreadyCredited { transaction_id })
    }

    async fn release_lease(&self, transaction_id: Uuid) {
        if let Err(err) = self
            .transaction_repo
            .release_reconcile_lease(transaction_id)
            .await
        {
            warn!(%transaction_id, db_error = ?err, "reconciliation: failed to release lease");
        }
    }

    async fn redeem_coupon(&self, transaction: &TransactionEntity, payment_intent_id: Option<String>) {
        let Some(coupon_id) = transaction
            .metadata_str(metadata_keys::COUPON_ID)
            .and_then(|raw| Uuid::parse_str(raw).ok())
        else {
            return;
        };

        let amount_of = |key: &str| {
            transaction
                .metadata_str(key)
                .and_then(|raw| raw.parse::<i32>().ok())
                .unwrap_or(0)
        };

        let redemption = CouponRedemption {
            coupon_id,
            user_id: transaction.user_id,
            payment_id: payment_intent_id.unwrap_or_else(|| transaction.stripe_session_id.clone()),
            original_amount: amount_of(metadata_keys::ORIGINAL_AMOUNT),
            discount_amount: amount_of(metadata_keys::DISCOUNT_AMOUNT),
        };

        match self.coupon_repo.apply_coupon(redemption).await {
            Ok(()) => info!(
                transaction_id = %transaction.id,
                %coupon_id,
                "reconciliation: coupon redemption recorded"
            ),
            Err(err) => warn!(
                transaction_id = %transaction.id,
                %coupon_id,
                error = ?err,
                "reconciliation: failed to record coupon redemption"
            ),
        }
    }
}
