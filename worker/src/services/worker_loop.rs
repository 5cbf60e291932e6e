use anyhow::Result;
use backend::usecases::reconciliation::{ReconciliationUseCase, RepairSummary};
use crates::domain::repositories::{
    coupons::CouponRepository, credits::CreditRepository, transactions::TransactionRepository,
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

use crate::config::config_model::CreditRepair;

/// Periodically grants credits left missing by failed `add_user_credits` calls.
pub async fn run_credit_repair_loop<T, Cr, Co>(
    usecase: Arc<ReconciliationUseCase<T, Cr, Co>>,
    config: CreditRepair,
) -> Result<()>
where
    T: TransactionRepository + Send + Sync + 'static,
    Cr: CreditRepository + Send + Sync + 'static,
    Co: CouponRepository + Send + Sync + 'static,
{
    info!(
        interval_secs = config.interval_secs,
        grace_secs = config.grace_secs,
        batch_size = config.batch_size,
        "credit_repair: starting worker loop"
    );

    loop {
        sweep_once(&usecase, &config).await;
        tokio::time::sleep(Duration::from_secs(config.interval_secs)).await;
    }
}

pub async fn sweep_once<T, Cr, Co>(
    usecase: &ReconciliationUseCase<T, Cr, Co>,
    config: &CreditRepair,
) -> Option<RepairSummary>
where
    T: TransactionRepository + Send + Sync + 'static,
    Cr: CreditRepository + Send + Sync + 'static,
    Co: CouponRepository + Send + Sync + 'static,
{
    match usecase
        .repair_under_credited(config.batch_size, config.grace())
        .await
    {
        Ok(summary) if summary.scanned == 0 => {
            info!("credit_repair: no under-credited transactions");
            Some(summary)
        }
        Ok(summary) => {
            if summary.still_missing > 0 || summary.errors > 0 {
                warn!(
                    scanned = summary.scanned,
                    repaired = summary.repaired,
                    still_missing = summary.still_missing,
                    errors = summary.errors,
                    "credit_repair: sweep finished with transactions still owed credits"
                );
            } else {
                info!(
                    scanned = summary.scanned,
                    repaired = summary.repaired,
                    skipped = summary.skipped,
                    "credit_repair: sweep finished"
                );
            }
            Some(summary)
        }
        Err(err) => {
            error!(error = ?err, "credit_repair: sweep failed");
            None
        }
    }
}
