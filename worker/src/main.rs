use anyhow::Result;
use crates::infra::db::{
    postgres::postgres_connection,
    repositories::{
        coupons::CouponPostgres, credits::CreditPostgres, transactions::TransactionPostgres,
    },
};
use backend::usecases::reconciliation::ReconciliationUseCase;
use std::sync::Arc;
use tracing::error;
use tracing::info;
use worker::{config, services::worker_loop};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Worker exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = config::config_loader::load()?;
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.pool_size,
    )?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);

    let reconciliation_usecase = Arc::new(ReconciliationUseCase::new(
        Arc::new(TransactionPostgres::new(Arc::clone(&db_pool_arc))),
        Arc::new(CreditPostgres::new(Arc::clone(&db_pool_arc))),
        Arc::new(CouponPostgres::new(Arc::clone(&db_pool_arc))),
        chrono::Duration::seconds(dotenvy_env.reconcile_lease_secs),
    ));

    let credit_repair_loop = tokio::spawn(worker_loop::run_credit_repair_loop(
        reconciliation_usecase,
        dotenvy_env.credit_repair.clone(),
    ));

    tokio::select! {
        result = credit_repair_loop => result??,
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received ctrl+C signal, stopping worker");
        }
    };
    Ok(())
}
