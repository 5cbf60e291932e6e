use anyhow::{Result, ensure};
use backend::config::config_loader::{parse_or, required};

use super::config_model::{CreditRepair, Database, DotEnvyConfig};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let database = Database {
        url: required("DATABASE_URL")?,
        pool_size: parse_or("DATABASE_POOL_SIZE", 4)?,
    };

    let credit_repair = CreditRepair {
        interval_secs: parse_or("CREDIT_REPAIR_INTERVAL_SECS", 300)?,
        grace_secs: parse_or("CREDIT_REPAIR_GRACE_SECS", 600)?,
        batch_size: parse_or("CREDIT_REPAIR_BATCH_SIZE", 50)?,
    };
    ensure!(
        credit_repair.interval_secs > 0,
        "CREDIT_REPAIR_INTERVAL_SECS must be positive"
    );
    ensure!(
        credit_repair.batch_size > 0,
        "CREDIT_REPAIR_BATCH_SIZE must be positive"
    );

    Ok(DotEnvyConfig {
        database,
        credit_repair,
        reconcile_lease_secs: parse_or("RECONCILE_LEASE_SECS", 60)?,
    })
}
