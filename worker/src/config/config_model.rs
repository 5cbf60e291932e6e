use chrono::Duration;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub database: Database,
    pub credit_repair: CreditRepair,
    pub reconcile_lease_secs: i64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone)]
pub struct CreditRepair {
    pub interval_secs: u64,
    /// Rows touched more recently than this are left to in-flight webhook deliveries.
    pub grace_secs: i64,
    pub batch_size: i64,
}

impl CreditRepair {
    pub fn grace(&self) -> Duration {
        Duration::seconds(self.grace_secs)
    }
}
