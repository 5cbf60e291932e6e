use std::collections::HashMap;

use chrono::Duration;
use crates::domain::value_objects::bundles::BundleCatalog;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub stripe: Stripe,
    pub catalog: Catalog,
    pub reconciliation: Reconciliation,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub success_url: String,
    pub cancel_url: String,
    pub webhook_tolerance_secs: i64,
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Bundle id to pre-registered Stripe price id.
    pub stripe_price_ids: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub lease_secs: i64,
}

impl DotEnvyConfig {
    pub fn bundle_catalog(&self) -> BundleCatalog {
        let bundles = BundleCatalog::standard()
            .bundles()
            .iter()
            .cloned()
            .map(|bundle| {
                let price_id = self.catalog.stripe_price_ids.get(&bundle.id).cloned();
                bundle.with_stripe_price_id(price_id)
            })
            .collect();
        BundleCatalog::new(bundles)
    }

    pub fn reconcile_lease(&self) -> Duration {
        Duration::seconds(self.reconciliation.lease_secs)
    }
}
