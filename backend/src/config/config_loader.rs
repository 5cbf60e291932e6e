use std::{env, str::FromStr};

use anyhow::{Context, Result};
use crates::domain::value_objects::bundles::BundleCatalog;

use super::config_model::{
    BackendServer, Catalog, Database, DotEnvyConfig, Reconciliation, Stripe,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: parse_or("SERVER_PORT_BACKEND", 8080)?,
        body_limit: parse_or("SERVER_BODY_LIMIT", 1)?,
        timeout: parse_or("SERVER_TIMEOUT", 30)?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        pool_size: parse_or("DATABASE_POOL_SIZE", 10)?,
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        success_url: required("STRIPE_SUCCESS_URL")?,
        cancel_url: required("STRIPE_CANCEL_URL")?,
        webhook_tolerance_secs: parse_or("STRIPE_WEBHOOK_TOLERANCE_SECS", 300)?,
        http_timeout_secs: parse_or("STRIPE_HTTP_TIMEOUT_SECS", 15)?,
    };

    let catalog = Catalog {
        stripe_price_ids: BundleCatalog::standard()
            .bundles()
            .iter()
            .filter_map(|bundle| {
                let key = format!("STRIPE_PRICE_ID_{}", bundle.id.to_ascii_uppercase());
                optional(&key).map(|price_id| (bundle.id.clone(), price_id))
            })
            .collect(),
    };

    let reconciliation = Reconciliation {
        lease_secs: parse_or("RECONCILE_LEASE_SECS", 60)?,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        stripe,
        catalog,
        reconciliation,
    })
}

pub fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} is required"))
}

pub fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} is invalid (value: {raw})")),
        None => Ok(default),
    }
}
