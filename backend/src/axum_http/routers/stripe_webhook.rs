use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use chrono::Duration;
use crates::{
    domain::{
        repositories::{
            coupons::CouponRepository, credits::CreditRepository,
            transactions::TransactionRepository, webhook_events::WebhookEventRepository,
        },
        value_objects::bundles::BundleCatalog,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            coupons::CouponPostgres, credits::CreditPostgres, transactions::TransactionPostgres,
            webhook_events::WebhookEventPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use serde::Serialize;

use crate::{
    axum_http::error_responses::AppError,
    usecases::{
        reconciliation::ReconciliationUseCase, stripe_gateway::StripeGateway,
        stripe_webhook::StripeWebhookUseCase,
    },
};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
struct WebhookReceived {
    received: bool,
}

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    catalog: Arc<BundleCatalog>,
    reconcile_lease: Duration,
) -> Router {
    let transaction_repository = Arc::new(TransactionPostgres::new(Arc::clone(&db_pool)));
    let credit_repository = Arc::new(CreditPostgres::new(Arc::clone(&db_pool)));
    let coupon_repository = Arc::new(CouponPostgres::new(Arc::clone(&db_pool)));
    let webhook_event_repository = Arc::new(WebhookEventPostgres::new(Arc::clone(&db_pool)));

    let reconciliation_usecase = ReconciliationUseCase::new(
        Arc::clone(&transaction_repository),
        credit_repository,
        coupon_repository,
        reconcile_lease,
    );
    let stripe_webhook_usecase = StripeWebhookUseCase::new(
        Arc::new(reconciliation_usecase),
        transaction_repository,
        webhook_event_repository,
        stripe_client,
        catalog,
    );

    router(Arc::new(stripe_webhook_usecase))
}

pub fn router<T, Cr, Co, W, S>(usecase: Arc<StripeWebhookUseCase<T, Cr, Co, W, S>>) -> Router
where
    T: TransactionRepository + Send + Sync + 'static,
    Cr: CreditRepository + Send + Sync + 'static,
    Co: CouponRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    S: StripeGateway + 'static,
{
    Router::new()
        .route("/", post(stripe_webhook))
        .with_state(usecase)
}

/// Needs the raw body: the signature covers the exact bytes Stripe sent.
pub async fn stripe_webhook<T, Cr, Co, W, S>(
    State(usecase): State<Arc<StripeWebhookUseCase<T, Cr, Co, W, S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError>
where
    T: TransactionRepository + Send + Sync + 'static,
    Cr: CreditRepository + Send + Sync + 'static,
    Co: CouponRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    S: StripeGateway + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    usecase.handle_stripe_webhook(&body, signature).await?;

    Ok(Json(WebhookReceived { received: true }))
}
