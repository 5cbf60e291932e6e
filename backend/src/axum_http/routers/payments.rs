use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::{coupons::CouponRepository, transactions::TransactionRepository},
        value_objects::{
            bundles::BundleCatalog,
            checkout::{CreateCheckoutRequest, VerifySessionRequest},
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{coupons::CouponPostgres, transactions::TransactionPostgres},
    },
    payments::stripe_client::StripeClient,
};

use crate::{
    axum_http::error_responses::AppError,
    usecases::{
        checkout::CheckoutUseCase, session_verifier::SessionVerifierUseCase,
        stripe_gateway::StripeGateway,
    },
};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    catalog: Arc<BundleCatalog>,
) -> Router {
    let transaction_repository = Arc::new(TransactionPostgres::new(Arc::clone(&db_pool)));
    let coupon_repository = Arc::new(CouponPostgres::new(Arc::clone(&db_pool)));

    let checkout_usecase = CheckoutUseCase::new(
        Arc::clone(&transaction_repository),
        coupon_repository,
        Arc::clone(&stripe_client),
        Arc::clone(&catalog),
    );
    let session_verifier_usecase =
        SessionVerifierUseCase::new(transaction_repository, stripe_client, catalog);

    router(Arc::new(checkout_usecase), Arc::new(session_verifier_usecase))
}

pub fn router<T, C, S>(
    checkout_usecase: Arc<CheckoutUseCase<T, C, S>>,
    session_verifier_usecase: Arc<SessionVerifierUseCase<T, S>>,
) -> Router
where
    T: TransactionRepository + Send + Sync + 'static,
    C: CouponRepository + Send + Sync + 'static,
    S: StripeGateway + 'static,
{
    let checkout = Router::new()
        .route("/checkout-session", post(create_checkout_session))
        .route("/bundles", get(list_bundles))
        .with_state(checkout_usecase);

    let verify = Router::new()
        .route(
            "/verify-session",
            post(verify_session_post).get(verify_session_get),
        )
        .with_state(session_verifier_usecase);

    checkout.merge(verify)
}

pub async fn create_checkout_session<T, C, S>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<T, C, S>>>,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, AppError>
where
    T: TransactionRepository + Send + Sync + 'static,
    C: CouponRepository + Send + Sync + 'static,
    S: StripeGateway + 'static,
{
    let response = checkout_usecase.create_checkout_session(request).await?;
    Ok(Json(response))
}

pub async fn list_bundles<T, C, S>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<T, C, S>>>,
) -> impl IntoResponse
where
    T: TransactionRepository + Send + Sync + 'static,
    C: CouponRepository + Send + Sync + 'static,
    S: StripeGateway + 'static,
{
    Json(checkout_usecase.list_bundles())
}

pub async fn verify_session_post<T, S>(
    State(session_verifier_usecase): State<Arc<SessionVerifierUseCase<T, S>>>,
    Query(query): Query<VerifySessionRequest>,
    body: Option<Json<VerifySessionRequest>>,
) -> Result<impl IntoResponse, AppError>
where
    T: TransactionRepository + Send + Sync + 'static,
    S: StripeGateway + 'static,
{
    let session_id = body
        .and_then(|Json(body)| body.session_id)
        .or(query.session_id);
    let response = session_verifier_usecase.verify_session(session_id).await?;
    Ok(Json(response))
}

pub async fn verify_session_get<T, S>(
    State(session_verifier_usecase): State<Arc<SessionVerifierUseCase<T, S>>>,
    Query(query): Query<VerifySessionRequest>,
) -> Result<impl IntoResponse, AppError>
where
    T: TransactionRepository + Send + Sync + 'static,
    S: StripeGateway + 'static,
{
    let response = session_verifier_usecase
        .verify_session(query.session_id)
        .await?;
    Ok(Json(response))
}
