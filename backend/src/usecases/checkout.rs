use std::{collections::HashMap, sync::Arc};

use crates::{
    domain::{
        entities::transactions::InsertTransactionEntity,
        repositories::{coupons::CouponRepository, transactions::TransactionRepository},
        value_objects::{
            bundles::{Bundle, BundleCatalog},
            checkout::{CreateCheckoutRequest, CreateCheckoutResponse, metadata_keys},
            enums::transaction_statuses::TransactionStatus,
        },
    },
    payments::stripe_client::{CheckoutLineItem, CheckoutSessionRequest},
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::stripe_gateway::StripeGateway;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),
    #[error("invalid user id")]
    InvalidUserId,
    #[error("{0}")]
    InvalidCoupon(String),
    #[error("payment provider error")]
    Provider(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CheckoutError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            CheckoutError::InvalidBundle(_)
            | CheckoutError::InvalidUserId
            | CheckoutError::InvalidCoupon(_) => StatusCode::BAD_REQUEST,
            CheckoutError::Provider(_) => StatusCode::BAD_GATEWAY,
            CheckoutError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type CheckoutResult<T> = std::result::Result<T, CheckoutError>;

struct AppliedCoupon {
    coupon_id: Option<Uuid>,
    code: String,
    discount_amount: i32,
}

pub struct CheckoutUseCase<T, C, S>
where
    T: TransactionRepository + Send + Sync + 'static,
    C: CouponRepository + Send + Sync + 'static,
    S: StripeGateway + 'static,
{
    transaction_repo: Arc<T>,
    coupon_repo: Arc<C>,
    stripe_client: Arc<S>,
    catalog: Arc<BundleCatalog>,
}

impl<T, C, S> CheckoutUseCase<T, C, S>
where
    T: TransactionRepository + Send + Sync + 'static,
    C: CouponRepository + Send + Sync + 'static,
    S: StripeGateway + 'static,
{
    pub fn new(
        transaction_repo: Arc<T>,
        coupon_repo: Arc<C>,
        stripe_client: Arc<S>,
        catalog: Arc<BundleCatalog>,
    ) -> Self {
        Self {
            transaction_repo,
            coupon_repo,
            stripe_client,
            catalog,
        }
    }

    pub fn list_bundles(&self) -> Vec<Bundle> {
        self.catalog.bundles().to_vec()
    }

    pub async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> CheckoutResult<CreateCheckoutResponse> {
        let bundle_id = request
            .bundle_id
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        let bundle = self.catalog.find(bundle_id).ok_or_else(|| {
            let err = CheckoutError::InvalidBundle(bundle_id.to_string());
            warn!(
                bundle_id,
                status = err.status_code().as_u16(),
                "checkout: unknown bundle requested"
            );
            err
        })?;

        let user_id = request
            .user_id
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .ok_or_else(|| {
                let err = CheckoutError::InvalidUserId;
                warn!(
                    bundle_id,
                    status = err.status_code().as_u16(),
                    "checkout: missing or malformed user id"
                );
                err
            })?;

        info!(%user_id, bundle_id, "checkout: creating checkout session");

        let coupon_code = request
            .coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());

        let coupon = match coupon_code {
            Some(code) => Some(self.validate_coupon(code, user_id, bundle).await?),
            None => None,
        };

        let discount_amount = coupon.as_ref().map(|c| c.discount_amount).unwrap_or(0);
        let final_amount = (bundle.price_minor - discount_amount).max(0);

        let line_item = match (&bundle.stripe_price_id, discount_amount) {
            (Some(price_id), 0) => CheckoutLineItem::Price {
                price_id: price_id.clone(),
            },
            _ => CheckoutLineItem::Amount {
                unit_amount: final_amount,
                currency: bundle.currency.clone(),
                product_name: bundle.name.clone(),
            },
        };

        let mut metadata = HashMap::from([
            (metadata_keys::USER_ID.to_string(), user_id.to_string()),
            (metadata_keys::BUNDLE_ID.to_string(), bundle.id.clone()),
            (metadata_keys::CREDITS.to_string(), bundle.credits.to_string()),
            (
                metadata_keys::ORIGINAL_AMOUNT.to_string(),
                bundle.price_minor.to_string(),
            ),
            (
                metadata_keys::DISCOUNT_AMOUNT.to_string(),
                discount_amount.to_string(),
            ),
        ]);
        if let Some(coupon) = &coupon {
            if let Some(coupon_id) = coupon.coupon_id {
                metadata.insert(metadata_keys::COUPON_ID.to_string(), coupon_id.to_string());
            }
            metadata.insert(metadata_keys::COUPON_CODE.to_string(), coupon.code.clone());
        }

        let session = self
            .stripe_client
            .create_checkout_session(CheckoutSessionRequest {
                line_item,
                client_reference_id: user_id.to_string(),
                metadata: metadata.clone(),
            })
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    bundle_id = %bundle.id,
                    final_amount,
                    error = ?err,
                    "checkout: stripe checkout session creation failed"
                );
                CheckoutError::Provider(err)
            })?;

        let insert_transaction = InsertTransactionEntity {
            user_id,
            bundle_id: bundle.id.clone(),
            stripe_session_id: session.id.clone(),
            stripe_payment_intent_id: None,
            amount: final_amount,
            currency: bundle.currency.clone(),
            status: TransactionStatus::Pending.to_string(),
            credits_purchased: bundle.credits,
            credits_added: 0,
            metadata: serde_json::to_value(&metadata).unwrap_or(serde_json::Value::Null),
        };

        // The session is already live at Stripe; a lost row is logged, not surfaced.
        match self.transaction_repo.insert_pending(insert_transaction).await {
            Ok(transaction_id) => info!(
                %user_id,
                %transaction_id,
                session_id = %session.id,
                "checkout: pending transaction recorded"
            ),
            Err(err) => error!(
                %user_id,
                session_id = %session.id,
                db_error = ?err,
                "checkout: failed to record pending transaction"
            ),
        }

        info!(
            %user_id,
            bundle_id = %bundle.id,
            session_id = %session.id,
            final_amount,
            discount_amount,
            "checkout: checkout session created successfully"
        );

        Ok(CreateCheckoutResponse {
            session_id: session.id,
            url: session.url,
        })
    }

    async fn validate_coupon(
        &self,
        code: &str,
        user_id: Uuid,
        bundle: &Bundle,
    ) -> CheckoutResult<AppliedCoupon> {
        let validation = self
            .coupon_repo
            .validate_coupon(code, user_id, bundle.price_minor)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    coupon_code = code,
                    db_error = ?err,
                    "checkout: coupon validation failed"
                );
                CheckoutError::Internal(err)
            })?;

        if !validation.is_valid {
            let message = validation
                .error_message
                .unwrap_or_else(|| "Invalid coupon code".to_string());
            let err = CheckoutError::InvalidCoupon(message);
            warn!(
                %user_id,
                coupon_code = code,
                status = err.status_code().as_u16(),
                reason = %err,
                "checkout: coupon rejected"
            );
            return Err(err);
        }

        Ok(AppliedCoupon {
            coupon_id: validation.coupon_id,
            code: code.to_string(),
            discount_amount: validation.discount_amount.clamp(0, bundle.price_minor),
        })
    }
}
