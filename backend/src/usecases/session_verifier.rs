use std::sync::Arc;

use crates::{
    domain::{
        repositories::transactions::TransactionRepository,
        value_objects::{
            bundles::BundleCatalog,
            checkout::{SessionSummary, VerifySessionResponse, metadata_keys},
            enums::{
                checkout_payment_statuses::CheckoutPaymentStatus,
                transaction_statuses::TransactionStatus,
            },
            transactions::TransactionDto,
        },
    },
    payments::stripe_client::is_checkout_session_id,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::usecases::stripe_gateway::StripeGateway;

#[derive(Debug, Error)]
pub enum VerifySessionError {
    #[error("session_id is required")]
    MissingSessionId,
    #[error("invalid session_id")]
    InvalidSessionId,
    #[error("payment not completed (status: {payment_status})")]
    PaymentIncomplete { payment_status: String },
    #[error("payment provider error")]
    Provider(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl VerifySessionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            VerifySessionError::MissingSessionId | VerifySessionError::InvalidSessionId => {
                StatusCode::BAD_REQUEST
            }
            VerifySessionError::PaymentIncomplete { .. } => StatusCode::PAYMENT_REQUIRED,
            VerifySessionError::Provider(_) => StatusCode::BAD_GATEWAY,
            VerifySessionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type VerifyResult<T> = std::result::Result<T, VerifySessionError>;

/// Confirms a checkout session for the success page. Only ever moves the
/// status; credits belong to the webhook path.
pub struct SessionVerifierUseCase<T, S>
where
    T: TransactionRepository + Send + Sync + 'static,
    S: StripeGateway + 'static,
{
    transaction_repo: Arc<T>,
    stripe_client: Arc<S>,
    catalog: Arc<BundleCatalog>,
}

impl<T, S> SessionVerifierUseCase<T, S>
where
    T: TransactionRepository + Send + Sync + 'static,
    S: StripeGateway + 'static,
{
    pub fn new(transaction_repo: Arc<T>, stripe_client: Arc<S>, catalog: Arc<BundleCatalog>) -> Self {
        Self {
            transaction_repo,
            stripe_client,
            catalog,
        }
    }

    pub async fn verify_session(&self, session_id: Option<String>) -> VerifyResult<VerifySessionResponse> {
        let session_id = session_id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                let err = VerifySessionError::MissingSessionId;
                warn!(status = err.status_code().as_u16(), "verify session: missing session id");
                err
            })?;

        if !is_checkout_session_id(&session_id) {
            let err = VerifySessionError::InvalidSessionId;
            warn!(
                status = err.status_code().as_u16(),
                session_id_len = session_id.len(),
                "verify session: rejected malformed session id"
            );
            return Err(err);
        }

        let session = self
            .stripe_client
            .retrieve_checkout_session(&session_id)
            .await
            .map_err(|err| {
                error!(%session_id, error = ?err, "verify session: failed to retrieve checkout session");
                VerifySessionError::Provider(err)
            })?;

        let payment_status = session
            .payment_status
            .clone()
            .unwrap_or_else(|| CheckoutPaymentStatus::Unpaid.to_string());
        let settled = CheckoutPaymentStatus::from_str(&payment_status)
            .map(|status| status.is_settled())
            .unwrap_or(false);
        if !settled {
            let err = VerifySessionError::PaymentIncomplete { payment_status };
            info!(
                %session_id,
                status = err.status_code().as_u16(),
                reason = %err,
                "verify session: payment not completed"
            );
            return Err(err);
        }

        let mut transaction = self
            .transaction_repo
            .find_by_session_id(&session_id)
            .await
            .map_err(|err| {
                error!(%session_id, db_error = ?err, "verify session: failed to load transaction");
                VerifySessionError::Internal(err)
            })?;

        if let Some(row) = transaction.as_mut() {
            if row.status() == TransactionStatus::Pending {
                match self.transaction_repo.mark_succeeded_if_pending(row.id).await {
                    Ok(true) => {
                        info!(%session_id, transaction_id = %row.id, "verify session: transaction marked succeeded");
                        row.status = TransactionStatus::Succeeded.to_string();
                    }
                    Ok(false) => {}
                    Err(err) => {
                        error!(
                            %session_id,
                            transaction_id = %row.id,
                            db_error = ?err,
                            "verify session: failed to update transaction status"
                        );
                        return Err(VerifySessionError::Internal(err));
                    }
                }
            }
        } else {
            warn!(%session_id, "verify session: no local transaction for paid session");
        }

        let bundle_id = session
            .metadata
            .get(metadata_keys::BUNDLE_ID)
            .cloned()
            .or_else(|| transaction.as_ref().map(|row| row.bundle_id.clone()));
        let bundle = bundle_id.as_deref().and_then(|id| self.catalog.find(id));

        let credits = session
            .metadata
            .get(metadata_keys::CREDITS)
            .and_then(|raw| raw.parse::<i32>().ok())
            .or_else(|| bundle.map(|bundle| bundle.credits))
            .unwrap_or(0);

        Ok(VerifySessionResponse {
            success: true,
            session: SessionSummary {
                id: session.id,
                payment_status,
                status: session.status,
                amount_total: session.amount_total,
                currency: session.currency,
                customer_email: session.customer_details.and_then(|details| details.email),
            },
            transaction: transaction.map(TransactionDto::from),
            plan_name: bundle.map(|bundle| bundle.name.clone()),
            credits,
        })
    }
}
