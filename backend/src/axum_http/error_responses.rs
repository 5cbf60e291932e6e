use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::usecases::{
    checkout::CheckoutError, session_verifier::VerifySessionError, stripe_webhook::WebhookError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error("Payment provider error")]
    BadGateway,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::BadGateway => StatusCode::BAD_GATEWAY,
            AppError::Internal(err) => {
                error!(error = ?err, "backend router: internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Internal detail stays in the logs.
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::InvalidBundle(_)
            | CheckoutError::InvalidUserId
            | CheckoutError::InvalidCoupon(_) => AppError::BadRequest(err.to_string()),
            CheckoutError::Provider(_) => AppError::BadGateway,
            CheckoutError::Internal(inner) => AppError::Internal(inner),
        }
    }
}

impl From<VerifySessionError> for AppError {
    fn from(err: VerifySessionError) -> Self {
        match err {
            VerifySessionError::MissingSessionId | VerifySessionError::InvalidSessionId => {
                AppError::BadRequest(err.to_string())
            }
            VerifySessionError::PaymentIncomplete { .. } => {
                AppError::PaymentRequired(err.to_string())
            }
            VerifySessionError::Provider(_) => AppError::BadGateway,
            VerifySessionError::Internal(inner) => AppError::Internal(inner),
        }
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
