//! HTTP rendering of gate outcomes

use crate::types::{
    PaymentRequirement, PaymentRequirementsResponse, SettlementOutcome, X402_VERSION,
};
use crate::X402Error;
use axum::response::{IntoResponse, Json, Response};
use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    /// Machine-readable reason code
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepts: Option<Vec<PaymentRequirement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement: Option<SettlementOutcome>,
}

/// Status code for a rejected request
pub fn status_for(error: &X402Error) -> StatusCode {
    match error {
        X402Error::MalformedRequest(_) | X402Error::Base64(_) | X402Error::Json(_) => {
            StatusCode::BAD_REQUEST
        }
        X402Error::ValidationFailed { .. }
        | X402Error::SignatureInvalid { .. }
        | X402Error::SettlementFailed { .. } => StatusCode::PAYMENT_REQUIRED,
        X402Error::SettlementTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        X402Error::SettlementUnconfirmed { .. } => StatusCode::BAD_GATEWAY,
        X402Error::FacilitatorError(_) | X402Error::Rpc(_) | X402Error::Http(_) => {
            StatusCode::BAD_GATEWAY
        }
        X402Error::DomainMismatch(_)
        | X402Error::ServiceExecutionFailed(_)
        | X402Error::Config(_)
        | X402Error::NetworkNotSupported { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 402 advertising `requirement` to a client that sent no payment
pub fn payment_required(requirement: &PaymentRequirement) -> Response {
    let body = PaymentRequirementsResponse::new(
        "X-PAYMENT header is required",
        vec![requirement.clone()],
    );
    (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
}

/// Render `error`; the requirement is repeated when the client can retry with a new payment
pub fn error_response(
    error: &X402Error,
    requirement: Option<&PaymentRequirement>,
    settlement: Option<SettlementOutcome>,
) -> Response {
    let status = status_for(error);
    let retryable = status == StatusCode::PAYMENT_REQUIRED || status == StatusCode::BAD_REQUEST;

    let body = ErrorBody {
        x402_version: X402_VERSION,
        error: error.reason_code().to_string(),
        message: error.to_string(),
        accepts: requirement
            .filter(|_| retryable)
            .map(|requirement| vec![requirement.clone()]),
        settlement,
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for X402Error {
    fn into_response(self) -> Response {
        error_response(&self, None, None)
    }
}
