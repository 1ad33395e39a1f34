// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP error type and the failure half of the response envelope.
//!
//! ```json
//! { "status": false, "status_code": 422, "message": "...",
//!   "error": { "code": "exceeds_accrued", "requested": "3", "withdrawable_now": "0" } }
//! ```

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::error;
use utoipa::ToSchema;

use crate::staking::StakingError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    /// Object merged into `error` next to `code`.
    pub details: Value,
}

/// Failure envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorEnvelope {
    /// Always `false`.
    pub status: bool,
    pub status_code: u16,
    pub message: String,
    /// `code` plus the quantities that caused the failure.
    #[schema(value_type = Object)]
    pub error: Value,
}

impl ErrorEnvelope {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>, details: Value) -> Self {
        let mut error = Map::new();
        error.insert("code".into(), Value::String(code.to_string()));
        match details {
            Value::Object(fields) => {
                for (key, value) in fields {
                    if key != "code" {
                        error.insert(key, value);
                    }
                }
            }
            Value::Null => {}
            other => {
                error.insert("detail".into(), other);
            }
        }
        Self {
            status: false,
            status_code: status.as_u16(),
            message: message.into(),
            error: Value::Object(error),
        }
    }
}

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: Value::Null,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }
}

pub fn status_for(error: &StakingError) -> StatusCode {
    match error {
        StakingError::InvalidPlanParameter { .. } | StakingError::InvalidRequest { .. } => {
            StatusCode::BAD_REQUEST
        }
        StakingError::Forbidden { .. } => StatusCode::FORBIDDEN,
        StakingError::NotFound { .. } => StatusCode::NOT_FOUND,
        StakingError::DuplicateRequest { .. } | StakingError::ReconciliationRequired { .. } => {
            StatusCode::CONFLICT
        }
        StakingError::NotYetEligible { .. }
        | StakingError::ExceedsAccrued { .. }
        | StakingError::ExceedsContractRemainder { .. }
        | StakingError::LedgerDeclined { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        StakingError::PartialFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        StakingError::CollaboratorUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<StakingError> for ApiError {
    fn from(error: StakingError) -> Self {
        ApiError {
            status: status_for(&error),
            code: error.code(),
            message: error.to_string(),
            details: error.details(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        StakingError::invalid_request("body", rejection.body_text()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, code = self.code, message = %self.message, "Request failed");
        }
        ErrorEnvelope::new(self.status, self.code, self.message, self.details).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use rust_decimal::Decimal;
    use serde_json::json;

    async fn body_of(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (StakingError::invalid_request("user_id", "x"), StatusCode::BAD_REQUEST),
            (StakingError::invalid_plan("interval_kind", "x"), StatusCode::BAD_REQUEST),
            (
                StakingError::NotFound { contract_id: "c".into() },
                StatusCode::NOT_FOUND,
            ),
            (
                StakingError::DuplicateRequest {
                    request_id: "r".into(),
                    transaction_id: None,
                },
                StatusCode::CONFLICT,
            ),
            (
                StakingError::NotYetEligible { now: 1, eligible_at: 2 },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                StakingError::PartialFailure {
                    message: "m".into(),
                    details: Value::Null,
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                StakingError::CollaboratorUnavailable {
                    operation: "credit",
                    message: "m".into(),
                    details: Value::Null,
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status, status);
        }
    }

    #[tokio::test]
    async fn envelope_carries_code_and_quantities() {
        let response = ApiError::from(StakingError::ExceedsContractRemainder {
            requested: Decimal::from(10),
            remaining_to_be_paid: Decimal::from(8),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_of(response).await;
        assert_eq!(body["status"], false);
        assert_eq!(body["status_code"], 422);
        assert_eq!(body["error"]["code"], "exceeds_contract_remainder");
        assert_eq!(body["error"]["requested"], "10");
        assert_eq!(body["error"]["remaining_to_be_paid"], "8");
    }

    #[tokio::test]
    async fn non_object_details_are_nested() {
        let response = ApiError::bad_request("bad data")
            .with_details(json!("raw"))
            .into_response();
        let body = body_of(response).await;
        assert_eq!(body["message"], "bad data");
        assert_eq!(body["error"]["code"], "invalid_request");
        assert_eq!(body["error"]["detail"], "raw");
    }
}
