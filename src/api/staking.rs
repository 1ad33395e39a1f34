// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Staking endpoints.
//!
//! Bodies are taken as raw JSON so shape errors come back as
//! `invalid_request` in the standard envelope instead of axum's plain-text
//! rejection.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::{
    auth::{Auth, OperatorOnly},
    error::{ApiError, ErrorEnvelope},
    models::{
        ApiResponse, CreateStakeRequest, ReconcileRequest, ReconcileResponse, RoiResponse,
        StakeCreatedResponse, WithdrawRoiRequest, WithdrawalResponse,
    },
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/staking",
    request_body = CreateStakeRequest,
    tag = "Staking",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Contract created", body = ApiResponse<StakeCreatedResponse>),
        (status = 400, description = "Invalid request or plan parameter", body = ErrorEnvelope),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorEnvelope),
        (status = 403, description = "Token may not act for `user_id`", body = ErrorEnvelope),
        (status = 422, description = "Ledger declined the principal debit", body = ErrorEnvelope),
        (status = 500, description = "Principal debited but not confirmed locked or refunded", body = ErrorEnvelope),
        (status = 503, description = "Collaborator unavailable", body = ErrorEnvelope)
    )
)]
pub async fn create_stake(
    Auth(user): Auth,
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<ApiResponse<StakeCreatedResponse>, ApiError> {
    let Json(body) = body?;
    let created = state.staking.create_stake(&user, &body).await?;
    Ok(ApiResponse::created(
        "Staking contract created",
        StakeCreatedResponse::from(&created),
    ))
}

#[utoipa::path(
    post,
    path = "/staking/roi-withdrawal/{contract_id}",
    params(
        ("contract_id" = String, Path, description = "Transaction id of the locked principal credit")
    ),
    request_body = WithdrawRoiRequest,
    tag = "Staking",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "ROI credited to the payout wallet", body = ApiResponse<WithdrawalResponse>),
        (status = 400, description = "Invalid request", body = ErrorEnvelope),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorEnvelope),
        (status = 403, description = "Contract belongs to a user the token may not act for", body = ErrorEnvelope),
        (status = 404, description = "Contract not found", body = ErrorEnvelope),
        (status = 409, description = "Duplicate request or unreconciled reservation", body = ErrorEnvelope),
        (status = 422, description = "Not yet eligible or amount exceeds accrual/remainder", body = ErrorEnvelope),
        (status = 500, description = "Credit unconfirmed or unrecorded; held for reconciliation", body = ErrorEnvelope),
        (status = 503, description = "Collaborator unavailable", body = ErrorEnvelope)
    )
)]
pub async fn withdraw_roi(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(contract_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<ApiResponse<WithdrawalResponse>, ApiError> {
    let Json(body) = body?;
    let result = state.staking.withdraw(&user, &contract_id, &body).await?;
    Ok(ApiResponse::ok("ROI withdrawal successful", WithdrawalResponse::from(&result)))
}

#[utoipa::path(
    get,
    path = "/staking/{contract_id}/roi",
    params(
        ("contract_id" = String, Path, description = "Transaction id of the locked principal credit")
    ),
    tag = "Staking",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Accrual view", body = ApiResponse<RoiResponse>),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorEnvelope),
        (status = 403, description = "Contract belongs to a user the token may not act for", body = ErrorEnvelope),
        (status = 404, description = "Contract not found", body = ErrorEnvelope),
        (status = 503, description = "Collaborator unavailable", body = ErrorEnvelope)
    )
)]
pub async fn get_roi(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(contract_id): Path<String>,
) -> Result<ApiResponse<RoiResponse>, ApiError> {
    let view = state.staking.roi_view(&user, &contract_id).await?;
    Ok(ApiResponse::ok("ROI retrieved", RoiResponse::from(&view)))
}

#[utoipa::path(
    post,
    path = "/staking/{contract_id}/reconcile",
    params(
        ("contract_id" = String, Path, description = "Transaction id of the locked principal credit")
    ),
    request_body = ReconcileRequest,
    tag = "Staking",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Reservation settled", body = ApiResponse<ReconcileResponse>),
        (status = 400, description = "Invalid request", body = ErrorEnvelope),
        (status = 403, description = "Operator role required", body = ErrorEnvelope),
        (status = 404, description = "Contract or reservation not found", body = ErrorEnvelope),
        (status = 500, description = "Reservation could not be settled", body = ErrorEnvelope),
        (status = 503, description = "Collaborator unavailable", body = ErrorEnvelope)
    )
)]
pub async fn reconcile(
    OperatorOnly(user): OperatorOnly,
    State(state): State<AppState>,
    Path(contract_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<ApiResponse<ReconcileResponse>, ApiError> {
    let Json(body) = body?;
    let contract = state.staking.reconcile(&user.subject, &contract_id, &body).await?;
    info!(contract_id = %contract_id, operator = %user.subject, "Withdrawal reservation reconciled");
    Ok(ApiResponse::ok("Reservation reconciled", ReconcileResponse::from(&contract)))
}
