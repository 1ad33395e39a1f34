// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    body::Body,
    http::{HeaderName, Request},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    api::health::{HealthChecks, HealthResponse, ReadyResponse},
    error::ErrorEnvelope,
    models::{
        AccrualResponse, CountersResponse, CreateStakeRequest, PendingWithdrawalResponse, ReconcileRequest,
        ReconcileResponse, RoiResponse, ScheduleResponse, StakeCreatedResponse, WithdrawRoiRequest,
        WithdrawalResponse,
    },
    staking::{ContractState, IntervalKind},
    state::AppState,
};

pub mod health;
pub mod staking;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/staking", post(staking::create_stake))
        .route("/staking/roi-withdrawal/{contract_id}", post(staking::withdraw_roi))
        .route("/staking/{contract_id}/roi", get(staking::get_roi))
        .route("/staking/{contract_id}/reconcile", post(staking::reconcile))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        }))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        staking::create_stake,
        staking::withdraw_roi,
        staking::get_roi,
        staking::reconcile
    ),
    components(
        schemas(
            CreateStakeRequest,
            WithdrawRoiRequest,
            ReconcileRequest,
            StakeCreatedResponse,
            WithdrawalResponse,
            RoiResponse,
            ReconcileResponse,
            ScheduleResponse,
            CountersResponse,
            AccrualResponse,
            PendingWithdrawalResponse,
            ContractState,
            IntervalKind,
            ErrorEnvelope,
            ReadyResponse,
            HealthChecks,
            HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Staking", description = "Staking contracts and ROI withdrawals"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::extractor::tests::{bearer, bearer_for};
    use crate::providers::Fault;
    use crate::staking::service::tests::stake_body;
    use crate::state::tests::test_state;
    use axum::{body::to_bytes, http::StatusCode, response::Response};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn post_json(uri: &str, auth: Option<&str>, body: &Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_with(uri: &str, auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_of(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn stake_then_withdraw_over_http() {
        let (state, h) = test_state();
        let app = router(state);
        let user = bearer_for("user_abc", "42");

        let response = app
            .clone()
            .oneshot(post_json("/staking", Some(&user), &stake_body("s1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let body = json_of(response).await;
        assert_eq!(body["status"], true);
        assert_eq!(body["status_code"], 201);
        assert_eq!(body["data"]["schedule"]["total_entitlement"], "5");
        let contract_id = body["data"]["contract_id"].as_str().unwrap().to_string();

        h.clock.advance_secs(180);
        let response = app
            .clone()
            .oneshot(get_with(&format!("/staking/{contract_id}/roi"), Some(&user)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_of(response).await["data"]["accrual"]["withdrawable_now"], "3");

        let withdraw = json!({ "request_id": "w1", "user_id": "42", "amount_to_withdraw": "3" });
        let uri = format!("/staking/roi-withdrawal/{contract_id}");
        let response = app
            .clone()
            .oneshot(post_json(&uri, Some(&user), &withdraw))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_of(response).await;
        assert_eq!(body["data"]["amount"], "3");
        assert_eq!(body["data"]["counters"]["remaining_to_be_paid"], "2");

        let response = app.oneshot(post_json(&uri, Some(&user), &withdraw)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = json_of(response).await;
        assert_eq!(body["status"], false);
        assert_eq!(body["error"]["code"], "duplicate_request");
        assert!(body["error"]["transaction_id"].is_string());
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let (state, h) = test_state();
        let response = router(state)
            .oneshot(post_json("/staking", None, &stake_body("s1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_of(response).await["error"]["code"], "missing_auth_header");
        assert!(h.ledger.entries().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_uses_envelope() {
        let (state, _h) = test_state();
        let request = Request::builder()
            .method("POST")
            .uri("/staking")
            .header("content-type", "application/json")
            .header("authorization", bearer_for("user_abc", "42"))
            .body(Body::from("{not json"))
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_of(response).await;
        assert_eq!(body["error"]["code"], "invalid_request");
        assert_eq!(body["error"]["field"], "body");
    }

    #[tokio::test]
    async fn early_withdrawal_reports_eligibility() {
        let (state, _h) = test_state();
        let app = router(state);
        let user = bearer_for("user_abc", "42");
        let created = json_of(
            app.clone()
                .oneshot(post_json("/staking", Some(&user), &stake_body("s1")))
                .await
                .unwrap(),
        )
        .await;
        let contract_id = created["data"]["contract_id"].as_str().unwrap().to_string();

        let withdraw = json!({ "request_id": "w1", "user_id": "42", "amount_to_withdraw": "1" });
        let response = app
            .oneshot(post_json(&format!("/staking/roi-withdrawal/{contract_id}"), Some(&user), &withdraw))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_of(response).await;
        assert_eq!(body["error"]["code"], "not_yet_eligible");
        assert_eq!(body["error"]["seconds_remaining"], 60);
    }

    #[tokio::test]
    async fn reconcile_requires_operator() {
        let (state, h) = test_state();
        let app = router(state);
        let user = bearer_for("user_abc", "42");
        let created = json_of(
            app.clone()
                .oneshot(post_json("/staking", Some(&user), &stake_body("s1")))
                .await
                .unwrap(),
        )
        .await;
        let contract_id = created["data"]["contract_id"].as_str().unwrap().to_string();

        h.clock.advance_secs(120);
        h.ledger.inject(Fault::PostUnavailable);
        let withdraw = json!({ "request_id": "w1", "user_id": "42", "amount_to_withdraw": "2" });
        let response = app
            .clone()
            .oneshot(post_json(&format!("/staking/roi-withdrawal/{contract_id}"), Some(&user), &withdraw))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let uri = format!("/staking/{contract_id}/reconcile");
        let settle = json!({ "outcome": "not_credited" });
        let response = app
            .clone()
            .oneshot(post_json(&uri, Some(&user), &settle))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let tx = h.ledger.credits_to("usdt")[0].transaction_id.clone();
        let operator = bearer("ops_1", Some("operator"));
        let response = app
            .oneshot(post_json(&uri, Some(&operator), &json!({ "outcome": "credited", "transaction_id": tx })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_of(response).await;
        assert_eq!(body["data"]["counters"]["withdrawn_so_far"], "2");
    }

    #[tokio::test]
    async fn foreign_token_is_forbidden() {
        let (state, h) = test_state();
        let app = router(state);
        let owner = bearer_for("user_owner", "42");
        let created = json_of(
            app.clone()
                .oneshot(post_json("/staking", Some(&owner), &stake_body("s1")))
                .await
                .unwrap(),
        )
        .await;
        let contract_id = created["data"]["contract_id"].as_str().unwrap().to_string();
        h.clock.advance_secs(180);

        let mallory = bearer_for("user_mallory", "7");
        let withdraw = json!({ "request_id": "evil", "user_id": "42", "amount_to_withdraw": "3" });
        let response = app
            .clone()
            .oneshot(post_json(&format!("/staking/roi-withdrawal/{contract_id}"), Some(&mallory), &withdraw))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_of(response).await["error"]["code"], "forbidden");

        let response = app
            .clone()
            .oneshot(post_json("/staking", Some(&mallory), &stake_body("s2")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(get_with(&format!("/staking/{contract_id}/roi"), Some(&mallory)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // a token without a ledger identity is no better
        let anonymous = bearer("user_anon", None);
        let response = app
            .oneshot(get_with(&format!("/staking/{contract_id}/roi"), Some(&anonymous)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        assert!(h.ledger.credits_to("usdt").is_empty());
        assert_eq!(h.ledger.entries().len(), 2);
    }

    #[tokio::test]
    async fn unknown_contract_is_not_found() {
        let (state, _h) = test_state();
        let response = router(state)
            .oneshot(get_with("/staking/nope/roi", Some(&bearer_for("user_abc", "42"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_needs_no_auth() {
        let (state, _h) = test_state();
        let response = router(state).oneshot(get_with("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_of(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["ledger"], "in_memory");
        assert!(body["checks"].get("jwks").is_none());
    }

    #[test]
    fn openapi_lists_staking_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/staking"));
        assert!(doc.paths.paths.contains_key("/staking/roi-withdrawal/{contract_id}"));
        assert!(doc.paths.paths.contains_key("/staking/{contract_id}/reconcile"));
    }
}
