// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP clients for the ledger-of-record and the exchange-rate service.

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    CollaboratorError, Ledger, LedgerEntry, LedgerReceipt, MetadataMap, MetadataStore, RateSource,
};
use crate::config::{
    env_optional, env_or_default, env_required, COLLABORATOR_TIMEOUT_ENV, DEFAULT_COLLABORATOR_TIMEOUT_SECS,
    LEDGER_API_KEY_ENV, LEDGER_BASE_URL_ENV, RATES_BASE_URL_ENV,
};
use crate::staking::amount::format_amount;

fn build_http(timeout: Duration) -> Result<Client, CollaboratorError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CollaboratorError::MissingConfig(format!("failed to build HTTP client: {e}")))
}

fn timeout_from_env() -> Duration {
    let secs = env_or_default(
        COLLABORATOR_TIMEOUT_ENV,
        &DEFAULT_COLLABORATOR_TIMEOUT_SECS.to_string(),
    )
    .parse::<u64>()
    .unwrap_or(DEFAULT_COLLABORATOR_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Map a transport failure. Timeouts and connection errors are "unavailable".
fn transport_error(method: &Method, path: &str, error: reqwest::Error) -> CollaboratorError {
    CollaboratorError::Unavailable(format!("{method} {path} failed: {error}"))
}

/// Map a non-2xx status to the collaborator taxonomy.
fn status_error(method: &Method, path: &str, status: StatusCode, body: String) -> CollaboratorError {
    let message = format!("{method} {path} returned {status}: {body}");
    match status {
        StatusCode::NOT_FOUND => CollaboratorError::NotFound(message),
        s if s.is_client_error() => CollaboratorError::Rejected(message),
        _ => CollaboratorError::Unavailable(message),
    }
}

// =============================================================================
// Ledger + metadata
// =============================================================================

#[derive(Serialize)]
struct LedgerEntryBody<'a> {
    user_id: &'a str,
    wallet_id: &'a str,
    amount: String,
    request_id: &'a str,
    metadata: &'a MetadataMap,
}

#[derive(Deserialize)]
struct LedgerResponseBody {
    status: bool,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the external wallet ledger and its transaction metadata API.
#[derive(Debug, Clone)]
pub struct LedgerHttpClient {
    base_url: String,
    api_key: Option<String>,
    http: Client,
}

impl LedgerHttpClient {
    pub fn is_configured() -> bool {
        env_optional(LEDGER_BASE_URL_ENV).is_some()
    }

    pub fn from_env() -> Result<Self, CollaboratorError> {
        let base_url = env_required(LEDGER_BASE_URL_ENV).map_err(CollaboratorError::MissingConfig)?;
        Self::new(base_url, env_optional(LEDGER_API_KEY_ENV), timeout_from_env())
    }

    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let base_url = base_url.into();
        url::Url::parse(&base_url)
            .map_err(|e| CollaboratorError::MissingConfig(format!("invalid ledger URL: {e}")))?;
        Ok(Self {
            base_url,
            api_key,
            http: build_http(timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        idempotency_key: Option<&str>,
    ) -> Result<Value, CollaboratorError> {
        let mut request = self
            .http
            .request(method.clone(), join_url(&self.base_url, path))
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&method, path, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(&method, path, status, body));
        }

        response.json().await.map_err(|e| {
            CollaboratorError::InvalidResponse(format!("{method} {path} invalid JSON: {e}"))
        })
    }

    async fn post_entry(
        &self,
        path: &str,
        entry: LedgerEntry<'_>,
    ) -> Result<LedgerReceipt, CollaboratorError> {
        let body = LedgerEntryBody {
            user_id: entry.user_id,
            wallet_id: entry.wallet_id,
            amount: format_amount(entry.amount),
            request_id: entry.request_id,
            metadata: &entry.metadata,
        };
        let payload = serde_json::to_value(&body)
            .map_err(|e| CollaboratorError::InvalidResponse(format!("serialize body failed: {e}")))?;

        debug!(
            path = %path,
            request_id = %entry.request_id,
            wallet_id = %entry.wallet_id,
            amount = %body.amount,
            "ledger request"
        );

        let response = self
            .send_json(Method::POST, path, Some(&payload), Some(entry.request_id))
            .await?;
        let parsed: LedgerResponseBody = serde_json::from_value(response).map_err(|e| {
            CollaboratorError::InvalidResponse(format!("POST {path} unexpected body: {e}"))
        })?;

        Ok(LedgerReceipt {
            status: parsed.status,
            transaction_id: parsed.transaction_id.unwrap_or_default(),
            message: parsed.message,
        })
    }

    fn metadata_path(contract_id: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(contract_id.as_bytes()).collect();
        format!("/v1/transactions/{encoded}/metadata")
    }
}

#[async_trait]
impl Ledger for LedgerHttpClient {
    async fn debit(&self, entry: LedgerEntry<'_>) -> Result<LedgerReceipt, CollaboratorError> {
        self.post_entry("/v1/wallets/debit", entry).await
    }

    async fn credit(&self, entry: LedgerEntry<'_>) -> Result<LedgerReceipt, CollaboratorError> {
        self.post_entry("/v1/wallets/credit", entry).await
    }
}

#[async_trait]
impl MetadataStore for LedgerHttpClient {
    async fn get(&self, contract_id: &str) -> Result<MetadataMap, CollaboratorError> {
        let path = Self::metadata_path(contract_id);
        let response = self.send_json(Method::GET, &path, None, None).await?;
        extract_metadata(response).ok_or_else(|| {
            CollaboratorError::InvalidResponse(format!("GET {path} did not return an object"))
        })
    }

    async fn put(&self, contract_id: &str, patch: MetadataMap) -> Result<(), CollaboratorError> {
        let path = Self::metadata_path(contract_id);
        self.send_json(Method::PUT, &path, Some(&Value::Object(patch)), None)
            .await
            .map(|_| ())
    }

    async fn post(
        &self,
        contract_id: &str,
        additions: MetadataMap,
    ) -> Result<(), CollaboratorError> {
        let path = Self::metadata_path(contract_id);
        self.send_json(Method::POST, &path, Some(&Value::Object(additions)), None)
            .await
            .map(|_| ())
    }
}

/// The metadata API answers either the bare map or `{ "metadata": {...} }`.
fn extract_metadata(response: Value) -> Option<MetadataMap> {
    match response {
        Value::Object(mut map) => match map.remove("metadata") {
            Some(Value::Object(inner)) => Some(inner),
            Some(other) => {
                map.insert("metadata".to_string(), other);
                Some(map)
            }
            None => Some(map),
        },
        _ => None,
    }
}

// =============================================================================
// Exchange rates
// =============================================================================

/// Client for the exchange-rate quote service.
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    base_url: String,
    http: Client,
}

impl HttpRateSource {
    pub fn is_configured() -> bool {
        env_optional(RATES_BASE_URL_ENV).is_some()
    }

    pub fn from_env() -> Result<Self, CollaboratorError> {
        let base_url = env_required(RATES_BASE_URL_ENV).map_err(CollaboratorError::MissingConfig)?;
        Ok(Self {
            base_url,
            http: build_http(timeout_from_env())?,
        })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn rate(&self, from_wallet: &str, to_wallet: &str) -> Result<Decimal, CollaboratorError> {
        let path = "/v1/rates";
        let response = self
            .http
            .get(join_url(&self.base_url, path))
            .query(&[("from", from_wallet), ("to", to_wallet)])
            .send()
            .await
            .map_err(|e| transport_error(&Method::GET, path, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(&Method::GET, path, status, body));
        }

        let body: Value = response.json().await.map_err(|e| {
            CollaboratorError::InvalidResponse(format!("GET {path} invalid JSON: {e}"))
        })?;

        let rate = parse_rate(&body).ok_or_else(|| {
            CollaboratorError::InvalidResponse(format!("GET {path} missing positive `rate`"))
        })?;
        if rate <= Decimal::ZERO {
            warn!(from = %from_wallet, to = %to_wallet, "rate service returned non-positive rate");
            return Err(CollaboratorError::InvalidResponse(
                "rate must be positive".to_string(),
            ));
        }
        Ok(rate)
    }
}

/// Accept `rate` as a JSON string or number.
fn parse_rate(body: &Value) -> Option<Decimal> {
    let raw = body.get("rate").or_else(|| body.pointer("/data/rate"))?;
    match raw {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_mapping_distinguishes_not_found_and_rejection() {
        let not_found = status_error(&Method::GET, "/x", StatusCode::NOT_FOUND, String::new());
        assert!(matches!(not_found, CollaboratorError::NotFound(_)));

        let rejected = status_error(&Method::POST, "/x", StatusCode::CONFLICT, "dup".into());
        assert!(matches!(rejected, CollaboratorError::Rejected(_)));

        let unavailable =
            status_error(&Method::POST, "/x", StatusCode::BAD_GATEWAY, String::new());
        assert!(matches!(unavailable, CollaboratorError::Unavailable(_)));
    }

    #[test]
    fn metadata_is_unwrapped_from_envelope() {
        let wrapped = json!({ "metadata": { "principal_amount": "100" } });
        let map = extract_metadata(wrapped).unwrap();
        assert_eq!(map["principal_amount"], "100");

        let bare = json!({ "principal_amount": "100" });
        assert_eq!(extract_metadata(bare).unwrap()["principal_amount"], "100");

        assert!(extract_metadata(json!([1, 2])).is_none());
    }

    #[test]
    fn rate_accepts_strings_and_numbers() {
        assert_eq!(
            parse_rate(&json!({ "rate": "1.25" })),
            Some(Decimal::from_str("1.25").unwrap())
        );
        assert_eq!(
            parse_rate(&json!({ "data": { "rate": 2 } })),
            Some(Decimal::from(2))
        );
        assert_eq!(parse_rate(&json!({ "price": "1" })), None);
    }

    #[test]
    fn metadata_path_encodes_contract_id() {
        assert_eq!(
            LedgerHttpClient::metadata_path("tx/1"),
            "/v1/transactions/tx%2F1/metadata"
        );
    }

    #[test]
    fn client_rejects_invalid_base_url() {
        let result = LedgerHttpClient::new("not a url", None, Duration::from_secs(1));
        assert!(matches!(result, Err(CollaboratorError::MissingConfig(_))));
    }
}
