// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External collaborators: the ledger-of-record, its per-transaction metadata
//! store, and the exchange-rate source.
//!
//! The core only talks to these traits. `http` holds the production clients,
//! `memory` an in-process ledger used in development mode and in tests.
//!
//! No call here is retried. A failed call is surfaced as-is so the caller can
//! decide, since blind retries against the ledger risk double payouts.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

pub mod http;
pub mod memory;

pub use http::{HttpRateSource, LedgerHttpClient};
pub use memory::{Fault, FixedRates, InMemoryLedger};

/// Flat key/value metadata attached to a ledger transaction.
pub type MetadataMap = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator configuration missing: {0}")]
    MissingConfig(String),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator resource not found: {0}")]
    NotFound(String),

    /// The collaborator answered but refused the operation.
    #[error("collaborator rejected the operation: {0}")]
    Rejected(String),

    #[error("collaborator response was invalid: {0}")]
    InvalidResponse(String),
}

impl CollaboratorError {
    /// The collaborator certainly did not apply the operation. Transport
    /// errors, timeouts and unreadable answers leave the outcome unknown.
    pub fn is_definite_refusal(&self) -> bool {
        matches!(
            self,
            CollaboratorError::Rejected(_) | CollaboratorError::NotFound(_) | CollaboratorError::MissingConfig(_)
        )
    }
}

/// Per-contract metadata held by the system of record.
///
/// There is no compare-and-swap: callers serialize writers themselves.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, contract_id: &str) -> Result<MetadataMap, CollaboratorError>;

    /// Overwrite the given keys. A `null` value clears a key.
    async fn put(&self, contract_id: &str, patch: MetadataMap) -> Result<(), CollaboratorError>;

    /// Add new keys. Fails with `Rejected` if any key already exists.
    async fn post(&self, contract_id: &str, additions: MetadataMap)
        -> Result<(), CollaboratorError>;
}

/// A single debit or credit instruction.
#[derive(Debug, Clone)]
pub struct LedgerEntry<'a> {
    pub user_id: &'a str,
    pub wallet_id: &'a str,
    pub amount: Decimal,
    /// Idempotency key forwarded to the ledger.
    pub request_id: &'a str,
    pub metadata: MetadataMap,
}

/// Ledger answer to a debit or credit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReceipt {
    pub status: bool,
    pub transaction_id: String,
    pub message: Option<String>,
}

impl LedgerReceipt {
    pub fn accepted(transaction_id: impl Into<String>) -> Self {
        Self {
            status: true,
            transaction_id: transaction_id.into(),
            message: None,
        }
    }

    /// Transaction id of an accepted operation, `Rejected` otherwise.
    pub fn into_transaction_id(self) -> Result<String, CollaboratorError> {
        if self.status && !self.transaction_id.is_empty() {
            Ok(self.transaction_id)
        } else {
            Err(CollaboratorError::Rejected(
                self.message
                    .unwrap_or_else(|| "ledger returned status=false".to_string()),
            ))
        }
    }
}

/// Wallet ledger of record. Idempotent per `request_id` on its side.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn debit(&self, entry: LedgerEntry<'_>) -> Result<LedgerReceipt, CollaboratorError>;

    async fn credit(&self, entry: LedgerEntry<'_>) -> Result<LedgerReceipt, CollaboratorError>;
}

/// Exchange-rate quote between two wallet currencies.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Units of `to_wallet` currency per one unit of `from_wallet` currency.
    async fn rate(&self, from_wallet: &str, to_wallet: &str) -> Result<Decimal, CollaboratorError>;
}
