// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process ledger and rate table.
//!
//! Used when no ledger URL is configured (development) and by tests, which
//! inject one-shot faults to exercise the partial-failure paths.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use super::{
    CollaboratorError, Ledger, LedgerEntry, LedgerReceipt, MetadataMap, MetadataStore, RateSource,
};

/// One-shot failure consumed by the next matching call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    DebitUnavailable,
    DebitDeclined,
    CreditUnavailable,
    /// Fail the credit whose request id matches.
    CreditUnavailableFor(String),
    /// Answer the next credit with `status=false`.
    CreditDeclined,
    /// Decline the credit whose request id matches.
    CreditDeclinedFor(String),
    /// Book the next credit, then report a timeout.
    CreditTimeoutAfterBooking,
    GetUnavailable,
    PutUnavailable,
    PostUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Debit,
    Credit,
}

/// A booked ledger movement.
#[derive(Debug, Clone)]
pub struct BookedEntry {
    pub transaction_id: String,
    pub kind: EntryKind,
    pub user_id: String,
    pub wallet_id: String,
    pub amount: Decimal,
    pub request_id: String,
}

#[derive(Default)]
struct Inner {
    entries: Vec<BookedEntry>,
    by_request: HashMap<(EntryKind, String), String>,
    metadata: HashMap<String, MetadataMap>,
    faults: Vec<Fault>,
}

impl Inner {
    fn take_fault(&mut self, matches: impl Fn(&Fault) -> bool) -> bool {
        match self.faults.iter().position(matches) {
            Some(index) => {
                self.faults.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Ledger of record kept in memory. Credits carry their metadata, which is
/// then readable through [`MetadataStore`] under the credit's transaction id.
#[derive(Default)]
pub struct InMemoryLedger {
    inner: Mutex<Inner>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot fault.
    pub fn inject(&self, fault: Fault) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.faults.push(fault);
        }
    }

    /// All booked entries, oldest first.
    pub fn entries(&self) -> Vec<BookedEntry> {
        self.inner
            .lock()
            .map(|inner| inner.entries.clone())
            .unwrap_or_default()
    }

    /// Booked credits into `wallet_id`.
    pub fn credits_to(&self, wallet_id: &str) -> Vec<BookedEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.kind == EntryKind::Credit && e.wallet_id == wallet_id)
            .collect()
    }

    /// Raw metadata snapshot, bypassing fault injection.
    pub fn metadata_snapshot(&self, transaction_id: &str) -> Option<MetadataMap> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.metadata.get(transaction_id).cloned())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, CollaboratorError> {
        self.inner
            .lock()
            .map_err(|_| CollaboratorError::Unavailable("in-memory ledger poisoned".to_string()))
    }

    fn book(&self, kind: EntryKind, entry: LedgerEntry<'_>) -> Result<LedgerReceipt, CollaboratorError> {
        let mut inner = self.lock()?;

        let key = (kind, entry.request_id.to_string());
        if let Some(existing) = inner.by_request.get(&key) {
            return Ok(LedgerReceipt::accepted(existing.clone()));
        }

        let transaction_id = Uuid::new_v4().to_string();
        inner.entries.push(BookedEntry {
            transaction_id: transaction_id.clone(),
            kind,
            user_id: entry.user_id.to_string(),
            wallet_id: entry.wallet_id.to_string(),
            amount: entry.amount,
            request_id: entry.request_id.to_string(),
        });
        inner.by_request.insert(key, transaction_id.clone());
        inner.metadata.insert(transaction_id.clone(), entry.metadata);

        Ok(LedgerReceipt::accepted(transaction_id))
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn debit(&self, entry: LedgerEntry<'_>) -> Result<LedgerReceipt, CollaboratorError> {
        {
            let mut inner = self.lock()?;
            if inner.take_fault(|f| *f == Fault::DebitUnavailable) {
                return Err(CollaboratorError::Unavailable("injected debit failure".to_string()));
            }
            if inner.take_fault(|f| *f == Fault::DebitDeclined) {
                return Ok(LedgerReceipt {
                    status: false,
                    transaction_id: String::new(),
                    message: Some("insufficient balance".to_string()),
                });
            }
        }
        self.book(EntryKind::Debit, entry)
    }

    async fn credit(&self, entry: LedgerEntry<'_>) -> Result<LedgerReceipt, CollaboratorError> {
        {
            let mut inner = self.lock()?;
            let request_id = entry.request_id;
            let failed = inner.take_fault(|f| match f {
                Fault::CreditUnavailable => true,
                Fault::CreditUnavailableFor(id) => id == request_id,
                _ => false,
            });
            if failed {
                return Err(CollaboratorError::Unavailable("injected credit failure".to_string()));
            }
            let declined = inner.take_fault(|f| match f {
                Fault::CreditDeclined => true,
                Fault::CreditDeclinedFor(id) => id == request_id,
                _ => false,
            });
            if declined {
                return Ok(LedgerReceipt {
                    status: false,
                    transaction_id: String::new(),
                    message: Some("wallet frozen".to_string()),
                });
            }
            if inner.take_fault(|f| *f == Fault::CreditTimeoutAfterBooking) {
                drop(inner);
                self.book(EntryKind::Credit, entry)?;
                return Err(CollaboratorError::Unavailable("credit timed out".to_string()));
            }
        }
        self.book(EntryKind::Credit, entry)
    }
}

#[async_trait]
impl MetadataStore for InMemoryLedger {
    async fn get(&self, contract_id: &str) -> Result<MetadataMap, CollaboratorError> {
        let mut inner = self.lock()?;
        if inner.take_fault(|f| *f == Fault::GetUnavailable) {
            return Err(CollaboratorError::Unavailable("injected get failure".to_string()));
        }
        inner
            .metadata
            .get(contract_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound(format!("transaction {contract_id}")))
    }

    async fn put(&self, contract_id: &str, patch: MetadataMap) -> Result<(), CollaboratorError> {
        let mut inner = self.lock()?;
        if inner.take_fault(|f| *f == Fault::PutUnavailable) {
            return Err(CollaboratorError::Unavailable("injected put failure".to_string()));
        }
        let record = inner
            .metadata
            .get_mut(contract_id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("transaction {contract_id}")))?;
        for (key, value) in patch {
            if value.is_null() {
                record.remove(&key);
            } else {
                record.insert(key, value);
            }
        }
        Ok(())
    }

    async fn post(
        &self,
        contract_id: &str,
        additions: MetadataMap,
    ) -> Result<(), CollaboratorError> {
        let mut inner = self.lock()?;
        if inner.take_fault(|f| *f == Fault::PostUnavailable) {
            return Err(CollaboratorError::Unavailable("injected post failure".to_string()));
        }
        let record = inner
            .metadata
            .get_mut(contract_id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("transaction {contract_id}")))?;
        if let Some(existing) = additions.keys().find(|key| record.contains_key(*key)) {
            return Err(CollaboratorError::Rejected(format!(
                "metadata key `{existing}` already exists"
            )));
        }
        record.extend(additions.into_iter().filter(|(_, v)| !matches!(v, Value::Null)));
        Ok(())
    }
}

/// Static exchange-rate table keyed by `(from_wallet, to_wallet)`.
#[derive(Debug, Default)]
pub struct FixedRates {
    rates: Mutex<HashMap<(String, String), Decimal>>,
}

impl FixedRates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(self, from_wallet: &str, to_wallet: &str, rate: Decimal) -> Self {
        self.set(from_wallet, to_wallet, rate);
        self
    }

    pub fn set(&self, from_wallet: &str, to_wallet: &str, rate: Decimal) {
        if let Ok(mut rates) = self.rates.lock() {
            rates.insert((from_wallet.to_string(), to_wallet.to_string()), rate);
        }
    }
}

#[async_trait]
impl RateSource for FixedRates {
    async fn rate(&self, from_wallet: &str, to_wallet: &str) -> Result<Decimal, CollaboratorError> {
        let rates = self
            .rates
            .lock()
            .map_err(|_| CollaboratorError::Unavailable("rate table poisoned".to_string()))?;
        rates
            .get(&(from_wallet.to_string(), to_wallet.to_string()))
            .copied()
            .ok_or_else(|| CollaboratorError::NotFound(format!("rate {from_wallet}->{to_wallet}")))
    }
}
