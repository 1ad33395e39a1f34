// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit trail for money-moving operations.
//!
//! Events are emitted as structured `tracing` records on the `audit` target so
//! they can be routed to a separate sink by the log pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    StakeCreated,
    StakeRejected,
    WithdrawalCommitted,
    WithdrawalRejected,
    ReservationReconciled,
    PermissionDenied,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Authenticated subject (JWT `sub`).
    pub actor: Option<String>,
    /// Contract owner as named in the request.
    pub user_id: Option<String>,
    pub contract_id: Option<String>,
    pub request_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub success: bool,
    /// Error code if the operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            event_type,
            actor: None,
            user_id: None,
            contract_id: None,
            request_id: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_contract(mut self, contract_id: impl Into<String>) -> Self {
        self.contract_id = Some(contract_id.into());
        self
    }

    pub fn with_request(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with an error code.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    /// Write the event to the `audit` tracing target.
    pub fn emit(&self) {
        let record = serde_json::to_string(self).unwrap_or_default();
        if self.success {
            tracing::info!(target: "audit", event_type = ?self.event_type, event = %record);
        } else {
            tracing::warn!(target: "audit", event_type = ?self.event_type, event = %record);
        }
    }
}
