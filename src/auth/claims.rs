// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token claims and the authenticated caller.

use serde::Deserialize;
use serde_json::Value;

use super::roles::Role;

/// Claims read from a Clerk session token.
///
/// Only what the staking endpoints use is deserialized; `exp`, `nbf`, `iss`
/// and `aud` are checked by the decoder.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    /// Clerk user id.
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default, alias = "publicMetadata", alias = "metadata")]
    pub public_metadata: Option<PublicMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicMetadata {
    #[serde(default)]
    pub role: Option<String>,
    /// Ledger user id the session acts as. Numeric or string.
    #[serde(default, alias = "userId", alias = "ledger_user_id")]
    pub user_id: Option<Value>,
}

impl PublicMetadata {
    fn ledger_user_id(&self) -> Option<String> {
        match self.user_id.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) if n.is_u64() || n.is_i64() => Some(n.to_string()),
            _ => None,
        }
    }
}

/// The caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Clerk `sub`. Recorded as the actor in audit events.
    pub subject: String,
    pub role: Role,
    /// Ledger user the caller may act as. `None` means the token carries no
    /// ledger identity and only elevated roles can touch contracts.
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Unknown or missing roles fall back to `Client`.
    pub fn from_claims(claims: JwtClaims) -> Self {
        let metadata = claims.public_metadata.unwrap_or_default();
        let role = metadata.role.as_deref().and_then(Role::parse).unwrap_or_default();

        Self {
            subject: claims.sub,
            role,
            user_id: metadata.ledger_user_id(),
            session_id: claims.sid,
            expires_at: claims.exp,
        }
    }

    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }

    /// Operators act for any ledger user; clients only for their own.
    pub fn may_act_for(&self, ledger_user_id: &str) -> bool {
        self.has_role(Role::Operator) || self.user_id.as_deref() == Some(ledger_user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(metadata: serde_json::Value) -> JwtClaims {
        serde_json::from_value(json!({
            "sub": "user_123",
            "exp": 1_700_003_600,
            "sid": "sess_abc",
            "public_metadata": metadata,
        }))
        .unwrap()
    }

    #[test]
    fn role_comes_from_public_metadata() {
        let user = AuthenticatedUser::from_claims(claims(json!({ "role": "operator" })));
        assert_eq!(user.subject, "user_123");
        assert_eq!(user.role, Role::Operator);
        assert!(user.has_role(Role::Operator));
        assert_eq!(user.session_id.as_deref(), Some("sess_abc"));
        assert_eq!(user.user_id, None);
        assert!(user.may_act_for("42"));
    }

    #[test]
    fn ledger_user_id_accepts_number_or_string() {
        let user = AuthenticatedUser::from_claims(claims(json!({ "user_id": 42 })));
        assert_eq!(user.user_id.as_deref(), Some("42"));
        assert!(user.may_act_for("42"));
        assert!(!user.may_act_for("43"));

        let user = AuthenticatedUser::from_claims(claims(json!({ "userId": " 42 " })));
        assert_eq!(user.user_id.as_deref(), Some("42"));

        let user = AuthenticatedUser::from_claims(claims(json!({ "user_id": "" })));
        assert_eq!(user.user_id, None);
        assert!(!user.may_act_for(""));
    }

    #[test]
    fn unknown_role_defaults_to_client() {
        let user = AuthenticatedUser::from_claims(claims(json!({ "role": "superuser" })));
        assert_eq!(user.role, Role::Client);

        let user = AuthenticatedUser::from_claims(claims(json!(null)));
        assert_eq!(user.role, Role::Client);
        assert!(!user.has_role(Role::Operator));
    }
}
