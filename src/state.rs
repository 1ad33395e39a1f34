// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tracing::warn;

use crate::auth::JwksManager;
use crate::config::{env_optional, CLERK_AUDIENCE_ENV, CLERK_ISSUER_ENV, CLERK_JWKS_URL_ENV};
use crate::staking::StakingService;

/// Bearer token verification settings.
///
/// Without a JWKS manager tokens are decoded without signature checks. That
/// mode only exists in builds with the `dev` feature.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub jwks: Option<Arc<JwksManager>>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl AuthConfig {
    /// Read `CLERK_JWKS_URL`, `CLERK_ISSUER` and `CLERK_AUDIENCE`.
    pub fn from_env() -> Self {
        let jwks = env_optional(CLERK_JWKS_URL_ENV).and_then(|url| match JwksManager::new(&url) {
            Ok(manager) => Some(Arc::new(manager)),
            Err(e) => {
                warn!(jwks_url = %url, error = %e, "Could not build JWKS client");
                None
            }
        });
        Self {
            jwks,
            issuer: env_optional(CLERK_ISSUER_ENV),
            audience: env_optional(CLERK_AUDIENCE_ENV),
        }
    }
}

/// Which collaborator implementations the process is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollaboratorMode {
    Http,
    InMemory,
}

impl CollaboratorMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CollaboratorMode::Http => "http",
            CollaboratorMode::InMemory => "in_memory",
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub staking: Arc<StakingService>,
    pub auth_config: AuthConfig,
    pub ledger_mode: CollaboratorMode,
    pub rates_mode: CollaboratorMode,
}

impl AppState {
    pub fn new(staking: Arc<StakingService>, ledger_mode: CollaboratorMode, rates_mode: CollaboratorMode) -> Self {
        Self {
            staking,
            auth_config: AuthConfig::default(),
            ledger_mode,
            rates_mode,
        }
    }

    pub fn with_auth_config(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = auth_config;
        self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::staking::service::tests::{harness, Harness};

    /// State over the in-memory harness, tokens decoded without signature checks.
    pub(crate) fn test_state() -> (AppState, Harness) {
        let h = harness();
        let state = AppState::new(h.service.clone(), CollaboratorMode::InMemory, CollaboratorMode::InMemory);
        (state, h)
    }

    #[test]
    fn default_auth_config_has_no_jwks() {
        let (state, _h) = test_state();
        assert!(state.auth_config.jwks.is_none());
        assert_eq!(state.ledger_mode.as_str(), "in_memory");
    }
}
