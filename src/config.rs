// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, default values and the staking plan policy
//! loaded at startup. Values are trimmed and empty strings count as unset.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files, HTTPS when both set | unset (HTTP) |
//! | `CLERK_JWKS_URL` | Clerk JWKS endpoint for JWT verification | Required for production |
//! | `CLERK_ISSUER` | Expected JWT issuer claim | Required for production |
//! | `CLERK_AUDIENCE` | Expected JWT audience claim | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `LEDGER_BASE_URL` | Ledger + metadata API | in-memory ledger |
//! | `LEDGER_API_KEY` | Bearer key for the ledger API | Optional |
//! | `RATES_BASE_URL` | Exchange-rate API | fixed rate table |
//! | `COLLABORATOR_TIMEOUT_SECS` | HTTP timeout, no retries | `15` |
//! | `STAKING_LOCKED_WALLET_ID` | Holding wallet for principal | `locked` |
//! | `STAKING_ALLOWED_INTERVALS` | Comma list of interval keys | all |
//! | `STAKING_MIN_INTERVAL_COUNT` | Shortest plan, in intervals | `1` |
//! | `STAKING_MAX_INTERVAL_COUNT` | Longest plan, in intervals | `1000` |
//! | `STAKING_ALLOWED_PERCENTAGES` | Comma list of `N%` | `0.5%,1%,2%,5%` |
//! | `STAKING_FIRST_WITHDRAWAL_DELAY` | Intervals before first withdrawal | `1` |
//! | `STAKING_WITHDRAWAL_POLICY` | `continuous` or `windowed` | `continuous` |
//! | `STAKING_WITHDRAWAL_WINDOW_INTERVALS` | Window length for `windowed` | `1` |
//! | `METADATA_CACHE_TTL_SECS` | Display cache TTL | `10` |
//! | `METADATA_CACHE_CAPACITY` | Display cache entries | `1024` |

use std::num::NonZeroUsize;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::staking::amount::parse_percentage;
use crate::staking::contract::WithdrawalPolicy;
use crate::staking::interval::IntervalKind;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

/// Clerk JWKS endpoint. When unset the server runs in development mode.
pub const CLERK_JWKS_URL_ENV: &str = "CLERK_JWKS_URL";
pub const CLERK_ISSUER_ENV: &str = "CLERK_ISSUER";
pub const CLERK_AUDIENCE_ENV: &str = "CLERK_AUDIENCE";

/// `json` for structured logs, anything else for human-readable output.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

pub const LEDGER_BASE_URL_ENV: &str = "LEDGER_BASE_URL";
pub const LEDGER_API_KEY_ENV: &str = "LEDGER_API_KEY";
pub const RATES_BASE_URL_ENV: &str = "RATES_BASE_URL";
pub const COLLABORATOR_TIMEOUT_ENV: &str = "COLLABORATOR_TIMEOUT_SECS";
pub const DEFAULT_COLLABORATOR_TIMEOUT_SECS: u64 = 15;

pub const LOCKED_WALLET_ENV: &str = "STAKING_LOCKED_WALLET_ID";
pub const DEFAULT_LOCKED_WALLET: &str = "locked";
pub const ALLOWED_INTERVALS_ENV: &str = "STAKING_ALLOWED_INTERVALS";
pub const MIN_INTERVAL_COUNT_ENV: &str = "STAKING_MIN_INTERVAL_COUNT";
pub const MAX_INTERVAL_COUNT_ENV: &str = "STAKING_MAX_INTERVAL_COUNT";
pub const DEFAULT_MIN_INTERVAL_COUNT: u64 = 1;
pub const DEFAULT_MAX_INTERVAL_COUNT: u64 = 1000;
pub const ALLOWED_PERCENTAGES_ENV: &str = "STAKING_ALLOWED_PERCENTAGES";
pub const DEFAULT_ALLOWED_PERCENTAGES: &str = "0.5%,1%,2%,5%";
pub const FIRST_WITHDRAWAL_DELAY_ENV: &str = "STAKING_FIRST_WITHDRAWAL_DELAY";
pub const DEFAULT_FIRST_WITHDRAWAL_DELAY: u64 = 1;
pub const WITHDRAWAL_POLICY_ENV: &str = "STAKING_WITHDRAWAL_POLICY";
pub const WITHDRAWAL_WINDOW_ENV: &str = "STAKING_WITHDRAWAL_WINDOW_INTERVALS";
pub const DEFAULT_WITHDRAWAL_WINDOW_INTERVALS: u64 = 1;

pub const CACHE_TTL_ENV: &str = "METADATA_CACHE_TTL_SECS";
pub const CACHE_CAPACITY_ENV: &str = "METADATA_CACHE_CAPACITY";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 10;
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not set")]
    Missing { name: &'static str },

    #[error("{name} has invalid value `{value}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Read a variable, trimmed. Empty counts as unset.
pub fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

/// Read a required variable; the error names the variable.
pub fn env_required(name: &str) -> Result<String, String> {
    env_optional(name).ok_or_else(|| format!("{name} is not set"))
}

fn env_parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_optional(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::invalid(name, &raw, e.to_string())),
    }
}

/// Operator allow-list the schedule builder validates plan selections against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPolicy {
    pub allowed_intervals: Vec<IntervalKind>,
    pub min_interval_count: u64,
    pub max_interval_count: u64,
    /// Fractions, e.g. `0.01` for `"1%"`.
    pub allowed_percentages: Vec<Decimal>,
    /// Intervals after start before the first withdrawal is allowed.
    pub first_withdrawal_delay: u64,
    pub withdrawal_policy: WithdrawalPolicy,
}

impl Default for PlanPolicy {
    fn default() -> Self {
        Self {
            allowed_intervals: IntervalKind::ALL.to_vec(),
            min_interval_count: DEFAULT_MIN_INTERVAL_COUNT,
            max_interval_count: DEFAULT_MAX_INTERVAL_COUNT,
            allowed_percentages: DEFAULT_ALLOWED_PERCENTAGES
                .split(',')
                .filter_map(|p| parse_percentage(p).ok())
                .collect(),
            first_withdrawal_delay: DEFAULT_FIRST_WITHDRAWAL_DELAY,
            withdrawal_policy: WithdrawalPolicy::Continuous,
        }
    }
}

impl PlanPolicy {
    pub fn from_env() -> Result<Self, ConfigError> {
        let allowed_intervals = match env_optional(ALLOWED_INTERVALS_ENV) {
            None => IntervalKind::ALL.to_vec(),
            Some(raw) => parse_intervals(&raw)?,
        };
        let allowed_percentages =
            parse_percentages(&env_or_default(ALLOWED_PERCENTAGES_ENV, DEFAULT_ALLOWED_PERCENTAGES))?;

        let min_interval_count = env_parsed(MIN_INTERVAL_COUNT_ENV, DEFAULT_MIN_INTERVAL_COUNT)?;
        let max_interval_count = env_parsed(MAX_INTERVAL_COUNT_ENV, DEFAULT_MAX_INTERVAL_COUNT)?;
        if min_interval_count == 0 {
            return Err(ConfigError::invalid(MIN_INTERVAL_COUNT_ENV, "0", "must be at least 1"));
        }
        if max_interval_count < min_interval_count {
            return Err(ConfigError::invalid(
                MAX_INTERVAL_COUNT_ENV,
                &max_interval_count.to_string(),
                format!("must be >= {MIN_INTERVAL_COUNT_ENV} ({min_interval_count})"),
            ));
        }

        let first_withdrawal_delay =
            env_parsed(FIRST_WITHDRAWAL_DELAY_ENV, DEFAULT_FIRST_WITHDRAWAL_DELAY)?;
        let withdrawal_policy = parse_withdrawal_policy(
            &env_or_default(WITHDRAWAL_POLICY_ENV, "continuous"),
            env_parsed(WITHDRAWAL_WINDOW_ENV, DEFAULT_WITHDRAWAL_WINDOW_INTERVALS)?,
        )?;

        Ok(Self {
            allowed_intervals,
            min_interval_count,
            max_interval_count,
            allowed_percentages,
            first_withdrawal_delay,
            withdrawal_policy,
        })
    }
}

fn parse_intervals(raw: &str) -> Result<Vec<IntervalKind>, ConfigError> {
    let mut kinds = Vec::new();
    for key in raw.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        let kind = IntervalKind::parse(key)
            .ok_or_else(|| ConfigError::invalid(ALLOWED_INTERVALS_ENV, key, "unknown interval"))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(ConfigError::invalid(ALLOWED_INTERVALS_ENV, raw, "no intervals listed"));
    }
    Ok(kinds)
}

fn parse_percentages(raw: &str) -> Result<Vec<Decimal>, ConfigError> {
    let mut fractions = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let fraction = parse_percentage(item)
            .map_err(|e| ConfigError::invalid(ALLOWED_PERCENTAGES_ENV, item, e.to_string()))?;
        fractions.push(fraction);
    }
    if fractions.is_empty() {
        return Err(ConfigError::invalid(ALLOWED_PERCENTAGES_ENV, raw, "no percentages listed"));
    }
    Ok(fractions)
}

fn parse_withdrawal_policy(raw: &str, window_intervals: u64) -> Result<WithdrawalPolicy, ConfigError> {
    match raw {
        "continuous" => Ok(WithdrawalPolicy::Continuous),
        "windowed" if window_intervals == 0 => Err(ConfigError::invalid(
            WITHDRAWAL_WINDOW_ENV,
            "0",
            "must be at least 1",
        )),
        "windowed" => Ok(WithdrawalPolicy::Windowed { window_intervals }),
        other => Err(ConfigError::invalid(
            WITHDRAWAL_POLICY_ENV,
            other,
            "expected `continuous` or `windowed`",
        )),
    }
}

/// Staking engine configuration.
#[derive(Debug, Clone)]
pub struct StakingConfig {
    pub locked_wallet_id: String,
    pub plan: PlanPolicy,
    pub cache_ttl: Duration,
    pub cache_capacity: NonZeroUsize,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            locked_wallet_id: DEFAULT_LOCKED_WALLET.to_string(),
            plan: PlanPolicy::default(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_capacity: NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl StakingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let capacity = env_parsed(CACHE_CAPACITY_ENV, DEFAULT_CACHE_CAPACITY)?;
        let cache_capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| ConfigError::invalid(CACHE_CAPACITY_ENV, "0", "must be at least 1"))?;

        Ok(Self {
            locked_wallet_id: env_or_default(LOCKED_WALLET_ENV, DEFAULT_LOCKED_WALLET),
            plan: PlanPolicy::from_env()?,
            cache_ttl: Duration::from_secs(env_parsed(CACHE_TTL_ENV, DEFAULT_CACHE_TTL_SECS)?),
            cache_capacity,
        })
    }
}

/// Bind address and optional TLS material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsPaths>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert_path: String,
    pub key_path: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let tls = match (env_optional(TLS_CERT_PATH_ENV), env_optional(TLS_KEY_PATH_ENV)) {
            (Some(cert_path), Some(key_path)) => Some(TlsPaths {
                cert_path,
                key_path,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing { name: TLS_KEY_PATH_ENV }),
            (None, Some(_)) => return Err(ConfigError::Missing { name: TLS_CERT_PATH_ENV }),
        };

        Ok(Self {
            host: env_or_default(HOST_ENV, DEFAULT_HOST),
            port: env_parsed(PORT_ENV, DEFAULT_PORT)?,
            tls,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
