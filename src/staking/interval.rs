// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Static interval table: named payout cadences and their length in seconds.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Payout cadence of a staking contract. Immutable for the contract's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    EveryMinute,
    Hourly,
    Daily,
    Weekly,
    /// 30 days.
    Monthly,
    /// 365 days.
    Yearly,
}

impl IntervalKind {
    pub const ALL: [IntervalKind; 6] = [
        IntervalKind::EveryMinute,
        IntervalKind::Hourly,
        IntervalKind::Daily,
        IntervalKind::Weekly,
        IntervalKind::Monthly,
        IntervalKind::Yearly,
    ];

    /// Length of one interval in seconds.
    pub const fn seconds(self) -> i64 {
        match self {
            IntervalKind::EveryMinute => 60,
            IntervalKind::Hourly => 3_600,
            IntervalKind::Daily => 86_400,
            IntervalKind::Weekly => 604_800,
            IntervalKind::Monthly => 2_592_000,
            IntervalKind::Yearly => 31_536_000,
        }
    }

    /// Table key, as accepted on the wire and stored in metadata.
    pub const fn as_str(self) -> &'static str {
        match self {
            IntervalKind::EveryMinute => "every_minute",
            IntervalKind::Hourly => "hourly",
            IntervalKind::Daily => "daily",
            IntervalKind::Weekly => "weekly",
            IntervalKind::Monthly => "monthly",
            IntervalKind::Yearly => "yearly",
        }
    }

    pub const fn display_singular(self) -> &'static str {
        match self {
            IntervalKind::EveryMinute => "minute",
            IntervalKind::Hourly => "hour",
            IntervalKind::Daily => "day",
            IntervalKind::Weekly => "week",
            IntervalKind::Monthly => "month",
            IntervalKind::Yearly => "year",
        }
    }

    pub const fn display_plural(self) -> &'static str {
        match self {
            IntervalKind::EveryMinute => "minutes",
            IntervalKind::Hourly => "hours",
            IntervalKind::Daily => "days",
            IntervalKind::Weekly => "weeks",
            IntervalKind::Monthly => "months",
            IntervalKind::Yearly => "years",
        }
    }

    /// Human-readable label for a count of intervals, e.g. `"5 minutes"`.
    pub fn describe(self, count: u64) -> String {
        if count == 1 {
            format!("1 {}", self.display_singular())
        } else {
            format!("{count} {}", self.display_plural())
        }
    }

    /// Look up a table key. Matching is exact after trimming.
    pub fn parse(raw: &str) -> Option<IntervalKind> {
        let key = raw.trim();
        Self::ALL.into_iter().find(|kind| kind.as_str() == key)
    }
}

impl std::fmt::Display for IntervalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_minute_is_sixty_seconds() {
        assert_eq!(IntervalKind::EveryMinute.seconds(), 60);
        assert_eq!(IntervalKind::Daily.seconds(), 24 * 60 * 60);
    }

    #[test]
    fn parse_accepts_table_keys_only() {
        assert_eq!(IntervalKind::parse("every_minute"), Some(IntervalKind::EveryMinute));
        assert_eq!(IntervalKind::parse(" weekly "), Some(IntervalKind::Weekly));
        assert_eq!(IntervalKind::parse("fortnightly"), None);
        assert_eq!(IntervalKind::parse("EVERY_MINUTE"), None);
    }

    #[test]
    fn parse_round_trips_every_key() {
        for kind in IntervalKind::ALL {
            assert_eq!(IntervalKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn describe_uses_singular_and_plural() {
        assert_eq!(IntervalKind::EveryMinute.describe(1), "1 minute");
        assert_eq!(IntervalKind::Monthly.describe(12), "12 months");
    }

    #[test]
    fn serde_uses_snake_case_keys() {
        let json = serde_json::to_string(&IntervalKind::EveryMinute).unwrap();
        assert_eq!(json, r#""every_minute""#);
    }
}
