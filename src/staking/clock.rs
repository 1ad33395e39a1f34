// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wall-clock abstraction.
//!
//! Accrual is computed on demand from elapsed time, so every component that
//! reads "now" takes a [`Clock`] instead of calling `Utc::now()` directly.
//! Tests drive time with [`ManualClock`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current time as Unix seconds.
    fn unix_now(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Shared clock handle stored in application state.
pub type SharedClock = Arc<dyn Clock>;

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at the given Unix timestamp (seconds).
    pub fn at(unix_secs: i64) -> Self {
        let start = Utc
            .timestamp_opt(unix_secs, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    /// Jump to an absolute Unix timestamp.
    pub fn set(&self, unix_secs: i64) {
        if let (Ok(mut now), Some(at)) = (self.now.lock(), Utc.timestamp_opt(unix_secs, 0).single())
        {
            *now = at;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::at(1_700_000_000);
        assert_eq!(clock.unix_now(), 1_700_000_000);
        assert_eq!(clock.unix_now(), 1_700_000_000);

        clock.advance_secs(125);
        assert_eq!(clock.unix_now(), 1_700_000_125);

        clock.set(42);
        assert_eq!(clock.unix_now(), 42);
    }

    #[test]
    fn clones_share_the_same_time() {
        let clock = ManualClock::at(0);
        let shared: SharedClock = Arc::new(clock.clone());
        clock.advance_secs(60);
        assert_eq!(shared.unix_now(), 60);
    }
}
