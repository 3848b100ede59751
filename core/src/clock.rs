/*
 * clock.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tagliacarte, a cross-platform email client.
 *
 * Tagliacarte is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tagliacarte is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tagliacarte.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Server clock skew correction for signature time checks.
//!
//! The mail server's notion of "now" is recorded together with the local monotonic
//! instant at which it was observed; corrected time advances from that point with the
//! local clock. Only the latest observation is kept.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use chrono::Utc;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct ServerTime {
    epoch_seconds: i64,
    observed_at: Instant,
}

/// Thread-safe record of the latest known server time.
#[derive(Debug, Default)]
pub struct ClockSkew {
    latest: Mutex<Option<ServerTime>>,
}

impl ClockSkew {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the server's current time (seconds since the epoch). Replaces any earlier
    /// record; concurrent callers race and the last writer wins.
    pub fn record_server_time(&self, epoch_seconds: i64) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        *latest = Some(ServerTime {
            epoch_seconds,
            observed_at: Instant::now(),
        });
        debug!(epoch_seconds, "recorded server time");
    }

    /// Current time in epoch seconds, corrected by the recorded server time.
    /// Falls back to the local wall clock when no server time has been recorded.
    pub fn corrected_now(&self) -> i64 {
        let latest = *self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        match latest {
            Some(t) => t.epoch_seconds.saturating_add(t.observed_at.elapsed().as_secs() as i64),
            None => Utc::now().timestamp(),
        }
    }

    /// The last recorded server time, if any.
    pub fn latest_server_time(&self) -> Option<i64> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|t| t.epoch_seconds)
    }
}

/// Point in time at which signature validity is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyTime {
    /// Skip creation and expiration time checks.
    Unchecked,
    /// The clock's corrected now.
    Now,
    /// An explicit time in epoch seconds.
    At(i64),
}

impl VerifyTime {
    /// Map the conventional integer form: 0 disables time checks, anything else is an
    /// explicit epoch time.
    pub fn from_epoch(epoch_seconds: i64) -> Self {
        if epoch_seconds == 0 {
            VerifyTime::Unchecked
        } else {
            VerifyTime::At(epoch_seconds)
        }
    }

    /// Resolve to epoch seconds, or `None` when time checks are disabled.
    pub fn resolve(self, clock: &ClockSkew) -> Option<i64> {
        match self {
            VerifyTime::Unchecked => None,
            VerifyTime::Now => Some(clock.corrected_now()),
            VerifyTime::At(t) => Some(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn without_record_uses_local_clock() {
        let clock = ClockSkew::new();
        let local = Utc::now().timestamp();
        assert!((clock.corrected_now() - local).abs() <= 1);
        assert_eq!(clock.latest_server_time(), None);
    }

    #[test]
    fn recorded_time_is_returned_immediately() {
        let clock = ClockSkew::new();
        clock.record_server_time(1_500_000_000);
        let now = clock.corrected_now();
        assert!((1_500_000_000..=1_500_000_001).contains(&now));
    }

    #[test]
    fn last_record_wins() {
        let clock = ClockSkew::new();
        clock.record_server_time(1_000);
        clock.record_server_time(2_000_000_000);
        assert_eq!(clock.latest_server_time(), Some(2_000_000_000));
        assert!(clock.corrected_now() >= 2_000_000_000);
    }

    #[test]
    fn concurrent_records_leave_one_of_the_written_values() {
        let clock = Arc::new(ClockSkew::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || {
                    for j in 0..100 {
                        clock.record_server_time(1_000_000 * (i + 1) + j);
                        let _ = clock.corrected_now();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let t = clock.latest_server_time().unwrap();
        assert_eq!(t % 1_000_000, 99);
        assert!((1..=8).contains(&(t / 1_000_000)));
    }

    #[test]
    fn verify_time_resolution() {
        let clock = ClockSkew::new();
        clock.record_server_time(1_700_000_000);
        assert_eq!(VerifyTime::Unchecked.resolve(&clock), None);
        assert_eq!(VerifyTime::At(42).resolve(&clock), Some(42));
        let now = VerifyTime::Now.resolve(&clock).unwrap();
        assert!((1_700_000_000..=1_700_000_001).contains(&now));
        assert_eq!(VerifyTime::from_epoch(0), VerifyTime::Unchecked);
        assert_eq!(VerifyTime::from_epoch(5), VerifyTime::At(5));
    }
}
