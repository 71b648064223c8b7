//! Deadline countdown.
//!
//! The banner counts down to a configured target instant. Every tick is a
//! pure function of the wall clock and the target -- nothing accumulates,
//! so a tab that sleeps for ten minutes shows the right numbers on the
//! very next tick. When the target passes, the engine emits one final
//! all-zero snapshot, reports completion exactly once, and goes inert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Static description of a countdown: what instant it runs toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownSpec {
    pub target: DateTime<Utc>,
}

/// Days/hours/minutes/seconds remaining, all fields non-negative.
/// `hours < 24`, `minutes < 60`, `seconds < 60`; `days` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownSnapshot {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl CountdownSnapshot {
    pub const ZERO: Self = Self {
        days: 0,
        hours: 0,
        minutes: 0,
        seconds: 0,
    };

    /// Break a whole-second delta into display fields. Negative deltas
    /// clamp to the zero snapshot.
    pub fn from_delta_seconds(delta: i64) -> Self {
        let delta = delta.max(0) as u64;
        Self {
            days: delta / 86_400,
            hours: (delta / 3_600) % 24,
            minutes: (delta / 60) % 60,
            seconds: delta % 60,
        }
    }

    /// Inverse of [`from_delta_seconds`](Self::from_delta_seconds).
    pub fn total_seconds(&self) -> u64 {
        self.days * 86_400 + self.hours * 3_600 + self.minutes * 60 + self.seconds
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl std::fmt::Display for CountdownSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}d {:02}:{:02}:{:02}",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// What one tick produced. The update with `completed == true` is the
/// last one the engine will ever return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownUpdate {
    pub snapshot: CountdownSnapshot,
    pub completed: bool,
}

/// Wall-clock countdown toward a fixed target.
///
/// Drive it with [`tick`](CountdownEngine::tick) on a one-second cadence.
/// The engine never schedules anything itself; cadence and cancellation
/// belong to the caller.
#[derive(Debug, Clone)]
pub struct CountdownEngine {
    target: DateTime<Utc>,
    completed: bool,
}

impl CountdownEngine {
    pub fn new(spec: CountdownSpec) -> Self {
        Self {
            target: spec.target,
            completed: false,
        }
    }

    pub fn target(&self) -> DateTime<Utc> {
        self.target
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Recompute remaining time at `now`.
    ///
    /// Returns `None` once the countdown has completed; before that, the
    /// snapshot for `now`. A target already in the past completes on the
    /// first tick rather than going negative.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<CountdownUpdate> {
        if self.completed {
            return None;
        }
        let delta = (self.target - now).num_seconds();
        if delta <= 0 {
            self.completed = true;
            return Some(CountdownUpdate {
                snapshot: CountdownSnapshot::ZERO,
                completed: true,
            });
        }
        Some(CountdownUpdate {
            snapshot: CountdownSnapshot::from_delta_seconds(delta),
            completed: false,
        })
    }

    /// Snapshot without advancing engine state. The CLI uses this for a
    /// read-only preview.
    pub fn peek(&self, now: DateTime<Utc>) -> CountdownSnapshot {
        CountdownSnapshot::from_delta_seconds((self.target - now).num_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn engine_until(target: DateTime<Utc>) -> CountdownEngine {
        CountdownEngine::new(CountdownSpec { target })
    }

    #[test]
    fn ninety_seconds_out_reads_one_thirty() {
        let mut engine = engine_until(t0() + Duration::seconds(90));
        let update = engine.tick(t0()).unwrap();
        assert_eq!(
            update.snapshot,
            CountdownSnapshot {
                days: 0,
                hours: 0,
                minutes: 1,
                seconds: 30
            }
        );
        assert!(!update.completed);
    }

    #[test]
    fn completes_once_with_zero_snapshot_then_goes_inert() {
        let mut engine = engine_until(t0() + Duration::seconds(90));

        let mut completions = 0;
        for s in 0..120 {
            if let Some(update) = engine.tick(t0() + Duration::seconds(s)) {
                if update.completed {
                    completions += 1;
                    assert!(update.snapshot.is_zero());
                }
            }
        }
        assert_eq!(completions, 1);
        assert!(engine.is_complete());
        assert!(engine.tick(t0() + Duration::hours(1)).is_none());
    }

    #[test]
    fn past_target_completes_immediately() {
        let mut engine = engine_until(t0() - Duration::hours(3));
        let update = engine.tick(t0()).unwrap();
        assert!(update.completed);
        assert!(update.snapshot.is_zero());
        assert!(engine.tick(t0()).is_none());
    }

    #[test]
    fn background_gap_recomputes_from_wall_clock() {
        let mut engine = engine_until(t0() + Duration::hours(2));
        engine.tick(t0()).unwrap();

        // Ten minutes with no ticks at all, then one tick: the snapshot
        // reflects real elapsed time, not tick count.
        let update = engine.tick(t0() + Duration::minutes(10)).unwrap();
        assert_eq!(update.snapshot.hours, 1);
        assert_eq!(update.snapshot.minutes, 50);
        assert_eq!(update.snapshot.seconds, 0);
    }

    #[test]
    fn day_boundary_math() {
        let mut engine = engine_until(t0() + Duration::days(2) + Duration::seconds(61));
        let snap = engine.tick(t0()).unwrap().snapshot;
        assert_eq!(snap.days, 2);
        assert_eq!(snap.hours, 0);
        assert_eq!(snap.minutes, 1);
        assert_eq!(snap.seconds, 1);
    }

    #[test]
    fn peek_does_not_consume_completion() {
        let engine = engine_until(t0() - Duration::seconds(5));
        assert!(engine.peek(t0()).is_zero());
        assert!(!engine.is_complete());
    }

    proptest! {
        #[test]
        fn snapshot_fields_stay_in_range(delta in 0i64..=4_000_000_000) {
            let snap = CountdownSnapshot::from_delta_seconds(delta);
            prop_assert!(snap.seconds < 60);
            prop_assert!(snap.minutes < 60);
            prop_assert!(snap.hours < 24);
        }

        #[test]
        fn snapshot_roundtrips_to_delta(delta in 0i64..=4_000_000_000) {
            let snap = CountdownSnapshot::from_delta_seconds(delta);
            prop_assert_eq!(snap.total_seconds(), delta as u64);
        }

        #[test]
        fn negative_deltas_clamp_to_zero(delta in -4_000_000_000i64..0) {
            prop_assert!(CountdownSnapshot::from_delta_seconds(delta).is_zero());
        }
    }
}
