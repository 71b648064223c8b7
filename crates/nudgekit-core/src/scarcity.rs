//! Scarcity counter simulation.
//!
//! The "only N left" number on the page is a presentation-layer
//! heuristic, not a real inventory count, and must never be treated as
//! authoritative. It walks downward on a jittered cadence to feel
//! organic, stops at a floor, and nothing else mutates it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::random::RandomSource;

/// Cosmetic availability counter. `floor <= value <= ceiling` always
/// holds; the only movements are single-step decrements and a reset back
/// to the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScarcityCounter {
    value: u32,
    floor: u32,
    ceiling: u32,
}

impl ScarcityCounter {
    /// Counter starting at `initial` with a lower bound of `floor`. A
    /// floor above `initial` is clamped down to it.
    pub fn new(initial: u32, floor: u32) -> Self {
        Self {
            value: initial,
            floor: floor.min(initial),
            ceiling: initial,
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn floor(&self) -> u32 {
        self.floor
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn is_at_floor(&self) -> bool {
        self.value <= self.floor
    }

    /// Step down by one. At the floor this is a no-op and returns `None`;
    /// otherwise the new value comes back.
    pub fn tick(&mut self) -> Option<u32> {
        if self.is_at_floor() {
            return None;
        }
        self.value -= 1;
        Some(self.value)
    }

    /// Back to the ceiling. The one sanctioned upward movement, used when
    /// a page remounts with a fresh campaign.
    pub fn reset(&mut self) {
        self.value = self.ceiling;
    }
}

/// A decrement that actually happened, with the instant it fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScarcityChange {
    pub remaining: u32,
    pub at: DateTime<Utc>,
}

/// Drives a [`ScarcityCounter`] on a randomized 20-50 s style cadence.
///
/// The simulator owns its own deadline instead of a fixed-period
/// scheduler entry: every fire draws a fresh interval from the injected
/// [`RandomSource`]. Call [`pump`](ScarcitySimulator::pump) from the
/// host's regular tick; cancel on page teardown.
pub struct ScarcitySimulator {
    counter: ScarcityCounter,
    min_interval_secs: u64,
    max_interval_secs: u64,
    rng: Box<dyn RandomSource>,
    next_due: Option<DateTime<Utc>>,
}

impl ScarcitySimulator {
    pub fn new(
        counter: ScarcityCounter,
        min_interval_secs: u64,
        max_interval_secs: u64,
        rng: Box<dyn RandomSource>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut sim = Self {
            counter,
            min_interval_secs,
            max_interval_secs,
            rng,
            next_due: None,
        };
        sim.next_due = Some(now + sim.draw_interval());
        sim
    }

    pub fn counter(&self) -> &ScarcityCounter {
        &self.counter
    }

    /// Decrement if the jittered deadline has passed. Draws the next
    /// deadline on every fire; once the floor is reached the cadence
    /// stops for good.
    pub fn pump(&mut self, now: DateTime<Utc>) -> Option<ScarcityChange> {
        let due = self.next_due?;
        if now < due {
            return None;
        }
        match self.counter.tick() {
            Some(remaining) => {
                self.next_due = if self.counter.is_at_floor() {
                    None
                } else {
                    Some(now + self.draw_interval())
                };
                Some(ScarcityChange { remaining, at: now })
            }
            None => {
                self.next_due = None;
                None
            }
        }
    }

    /// Stop the cadence. Idempotent; pump never fires afterwards.
    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_cancelled(&self) -> bool {
        self.next_due.is_none()
    }

    /// Restart from the ceiling with a fresh deadline.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.counter.reset();
        self.next_due = Some(now + self.draw_interval());
    }

    fn draw_interval(&mut self) -> Duration {
        let secs = self
            .rng
            .range_u64(self.min_interval_secs, self.max_interval_secs);
        Duration::seconds(secs as i64)
    }
}

impl std::fmt::Debug for ScarcitySimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScarcitySimulator")
            .field("counter", &self.counter)
            .field("next_due", &self.next_due)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::PacingRng;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    /// Scripted source: yields a fixed list of values, then repeats the
    /// last one.
    struct ScriptedRandom {
        values: Vec<u64>,
        index: usize,
    }

    impl ScriptedRandom {
        fn new(values: Vec<u64>) -> Self {
            Self { values, index: 0 }
        }
    }

    impl RandomSource for ScriptedRandom {
        fn range_u64(&mut self, low: u64, high: u64) -> u64 {
            let v = self.values[self.index.min(self.values.len() - 1)];
            self.index += 1;
            v.clamp(low, high.saturating_sub(1).max(low))
        }

        fn range_f64(&mut self, low: f64, _high: f64) -> f64 {
            low
        }
    }

    #[test]
    fn counter_stops_at_floor() {
        let mut counter = ScarcityCounter::new(5, 2);
        assert_eq!(counter.tick(), Some(4));
        assert_eq!(counter.tick(), Some(3));
        assert_eq!(counter.tick(), Some(2));
        assert_eq!(counter.tick(), None);
        assert_eq!(counter.value(), 2);
        assert!(counter.is_at_floor());
    }

    #[test]
    fn floor_above_initial_clamps() {
        let counter = ScarcityCounter::new(3, 10);
        assert_eq!(counter.floor(), 3);
        assert!(counter.is_at_floor());
    }

    #[test]
    fn reset_returns_to_ceiling() {
        let mut counter = ScarcityCounter::new(5, 0);
        counter.tick();
        counter.tick();
        counter.reset();
        assert_eq!(counter.value(), 5);
    }

    #[test]
    fn simulator_fires_on_scripted_deadlines() {
        let rng = ScriptedRandom::new(vec![30, 20, 45]);
        let mut sim =
            ScarcitySimulator::new(ScarcityCounter::new(8, 2), 20, 50, Box::new(rng), t0());

        // First deadline at +30s.
        assert!(sim.pump(t0() + Duration::seconds(29)).is_none());
        let change = sim.pump(t0() + Duration::seconds(30)).unwrap();
        assert_eq!(change.remaining, 7);

        // Next at +30+20s.
        assert!(sim.pump(t0() + Duration::seconds(49)).is_none());
        let change = sim.pump(t0() + Duration::seconds(50)).unwrap();
        assert_eq!(change.remaining, 6);
    }

    #[test]
    fn simulator_goes_quiet_at_floor() {
        let rng = ScriptedRandom::new(vec![20]);
        let mut sim =
            ScarcitySimulator::new(ScarcityCounter::new(3, 2), 20, 50, Box::new(rng), t0());

        let change = sim.pump(t0() + Duration::seconds(20)).unwrap();
        assert_eq!(change.remaining, 2);
        assert!(sim.is_cancelled());
        assert!(sim.pump(t0() + Duration::hours(2)).is_none());
        assert_eq!(sim.counter().value(), 2);
    }

    #[test]
    fn cancel_stops_future_fires() {
        let rng = ScriptedRandom::new(vec![20]);
        let mut sim =
            ScarcitySimulator::new(ScarcityCounter::new(8, 0), 20, 50, Box::new(rng), t0());
        sim.cancel();
        assert!(sim.pump(t0() + Duration::hours(1)).is_none());
        assert_eq!(sim.counter().value(), 8);
    }

    #[test]
    fn seeded_rng_paces_within_configured_band() {
        let mut sim = ScarcitySimulator::new(
            ScarcityCounter::new(100, 0),
            20,
            50,
            Box::new(PacingRng::seeded(11)),
            t0(),
        );

        // Walk simulated time second by second and measure gaps between
        // decrements.
        let mut last_fire = t0();
        let mut gaps = Vec::new();
        for s in 1..3_000 {
            let now = t0() + Duration::seconds(s);
            if let Some(change) = sim.pump(now) {
                gaps.push((change.at - last_fire).num_seconds());
                last_fire = change.at;
            }
        }
        assert!(!gaps.is_empty());
        assert!(gaps.iter().all(|g| (20..50).contains(g)));
    }

    proptest! {
        #[test]
        fn counter_never_leaves_bounds(
            initial in 0u32..200,
            floor in 0u32..200,
            ticks in 0usize..500,
        ) {
            let mut counter = ScarcityCounter::new(initial, floor);
            let mut previous = counter.value();
            for _ in 0..ticks {
                counter.tick();
                let v = counter.value();
                prop_assert!(v >= counter.floor());
                prop_assert!(v <= counter.ceiling());
                prop_assert!(v <= previous);
                previous = v;
            }
        }
    }
}
