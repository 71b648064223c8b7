//! Scroll-depth / dwell-time trigger.
//!
//! Raises a single "show" event once the visitor has either stayed on the
//! page for a fixed delay or scrolled past a depth threshold, whichever
//! happens first. Depth observations are sampled rather than evaluated
//! per pixel; anything arriving inside the sample interval is dropped.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Which condition won the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngageCause {
    DwellElapsed,
    DepthReached,
}

/// The single engage event a trigger raises per page view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngageFired {
    pub cause: EngageCause,
    /// Depth at fire time; the dwell path reports the last sampled depth.
    pub depth_pct: f64,
    pub at: DateTime<Utc>,
}

/// One-shot engagement trigger for a single page view.
#[derive(Debug, Clone)]
pub struct ScrollDwellTrigger {
    started_at: DateTime<Utc>,
    fixed_delay: Duration,
    depth_threshold_pct: f64,
    sample_interval: Duration,
    last_sample_at: Option<DateTime<Utc>>,
    last_depth_pct: f64,
    fired: bool,
}

impl ScrollDwellTrigger {
    pub fn new(
        fixed_delay_secs: u64,
        depth_threshold_pct: f64,
        sample_interval_ms: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            started_at: now,
            fixed_delay: Duration::seconds(fixed_delay_secs as i64),
            depth_threshold_pct,
            sample_interval: Duration::milliseconds(sample_interval_ms as i64),
            last_sample_at: None,
            last_depth_pct: 0.0,
            fired: false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Offer a fresh depth measurement (percent, 0-100). Observations
    /// inside the sample interval are discarded unevaluated. Returns the
    /// engage event if this sample crosses the threshold first.
    pub fn observe_depth(&mut self, depth_pct: f64, now: DateTime<Utc>) -> Option<EngageFired> {
        if self.fired {
            return None;
        }
        if let Some(last) = self.last_sample_at {
            if now - last < self.sample_interval {
                return None;
            }
        }
        self.last_sample_at = Some(now);
        self.last_depth_pct = depth_pct;

        if depth_pct >= self.depth_threshold_pct {
            self.fired = true;
            return Some(EngageFired {
                cause: EngageCause::DepthReached,
                depth_pct,
                at: now,
            });
        }
        None
    }

    /// Check the dwell condition. Call on every host tick.
    pub fn pump(&mut self, now: DateTime<Utc>) -> Option<EngageFired> {
        if self.fired || now - self.started_at < self.fixed_delay {
            return None;
        }
        self.fired = true;
        Some(EngageFired {
            cause: EngageCause::DwellElapsed,
            depth_pct: self.last_depth_pct,
            at: now,
        })
    }
}
