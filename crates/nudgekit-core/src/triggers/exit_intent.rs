//! Exit-intent detection.
//!
//! Watches for the visitor starting to leave: the pointer crossing above
//! the viewport's top edge (heading for the tab bar) or the page going
//! hidden (tab switch, mobile back-navigation, which have no pointer
//! signal at all). Firing is gated behind a minimum dwell so a visitor
//! who bounces within seconds is not chased with an offer.
//!
//! # State machine
//!
//! ```text
//!              dwell >= min_dwell          qualifying signal
//!  Inactive ─────────────────────► Armed ─────────────────► Fired
//!                                                        (terminal)
//! ```
//!
//! `Fired` is terminal for the page lifetime: the intent event is raised
//! exactly once, and every later qualifying signal is suppressed. Only a
//! full page (re)load builds a fresh detector. That holds even when the
//! frequency gate ends up suppressing the surface -- the detector has
//! still fired and must not raise again.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::signals::PageSignal;

/// What convinced the detector the visitor is leaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCause {
    /// Pointer crossed above the viewport top edge.
    PointerTopEdge,
    /// Page visibility flipped to hidden.
    TabHidden,
}

/// Detector lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorState {
    Inactive,
    Armed,
    Fired,
}

/// The single intent event a detector raises per page view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentFired {
    pub cause: ExitCause,
    pub at: DateTime<Utc>,
}

/// One-shot leave-intent detector for a single page view.
#[derive(Debug, Clone)]
pub struct ExitIntentDetector {
    state: DetectorState,
    started_at: DateTime<Utc>,
    min_dwell: Duration,
}

impl ExitIntentDetector {
    /// Detector for a page loaded at `now`, arming after
    /// `min_dwell_secs` of dwell.
    pub fn new(min_dwell_secs: u64, now: DateTime<Utc>) -> Self {
        Self {
            state: DetectorState::Inactive,
            started_at: now,
            min_dwell: Duration::seconds(min_dwell_secs as i64),
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn has_fired(&self) -> bool {
        self.state == DetectorState::Fired
    }

    /// Advance time-based arming. Safe to call on every host tick.
    pub fn pump(&mut self, now: DateTime<Utc>) {
        if self.state == DetectorState::Inactive && now - self.started_at >= self.min_dwell {
            self.state = DetectorState::Armed;
        }
    }

    /// Feed one page signal. Returns the intent event on the single
    /// `Armed -> Fired` edge and `None` in every other case.
    pub fn observe(&mut self, signal: &PageSignal, now: DateTime<Utc>) -> Option<IntentFired> {
        // A qualifying signal that arrives after the dwell window must
        // count even if no pump ran in between.
        self.pump(now);
        if self.state != DetectorState::Armed {
            return None;
        }
        let cause = qualifying_cause(signal)?;
        self.state = DetectorState::Fired;
        Some(IntentFired { cause, at: now })
    }
}

fn qualifying_cause(signal: &PageSignal) -> Option<ExitCause> {
    match signal {
        PageSignal::PointerMoved { y } | PageSignal::PointerLeft { y } if *y <= 0.0 => {
            Some(ExitCause::PointerTopEdge)
        }
        PageSignal::VisibilityChanged { hidden: true } => Some(ExitCause::TabHidden),
        _ => None,
    }
}
