use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::countdown::CountdownSnapshot;
use crate::gate::DismissScope;
use crate::surface::TriggerKey;
use crate::triggers::{EngageCause, ExitCause};

/// Every observable state change in a page session produces an Event.
/// The host renders from them; the telemetry pipeline records a subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        session_id: String,
        at: DateTime<Utc>,
    },
    CountdownTick {
        snapshot: CountdownSnapshot,
        at: DateTime<Utc>,
    },
    /// Emitted exactly once, alongside the final all-zero snapshot.
    CountdownCompleted {
        at: DateTime<Utc>,
    },
    ScarcityChanged {
        remaining: u32,
        at: DateTime<Utc>,
    },
    /// The exit-intent detector fired (at most once per page view).
    ExitIntentFired {
        cause: ExitCause,
        at: DateTime<Utc>,
    },
    /// The scroll/dwell trigger fired (at most once per page view).
    EngageTriggerFired {
        cause: EngageCause,
        depth_pct: f64,
        at: DateTime<Utc>,
    },
    /// A trigger fired while another surface was visible; it waits its
    /// turn under the queueing policy.
    SurfaceQueued {
        trigger_key: TriggerKey,
        at: DateTime<Utc>,
    },
    SurfaceShown {
        trigger_key: TriggerKey,
        at: DateTime<Utc>,
    },
    /// A trigger fired but no surface was shown, with the reason.
    SurfaceSuppressed {
        trigger_key: TriggerKey,
        reason: SuppressReason,
        at: DateTime<Utc>,
    },
    SurfaceDismissed {
        trigger_key: TriggerKey,
        scope: DismissScope,
        at: DateTime<Utc>,
    },
    SurfaceClicked {
        trigger_key: TriggerKey,
        at: DateTime<Utc>,
    },
    SurfaceConverted {
        trigger_key: TriggerKey,
        at: DateTime<Utc>,
    },
    /// Inline detail expanded or collapsed on a visible surface.
    SurfaceExpanded {
        trigger_key: TriggerKey,
        expanded: bool,
        at: DateTime<Utc>,
    },
    SessionEnded {
        dwell_secs: u64,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::SessionStarted { at, .. }
            | Event::CountdownTick { at, .. }
            | Event::CountdownCompleted { at }
            | Event::ScarcityChanged { at, .. }
            | Event::ExitIntentFired { at, .. }
            | Event::EngageTriggerFired { at, .. }
            | Event::SurfaceQueued { at, .. }
            | Event::SurfaceShown { at, .. }
            | Event::SurfaceSuppressed { at, .. }
            | Event::SurfaceDismissed { at, .. }
            | Event::SurfaceClicked { at, .. }
            | Event::SurfaceConverted { at, .. }
            | Event::SurfaceExpanded { at, .. }
            | Event::SessionEnded { at, .. } => *at,
        }
    }
}

/// Why a fired trigger did not produce a visible surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    /// Cooldown window from a previous show is still running.
    CooldownActive,
    /// Visitor dismissed this surface earlier in the tab session.
    DismissedThisSession,
    /// Surface disabled by configuration.
    Disabled,
    /// Surface already reached a terminal phase this page view.
    AlreadyResolved,
    /// Another surface was visible and the drop policy discarded this one.
    SurfaceBusy,
}
