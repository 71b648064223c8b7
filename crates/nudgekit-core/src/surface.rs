use serde::{Deserialize, Serialize};

/// Identifies one interruptive surface type. Used as the partition key for
/// cooldown state, so the wire name of each variant must stay stable across
/// deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKey {
    ExitIntentModal,
    ExitIntentOffer,
    FloatingCta,
    CountdownBanner,
}

impl TriggerKey {
    /// All known keys, in arbitration priority order (highest first).
    /// Exit-intent surfaces preempt everything else; the floating CTA is
    /// the least interruptive and goes last.
    pub const ALL: [TriggerKey; 4] = [
        TriggerKey::ExitIntentModal,
        TriggerKey::ExitIntentOffer,
        TriggerKey::CountdownBanner,
        TriggerKey::FloatingCta,
    ];

    /// Stable storage/wire name (`exitIntentModal`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerKey::ExitIntentModal => "exitIntentModal",
            TriggerKey::ExitIntentOffer => "exitIntentOffer",
            TriggerKey::FloatingCta => "floatingCta",
            TriggerKey::CountdownBanner => "countdownBanner",
        }
    }

    /// Parse a stable name back into a key.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Lower value wins arbitration when several triggers fire in the
    /// same pump tick.
    pub fn priority(self) -> u8 {
        match self {
            TriggerKey::ExitIntentModal => 0,
            TriggerKey::ExitIntentOffer => 1,
            TriggerKey::CountdownBanner => 2,
            TriggerKey::FloatingCta => 3,
        }
    }
}

impl std::fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase of one surface within a page view.
///
/// ```text
/// Idle -> Armed -> Visible -> (Dismissed | ClickedThrough | Converted)
/// ```
///
/// The three right-hand phases are terminal for the page view. There is no
/// `Visible -> Idle` edge: a visible surface leaves the screen only through
/// an explicit user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfacePhase {
    Idle,
    /// Trigger fired and the gate allowed it, but another surface holds
    /// the screen; waiting in the arbitration queue.
    Armed,
    Visible,
    Dismissed,
    ClickedThrough,
    Converted,
}

impl SurfacePhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SurfacePhase::Dismissed | SurfacePhase::ClickedThrough | SurfacePhase::Converted
        )
    }
}

/// Per-surface state machine instance. Created when a page mounts,
/// discarded on navigation away.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceState {
    pub trigger_key: TriggerKey,
    pub phase: SurfacePhase,
    /// Whether the user expanded the surface's detail section.
    pub expanded_detail: bool,
}

impl SurfaceState {
    pub fn new(trigger_key: TriggerKey) -> Self {
        Self {
            trigger_key,
            phase: SurfacePhase::Idle,
            expanded_detail: false,
        }
    }
}
