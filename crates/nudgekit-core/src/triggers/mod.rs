//! Condition detectors that decide a surface *could* be shown.
//!
//! Detectors never show anything themselves; they raise one-shot events
//! the coordinator arbitrates. Each one is fed wall-clock instants and
//! page signals by the host and holds no timers of its own.

pub mod exit_intent;
pub mod scroll_dwell;

pub use exit_intent::{DetectorState, ExitCause, ExitIntentDetector, IntentFired};
pub use scroll_dwell::{EngageCause, EngageFired, ScrollDwellTrigger};
