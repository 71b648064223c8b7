//! # Nudgekit Core Library
//!
//! This library is the engagement-trigger and analytics engine behind a
//! promotional landing page: the logic that decides *when* to interrupt a
//! visitor with a surface (exit-intent modal, floating call-to-action,
//! countdown banner), *how often* a given visitor may be shown it, and
//! *what* gets recorded about each interaction. Rendering, copy, and the
//! analytics backend stay outside; hosts feed page signals in and draw
//! surfaces from the events that come back.
//!
//! ## Architecture
//!
//! - **Wall-clock state machines**: every engine is driven by the caller
//!   passing explicit instants to `pump()`/`tick()`; there are no internal
//!   threads or timers, so tests run on virtual time
//! - **Session scoping**: an [`EngagementSession`] is built once per page
//!   view and owns all per-view state; only the durable cooldown store
//!   outlives it
//! - **Fail-open persistence**: a broken store means "always eligible",
//!   a broken sink means "events dropped", never a crash
//! - **Storage**: SQLite-backed cooldown store and analytics archive,
//!   TOML-based configuration
//!
//! ## Key Components
//!
//! - [`EngagementSession`]: per-page-view umbrella object
//! - [`EngagementCoordinator`]: surface arbitration, one visible at a time
//! - [`FrequencyGate`]: per-trigger cooldown persistence and eligibility
//! - [`CountdownEngine`]: remaining-time snapshots toward a target instant
//! - [`TelemetryPipeline`]: session context plus interaction/conversion rows
//! - [`EngagementConfig`]: TOML configuration with dot-path get/set

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod countdown;
pub mod error;
pub mod events;
pub mod gate;
pub mod random;
pub mod scarcity;
pub mod scenario;
pub mod session;
pub mod signals;
pub mod storage;
pub mod surface;
pub mod telemetry;
pub mod triggers;
pub mod variants;
pub mod webhook;

pub use clock::{CancelHandle, TickScheduler};
pub use config::{ArbitrationPolicy, EngagementConfig, TriggerRule};
pub use coordinator::EngagementCoordinator;
pub use countdown::{CountdownEngine, CountdownSnapshot, CountdownSpec, CountdownUpdate};
pub use error::{ConfigError, CoreError, Result, SinkError, StoreError, WebhookError};
pub use events::{Event, SuppressReason};
pub use gate::{CooldownRecord, DismissScope, Eligibility, FrequencyGate};
pub use random::{PacingRng, RandomSource};
pub use scarcity::{ScarcityChange, ScarcityCounter, ScarcitySimulator};
pub use scenario::{ScenarioAction, ScenarioRun, ScenarioStep, SessionScenario};
pub use session::EngagementSession;
pub use signals::{PageSignal, QueuedSignals, SignalSource};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use surface::{SurfacePhase, SurfaceState, TriggerKey};
pub use telemetry::{
    AnalyticsSink, ConversionEvent, DeviceClass, HttpSink, InteractionEvent, InteractionType,
    MemorySink, PageMetrics, SessionContext, SqliteSink, TelemetryPipeline,
};
pub use triggers::{ExitCause, ExitIntentDetector, IntentFired, ScrollDwellTrigger};
pub use variants::{Variant, VariantAssigner};
pub use webhook::{FormRelay, RelayReceipt, SignupPayload};
