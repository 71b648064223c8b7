//! Per-page-view umbrella object.
//!
//! An [`EngagementSession`] is constructed once per page load and owns
//! every engine for that view: page metrics, the countdown, the scarcity
//! cadence, both trigger detectors, the coordinator with its frequency
//! gate, variant assignment, and the telemetry pipeline. Nothing here is
//! a singleton; two sessions never share mutable state except the durable
//! cooldown store handed in at construction.
//!
//! The host drives the session from outside: translate environment events
//! into [`PageSignal`]s (or register [`SignalSource`]s), call
//! [`pump`](EngagementSession::pump) on a timer, and forward visitor
//! actions like dismiss and click-through. Every method returns the
//! [`Event`]s it produced; the host renders from those. Telemetry happens
//! internally as a side effect and can never fail a transition.

use chrono::{DateTime, Duration, Utc};

use crate::clock::{CancelHandle, TickScheduler};
use crate::config::EngagementConfig;
use crate::coordinator::EngagementCoordinator;
use crate::countdown::{CountdownEngine, CountdownSnapshot, CountdownSpec};
use crate::events::Event;
use crate::gate::FrequencyGate;
use crate::random::PacingRng;
use crate::scarcity::{ScarcityCounter, ScarcitySimulator};
use crate::signals::{PageSignal, SignalSource};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::surface::TriggerKey;
use crate::telemetry::{
    AnalyticsSink, InteractionDraft, InteractionType, PageMetrics, SessionContext,
    TelemetryPipeline,
};
use crate::triggers::{ExitIntentDetector, ScrollDwellTrigger};
use crate::variants::{Variant, VariantAssigner, EXIT_OFFER_EXPERIMENT};

/// Scheduler tokens for the session's periodic work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionTick {
    Countdown,
}

/// Everything alive for one page view.
pub struct EngagementSession {
    config: EngagementConfig,
    metrics: PageMetrics,
    sources: Vec<Box<dyn SignalSource>>,
    scheduler: TickScheduler<SessionTick>,
    countdown: Option<CountdownEngine>,
    countdown_tick: Option<CancelHandle>,
    scarcity: ScarcitySimulator,
    exit_intent: ExitIntentDetector,
    scroll_dwell: ScrollDwellTrigger,
    coordinator: EngagementCoordinator,
    telemetry: TelemetryPipeline,
    variants: VariantAssigner,
    started: bool,
    ended: bool,
}

impl EngagementSession {
    /// Build a session over the given durable cooldown store and
    /// analytics sink. Session-scoped stores (dismissals, variant
    /// stickiness, cached context) are created fresh and die with the
    /// session, which is exactly their contract.
    pub fn new(
        config: EngagementConfig,
        durable: Box<dyn KeyValueStore>,
        sink: Box<dyn AnalyticsSink>,
        now: DateTime<Utc>,
    ) -> Self {
        let gate = FrequencyGate::new(durable, Box::new(MemoryStore::new()));
        let coordinator =
            EngagementCoordinator::new(config.triggers.clone(), config.coordinator.policy, gate);
        let telemetry = TelemetryPipeline::new(sink, Box::new(MemoryStore::new()));
        let variants = VariantAssigner::new(
            Box::new(MemoryStore::new()),
            config.variants.offer_rollout_pct,
        );
        let countdown = config
            .countdown
            .target
            .map(|target| CountdownEngine::new(CountdownSpec { target }));
        let scarcity = ScarcitySimulator::new(
            ScarcityCounter::new(config.scarcity.initial, config.scarcity.floor),
            config.scarcity.min_interval_secs,
            config.scarcity.max_interval_secs,
            Box::new(PacingRng::from_optional_seed(config.scarcity.seed)),
            now,
        );
        let exit_intent = ExitIntentDetector::new(config.exit_intent.min_dwell_secs, now);
        let scroll_dwell = ScrollDwellTrigger::new(
            config.scroll.fixed_delay_secs,
            config.scroll.depth_threshold_pct,
            config.scroll.sample_interval_ms,
            now,
        );
        Self {
            config,
            metrics: PageMetrics::new(now),
            sources: Vec::new(),
            scheduler: TickScheduler::new(),
            countdown,
            countdown_tick: None,
            scarcity,
            exit_intent,
            scroll_dwell,
            coordinator,
            telemetry,
            variants,
            started: false,
            ended: false,
        }
    }

    /// Fully in-memory session, mostly for tests and dry runs.
    pub fn in_memory(config: EngagementConfig, now: DateTime<Utc>) -> Self {
        Self::new(
            config,
            Box::new(MemoryStore::new()),
            Box::new(crate::telemetry::MemorySink::new()),
            now,
        )
    }

    /// Set the document referrer before the session starts.
    pub fn with_referrer(mut self, referrer: Option<String>) -> Self {
        self.metrics = self.metrics.clone().with_referrer(referrer);
        self
    }

    /// Register a signal source drained on every pump.
    pub fn add_source(&mut self, source: Box<dyn SignalSource>) {
        self.sources.push(source);
    }

    /// Begin the page view. Emits `SessionStarted` and, when a countdown
    /// target is configured, schedules the once-per-second tick and
    /// proposes the countdown banner. Idempotent.
    pub fn start(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        if self.started || self.ended {
            return Vec::new();
        }
        self.started = true;

        let context = self.telemetry.session_context(&self.metrics, now);
        let mut events = vec![Event::SessionStarted {
            session_id: context.session_id,
            at: now,
        }];
        if self.countdown.is_some() {
            self.countdown_tick =
                Some(self.scheduler.every(Duration::seconds(1), SessionTick::Countdown, now));
            events.extend(self.coordinator.offer(TriggerKey::CountdownBanner, now));
        }
        self.record(&events, now);
        events
    }

    /// Feed one signal immediately, outside the pump cadence.
    pub fn handle_signal(&mut self, signal: &PageSignal, now: DateTime<Utc>) -> Vec<Event> {
        self.handle_signals(std::slice::from_ref(signal), now)
    }

    /// Feed a batch of signals observed at the same instant.
    ///
    /// Trigger firings inside one batch resolve in a fixed priority
    /// order: exit intent is offered to the coordinator before the
    /// scroll/dwell trigger, whatever order the raw signals arrived in.
    pub fn handle_signals(&mut self, signals: &[PageSignal], now: DateTime<Utc>) -> Vec<Event> {
        if self.ended {
            return Vec::new();
        }
        let mut events = Vec::new();
        self.process_signals(signals, now, &mut events);
        self.record(&events, now);
        events
    }

    /// Advance wall-clock driven work to `now`: drains signal sources,
    /// fires due countdown ticks, paces the scarcity counter, and lets
    /// the dwell-based triggers arm or fire.
    pub fn pump(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        if self.ended {
            return Vec::new();
        }
        let mut events = Vec::new();

        let mut batch = Vec::new();
        for source in &mut self.sources {
            batch.extend(source.poll());
        }
        self.process_signals(&batch, now, &mut events);

        for token in self.scheduler.due(now) {
            match token {
                SessionTick::Countdown => self.tick_countdown(now, &mut events),
            }
        }

        if let Some(change) = self.scarcity.pump(now) {
            events.push(Event::ScarcityChanged {
                remaining: change.remaining,
                at: change.at,
            });
        }

        self.exit_intent.pump(now);
        if let Some(fired) = self.scroll_dwell.pump(now) {
            events.push(Event::EngageTriggerFired {
                cause: fired.cause,
                depth_pct: fired.depth_pct,
                at: fired.at,
            });
            events.extend(self.coordinator.offer(TriggerKey::FloatingCta, now));
        }

        self.record(&events, now);
        events
    }

    /// Visitor dismissed the surface.
    pub fn dismiss(&mut self, key: TriggerKey, now: DateTime<Utc>) -> Vec<Event> {
        let events = self.coordinator.dismiss(key, now);
        self.record(&events, now);
        events
    }

    /// Visitor followed the surface's call to action.
    pub fn click_through(&mut self, key: TriggerKey, now: DateTime<Utc>) -> Vec<Event> {
        let events = self.coordinator.click_through(key, now);
        self.record(&events, now);
        events
    }

    /// Visitor completed the surface's goal (signup, purchase intent).
    pub fn convert(&mut self, key: TriggerKey, now: DateTime<Utc>) -> Vec<Event> {
        let events = self.coordinator.convert(key, now);
        self.record(&events, now);
        events
    }

    /// Visitor expanded or collapsed a surface's detail section.
    pub fn toggle_expanded(&mut self, key: TriggerKey, now: DateTime<Utc>) -> Vec<Event> {
        let events = self.coordinator.toggle_expanded(key, now);
        self.record(&events, now);
        events
    }

    /// Record a conversion that did not come from a surface, like the
    /// main signup form.
    pub fn record_conversion(&mut self, conversion_type: &str, now: DateTime<Utc>) {
        self.telemetry.track_conversion(conversion_type, &self.metrics, now);
    }

    /// Tear the page view down: cancels the countdown tick and the
    /// scarcity cadence so nothing periodic outlives the page. Idempotent.
    pub fn end(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        if self.ended {
            return Vec::new();
        }
        self.ended = true;
        self.scheduler.clear();
        self.countdown_tick = None;
        self.scarcity.cancel();
        vec![Event::SessionEnded {
            dwell_secs: self.metrics.dwell_secs(now),
            at: now,
        }]
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    pub fn coordinator(&self) -> &EngagementCoordinator {
        &self.coordinator
    }

    pub fn metrics(&self) -> &PageMetrics {
        &self.metrics
    }

    /// Resolve (or create) the session context.
    pub fn context(&mut self, now: DateTime<Utc>) -> SessionContext {
        self.telemetry.session_context(&self.metrics, now)
    }

    /// Remaining time, without advancing the engine.
    pub fn countdown_snapshot(&self, now: DateTime<Utc>) -> Option<CountdownSnapshot> {
        self.countdown.as_ref().map(|engine| engine.peek(now))
    }

    /// Current cosmetic "spots remaining" value.
    pub fn spots_remaining(&self) -> u32 {
        self.scarcity.counter().value()
    }

    fn process_signals(
        &mut self,
        signals: &[PageSignal],
        now: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) {
        let mut exit_fire = None;
        let mut engage_fire = None;
        for signal in signals {
            self.metrics.apply(signal);
            if exit_fire.is_none() {
                exit_fire = self.exit_intent.observe(signal, now);
            }
            if engage_fire.is_none() {
                if let PageSignal::Scrolled { .. } = signal {
                    engage_fire = self
                        .scroll_dwell
                        .observe_depth(self.metrics.scroll_depth_pct(), now);
                }
            }
        }

        // Exit intent preempts the scroll trigger when both fire in the
        // same batch.
        if let Some(fired) = exit_fire {
            events.push(Event::ExitIntentFired {
                cause: fired.cause,
                at: fired.at,
            });
            let key = self.exit_surface(now);
            events.extend(self.coordinator.offer(key, now));
        }
        if let Some(fired) = engage_fire {
            events.push(Event::EngageTriggerFired {
                cause: fired.cause,
                depth_pct: fired.depth_pct,
                at: fired.at,
            });
            events.extend(self.coordinator.offer(TriggerKey::FloatingCta, now));
        }
    }

    /// Which surface an exit-intent fire proposes, per the sticky
    /// variant assignment for this session.
    fn exit_surface(&mut self, now: DateTime<Utc>) -> TriggerKey {
        let session_id = self.telemetry.session_context(&self.metrics, now).session_id;
        match self.variants.assign(EXIT_OFFER_EXPERIMENT, &session_id) {
            Variant::Offer => TriggerKey::ExitIntentOffer,
            Variant::Control => TriggerKey::ExitIntentModal,
        }
    }

    fn tick_countdown(&mut self, now: DateTime<Utc>, events: &mut Vec<Event>) {
        let Some(engine) = self.countdown.as_mut() else {
            return;
        };
        let Some(update) = engine.tick(now) else {
            return;
        };
        events.push(Event::CountdownTick {
            snapshot: update.snapshot,
            at: now,
        });
        if update.completed {
            events.push(Event::CountdownCompleted { at: now });
            if let Some(handle) = self.countdown_tick.take() {
                self.scheduler.cancel(handle);
            }
        }
    }

    /// Forward surface transitions to the telemetry pipeline. Sink
    /// failures are swallowed inside the pipeline, so recording can
    /// never undo or delay a transition.
    fn record(&mut self, events: &[Event], now: DateTime<Utc>) {
        for event in events {
            let draft = match event {
                Event::SurfaceShown { trigger_key, .. } => Some(self.view_draft(*trigger_key)),
                Event::SurfaceExpanded {
                    trigger_key,
                    expanded: true,
                    ..
                } => Some(InteractionDraft::new(*trigger_key, InteractionType::Expand)),
                Event::SurfaceDismissed { trigger_key, .. } => {
                    Some(InteractionDraft::new(*trigger_key, InteractionType::Dismiss))
                }
                Event::SurfaceClicked { trigger_key, .. } => {
                    Some(InteractionDraft::new(*trigger_key, InteractionType::ClickCta))
                }
                Event::SurfaceConverted { trigger_key, .. } => {
                    Some(InteractionDraft::new(*trigger_key, InteractionType::Conversion))
                }
                _ => None,
            };
            if let Some(draft) = draft {
                self.telemetry.track(draft, &self.metrics, now);
            }
            if let Event::SurfaceConverted { trigger_key, .. } = event {
                self.telemetry
                    .track_conversion(trigger_key.as_str(), &self.metrics, now);
            }
        }
    }

    fn view_draft(&mut self, key: TriggerKey) -> InteractionDraft {
        let draft = InteractionDraft::new(key, InteractionType::View);
        match key {
            TriggerKey::ExitIntentModal | TriggerKey::ExitIntentOffer => {
                match self.variants.assigned(EXIT_OFFER_EXPERIMENT) {
                    Some(variant) => draft.with_extra(
                        "variant",
                        serde_json::Value::String(variant.as_str().to_string()),
                    ),
                    None => draft,
                }
            }
            _ => draft,
        }
    }
}

impl std::fmt::Debug for EngagementSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngagementSession")
            .field("started", &self.started)
            .field("ended", &self.ended)
            .field("visible", &self.coordinator.visible_surface())
            .field("spots_remaining", &self.spots_remaining())
            .finish_non_exhaustive()
    }
}
