//! Interaction and conversion recording.
//!
//! Everything here is fire-and-forget from the page's point of view: the
//! pipeline resolves a session context, fills in the measurements taken
//! at the moment of the event (dwell, scroll depth, device class,
//! referrer), and hands the finished record to a sink. A sink that is
//! down costs the record, never the page.

pub mod context;
pub mod event;
pub mod sink;

pub use context::{DeviceClass, PageMetrics, SessionContext};
pub use event::{ConversionEvent, InteractionDraft, InteractionEvent, InteractionType};
pub use sink::{
    AnalyticsSink, FunnelSummary, HttpSink, MemorySink, SharedMemorySink, SqliteSink,
    TriggerFunnelRow,
};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::storage::KeyValueStore;

/// Session-store key the resolved context is cached under.
const SESSION_CONTEXT_KEY: &str = "session.context";

/// Turns caller drafts into fully-resolved analytics records.
pub struct TelemetryPipeline {
    sink: Box<dyn AnalyticsSink>,
    session_store: Box<dyn KeyValueStore>,
    context: Option<SessionContext>,
}

impl TelemetryPipeline {
    pub fn new(sink: Box<dyn AnalyticsSink>, session_store: Box<dyn KeyValueStore>) -> Self {
        Self {
            sink,
            session_store,
            context: None,
        }
    }

    /// Resolve the session context, creating and caching it on first
    /// call. Idempotent for the life of the tab session: later calls and
    /// reloads within the session see the same id.
    pub fn session_context(&mut self, metrics: &PageMetrics, now: DateTime<Utc>) -> SessionContext {
        if let Some(ctx) = &self.context {
            return ctx.clone();
        }
        match self.session_store.get(SESSION_CONTEXT_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<SessionContext>(&raw) {
                Ok(ctx) => {
                    self.context = Some(ctx.clone());
                    return ctx;
                }
                Err(e) => warn!("malformed cached session context, recreating: {e}"),
            },
            Ok(None) => {}
            Err(e) => warn!("session store unreadable, creating fresh context: {e}"),
        }

        let ctx = SessionContext {
            session_id: uuid::Uuid::new_v4().to_string(),
            session_started_at: now,
            device_class: metrics.device_class(),
        };
        match serde_json::to_string(&ctx) {
            Ok(raw) => {
                if let Err(e) = self.session_store.set(SESSION_CONTEXT_KEY, &raw) {
                    warn!("failed to cache session context: {e}");
                }
            }
            Err(e) => warn!("failed to encode session context: {e}"),
        }
        self.context = Some(ctx.clone());
        ctx
    }

    /// Record one interaction. Never fails from the caller's point of
    /// view; sink errors are logged and the record is dropped.
    pub fn track(&mut self, draft: InteractionDraft, metrics: &PageMetrics, now: DateTime<Utc>) {
        let ctx = self.session_context(metrics, now);
        let event = InteractionEvent {
            session_id: ctx.session_id,
            trigger_key: draft.trigger_key,
            interaction_type: draft.interaction_type,
            dwell_seconds: metrics.dwell_secs(now),
            scroll_depth_pct: metrics.scroll_depth_pct(),
            device_class: ctx.device_class,
            referrer: metrics.referrer_or_direct(),
            extra: draft.extra,
            recorded_at: now,
        };
        if let Err(e) = self.sink.insert_interaction(&event) {
            warn!(
                "{} interaction on {} dropped: {e}",
                event.interaction_type.as_str(),
                event.trigger_key
            );
        }
    }

    /// Record a conversion with its latency from session start.
    pub fn track_conversion(
        &mut self,
        conversion_type: &str,
        metrics: &PageMetrics,
        now: DateTime<Utc>,
    ) {
        let ctx = self.session_context(metrics, now);
        let elapsed = (now - ctx.session_started_at).num_seconds().max(0) as u64;
        let event = ConversionEvent {
            session_id: ctx.session_id,
            conversion_type: conversion_type.to_string(),
            time_to_conversion_seconds: elapsed,
            recorded_at: now,
        };
        if let Err(e) = self.sink.insert_conversion(&event) {
            warn!("conversion '{conversion_type}' dropped: {e}");
        }
    }
}

impl std::fmt::Debug for TelemetryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryPipeline")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
