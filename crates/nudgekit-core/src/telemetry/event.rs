//! Analytics record types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::surface::TriggerKey;
use crate::telemetry::context::DeviceClass;

/// What the visitor did with a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    View,
    Expand,
    Dismiss,
    ClickCta,
    Conversion,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::View => "view",
            InteractionType::Expand => "expand",
            InteractionType::Dismiss => "dismiss",
            InteractionType::ClickCta => "click_cta",
            InteractionType::Conversion => "conversion",
        }
    }
}

/// The caller-supplied part of an interaction. The pipeline fills in
/// everything measured (session, dwell, depth, device, referrer).
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionDraft {
    pub trigger_key: TriggerKey,
    pub interaction_type: InteractionType,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl InteractionDraft {
    pub fn new(trigger_key: TriggerKey, interaction_type: InteractionType) -> Self {
        Self {
            trigger_key,
            interaction_type,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// One fully-resolved interaction record. Immutable once constructed;
/// written exactly once to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub session_id: String,
    pub trigger_key: TriggerKey,
    pub interaction_type: InteractionType,
    pub dwell_seconds: u64,
    pub scroll_depth_pct: f64,
    pub device_class: DeviceClass,
    pub referrer: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
    pub recorded_at: DateTime<Utc>,
}

/// A conversion with its latency from session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionEvent {
    pub session_id: String,
    pub conversion_type: String,
    pub time_to_conversion_seconds: u64,
    pub recorded_at: DateTime<Utc>,
}
