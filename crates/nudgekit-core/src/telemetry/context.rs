//! Session context and page measurement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signals::PageSignal;

/// Coarse device banding from viewport width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
    Unknown,
}

impl DeviceClass {
    /// Band a viewport width: under 768 is mobile, under 1024 tablet,
    /// anything wider desktop. No measurement yet reads unknown.
    pub fn from_viewport_width(width: Option<u32>) -> Self {
        match width {
            None => DeviceClass::Unknown,
            Some(w) if w < 768 => DeviceClass::Mobile,
            Some(w) if w < 1024 => DeviceClass::Tablet,
            Some(_) => DeviceClass::Desktop,
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
            DeviceClass::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Identity of one browsing session. Created lazily on the first
/// telemetry call, cached in the session store, and never mutated after
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub session_id: String,
    pub session_started_at: DateTime<Utc>,
    pub device_class: DeviceClass,
}

/// Live page measurements, folded from page signals as they arrive.
///
/// The telemetry pipeline reads dwell and scroll depth from here at the
/// moment of each event; the scroll trigger reads depth the same way.
#[derive(Debug, Clone, PartialEq)]
pub struct PageMetrics {
    navigation_started_at: DateTime<Utc>,
    scroll_y: f64,
    viewport_width: Option<u32>,
    viewport_height: u32,
    document_height: u32,
    referrer: Option<String>,
}

impl PageMetrics {
    /// Metrics for a page that started navigating at `now`. Dimensions
    /// arrive via the first resize signals.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            navigation_started_at: now,
            scroll_y: 0.0,
            viewport_width: None,
            viewport_height: 0,
            document_height: 0,
            referrer: None,
        }
    }

    pub fn with_referrer(mut self, referrer: Option<String>) -> Self {
        self.referrer = referrer;
        self
    }

    /// Fold one signal into the current measurements.
    pub fn apply(&mut self, signal: &PageSignal) {
        match signal {
            PageSignal::Scrolled { scroll_y } => self.scroll_y = *scroll_y,
            PageSignal::ViewportResized { width, height } => {
                self.viewport_width = Some(*width);
                self.viewport_height = *height;
            }
            PageSignal::DocumentResized { height } => self.document_height = *height,
            _ => {}
        }
    }

    pub fn navigation_started_at(&self) -> DateTime<Utc> {
        self.navigation_started_at
    }

    pub fn viewport_width(&self) -> Option<u32> {
        self.viewport_width
    }

    /// Whole seconds since navigation start.
    pub fn dwell_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.navigation_started_at).num_seconds().max(0) as u64
    }

    /// Scroll position over scrollable height, as a percentage clamped
    /// to [0, 100]. A document no taller than the viewport reads 0.
    pub fn scroll_depth_pct(&self) -> f64 {
        let scrollable = self.document_height.saturating_sub(self.viewport_height);
        if scrollable == 0 {
            return 0.0;
        }
        (self.scroll_y / scrollable as f64 * 100.0).clamp(0.0, 100.0)
    }

    pub fn device_class(&self) -> DeviceClass {
        DeviceClass::from_viewport_width(self.viewport_width)
    }

    /// The document referrer, or `"direct"` when there was none.
    pub fn referrer_or_direct(&self) -> String {
        match &self.referrer {
            Some(r) if !r.is_empty() => r.clone(),
            _ => "direct".to_string(),
        }
    }
}
