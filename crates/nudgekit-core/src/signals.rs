//! Page-level input signals.
//!
//! The engine never touches a real browser. Whatever hosts it (a WASM
//! shell, a test, the CLI scenario runner) translates its environment into
//! [`PageSignal`] values and feeds them to
//! [`EngagementSession::handle_signal`](crate::session::EngagementSession::handle_signal),
//! or exposes them through a [`SignalSource`] drained on every pump.

use serde::{Deserialize, Serialize};

/// One observation from the hosting page.
///
/// Coordinates follow the browser convention: `y` is pixels below the
/// viewport's top edge, so a pointer leaving through the top reports
/// `y <= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageSignal {
    /// Pointer moved inside the page.
    PointerMoved { y: f64 },
    /// Pointer left the page; `y` is the exit coordinate.
    PointerLeft { y: f64 },
    /// Tab visibility flipped (hidden covers tab-switch and mobile
    /// back-navigation, which produce no pointer-leave).
    VisibilityChanged { hidden: bool },
    /// Vertical scroll position changed, in pixels from the top.
    Scrolled { scroll_y: f64 },
    /// Viewport dimensions changed (also delivered once on page load).
    ViewportResized { width: u32, height: u32 },
    /// Total document height changed (lazy content, embeds loading).
    DocumentResized { height: u32 },
}

/// A pollable producer of page signals.
///
/// Hosts register sources on the session; `poll` is called once per pump and
/// returns whatever accumulated since the previous call. Implementations
/// must not block.
pub trait SignalSource {
    fn poll(&mut self) -> Vec<PageSignal>;
}

/// Fixed list of signals, handed out once. Scenario replay and tests use
/// this in place of a live event feed.
#[derive(Debug, Default)]
pub struct QueuedSignals {
    pending: Vec<PageSignal>,
}

impl QueuedSignals {
    pub fn new(signals: Vec<PageSignal>) -> Self {
        Self { pending: signals }
    }

    pub fn push(&mut self, signal: PageSignal) {
        self.pending.push(signal);
    }
}

impl SignalSource for QueuedSignals {
    fn poll(&mut self) -> Vec<PageSignal> {
        std::mem::take(&mut self.pending)
    }
}
