//! Analytics sinks.
//!
//! The pipeline writes interaction and conversion records through the
//! [`AnalyticsSink`] trait. Three backings: an in-memory buffer for tests
//! and replays, a local SQLite archive with funnel rollups, and an HTTP
//! sink that hands records to a background task so the caller never waits
//! on the network. Every sink is allowed to be broken; callers log the
//! error and drop the record.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;
use url::Url;

use crate::error::SinkError;
use crate::telemetry::event::{ConversionEvent, InteractionEvent, InteractionType};

/// Destination for analytics records. Both inserts must return quickly;
/// a sink that talks to the network does so out-of-band.
pub trait AnalyticsSink: Send {
    fn insert_interaction(&mut self, event: &InteractionEvent) -> Result<(), SinkError>;
    fn insert_conversion(&mut self, event: &ConversionEvent) -> Result<(), SinkError>;
}

/// Buffering sink for tests and scripted replays.
#[derive(Debug, Default)]
pub struct MemorySink {
    interactions: Vec<InteractionEvent>,
    conversions: Vec<ConversionEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interactions(&self) -> &[InteractionEvent] {
        &self.interactions
    }

    pub fn conversions(&self) -> &[ConversionEvent] {
        &self.conversions
    }
}

impl AnalyticsSink for MemorySink {
    fn insert_interaction(&mut self, event: &InteractionEvent) -> Result<(), SinkError> {
        self.interactions.push(event.clone());
        Ok(())
    }

    fn insert_conversion(&mut self, event: &ConversionEvent) -> Result<(), SinkError> {
        self.conversions.push(event.clone());
        Ok(())
    }
}

/// Cloneable handle over a [`MemorySink`].
///
/// The pipeline takes ownership of its sink, so a caller that wants to
/// inspect what was recorded (tests, scripted replays) keeps one clone
/// and hands the other in.
#[derive(Debug, Clone, Default)]
pub struct SharedMemorySink {
    inner: std::sync::Arc<std::sync::Mutex<MemorySink>>,
}

impl SharedMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interactions(&self) -> Vec<InteractionEvent> {
        self.lock().interactions.clone()
    }

    pub fn conversions(&self) -> Vec<ConversionEvent> {
        self.lock().conversions.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemorySink> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl AnalyticsSink for SharedMemorySink {
    fn insert_interaction(&mut self, event: &InteractionEvent) -> Result<(), SinkError> {
        self.lock().insert_interaction(event)
    }

    fn insert_conversion(&mut self, event: &ConversionEvent) -> Result<(), SinkError> {
        self.lock().insert_conversion(event)
    }
}

/// Funnel rollup across everything a [`SqliteSink`] has recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelSummary {
    pub views: u64,
    pub expands: u64,
    pub dismissals: u64,
    pub cta_clicks: u64,
    pub conversions: u64,
    pub distinct_sessions: u64,
}

/// Per-trigger slice of the funnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerFunnelRow {
    pub trigger_key: String,
    pub views: u64,
    pub dismissals: u64,
    pub cta_clicks: u64,
}

/// Local SQLite archive of interactions and conversions.
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| SinkError::Unreachable(format!("open {}: {e}", path.display())))?;
        let sink = Self { conn };
        sink.migrate()?;
        Ok(sink)
    }

    /// Archive under `~/.config/nudgekit/telemetry.db`.
    pub fn open_default() -> Result<Self, SinkError> {
        let dir = crate::storage::data_dir()
            .map_err(|e| SinkError::Unreachable(format!("data dir: {e}")))?;
        Self::open(dir.join("telemetry.db"))
    }

    pub fn open_memory() -> Result<Self, SinkError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SinkError::Unreachable(format!("open :memory:: {e}")))?;
        let sink = Self { conn };
        sink.migrate()?;
        Ok(sink)
    }

    fn migrate(&self) -> Result<(), SinkError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS interactions (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id       TEXT NOT NULL,
                trigger_key      TEXT NOT NULL,
                interaction_type TEXT NOT NULL,
                dwell_seconds    INTEGER NOT NULL,
                scroll_depth_pct REAL NOT NULL,
                device_class     TEXT NOT NULL,
                referrer         TEXT NOT NULL,
                extra            TEXT NOT NULL DEFAULT '{}',
                recorded_at      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS conversions (
                id                         INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id                 TEXT NOT NULL,
                conversion_type            TEXT NOT NULL,
                time_to_conversion_seconds INTEGER NOT NULL,
                recorded_at                TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_interactions_session ON interactions(session_id);
            CREATE INDEX IF NOT EXISTS idx_interactions_trigger_type
                ON interactions(trigger_key, interaction_type);",
        )?;
        Ok(())
    }

    pub fn funnel_summary(&self) -> Result<FunnelSummary, SinkError> {
        let mut summary = FunnelSummary::default();

        let mut stmt = self.conn.prepare(
            "SELECT interaction_type, COUNT(*) FROM interactions GROUP BY interaction_type",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;
        for row in rows {
            let (kind, count) = row?;
            match kind.as_str() {
                "view" => summary.views = count,
                "expand" => summary.expands = count,
                "dismiss" => summary.dismissals = count,
                "click_cta" => summary.cta_clicks = count,
                _ => {}
            }
        }

        summary.conversions = self
            .conn
            .query_row("SELECT COUNT(*) FROM conversions", [], |row| row.get(0))?;
        summary.distinct_sessions = self.conn.query_row(
            "SELECT COUNT(DISTINCT session_id) FROM interactions",
            [],
            |row| row.get(0),
        )?;
        Ok(summary)
    }

    pub fn funnel_by_trigger(&self) -> Result<Vec<TriggerFunnelRow>, SinkError> {
        let mut stmt = self.conn.prepare(
            "SELECT trigger_key,
                    SUM(CASE WHEN interaction_type = 'view' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN interaction_type = 'dismiss' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN interaction_type = 'click_cta' THEN 1 ELSE 0 END)
             FROM interactions
             GROUP BY trigger_key
             ORDER BY trigger_key",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TriggerFunnelRow {
                trigger_key: row.get(0)?,
                views: row.get(1)?,
                dismissals: row.get(2)?,
                cta_clicks: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl AnalyticsSink for SqliteSink {
    fn insert_interaction(&mut self, event: &InteractionEvent) -> Result<(), SinkError> {
        let extra = serde_json::to_string(&event.extra)
            .map_err(|e| SinkError::InsertFailed(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO interactions
                (session_id, trigger_key, interaction_type, dwell_seconds,
                 scroll_depth_pct, device_class, referrer, extra, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                event.session_id,
                event.trigger_key.as_str(),
                event.interaction_type.as_str(),
                event.dwell_seconds,
                event.scroll_depth_pct,
                event.device_class.to_string(),
                event.referrer,
                extra,
                event.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn insert_conversion(&mut self, event: &ConversionEvent) -> Result<(), SinkError> {
        self.conn.execute(
            "INSERT INTO conversions
                (session_id, conversion_type, time_to_conversion_seconds, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.session_id,
                event.conversion_type,
                event.time_to_conversion_seconds,
                event.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

enum SinkMessage {
    Interaction(InteractionEvent),
    Conversion(ConversionEvent),
}

/// HTTP sink that posts records from a background task.
///
/// `insert_*` only enqueues; the spawned worker owns the client and the
/// retries-free delivery loop. Requires a running tokio runtime at
/// construction. Call [`close`](HttpSink::close) to drain the queue on
/// teardown -- dropping the sink also stops the worker after it finishes
/// what is already queued, but without waiting for it.
pub struct HttpSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
    worker: tokio::task::JoinHandle<()>,
}

impl HttpSink {
    /// Sink posting to `<base>/interactions` and `<base>/conversions`.
    pub fn new(base: Url) -> Result<Self, SinkError> {
        let interactions_url = leaf_url(&base, "interactions")?;
        let conversions_url = leaf_url(&base, "conversions")?;
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(deliver_loop(interactions_url, conversions_url, rx));
        Ok(Self { tx, worker })
    }

    /// Stop accepting records and wait for the queue to drain.
    pub async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            warn!("telemetry worker ended abnormally: {e}");
        }
    }
}

impl AnalyticsSink for HttpSink {
    fn insert_interaction(&mut self, event: &InteractionEvent) -> Result<(), SinkError> {
        self.tx
            .send(SinkMessage::Interaction(event.clone()))
            .map_err(|_| SinkError::Closed)
    }

    fn insert_conversion(&mut self, event: &ConversionEvent) -> Result<(), SinkError> {
        self.tx
            .send(SinkMessage::Conversion(event.clone()))
            .map_err(|_| SinkError::Closed)
    }
}

async fn deliver_loop(
    interactions_url: Url,
    conversions_url: Url,
    mut rx: mpsc::UnboundedReceiver<SinkMessage>,
) {
    let client = reqwest::Client::new();
    while let Some(msg) = rx.recv().await {
        let (url, body) = match &msg {
            SinkMessage::Interaction(event) => (&interactions_url, serde_json::to_value(event)),
            SinkMessage::Conversion(event) => (&conversions_url, serde_json::to_value(event)),
        };
        let body = match body {
            Ok(b) => b,
            Err(e) => {
                warn!("unencodable analytics record dropped: {e}");
                continue;
            }
        };
        // Log-and-drop: no retry, no backpressure to the page.
        match client.post(url.clone()).json(&body).send().await {
            Ok(resp) if !resp.status().is_success() => {
                warn!("analytics endpoint answered HTTP {}, record dropped", resp.status());
            }
            Err(e) => {
                warn!("analytics delivery failed, record dropped: {e}");
            }
            Ok(_) => {}
        }
    }
}

fn leaf_url(base: &Url, leaf: &str) -> Result<Url, SinkError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| SinkError::Unreachable(format!("endpoint '{base}' cannot carry a path")))?
        .pop_if_empty()
        .push(leaf);
    Ok(url)
}
