//! Frequency gating for interruptive surfaces.
//!
//! Every surface carries a cooldown: once shown (or dismissed), it stays
//! quiet for a configured number of hours. The gate owns that state across
//! two explicitly separate scopes -- a durable store that survives the
//! visitor returning tomorrow, and a session store that dies with the tab.
//! A "don't show this again" dismiss can land in either scope.
//!
//! The gate fails open. If the durable store is unreadable or a stored
//! timestamp is corrupt, the surface is treated as eligible: over-showing
//! is less harmful than never engaging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StoreError;
use crate::storage::{KeyValueStore, MemoryStore};
use crate::surface::TriggerKey;

/// Where a dismissal is remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DismissScope {
    /// Persists across visits; only the cooldown window ends it.
    Durable,
    /// Cleared when the tab session ends; suppresses for the whole
    /// session regardless of cooldown.
    Session,
}

/// Cooldown bookkeeping for one trigger key, as stored durably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownRecord {
    pub trigger_key: TriggerKey,
    pub last_shown_at: Option<DateTime<Utc>>,
    pub last_dismissed_at: Option<DateTime<Utc>>,
}

/// Outcome of an eligibility check, with enough detail to log or
/// display. Collapse to a bool via [`Eligibility::is_eligible`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eligibility {
    Eligible,
    /// Cooldown window still running; eligible again at `until`.
    CoolingDown { until: DateTime<Utc> },
    /// Dismissed earlier in this tab session.
    DismissedThisSession,
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Per-trigger cooldown gate over a durable and a session-scoped store.
pub struct FrequencyGate {
    durable: Box<dyn KeyValueStore>,
    session: Box<dyn KeyValueStore>,
}

impl FrequencyGate {
    pub fn new(durable: Box<dyn KeyValueStore>, session: Box<dyn KeyValueStore>) -> Self {
        Self { durable, session }
    }

    /// Gate over two in-memory stores. Used by tests and scripted replays.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()))
    }

    /// Decide whether `key` may be shown again `cooldown_hours` after it
    /// was last shown. A key with no record is always eligible.
    pub fn check(&self, key: TriggerKey, cooldown_hours: f64, now: DateTime<Utc>) -> Eligibility {
        if self.dismissed_this_session(key) {
            return Eligibility::DismissedThisSession;
        }

        let last_shown = match self.load_last_shown(key) {
            Ok(v) => v,
            Err(e) => {
                warn!("cooldown store unreadable for {key}, failing open: {e}");
                return Eligibility::Eligible;
            }
        };

        match last_shown {
            None => Eligibility::Eligible,
            Some(shown_at) => {
                let cooldown_secs = (cooldown_hours * 3600.0) as i64;
                let until = shown_at + chrono::Duration::seconds(cooldown_secs);
                if now >= until {
                    Eligibility::Eligible
                } else {
                    Eligibility::CoolingDown { until }
                }
            }
        }
    }

    /// Bool form of [`check`](Self::check).
    pub fn is_eligible(&self, key: TriggerKey, cooldown_hours: f64, now: DateTime<Utc>) -> bool {
        self.check(key, cooldown_hours, now).is_eligible()
    }

    /// Stamp `key` as shown at `now`. Store failures are logged and
    /// swallowed; a surface must never fail to show because storage did.
    pub fn record_shown(&mut self, key: TriggerKey, now: DateTime<Utc>) {
        let stamp = now.to_rfc3339();
        if let Err(e) = self.durable.set(&shown_key(key), &stamp) {
            warn!("failed to record shown for {key}: {e}");
        }
        // Legacy flat key kept in sync for older deployments that read it.
        if let Err(e) = self.durable.set(key.as_str(), &stamp) {
            warn!("failed to record legacy shown for {key}: {e}");
        }
    }

    /// Stamp `key` as dismissed at `now` in the given scope. Session-scope
    /// dismissals suppress the key until the tab session ends; durable
    /// dismissals only update the timestamp record.
    pub fn record_dismissed(&mut self, key: TriggerKey, scope: DismissScope, now: DateTime<Utc>) {
        let stamp = now.to_rfc3339();
        match scope {
            DismissScope::Durable => {
                if let Err(e) = self.durable.set(&dismissed_key(key), &stamp) {
                    warn!("failed to record dismissed for {key}: {e}");
                }
            }
            DismissScope::Session => {
                if let Err(e) = self.session.set(&session_dismiss_key(key), &stamp) {
                    warn!("failed to record session dismissal for {key}: {e}");
                }
            }
        }
    }

    /// Read back the stored record for `key`. Malformed timestamps read
    /// as `None`; a fully absent record is `None` overall.
    pub fn record(&self, key: TriggerKey) -> Option<CooldownRecord> {
        let last_shown = self.load_last_shown(key).unwrap_or_default();
        let last_dismissed = self
            .read_timestamp(&dismissed_key(key))
            .unwrap_or_default();
        if last_shown.is_none() && last_dismissed.is_none() {
            return None;
        }
        Some(CooldownRecord {
            trigger_key: key,
            last_shown_at: last_shown,
            last_dismissed_at: last_dismissed,
        })
    }

    /// Forget everything stored for `key` in both scopes.
    pub fn clear(&mut self, key: TriggerKey) -> Result<(), StoreError> {
        self.durable.remove(&shown_key(key))?;
        self.durable.remove(&dismissed_key(key))?;
        self.durable.remove(key.as_str())?;
        self.session.remove(&session_dismiss_key(key))?;
        Ok(())
    }

    fn dismissed_this_session(&self, key: TriggerKey) -> bool {
        match self.session.get(&session_dismiss_key(key)) {
            Ok(v) => v.is_some(),
            Err(e) => {
                warn!("session store unreadable for {key}, failing open: {e}");
                false
            }
        }
    }

    /// Structured key first, then the legacy flat key older deployments
    /// wrote a bare timestamp under.
    fn load_last_shown(&self, key: TriggerKey) -> Result<Option<DateTime<Utc>>, StoreError> {
        if let Some(stamp) = self.read_timestamp(&shown_key(key))? {
            return Ok(Some(stamp));
        }
        self.read_timestamp(key.as_str())
    }

    fn read_timestamp(&self, store_key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let Some(raw) = self.durable.get(store_key)? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(parsed) => Ok(Some(parsed.with_timezone(&Utc))),
            Err(e) => {
                // Corrupt stamp reads as absent rather than erroring.
                warn!("malformed timestamp under '{store_key}' ({raw:?}): {e}");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for FrequencyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrequencyGate").finish_non_exhaustive()
    }
}

fn shown_key(key: TriggerKey) -> String {
    format!("{}.lastShown", key.as_str())
}

fn dismissed_key(key: TriggerKey) -> String {
    format!("{}.lastDismissed", key.as_str())
}

fn session_dismiss_key(key: TriggerKey) -> String {
    format!("{}.dismissedSession", key.as_str())
}
