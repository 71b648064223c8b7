//! TOML-based engagement configuration.
//!
//! Everything tunable about the page lives here: per-surface cooldowns,
//! trigger timings, countdown target, scarcity pacing, arbitration
//! policy, telemetry endpoint, form relay and variant rollout.
//!
//! Configuration is stored at `~/.config/nudgekit/config.toml`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::gate::DismissScope;
use crate::storage::data_dir;
use crate::surface::TriggerKey;

/// Gating rule for one surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRule {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: f64,
    #[serde(default = "default_dismiss_scope")]
    pub dismiss_scope: DismissScope,
}

impl Default for TriggerRule {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_hours: default_cooldown_hours(),
            dismiss_scope: default_dismiss_scope(),
        }
    }
}

/// Per-surface rules, one table per trigger key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggersConfig {
    #[serde(default = "default_exit_intent_modal_rule")]
    pub exit_intent_modal: TriggerRule,
    #[serde(default)]
    pub exit_intent_offer: TriggerRule,
    #[serde(default = "default_floating_cta_rule")]
    pub floating_cta: TriggerRule,
    #[serde(default = "default_countdown_banner_rule")]
    pub countdown_banner: TriggerRule,
}

impl TriggersConfig {
    pub fn rule(&self, key: TriggerKey) -> &TriggerRule {
        match key {
            TriggerKey::ExitIntentModal => &self.exit_intent_modal,
            TriggerKey::ExitIntentOffer => &self.exit_intent_offer,
            TriggerKey::FloatingCta => &self.floating_cta,
            TriggerKey::CountdownBanner => &self.countdown_banner,
        }
    }
}

impl Default for TriggersConfig {
    fn default() -> Self {
        Self {
            exit_intent_modal: default_exit_intent_modal_rule(),
            exit_intent_offer: TriggerRule::default(),
            floating_cta: default_floating_cta_rule(),
            countdown_banner: default_countdown_banner_rule(),
        }
    }
}

/// Exit-intent detector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitIntentConfig {
    #[serde(default = "default_min_dwell_secs")]
    pub min_dwell_secs: u64,
}

impl Default for ExitIntentConfig {
    fn default() -> Self {
        Self {
            min_dwell_secs: default_min_dwell_secs(),
        }
    }
}

/// Scroll/dwell trigger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollConfig {
    #[serde(default = "default_fixed_delay_secs")]
    pub fixed_delay_secs: u64,
    #[serde(default = "default_depth_threshold_pct")]
    pub depth_threshold_pct: f64,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            fixed_delay_secs: default_fixed_delay_secs(),
            depth_threshold_pct: default_depth_threshold_pct(),
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

/// Countdown banner configuration. No target means no countdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountdownConfig {
    #[serde(default)]
    pub target: Option<DateTime<Utc>>,
}

/// Scarcity counter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScarcityConfig {
    #[serde(default = "default_scarcity_initial")]
    pub initial: u32,
    #[serde(default = "default_scarcity_floor")]
    pub floor: u32,
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,
    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: u64,
    /// Fixed seed for reproducible pacing; entropy when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ScarcityConfig {
    fn default() -> Self {
        Self {
            initial: default_scarcity_initial(),
            floor: default_scarcity_floor(),
            min_interval_secs: default_min_interval_secs(),
            max_interval_secs: default_max_interval_secs(),
            seed: None,
        }
    }
}

/// What happens when a trigger fires while another surface is visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArbitrationPolicy {
    /// Hold the trigger and show it once the visible surface resolves.
    #[default]
    Queue,
    /// Discard the trigger outright.
    Drop,
}

/// Coordinator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub policy: ArbitrationPolicy,
}

/// Telemetry configuration. Without an endpoint the pipeline still runs
/// against whatever sink the host wires in (memory, local archive).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Form relay endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: String,
    /// Secret for HMAC signing of payloads.
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub enabled: bool,
    /// Custom headers to include.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial retry delay; doubles per attempt.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            secret: String::new(),
            enabled: false,
            headers: HashMap::new(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Variant rollout configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantsConfig {
    /// Share of sessions (0-100) that see the discount offer copy on the
    /// exit-intent surface instead of the plain reminder.
    #[serde(default)]
    pub offer_rollout_pct: u8,
}

/// Engagement configuration.
///
/// Serialized to/from TOML at `~/.config/nudgekit/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementConfig {
    #[serde(default)]
    pub triggers: TriggersConfig,
    #[serde(default)]
    pub exit_intent: ExitIntentConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub countdown: CountdownConfig,
    #[serde(default)]
    pub scarcity: ScarcityConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub variants: VariantsConfig,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_cooldown_hours() -> f64 {
    24.0
}
fn default_dismiss_scope() -> DismissScope {
    DismissScope::Session
}
fn default_exit_intent_modal_rule() -> TriggerRule {
    TriggerRule {
        enabled: true,
        cooldown_hours: 72.0,
        dismiss_scope: DismissScope::Session,
    }
}
fn default_floating_cta_rule() -> TriggerRule {
    TriggerRule {
        enabled: true,
        cooldown_hours: 24.0,
        dismiss_scope: DismissScope::Durable,
    }
}
fn default_countdown_banner_rule() -> TriggerRule {
    TriggerRule {
        enabled: true,
        cooldown_hours: 0.0,
        dismiss_scope: DismissScope::Session,
    }
}
fn default_min_dwell_secs() -> u64 {
    10
}
fn default_fixed_delay_secs() -> u64 {
    30
}
fn default_depth_threshold_pct() -> f64 {
    60.0
}
fn default_sample_interval_ms() -> u64 {
    250
}
fn default_scarcity_initial() -> u32 {
    37
}
fn default_scarcity_floor() -> u32 {
    5
}
fn default_min_interval_secs() -> u64 {
    20
}
fn default_max_interval_secs() -> u64 {
    50
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}

impl EngagementConfig {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|_| ConfigError::InvalidValue {
                            key: key.to_string(),
                            message: format!("cannot parse '{value}' as bool"),
                        })?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| ConfigError::InvalidValue {
                                    key: key.to_string(),
                                    message: format!("cannot parse '{value}' as number"),
                                })?
                        } else {
                            return Err(ConfigError::InvalidValue {
                                key: key.to_string(),
                                message: format!("cannot parse '{value}' as number"),
                            });
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| ConfigError::InvalidValue {
                            key: key.to_string(),
                            message: e.to_string(),
                        })?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/nudgekit"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk or write the default.
    ///
    /// # Errors
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: EngagementConfig =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Load from disk, returning default on any error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key and persist. Fails on unknown keys and
    /// unparseable values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.save()?;
        Ok(())
    }

    /// Like [`set`](Self::set) but without touching disk. The scripted
    /// replay path uses this to vary configs per run.
    pub fn set_in_memory(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}
