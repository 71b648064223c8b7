//! Scripted session replay.
//!
//! A [`SessionScenario`] is a serializable script: a config, a start
//! instant, and a list of timed steps (signals and visitor actions) at
//! second offsets from session start. Running one replays the script
//! through a fresh in-memory [`EngagementSession`] against virtual time,
//! pumping once per simulated second, and collects every event and
//! telemetry row produced. The CLI's `session simulate` command and the
//! integration tests both run on this.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngagementConfig;
use crate::error::CoreError;
use crate::events::Event;
use crate::session::EngagementSession;
use crate::signals::PageSignal;
use crate::storage::MemoryStore;
use crate::surface::TriggerKey;
use crate::telemetry::{ConversionEvent, InteractionEvent, SharedMemorySink};

/// One scripted step, applied `at_secs` after session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// Offset from session start, in whole seconds.
    pub at_secs: u64,
    #[serde(flatten)]
    pub action: ScenarioAction,
}

/// What happens at a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioAction {
    /// A page signal arrives.
    Signal { signal: PageSignal },
    /// Visitor dismisses a surface.
    Dismiss { trigger_key: TriggerKey },
    /// Visitor follows a surface's call to action.
    ClickThrough { trigger_key: TriggerKey },
    /// Visitor converts on a surface.
    Convert { trigger_key: TriggerKey },
    /// Visitor toggles a surface's detail section.
    ToggleExpanded { trigger_key: TriggerKey },
    /// A non-surface conversion, like the main signup form.
    RecordConversion { conversion_type: String },
    /// Page teardown.
    End,
}

/// A replayable session script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionScenario {
    /// Scenario name, for logs and fixtures.
    pub name: String,
    /// Virtual instant the session starts at.
    pub started_at: DateTime<Utc>,
    /// Engine configuration the session runs under.
    #[serde(default)]
    pub config: EngagementConfig,
    /// Timed steps; replayed in offset order regardless of list order.
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
    /// Keep pumping this many seconds past the last step.
    #[serde(default)]
    pub run_for_secs: u64,
}

impl SessionScenario {
    pub fn new(name: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            started_at,
            config: EngagementConfig::default(),
            steps: Vec::new(),
            run_for_secs: 0,
        }
    }

    pub fn with_config(mut self, config: EngagementConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_step(mut self, at_secs: u64, action: ScenarioAction) -> Self {
        self.steps.push(ScenarioStep { at_secs, action });
        self
    }

    pub fn with_run_for(mut self, secs: u64) -> Self {
        self.run_for_secs = secs;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a scenario from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write the scenario to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CoreError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Replay the script against virtual time.
    ///
    /// Each simulated second pumps the session first, then applies that
    /// second's steps, so periodic work (countdown ticks, scarcity
    /// pacing, dwell arming) lands before visitor actions at the same
    /// offset.
    pub fn run(&self) -> ScenarioRun {
        let sink = SharedMemorySink::new();
        let mut session = EngagementSession::new(
            self.config.clone(),
            Box::new(MemoryStore::new()),
            Box::new(sink.clone()),
            self.started_at,
        );

        let mut steps = self.steps.clone();
        steps.sort_by_key(|s| s.at_secs);
        let last_step = steps.last().map(|s| s.at_secs).unwrap_or(0);
        let end_secs = self.run_for_secs.max(last_step);

        let mut events = session.start(self.started_at);
        let mut step_iter = steps.into_iter().peekable();
        while let Some(step) = step_iter.next_if(|s| s.at_secs == 0) {
            events.extend(apply(&mut session, &step.action, self.started_at));
        }

        for sec in 1..=end_secs {
            let now = self.started_at + Duration::seconds(sec as i64);
            events.extend(session.pump(now));
            while let Some(step) = step_iter.next_if(|s| s.at_secs == sec) {
                events.extend(apply(&mut session, &step.action, now));
            }
        }

        ScenarioRun {
            finished_at: self.started_at + Duration::seconds(end_secs as i64),
            events,
            interactions: sink.interactions(),
            conversions: sink.conversions(),
        }
    }
}

fn apply(session: &mut EngagementSession, action: &ScenarioAction, now: DateTime<Utc>) -> Vec<Event> {
    match action {
        ScenarioAction::Signal { signal } => session.handle_signal(signal, now),
        ScenarioAction::Dismiss { trigger_key } => session.dismiss(*trigger_key, now),
        ScenarioAction::ClickThrough { trigger_key } => session.click_through(*trigger_key, now),
        ScenarioAction::Convert { trigger_key } => session.convert(*trigger_key, now),
        ScenarioAction::ToggleExpanded { trigger_key } => {
            session.toggle_expanded(*trigger_key, now)
        }
        ScenarioAction::RecordConversion { conversion_type } => {
            session.record_conversion(conversion_type, now);
            Vec::new()
        }
        ScenarioAction::End => session.end(now),
    }
}

/// Everything a replay produced.
#[derive(Debug, Clone)]
pub struct ScenarioRun {
    /// Virtual instant the replay stopped at.
    pub finished_at: DateTime<Utc>,
    /// Every event in emission order.
    pub events: Vec<Event>,
    /// Interaction rows the sink received.
    pub interactions: Vec<InteractionEvent>,
    /// Conversion rows the sink received.
    pub conversions: Vec<ConversionEvent>,
}
