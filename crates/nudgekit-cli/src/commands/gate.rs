use chrono::Utc;
use clap::Subcommand;
use nudgekit_core::{
    DismissScope, Eligibility, EngagementConfig, FrequencyGate, MemoryStore, SqliteStore,
    TriggerKey,
};
use serde::Serialize;

#[derive(Subcommand)]
pub enum GateAction {
    /// Dump stored cooldown records for every trigger key
    Status,
    /// Check whether a trigger is eligible to fire right now
    Check {
        /// Trigger key (e.g. "floatingCta")
        key: String,
        /// Override the configured cooldown window
        #[arg(long)]
        cooldown_hours: Option<f64>,
    },
    /// Stamp a trigger as shown now
    RecordShown {
        /// Trigger key
        key: String,
    },
    /// Stamp a trigger as dismissed now (durable scope)
    RecordDismissed {
        /// Trigger key
        key: String,
    },
    /// Forget everything stored for a trigger
    Clear {
        /// Trigger key
        key: String,
    },
}

#[derive(Serialize)]
struct CheckOutput {
    trigger_key: TriggerKey,
    cooldown_hours: f64,
    eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    eligible_again_at: Option<chrono::DateTime<Utc>>,
}

fn parse_key(raw: &str) -> Result<TriggerKey, Box<dyn std::error::Error>> {
    TriggerKey::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = TriggerKey::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown trigger key '{raw}' (known: {})", known.join(", ")).into()
    })
}

/// Gate over the durable profile store. The session scope only exists
/// inside a page view, so each CLI invocation gets an empty one.
fn open_gate() -> Result<FrequencyGate, Box<dyn std::error::Error>> {
    let durable = SqliteStore::open_default()?;
    Ok(FrequencyGate::new(
        Box::new(durable),
        Box::new(MemoryStore::new()),
    ))
}

pub fn run(action: GateAction) -> Result<(), Box<dyn std::error::Error>> {
    let now = Utc::now();
    match action {
        GateAction::Status => {
            let gate = open_gate()?;
            let records: Vec<_> = TriggerKey::ALL
                .into_iter()
                .filter_map(|key| gate.record(key))
                .collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        GateAction::Check { key, cooldown_hours } => {
            let key = parse_key(&key)?;
            let config = EngagementConfig::load_or_default();
            let cooldown = cooldown_hours.unwrap_or(config.triggers.rule(key).cooldown_hours);
            let gate = open_gate()?;
            let result = gate.check(key, cooldown, now);
            let output = CheckOutput {
                trigger_key: key,
                cooldown_hours: cooldown,
                eligible: result.is_eligible(),
                eligible_again_at: match result {
                    Eligibility::CoolingDown { until } => Some(until),
                    _ => None,
                },
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        GateAction::RecordShown { key } => {
            let key = parse_key(&key)?;
            let mut gate = open_gate()?;
            gate.record_shown(key, now);
            println!("{}", serde_json::to_string_pretty(&gate.record(key))?);
        }
        GateAction::RecordDismissed { key } => {
            let key = parse_key(&key)?;
            let mut gate = open_gate()?;
            gate.record_dismissed(key, DismissScope::Durable, now);
            println!("{}", serde_json::to_string_pretty(&gate.record(key))?);
        }
        GateAction::Clear { key } => {
            let key = parse_key(&key)?;
            let mut gate = open_gate()?;
            gate.clear(key)?;
            println!("{{\"type\": \"gate_cleared\", \"trigger_key\": \"{key}\"}}");
        }
    }
    Ok(())
}
