use chrono::{DateTime, Utc};
use clap::Subcommand;
use nudgekit_core::{CountdownSnapshot, EngagementConfig};
use serde::Serialize;

#[derive(Subcommand)]
pub enum CountdownAction {
    /// Print remaining time toward the configured target as JSON
    Status,
    /// Set the countdown target instant
    Set {
        /// Target instant, RFC 3339 (e.g. "2026-09-30T23:59:59Z")
        target: String,
    },
    /// Remove the countdown target
    Clear,
}

#[derive(Serialize)]
struct StatusOutput {
    target: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining: Option<CountdownSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed: Option<bool>,
}

pub fn run(action: CountdownAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        CountdownAction::Status => {
            let config = EngagementConfig::load_or_default();
            let output = match config.countdown.target {
                Some(target) => {
                    let now = Utc::now();
                    StatusOutput {
                        target: Some(target),
                        remaining: Some(CountdownSnapshot::from_delta_seconds(
                            (target - now).num_seconds(),
                        )),
                        completed: Some(target <= now),
                    }
                }
                None => StatusOutput {
                    target: None,
                    remaining: None,
                    completed: None,
                },
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        CountdownAction::Set { target } => {
            let parsed = DateTime::parse_from_rfc3339(&target)
                .map_err(|e| format!("invalid target '{target}': {e}"))?
                .with_timezone(&Utc);
            let mut config = EngagementConfig::load_or_default();
            config.countdown.target = Some(parsed);
            config.save()?;
            println!("{{\"type\": \"countdown_target_set\", \"target\": \"{}\"}}", parsed.to_rfc3339());
        }
        CountdownAction::Clear => {
            let mut config = EngagementConfig::load_or_default();
            config.countdown.target = None;
            config.save()?;
            println!("{{\"type\": \"countdown_target_cleared\"}}");
        }
    }
    Ok(())
}
