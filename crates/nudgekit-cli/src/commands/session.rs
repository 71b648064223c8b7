use chrono::{DateTime, Utc};
use clap::Subcommand;
use nudgekit_core::{
    ConversionEvent, Event, InteractionEvent, PageSignal, ScenarioAction, SessionScenario,
    TriggerKey,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Replay a scenario file against virtual time and print what happened
    Simulate {
        /// Path to a scenario JSON file
        file: PathBuf,
        /// Print only the event stream
        #[arg(long)]
        events_only: bool,
    },
    /// Print an example scenario to adapt
    Example,
}

#[derive(Serialize)]
struct RunOutput {
    name: String,
    finished_at: DateTime<Utc>,
    events: Vec<Event>,
    interactions: Vec<InteractionEvent>,
    conversions: Vec<ConversionEvent>,
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SessionAction::Simulate { file, events_only } => {
            let scenario = SessionScenario::load(&file)?;
            let run = scenario.run();
            if events_only {
                println!("{}", serde_json::to_string_pretty(&run.events)?);
            } else {
                let output = RunOutput {
                    name: scenario.name.clone(),
                    finished_at: run.finished_at,
                    events: run.events,
                    interactions: run.interactions,
                    conversions: run.conversions,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }
        SessionAction::Example => {
            let started_at = Utc::now();
            let scenario = SessionScenario::new("exit-intent-then-dismiss", started_at)
                .with_step(
                    2,
                    ScenarioAction::Signal {
                        signal: PageSignal::Scrolled { scroll_y: 600.0 },
                    },
                )
                .with_step(
                    15,
                    ScenarioAction::Signal {
                        signal: PageSignal::PointerMoved { y: -3.0 },
                    },
                )
                .with_step(
                    22,
                    ScenarioAction::Dismiss {
                        trigger_key: TriggerKey::ExitIntentModal,
                    },
                )
                .with_step(60, ScenarioAction::End)
                .with_run_for(60);
            println!("{}", scenario.to_json()?);
        }
    }
    Ok(())
}
