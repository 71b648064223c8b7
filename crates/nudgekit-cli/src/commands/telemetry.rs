use clap::Subcommand;
use nudgekit_core::SqliteSink;

#[derive(Subcommand)]
pub enum TelemetryAction {
    /// Funnel rollup across everything in the local archive
    Summary,
    /// Funnel sliced per trigger key
    Triggers,
}

pub fn run(action: TelemetryAction) -> Result<(), Box<dyn std::error::Error>> {
    let sink = SqliteSink::open_default()?;

    match action {
        TelemetryAction::Summary => {
            let summary = sink.funnel_summary()?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        TelemetryAction::Triggers => {
            let rows = sink.funnel_by_trigger()?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}
