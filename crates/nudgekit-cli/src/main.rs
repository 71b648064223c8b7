use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

mod commands;

#[derive(Parser)]
#[command(name = "nudgekit-cli", version, about = "Nudgekit CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Frequency gate inspection and bookkeeping
    Gate {
        #[command(subcommand)]
        action: commands::gate::GateAction,
    },
    /// Countdown target and remaining time
    Countdown {
        #[command(subcommand)]
        action: commands::countdown::CountdownAction,
    },
    /// Scripted session replay
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Local telemetry archive queries
    Telemetry {
        #[command(subcommand)]
        action: commands::telemetry::TelemetryAction,
    },
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Config { action } => commands::config::run(action),
        Commands::Gate { action } => commands::gate::run(action),
        Commands::Countdown { action } => commands::countdown::run(action),
        Commands::Session { action } => commands::session::run(action),
        Commands::Telemetry { action } => commands::telemetry::run(action),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "nudgekit-cli", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
