use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use cost_report::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Report as if run on this date (YYYY-MM-DD)
    #[arg(short, long, global = true)]
    date: Option<NaiveDate>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for cost_report::AppCommand {
    fn from(cmd: Commands) -> cost_report::AppCommand {
        match cmd {
            Commands::Send => cost_report::AppCommand::Send,
            Commands::Preview => cost_report::AppCommand::Preview,
            Commands::Render { recipient } => cost_report::AppCommand::Render(recipient),
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Send the monthly cost report emails
    Send,
    /// Show who would receive a report and their totals
    Preview,
    /// Print the text report for one recipient
    Render {
        /// Recipient email address
        recipient: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => cost_report::cli::setup::setup_at_path(path),
            None => cost_report::cli::setup::setup(),
        },
        Some(cmd) => {
            cost_report::run_command(cmd.into(), cli.config_path.as_deref(), cli.date).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
