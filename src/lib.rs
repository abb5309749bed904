pub mod aggregate;
pub mod app;
pub mod cli;
pub mod core;
pub mod providers;
pub mod recipients;
pub mod report;

use crate::core::config::AppConfig;
use crate::core::directory::TeamProvider;
use crate::core::period;
use crate::providers::{CostExplorerClient, OrganizationsClient, SesClient, SynapseClient};
use crate::recipients::RecipientPolicy;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use tracing::{debug, info};

pub enum AppCommand {
    /// Email every recipient their report
    Send,
    /// Print the recipients and totals without sending
    Preview,
    /// Print the text body one recipient would get
    Render(String),
}

/// Run a reporting command.
///
/// `today` anchors the reporting window and defaults to the local date.
pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    today: Option<NaiveDate>,
) -> Result<()> {
    info!("Cost report starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        minimum = config.minimum,
        restrict = config.restrict,
        approved = config.approved.len(),
        skiplist = config.skiplist.len(),
        "Loaded config"
    );

    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let (target, compare) = period::report_periods(today)?;

    let credentials = providers::aws::resolve_credentials(&config.aws)?;
    let costs = CostExplorerClient::new(&config.aws.cost_explorer_endpoint(), credentials.clone())?;
    let directory =
        OrganizationsClient::new(&config.aws.organizations_endpoint(), credentials.clone())?;
    let team = SynapseClient::new(
        &config.synapse.base_url,
        &config.synapse.team_id,
        &config.synapse.email_domain,
    );

    let team_members = team.team_member_emails().await?;
    let policy = RecipientPolicy::new(&config, &team_members);
    let summary = app::build_summary(
        &target,
        &compare,
        config.minimum,
        &policy,
        &costs,
        &directory,
    )
    .await?;

    match command {
        AppCommand::Send => {
            let sender = SesClient::new(&config.aws.ses_endpoint(), &config.aws.region, credentials)?;
            cli::send::run(&summary, &target, &config, &sender).await?;
        }
        AppCommand::Preview => cli::preview::run(&summary, &target)?,
        AppCommand::Render(recipient) => cli::render::run(&summary, &recipient)?,
    }
    Ok(())
}
