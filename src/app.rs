//! Build the monthly summary and dispatch the report emails

use crate::aggregate;
use crate::core::config::AppConfig;
use crate::core::cost::CostProvider;
use crate::core::directory::DirectoryProvider;
use crate::core::email::{EmailBody, EmailMessage, EmailSender};
use crate::core::period::CostPeriod;
use crate::core::summary::{OwnerSummary, ReportSummary};
use crate::recipients::RecipientPolicy;
use crate::report;
use anyhow::Result;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info};

/// Outcome of a batch of sends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SendStats {
    pub sent: usize,
    pub failed: usize,
}

/// Gather costs for both periods and assemble what each recipient will receive.
///
/// Untagged resource lookups happen after recipient filtering to keep the
/// number of cost API calls down.
pub async fn build_summary(
    target: &CostPeriod,
    compare: &CostPeriod,
    minimum: f64,
    policy: &RecipientPolicy,
    costs: &dyn CostProvider,
    directory: &dyn DirectoryProvider,
) -> Result<ReportSummary> {
    let target_owner = aggregate::owner_account_costs(&costs.owner_account_costs(target).await?)?;
    let compare_owner =
        aggregate::owner_account_costs(&costs.owner_account_costs(compare).await?)?;
    let resources = aggregate::resource_totals(&target_owner, &compare_owner, minimum);

    let target_accounts = aggregate::account_costs(&costs.account_costs(target).await?)?;
    let compare_accounts = aggregate::account_costs(&costs.account_costs(compare).await?)?;
    let owners = directory.account_owners().await?;
    let accounts =
        aggregate::account_totals(&target_accounts, &compare_accounts, &owners, minimum);

    let account_names: BTreeMap<_, _> = directory
        .accounts()
        .await?
        .into_iter()
        .map(|a| (a.id, a.name))
        .collect();

    let mut summary: BTreeMap<String, OwnerSummary> = BTreeMap::new();
    for (owner, usage) in &resources {
        summary.entry(owner.clone()).or_default().resources = Some(usage.clone());
    }
    for (owner, usage) in accounts {
        summary.entry(owner).or_default().accounts = Some(usage);
    }
    debug!(?summary, "Merged owner summary");

    let mut per_user = BTreeMap::new();
    for (recipient, mut owner_summary) in summary {
        if !policy.is_valid(&recipient) {
            continue;
        }
        let missing = aggregate::missing_tag_resources(
            &costs.missing_tag_resources(target, &recipient).await?,
        )?;
        if !missing.is_empty() {
            owner_summary.missing_other_tag = Some(missing);
        }
        per_user.insert(recipient, owner_summary);
    }
    info!("{} recipients after filtering", per_user.len());

    let unowned = aggregate::unowned_totals(&resources, &owners);

    Ok(ReportSummary {
        account_names,
        per_user,
        unowned,
    })
}

pub fn report_subject(period: &CostPeriod) -> String {
    format!("AWS Monthly Cost Report ({})", period.label())
}

pub fn unowned_subject(period: &CostPeriod) -> String {
    format!("AWS Unowned Costs ({})", period.label())
}

/// Send one message, logging instead of propagating a failure.
async fn send_logged(sender: &dyn EmailSender, message: EmailMessage, stats: &mut SendStats) {
    match sender.send(&message).await {
        Ok(message_id) => {
            info!(recipient = %message.recipient, "Email sent! Message ID: {message_id}");
            stats.sent += 1;
        }
        Err(e) => {
            error!(recipient = %message.recipient, error = ?e, "Failed to send email");
            stats.failed += 1;
        }
    }
}

/// Render and send every recipient's report, then the unowned cost summary.
pub async fn send_reports(
    summary: &ReportSummary,
    period: &CostPeriod,
    config: &AppConfig,
    sender: &dyn EmailSender,
) -> Result<SendStats> {
    let from = config.sender()?;
    let interval = Duration::from_millis(config.send_interval_ms);
    let mut stats = SendStats::default();

    let subject = report_subject(period);
    for (recipient, owner_summary) in &summary.per_user {
        debug!("Processing email for {recipient} (${:.2})", owner_summary.grand_total());
        let message = EmailMessage {
            sender: from.to_string(),
            recipient: recipient.clone(),
            subject: subject.clone(),
            body: report::build_user_email(owner_summary, &summary.account_names),
        };
        send_logged(sender, message, &mut stats).await;
        tokio::time::sleep(interval).await;
    }

    match &config.admin_email {
        Some(admin) if !summary.unowned.is_empty() => {
            let body: EmailBody =
                report::build_unowned_email(&summary.unowned, &summary.account_names);
            let message = EmailMessage {
                sender: from.to_string(),
                recipient: admin.clone(),
                subject: unowned_subject(period),
                body,
            };
            send_logged(sender, message, &mut stats).await;
        }
        Some(_) => debug!("No unowned costs to report"),
        None => debug!("No admin address configured, skipping unowned cost summary"),
    }

    info!(sent = stats.sent, failed = stats.failed, "Finished sending reports");
    Ok(stats)
}
