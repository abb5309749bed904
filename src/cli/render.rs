use crate::core::summary::ReportSummary;
use crate::report;
use anyhow::{Result, anyhow};

/// The plain-text body one recipient would receive.
pub fn render(summary: &ReportSummary, recipient: &str) -> Result<String> {
    let recipient = recipient.trim().to_lowercase();
    let owner_summary = summary.per_user.get(&recipient).ok_or_else(|| {
        anyhow!("'{recipient}' would not receive a report this month")
    })?;
    Ok(report::build_user_email(owner_summary, &summary.account_names).text)
}

pub fn run(summary: &ReportSummary, recipient: &str) -> Result<()> {
    println!("{}", render(summary, recipient)?);
    Ok(())
}
