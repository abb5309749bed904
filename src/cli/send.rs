use super::ui;
use crate::app::{self, SendStats};
use crate::core::config::AppConfig;
use crate::core::email::EmailSender;
use crate::core::period::CostPeriod;
use crate::core::summary::ReportSummary;
use anyhow::Result;

pub async fn run(
    summary: &ReportSummary,
    period: &CostPeriod,
    config: &AppConfig,
    sender: &dyn EmailSender,
) -> Result<SendStats> {
    let stats = app::send_reports(summary, period, config, sender).await?;

    println!(
        "{} {}",
        ui::style_text(
            &format!("Reports for {}:", period.label()),
            ui::StyleType::TotalLabel
        ),
        ui::style_text(&format!("{} sent", stats.sent), ui::StyleType::TotalValue)
    );
    if stats.failed > 0 {
        println!(
            "{}",
            ui::style_text(
                &format!("{} failed, see log for details", stats.failed),
                ui::StyleType::Error
            )
        );
    }
    Ok(stats)
}
