use super::ui;
use crate::core::period::CostPeriod;
use crate::core::summary::{OwnerSummary, ReportSummary};
use anyhow::Result;
use comfy_table::Cell;

fn section_total(section: Option<&crate::core::summary::UsageByAccount>) -> Option<f64> {
    section.map(|usage| usage.values().map(|u| u.total).sum())
}

fn untagged_count(summary: &OwnerSummary) -> usize {
    summary
        .missing_other_tag
        .as_ref()
        .map_or(0, |m| m.values().map(Vec::len).sum())
}

impl ReportSummary {
    /// Recipients and their totals, as printed by `preview`.
    pub fn display_as_table(&self, period: &CostPeriod) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Recipient"),
            ui::header_cell("Resources"),
            ui::header_cell("Accounts"),
            ui::header_cell("Untagged"),
            ui::header_cell("Total"),
        ]);

        let mut grand_total = 0.0;
        for (recipient, summary) in &self.per_user {
            let total = summary.grand_total();
            grand_total += total;
            table.add_row(vec![
                Cell::new(recipient),
                ui::format_optional_cell(section_total(summary.resources.as_ref()), |v| {
                    format!("${v:.2}")
                }),
                ui::format_optional_cell(section_total(summary.accounts.as_ref()), |v| {
                    format!("${v:.2}")
                }),
                Cell::new(untagged_count(summary)),
                ui::dollar_cell(total),
            ]);
        }

        let mut output = format!(
            "Cost report for {}\n\n",
            ui::style_text(&period.label(), ui::StyleType::Title)
        );
        output.push_str(&table.to_string());
        output.push_str(&format!(
            "\n\n{} {}",
            ui::style_text(
                &format!("Total across {} recipients:", self.per_user.len()),
                ui::StyleType::TotalLabel
            ),
            ui::style_text(&format!("${grand_total:.2}"), ui::StyleType::TotalValue)
        ));
        output
    }

    /// Unowned costs by account, as printed by `preview`.
    pub fn display_unowned_as_table(&self) -> String {
        if self.unowned.is_empty() {
            return ui::style_text("No unowned costs", ui::StyleType::Subtle);
        }

        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Account"),
            ui::header_cell("Unowned Costs"),
            ui::header_cell("Change"),
        ]);
        for (account_id, usage) in &self.unowned {
            let name = self
                .account_names
                .get(account_id)
                .map_or("Unknown", String::as_str);
            table.add_row(vec![
                Cell::new(format!("{name} ({account_id})")),
                ui::dollar_cell(usage.total),
                ui::change_cell(usage.change),
            ]);
        }
        table.to_string()
    }
}

/// Print what would be sent, without sending anything.
pub fn run(summary: &ReportSummary, period: &CostPeriod) -> Result<()> {
    println!("{}", summary.display_as_table(period));
    ui::print_separator();
    println!("{}", summary.display_unowned_as_table());
    Ok(())
}
