//! HTML and plain-text email bodies

use crate::core::email::EmailBody;
use crate::core::summary::{AccountId, MissingTags, OwnerSummary, UsageByAccount};
use std::collections::BTreeMap;
use tracing::debug;

const TABLE_OPEN: &str = "<table border='1' padding='10' width='600' \
     style='border-collapse: collapse; text-align: center;'>\
     <tr style='background-color: LightSteelBlue'>";

const DOCS_PROSE: &str = "You can use AWS Cost Explorer to analyze these expenses by \
     filtering on the \"Owner Email\" category and/or account ID";
const DOCS_NAME: &str = "Using AWS Cost Explorer";
const DOCS_URL: &str =
    "https://sagebionetworks.jira.com/wiki/spaces/IT/pages/2756935685/Using+AWS+Cost+Explorer";

/// Which flavour of body is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Html,
    Text,
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn format_dollars(total: f64) -> String {
    format!("${total:.2}")
}

pub fn format_change(change: Option<f64>) -> String {
    change.map_or_else(String::new, |c| format!("{:.2}%", c * 100.0))
}

fn row_style(i: usize) -> &'static str {
    if i % 2 == 0 {
        " style='background-color: WhiteSmoke;'"
    } else {
        ""
    }
}

fn account_label(account_names: &BTreeMap<AccountId, String>, account_id: &str) -> String {
    let name = account_names
        .get(account_id)
        .map_or("Unknown", String::as_str);
    format!("{name} ({account_id})")
}

fn paragraph(text: &str, format: Format) -> String {
    match format {
        // An invisible two-cell table wraps long lines at a fixed width
        Format::Html => format!(
            "<table border='0' width='100%' style='border-collapse: collapse;'><tr>\
             <td width='600'>{text}</td><td></td></tr></table>"
        ),
        Format::Text => format!("{text}\n"),
    }
}

fn table(headers: &[&str], rows: &[Vec<String>], format: Format) -> String {
    let mut output = String::new();
    match format {
        Format::Html => {
            output.push_str(TABLE_OPEN);
            for header in headers {
                output.push_str(&format!("<th>{}</th>", escape(header)));
            }
            output.push_str("</tr>");
            for (i, row) in rows.iter().enumerate() {
                output.push_str(&format!("<tr{}>", row_style(i)));
                for cell in row {
                    output.push_str(&format!("<td>{}</td>", escape(cell)));
                }
                output.push_str("</tr>");
            }
            output.push_str("</table><br/>");
        }
        Format::Text => {
            output.push_str(&headers.join("\t"));
            output.push('\n');
            for row in rows {
                output.push_str(&row.join("\t"));
                output.push('\n');
            }
        }
    }
    output
}

fn usage_table(
    usage: &UsageByAccount,
    account_names: &BTreeMap<AccountId, String>,
    total_header: &str,
    format: Format,
) -> String {
    let rows: Vec<Vec<String>> = usage
        .iter()
        .map(|(account_id, u)| {
            vec![
                account_label(account_names, account_id),
                format_dollars(u.total),
                format_change(u.change),
            ]
        })
        .collect();
    table(
        &["Account Name (Account ID)", total_header, "Month-over-Month Change"],
        &rows,
        format,
    )
}

fn tags_table(
    missing: &MissingTags,
    account_names: &BTreeMap<AccountId, String>,
    format: Format,
) -> String {
    let rows: Vec<Vec<String>> = missing
        .iter()
        .map(|(account_id, resources)| {
            vec![account_label(account_names, account_id), resources.join(", ")]
        })
        .collect();
    table(
        &["Account Name (Account ID)", "Resources Missing CostCenterOther Tags"],
        &rows,
        format,
    )
}

fn user_body(
    summary: &OwnerSummary,
    account_names: &BTreeMap<AccountId, String>,
    format: Format,
) -> String {
    let title = "AWS Monthly Cost Report Summary";
    let intro = "You are receiving this summary because you are tagged as \
                 the owner of AWS resources.";

    let mut body = match format {
        Format::Html => format!("<h3>{title}</h3>{}", paragraph(&format!("<p>{intro}</p>"), format)),
        Format::Text => format!("{title}\n{intro}\n"),
    };

    if let Some(resources) = &summary.resources {
        // Accounts the user owns are reported in full below
        let resources: UsageByAccount = resources
            .iter()
            .filter(|(id, _)| !summary.accounts.as_ref().is_some_and(|a| a.contains_key(*id)))
            .map(|(id, u)| (id.clone(), *u))
            .collect();
        if !resources.is_empty() {
            body.push_str(&paragraph(
                "You are tagged as owning resources in the following accounts:",
                format,
            ));
            body.push_str(&usage_table(&resources, account_names, "Your Total", format));
        }
    }

    if let Some(accounts) = summary.accounts.as_ref().filter(|a| !a.is_empty()) {
        body.push_str(&paragraph(
            "You are tagged as owning the following accounts:",
            format,
        ));
        body.push_str(&usage_table(accounts, account_names, "Account Total", format));
    }

    if let Some(missing) = summary.missing_other_tag.as_ref().filter(|m| !m.is_empty()) {
        body.push_str(&paragraph(
            "Some of the above resources have a \"CostCenter\" tag value \
             of \"Other / 000001\" but do not have a required \
             \"CostCenterOther\" tag. If you need assistance adding the \
             required tag, please contact Sage IT.",
            format,
        ));
        body.push_str(&tags_table(missing, account_names, format));
    }

    match format {
        Format::Html => body.push_str(&paragraph(
            &format!("{DOCS_PROSE}: <a href='{DOCS_URL}'>{DOCS_NAME}</a>"),
            format,
        )),
        Format::Text => body.push_str(&format!("\n{DOCS_PROSE}. See '{DOCS_NAME}' at: {DOCS_URL}\n")),
    }
    body
}

/// Generate the HTML and plain-text bodies for one owner's report.
pub fn build_user_email(
    summary: &OwnerSummary,
    account_names: &BTreeMap<AccountId, String>,
) -> EmailBody {
    let body = EmailBody {
        html: user_body(summary, account_names, Format::Html),
        text: user_body(summary, account_names, Format::Text),
    };
    debug!(html = %body.html, text = %body.text, "Built user email");
    body
}

fn unowned_body(
    unowned: &UsageByAccount,
    account_names: &BTreeMap<AccountId, String>,
    format: Format,
) -> String {
    let title = "AWS Monthly Unowned Cost Summary";
    let prose = "The following costs do not have a tagged owner to notify:";

    let mut body = match format {
        Format::Html => format!("<h3>{title}</h3>"),
        Format::Text => format!("{title}\n\n"),
    };
    body.push_str(&paragraph(prose, format));
    body.push_str(&usage_table(unowned, account_names, "Unowned Costs", format));
    body
}

/// Generate the bodies for the administrator's unowned cost summary.
pub fn build_unowned_email(
    unowned: &UsageByAccount,
    account_names: &BTreeMap<AccountId, String>,
) -> EmailBody {
    let body = EmailBody {
        html: unowned_body(unowned, account_names, Format::Html),
        text: unowned_body(unowned, account_names, Format::Text),
    };
    debug!(html = %body.html, text = %body.text, "Built unowned email");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::summary::Usage;

    const ACCOUNT1: &str = "111122223333";
    const ACCOUNT3: &str = "333344445555";
    const ACCOUNT4: &str = "444455556666";

    fn names() -> BTreeMap<AccountId, String> {
        BTreeMap::from([
            (ACCOUNT1.to_string(), "mock-account-shared".to_string()),
            (ACCOUNT3.to_string(), "mock-account-user3".to_string()),
            (ACCOUNT4.to_string(), "mock-account-user4".to_string()),
        ])
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_dollars(32.1), "$32.10");
        assert_eq!(format_change(Some(0.5)), "50.00%");
        assert_eq!(format_change(Some(-0.021)), "-2.10%");
        assert_eq!(format_change(None), "");
    }

    #[test]
    fn test_user_email_with_resources() {
        let summary = OwnerSummary {
            resources: Some(UsageByAccount::from([(
                ACCOUNT1.to_string(),
                Usage::new(30.0, Some(0.5)),
            )])),
            ..OwnerSummary::default()
        };
        let body = build_user_email(&summary, &names());

        assert!(body.html.starts_with("<h3>AWS Monthly Cost Report Summary</h3>"));
        assert!(body.html.contains("<th>Your Total</th>"));
        assert!(body.html.contains(
            "<tr style='background-color: WhiteSmoke;'><td>mock-account-shared (111122223333)</td>\
             <td>$30.00</td><td>50.00%</td></tr>"
        ));
        assert!(!body.html.contains("Account Total"));
        assert!(body.html.contains(DOCS_URL));

        assert!(body.text.contains(
            "Account Name (Account ID)\tYour Total\tMonth-over-Month Change\n\
             mock-account-shared (111122223333)\t$30.00\t50.00%\n"
        ));
        assert!(body.text.contains("See 'Using AWS Cost Explorer' at:"));
    }

    #[test]
    fn test_owned_account_not_reported_twice() {
        let summary = OwnerSummary {
            resources: Some(UsageByAccount::from([(
                ACCOUNT4.to_string(),
                Usage::new(10.0, None),
            )])),
            accounts: Some(UsageByAccount::from([(
                ACCOUNT4.to_string(),
                Usage::new(10.0, None),
            )])),
            missing_other_tag: None,
        };
        let body = build_user_email(&summary, &names());

        assert!(!body.text.contains("owning resources in the following"));
        assert!(body.text.contains("owning the following accounts"));
        assert_eq!(body.text.matches("mock-account-user4 (444455556666)").count(), 1);
        assert_eq!(body.html.matches("mock-account-user4 (444455556666)").count(), 1);
    }

    #[test]
    fn test_missing_tags_section() {
        let summary = OwnerSummary {
            accounts: Some(UsageByAccount::from([(
                ACCOUNT3.to_string(),
                Usage::new(100.0, Some(0.0)),
            )])),
            missing_other_tag: Some(MissingTags::from([(
                ACCOUNT3.to_string(),
                vec!["i-0hijklmnop".to_string(), "i-1abc".to_string()],
            )])),
            ..OwnerSummary::default()
        };
        let body = build_user_email(&summary, &names());

        assert!(body.html.contains("<th>Resources Missing CostCenterOther Tags</th>"));
        assert!(body.html.contains("<td>i-0hijklmnop, i-1abc</td>"));
        assert!(body.text.contains("mock-account-user3 (333344445555)\ti-0hijklmnop, i-1abc\n"));
        assert!(body.text.contains("0.00%"));
    }

    #[test]
    fn test_unowned_email() {
        let unowned = UsageByAccount::from([
            (ACCOUNT1.to_string(), Usage::new(999.0, Some(0.0))),
            ("999999999999".to_string(), Usage::new(5.0, None)),
        ]);
        let body = build_unowned_email(&unowned, &names());

        assert!(body.html.starts_with("<h3>AWS Monthly Unowned Cost Summary</h3>"));
        assert!(body.html.contains("<th>Unowned Costs</th>"));
        assert!(body.text.contains("mock-account-shared (111122223333)\t$999.00\t0.00%\n"));
        assert!(body.text.contains("Unknown (999999999999)\t$5.00\t\n"));
    }

    #[test]
    fn test_rows_alternate_background() {
        let unowned = UsageByAccount::from([
            (ACCOUNT1.to_string(), Usage::new(999.0, None)),
            (ACCOUNT3.to_string(), Usage::new(5.0, None)),
            (ACCOUNT4.to_string(), Usage::new(7.0, None)),
        ]);
        let html = build_unowned_email(&unowned, &names()).html;

        assert!(html.contains(
            "<tr style='background-color: WhiteSmoke;'><td>mock-account-shared (111122223333)</td>"
        ));
        assert!(html.contains("<tr><td>mock-account-user3 (333344445555)</td>"));
        assert!(html.contains(
            "<tr style='background-color: WhiteSmoke;'><td>mock-account-user4 (444455556666)</td>"
        ));
    }

    #[test]
    fn test_html_is_escaped() {
        let names = BTreeMap::from([(ACCOUNT1.to_string(), "<script>".to_string())]);
        let unowned = UsageByAccount::from([(ACCOUNT1.to_string(), Usage::new(1.0, None))]);
        let body = build_unowned_email(&unowned, &names);
        assert!(body.html.contains("&lt;script&gt; (111122223333)"));
        assert!(body.text.contains("<script> (111122223333)"));
    }
}
