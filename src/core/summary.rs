//! Report data model shared by aggregation, filtering and rendering

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type AccountId = String;
pub type Email = String;

/// A dollar total with an optional month-over-month change.
///
/// `change` is a fraction: 1.0 is 100% growth, -0.1 is a 10% drop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
}

impl Usage {
    pub fn new(total: f64, change: Option<f64>) -> Self {
        Usage { total, change }
    }
}

pub type UsageByAccount = BTreeMap<AccountId, Usage>;

/// Resources missing a required tag, by account.
pub type MissingTags = BTreeMap<AccountId, Vec<String>>;

/// Everything reported to a single owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<UsageByAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts: Option<UsageByAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_other_tag: Option<MissingTags>,
}

impl OwnerSummary {
    /// Sum of resource totals and account totals, counting a shared account once.
    pub fn grand_total(&self) -> f64 {
        let accounts = self.accounts.as_ref();
        let account_sum: f64 = accounts.map_or(0.0, |a| a.values().map(|u| u.total).sum());
        let resource_sum: f64 = self.resources.as_ref().map_or(0.0, |r| {
            r.iter()
                .filter(|(id, _)| !accounts.is_some_and(|a| a.contains_key(*id)))
                .map(|(_, u)| u.total)
                .sum()
        });
        account_sum + resource_sum
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub account_names: BTreeMap<AccountId, String>,
    pub per_user: BTreeMap<Email, OwnerSummary>,
    pub unowned: UsageByAccount,
}
