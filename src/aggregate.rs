//! Reshape cost query results into per-owner and per-account totals

use crate::core::cost::CostGroup;
use crate::core::summary::{AccountId, Email, MissingTags, Usage, UsageByAccount};
use anyhow::{Result, bail};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Placeholder the cost API uses for usage not attributable to a resource.
pub const NO_RESOURCE_ID: &str = "NoResourceId";

pub type OwnerAccountCosts = BTreeMap<Email, BTreeMap<AccountId, f64>>;
pub type OwnerUsage = BTreeMap<Email, UsageByAccount>;

/// Fractional change from `compare` to `target`, if there is a base to compare to.
pub fn percent_change(target: f64, compare: Option<f64>) -> Option<f64> {
    match compare {
        Some(previous) if previous != 0.0 => Some(target / previous - 1.0),
        _ => None,
    }
}

/// The value part of a `"<category name>$<category value>"` key.
fn category_value(key: &str) -> &str {
    key.split_once('$').map_or(key, |(_, value)| value)
}

/// Build `owner -> account -> total` from groups keyed by owner category and account.
///
/// Owners are lower-cased, so differently cased tag values are merged.
pub fn owner_account_costs(groups: &[CostGroup]) -> Result<OwnerAccountCosts> {
    let mut costs = OwnerAccountCosts::new();
    for group in groups {
        let [owner_key, account_id] = group.keys.as_slice() else {
            bail!("Unexpected group keys: {:?}", group.keys);
        };
        let owner = category_value(owner_key).trim().to_lowercase();
        *costs
            .entry(owner)
            .or_default()
            .entry(account_id.clone())
            .or_default() += group.amount;
    }
    Ok(costs)
}

/// Build `account -> total` from groups keyed by account.
pub fn account_costs(groups: &[CostGroup]) -> Result<BTreeMap<AccountId, f64>> {
    let mut costs = BTreeMap::new();
    for group in groups {
        let [account_id] = group.keys.as_slice() else {
            bail!("Unexpected group keys: {:?}", group.keys);
        };
        *costs.entry(account_id.clone()).or_default() += group.amount;
    }
    Ok(costs)
}

/// Per-owner resource usage for the target period, with change from the compare period.
pub fn resource_totals(
    target: &OwnerAccountCosts,
    compare: &OwnerAccountCosts,
    minimum: f64,
) -> OwnerUsage {
    let mut output = OwnerUsage::new();
    for (owner, accounts) in target {
        for (account_id, total) in accounts {
            if *total < minimum {
                debug!("Skipping resource total below ${minimum}: {owner} {account_id} (${total})");
                continue;
            }
            let previous = compare.get(owner).and_then(|a| a.get(account_id)).copied();
            output
                .entry(owner.clone())
                .or_default()
                .insert(account_id.clone(), Usage::new(*total, percent_change(*total, previous)));
        }
    }
    output
}

/// Per-owner account usage for every account carrying an owner tag.
pub fn account_totals(
    target: &BTreeMap<AccountId, f64>,
    compare: &BTreeMap<AccountId, f64>,
    owners: &BTreeMap<Email, Vec<AccountId>>,
    minimum: f64,
) -> OwnerUsage {
    let mut output = OwnerUsage::new();
    for (owner, account_ids) in owners {
        for account_id in account_ids {
            let Some(total) = target.get(account_id).copied() else {
                continue;
            };
            if total < minimum {
                debug!("Skipping account total below ${minimum}: {owner} {account_id} (${total})");
                continue;
            }
            let previous = compare.get(account_id).copied();
            output
                .entry(owner.clone())
                .or_default()
                .insert(account_id.clone(), Usage::new(total, percent_change(total, previous)));
        }
    }
    output
}

/// Usage with no owner tag, excluding accounts that have an account owner.
pub fn unowned_totals(
    resources: &OwnerUsage,
    owners: &BTreeMap<Email, Vec<AccountId>>,
) -> UsageByAccount {
    let owned: BTreeSet<&AccountId> = owners.values().flatten().collect();
    resources
        .get("")
        .map(|usage| {
            usage
                .iter()
                .filter(|(account_id, _)| !owned.contains(account_id))
                .map(|(account_id, u)| (account_id.clone(), *u))
                .collect()
        })
        .unwrap_or_default()
}

/// Build `account -> [resource ids]` from groups keyed by account and resource.
pub fn missing_tag_resources(groups: &[CostGroup]) -> Result<MissingTags> {
    let mut output: BTreeMap<AccountId, BTreeSet<String>> = BTreeMap::new();
    for group in groups {
        let [account_id, resource_id] = group.keys.as_slice() else {
            bail!("Unexpected group keys: {:?}", group.keys);
        };
        if resource_id == NO_RESOURCE_ID {
            continue;
        }
        output
            .entry(account_id.clone())
            .or_default()
            .insert(resource_id.clone());
    }
    Ok(output
        .into_iter()
        .map(|(account_id, ids)| (account_id, ids.into_iter().collect()))
        .collect())
}
