//! Cost accounting abstractions

use super::period::CostPeriod;
use anyhow::Result;
use async_trait::async_trait;

/// One group of a cost query result, flattened across result periods.
///
/// `keys` holds one value per group-by dimension, in query order.
#[derive(Debug, Clone, PartialEq)]
pub struct CostGroup {
    pub keys: Vec<String>,
    pub amount: f64,
}

impl CostGroup {
    pub fn new<K: Into<String>>(keys: impl IntoIterator<Item = K>, amount: f64) -> Self {
        CostGroup {
            keys: keys.into_iter().map(Into::into).collect(),
            amount,
        }
    }
}

#[async_trait]
pub trait CostProvider: Send + Sync {
    /// Costs grouped by owner category value, then by account.
    async fn owner_account_costs(&self, period: &CostPeriod) -> Result<Vec<CostGroup>>;

    /// Costs grouped by account.
    async fn account_costs(&self, period: &CostPeriod) -> Result<Vec<CostGroup>>;

    /// Resources owned by `owner` that are missing the required
    /// `CostCenterOther` tag, grouped by account then resource id.
    async fn missing_tag_resources(&self, period: &CostPeriod, owner: &str)
    -> Result<Vec<CostGroup>>;
}
