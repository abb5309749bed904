//! Organization directory abstractions

use super::summary::{AccountId, Email};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
}

#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    async fn accounts(&self) -> Result<Vec<Account>>;

    /// Owner email to the accounts tagged with that owner.
    async fn account_owners(&self) -> Result<BTreeMap<Email, Vec<AccountId>>>;
}

#[async_trait]
pub trait TeamProvider: Send + Sync {
    /// Email addresses of the internal team members.
    async fn team_member_emails(&self) -> Result<Vec<Email>>;
}
