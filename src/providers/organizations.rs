use super::aws::AwsClient;
use crate::core::directory::{Account, DirectoryProvider};
use crate::core::summary::{AccountId, Email};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Account tag naming the account owner
pub const OWNER_TAG: &str = "AccountOwner";

const LIST_ACCOUNTS: &str = "AWSOrganizationsV20161128.ListAccounts";
const LIST_TAGS: &str = "AWSOrganizationsV20161128.ListTagsForResource";

// Organizations throttles aggressively
const MAX_CONCURRENT_TAG_REQUESTS: usize = 4;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListAccountsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListAccountsResponse {
    #[serde(default)]
    accounts: Vec<AccountEntry>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccountEntry {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ListTagsRequest<'a> {
    resource_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListTagsResponse {
    #[serde(default)]
    tags: Vec<Tag>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Tag {
    key: String,
    value: String,
}

pub struct OrganizationsClient {
    client: AwsClient,
}

impl OrganizationsClient {
    pub fn new(endpoint: &str, credentials: Credentials) -> Result<Self> {
        let client = AwsClient::new(credentials, "us-east-1", "organizations", endpoint)?;
        Ok(OrganizationsClient { client })
    }

    async fn account_tags(&self, account_id: &str) -> Result<Vec<Tag>> {
        let mut tags = Vec::new();
        let mut next_token = None;
        loop {
            let request = ListTagsRequest {
                resource_id: account_id,
                next_token,
            };
            let response: ListTagsResponse = self
                .client
                .call(LIST_TAGS, &request)
                .await
                .with_context(|| format!("Failed to list tags for account {account_id}"))?;
            tags.extend(response.tags);
            match response.next_token.filter(|t| !t.is_empty()) {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        Ok(tags)
    }
}

#[async_trait]
impl DirectoryProvider for OrganizationsClient {
    async fn accounts(&self) -> Result<Vec<Account>> {
        let mut accounts = Vec::new();
        let mut next_token = None;
        loop {
            let request = ListAccountsRequest { next_token };
            let response: ListAccountsResponse = self
                .client
                .call(LIST_ACCOUNTS, &request)
                .await
                .context("Failed to list accounts")?;
            accounts.extend(response.accounts.into_iter().map(|a| Account {
                id: a.id,
                name: a.name,
            }));
            match response.next_token.filter(|t| !t.is_empty()) {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        debug!("Found {} accounts", accounts.len());
        Ok(accounts)
    }

    async fn account_owners(&self) -> Result<BTreeMap<Email, Vec<AccountId>>> {
        let accounts = self.accounts().await?;

        let tagged: Vec<(AccountId, Vec<Tag>)> = stream::iter(accounts)
            .map(|account| async move {
                let tags = self.account_tags(&account.id).await?;
                Ok::<_, anyhow::Error>((account.id, tags))
            })
            .buffered(MAX_CONCURRENT_TAG_REQUESTS)
            .try_collect()
            .await?;

        let mut owners: BTreeMap<Email, Vec<AccountId>> = BTreeMap::new();
        for (account_id, tags) in tagged {
            for tag in tags.into_iter().filter(|t| t.key == OWNER_TAG) {
                let owner = tag.value.trim().to_lowercase();
                if owner.is_empty() {
                    continue;
                }
                owners.entry(owner).or_default().push(account_id.clone());
            }
        }
        info!("Found {} account owners", owners.len());
        Ok(owners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::aws::test_credentials;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_tags(server: &MockServer, account_id: &str, owner: Option<&str>) {
        let tags = match owner {
            Some(owner) => json!([{"Key": OWNER_TAG, "Value": owner}, {"Key": "Team", "Value": "x"}]),
            None => json!([]),
        };
        Mock::given(method("POST"))
            .and(header("x-amz-target", LIST_TAGS))
            .and(body_partial_json(json!({"ResourceId": account_id})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Tags": tags})))
            .mount(server)
            .await;
    }

    async fn create_mock_server() -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", LIST_ACCOUNTS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Accounts": [
                    {"Id": "111122223333", "Name": "mock-account-shared"},
                    {"Id": "222233334444", "Name": "mock-account-ignored"},
                    {"Id": "333344445555", "Name": "mock-account-user3"},
                    {"Id": "444455556666", "Name": "mock-account-user4"}
                ]
            })))
            .mount(&mock_server)
            .await;

        mount_tags(&mock_server, "111122223333", None).await;
        mount_tags(&mock_server, "222233334444", None).await;
        mount_tags(&mock_server, "333344445555", Some("user3@sagebionetworks.org")).await;
        mount_tags(&mock_server, "444455556666", Some("User4@Sagebase.org")).await;
        mock_server
    }

    #[tokio::test]
    async fn test_accounts() {
        let mock_server = create_mock_server().await;
        let provider = OrganizationsClient::new(&mock_server.uri(), test_credentials()).unwrap();

        let accounts = provider.accounts().await.unwrap();
        assert_eq!(accounts.len(), 4);
        assert_eq!(
            accounts[2],
            Account {
                id: "333344445555".to_string(),
                name: "mock-account-user3".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_account_owners() {
        let mock_server = create_mock_server().await;
        let provider = OrganizationsClient::new(&mock_server.uri(), test_credentials()).unwrap();

        let owners = provider.account_owners().await.unwrap();
        assert_eq!(
            owners,
            BTreeMap::from([
                (
                    "user3@sagebionetworks.org".to_string(),
                    vec!["333344445555".to_string()]
                ),
                (
                    "user4@sagebase.org".to_string(),
                    vec!["444455556666".to_string()]
                ),
            ])
        );
    }
}
