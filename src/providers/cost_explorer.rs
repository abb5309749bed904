use super::aws::AwsClient;
use crate::core::cost::{CostGroup, CostProvider};
use crate::core::period::CostPeriod;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::debug;

/// Name of the cost category holding owner email addresses
pub const OWNER_CATEGORY: &str = "Owner Email";
const METRIC: &str = "UnblendedCost";

const GET_COST_AND_USAGE: &str = "AWSInsightsIndexService.GetCostAndUsage";
const GET_COST_AND_USAGE_WITH_RESOURCES: &str =
    "AWSInsightsIndexService.GetCostAndUsageWithResources";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GroupDefinition {
    #[serde(rename = "Type")]
    kind: &'static str,
    key: &'static str,
}

const BY_OWNER: GroupDefinition = GroupDefinition {
    kind: "COST_CATEGORY",
    key: OWNER_CATEGORY,
};
const BY_ACCOUNT: GroupDefinition = GroupDefinition {
    kind: "DIMENSION",
    key: "LINKED_ACCOUNT",
};
const BY_RESOURCE: GroupDefinition = GroupDefinition {
    kind: "DIMENSION",
    key: "RESOURCE_ID",
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CostRequest<'a> {
    time_period: &'a CostPeriod,
    granularity: &'static str,
    metrics: [&'static str; 1],
    group_by: &'a [GroupDefinition],
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CostResponse {
    #[serde(default)]
    results_by_time: Vec<ResultByTime>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultByTime {
    #[serde(default)]
    groups: Vec<Group>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Group {
    keys: Vec<String>,
    #[serde(default)]
    metrics: HashMap<String, MetricValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MetricValue {
    amount: String,
}

impl Group {
    fn into_cost_group(self) -> Result<CostGroup> {
        let amount = match self.metrics.get(METRIC) {
            Some(metric) => metric
                .amount
                .parse()
                .with_context(|| format!("Invalid amount '{}' for {:?}", metric.amount, self.keys))?,
            None => 0.0,
        };
        Ok(CostGroup {
            keys: self.keys,
            amount,
        })
    }
}

pub struct CostExplorerClient {
    client: AwsClient,
}

impl CostExplorerClient {
    pub fn new(endpoint: &str, credentials: Credentials) -> Result<Self> {
        // Cost Explorer is only served from us-east-1
        let client = AwsClient::new(credentials, "us-east-1", "ce", endpoint)?;
        Ok(CostExplorerClient { client })
    }

    async fn query(
        &self,
        target: &str,
        period: &CostPeriod,
        group_by: &[GroupDefinition],
        filter: Option<&Value>,
    ) -> Result<Vec<CostGroup>> {
        let mut groups = Vec::new();
        let mut next_page_token = None;
        loop {
            let request = CostRequest {
                time_period: period,
                granularity: "MONTHLY",
                metrics: [METRIC],
                group_by,
                filter,
                next_page_token,
            };
            let response: CostResponse = self.client.call(target, &request).await?;
            for result in response.results_by_time {
                for group in result.groups {
                    groups.push(group.into_cost_group()?);
                }
            }
            match response.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => next_page_token = Some(token),
                None => break,
            }
        }
        debug!("Received {} cost groups for {}", groups.len(), period);
        Ok(groups)
    }
}

/// Resources tagged `CostCenter=Other / 000001` without a `CostCenterOther` tag.
///
/// Owners are lower-cased during aggregation, so the category match ignores case.
fn missing_other_tag_filter(owner: &str) -> Value {
    json!({
        "And": [
            {"CostCategories": {
                "Key": OWNER_CATEGORY,
                "Values": [owner],
                "MatchOptions": ["EQUALS", "CASE_INSENSITIVE"]
            }},
            {"Tags": {"Key": "CostCenter", "Values": ["Other / 000001"]}},
            {"Tags": {"Key": "CostCenterOther", "MatchOptions": ["ABSENT"]}},
        ]
    })
}

#[async_trait]
impl CostProvider for CostExplorerClient {
    async fn owner_account_costs(&self, period: &CostPeriod) -> Result<Vec<CostGroup>> {
        self.query(GET_COST_AND_USAGE, period, &[BY_OWNER, BY_ACCOUNT], None)
            .await
            .context("Failed to get owner costs")
    }

    async fn account_costs(&self, period: &CostPeriod) -> Result<Vec<CostGroup>> {
        self.query(GET_COST_AND_USAGE, period, &[BY_ACCOUNT], None)
            .await
            .context("Failed to get account costs")
    }

    async fn missing_tag_resources(
        &self,
        period: &CostPeriod,
        owner: &str,
    ) -> Result<Vec<CostGroup>> {
        let filter = missing_other_tag_filter(owner);
        self.query(
            GET_COST_AND_USAGE_WITH_RESOURCES,
            period,
            &[BY_ACCOUNT, BY_RESOURCE],
            Some(&filter),
        )
        .await
        .with_context(|| format!("Failed to get untagged resources for {owner}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::aws::test_credentials;
    use chrono::NaiveDate;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn period() -> CostPeriod {
        CostPeriod::month_starting(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()).unwrap()
    }

    const EMAIL_RESPONSE: &str = r#"{
        "GroupDefinitions": [
            {"Type": "COST_CATEGORY", "Key": "Owner Email"},
            {"Type": "DIMENSION", "Key": "LINKED_ACCOUNT"}
        ],
        "ResultsByTime": [{
            "TimePeriod": {"Start": "2023-01-01", "End": "2023-02-01"},
            "Total": {},
            "Groups": [
                {"Keys": ["Owner Email$user1@synapse.org", "111122223333"],
                 "Metrics": {"UnblendedCost": {"Amount": "30.0", "Unit": "USD"}}},
                {"Keys": ["Owner Email$", "111122223333"],
                 "Metrics": {"UnblendedCost": {"Amount": "999", "Unit": "USD"}}}
            ],
            "Estimated": false
        }]
    }"#;

    #[tokio::test]
    async fn test_owner_account_costs() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", GET_COST_AND_USAGE))
            .and(body_partial_json(json!({
                "TimePeriod": {"Start": "2023-01-01", "End": "2023-02-01"},
                "Granularity": "MONTHLY",
                "Metrics": ["UnblendedCost"],
                "GroupBy": [
                    {"Type": "COST_CATEGORY", "Key": "Owner Email"},
                    {"Type": "DIMENSION", "Key": "LINKED_ACCOUNT"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(EMAIL_RESPONSE))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = CostExplorerClient::new(&mock_server.uri(), test_credentials()).unwrap();
        let groups = provider.owner_account_costs(&period()).await.unwrap();

        assert_eq!(
            groups,
            vec![
                CostGroup::new(["Owner Email$user1@synapse.org", "111122223333"], 30.0),
                CostGroup::new(["Owner Email$", "111122223333"], 999.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_account_costs_follows_pages() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"NextPageToken": "page2"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"ResultsByTime": [{"Groups": [
                    {"Keys": ["222233334444"], "Metrics": {"UnblendedCost": {"Amount": "0.01"}}}
                ]}]}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"ResultsByTime": [{"Groups": [
                    {"Keys": ["111122223333"], "Metrics": {"UnblendedCost": {"Amount": "9999"}}}
                ]}], "NextPageToken": "page2"}"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = CostExplorerClient::new(&mock_server.uri(), test_credentials()).unwrap();
        let groups = provider.account_costs(&period()).await.unwrap();

        assert_eq!(
            groups,
            vec![
                CostGroup::new(["111122223333"], 9999.0),
                CostGroup::new(["222233334444"], 0.01),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_tag_resources() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-amz-target", GET_COST_AND_USAGE_WITH_RESOURCES))
            .and(body_partial_json(json!({
                "Filter": missing_other_tag_filter("user3@sagebionetworks.org"),
                "GroupBy": [
                    {"Type": "DIMENSION", "Key": "LINKED_ACCOUNT"},
                    {"Type": "DIMENSION", "Key": "RESOURCE_ID"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"ResultsByTime": [{"Groups": [
                    {"Keys": ["333344445555", "i-0hijklmnop"], "Metrics": {}},
                    {"Keys": ["333344445555", "NoResourceId"], "Metrics": {}}
                ]}]}"#,
            ))
            .mount(&mock_server)
            .await;

        let provider = CostExplorerClient::new(&mock_server.uri(), test_credentials()).unwrap();
        let groups = provider
            .missing_tag_resources(&period(), "user3@sagebionetworks.org")
            .await
            .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].keys, vec!["333344445555", "i-0hijklmnop"]);
        assert_eq!(groups[0].amount, 0.0);
    }

    #[test]
    fn test_missing_tag_filter_ignores_owner_case() {
        let groups = vec![CostGroup::new(
            ["Owner Email$Jane.Doe@Sagebase.org".to_string(), "111122223333".to_string()],
            12.0,
        )];
        let owners = crate::aggregate::owner_account_costs(&groups).unwrap();
        let owner = owners.keys().next().unwrap();
        assert_eq!(owner, "jane.doe@sagebase.org");

        let filter = missing_other_tag_filter(owner);
        assert_eq!(
            filter["And"][0],
            json!({"CostCategories": {
                "Key": "Owner Email",
                "Values": ["jane.doe@sagebase.org"],
                "MatchOptions": ["EQUALS", "CASE_INSENSITIVE"]
            }})
        );
    }

    #[tokio::test]
    async fn test_invalid_amount() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"ResultsByTime": [{"Groups": [
                    {"Keys": ["111122223333"], "Metrics": {"UnblendedCost": {"Amount": "lots"}}}
                ]}]}"#,
            ))
            .mount(&mock_server)
            .await;

        let provider = CostExplorerClient::new(&mock_server.uri(), test_credentials()).unwrap();
        assert!(provider.account_costs(&period()).await.is_err());
    }
}
