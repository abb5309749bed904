use super::util::{USER_AGENT, check_status, with_retry};
use crate::core::directory::TeamProvider;
use crate::core::summary::Email;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

const PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamMembersPage {
    #[serde(default)]
    total_number_of_results: usize,
    #[serde(default)]
    results: Vec<TeamMember>,
}

#[derive(Debug, Deserialize)]
struct TeamMember {
    member: UserGroupHeader,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserGroupHeader {
    user_name: String,
}

/// Reads team membership from the Synapse REST API
pub struct SynapseClient {
    base_url: String,
    team_id: String,
    email_domain: String,
}

impl SynapseClient {
    pub fn new(base_url: &str, team_id: &str, email_domain: &str) -> Self {
        SynapseClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            team_id: team_id.to_string(),
            email_domain: email_domain.to_string(),
        }
    }
}

#[async_trait]
impl TeamProvider for SynapseClient {
    async fn team_member_emails(&self) -> Result<Vec<Email>> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let url = format!("{}/repo/v1/teamMembers/{}", self.base_url, self.team_id);

        let mut emails = Vec::new();
        let mut offset = 0;
        loop {
            let page_url = format!("{url}?limit={PAGE_SIZE}&offset={offset}");
            debug!("Requesting team members from {}", page_url);
            let response = with_retry(|| client.get(&page_url).send(), 3, 500)
                .await
                .with_context(|| format!("Failed to get members of team {}", self.team_id))?;
            let text = check_status(response, "teamMembers").await?;
            let page: TeamMembersPage = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse team members: '{text}'"))?;

            let count = page.results.len();
            emails.extend(
                page.results
                    .into_iter()
                    .map(|m| format!("{}{}", m.member.user_name, self.email_domain).to_lowercase()),
            );
            offset += count;
            if count == 0 || offset >= page.total_number_of_results {
                break;
            }
        }

        info!("Members of Team Sage: {:?}", emails);
        Ok(emails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_team_member_emails() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repo/v1/teamMembers/123"))
            .and(query_param("offset", "0"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalNumberOfResults": 2,
                "results": [
                    {"teamId": "123", "member": {"ownerId": "456", "userName": "user1"}},
                    {"teamId": "123", "member": {"ownerId": "789", "userName": "User2"}}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = SynapseClient::new(&mock_server.uri(), "123", "@synapse.org");
        let emails = provider.team_member_emails().await.unwrap();
        assert_eq!(emails, vec!["user1@synapse.org", "user2@synapse.org"]);
    }

    #[tokio::test]
    async fn test_team_member_emails_paged() {
        let mock_server = MockServer::start().await;
        let first_page: Vec<_> = (0..PAGE_SIZE)
            .map(|i| json!({"member": {"userName": format!("user{i}")}}))
            .collect();
        Mock::given(method("GET"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalNumberOfResults": PAGE_SIZE + 1,
                "results": first_page
            })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("offset", PAGE_SIZE.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalNumberOfResults": PAGE_SIZE + 1,
                "results": [{"member": {"userName": "last"}}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = SynapseClient::new(&mock_server.uri(), "273957", "@synapse.org");
        let emails = provider.team_member_emails().await.unwrap();
        assert_eq!(emails.len(), PAGE_SIZE + 1);
        assert_eq!(emails.last().map(String::as_str), Some("last@synapse.org"));
    }

    #[tokio::test]
    async fn test_team_member_emails_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Team not found"))
            .mount(&mock_server)
            .await;

        let provider = SynapseClient::new(&mock_server.uri(), "1", "@synapse.org");
        assert!(provider.team_member_emails().await.is_err());
    }
}
