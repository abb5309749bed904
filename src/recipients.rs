//! Decide who receives a report

use crate::core::config::AppConfig;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RecipientPolicy {
    restrict: bool,
    approved: HashSet<String>,
    skiplist: HashSet<String>,
    internal_domains: Vec<String>,
    team_domain: String,
    team_members: HashSet<String>,
}

impl RecipientPolicy {
    pub fn new(config: &AppConfig, team_members: &[String]) -> Self {
        if config.restrict {
            warn!("Only sending emails to: {:?}", config.approved);
        }
        RecipientPolicy {
            restrict: config.restrict,
            approved: config.approved.iter().map(|e| e.to_lowercase()).collect(),
            skiplist: config.skiplist.iter().map(|e| e.to_lowercase()).collect(),
            internal_domains: config
                .internal_domains
                .iter()
                .map(|d| d.to_lowercase())
                .collect(),
            team_domain: config.synapse.email_domain.to_lowercase(),
            team_members: team_members.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    /// Determine if a given address should receive an email.
    pub fn is_valid(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();

        if self.skiplist.contains(&email) {
            info!("Skipping address: '{email}'");
            return false;
        }

        if self.restrict {
            if self.approved.contains(&email) {
                return true;
            }
            info!("Restricted, skipping address: '{email}'");
            return false;
        }

        if self.internal_domains.iter().any(|d| email.ends_with(d.as_str())) {
            return true;
        }

        if email.ends_with(&self.team_domain) {
            if self.team_members.contains(&email) {
                return true;
            }
            info!("Skipping external synapse user: '{email}'");
            return false;
        }

        // Not every tag value is an address; uncategorized costs have an empty owner
        warn!("Invalid email address: '{email}'");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team() -> Vec<String> {
        vec!["user1@synapse.org".to_string(), "user2@synapse.org".to_string()]
    }

    fn policy(config: AppConfig) -> RecipientPolicy {
        RecipientPolicy::new(&config, &team())
    }

    #[test]
    fn test_internal_domains_are_valid() {
        let policy = policy(AppConfig::default());
        assert!(policy.is_valid("user3@sagebionetworks.org"));
        assert!(policy.is_valid("User4@SageBase.org"));
    }

    #[test]
    fn test_team_members_only_for_synapse_domain() {
        let policy = policy(AppConfig::default());
        assert!(policy.is_valid("user1@synapse.org"));
        assert!(policy.is_valid("USER2@synapse.org"));
        assert!(!policy.is_valid("stranger@synapse.org"));
    }

    #[test]
    fn test_invalid_addresses() {
        let policy = policy(AppConfig::default());
        assert!(!policy.is_valid(""));
        assert!(!policy.is_valid("someone@example.com"));
        assert!(!policy.is_valid("not-an-email"));
    }

    #[test]
    fn test_skiplist_wins() {
        let policy = policy(AppConfig {
            skiplist: vec!["user1@synapse.org".to_string()],
            restrict: true,
            approved: vec!["user1@synapse.org".to_string()],
            ..AppConfig::default()
        });
        assert!(!policy.is_valid("user1@synapse.org"));
    }

    #[test]
    fn test_restricted_mode_uses_approved_list() {
        let policy = policy(AppConfig {
            restrict: true,
            approved: vec![
                "user3@sagebase.org".to_string(),
                "outside@example.com".to_string(),
            ],
            ..AppConfig::default()
        });
        assert!(policy.is_valid("user3@sagebase.org"));
        assert!(policy.is_valid("outside@example.com"));
        assert!(!policy.is_valid("user4@sagebase.org"));
        assert!(!policy.is_valid("user1@synapse.org"));
    }
}
