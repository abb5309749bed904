use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Endpoint overrides, mostly useful for testing
    pub cost_explorer_url: Option<String>,
    pub organizations_url: Option<String>,
    pub ses_url: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        AwsConfig {
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            cost_explorer_url: None,
            organizations_url: None,
            ses_url: None,
        }
    }
}

impl AwsConfig {
    // Cost Explorer and Organizations are global services served from us-east-1
    pub fn cost_explorer_endpoint(&self) -> String {
        self.cost_explorer_url
            .clone()
            .unwrap_or_else(|| "https://ce.us-east-1.amazonaws.com".to_string())
    }

    pub fn organizations_endpoint(&self) -> String {
        self.organizations_url
            .clone()
            .unwrap_or_else(|| "https://organizations.us-east-1.amazonaws.com".to_string())
    }

    pub fn ses_endpoint(&self) -> String {
        self.ses_url
            .clone()
            .unwrap_or_else(|| format!("https://email.{}.amazonaws.com", self.region))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SynapseConfig {
    pub base_url: String,
    pub team_id: String,
    pub email_domain: String,
}

impl Default for SynapseConfig {
    fn default() -> Self {
        SynapseConfig {
            base_url: "https://repo-prod.prod.sagebase.org".to_string(),
            team_id: "273957".to_string(),
            email_domain: "@synapse.org".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// Entries with a monthly total below this are not reported
    pub minimum: f64,
    /// Only send to addresses in `approved`
    pub restrict: bool,
    pub approved: Vec<String>,
    /// Addresses that opted out
    pub skiplist: Vec<String>,
    pub sender: Option<String>,
    /// Receives the unowned cost summary
    pub admin_email: Option<String>,
    pub internal_domains: Vec<String>,
    pub send_interval_ms: u64,
    pub aws: AwsConfig,
    pub synapse: SynapseConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            minimum: 1.0,
            restrict: false,
            approved: Vec::new(),
            skiplist: Vec::new(),
            sender: None,
            admin_email: None,
            internal_domains: vec![
                "@sagebase.org".to_string(),
                "@sagebionetworks.org".to_string(),
            ],
            // SES allows 14 messages per second
            send_interval_ms: 72,
            aws: AwsConfig::default(),
            synapse: SynapseConfig::default(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config file at {}, using defaults", config_path.display());
            return Self::default().with_env_overrides();
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "sagebionetworks", "cost-report")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        config.with_env_overrides()
    }

    /// Apply the job's environment variables on top of the file settings.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(minimum) = lookup("MINIMUM") {
            self.minimum = minimum
                .trim()
                .parse()
                .with_context(|| format!("Invalid MINIMUM value: '{minimum}'"))?;
        }
        if let Some(restrict) = lookup("RESTRICT") {
            self.restrict = restrict.trim().eq_ignore_ascii_case("true");
        }
        if let Some(approved) = lookup("APPROVED") {
            self.approved = split_list(&approved);
        }
        if let Some(skiplist) = lookup("SKIPLIST") {
            self.skiplist = split_list(&skiplist);
        }
        if let Some(sender) = lookup("SENDER") {
            self.sender = Some(sender);
        }
        if let Some(admin) = lookup("ADMIN_EMAIL") {
            self.admin_email = Some(admin).filter(|a| !a.trim().is_empty());
        }
        Ok(self.normalized())
    }

    fn normalized(mut self) -> Self {
        for list in [
            &mut self.approved,
            &mut self.skiplist,
            &mut self.internal_domains,
        ] {
            for entry in list.iter_mut() {
                *entry = entry.trim().to_lowercase();
            }
        }
        self.synapse.email_domain = self.synapse.email_domain.to_lowercase();
        self
    }

    pub fn sender(&self) -> Result<&str> {
        self.sender
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .context("No sender address configured (set `sender` or SENDER)")
    }
}
