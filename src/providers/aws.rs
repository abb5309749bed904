//! Minimal SigV4-signed client for AWS JSON APIs

use super::util::{USER_AGENT, check_status, is_throttled, with_retry};
use crate::core::config::AwsConfig;
use anyhow::{Context, Result, anyhow};
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{SignableBody, SignableRequest, SigningSettings, sign};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use http::{HeaderMap, HeaderValue, Request};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::{Duration, SystemTime};
use tracing::{debug, instrument, warn};

const AMZ_JSON: &str = "application/x-amz-json-1.1";

// Throttled sends are retried with doubling delays, 10 attempts in total
const MAX_THROTTLED_ATTEMPTS: u32 = 10;
const THROTTLE_BASE_DELAY_MS: u64 = 100;
const THROTTLE_MAX_DELAY_MS: u64 = 5_000;

/// Resolve credentials from configuration, then the standard environment variables.
pub fn resolve_credentials(config: &AwsConfig) -> Result<Credentials> {
    resolve_credentials_with(config, |key| std::env::var(key).ok())
}

fn resolve_credentials_with<F>(config: &AwsConfig, lookup: F) -> Result<Credentials>
where
    F: Fn(&str) -> Option<String>,
{
    if let (Some(access_key), Some(secret_key)) =
        (&config.access_key_id, &config.secret_access_key)
    {
        return Ok(Credentials::new(
            access_key,
            secret_key,
            config.session_token.clone(),
            None,
            "cost-report-config",
        ));
    }

    match (
        lookup("AWS_ACCESS_KEY_ID"),
        lookup("AWS_SECRET_ACCESS_KEY"),
    ) {
        (Some(access_key), Some(secret_key)) => Ok(Credentials::new(
            access_key,
            secret_key,
            lookup("AWS_SESSION_TOKEN"),
            None,
            "cost-report-env",
        )),
        _ => Err(anyhow!(
            "No AWS credentials configured. Set `aws.access_key_id` and \
             `aws.secret_access_key` in the config file or the AWS_ACCESS_KEY_ID \
             and AWS_SECRET_ACCESS_KEY environment variables."
        )),
    }
}

#[derive(Clone)]
pub struct AwsClient {
    client: reqwest::Client,
    credentials: Credentials,
    region: String,
    service: &'static str,
    endpoint: String,
}

impl AwsClient {
    pub fn new(
        credentials: Credentials,
        region: &str,
        service: &'static str,
        endpoint: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(AwsClient {
            client,
            credentials,
            region: region.to_string(),
            service,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Call a JSON 1.1 protocol operation, e.g. `AWSInsightsIndexService.GetCostAndUsage`.
    ///
    /// Reads are retried on transport failures.
    #[instrument(name = "AwsJsonCall", skip(self, request), fields(service = self.service))]
    pub async fn call<Req, Resp>(&self, target: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/", self.endpoint);
        let body = serde_json::to_vec(request)?;

        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static(AMZ_JSON));
        headers.insert("x-amz-target", HeaderValue::from_str(target)?);
        let headers = self.signed_headers(&url, headers, &body)?;

        debug!("Calling {} at {}", target, url);
        let response = with_retry(
            || {
                self.client
                    .post(&url)
                    .headers(headers.clone())
                    .body(body.clone())
                    .send()
            },
            3,
            500,
        )
        .await
        .with_context(|| format!("Request to {target} failed"))?;

        let text = check_status(response, target).await?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {target} response: '{text}'"))
    }

    /// POST a JSON document to a REST-style path.
    ///
    /// Only throttled responses are resent. A transport failure may hide a
    /// request the service accepted, so it is returned as is.
    #[instrument(name = "AwsRestCall", skip(self, request), fields(service = self.service))]
    pub async fn post<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.post_with_attempts(path, request, MAX_THROTTLED_ATTEMPTS)
            .await
    }

    async fn post_with_attempts<Req, Resp>(
        &self,
        path: &str,
        request: &Req,
        max_attempts: u32,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.endpoint, path);
        let body = serde_json::to_vec(request)?;

        let mut attempt = 1;
        loop {
            let mut headers = HeaderMap::new();
            headers.insert("content-type", HeaderValue::from_static("application/json"));
            let headers = self.signed_headers(&url, headers, &body)?;

            debug!("Posting to {} (attempt {})", url, attempt);
            let response = self
                .client
                .post(&url)
                .headers(headers)
                .body(body.clone())
                .send()
                .await
                .with_context(|| format!("Request to {url} failed"))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .with_context(|| format!("Failed to read {path} response"))?;

            if is_throttled(status, &text) && attempt < max_attempts {
                let delay = throttle_delay(attempt);
                warn!(
                    "Throttled by {} ({}), retrying in {:?}",
                    self.service, status, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            if !status.is_success() {
                return Err(anyhow!("HTTP error {status} from {path}: {text}"));
            }
            return serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {path} response: '{text}'"));
        }
    }

    fn signed_headers(&self, url: &str, headers: HeaderMap, body: &[u8]) -> Result<HeaderMap> {
        let mut signable_headers = Vec::new();
        for (name, value) in headers.iter() {
            signable_headers.push((name.as_str(), value.to_str()?));
        }

        let signable_request = SignableRequest::new(
            "POST",
            url,
            signable_headers.iter().map(|(k, v)| (*k, *v)),
            SignableBody::Bytes(body),
        )?;

        let identity = Identity::new(self.credentials.clone(), None);
        let signing_params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(self.service)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()?
            .into();

        let (signing_instructions, _) = sign(signable_request, &signing_params)?.into_parts();

        let mut http_request = Request::builder()
            .method("POST")
            .uri(url)
            .body(body.to_vec())
            .context("Failed to build request for signing")?;
        *http_request.headers_mut() = headers;
        signing_instructions.apply_to_request_http1x(&mut http_request);

        Ok(http_request.headers().clone())
    }
}

fn throttle_delay(attempt: u32) -> Duration {
    let delay = THROTTLE_BASE_DELAY_MS.saturating_mul(1 << (attempt - 1).min(16));
    Duration::from_millis(delay.min(THROTTLE_MAX_DELAY_MS))
}

#[cfg(test)]
pub(crate) fn test_credentials() -> Credentials {
    Credentials::new("AKIDEXAMPLE", "secret", None, None, "test")
}
