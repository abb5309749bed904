use super::aws::AwsClient;
use crate::core::email::{EmailMessage, EmailSender};
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use serde::{Deserialize, Serialize};
use tracing::instrument;

const CHARSET: &str = "UTF-8";
const SEND_EMAIL_PATH: &str = "/v2/email/outbound-emails";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Content<'a> {
    data: &'a str,
    charset: &'static str,
}

impl<'a> Content<'a> {
    fn utf8(data: &'a str) -> Self {
        Content {
            data,
            charset: CHARSET,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Body<'a> {
    html: Content<'a>,
    text: Content<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SimpleMessage<'a> {
    subject: Content<'a>,
    body: Body<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct EmailContent<'a> {
    simple: SimpleMessage<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Destination<'a> {
    to_addresses: [&'a str; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from_email_address: &'a str,
    destination: Destination<'a>,
    content: EmailContent<'a>,
}

impl<'a> From<&'a EmailMessage> for SendEmailRequest<'a> {
    fn from(message: &'a EmailMessage) -> Self {
        SendEmailRequest {
            from_email_address: &message.sender,
            destination: Destination {
                to_addresses: [&message.recipient],
            },
            content: EmailContent {
                simple: SimpleMessage {
                    subject: Content::utf8(&message.subject),
                    body: Body {
                        html: Content::utf8(&message.body.html),
                        text: Content::utf8(&message.body.text),
                    },
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailResponse {
    message_id: String,
}

pub struct SesClient {
    client: AwsClient,
}

impl SesClient {
    pub fn new(endpoint: &str, region: &str, credentials: Credentials) -> Result<Self> {
        let client = AwsClient::new(credentials, region, "ses", endpoint)?;
        Ok(SesClient { client })
    }
}

#[async_trait]
impl EmailSender for SesClient {
    #[instrument(name = "SesSend", skip(self, message), fields(recipient = %message.recipient))]
    async fn send(&self, message: &EmailMessage) -> Result<String> {
        let request = SendEmailRequest::from(message);
        let response: SendEmailResponse = self
            .client
            .post(SEND_EMAIL_PATH, &request)
            .await
            .with_context(|| format!("Failed to send email to {}", message.recipient))?;
        Ok(response.message_id)
    }
}
