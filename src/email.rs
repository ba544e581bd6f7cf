use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use crate::domain::subscriber::email::Email;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Email service is not configured")]
    NotConfigured,

    /// Display omits the reqwest error, which contains the provider URL.
    #[error("Failed to reach the email service")]
    Transport(#[from] reqwest::Error),

    #[error("Email service rejected the message ({status}): {detail}")]
    Rejected { status: u16, detail: String },
}

#[derive(Clone)]
pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: Email,
    authorization_token: Secret<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProviderError {
    message: String,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: Email,
        authorization_token: Secret<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            sender,
            authorization_token,
        })
    }

    #[tracing::instrument(name = "Send an email", skip(self, subject, html_content, text_content), fields(recipient = %recipient))]
    pub async fn send_email(
        &self,
        recipient: &Email,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), EmailError> {
        let url = format!("{}/email", self.base_url.trim_end_matches('/'));
        let request_body = SendEmailRequest {
            from: self.sender.as_ref(),
            to: recipient.as_ref(),
            subject,
            html_body: html_content,
            text_body: text_content,
        };

        let response = self
            .http_client
            .post(&url)
            .header(
                "X-Postmark-Server-Token",
                self.authorization_token.expose_secret(),
            )
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        // Prefer the provider's own explanation over the raw body.
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ProviderError>(&body)
            .map(|e| e.message)
            .unwrap_or(body);

        Err(EmailError::Rejected {
            status: status.as_u16(),
            detail,
        })
    }
}
