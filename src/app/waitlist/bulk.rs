//! Bounded fan-out of one announcement to many recipients.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::schema::FailedRecipient;
use crate::domain::subscriber::email::Email;
use crate::email::EmailClient;

pub struct Announcement {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

impl Announcement {
    /// Render a plain-text body as HTML by joining its lines with `<br>`.
    /// When `escape_html` is false, markup in the body is kept verbatim.
    pub fn new(subject: String, body: String, escape_html: bool) -> Self {
        let html_body = body
            .lines()
            .map(|line| {
                if escape_html {
                    htmlescape::encode_minimal(line)
                } else {
                    line.to_owned()
                }
            })
            .collect::<Vec<_>>()
            .join("<br>");

        Self {
            subject,
            html_body,
            text_body: body,
        }
    }
}

/// Per-recipient outcome of a bulk send, in request order.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub sent: Vec<String>,
    pub failed: Vec<FailedRecipient>,
}

impl DeliveryReport {
    pub fn total(&self) -> usize {
        self.sent.len() + self.failed.len()
    }
}

/// Send `announcement` to every recipient with at most `max_concurrency`
/// requests in flight, and wait for all of them.
///
/// Addresses that fail validation are reported as failed without a send
/// attempt. A failed recipient never stops the others.
#[tracing::instrument(name = "Deliver announcement", skip_all, fields(recipients = recipients.len()))]
pub async fn deliver(
    email_client: &EmailClient,
    announcement: Announcement,
    recipients: Vec<String>,
    max_concurrency: usize,
) -> anyhow::Result<DeliveryReport> {
    let announcement = Arc::new(announcement);
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut outcomes: Vec<Option<Result<(), String>>> = vec![None; recipients.len()];
    let mut deliveries = JoinSet::new();

    for (position, recipient) in recipients.iter().enumerate() {
        let email = match Email::try_from(recipient.clone()) {
            Ok(email) => email,
            Err(e) => {
                outcomes[position] = Some(Err(e));
                continue;
            }
        };

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("The delivery semaphore was closed.")?;
        let email_client = email_client.clone();
        let announcement = announcement.clone();

        deliveries.spawn(async move {
            let outcome = email_client
                .send_email(
                    &email,
                    &announcement.subject,
                    &announcement.html_body,
                    &announcement.text_body,
                )
                .await
                .map_err(|e| e.to_string());
            drop(permit);
            (position, outcome)
        });
    }

    while let Some(joined) = deliveries.join_next().await {
        let (position, outcome) = joined.context("A delivery task panicked.")?;
        outcomes[position] = Some(outcome);
    }

    let mut report = DeliveryReport::default();
    for (recipient, outcome) in recipients.into_iter().zip(outcomes) {
        match outcome {
            Some(Ok(())) => report.sent.push(recipient),
            Some(Err(error)) => {
                tracing::warn!(recipient = %recipient, error = %error, "failed to deliver announcement");
                report.failed.push(FailedRecipient {
                    email: recipient,
                    error,
                })
            }
            None => report.failed.push(FailedRecipient {
                email: recipient,
                error: "Delivery was not attempted".into(),
            }),
        }
    }

    Ok(report)
}
