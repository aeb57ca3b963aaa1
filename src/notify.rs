use std::time::Duration;

use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Serialize;
use tracing::info;

use crate::error::NotifyError;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

pub fn inactivity_message(name: &str, handle: &str) -> Message {
    Message {
        subject: format!("Hey {name}, you've been inactive on Codeforces!"),
        body: format!(
            "<p>Hi {name},</p>\n\
             <p>We noticed that you haven't solved any problems on Codeforces in the last 7 days.</p>\n\
             <p>Stay consistent and keep practicing!</p>\n\
             <p><a href=\"https://codeforces.com/profile/{handle}\" target=\"_blank\">View your Codeforces profile</a></p>\n"
        ),
    }
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Hands messages to a mail relay that accepts JSON over HTTP.
pub struct WebhookNotifier {
    inner: ClientWithMiddleware,
    url: reqwest::Url,
    from: String,
}

impl WebhookNotifier {
    pub fn new(
        url: reqwest::Url,
        from: &str,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let inner = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner,
            url,
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, address: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let response = self
            .inner
            .post(self.url.clone())
            .json(&MailRequest {
                from: &self.from,
                to: address,
                subject,
                html: body,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// Used when no mail relay is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, address: &str, subject: &str, _body: &str) -> Result<(), NotifyError> {
        info!(to = %address, subject = %subject, "notification (log only)");
        Ok(())
    }
}
