//! Client for the public Codeforces API.
//!
//! Only the three read endpoints the sync engine needs are wrapped. Requests go
//! through `reqwest_middleware` with an exponential backoff retry policy, so
//! transient failures are retried here and never by callers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::ClientError;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub handle: String,
    pub rating: Option<i32>,
    pub max_rating: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingChange {
    pub contest_id: i64,
    pub contest_name: String,
    pub rank: i64,
    pub old_rating: i32,
    pub new_rating: i32,
    pub rating_update_time_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub verdict: Option<String>,
    pub creation_time_seconds: i64,
    pub problem: Problem,
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        self.verdict.as_deref() == Some("OK")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub contest_id: Option<i64>,
    pub index: String,
    pub name: String,
    pub rating: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    comment: Option<String>,
    result: Option<T>,
}

#[async_trait]
pub trait ContestClient: Send + Sync {
    async fn get_profile(&self, handle: &str) -> Result<Profile, ClientError>;

    async fn get_rating_history(&self, handle: &str) -> Result<Vec<RatingChange>, ClientError>;

    async fn get_submissions(
        &self,
        handle: &str,
        from: u32,
        count: u32,
    ) -> Result<Vec<Submission>, ClientError>;
}

pub struct CodeforcesClient {
    inner: ClientWithMiddleware,
    base_url: Url,
}

impl CodeforcesClient {
    pub fn new(base_url: &str, max_retries: u32, timeout: Duration) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Build)?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let inner = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { inner, base_url })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let mut url = self.base_url.join(method)?;
        url.query_pairs_mut().extend_pairs(query);
        debug!(%url, "calling codeforces");

        let response = self.inner.get(url).send().await?;
        let status = response.status();
        let body = response.text().await.map_err(ClientError::Body)?;

        // Codeforces answers unknown handles with 400 and a FAILED envelope.
        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ClientError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
            Err(err) => return Err(ClientError::Decode(err)),
        };

        if envelope.status != "OK" {
            let comment = envelope.comment.unwrap_or_default();
            if comment.contains("not found") {
                return Err(ClientError::HandleNotFound(comment));
            }
            return Err(ClientError::Api(comment));
        }

        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        envelope
            .result
            .ok_or_else(|| ClientError::Api(format!("{method} returned no result")))
    }
}

#[async_trait]
impl ContestClient for CodeforcesClient {
    async fn get_profile(&self, handle: &str) -> Result<Profile, ClientError> {
        let users: Vec<Profile> = self
            .call("user.info", &[("handles", handle.to_string())])
            .await?;
        users.into_iter().next().ok_or_else(|| {
            ClientError::HandleNotFound(format!("handles: User with handle {handle} not found"))
        })
    }

    async fn get_rating_history(&self, handle: &str) -> Result<Vec<RatingChange>, ClientError> {
        self.call("user.rating", &[("handle", handle.to_string())])
            .await
    }

    async fn get_submissions(
        &self,
        handle: &str,
        from: u32,
        count: u32,
    ) -> Result<Vec<Submission>, ClientError> {
        self.call(
            "user.status",
            &[
                ("handle", handle.to_string()),
                ("from", from.to_string()),
                ("count", count.to_string()),
            ],
        )
        .await
    }
}
