use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;

use crate::analytics::error::{internal_error, network_error, AnalyticsResult};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A single outbound collection request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl HttpRequest {
    /// Lossy UTF-8 view of the body, for diagnostics.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The network collaborator that actually performs the POST.
///
/// Implementations report failures through the returned error; the dispatcher logs and drops
/// them, so hit producers never observe transport errors.
#[async_trait]
pub trait HttpPostSender: Send + Sync {
    async fn post(&self, request: HttpRequest) -> AnalyticsResult<()>;
}

/// [`HttpPostSender`] backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestSender {
    client: Client,
}

impl ReqwestSender {
    pub fn new() -> AnalyticsResult<Self> {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> AnalyticsResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| internal_error(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpPostSender for ReqwestSender {
    async fn post(&self, request: HttpRequest) -> AnalyticsResult<()> {
        let mut builder = self
            .client
            .post(&request.url)
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(request.body)
            .send()
            .await
            .map_err(|err| network_error(format!("failed to send hit: {err}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unavailable response body>".to_string());
        Err(network_error(format!(
            "collection request failed with status {status}. Response: {body}"
        )))
    }
}
