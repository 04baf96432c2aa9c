//! Micropub client: create, update, delete and read posts with a bearer token.

use std::time::Instant;

use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderValue, LOCATION},
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::entry::{Entry, SourceRecord};

pub mod payload;

pub use payload::{create_payload, delete_payload, update_payload};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("micropub endpoint returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("micropub request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode micropub response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("access token cannot be sent as a header")]
    InvalidToken,
}

#[derive(Debug, Clone)]
pub struct MicropubClient {
    http: Client,
    endpoint: Url,
    token: String,
}

impl MicropubClient {
    pub fn new(http: Client, endpoint: Url, token: impl Into<String>) -> Self {
        Self {
            http,
            endpoint,
            token: token.into(),
        }
    }

    /// Publish a new entry; returns the `Location` of the created post when the server sends one.
    pub async fn create(&self, entry: &Entry) -> Result<Option<String>, PublishError> {
        let response = self.post("micropub::create", &create_payload(entry)).await?;
        Ok(location(&response))
    }

    /// Replace the content and metadata of the post at `url`.
    pub async fn update(&self, url: &str, entry: &Entry) -> Result<Option<String>, PublishError> {
        let response = self
            .post("micropub::update", &update_payload(url, entry))
            .await?;
        Ok(location(&response))
    }

    pub async fn delete(&self, url: &str) -> Result<(), PublishError> {
        self.post("micropub::delete", &delete_payload(url)).await?;
        Ok(())
    }

    /// `GET ?q=source&url=...` for the post at `url`.
    pub async fn source(&self, url: &str) -> Result<SourceRecord, PublishError> {
        let started_at = Instant::now();
        let mut query_url = self.endpoint.clone();
        query_url
            .query_pairs_mut()
            .append_pair("q", "source")
            .append_pair("url", url);

        let response = self
            .http
            .get(query_url)
            .header(AUTHORIZATION, self.auth_header()?)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let response = ensure_success("micropub::source", response, started_at).await?;
        let bytes = response.bytes().await?;
        let record: SourceRecord = serde_json::from_slice(&bytes)?;

        info!(
            target = "infra::micropub",
            op = "micropub::source",
            result = "ok",
            properties = record.properties.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Fetched post source"
        );
        Ok(record)
    }

    async fn post(&self, op: &'static str, body: &Value) -> Result<Response, PublishError> {
        let started_at = Instant::now();
        let response = self
            .http
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, self.auth_header()?)
            .json(body)
            .send()
            .await?;
        let response = ensure_success(op, response, started_at).await?;

        info!(
            target = "infra::micropub",
            op,
            result = "ok",
            status = response.status().as_u16(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Micropub request accepted"
        );
        Ok(response)
    }

    fn auth_header(&self) -> Result<HeaderValue, PublishError> {
        HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| PublishError::InvalidToken)
    }
}

async fn ensure_success(
    op: &'static str,
    response: Response,
    started_at: Instant,
) -> Result<Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => {
            debug!(
                target = "infra::micropub",
                op,
                status = status.as_u16(),
                error = %err,
                "Failed to read error response body"
            );
            String::new()
        }
    };
    warn!(
        target = "infra::micropub",
        op,
        result = "error",
        status = status.as_u16(),
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        "Micropub endpoint rejected the request"
    );
    Err(PublishError::Status { status, body })
}

fn location(response: &Response) -> Option<String> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
