//! CLI command implementations.

pub mod artifacts;
pub mod jobs;

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Thin client for the Orca HTTP API.
pub struct ApiClient {
    base: Url,
    http: Client,
}

impl ApiClient {
    pub fn new(api_url: &str) -> Result<Self> {
        let mut base =
            Url::parse(api_url).with_context(|| format!("invalid API URL {api_url:?}"))?;
        // `Url::join` replaces the last segment unless the base ends in a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            http: Client::new(),
        })
    }

    /// Resolve a path relative to the API base, e.g. `jobs/{id}`.
    pub fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.url(path)?;
        debug!(%method, %url, "API request");
        Ok(self.http.request(method, url))
    }

    /// Send a request, turning non-2xx responses into errors.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.context("API server unreachable")?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        bail!("{}", error_message(status, &body))
    }

    pub async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        Ok(self.send(request).await?.json().await?)
    }

    pub async fn bytes(&self, request: RequestBuilder) -> Result<Bytes> {
        Ok(self.send(request).await?.bytes().await?)
    }
}

/// Render an API error body (`{"error": ...}`) for the terminal.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value["error"].as_str().map(str::to_string))
        .map_or_else(
            || format!("request failed ({status})"),
            |message| format!("{message} ({status})"),
        )
}

/// Percent-encode each segment of an artifact path, keeping the separators.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
