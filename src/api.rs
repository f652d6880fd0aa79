use std::time::Duration;

use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info};

/// HTTP client for the course-data API.
pub struct ApiClient {
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { http })
    }

    /// GET `url` and parse the body as JSON.
    pub async fn fetch_json(&self, url: &str) -> Result<Value, Error> {
        let url = validate_url(url).ok_or_else(|| Error::InvalidUrl(url.to_string()))?;
        info!("📡 Fetching {url}");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        debug!("API response status: {status}");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(Error::Status(format!("{status}: {preview}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| Error::Parse(e.to_string()))
    }
}

/// Accept only absolute `http`/`https` URLs.
pub fn validate_url(text: &str) -> Option<Url> {
    let url = Url::parse(text.trim()).ok()?;
    let web = matches!(url.scheme(), "http" | "https") && url.host_str().is_some();
    web.then_some(url)
}

#[derive(Debug)]
pub enum Error {
    InvalidUrl(String),
    Http(String),
    Status(String),
    Parse(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidUrl(u) => write!(f, "Not an http(s) URL: {u}"),
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Status(e) => write!(f, "API error: {e}"),
            Error::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for Error {}
