use std::time::Duration;

use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{redirect, Client, StatusCode};
use serde_json::Value;

use crate::bean::{PayloadShape, RawBean};
use crate::error::ScrapeError;
use crate::topology::Endpoint;

/// HTTP side of a scrape: one bounded GET, no redirects followed.
#[derive(Debug, Clone)]
pub struct Scraper {
    client: Client,
    timeout: Duration,
}

impl Scraper {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .user_agent(concat!("hadoop-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn fetch(&self, endpoint: &Endpoint, path: &str) -> Result<Value, ScrapeError> {
        let url = endpoint.url_for(path);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| ScrapeError::Unreachable { url: url.clone(), source })?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(ScrapeError::Redirect { url, status: status.as_u16(), location });
        }
        if status != StatusCode::OK {
            return Err(ScrapeError::Status { url, status: status.as_u16() });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| ScrapeError::Unreachable { url: url.clone(), source })?;
        serde_json::from_slice(&body).map_err(|source| ScrapeError::Decode { url, source })
    }

    /// Fetch `path` and pull the record list out according to `shape`.
    pub async fn scrape(&self, endpoint: &Endpoint, path: &str, shape: PayloadShape) -> Result<Vec<RawBean>, ScrapeError> {
        let document = self.fetch(endpoint, path).await?;
        shape.decode(document)
    }
}
