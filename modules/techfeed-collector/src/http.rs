// Shared HTTP plumbing for source adapters. One client, one timeout; a
// timeout is an ordinary page failure, never "no more pages".

use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "techfeed-collector/0.1";

#[derive(Clone)]
pub struct Http {
    client: reqwest::Client,
}

impl Http {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} returned {status}");
        }
        resp.text()
            .await
            .with_context(|| format!("Failed to read body of {url}"))
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} returned {status}");
        }
        let bytes = resp
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {url}"))?;
        Ok(bytes.to_vec())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GET {url} returned {status}: {}", truncate(&body, 200));
        }
        resp.json()
            .await
            .with_context(|| format!("Failed to decode JSON from {url}"))
    }

    /// Like `get_json`, but a 400/404 yields `None`. For publishers whose
    /// paging contract answers a past-the-end page number with a client
    /// error (WordPress `rest_post_invalid_page_number` and friends).
    pub async fn get_json_opt<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = resp.status();
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GET {url} returned {status}: {}", truncate(&body, 200));
        }
        let value = resp
            .json()
            .await
            .with_context(|| format!("Failed to decode JSON from {url}"))?;
        Ok(Some(value))
    }

    /// Like `get_text`, but a 404 yields `None`. For path-paged sites whose
    /// last page simply does not exist.
    pub async fn get_text_opt(&self, url: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            anyhow::bail!("GET {url} returned {status}");
        }
        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read body of {url}"))?;
        Ok(Some(body))
    }
}

impl Default for Http {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
