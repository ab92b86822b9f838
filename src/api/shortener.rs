//! URL shortener, used to present a compact authorization link

use serde::{Deserialize, Serialize};

use super::client::decode_json;
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertRequest<'a> {
    long_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
}

/// Client for the shortener's insert endpoint.
#[derive(Debug, Clone)]
pub struct LinkShortener {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl LinkShortener {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    /// Shorten `long_url` with a single insert call. Errors are returned as-is.
    pub async fn shorten(&self, long_url: &str) -> Result<String> {
        tracing::debug!("Shortening {}", long_url);

        let resp = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&InsertRequest { long_url })
            .send()
            .await?;

        // 404 here is a shortener failure, not a missing entity
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Provider {
                status: status.as_u16(),
                url: self.endpoint.clone(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let inserted: InsertResponse = decode_json(resp, &self.endpoint).await?;
        Ok(inserted.id)
    }
}
