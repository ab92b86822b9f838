//! Authenticated HTTP client for the Gmail API
//!
//! Wraps reqwest::Client with bearer token injection and maps HTTP failures
//! onto the crate's error kinds.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::TokenSet;
use crate::error::{Error, Result};

/// Handle bound to one `TokenSet`, passed by reference to every provider call.
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    http: reqwest::Client,
    api_base: String,
    tokens: TokenSet,
}

impl AuthorizedClient {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, tokens: TokenSet) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self {
            http,
            api_base,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// GET `path` relative to the API base and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.url(path);
        tracing::debug!("GET {}", url);

        let resp = self
            .http
            .get(&url)
            .query(query)
            .bearer_auth(&self.tokens.access_token)
            .send()
            .await?;

        let resp = check_response(resp, &url).await?;
        decode_json(resp, &url).await
    }

    /// POST a JSON body to `path` relative to the API base and decode the reply.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        tracing::debug!("POST {}", url);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.tokens.access_token)
            .json(body)
            .send()
            .await?;

        let resp = check_response(resp, &url).await?;
        decode_json(resp, &url).await
    }
}

/// Check HTTP response status code and return a typed error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::NotFound(url.to_string()));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!("401 from {}; the token may be revoked, try 'fresh logout'", url);
        }
        return Err(Error::Provider {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }
    Ok(resp)
}

pub(crate) async fn decode_json<T: DeserializeOwned>(resp: reqwest::Response, url: &str) -> Result<T> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|source| Error::Parse {
        what: format!("response from {}", url),
        source,
    })
}
