//! Error kinds shared by the auth and API layers
//!
//! The CLI wraps these in `anyhow` for reporting; library code keeps them typed
//! so callers can recover from the one case that is recoverable (a missing
//! token file).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing token file or a message id the provider no longer knows.
    #[error("{0} not found")]
    NotFound(String),

    /// Corrupt token file or an undecodable provider response.
    #[error("failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// The OAuth2 token endpoint rejected a code or refresh token.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// Any other non-success HTTP response.
    #[error("HTTP {status} for {url}: {body}")]
    Provider {
        status: u16,
        url: String,
        body: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
