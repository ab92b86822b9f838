//! Authentication module for the Gmail API
//!
//! Implements the OAuth2 authorization code flow with a pasted code, backed by
//! a single JSON token file.

pub mod oauth;
pub mod prompt;
pub mod tokens;

pub use oauth::{AuthorizationFlow, TokenStatus};
pub use prompt::{LineReader, StdinReader};
pub use tokens::{TokenSet, TokenStore};

/// OAuth2 client configuration for Google
#[derive(Debug, Clone)]
pub struct Credentials {
    /// OAuth2 client ID (installed application)
    pub client_id: String,
    /// OAuth2 client secret; may be empty for public clients
    pub client_secret: String,
    /// OAuth2 redirect URI
    pub redirect_uri: String,
    /// Scopes requested at authorization time
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
}
