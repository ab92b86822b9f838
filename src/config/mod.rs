//! Configuration: application credentials and service endpoints

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::{Credentials, TokenStore};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const SHORTENER_URL: &str = "https://www.googleapis.com/urlshortener/v1/url";

/// Out-of-band redirect: the provider shows the code for the user to paste.
const OOB_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Read messages and change their labels.
const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OAuth2 client ID from the Google Cloud console
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Token cache location (defaults to ~/.fresh.tokens.json)
    pub token_path: Option<PathBuf>,
    /// Link shortener used for the authorization URL; omitted means long URLs
    pub shortener: Option<ShortenerConfig>,
    pub endpoints: Endpoints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenerConfig {
    pub api_key: String,
    #[serde(default = "default_shortener_url")]
    pub endpoint: String,
}

/// Service endpoints, overridable for testing against other hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub auth_url: String,
    pub token_url: String,
    /// Gmail API root for the authenticated user
    pub api_base: String,
}

fn default_shortener_url() -> String {
    SHORTENER_URL.to_string()
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            api_base: GMAIL_API_BASE.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: OOB_REDIRECT_URI.to_string(),
            scopes: vec![GMAIL_MODIFY_SCOPE.to_string()],
            token_path: None,
            shortener: None,
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "fresh", "fresh")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = Self::default_path()?;
                if !p.exists() {
                    tracing::debug!("No config at {}, using defaults", p.display());
                    return Ok(Self::default());
                }
                p
            }
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Static OAuth2 client credentials for the authorization flow.
    pub fn credentials(&self) -> Result<Credentials> {
        if self.client_id.is_empty() {
            bail!("client_id is not configured. Add it to the config file.");
        }
        if self.scopes.is_empty() {
            bail!("No OAuth2 scopes configured.");
        }

        Ok(Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            scopes: self.scopes.clone(),
            auth_url: self.endpoints.auth_url.clone(),
            token_url: self.endpoints.token_url.clone(),
        })
    }

    /// Token store at the configured path, or the default one.
    pub fn token_store(&self) -> Result<TokenStore> {
        let path = match &self.token_path {
            Some(p) => p.clone(),
            None => TokenStore::default_path().context("Could not determine home directory")?,
        };
        Ok(TokenStore::new(path))
    }
}
