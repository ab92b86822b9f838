//! Token storage and management

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File name of the token cache inside the user's home directory.
const TOKEN_FILE_NAME: &str = ".fresh.tokens.json";

/// Seconds of remaining lifetime below which a token counts as expired.
const EXPIRY_SKEW_SECS: i64 = 300;

/// OAuth2 token bundle as persisted in the token file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Unix timestamp (seconds) at which the access token stops being valid.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl TokenSet {
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: Option<u64>,
    ) -> Self {
        // An expiry past i64 range is treated as no expiry
        let expires_at = expires_in_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| Utc::now().timestamp().checked_add(secs));

        Self {
            access_token,
            refresh_token,
            token_type: Some("Bearer".to_string()),
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            // Consider expired if less than 5 minutes remaining
            Some(exp) => Utc::now().timestamp() + EXPIRY_SKEW_SECS >= exp,
            None => false,
        }
    }
}

/// Single-file token cache.
///
/// Holds exactly one `TokenSet`; every save overwrites the file wholesale.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.fresh.tokens.json`, or `None` if the home directory is unknown.
    pub fn default_path() -> Option<PathBuf> {
        home::home_dir().map(|home| home.join(TOKEN_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn describe(&self) -> String {
        format!("token file {}", self.path.display())
    }

    /// Read and parse the token file.
    pub async fn load(&self) -> Result<TokenSet> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(self.describe()));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|source| Error::Parse {
            what: self.describe(),
            source,
        })
    }

    /// Overwrite the token file with `tokens`.
    pub async fn save(&self, tokens: &TokenSet) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }

        let json = serde_json::to_string(tokens).map_err(|source| Error::Parse {
            what: "token set".to_string(),
            source,
        })?;
        tokio::fs::write(&self.path, json).await?;

        // Restrictive permissions, the file holds a refresh token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&self.path, perms).await?;
        }

        tracing::debug!("Saved tokens to {}", self.path.display());
        Ok(())
    }

    /// Delete the token file. A missing file is not an error.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!("Removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
