//! OAuth2 authorization code flow for Google, with a pasted code
//!
//! The flow has two states. With a token file on disk it goes straight to
//! Authorized; without one it prompts the user to open the authorization URL
//! and paste back the code, then exchanges and stores the tokens.

use oauth2::basic::{BasicClient, BasicErrorResponse, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::url::Url;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl,
    RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
};

use super::{Credentials, LineReader, TokenSet, TokenStore};
use crate::api::{AuthorizedClient, LinkShortener};
use crate::error::{Error, Result};

/// Build the OAuth2 client from Credentials
fn build_client(credentials: &Credentials) -> Result<BasicClient> {
    let auth_url = AuthUrl::new(credentials.auth_url.clone())
        .map_err(|e| Error::Config(format!("auth URL: {}", e)))?;
    let token_url = TokenUrl::new(credentials.token_url.clone())
        .map_err(|e| Error::Config(format!("token URL: {}", e)))?;
    let redirect_url = RedirectUrl::new(credentials.redirect_uri.clone())
        .map_err(|e| Error::Config(format!("redirect URI: {}", e)))?;

    let secret = (!credentials.client_secret.is_empty())
        .then(|| ClientSecret::new(credentials.client_secret.clone()));

    // Google expects client credentials in the form body
    Ok(BasicClient::new(
        ClientId::new(credentials.client_id.clone()),
        secret,
        auth_url,
        Some(token_url),
    )
    .set_redirect_uri(redirect_url)
    .set_auth_type(AuthType::RequestBody))
}

fn token_error<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> Error
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(resp) => Error::TokenExchange(resp.to_string()),
        other => Error::TokenExchange(other.to_string()),
    }
}

/// Convert a token endpoint response, keeping `previous_refresh` when the
/// provider does not issue a new refresh token.
fn token_set(resp: &BasicTokenResponse, previous_refresh: Option<String>) -> TokenSet {
    TokenSet::new(
        resp.access_token().secret().to_string(),
        resp.refresh_token()
            .map(|t| t.secret().to_string())
            .or(previous_refresh),
        resp.expires_in().map(|d| d.as_secs()),
    )
}

/// Produces an `AuthorizedClient`, prompting for a code when no tokens exist.
///
/// Not safe to run twice at once: both runs would race on the token file and
/// on the input source.
pub struct AuthorizationFlow<R> {
    oauth: BasicClient,
    scopes: Vec<String>,
    store: TokenStore,
    reader: R,
    shortener: Option<LinkShortener>,
    http: reqwest::Client,
    api_base: String,
}

impl<R: LineReader> AuthorizationFlow<R> {
    pub fn new(
        credentials: &Credentials,
        store: TokenStore,
        reader: R,
        http: reqwest::Client,
        api_base: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            oauth: build_client(credentials)?,
            scopes: credentials.scopes.clone(),
            store,
            reader,
            shortener: None,
            http,
            api_base: api_base.into(),
        })
    }

    /// Shorten the authorization link before showing it.
    pub fn with_shortener(mut self, shortener: LinkShortener) -> Self {
        self.shortener = Some(shortener);
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Authorization URL requesting offline access for the configured scopes.
    pub fn authorization_url(&self) -> Url {
        let (url, _csrf) = self
            .oauth
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .url();
        url
    }

    /// Load stored tokens or acquire new ones interactively.
    ///
    /// Only a missing token file leads to the prompt; any other load failure
    /// is returned. The token set in use is written back before returning.
    pub async fn authorize(&mut self) -> Result<AuthorizedClient> {
        let tokens = match self.store.load().await {
            Ok(tokens) if tokens.is_expired() && tokens.refresh_token.is_some() => {
                tracing::info!("Access token expired, refreshing...");
                self.refresh(tokens).await?
            }
            Ok(tokens) => {
                if tokens.is_expired() {
                    tracing::warn!("Access token expired and no refresh token is stored");
                }
                tracing::debug!("Using tokens from {}", self.store.path().display());
                tokens
            }
            Err(e) if e.is_not_found() => {
                tracing::info!("No stored tokens, starting interactive authorization");
                self.prompt_tokens().await?
            }
            Err(e) => return Err(e),
        };

        let client = AuthorizedClient::new(self.http.clone(), self.api_base.clone(), tokens);
        self.store.save(client.tokens()).await?;
        Ok(client)
    }

    async fn prompt_tokens(&mut self) -> Result<TokenSet> {
        let url = self.authorization_url();
        let link = match &self.shortener {
            Some(shortener) => shortener.shorten(url.as_str()).await?,
            None => url.to_string(),
        };

        self.reader
            .prompt(&format!(
                "Authorize by opening {} and pasting the code below.",
                link
            ))
            .await?;

        // Blocks until the user pastes a line; no timeout
        let line = self.reader.read_line().await?.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "input closed before an authorization code was entered",
            )
        })?;
        let code = line.trim();
        if code.is_empty() {
            return Err(Error::TokenExchange(
                "no authorization code entered".to_string(),
            ));
        }

        tracing::debug!("Exchanging authorization code");
        let resp = self
            .oauth
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(token_error)?;

        tracing::info!("Authorization successful");
        Ok(token_set(&resp, None))
    }

    async fn refresh(&self, tokens: TokenSet) -> Result<TokenSet> {
        let Some(refresh_token) = tokens.refresh_token.clone() else {
            return Ok(tokens);
        };

        let resp = self
            .oauth
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(async_http_client)
            .await
            .map_err(token_error)?;

        Ok(token_set(&resp, Some(refresh_token)))
    }
}

/// Clear stored credentials; succeeds whether or not any existed.
pub async fn deauthorize(store: &TokenStore) -> Result<()> {
    store.clear().await
}

/// What the token file currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    Missing,
    Present {
        expired: bool,
        expires_at: Option<i64>,
        has_refresh_token: bool,
    },
}

/// Inspect the token file without prompting or refreshing.
pub async fn token_status(store: &TokenStore) -> Result<TokenStatus> {
    match store.load().await {
        Ok(tokens) => Ok(TokenStatus::Present {
            expired: tokens.is_expired(),
            expires_at: tokens.expires_at,
            has_refresh_token: tokens.refresh_token.is_some(),
        }),
        Err(e) if e.is_not_found() => Ok(TokenStatus::Missing),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::gmail;
    use crate::auth::prompt::testing::ScriptedReader;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials(server: &MockServer) -> Credentials {
        Credentials {
            client_id: "client-123".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "urn:ietf:wg:oauth:2.0:oob".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/gmail.modify".to_string()],
            auth_url: format!("{}/auth", server.uri()),
            token_url: format!("{}/token", server.uri()),
        }
    }

    fn make_flow(
        server: &MockServer,
        store: TokenStore,
        lines: &[&str],
    ) -> AuthorizationFlow<ScriptedReader> {
        AuthorizationFlow::new(
            &credentials(server),
            store,
            ScriptedReader::new(lines.iter().copied()),
            reqwest::Client::new(),
            format!("{}/gmail/v1/users/me", server.uri()),
        )
        .unwrap()
    }

    fn temp_store(dir: &tempfile::TempDir) -> TokenStore {
        TokenStore::new(dir.path().join("tokens.json"))
    }

    async fn mount_token_endpoint(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.new",
                "refresh_token": "1//refresh",
                "expires_in": 3599,
                "token_type": "Bearer",
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[test]
    fn test_authorization_url_requests_offline_access() {
        let dir = tempfile::tempdir().unwrap();
        let server_uri = "http://127.0.0.1:1";
        let creds = Credentials {
            auth_url: format!("{}/auth", server_uri),
            token_url: format!("{}/token", server_uri),
            client_id: "client-123".to_string(),
            client_secret: String::new(),
            redirect_uri: "urn:ietf:wg:oauth:2.0:oob".to_string(),
            scopes: vec!["scope-a".to_string(), "scope-b".to_string()],
        };
        let flow = AuthorizationFlow::new(
            &creds,
            temp_store(&dir),
            ScriptedReader::new(Vec::<String>::new()),
            reqwest::Client::new(),
            "http://127.0.0.1:1",
        )
        .unwrap();

        let url = flow.authorization_url();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |k: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(url.path(), "/auth");
        assert_eq!(get("access_type"), Some("offline"));
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(get("client_id"), Some("client-123"));
        assert_eq!(get("redirect_uri"), Some("urn:ietf:wg:oauth:2.0:oob"));
        assert_eq!(get("scope"), Some("scope-a scope-b"));
    }

    #[test]
    fn test_invalid_token_url_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let creds = Credentials {
            client_id: "c".to_string(),
            client_secret: String::new(),
            redirect_uri: "urn:ietf:wg:oauth:2.0:oob".to_string(),
            scopes: vec!["s".to_string()],
            auth_url: "https://accounts.example.com/auth".to_string(),
            token_url: "not a url".to_string(),
        };
        let result = AuthorizationFlow::new(
            &creds,
            temp_store(&dir),
            ScriptedReader::new(Vec::<String>::new()),
            reqwest::Client::new(),
            "http://127.0.0.1:1",
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_tokens_prompts_and_exchanges_code() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=XYZ"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("client_id=client-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.new",
                "refresh_token": "1//refresh",
                "expires_in": 3599,
                "token_type": "Bearer",
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(header("authorization", "Bearer ya29.new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resultSizeEstimate": 0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = temp_store(&dir);
        let mut flow = make_flow(&server, store.clone(), &["  XYZ  "]);
        let client = flow.authorize().await.unwrap();

        assert_eq!(client.tokens().access_token, "ya29.new");
        let saved = store.load().await.unwrap();
        assert_eq!(&saved, client.tokens());
        assert_eq!(saved.refresh_token.as_deref(), Some("1//refresh"));

        let unread = gmail::list_unread(&client).await.unwrap();
        assert!(unread.is_empty());
    }

    #[tokio::test]
    async fn test_prompt_uses_shortened_link() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/shorten"))
            .and(body_string_contains("longUrl"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "https://goo.gl/x"})))
            .expect(1)
            .mount(&server)
            .await;
        mount_token_endpoint(&server, 1).await;

        let shortener = LinkShortener::new(
            reqwest::Client::new(),
            format!("{}/shorten", server.uri()),
            "key",
        );
        let mut flow = make_flow(&server, temp_store(&dir), &["XYZ"]).with_shortener(shortener);
        flow.authorize().await.unwrap();

        assert_eq!(
            flow.reader.prompts,
            ["Authorize by opening https://goo.gl/x and pasting the code below."]
        );
        assert!(!flow.reader.prompts[0].contains(&format!("{}/auth", server.uri())));
    }

    #[tokio::test]
    async fn test_prompt_shows_long_url_without_shortener() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        mount_token_endpoint(&server, 1).await;

        let mut flow = make_flow(&server, temp_store(&dir), &["XYZ"]);
        flow.authorize().await.unwrap();

        assert_eq!(flow.reader.prompts.len(), 1);
        let prompt = &flow.reader.prompts[0];
        assert!(prompt.starts_with(&format!("Authorize by opening {}/auth?", server.uri())));
        assert!(prompt.contains("access_type=offline"), "{}", prompt);
        assert!(prompt.ends_with(" and pasting the code below."));
    }

    #[tokio::test]
    async fn test_shortener_failure_fails_the_flow() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/shorten"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;
        mount_token_endpoint(&server, 0).await;

        let shortener = LinkShortener::new(
            reqwest::Client::new(),
            format!("{}/shorten", server.uri()),
            "key",
        );
        let store = temp_store(&dir);
        let mut flow = make_flow(&server, store.clone(), &["XYZ"]).with_shortener(shortener);

        let err = flow.authorize().await.unwrap_err();
        assert!(matches!(err, Error::Provider { status: 503, .. }), "unexpected error: {:?}", err);
        assert!(store.load().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_stored_tokens_skip_prompt() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        mount_token_endpoint(&server, 0).await;

        let store = temp_store(&dir);
        let cached = TokenSet::new("ya29.cached".to_string(), Some("1//r".to_string()), Some(3600));
        store.save(&cached).await.unwrap();

        // No input lines: reaching the prompt would fail with UnexpectedEof
        let mut flow = make_flow(&server, store.clone(), &[]);
        let client = flow.authorize().await.unwrap();

        assert_eq!(client.tokens(), &cached);
        assert_eq!(store.load().await.unwrap(), cached);
    }

    #[tokio::test]
    async fn test_expired_tokens_are_refreshed() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=1%2F%2Fold"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.refreshed",
                "expires_in": 3599,
                "token_type": "Bearer",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = temp_store(&dir);
        let stale = TokenSet {
            access_token: "ya29.stale".to_string(),
            refresh_token: Some("1//old".to_string()),
            token_type: Some("Bearer".to_string()),
            expires_at: Some(Utc::now().timestamp() - 60),
        };
        store.save(&stale).await.unwrap();

        let mut flow = make_flow(&server, store.clone(), &[]);
        let client = flow.authorize().await.unwrap();

        let saved = store.load().await.unwrap();
        assert_eq!(saved.access_token, "ya29.refreshed");
        // Google does not reissue refresh tokens on refresh
        assert_eq!(saved.refresh_token.as_deref(), Some("1//old"));
        assert!(!saved.is_expired());
        assert_eq!(&saved, client.tokens());
    }

    #[tokio::test]
    async fn test_corrupt_token_file_is_fatal() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        mount_token_endpoint(&server, 0).await;

        let store = temp_store(&dir);
        std::fs::write(store.path(), "][").unwrap();

        let mut flow = make_flow(&server, store, &["XYZ"]);
        let err = flow.authorize().await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_rejected_code_is_token_exchange_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Malformed auth code."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = temp_store(&dir);
        let mut flow = make_flow(&server, store.clone(), &["bogus"]);
        let err = flow.authorize().await.unwrap_err();

        match err {
            Error::TokenExchange(msg) => assert!(msg.contains("invalid_grant"), "{}", msg),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(store.load().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_closed_input_fails() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        mount_token_endpoint(&server, 0).await;

        let mut flow = make_flow(&server, temp_store(&dir), &[]);
        match flow.authorize().await.unwrap_err() {
            Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deauthorize_then_prompt_again() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        mount_token_endpoint(&server, 1).await;

        let store = temp_store(&dir);
        store
            .save(&TokenSet::new("ya29.old".to_string(), None, Some(3600)))
            .await
            .unwrap();

        let mut flow = make_flow(&server, store.clone(), &["XYZ"]);
        deauthorize(flow.store()).await.unwrap();
        assert!(store.load().await.unwrap_err().is_not_found());
        // Idempotent
        deauthorize(flow.store()).await.unwrap();

        let client = flow.authorize().await.unwrap();
        assert_eq!(client.tokens().access_token, "ya29.new");
    }

    #[tokio::test]
    async fn test_token_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);
        assert_eq!(token_status(&store).await.unwrap(), TokenStatus::Missing);

        let tokens = TokenSet::new("a".to_string(), Some("r".to_string()), Some(3600));
        store.save(&tokens).await.unwrap();
        assert_eq!(
            token_status(&store).await.unwrap(),
            TokenStatus::Present {
                expired: false,
                expires_at: tokens.expires_at,
                has_refresh_token: true,
            }
        );
    }
}
