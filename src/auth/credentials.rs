//! OAuth2 credential manager: acquires, caches and refreshes access tokens
//! for the CDSE identity server, validating every new access token against
//! the issuer's JWKS before handing it out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::discovery::{fetch_discovery, OidcDiscovery};
use super::error::AuthError;
use super::jwks::JwksCache;
use super::netrc;
use super::retry::send_with_retry;
use super::session::Session;

pub const DEFAULT_DISCOVERY_URL: &str =
    "https://identity.dataspace.copernicus.eu/auth/realms/CDSE";
const CLIENT_ID: &str = "cdse-public";
const TOKEN_REQUEST_TIMEOUT_SECS: u64 = 120;
const TOKEN_GRANT_ATTEMPTS: u32 = 15;
const SESSION_GET_ATTEMPTS: u32 = 5;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    refresh_expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: i64,
    iat: i64,
}

struct TokenState {
    access_token: String,
    refresh_token: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

impl Default for TokenState {
    fn default() -> Self {
        // Expiries set far in the past to force the first exchange.
        Self {
            access_token: String::new(),
            refresh_token: String::new(),
            access_token_expiry: 0,
            refresh_token_expiry: 0,
        }
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as i64
}

/// Holds a username/password pair (or reads them lazily from a credentials
/// file) and the live OAuth2 token state for one user session.
pub struct Credentials {
    username: Option<String>,
    password: Option<String>,
    discovery_url: String,
    credentials_file: Option<PathBuf>,
    http: reqwest::Client,
    state: Mutex<TokenState>,
    discovery: tokio::sync::OnceCell<OidcDiscovery>,
    jwks: tokio::sync::OnceCell<Arc<JwksCache>>,
}

impl Credentials {
    /// Builds a manager that will use the given username/password directly,
    /// falling back to none supplied (credentials-file lookup happens lazily
    /// at first use if `username`/`password` are `None`).
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self::with_discovery_url(username, password, DEFAULT_DISCOVERY_URL.to_string())
    }

    pub fn with_discovery_url(
        username: Option<String>,
        password: Option<String>,
        discovery_url: String,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(TOKEN_REQUEST_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("reqwest client configuration is valid");

        Self {
            username,
            password,
            discovery_url,
            credentials_file: netrc::default_path(),
            http,
            state: Mutex::new(TokenState::default()),
            discovery: tokio::sync::OnceCell::new(),
            jwks: tokio::sync::OnceCell::new(),
        }
    }

    /// Overrides the credentials-file path used when no username/password
    /// was supplied directly. Exposed for testing.
    pub fn with_credentials_file(mut self, path: PathBuf) -> Self {
        self.credentials_file = Some(path);
        self
    }

    async fn discovery(&self) -> Result<&OidcDiscovery, AuthError> {
        self.discovery
            .get_or_try_init(|| fetch_discovery(&self.http, &self.discovery_url))
            .await
    }

    async fn jwks(&self, discovery: &OidcDiscovery) -> Result<Arc<JwksCache>, AuthError> {
        let cache = self
            .jwks
            .get_or_try_init(|| async {
                JwksCache::new(discovery.jwks_uri.clone(), self.http.clone())
                    .await
                    .map(Arc::new)
            })
            .await?;
        Ok(cache.clone())
    }

    fn resolve_login(&self, discovery: &OidcDiscovery) -> Result<(String, String), AuthError> {
        if let (Some(u), Some(p)) = (&self.username, &self.password) {
            return Ok((u.clone(), p.clone()));
        }

        let path = self
            .credentials_file
            .as_ref()
            .ok_or(AuthError::NoCredentials)?;
        let entry = netrc::lookup(path, &discovery.token_endpoint).ok_or(AuthError::NoCredentials)?;
        Ok((entry.login, entry.password))
    }

    async fn request_token(
        &self,
        discovery: &OidcDiscovery,
        form: &[(&str, &str)],
        password_for_redaction: Option<&str>,
    ) -> Result<TokenResponse, AuthError> {
        let response = send_with_retry(
            || self.http.post(&discovery.token_endpoint).form(form),
            TOKEN_GRANT_ATTEMPTS,
        )
        .await?;

        match response.status() {
            s if s.is_success() => response
                .json::<TokenResponse>()
                .await
                .map_err(|e| AuthError::TokenExchangeFailed(e.to_string())),
            StatusCode::UNAUTHORIZED => {
                let redacted_password = password_for_redaction
                    .map(|p| "*".repeat(p.len()))
                    .unwrap_or_default();
                Err(AuthError::InvalidCredentials { redacted_password })
            }
            s => Err(AuthError::TokenExchangeFailed(format!("HTTP {}", s))),
        }
    }

    async fn password_grant(&self, discovery: &OidcDiscovery) -> Result<TokenResponse, AuthError> {
        let (username, password) = self.resolve_login(discovery)?;
        let form = [
            ("grant_type", "password"),
            ("client_id", CLIENT_ID),
            ("username", username.as_str()),
            ("password", password.as_str()),
        ];
        self.request_token(discovery, &form, Some(password.as_str()))
            .await
    }

    async fn refresh_grant(
        &self,
        discovery: &OidcDiscovery,
        refresh_token: &str,
    ) -> Result<TokenResponse, AuthError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", CLIENT_ID),
            ("refresh_token", refresh_token),
        ];
        self.request_token(discovery, &form, None).await
    }

    async fn validate(
        &self,
        discovery: &OidcDiscovery,
        access_token: &str,
    ) -> Result<TokenClaims, AuthError> {
        let jwks = self.jwks(discovery).await?;

        let header = decode_header(access_token)
            .map_err(|e| AuthError::TokenInvalid(format!("malformed header: {}", e)))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::TokenInvalid("token header has no kid".to_string()))?;

        let (decoding_key, algorithm) = jwks.get_key(&kid).await?;

        let algorithms: Vec<Algorithm> = discovery
            .id_token_signing_alg_values_supported
            .iter()
            .filter_map(|a| match a.as_str() {
                "RS256" => Some(Algorithm::RS256),
                "RS384" => Some(Algorithm::RS384),
                "RS512" => Some(Algorithm::RS512),
                _ => None,
            })
            .collect();
        let mut validation = Validation::new(algorithm);
        if !algorithms.is_empty() {
            validation.algorithms = algorithms;
        }
        // Audience verification is intentionally skipped: CDSE's public
        // client does not advertise a stable audience claim.
        validation.validate_aud = false;
        validation.set_issuer(&[discovery.issuer.clone()]);
        validation.leeway = 60;

        match decode::<TokenClaims>(access_token, &decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Err(AuthError::TokenExpiredSignature)
                }
                _ => Err(AuthError::TokenInvalid(e.to_string())),
            },
        }
    }

    /// Runs the token lifecycle described by the credential manager's
    /// contract and returns a fresh, validated access token.
    async fn ensure_tokens(&self) -> Result<String, AuthError> {
        let mut state = self.state.lock().await;
        let now = now_unix();

        if now < state.access_token_expiry {
            return Ok(state.access_token.clone());
        }

        let discovery = self.discovery().await?;

        let token_response = if now < state.refresh_token_expiry {
            debug!("refreshing access token via refresh_token grant");
            match self.refresh_grant(discovery, &state.refresh_token).await {
                Ok(r) => r,
                Err(e) => {
                    warn!("refresh_token grant failed, falling back to password grant: {}", e);
                    self.password_grant(discovery).await?
                }
            }
        } else {
            debug!("requesting new access token via password grant");
            self.password_grant(discovery).await?
        };

        let claims = self.validate(discovery, &token_response.access_token).await?;

        state.access_token = token_response.access_token;
        state.refresh_token = token_response.refresh_token;
        state.access_token_expiry = claims.exp;
        state.refresh_token_expiry = claims.iat + token_response.refresh_expires_in;

        Ok(state.access_token.clone())
    }

    /// Returns an HTTP session whose requests carry a valid bearer token.
    pub async fn get_session(&self) -> Result<Session, AuthError> {
        let token = self.ensure_tokens().await?;
        Ok(Session::authorized(self.http.clone(), token, SESSION_GET_ATTEMPTS))
    }
}

/// Builds an HTTP session for components that do not need authorization
/// (catalogue queries, discovery, collection descriptions).
pub fn make_session(retries: u32) -> Session {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(std::time::Duration::from_secs(TOKEN_REQUEST_TIMEOUT_SECS))
        .build()
        .expect("reqwest client configuration is valid");
    Session::unauthorized(client, retries)
}
