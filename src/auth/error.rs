use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to fetch OIDC discovery document: {0}")]
    DiscoveryFailed(String),

    #[error("failed to fetch JWKS: {0}")]
    JwksFailed(String),

    #[error("signing key not found: {0}")]
    KeyNotFound(String),

    #[error("token validation failed: {0}")]
    TokenInvalid(String),

    #[error("access token has an expired signature")]
    TokenExpiredSignature,

    #[error("no credentials supplied and none found in the credentials file")]
    NoCredentials,

    #[error("invalid credentials (password: {redacted_password})")]
    InvalidCredentials { redacted_password: String },

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("could not reach the token client: {0}")]
    TokenClientConnection(String),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl From<reqwest::Error> for AuthError {
    fn from(source: reqwest::Error) -> Self {
        let url = source
            .url()
            .map(|u| u.as_str().to_string())
            .unwrap_or_default();
        AuthError::Request { url, source }
    }
}
