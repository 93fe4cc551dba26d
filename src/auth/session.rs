use reqwest::{Client, RequestBuilder, Response};

use super::error::AuthError;
use super::retry::send_with_retry;

/// A reqwest client bound to a retry policy and, optionally, a bearer token.
/// Produced by [`super::credentials::Credentials::get_session`] (authorized)
/// or [`super::credentials::make_session`] (unauthorized).
pub struct Session {
    client: Client,
    token: Option<String>,
    max_attempts: u32,
}

impl Session {
    pub(crate) fn authorized(client: Client, token: String, max_attempts: u32) -> Self {
        Self {
            client,
            token: Some(token),
            max_attempts,
        }
    }

    pub(crate) fn unauthorized(client: Client, max_attempts: u32) -> Self {
        Self {
            client,
            token: None,
            max_attempts,
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn get(&self, url: &str) -> Result<Response, AuthError> {
        send_with_retry(|| self.authorize(self.client.get(url)), self.max_attempts).await
    }

    /// A HEAD request that does *not* retry and does *not* follow redirects;
    /// used by the download engine's manual redirect-following loop.
    pub async fn head_no_redirect(&self, url: &str) -> Result<Response, AuthError> {
        self.authorize(self.client.head(url))
            .send()
            .await
            .map_err(AuthError::from)
    }

    /// A streaming GET that does not retry internally; the download engine
    /// drives its own attempt loop so it can restart the destination file.
    pub async fn get_stream(&self, url: &str) -> Result<Response, AuthError> {
        self.authorize(self.client.get(url))
            .send()
            .await
            .map_err(AuthError::from)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}
