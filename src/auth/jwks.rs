use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::error::AuthError;
use super::retry::send_with_retry;

const JWKS_FETCH_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: Option<String>,
    #[serde(rename = "use")]
    pub use_: Option<String>,
    pub alg: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

/// Caches JWKS keys for a single issuer, refreshing on a cache miss.
pub struct JwksCache {
    keys: RwLock<HashMap<String, CachedKey>>,
    jwks_uri: String,
    client: reqwest::Client,
}

#[derive(Clone)]
struct CachedKey {
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl JwksCache {
    pub async fn new(jwks_uri: String, client: reqwest::Client) -> Result<Self, AuthError> {
        let cache = Self {
            keys: RwLock::new(HashMap::new()),
            jwks_uri,
            client,
        };

        cache.refresh().await?;
        Ok(cache)
    }

    /// Returns the decoding key and algorithm for `kid`, refreshing the cache
    /// once on a miss before giving up.
    pub async fn get_key(&self, kid: &str) -> Result<(DecodingKey, Algorithm), AuthError> {
        {
            let keys = self.keys.read().await;
            if let Some(cached) = keys.get(kid) {
                return Ok((cached.decoding_key.clone(), cached.algorithm));
            }
        }

        debug!("key '{}' not found in cache, refreshing JWKS", kid);
        self.refresh().await?;

        let keys = self.keys.read().await;
        keys.get(kid)
            .map(|cached| (cached.decoding_key.clone(), cached.algorithm))
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }

    pub async fn refresh(&self) -> Result<(), AuthError> {
        debug!("fetching JWKS from {}", self.jwks_uri);

        // `send_with_retry` only returns `Err` once every attempt failed to
        // reach the server at all; a received-but-unsuccessful response
        // comes back as `Ok`, so this is always a transport failure.
        let response = send_with_retry(|| self.client.get(&self.jwks_uri), JWKS_FETCH_ATTEMPTS)
            .await
            .map_err(|e| AuthError::TokenClientConnection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::JwksFailed(format!(
                "HTTP {}: {}",
                response.status(),
                self.jwks_uri
            )));
        }

        let jwks: JwksResponse = response
            .json()
            .await
            .map_err(|e| AuthError::JwksFailed(format!("invalid JSON: {}", e)))?;

        let mut new_keys = HashMap::new();

        for jwk in jwks.keys {
            if jwk.kty != "RSA" {
                debug!("skipping non-RSA key: {}", jwk.kty);
                continue;
            }

            let kid = match &jwk.kid {
                Some(kid) => kid.clone(),
                None => {
                    warn!("skipping JWK without kid");
                    continue;
                }
            };

            if jwk.use_.as_deref() == Some("enc") {
                debug!("skipping encryption key: {}", kid);
                continue;
            }

            let algorithm = match jwk.alg.as_deref() {
                Some("RS256") | None => Algorithm::RS256,
                Some("RS384") => Algorithm::RS384,
                Some("RS512") => Algorithm::RS512,
                Some(alg) => {
                    warn!("unsupported algorithm '{}' for key '{}'", alg, kid);
                    continue;
                }
            };

            let (n, e) = match (&jwk.n, &jwk.e) {
                (Some(n), Some(e)) => (n.as_str(), e.as_str()),
                _ => {
                    warn!("JWK '{}' missing n or e component", kid);
                    continue;
                }
            };

            let decoding_key = match DecodingKey::from_rsa_components(n, e) {
                Ok(key) => key,
                Err(e) => {
                    warn!("failed to build decoding key for '{}': {}", kid, e);
                    continue;
                }
            };

            debug!("cached key '{}' with algorithm {:?}", kid, algorithm);
            new_keys.insert(
                kid,
                CachedKey {
                    decoding_key,
                    algorithm,
                },
            );
        }

        if new_keys.is_empty() {
            return Err(AuthError::JwksFailed(
                "no valid RSA signing keys found in JWKS".to_string(),
            ));
        }

        let mut keys = self.keys.write().await;
        *keys = new_keys;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwks_response_deserialize() {
        let json = r#"{
            "keys": [
                {"kty": "RSA", "kid": "key-1", "use": "sig", "alg": "RS256", "n": "test-n", "e": "AQAB"}
            ]
        }"#;

        let jwks: JwksResponse = serde_json::from_str(json).unwrap();
        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.keys[0].kid, Some("key-1".to_string()));
    }

    #[test]
    fn jwks_response_multiple_keys() {
        let json = r#"{
            "keys": [
                {"kty": "RSA", "kid": "key-1", "n": "n1", "e": "e1"},
                {"kty": "RSA", "kid": "key-2", "n": "n2", "e": "e2"}
            ]
        }"#;

        let jwks: JwksResponse = serde_json::from_str(json).unwrap();
        assert_eq!(jwks.keys.len(), 2);
    }
}
