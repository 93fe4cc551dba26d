use serde::Deserialize;

use super::error::AuthError;
use super::retry::send_with_retry;

/// OIDC discovery document (subset of fields the credential manager needs).
#[derive(Debug, Clone, Deserialize)]
pub struct OidcDiscovery {
    pub issuer: String,
    pub jwks_uri: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
}

const DISCOVERY_ATTEMPTS: u32 = 5;

/// Fetches the OIDC discovery document from `{issuer_url}/.well-known/openid-configuration`.
pub async fn fetch_discovery(
    client: &reqwest::Client,
    issuer_url: &str,
) -> Result<OidcDiscovery, AuthError> {
    let discovery_url = format!(
        "{}/.well-known/openid-configuration",
        issuer_url.trim_end_matches('/')
    );

    let response = send_with_retry(|| client.get(&discovery_url), DISCOVERY_ATTEMPTS)
        .await
        .map_err(|e| AuthError::DiscoveryFailed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AuthError::DiscoveryFailed(format!(
            "HTTP {}: {}",
            response.status(),
            discovery_url
        )));
    }

    let discovery: OidcDiscovery = response
        .json()
        .await
        .map_err(|e| AuthError::DiscoveryFailed(format!("invalid JSON: {}", e)))?;

    let expected_issuer = issuer_url.trim_end_matches('/');
    let actual_issuer = discovery.issuer.trim_end_matches('/');
    if expected_issuer != actual_issuer {
        return Err(AuthError::DiscoveryFailed(format!(
            "issuer mismatch: expected '{}', got '{}'",
            expected_issuer, actual_issuer
        )));
    }

    Ok(discovery)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_deserialize() {
        let json = r#"{
            "issuer": "https://auth.example.com",
            "jwks_uri": "https://auth.example.com/jwks",
            "token_endpoint": "https://auth.example.com/token",
            "id_token_signing_alg_values_supported": ["RS256"]
        }"#;

        let discovery: OidcDiscovery = serde_json::from_str(json).unwrap();
        assert_eq!(discovery.issuer, "https://auth.example.com");
        assert_eq!(discovery.token_endpoint, "https://auth.example.com/token");
        assert_eq!(discovery.id_token_signing_alg_values_supported, vec!["RS256"]);
    }
}
