//! End-to-end tests for the OAuth2 credential manager against the
//! in-process mock OIDC server.

mod common;
mod mock_oidc;

use cdsetool::auth::Credentials;
use mock_oidc::VALID_USERNAME;

#[tokio::test]
async fn password_grant_produces_a_usable_session() {
    let (_mock, credentials) = common::authorized_credentials().await;
    let session = credentials.get_session().await.expect("password grant should succeed");
    drop(session);
}

#[tokio::test]
async fn second_call_reuses_the_cached_access_token() {
    let (mock, credentials) = common::authorized_credentials().await;
    credentials.get_session().await.unwrap();
    credentials.get_session().await.unwrap();
    assert_eq!(mock.token_request_count(), 1, "a valid cached token should not trigger a second exchange");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let mock = mock_oidc::MockOidc::start().await;
    let credentials = Credentials::with_discovery_url(
        Some(VALID_USERNAME.to_string()),
        Some("not-the-password".to_string()),
        mock.issuer_url(),
    );
    let result = credentials.get_session().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn missing_credentials_yield_no_credentials_error() {
    let mock = mock_oidc::MockOidc::start().await;
    let credentials = Credentials::with_discovery_url(None, None, mock.issuer_url())
        .with_credentials_file(std::path::PathBuf::from("/nonexistent/.cdsetool.netrc"));
    let result = credentials.get_session().await;
    assert!(matches!(result, Err(cdsetool::auth::AuthError::NoCredentials)));
}
