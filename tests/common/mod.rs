//! Shared test helpers: a `Credentials` instance wired to the in-process
//! mock OIDC server, and a scratch download directory.

use std::path::PathBuf;

use cdsetool::auth::Credentials;
use tempfile::TempDir;

use crate::mock_oidc::{MockOidc, VALID_PASSWORD, VALID_USERNAME};

pub async fn authorized_credentials() -> (MockOidc, Credentials) {
    let mock = MockOidc::start().await;
    let credentials = Credentials::with_discovery_url(
        Some(VALID_USERNAME.to_string()),
        Some(VALID_PASSWORD.to_string()),
        mock.issuer_url(),
    );
    (mock, credentials)
}

pub fn scratch_dir() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().to_path_buf();
    (dir, path)
}
