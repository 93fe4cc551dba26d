//! Exercises `download::download_file`'s retry loop against a mock file
//! server: three transient 503s followed by a 100-byte success response.

mod common;
mod mock_oidc;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use cdsetool::download::download_file;
use cdsetool::monitor::{Monitor, NoopMonitor};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

struct FlakyThenOk {
    calls: Arc<AtomicU32>,
}

impl Respond for FlakyThenOk {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < 3 {
            ResponseTemplate::new(503)
        } else {
            ResponseTemplate::new(200)
                .insert_header("content-length", "100")
                .set_body_bytes(vec![7u8; 100])
        }
    }
}

#[tokio::test]
async fn retries_transient_failures_then_succeeds() {
    let (_oidc, credentials) = common::authorized_credentials().await;
    let (_tmp, dir) = common::scratch_dir();

    let server = MockServer::start().await;
    let calls = Arc::new(AtomicU32::new(0));

    Mock::given(method("HEAD"))
        .and(path("/product.bin"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", "100"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/product.bin"))
        .respond_with(FlakyThenOk { calls: calls.clone() })
        .expect(4)
        .mount(&server)
        .await;

    let url = format!("{}/product.bin", server.uri());
    let local_path = dir.join("product.bin");
    let monitor: Arc<dyn Monitor> = Arc::new(NoopMonitor);
    let status = monitor.status();

    download_file(&credentials, &url, &local_path, &status)
        .await
        .expect("download should eventually succeed");

    assert_eq!(calls.load(Ordering::SeqCst), 4, "expected exactly 3 failed attempts then one success");
    let bytes = tokio::fs::read(&local_path).await.unwrap();
    assert_eq!(bytes.len(), 100);
    assert!(bytes.iter().all(|&b| b == 7));
}
