//! Full-mode `downloadFeature` via `download_features`: successful publish
//! and idempotent no-op on a second call with `overwrite_existing=false`.

mod common;
mod mock_oidc;

use std::sync::Arc;

use cdsetool::download::{download_features, DownloadOptions};
use cdsetool::feature::Feature;
use cdsetool::monitor::NoopMonitor;
use futures_util::{stream, StreamExt};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn feature(title: &str, url: &str) -> Feature {
    let json = serde_json::json!({
        "id": "a6215824-0000",
        "properties": {
            "title": title,
            "collection": "SENTINEL-2",
            "services": { "download": { "url": url } }
        }
    });
    serde_json::from_value(json).unwrap()
}

#[tokio::test]
async fn full_mode_download_then_idempotent_rerun() {
    let (_oidc, credentials) = common::authorized_credentials().await;
    let (_tmp, destination) = common::scratch_dir();

    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/product.bin"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", "4"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/product.bin"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-length", "4").set_body_bytes(b"data".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/product.bin", server.uri());
    let title = "S2B_MSIL1C_SAMPLE";
    let features = stream::iter(vec![feature(title, &url)]);

    let options = Arc::new(DownloadOptions {
        concurrency: 1,
        monitor: Arc::new(NoopMonitor),
        ..default_options()
    });

    let credentials = Arc::new(credentials);
    let outcomes: Vec<_> = download_features(features, destination.clone(), credentials.clone(), options.clone())
        .collect()
        .await;
    assert_eq!(outcomes.len(), 1);
    let success = outcomes[0].clone().unwrap().unwrap();
    assert_eq!(success.output, destination.join(format!("{}.zip", title)));
    assert_eq!(tokio::fs::read(&success.output).await.unwrap(), b"data");

    // Re-running with the same destination and overwrite_existing=false must
    // not issue another GET (the mock above expects exactly one call).
    let features_again = stream::iter(vec![feature(title, &url)]);
    let outcomes_again: Vec<_> = download_features(features_again, destination.clone(), credentials, options)
        .collect()
        .await;
    assert_eq!(outcomes_again.len(), 1);
    let second = outcomes_again[0].clone().unwrap().unwrap();
    assert_eq!(second.output, success.output);
}

fn default_options() -> DownloadOptions {
    DownloadOptions {
        concurrency: 1,
        overwrite_existing: false,
        filter_pattern: None,
        exclude: false,
        tmpdir: None,
        monitor: Arc::new(NoopMonitor),
    }
}
