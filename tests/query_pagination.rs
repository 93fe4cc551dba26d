//! Paginated query iteration against a mock catalogue endpoint. Kept as one
//! long sequential test since it mutates the process-wide
//! `CDSETOOL_CATALOGUE_BASE_URL` override.

use cdsetool::{FeatureQuery, FeatureQueryOptions};
use futures_util::StreamExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn pagination_boundary_behaviour() {
    let server = MockServer::start().await;
    std::env::set_var("CDSETOOL_CATALOGUE_BASE_URL", server.uri());

    // Phase 1: empty result set.
    Mock::given(method("GET"))
        .and(path("/EMPTY/search.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "features": [],
            "properties": { "totalResults": 0, "links": [] }
        })))
        .mount(&server)
        .await;

    let query = FeatureQuery::new(
        "EMPTY",
        &[],
        FeatureQueryOptions {
            validate_search_terms: false,
            ..FeatureQueryOptions::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(query.clone().len().await.unwrap(), 0);
    let items: Vec<_> = query.stream().collect().await;
    assert!(items.is_empty());

    // Phase 2: two pages, no totalResults ever reported.
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/NOTOTAL/search.json"))
        .respond_with(move |req: &wiremock::Request| {
            if req.url.query().unwrap_or("").contains("page=2") {
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "features": [{"id": "b", "properties": {"title": "B"}}],
                    "properties": { "links": [] }
                }))
            } else {
                let next = format!("{}/NOTOTAL/search.json?page=2", base);
                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "features": [{"id": "a", "properties": {"title": "A"}}],
                    "properties": { "links": [{"rel": "next", "href": next}] }
                }))
            }
        })
        .mount(&server)
        .await;

    let query = FeatureQuery::new(
        "NOTOTAL",
        &[],
        FeatureQueryOptions {
            validate_search_terms: false,
            ..FeatureQueryOptions::default()
        },
    )
    .await
    .unwrap();

    let items: Vec<_> = query.clone().stream().map(|f| f.unwrap()).collect().await;
    assert_eq!(items.len(), 2);
    // totalResults was never reported; length falls back to the buffered count
    // once pagination is exhausted.
    assert_eq!(query.len().await.unwrap(), 2);

    std::env::remove_var("CDSETOOL_CATALOGUE_BASE_URL");
}
