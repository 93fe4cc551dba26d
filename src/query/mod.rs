//! Lazy paginated query iterator over a collection's search results.

mod terms;
mod validate;

pub use terms::{parse_date, SearchTermValue};
pub use validate::{validate, ValidationError};

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

use crate::auth::make_session;
use crate::collection::{describe, DescribeError};
use crate::feature::Feature;

const DEFAULT_BASE_URL: &str = "https://catalogue.dataspace.copernicus.eu/resto/api/collections";
const DEFAULT_MAX_RECORDS: u32 = 2000;
const PAGE_FETCH_ATTEMPTS: u32 = 10;

/// The catalogue search base URL, overridable via `CDSETOOL_CATALOGUE_BASE_URL`
/// for tests that point it at a mock server.
fn base_url() -> String {
    std::env::var("CDSETOOL_CATALOGUE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Describe(#[from] DescribeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("page fetch failed: {0}")]
    PageFetch(String),

    #[error("index out of range")]
    OutOfRange,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(default)]
    properties: SearchResponseProperties,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponseProperties {
    #[serde(default, rename = "totalResults")]
    total_results: Option<i64>,
    #[serde(default)]
    links: Vec<ResponseLink>,
}

#[derive(Debug, Deserialize)]
struct ResponseLink {
    rel: String,
    href: String,
}

/// Options controlling query construction, mirroring the source's
/// `logger`/`validateSearchTerms` option bag.
pub struct FeatureQueryOptions {
    pub validate_search_terms: bool,
    pub max_records: u32,
}

impl Default for FeatureQueryOptions {
    fn default() -> Self {
        Self {
            validate_search_terms: true,
            max_records: DEFAULT_MAX_RECORDS,
        }
    }
}

struct QueryState {
    features: Vec<Feature>,
    next_page_url: Option<String>,
    total_results: i64,
}

/// A re-entrant, lazily-paginated view over one collection's search results.
///
/// Buffered features and the next-page cursor are owned by this value and
/// shared by every consumer; [`FeatureQuery::stream`] produces an
/// independent forward cursor each call, so the same query can be traversed
/// more than once.
pub struct FeatureQuery {
    state: Mutex<QueryState>,
}

impl FeatureQuery {
    /// Builds a query URL for `collection` filtered by `search_terms`,
    /// validating each term against the collection's descriptor unless
    /// `options.validate_search_terms` is false.
    pub async fn new(
        collection: &str,
        search_terms: &[(String, SearchTermValue)],
        options: FeatureQueryOptions,
    ) -> Result<Arc<Self>, QueryError> {
        if options.validate_search_terms {
            let descriptor = describe(collection).await?;
            for (key, value) in search_terms {
                validate(&descriptor, key, &value.serialize())?;
            }
        }

        let mut url = reqwest::Url::parse(&format!("{}/{}/search.json", base_url(), collection))
            .map_err(|e| QueryError::InvalidUrl(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("maxRecords", &options.max_records.to_string());
            pairs.append_pair("exactCount", "1");
            for (key, value) in search_terms {
                pairs.append_pair(key, &value.serialize());
            }
        }

        Ok(Arc::new(Self {
            state: Mutex::new(QueryState {
                features: Vec::new(),
                next_page_url: Some(url.to_string()),
                total_results: -1,
            }),
        }))
    }

    /// Returns `totalResults`, fetching the first page if not yet known.
    pub async fn len(&self) -> Result<i64, QueryError> {
        let mut state = self.state.lock().await;
        if state.total_results < 0 && state.next_page_url.is_some() {
            self.fetch_page(&mut state).await?;
        }
        if state.total_results < 0 {
            // Server never reported totalResults; best-effort fall back to
            // the buffered count once all pages have been exhausted.
            Ok(state.features.len() as i64)
        } else {
            Ok(state.total_results)
        }
    }

    /// Fetches further pages until the buffer holds at least `index + 1`
    /// items, returning `QueryError::OutOfRange` if the result set is
    /// exhausted first.
    pub async fn get(&self, index: usize) -> Result<Feature, QueryError> {
        let mut state = self.state.lock().await;
        while state.features.len() <= index {
            if state.next_page_url.is_none() {
                return Err(QueryError::OutOfRange);
            }
            self.fetch_page(&mut state).await?;
        }
        Ok(state.features[index].clone())
    }

    async fn fetch_page(&self, state: &mut QueryState) -> Result<(), QueryError> {
        let url = state
            .next_page_url
            .clone()
            .expect("caller only fetches when a next-page URL is present");
        let session = make_session(1);

        let mut last_err = None;
        for attempt in 1..=PAGE_FETCH_ATTEMPTS {
            let outcome = session.get_stream(&url).await;
            match outcome {
                Ok(response) if response.status().is_success() => {
                    let body: SearchResponse = response
                        .json()
                        .await
                        .map_err(|e| QueryError::PageFetch(e.to_string()))?;

                    state.features.extend(body.features);
                    if let Some(total) = body.properties.total_results {
                        state.total_results = total;
                    }
                    state.next_page_url = body
                        .properties
                        .links
                        .into_iter()
                        .find(|l| l.rel == "next")
                        .map(|l| l.href);
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    warn!(attempt, %status, "page fetch returned non-200, retrying");
                    last_err = Some(QueryError::PageFetch(format!("HTTP {}", status)));
                }
                Err(e) => {
                    warn!(attempt, "page fetch failed: {}", e);
                    last_err = Some(QueryError::PageFetch(e.to_string()));
                }
            }

            if attempt < PAGE_FETCH_ATTEMPTS {
                let jitter: f64 = rand::thread_rng().gen_range(0.0..0.25);
                tokio::time::sleep(Duration::from_secs_f64(60.0 * (1.0 + jitter))).await;
            }
        }

        Err(last_err.unwrap_or_else(|| QueryError::PageFetch("retries exhausted".to_string())))
    }

    /// Produces a fresh forward cursor over the buffered (and lazily
    /// fetched) features.
    pub fn stream(self: Arc<Self>) -> impl futures_util::Stream<Item = Result<Feature, QueryError>> {
        async_stream::stream! {
            let mut index = 0usize;
            loop {
                match self.get(index).await {
                    Ok(feature) => {
                        yield Ok(feature);
                        index += 1;
                    }
                    Err(QueryError::OutOfRange) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }
}
