use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use regex::Regex;
use thiserror::Error;

use crate::auth::{make_session, AuthError};

const DESCRIBE_ATTEMPTS: u32 = 10;
const DEFAULT_BASE_URL: &str = "https://catalogue.dataspace.copernicus.eu/resto/api/collections";

/// Overridable via `CDSETOOL_CATALOGUE_BASE_URL` for tests that point it at a
/// mock server; see `query::base_url` for the sibling override.
fn base_url() -> String {
    std::env::var("CDSETOOL_CATALOGUE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

#[derive(Debug, Error)]
pub enum DescribeError {
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("failed to parse describe document: {0}")]
    Xml(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// One search-term's validation rule, parsed from a `Parameter` element of
/// the collection's `describe.xml` document.
#[derive(Debug, Clone)]
pub struct SearchTermSpec {
    pub pattern: Option<Regex>,
    pub min_inclusive: Option<f64>,
    pub max_inclusive: Option<f64>,
    pub title: Option<String>,
}

pub type CollectionDescriptor = HashMap<String, SearchTermSpec>;

fn cache() -> &'static Mutex<HashMap<String, Arc<CollectionDescriptor>>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Arc<CollectionDescriptor>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Fetches (or returns the cached copy of) the search-term descriptor for
/// `collection`.
pub async fn describe(collection: &str) -> Result<Arc<CollectionDescriptor>, DescribeError> {
    if let Some(cached) = cache().lock().unwrap().get(collection) {
        return Ok(cached.clone());
    }

    let url = format!("{}/{}/describe.xml", base_url(), collection);
    let session = make_session(DESCRIBE_ATTEMPTS);
    let response = session.get(&url).await?;

    if !response.status().is_success() {
        return Err(DescribeError::UnknownCollection(collection.to_string()));
    }

    let xml = response.text().await.map_err(AuthError::from)?;
    let descriptor = Arc::new(parse_describe_xml(&xml)?);

    // Idempotent fill: a racing writer's value is deterministic for this
    // collection, so last-write-wins is fine.
    cache()
        .lock()
        .unwrap()
        .insert(collection.to_string(), descriptor.clone());

    Ok(descriptor)
}

fn parse_describe_xml(xml: &str) -> Result<CollectionDescriptor, DescribeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut descriptor = HashMap::new();
    let mut in_json_url = false;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| DescribeError::Xml(e.to_string()))?;

        match event {
            Event::Start(e) | Event::Empty(e) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                if local == "Url" {
                    let is_json = e.attributes().flatten().any(|a| {
                        a.key.as_ref() == b"type" && a.value.as_ref() == b"application/json"
                    });
                    if is_json {
                        in_json_url = true;
                    }
                } else if in_json_url && local == "Parameter" {
                    let mut name_attr = None;
                    let mut pattern = None;
                    let mut min_inclusive = None;
                    let mut max_inclusive = None;
                    let mut title = None;

                    for attr in e.attributes().flatten() {
                        let value = attr
                            .unescape_value()
                            .map_err(|e| DescribeError::Xml(e.to_string()))?
                            .to_string();
                        match attr.key.as_ref() {
                            b"name" => name_attr = Some(value),
                            b"pattern" => pattern = Some(value),
                            b"minInclusive" => min_inclusive = Some(value),
                            b"maxInclusive" => max_inclusive = Some(value),
                            b"title" => title = Some(value),
                            _ => {}
                        }
                    }

                    if let Some(name) = name_attr {
                        let pattern = pattern
                            .map(|p| Regex::new(&p))
                            .transpose()
                            .map_err(|e| DescribeError::Xml(e.to_string()))?;
                        descriptor.insert(
                            name,
                            SearchTermSpec {
                                pattern,
                                min_inclusive: min_inclusive.and_then(|v| v.parse().ok()),
                                max_inclusive: max_inclusive.and_then(|v| v.parse().ok()),
                                title,
                            },
                        );
                    }
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"Url" {
                    in_json_url = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OpenSearchDescription xmlns="http://a9.com/-/spec/opensearch/1.1/">
  <Url type="application/atom+xml" template="/atom?x={x}">
    <Parameter name="ignored" pattern=".*"/>
  </Url>
  <Url type="application/json" template="/search.json?productType={p:productType}&amp;orbitNumber={p:orbitNumber}">
    <Parameter name="productType" pattern="^(S2MSI1C|S2MSI2A)$" title="Product type"/>
    <Parameter name="orbitNumber" minInclusive="1" maxInclusive="999999" title="Orbit number"/>
  </Url>
</OpenSearchDescription>"#;

    #[test]
    fn parses_only_json_url_parameters() {
        let descriptor = parse_describe_xml(SAMPLE).unwrap();
        assert_eq!(descriptor.len(), 2);
        assert!(!descriptor.contains_key("ignored"));

        let product_type = &descriptor["productType"];
        assert!(product_type.pattern.as_ref().unwrap().is_match("S2MSI1C"));
        assert!(!product_type.pattern.as_ref().unwrap().is_match("foo"));

        let orbit = &descriptor["orbitNumber"];
        assert_eq!(orbit.min_inclusive, Some(1.0));
        assert_eq!(orbit.max_inclusive, Some(999999.0));
    }
}
