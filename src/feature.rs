//! A single catalogue result item. The system treats it as read-through
//! provider JSON and never mutates it.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Feature(serde_json::Value);

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

impl Feature {
    pub fn id(&self) -> Option<&str> {
        self.0.get("id")?.as_str()
    }

    pub fn title(&self) -> Option<&str> {
        self.0.pointer("/properties/title")?.as_str()
    }

    pub fn collection(&self) -> Option<&str> {
        self.0.pointer("/properties/collection")?.as_str()
    }

    pub fn download_url(&self) -> Option<&str> {
        self.0
            .pointer("/properties/services/download/url")?
            .as_str()
    }

    pub fn links(&self) -> Vec<Link> {
        self.0
            .pointer("/properties/links")
            .and_then(|v| v.as_array())
            .map(|links| {
                links
                    .iter()
                    .filter_map(|l| serde_json::from_value(l.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_standard_fields() {
        let json = serde_json::json!({
            "id": "a6215824-0000",
            "properties": {
                "title": "S2B_MSIL1C_SAMPLE",
                "collection": "SENTINEL-2",
                "services": { "download": { "url": "https://example.com/dl" } },
                "links": [{"rel": "next", "href": "https://example.com/next"}]
            }
        });
        let feature: Feature = serde_json::from_value(json).unwrap();
        assert_eq!(feature.id(), Some("a6215824-0000"));
        assert_eq!(feature.title(), Some("S2B_MSIL1C_SAMPLE"));
        assert_eq!(feature.collection(), Some("SENTINEL-2"));
        assert_eq!(feature.download_url(), Some("https://example.com/dl"));
        assert_eq!(feature.links()[0].rel, "next");
    }
}
