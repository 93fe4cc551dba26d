//! Manifest parsing and glob filtering for partial-mode downloads.
//!
//! Two XML dialects are supported, keyed by the manifest's basename:
//! SENTINEL-1/2's `manifest.safe` and SENTINEL-3's `manifest.xml` /
//! `xfdumanifest.xml`.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to parse manifest XML: {0}")]
    Xml(String),

    #[error("invalid filter pattern: {0}")]
    Glob(String),

    #[error("collection '{0}' is not supported for filtered (partial-mode) downloads")]
    UnsupportedCollectionForFilter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestDialect {
    Safe,
    Xfdu,
}

/// Maps a collection name to the manifest basename partial-mode downloads
/// must fetch for it.
pub fn manifest_filename(collection: &str) -> Result<&'static str, ManifestError> {
    match collection {
        "SENTINEL-1" | "SENTINEL-2" => Ok("manifest.safe"),
        "SENTINEL-3" => Ok("manifest.xml"),
        other => Err(ManifestError::UnsupportedCollectionForFilter(
            other.to_string(),
        )),
    }
}

fn dialect_for_filename(name: &str) -> ManifestDialect {
    match name {
        "manifest.safe" => ManifestDialect::Safe,
        _ => ManifestDialect::Xfdu,
    }
}

/// Parses `xml` (the manifest document named `manifest_basename`) into an
/// ordered list of relative paths, in document order.
pub fn parse_entries(xml: &str, manifest_basename: &str) -> Result<Vec<String>, ManifestError> {
    match dialect_for_filename(manifest_basename) {
        ManifestDialect::Safe => parse_safe(xml),
        ManifestDialect::Xfdu => parse_xfdu(xml),
    }
}

fn parse_safe(xml: &str) -> Result<Vec<String>, ManifestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut paths = Vec::new();
    let mut in_data_object_section = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ManifestError::Xml(e.to_string()))?;

        match event {
            Event::Start(e) | Event::Empty(e) => {
                let local = e.local_name();
                if local.as_ref() == b"dataObjectSection" {
                    in_data_object_section = true;
                } else if in_data_object_section && local.as_ref() == b"fileLocation" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"href" {
                            let href = attr
                                .unescape_value()
                                .map_err(|e| ManifestError::Xml(e.to_string()))?
                                .to_string();
                            paths.push(strip_relative_prefix(&href));
                        }
                    }
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"dataObjectSection" {
                    in_data_object_section = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(paths)
}

fn parse_xfdu(xml: &str) -> Result<Vec<String>, ManifestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut paths = Vec::new();
    let mut in_data_section = false;
    let mut in_path = false;
    let mut current_text = String::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ManifestError::Xml(e.to_string()))?;

        match event {
            Event::Start(e) => {
                let local = e.local_name();
                if local.as_ref() == b"dataSection" {
                    in_data_section = true;
                } else if in_data_section && local.as_ref() == b"path" {
                    in_path = true;
                    current_text.clear();
                }
            }
            Event::Text(t) => {
                if in_path {
                    current_text.push_str(
                        &t.unescape()
                            .map_err(|e| ManifestError::Xml(e.to_string()))?,
                    );
                }
            }
            Event::End(e) => {
                let local = e.local_name();
                if local.as_ref() == b"path" && in_path {
                    in_path = false;
                    paths.push(strip_product_prefix(&current_text));
                } else if local.as_ref() == b"dataSection" {
                    in_data_section = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(paths)
}

fn strip_relative_prefix(href: &str) -> String {
    href.trim_start_matches("./").to_string()
}

/// SENTINEL-3 paths are recorded with a leading product-name directory that
/// OData addressing supplies separately via `Nodes(<productName>)`; drop it.
fn strip_product_prefix(path: &str) -> String {
    match path.trim_start_matches("./").split_once('/') {
        Some((_prefix, rest)) => rest.to_string(),
        None => path.to_string(),
    }
}

/// Keeps entries where `glob::Pattern::matches(path) XOR exclude`.
pub fn filter_entries(
    entries: Vec<String>,
    pattern: &str,
    exclude: bool,
) -> Result<Vec<String>, ManifestError> {
    let pattern =
        glob::Pattern::new(pattern).map_err(|e| ManifestError::Glob(e.to_string()))?;
    Ok(entries
        .into_iter()
        .filter(|path| pattern.matches(path) ^ exclude)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAFE_MANIFEST: &str = r#"<?xml version="1.0"?>
<XFDU>
  <informationPackageMap/>
  <metadataSection/>
  <dataObjectSection>
    <dataObject ID="IMG_DATA_Band_TCI">
      <byteStream>
        <fileLocation href="./GRANULE/L1C_T17UPV_A040535_20241209T162603/IMG_DATA/T17UPV_20241209T162609_TCI.jp2"/>
      </byteStream>
    </dataObject>
    <dataObject ID="IMG_DATA_Band_B01">
      <byteStream>
        <fileLocation href="./GRANULE/L1C_T17UPV_A040535_20241209T162603/IMG_DATA/T17UPV_20241209T162609_B01.jp2"/>
      </byteStream>
    </dataObject>
    <dataObject ID="MTD">
      <byteStream>
        <fileLocation href="./MTD_MSIL1C.xml"/>
      </byteStream>
    </dataObject>
  </dataObjectSection>
</XFDU>"#;

    #[test]
    fn manifest_filename_maps_known_collections() {
        assert_eq!(manifest_filename("SENTINEL-1").unwrap(), "manifest.safe");
        assert_eq!(manifest_filename("SENTINEL-2").unwrap(), "manifest.safe");
        assert_eq!(manifest_filename("SENTINEL-3").unwrap(), "manifest.xml");
        assert!(manifest_filename("LANDSAT-8").is_err());
    }

    #[test]
    fn filters_tci_files_from_safe_manifest() {
        let entries = parse_entries(SAFE_MANIFEST, "manifest.safe").unwrap();
        assert_eq!(entries.len(), 3);

        let filtered = filter_entries(entries, "*TCI.jp2", false).unwrap();
        assert_eq!(
            filtered,
            vec!["GRANULE/L1C_T17UPV_A040535_20241209T162603/IMG_DATA/T17UPV_20241209T162609_TCI.jp2"]
        );
    }

    #[test]
    fn exclude_flag_keeps_non_matching_entries_in_document_order() {
        let entries = parse_entries(SAFE_MANIFEST, "manifest.safe").unwrap();
        let filtered = filter_entries(entries, "*.jp2", true).unwrap();
        assert_eq!(filtered, vec!["MTD_MSIL1C.xml"]);
    }

    #[test]
    fn parses_xfdu_dialect_and_strips_product_prefix() {
        let xml = r#"<XFDU xmlns:sip="http://www.eumetsat.int/sip">
  <sip:dataSection>
    <sip:dataObject>
      <sip:path>S3A_OL_1_EFR.SEN3/Oa01_radiance.nc</sip:path>
    </sip:dataObject>
    <sip:dataObject>
      <sip:path>S3A_OL_1_EFR.SEN3/geo_coordinates.nc</sip:path>
    </sip:dataObject>
  </sip:dataSection>
</XFDU>"#;
        let entries = parse_entries(xml, "manifest.xml").unwrap();
        assert_eq!(entries, vec!["Oa01_radiance.nc", "geo_coordinates.nc"]);
    }
}
