//! OData node-path URL assembly for manifest and inner-file fetches.

const BASE_URL: &str = "https://download.dataspace.copernicus.eu/odata/v1";

/// Builds `.../Products(<feature_id>)/Nodes(<product_name>)/Nodes(<seg1>)/…/Nodes(<segN>)/$value`
/// from the slash-separated components of `relative_path`.
pub fn node_url(feature_id: &str, product_name: &str, relative_path: &str) -> String {
    let mut url = format!(
        "{}/Products({})/Nodes({})",
        BASE_URL, feature_id, product_name
    );
    for segment in relative_path.split('/').filter(|s| !s.is_empty()) {
        url.push_str(&format!("/Nodes({})", segment));
    }
    url.push_str("/$value");
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_node_path() {
        let url = node_url(
            "a6215824-0000-0000-0000-000000000000",
            "S2B_MSIL1C_20241209_SAMPLE.SAFE",
            "path/to/resource.xml",
        );
        assert_eq!(
            url,
            "https://download.dataspace.copernicus.eu/odata/v1/Products(a6215824-0000-0000-0000-000000000000)/Nodes(S2B_MSIL1C_20241209_SAMPLE.SAFE)/Nodes(path)/Nodes(to)/Nodes(resource.xml)/$value"
        );
    }

    #[test]
    fn single_segment_relative_path() {
        let url = node_url("id", "product.SAFE", "manifest.safe");
        assert_eq!(
            url,
            "https://download.dataspace.copernicus.eu/odata/v1/Products(id)/Nodes(product.SAFE)/Nodes(manifest.safe)/$value"
        );
    }
}
