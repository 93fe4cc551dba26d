//! GeoJSON → WKT conversion for spatial search-term filters.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WktError {
    #[error("not a GeoJSON Feature or Polygon geometry")]
    NotAPolygon,

    #[error("polygon has no exterior ring")]
    MissingExteriorRing,

    #[error("invalid coordinate pair")]
    InvalidCoordinate,
}

/// Converts a GeoJSON `Feature` (or bare `Polygon` geometry) to a WKT
/// `POLYGON((...))` string built from its exterior ring.
pub fn polygon_from_geojson(geojson: &serde_json::Value) -> Result<String, WktError> {
    let geometry = match geojson.get("type").and_then(|t| t.as_str()) {
        Some("Feature") => geojson.get("geometry").ok_or(WktError::NotAPolygon)?,
        Some("Polygon") => geojson,
        _ => return Err(WktError::NotAPolygon),
    };

    if geometry.get("type").and_then(|t| t.as_str()) != Some("Polygon") {
        return Err(WktError::NotAPolygon);
    }

    let rings = geometry
        .get("coordinates")
        .and_then(|c| c.as_array())
        .ok_or(WktError::NotAPolygon)?;
    let exterior = rings.first().ok_or(WktError::MissingExteriorRing)?;
    let points = exterior.as_array().ok_or(WktError::MissingExteriorRing)?;

    let mut formatted = Vec::with_capacity(points.len());
    for point in points {
        let coords = point.as_array().ok_or(WktError::InvalidCoordinate)?;
        if coords.len() < 2 {
            return Err(WktError::InvalidCoordinate);
        }
        let x = coords[0].as_f64().ok_or(WktError::InvalidCoordinate)?;
        let y = coords[1].as_f64().ok_or(WktError::InvalidCoordinate)?;
        formatted.push(format!("{} {}", format_coord(x), format_coord(y)));
    }

    Ok(format!("POLYGON(({}))", formatted.join(", ")))
}

/// Mirrors Python's `str(float)` formatting closely enough for coordinate
/// values: integral values keep a trailing `.0`, otherwise the shortest
/// round-tripping decimal representation is used.
fn format_coord(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        let s = format!("{}", value);
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_feature_polygon_to_wkt() {
        let geojson = serde_json::json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [10.1724063, 55.4825912],
                    [10.1724063, 55.3823427],
                    [10.4237198, 55.3823427],
                    [10.4237198, 55.4825912],
                    [10.1724063, 55.4825912]
                ]]
            }
        });

        let wkt = polygon_from_geojson(&geojson).unwrap();
        assert_eq!(
            wkt,
            "POLYGON((10.1724063 55.4825912, 10.1724063 55.3823427, 10.4237198 55.3823427, 10.4237198 55.4825912, 10.1724063 55.4825912))"
        );
    }

    #[test]
    fn rejects_non_polygon_geometry() {
        let geojson = serde_json::json!({
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [1.0, 2.0] }
        });
        assert!(matches!(polygon_from_geojson(&geojson), Err(WktError::NotAPolygon)));
    }

    #[test]
    fn integral_coordinates_keep_trailing_decimal() {
        let geojson = serde_json::json!({
            "type": "Polygon",
            "coordinates": [[[10.0, 20.0], [11.0, 20.0], [11.0, 21.0], [10.0, 20.0]]]
        });
        let wkt = polygon_from_geojson(&geojson).unwrap();
        assert_eq!(wkt, "POLYGON((10.0 20.0, 11.0 20.0, 11.0 21.0, 10.0 20.0))");
    }
}
