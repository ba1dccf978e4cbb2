//! Geometry validation for SRID 4326 WKT inputs.
//!
//! The API accepts geometry only as WKT text. Landmark boundaries must be
//! axis-aligned bounding boxes (the UI converts drawn circles to their
//! enclosing AABB before submitting), within configured area limits.

use geo::{Contains, GeodesicArea, Point, Polygon};
use wkt::{ToWkt, TryFromWkt};

use crate::constants::{MAX_LANDMARK_AREA, MIN_LANDMARK_AREA};
use crate::errors::{ApiError, ApiResult};

/// Parse a WKT string that must be a `POLYGON`.
pub fn parse_polygon(wkt_str: &str) -> ApiResult<Polygon<f64>> {
    Polygon::try_from_wkt_str(wkt_str).map_err(|_| ApiError::InvalidWktStringOrType)
}

/// Parse a WKT string that must be a `POINT`.
pub fn parse_point(wkt_str: &str) -> ApiResult<Point<f64>> {
    Point::try_from_wkt_str(wkt_str).map_err(|_| ApiError::InvalidWktStringOrType)
}

/// SRID 4326 holds when every coordinate is a plausible lon/lat pair.
fn coords_in_wgs84_bounds(coords: impl Iterator<Item = (f64, f64)>) -> bool {
    let mut any = false;
    for (x, y) in coords {
        any = true;
        if !(-180.0..=180.0).contains(&x) || !(-90.0..=90.0).contains(&y) {
            return false;
        }
    }
    any
}

pub fn ensure_polygon_srid4326(polygon: &Polygon<f64>) -> ApiResult<()> {
    let ok = coords_in_wgs84_bounds(polygon.exterior().coords().map(|c| (c.x, c.y)));
    if ok { Ok(()) } else { Err(ApiError::InvalidSrid4326) }
}

pub fn ensure_point_srid4326(point: &Point<f64>) -> ApiResult<()> {
    let ok = coords_in_wgs84_bounds(std::iter::once((point.x(), point.y())));
    if ok { Ok(()) } else { Err(ApiError::InvalidSrid4326) }
}

/// An AABB is a closed 5-coordinate exterior ring with exactly two distinct
/// longitudes and two distinct latitudes, and no interior rings.
pub fn ensure_aabb(polygon: &Polygon<f64>) -> ApiResult<()> {
    if !polygon.interiors().is_empty() {
        return Err(ApiError::InvalidAabb);
    }
    let ring: Vec<_> = polygon.exterior().coords().collect();
    if ring.len() != 5 || ring[0] != ring[4] {
        return Err(ApiError::InvalidAabb);
    }
    let mut xs: Vec<f64> = ring[..4].iter().map(|c| c.x).collect();
    let mut ys: Vec<f64> = ring[..4].iter().map(|c| c.y).collect();
    xs.sort_by(|a, b| a.total_cmp(b));
    ys.sort_by(|a, b| a.total_cmp(b));
    xs.dedup();
    ys.dedup();
    if xs.len() != 2 || ys.len() != 2 {
        return Err(ApiError::InvalidAabb);
    }
    // Every corner must sit on the rectangle defined by the two x/y values.
    let on_grid = ring[..4]
        .iter()
        .all(|c| xs.contains(&c.x) && ys.contains(&c.y));
    if on_grid { Ok(()) } else { Err(ApiError::InvalidAabb) }
}

/// Geodesic polygon area in square meters.
pub fn area_sq_meters(polygon: &Polygon<f64>) -> f64 {
    polygon.geodesic_area_unsigned()
}

pub fn ensure_boundary_area(polygon: &Polygon<f64>) -> ApiResult<()> {
    let area = area_sq_meters(polygon);
    if area > MIN_LANDMARK_AREA && area < MAX_LANDMARK_AREA {
        Ok(())
    } else {
        Err(ApiError::InvalidBoundaryArea)
    }
}

/// Validate a landmark boundary submission end to end and return the parsed
/// polygon along with its normalized WKT form.
pub fn validate_boundary(wkt_str: &str) -> ApiResult<(Polygon<f64>, String)> {
    let polygon = parse_polygon(wkt_str)?;
    ensure_polygon_srid4326(&polygon)?;
    ensure_aabb(&polygon)?;
    ensure_boundary_area(&polygon)?;
    let normalized = polygon.to_wkt().to_string();
    Ok((polygon, normalized))
}

/// Validate a point submission (bus stop or company location).
pub fn validate_point(wkt_str: &str) -> ApiResult<(Point<f64>, String)> {
    let point = parse_point(wkt_str)?;
    ensure_point_srid4326(&point)?;
    let normalized = point.to_wkt().to_string();
    Ok((point, normalized))
}

pub fn point_within(polygon: &Polygon<f64>, point: &Point<f64>) -> bool {
    polygon.contains(point)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Roughly 250 m x 220 m box near Kochi.
    const BOX: &str =
        "POLYGON((76.30 9.97, 76.3022 9.97, 76.3022 9.972, 76.30 9.972, 76.30 9.97))";

    #[test]
    fn accepts_a_valid_aabb_boundary() {
        let (polygon, normalized) = validate_boundary(BOX).unwrap();
        assert_eq!(polygon.exterior().coords().count(), 5);
        assert!(normalized.starts_with("POLYGON"));
    }

    #[test]
    fn rejects_non_polygon_wkt() {
        assert!(matches!(
            validate_boundary("POINT(76.30 9.97)"),
            Err(ApiError::InvalidWktStringOrType)
        ));
        assert!(matches!(
            validate_boundary("not wkt at all"),
            Err(ApiError::InvalidWktStringOrType)
        ));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let bad = "POLYGON((200 9.97, 200.002 9.97, 200.002 9.972, 200 9.972, 200 9.97))";
        assert!(matches!(
            validate_boundary(bad),
            Err(ApiError::InvalidSrid4326)
        ));
    }

    #[test]
    fn rejects_a_triangle_as_aabb() {
        let triangle = "POLYGON((76.30 9.97, 76.31 9.97, 76.305 9.98, 76.30 9.97))";
        assert!(matches!(
            validate_boundary(triangle),
            Err(ApiError::InvalidAabb)
        ));
    }

    #[test]
    fn rejects_a_skewed_quad_as_aabb() {
        let skewed =
            "POLYGON((76.30 9.97, 76.302 9.971, 76.302 9.973, 76.30 9.972, 76.30 9.97))";
        assert!(matches!(
            validate_boundary(skewed),
            Err(ApiError::InvalidAabb)
        ));
    }

    #[test]
    fn rejects_boundaries_outside_area_limits() {
        // Degenerate sliver, well under 2 m².
        let tiny = "POLYGON((76.30 9.97, 76.3000001 9.97, 76.3000001 9.9700001, 76.30 9.9700001, 76.30 9.97))";
        assert!(matches!(
            validate_boundary(tiny),
            Err(ApiError::InvalidBoundaryArea)
        ));
        // A degree-sized box is far beyond 5 km².
        let huge = "POLYGON((76 9, 77 9, 77 10, 76 10, 76 9))";
        assert!(matches!(
            validate_boundary(huge),
            Err(ApiError::InvalidBoundaryArea)
        ));
    }

    #[test]
    fn area_of_sample_box_is_plausible() {
        let (polygon, _) = validate_boundary(BOX).unwrap();
        let area = area_sq_meters(&polygon);
        // ~240 m x ~220 m
        assert!(area > 20_000.0 && area < 100_000.0, "area = {area}");
    }

    #[test]
    fn point_containment_matches_geometry() {
        let (polygon, _) = validate_boundary(BOX).unwrap();
        let (inside, _) = validate_point("POINT(76.301 9.971)").unwrap();
        let (outside, _) = validate_point("POINT(76.31 9.98)").unwrap();
        assert!(point_within(&polygon, &inside));
        assert!(!point_within(&polygon, &outside));
    }
}
