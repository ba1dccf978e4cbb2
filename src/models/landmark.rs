//! Landmarks and bus stops.
//!
//! Geometry is stored as PostGIS columns with SRID 4326; the application
//! reads and writes WKT text (`ST_AsText` / `ST_GeomFromText`), so the
//! geometry fields here are strings holding WKT.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A named polygonal area used for zoning and location-aware operations.
///
/// Frontend circles are converted to axis-aligned bounding box polygons
/// before reaching the API, which keeps containment and overlap checks
/// cheap on the database side.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Landmark {
    pub id: i32,
    pub name: String,

    /// Incremented whenever a field actually changes.
    pub version: i32,

    /// WKT `POLYGON`, SRID 4326, always a closed 5-point AABB.
    pub boundary: String,

    /// `LandmarkType` discriminant.
    #[serde(rename = "type")]
    pub kind: i32,

    pub updated_on: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
}

/// Selects landmark columns with the boundary rendered as WKT.
pub const LANDMARK_COLUMNS: &str =
    "id, name, version, ST_AsText(boundary) AS boundary, type AS kind, updated_on, created_on";

/// A boarding point inside a landmark.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct BusStop {
    pub id: i32,
    pub name: String,
    pub landmark_id: i32,

    /// WKT `POINT`, SRID 4326. Must lie within the landmark boundary.
    pub location: String,

    pub updated_on: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
}

pub const BUS_STOP_COLUMNS: &str =
    "id, name, landmark_id, ST_AsText(location) AS location, updated_on, created_on";
