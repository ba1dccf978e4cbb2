//! Resource limits, geometry constraints, and storage names shared across
//! the application. Values can differ per deployment only where an
//! environment variable exists in `config`; everything here is fixed.

/// Maximum live tokens per executive. Issuing one more rotates the oldest out.
pub const MAX_EXECUTIVE_TOKENS: i64 = 5;

/// Token validity in seconds (7 days).
pub const MAX_TOKEN_VALIDITY: i64 = 7 * 24 * 60 * 60;

/// Landmark boundary area limits in square meters.
pub const MAX_LANDMARK_AREA: f64 = 5.0 * 1000.0 * 1000.0;
pub const MIN_LANDMARK_AREA: f64 = 2.0;

/// Minimum number of landmarks per route.
pub const MIN_LANDMARK_IN_ROUTE: usize = 2;

/// Redis mutex lock expiry (seconds).
pub const MUTEX_LOCK_TIMEOUT: u64 = 10;

/// Maximum blocking wait for a Redis mutex lock (seconds).
pub const MUTEX_LOCK_MAX_WAIT_TIME: u64 = 60;

/// MinIO bucket for executive profile pictures.
pub const EXECUTIVE_PICTURES: &str = "executive-pictures";

/// Spatial reference for all stored geometry (WGS 84).
pub const EPSG_4326: i32 = 4326;

/// Interval between expired-token sweeps (seconds).
pub const TOKEN_CLEANER_INTERVAL: u64 = 300;
