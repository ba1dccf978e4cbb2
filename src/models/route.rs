//! Company routes and their ordered landmark membership.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A named route owned by a company. The landmark sequence lives in
/// `landmark_in_route`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Route {
    pub id: i32,
    pub company_id: i32,

    /// Unique per company.
    pub name: String,

    /// Scheduled departure time at the first landmark (UTC wall clock).
    pub start_time: NaiveTime,

    pub updated_on: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
}

pub const ROUTE_COLUMNS: &str = "id, company_id, name, start_time, updated_on, created_on";

/// A single stop along a route.
///
/// `distance_from_start` is meters from the route origin; the deltas are
/// seconds offset from the route start time. The first entry sits at
/// distance 0 with zero deltas; the final entry has equal arrival and
/// departure deltas.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct LandmarkInRoute {
    pub id: i32,
    pub company_id: i32,
    pub route_id: i32,
    pub landmark_id: i32,
    pub distance_from_start: i32,
    pub arrival_delta: i32,
    pub departure_delta: i32,
    pub updated_on: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
}

pub const LANDMARK_IN_ROUTE_COLUMNS: &str = "id, company_id, route_id, landmark_id, \
     distance_from_start, arrival_delta, departure_delta, updated_on, created_on";
