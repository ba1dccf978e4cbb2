//! Fleet vehicles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Bus {
    pub id: i32,
    pub company_id: i32,

    /// Indian plate shape, e.g. `KL07AB1234`. Unique per company.
    pub registration_number: String,

    pub name: String,
    pub capacity: i32,
    pub manufactured_on: DateTime<Utc>,

    // Document validity dates
    pub insurance_upto: Option<DateTime<Utc>>,
    pub pollution_upto: Option<DateTime<Utc>>,
    pub fitness_upto: Option<DateTime<Utc>>,
    pub road_tax_upto: Option<DateTime<Utc>>,

    /// `BusStatus` discriminant.
    pub status: i32,

    pub updated_on: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
}

pub const BUS_COLUMNS: &str = "id, company_id, registration_number, name, capacity, \
     manufactured_on, insurance_upto, pollution_upto, fitness_upto, road_tax_upto, \
     status, updated_on, created_on";
