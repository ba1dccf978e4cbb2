//! Bus companies registered with the platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Company {
    pub id: i32,

    /// Unique company name, at most 32 chars.
    pub name: String,

    /// `CompanyStatus` discriminant.
    pub status: i32,

    /// `CompanyType` discriminant.
    #[serde(rename = "type")]
    pub kind: i32,

    // Contact details
    pub address: String,
    pub contact_person: String,
    /// RFC3966 phone number.
    pub phone_number: String,
    /// RFC5322 email address.
    pub email_id: String,

    /// WKT `POINT`, SRID 4326.
    pub location: String,

    pub updated_on: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
}

pub const COMPANY_COLUMNS: &str = "id, name, status, type AS kind, address, contact_person, \
     phone_number, email_id, ST_AsText(location) AS location, updated_on, created_on";
