//! Executive accounts, their RBAC roles, role mappings, access tokens, and
//! profile picture metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An executive user: admins, supervisors, or staff with elevated access.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Executive {
    pub id: i32,

    /// Login name. 4-32 chars, starts with a letter, then letters, digits
    /// and `-.@_`.
    pub username: String,

    /// Argon2 hash. Never serialized back to clients.
    #[serde(skip_serializing)]
    pub password: String,

    /// `GenderType` discriminant.
    pub gender: i32,

    pub full_name: Option<String>,
    pub designation: Option<String>,

    /// `AccountStatus` discriminant.
    pub status: i32,

    /// RFC3966 phone number (leading `+`, country code, local number).
    pub phone_number: Option<String>,

    /// RFC5322 email address.
    pub email_id: Option<String>,

    pub updated_on: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
}

/// Column list matching `Executive`'s field order.
pub const EXECUTIVE_COLUMNS: &str = "id, username, password, gender, full_name, designation, \
     status, phone_number, email_id, updated_on, created_on";

/// A predefined permission set assignable to executives.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ExecutiveRole {
    pub id: i32,
    pub name: String,
    // Token management
    pub manage_ex_token: bool,
    // Executive management
    pub create_executive: bool,
    pub update_executive: bool,
    pub delete_executive: bool,
    // Landmark management
    pub create_landmark: bool,
    pub update_landmark: bool,
    pub delete_landmark: bool,
    // Bus stop management
    pub create_bus_stop: bool,
    pub update_bus_stop: bool,
    pub delete_bus_stop: bool,
    // Company management
    pub create_company: bool,
    pub update_company: bool,
    pub delete_company: bool,
    // Route management
    pub create_route: bool,
    pub update_route: bool,
    pub delete_route: bool,
    // Bus management
    pub create_bus: bool,
    pub update_bus: bool,
    pub delete_bus: bool,
    // Metadata
    pub updated_on: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
}

/// Many-to-many mapping between executives and roles.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ExecutiveRoleMap {
    pub id: i32,
    pub role_id: i32,
    pub executive_id: i32,
    pub updated_on: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
}

/// A bearer access token issued to an executive.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ExecutiveToken {
    pub id: i32,
    pub executive_id: i32,

    /// 64-char lowercase hex, unique.
    pub access_token: String,

    /// Validity duration in seconds at issue time.
    pub expires_in: i32,

    pub expires_at: DateTime<Utc>,

    /// `PlatformType` discriminant.
    pub platform_type: i32,

    /// Free-form client description (user agent, app version, ...).
    pub client_details: Option<String>,

    pub updated_on: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
}

pub const EXECUTIVE_TOKEN_COLUMNS: &str = "id, executive_id, access_token, expires_in, \
     expires_at, platform_type, client_details, updated_on, created_on";

/// Token view returned by listings: everything except the secret itself.
#[derive(Serialize, Debug)]
pub struct MaskedExecutiveToken {
    pub id: i32,
    pub executive_id: i32,
    pub expires_in: i32,
    pub expires_at: DateTime<Utc>,
    pub platform_type: i32,
    pub client_details: Option<String>,
    pub updated_on: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
}

impl ExecutiveToken {
    pub fn masked(&self) -> MaskedExecutiveToken {
        MaskedExecutiveToken {
            id: self.id,
            executive_id: self.executive_id,
            expires_in: self.expires_in,
            expires_at: self.expires_at,
            platform_type: self.platform_type,
            client_details: self.client_details.clone(),
            updated_on: self.updated_on,
            created_on: self.created_on,
        }
    }
}

/// Metadata row for a picture stored in the `executive-pictures` bucket.
/// The object key in MinIO is the stringified row id.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ExecutiveImage {
    pub id: i32,
    pub executive_id: i32,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub created_on: DateTime<Utc>,
}
