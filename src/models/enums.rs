//! Integer-coded enumerations stored as plain `INTEGER` columns.
//!
//! The wire format and the database both carry the numeric discriminant, so
//! each enum converts explicitly to and from `i32`.

use crate::errors::ApiError;

macro_rules! int_enum {
    ($(#[$meta:meta])* $name:ident, $column:literal { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(i32)]
        pub enum $name {
            $($variant = $value),+
        }

        impl $name {
            pub const fn as_i32(self) -> i32 {
                self as i32
            }
        }

        impl TryFrom<i32> for $name {
            type Error = ApiError;

            fn try_from(value: i32) -> Result<Self, ApiError> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(ApiError::InvalidValue($column)),
                }
            }
        }
    };
}

int_enum!(AccountStatus, "status" {
    Active = 1,
    Suspended = 2,
});

int_enum!(GenderType, "gender" {
    Other = 1,
    Female = 2,
    Male = 3,
    Transgender = 4,
});

int_enum!(PlatformType, "platform_type" {
    Other = 1,
    Web = 2,
    Android = 3,
    Ios = 4,
});

int_enum!(CompanyStatus, "status" {
    UnderVerification = 1,
    Verified = 2,
    Suspended = 3,
});

int_enum!(CompanyType, "type" {
    Private = 1,
    Government = 2,
    Other = 3,
});

int_enum!(LandmarkType, "type" {
    Local = 1,
    Village = 2,
    Town = 3,
    City = 4,
});

int_enum!(BusStatus, "status" {
    Active = 1,
    Maintenance = 2,
    Suspended = 3,
});

/// Sort direction selector shared by every search endpoint.
int_enum!(OrderIn, "order_in" {
    Asc = 1,
    Desc = 2,
});

impl OrderIn {
    pub fn sql(self) -> &'static str {
        match self {
            OrderIn::Asc => " ASC",
            OrderIn::Desc => " DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_round_trip() {
        assert_eq!(AccountStatus::try_from(1).unwrap(), AccountStatus::Active);
        assert_eq!(AccountStatus::Suspended.as_i32(), 2);
        assert_eq!(LandmarkType::try_from(4).unwrap(), LandmarkType::City);
        assert_eq!(PlatformType::Other.as_i32(), 1);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(AccountStatus::try_from(0).is_err());
        assert!(CompanyType::try_from(9).is_err());
        assert!(OrderIn::try_from(-1).is_err());
    }

    #[test]
    fn order_in_renders_sql() {
        assert_eq!(OrderIn::Asc.sql(), " ASC");
        assert_eq!(OrderIn::Desc.sql(), " DESC");
    }
}
