//! Helpers shared by the search endpoints: pagination clamping, sort
//! clause construction, and `id_list` parsing.

use crate::errors::{ApiError, ApiResult};
use crate::models::enums::OrderIn;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Clamp the requested page size into 1..=100, defaulting to 20.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Offsets must be non-negative.
pub fn clamp_offset(offset: Option<i64>) -> ApiResult<i64> {
    match offset {
        Some(value) if value < 0 => Err(ApiError::InvalidValue("offset")),
        Some(value) => Ok(value),
        None => Ok(0),
    }
}

/// Build an `ORDER BY` clause from a whitelisted column name and direction.
/// The column is matched against `allowed` so user input never reaches SQL.
pub fn order_clause(
    allowed: &[&'static str],
    order_by: Option<&str>,
    order_in: Option<i32>,
) -> ApiResult<String> {
    let column = match order_by {
        Some(requested) => *allowed
            .iter()
            .find(|candidate| **candidate == requested)
            .ok_or(ApiError::InvalidValue("order_by"))?,
        None => "id",
    };
    let direction = match order_in {
        Some(value) => OrderIn::try_from(value)?,
        None => OrderIn::Desc,
    };
    Ok(format!(" ORDER BY {}{}", column, direction.sql()))
}

/// Parse a comma-separated `id_list` query value into ids.
pub fn parse_id_list(raw: &str) -> ApiResult<Vec<i32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i32>()
                .map_err(|_| ApiError::InvalidValue("id_list"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_clamps_into_range() {
        assert_eq!(clamp_limit(None), 20);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(1000)), 100);
        assert_eq!(clamp_limit(Some(55)), 55);
    }

    #[test]
    fn negative_offsets_are_rejected() {
        assert!(clamp_offset(Some(-1)).is_err());
        assert_eq!(clamp_offset(None).unwrap(), 0);
        assert_eq!(clamp_offset(Some(40)).unwrap(), 40);
    }

    #[test]
    fn order_clause_whitelists_columns() {
        let allowed = &["id", "name", "created_on"];
        assert_eq!(
            order_clause(allowed, Some("name"), Some(1)).unwrap(),
            " ORDER BY name ASC"
        );
        assert_eq!(
            order_clause(allowed, None, None).unwrap(),
            " ORDER BY id DESC"
        );
        assert!(order_clause(allowed, Some("password"), None).is_err());
        assert!(order_clause(allowed, Some("name"), Some(7)).is_err());
    }

    #[test]
    fn id_list_parses_csv() {
        assert_eq!(parse_id_list("1,2, 3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_id_list("7").unwrap(), vec![7]);
        assert!(parse_id_list("1,x").is_err());
    }
}
