//! Landmark CRUD. Boundaries are SRID-4326 axis-aligned WKT polygons with
//! a geodesic area inside fixed limits; updates bump a version counter and
//! must keep every contained bus stop inside the new boundary.

use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::{Postgres, QueryBuilder};

use crate::errors::{ApiError, ApiResult};
use crate::handlers::search::{clamp_limit, clamp_offset, order_clause, parse_id_list};
use crate::models::enums::{LandmarkType, OrderIn};
use crate::models::landmark::{Landmark, LANDMARK_COLUMNS};
use crate::services::auth::{self, Bearer};
use crate::services::geometry;
use crate::services::telemetry::RequestInfo;
use crate::state::AppState;
use crate::urls;

#[derive(Debug, Deserialize)]
pub struct CreateLandmarkForm {
    pub name: String,
    pub boundary: String,
    #[serde(rename = "type")]
    pub kind: Option<i32>,
}

/// `POST /landmark`
pub async fn create_landmark(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Form(form): Form<CreateLandmarkForm>,
) -> ApiResult<impl IntoResponse> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.create_landmark)?;

    if form.name.is_empty() || form.name.len() > 32 {
        return Err(ApiError::InvalidValue("name"));
    }
    let (_, boundary_wkt) = geometry::validate_boundary(&form.boundary)?;
    let kind = match form.kind {
        Some(value) => LandmarkType::try_from(value)?.as_i32(),
        None => LandmarkType::Local.as_i32(),
    };

    let lock = state.locks.acquire("landmark").await?;
    let query = format!(
        "INSERT INTO landmark (name, boundary, type) \
         VALUES ($1, ST_GeomFromText($2, 4326), $3) RETURNING {LANDMARK_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, Landmark>(&query)
        .bind(&form.name)
        .bind(&boundary_wkt)
        .bind(kind)
        .fetch_one(&state.db)
        .await;
    state.locks.release(lock).await;
    let landmark = inserted?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("POST", urls::LANDMARK),
        json!({ "event": "landmark_created", "landmark_id": landmark.id }),
    );
    Ok((StatusCode::CREATED, Json(landmark)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateLandmarkForm {
    pub id: i32,
    pub name: Option<String>,
    pub boundary: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<i32>,
}

/// `PATCH /landmark`
///
/// The version only moves when a field actually changed. A shrinking
/// boundary is rejected while any bus stop would fall outside it.
pub async fn update_landmark(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Form(form): Form<UpdateLandmarkForm>,
) -> ApiResult<Json<Landmark>> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.update_landmark)?;

    let lock = state.locks.acquire_row("landmark", form.id).await?;
    let result = apply_landmark_update(&state, &form).await;
    state.locks.release(lock).await;
    let landmark = result?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("PATCH", urls::LANDMARK),
        json!({ "event": "landmark_updated", "landmark_id": landmark.id, "version": landmark.version }),
    );
    Ok(Json(landmark))
}

async fn apply_landmark_update(state: &AppState, form: &UpdateLandmarkForm) -> ApiResult<Landmark> {
    let query = format!("SELECT {LANDMARK_COLUMNS} FROM landmark WHERE id = $1");
    let current = sqlx::query_as::<_, Landmark>(&query)
        .bind(form.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::InvalidIdentifier)?;

    let new_name = match form.name.as_deref() {
        Some(name) if name != current.name => {
            if name.is_empty() || name.len() > 32 {
                return Err(ApiError::InvalidValue("name"));
            }
            Some(name.to_string())
        }
        _ => None,
    };
    let new_kind = match form.kind {
        Some(value) => {
            let kind = LandmarkType::try_from(value)?.as_i32();
            (kind != current.kind).then_some(kind)
        }
        None => None,
    };
    let new_boundary = match form.boundary.as_deref() {
        Some(wkt) => {
            let (_, normalized) = geometry::validate_boundary(wkt)?;
            if normalized == current.boundary {
                None
            } else {
                let strays = sqlx::query_scalar::<_, i64>(
                    "SELECT count(*) FROM bus_stop \
                     WHERE landmark_id = $1 \
                     AND NOT ST_Within(location, ST_GeomFromText($2, 4326))",
                )
                .bind(form.id)
                .bind(&normalized)
                .fetch_one(&state.db)
                .await?;
                if strays > 0 {
                    return Err(ApiError::BusStopOutsideLandmark);
                }
                Some(normalized)
            }
        }
        None => None,
    };

    if new_name.is_none() && new_kind.is_none() && new_boundary.is_none() {
        return Ok(current);
    }

    let mut qb = QueryBuilder::<Postgres>::new(
        "UPDATE landmark SET updated_on = now(), version = version + 1",
    );
    if let Some(name) = new_name {
        qb.push(", name = ").push_bind(name);
    }
    if let Some(kind) = new_kind {
        qb.push(", type = ").push_bind(kind);
    }
    if let Some(boundary) = new_boundary {
        qb.push(", boundary = ST_GeomFromText(")
            .push_bind(boundary)
            .push(", 4326)");
    }
    qb.push(" WHERE id = ").push_bind(form.id);
    qb.push(format!(" RETURNING {LANDMARK_COLUMNS}"));

    let landmark = qb.build_query_as::<Landmark>().fetch_one(&state.db).await?;
    Ok(landmark)
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub id: i32,
}

/// `DELETE /landmark` — cascades to contained bus stops.
pub async fn delete_landmark(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<DeleteParams>,
) -> ApiResult<StatusCode> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.delete_landmark)?;

    let lock = state.locks.acquire_row("landmark", params.id).await?;
    let deleted = sqlx::query("DELETE FROM landmark WHERE id = $1")
        .bind(params.id)
        .execute(&state.db)
        .await;
    state.locks.release(lock).await;
    if deleted?.rows_affected() == 0 {
        return Err(ApiError::InvalidIdentifier);
    }

    state.events.log(
        token.executive_id,
        &RequestInfo::new("DELETE", urls::LANDMARK),
        json!({ "event": "landmark_deleted", "landmark_id": params.id }),
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct LandmarkSearch {
    pub id: Option<i32>,
    pub id_ge: Option<i32>,
    pub id_le: Option<i32>,
    pub id_list: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<i32>,
    pub created_ge: Option<DateTime<Utc>>,
    pub created_le: Option<DateTime<Utc>>,
    pub updated_ge: Option<DateTime<Utc>>,
    pub updated_le: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub order_by: Option<String>,
    pub order_in: Option<i32>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// Resolve the `order_by=distance` parameters: a WKT point to measure from
/// and a direction, nearest first unless asked otherwise.
fn distance_order(location: Option<&str>, order_in: Option<i32>) -> ApiResult<(String, &'static str)> {
    let wkt_str = location.ok_or(ApiError::InvalidValue("location"))?;
    let (_, normalized) = geometry::validate_point(wkt_str)?;
    let direction = match order_in {
        Some(value) => OrderIn::try_from(value)?,
        None => OrderIn::Asc,
    };
    Ok((normalized, direction.sql()))
}

/// `GET /landmark`
pub async fn list_landmarks(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<LandmarkSearch>,
) -> ApiResult<Json<Vec<Landmark>>> {
    auth::validate_token(&state.db, &bearer).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {LANDMARK_COLUMNS} FROM landmark WHERE 1=1"
    ));
    if let Some(id) = params.id {
        qb.push(" AND id = ").push_bind(id);
    }
    if let Some(id_ge) = params.id_ge {
        qb.push(" AND id >= ").push_bind(id_ge);
    }
    if let Some(id_le) = params.id_le {
        qb.push(" AND id <= ").push_bind(id_le);
    }
    if let Some(raw) = params.id_list.as_deref() {
        qb.push(" AND id = ANY(").push_bind(parse_id_list(raw)?).push(")");
    }
    if let Some(name) = params.name.as_deref() {
        qb.push(" AND name ILIKE ").push_bind(format!("%{}%", name));
    }
    if let Some(kind) = params.kind {
        qb.push(" AND type = ").push_bind(kind);
    }
    if let Some(created_ge) = params.created_ge {
        qb.push(" AND created_on >= ").push_bind(created_ge);
    }
    if let Some(created_le) = params.created_le {
        qb.push(" AND created_on <= ").push_bind(created_le);
    }
    if let Some(updated_ge) = params.updated_ge {
        qb.push(" AND updated_on >= ").push_bind(updated_ge);
    }
    if let Some(updated_le) = params.updated_le {
        qb.push(" AND updated_on <= ").push_bind(updated_le);
    }
    if params.order_by.as_deref() == Some("distance") {
        let (point_wkt, direction) = distance_order(params.location.as_deref(), params.order_in)?;
        qb.push(" ORDER BY ST_Distance(boundary, ST_GeomFromText(")
            .push_bind(point_wkt)
            .push(", 4326))")
            .push(direction);
    } else {
        qb.push(order_clause(
            &["id", "name", "version", "created_on", "updated_on"],
            params.order_by.as_deref(),
            params.order_in,
        )?);
    }
    qb.push(" LIMIT ").push_bind(clamp_limit(params.limit));
    qb.push(" OFFSET ").push_bind(clamp_offset(params.offset)?);

    let landmarks = qb.build_query_as::<Landmark>().fetch_all(&state.db).await?;
    Ok(Json(landmarks))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_ordering_needs_a_valid_location_point() {
        assert!(distance_order(None, None).is_err());
        assert!(distance_order(Some("POLYGON((76 9,77 9,77 10,76 10,76 9))"), None).is_err());
        assert!(distance_order(Some("POINT(76.3 9.9)"), Some(7)).is_err());
    }

    #[test]
    fn distance_ordering_defaults_to_nearest_first() {
        let (wkt, direction) = distance_order(Some("POINT(76.3 9.9)"), None).unwrap();
        assert_eq!(wkt, "POINT(76.3 9.9)");
        assert_eq!(direction, " ASC");

        let (_, direction) = distance_order(Some("POINT(76.3 9.9)"), Some(2)).unwrap();
        assert_eq!(direction, " DESC");
    }
}
