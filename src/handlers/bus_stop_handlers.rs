//! Bus stop CRUD. A stop is an SRID-4326 point that must lie within its
//! landmark's boundary.

use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::errors::{ApiError, ApiResult};
use crate::handlers::search::{clamp_limit, clamp_offset, order_clause, parse_id_list};
use crate::models::landmark::{BusStop, Landmark, BUS_STOP_COLUMNS, LANDMARK_COLUMNS};
use crate::services::auth::{self, Bearer};
use crate::services::geometry;
use crate::services::telemetry::RequestInfo;
use crate::state::AppState;
use crate::urls;

async fn landmark_or_unknown(db: &PgPool, landmark_id: i32) -> ApiResult<Landmark> {
    let query = format!("SELECT {LANDMARK_COLUMNS} FROM landmark WHERE id = $1");
    sqlx::query_as::<_, Landmark>(&query)
        .bind(landmark_id)
        .fetch_optional(db)
        .await?
        .ok_or(ApiError::UnknownValue("landmark_id"))
}

/// Validate a stop location against its landmark boundary.
fn location_within(landmark: &Landmark, location_wkt: &str) -> ApiResult<String> {
    let (point, normalized) = geometry::validate_point(location_wkt)?;
    let boundary = geometry::parse_polygon(&landmark.boundary)?;
    if !geometry::point_within(&boundary, &point) {
        return Err(ApiError::BusStopOutsideLandmark);
    }
    Ok(normalized)
}

#[derive(Debug, Deserialize)]
pub struct CreateBusStopForm {
    pub name: Option<String>,
    pub landmark_id: i32,
    pub location: String,
}

/// `POST /landmark/bus_stop` — the name defaults to the landmark's name.
pub async fn create_bus_stop(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Form(form): Form<CreateBusStopForm>,
) -> ApiResult<impl IntoResponse> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.create_bus_stop)?;

    let landmark = landmark_or_unknown(&state.db, form.landmark_id).await?;
    let location = location_within(&landmark, &form.location)?;
    let name = form.name.clone().unwrap_or_else(|| landmark.name.clone());
    if name.is_empty() || name.len() > 32 {
        return Err(ApiError::InvalidValue("name"));
    }

    let lock = state.locks.acquire("bus_stop").await?;
    let query = format!(
        "INSERT INTO bus_stop (name, landmark_id, location) \
         VALUES ($1, $2, ST_GeomFromText($3, 4326)) RETURNING {BUS_STOP_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, BusStop>(&query)
        .bind(&name)
        .bind(form.landmark_id)
        .bind(&location)
        .fetch_one(&state.db)
        .await;
    state.locks.release(lock).await;
    let stop = inserted?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("POST", urls::BUS_STOP),
        json!({ "event": "bus_stop_created", "bus_stop_id": stop.id }),
    );
    Ok((StatusCode::CREATED, Json(stop)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBusStopForm {
    pub id: i32,
    pub name: Option<String>,
    pub landmark_id: Option<i32>,
    pub location: Option<String>,
}

/// `PATCH /landmark/bus_stop`
///
/// Moving the stop or re-homing it to another landmark re-checks the
/// containment rule against the target boundary.
pub async fn update_bus_stop(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Form(form): Form<UpdateBusStopForm>,
) -> ApiResult<Json<BusStop>> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.update_bus_stop)?;

    let lock = state.locks.acquire_row("bus_stop", form.id).await?;
    let result = apply_bus_stop_update(&state, &form).await;
    state.locks.release(lock).await;
    let stop = result?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("PATCH", urls::BUS_STOP),
        json!({ "event": "bus_stop_updated", "bus_stop_id": stop.id }),
    );
    Ok(Json(stop))
}

async fn apply_bus_stop_update(state: &AppState, form: &UpdateBusStopForm) -> ApiResult<BusStop> {
    let query = format!("SELECT {BUS_STOP_COLUMNS} FROM bus_stop WHERE id = $1");
    let current = sqlx::query_as::<_, BusStop>(&query)
        .bind(form.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::InvalidIdentifier)?;

    let target_landmark_id = form.landmark_id.unwrap_or(current.landmark_id);
    let landmark = landmark_or_unknown(&state.db, target_landmark_id).await?;
    let location_wkt = form.location.as_deref().unwrap_or(&current.location);
    let location = location_within(&landmark, location_wkt)?;

    if let Some(name) = form.name.as_deref() {
        if name.is_empty() || name.len() > 32 {
            return Err(ApiError::InvalidValue("name"));
        }
    }

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE bus_stop SET updated_on = now()");
    if let Some(name) = form.name.as_deref() {
        qb.push(", name = ").push_bind(name.to_string());
    }
    qb.push(", landmark_id = ").push_bind(target_landmark_id);
    qb.push(", location = ST_GeomFromText(")
        .push_bind(location)
        .push(", 4326)");
    qb.push(" WHERE id = ").push_bind(form.id);
    qb.push(format!(" RETURNING {BUS_STOP_COLUMNS}"));

    let stop = qb.build_query_as::<BusStop>().fetch_one(&state.db).await?;
    Ok(stop)
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub id: i32,
}

/// `DELETE /landmark/bus_stop`
pub async fn delete_bus_stop(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<DeleteParams>,
) -> ApiResult<StatusCode> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.delete_bus_stop)?;

    let lock = state.locks.acquire_row("bus_stop", params.id).await?;
    let deleted = sqlx::query("DELETE FROM bus_stop WHERE id = $1")
        .bind(params.id)
        .execute(&state.db)
        .await;
    state.locks.release(lock).await;
    if deleted?.rows_affected() == 0 {
        return Err(ApiError::InvalidIdentifier);
    }

    state.events.log(
        token.executive_id,
        &RequestInfo::new("DELETE", urls::BUS_STOP),
        json!({ "event": "bus_stop_deleted", "bus_stop_id": params.id }),
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct BusStopSearch {
    pub id: Option<i32>,
    pub id_ge: Option<i32>,
    pub id_le: Option<i32>,
    pub id_list: Option<String>,
    pub name: Option<String>,
    pub landmark_id: Option<i32>,
    pub created_ge: Option<DateTime<Utc>>,
    pub created_le: Option<DateTime<Utc>>,
    pub updated_ge: Option<DateTime<Utc>>,
    pub updated_le: Option<DateTime<Utc>>,
    pub order_by: Option<String>,
    pub order_in: Option<i32>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// `GET /landmark/bus_stop`
pub async fn list_bus_stops(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<BusStopSearch>,
) -> ApiResult<Json<Vec<BusStop>>> {
    auth::validate_token(&state.db, &bearer).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {BUS_STOP_COLUMNS} FROM bus_stop WHERE 1=1"
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
    if let Some(landmark_id) = params.landmark_id {
        qb.push(" AND landmark_id = ").push_bind(landmark_id);
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
    qb.push(order_clause(
        &["id", "name", "landmark_id", "created_on", "updated_on"],
        params.order_by.as_deref(),
        params.order_in,
    )?);
    qb.push(" LIMIT ").push_bind(clamp_limit(params.limit));
    qb.push(" OFFSET ").push_bind(clamp_offset(params.offset)?);

    let stops = qb.build_query_as::<BusStop>().fetch_all(&state.db).await?;
    Ok(Json(stops))
}
