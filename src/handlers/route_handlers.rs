//! Routes and their ordered landmark membership.
//!
//! A route's landmark sequence is replaced wholesale and validated as a
//! unit: at least two landmarks, the first at distance 0 with zero deltas,
//! strictly increasing distances and time deltas, and the final landmark
//! arriving and departing at the same instant (the terminus).

use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::constants::MIN_LANDMARK_IN_ROUTE;
use crate::errors::{ApiError, ApiResult};
use crate::handlers::search::{clamp_limit, clamp_offset, order_clause, parse_id_list};
use crate::models::route::{
    LandmarkInRoute, Route, LANDMARK_IN_ROUTE_COLUMNS, ROUTE_COLUMNS,
};
use crate::services::auth::{self, Bearer};
use crate::services::telemetry::RequestInfo;
use crate::state::AppState;
use crate::urls;

fn parse_start_time(raw: &str) -> ApiResult<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| ApiError::InvalidValue("start_time"))
}

async fn route_or_unknown(db: &PgPool, route_id: i32) -> ApiResult<Route> {
    let query = format!("SELECT {ROUTE_COLUMNS} FROM route WHERE id = $1");
    sqlx::query_as::<_, Route>(&query)
        .bind(route_id)
        .fetch_optional(db)
        .await?
        .ok_or(ApiError::UnknownValue("route_id"))
}

#[derive(Debug, Deserialize)]
pub struct CreateRouteForm {
    pub company_id: i32,
    pub name: String,
    /// `HH:MM:SS` or `HH:MM`, UTC wall clock.
    pub start_time: String,
}

/// `POST /company/route`
pub async fn create_route(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Form(form): Form<CreateRouteForm>,
) -> ApiResult<impl IntoResponse> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.create_route)?;

    if form.name.is_empty() || form.name.len() > 32 {
        return Err(ApiError::InvalidValue("name"));
    }
    let start_time = parse_start_time(&form.start_time)?;
    let exists = sqlx::query_scalar::<_, i32>("SELECT id FROM company WHERE id = $1")
        .bind(form.company_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::UnknownValue("company_id"));
    }

    let lock = state.locks.acquire("route").await?;
    let query = format!(
        "INSERT INTO route (company_id, name, start_time) \
         VALUES ($1, $2, $3) RETURNING {ROUTE_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, Route>(&query)
        .bind(form.company_id)
        .bind(&form.name)
        .bind(start_time)
        .fetch_one(&state.db)
        .await;
    state.locks.release(lock).await;
    let route = inserted?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("POST", urls::ROUTE),
        json!({ "event": "route_created", "route_id": route.id }),
    );
    Ok((StatusCode::CREATED, Json(route)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRouteForm {
    pub id: i32,
    pub name: Option<String>,
    pub start_time: Option<String>,
}

/// `PATCH /company/route`
pub async fn update_route(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Form(form): Form<UpdateRouteForm>,
) -> ApiResult<Json<Route>> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.update_route)?;

    let lock = state.locks.acquire_row("route", form.id).await?;
    let result = apply_route_update(&state, &form).await;
    state.locks.release(lock).await;
    let route = result?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("PATCH", urls::ROUTE),
        json!({ "event": "route_updated", "route_id": route.id }),
    );
    Ok(Json(route))
}

async fn apply_route_update(state: &AppState, form: &UpdateRouteForm) -> ApiResult<Route> {
    route_or_unknown(&state.db, form.id)
        .await
        .map_err(|err| match err {
            ApiError::UnknownValue(_) => ApiError::InvalidIdentifier,
            other => other,
        })?;

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE route SET updated_on = now()");
    if let Some(name) = form.name.as_deref() {
        if name.is_empty() || name.len() > 32 {
            return Err(ApiError::InvalidValue("name"));
        }
        qb.push(", name = ").push_bind(name.to_string());
    }
    if let Some(raw) = form.start_time.as_deref() {
        qb.push(", start_time = ").push_bind(parse_start_time(raw)?);
    }
    qb.push(" WHERE id = ").push_bind(form.id);
    qb.push(format!(" RETURNING {ROUTE_COLUMNS}"));

    let route = qb.build_query_as::<Route>().fetch_one(&state.db).await?;
    Ok(route)
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub id: i32,
}

/// `DELETE /company/route` — cascades to the landmark sequence.
pub async fn delete_route(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<DeleteParams>,
) -> ApiResult<StatusCode> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.delete_route)?;

    let lock = state.locks.acquire_row("route", params.id).await?;
    let deleted = sqlx::query("DELETE FROM route WHERE id = $1")
        .bind(params.id)
        .execute(&state.db)
        .await;
    state.locks.release(lock).await;
    if deleted?.rows_affected() == 0 {
        return Err(ApiError::InvalidIdentifier);
    }

    state.events.log(
        token.executive_id,
        &RequestInfo::new("DELETE", urls::ROUTE),
        json!({ "event": "route_deleted", "route_id": params.id }),
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct RouteSearch {
    pub id: Option<i32>,
    pub id_ge: Option<i32>,
    pub id_le: Option<i32>,
    pub id_list: Option<String>,
    pub company_id: Option<i32>,
    pub name: Option<String>,
    pub created_ge: Option<DateTime<Utc>>,
    pub created_le: Option<DateTime<Utc>>,
    pub updated_ge: Option<DateTime<Utc>>,
    pub updated_le: Option<DateTime<Utc>>,
    pub order_by: Option<String>,
    pub order_in: Option<i32>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// `GET /company/route`
pub async fn list_routes(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<RouteSearch>,
) -> ApiResult<Json<Vec<Route>>> {
    auth::validate_token(&state.db, &bearer).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {ROUTE_COLUMNS} FROM route WHERE 1=1"
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
    if let Some(company_id) = params.company_id {
        qb.push(" AND company_id = ").push_bind(company_id);
    }
    if let Some(name) = params.name.as_deref() {
        qb.push(" AND name ILIKE ").push_bind(format!("%{}%", name));
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
        &["id", "company_id", "name", "created_on", "updated_on"],
        params.order_by.as_deref(),
        params.order_in,
    )?);
    qb.push(" LIMIT ").push_bind(clamp_limit(params.limit));
    qb.push(" OFFSET ").push_bind(clamp_offset(params.offset)?);

    let routes = qb.build_query_as::<Route>().fetch_all(&state.db).await?;
    Ok(Json(routes))
}

// ---------------------------------------------------------------------------
// Landmark-in-route sequence

#[derive(Debug, Clone, Deserialize)]
pub struct SequenceEntry {
    pub landmark_id: i32,
    /// Meters from the route origin.
    pub distance_from_start: i32,
    /// Seconds after the route start time.
    pub arrival_delta: i32,
    pub departure_delta: i32,
}

fn validate_sequence(entries: &[SequenceEntry]) -> ApiResult<()> {
    if entries.len() < MIN_LANDMARK_IN_ROUTE {
        return Err(ApiError::InvalidRoute);
    }
    let first = &entries[0];
    if first.distance_from_start != 0 || first.arrival_delta != 0 || first.departure_delta != 0 {
        return Err(ApiError::InvalidRoute);
    }
    for entry in entries {
        if entry.distance_from_start < 0
            || entry.arrival_delta < 0
            || entry.arrival_delta > entry.departure_delta
        {
            return Err(ApiError::InvalidRoute);
        }
    }
    for pair in entries.windows(2) {
        if pair[1].distance_from_start <= pair[0].distance_from_start
            || pair[1].arrival_delta <= pair[0].departure_delta
            || pair[1].landmark_id == pair[0].landmark_id
        {
            return Err(ApiError::InvalidRoute);
        }
    }
    let last = &entries[entries.len() - 1];
    if last.arrival_delta != last.departure_delta {
        return Err(ApiError::InvalidRoute);
    }
    let mut seen: Vec<i32> = entries.iter().map(|e| e.landmark_id).collect();
    seen.sort_unstable();
    seen.dedup();
    if seen.len() != entries.len() {
        return Err(ApiError::InvalidRoute);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ReplaceSequenceBody {
    pub route_id: i32,
    pub landmarks: Vec<SequenceEntry>,
}

/// `POST /company/route/landmark` — replace a route's landmark sequence.
pub async fn replace_sequence(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Json(body): Json<ReplaceSequenceBody>,
) -> ApiResult<impl IntoResponse> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.create_route || r.update_route)?;

    let route = route_or_unknown(&state.db, body.route_id).await?;
    validate_sequence(&body.landmarks)?;
    for entry in &body.landmarks {
        let exists = sqlx::query_scalar::<_, i32>("SELECT id FROM landmark WHERE id = $1")
            .bind(entry.landmark_id)
            .fetch_optional(&state.db)
            .await?;
        if exists.is_none() {
            return Err(ApiError::UnknownValue("landmark_id"));
        }
    }

    let lock = state.locks.acquire_row("route", route.id).await?;
    let result = write_sequence(&state.db, &route, &body.landmarks).await;
    state.locks.release(lock).await;
    let entries = result?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("POST", urls::LANDMARK_IN_ROUTE),
        json!({ "event": "route_sequence_replaced", "route_id": route.id, "landmarks": entries.len() }),
    );
    Ok((StatusCode::CREATED, Json(entries)))
}

async fn write_sequence(
    db: &PgPool,
    route: &Route,
    entries: &[SequenceEntry],
) -> ApiResult<Vec<LandmarkInRoute>> {
    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM landmark_in_route WHERE route_id = $1")
        .bind(route.id)
        .execute(&mut *tx)
        .await?;
    let query = format!(
        "INSERT INTO landmark_in_route \
         (company_id, route_id, landmark_id, distance_from_start, arrival_delta, departure_delta) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {LANDMARK_IN_ROUTE_COLUMNS}"
    );
    let mut rows = Vec::with_capacity(entries.len());
    for entry in entries {
        let row = sqlx::query_as::<_, LandmarkInRoute>(&query)
            .bind(route.company_id)
            .bind(route.id)
            .bind(entry.landmark_id)
            .bind(entry.distance_from_start)
            .bind(entry.arrival_delta)
            .bind(entry.departure_delta)
            .fetch_one(&mut *tx)
            .await?;
        rows.push(row);
    }
    tx.commit().await?;
    Ok(rows)
}

#[derive(Debug, Deserialize)]
pub struct UpdateSequenceEntryForm {
    pub id: i32,
    pub distance_from_start: Option<i32>,
    pub arrival_delta: Option<i32>,
    pub departure_delta: Option<i32>,
}

/// `PATCH /company/route/landmark` — adjust one entry, re-validating the
/// whole sequence afterwards.
pub async fn update_sequence_entry(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Form(form): Form<UpdateSequenceEntryForm>,
) -> ApiResult<Json<LandmarkInRoute>> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.update_route)?;

    let query = format!(
        "SELECT {LANDMARK_IN_ROUTE_COLUMNS} FROM landmark_in_route WHERE id = $1"
    );
    let current = sqlx::query_as::<_, LandmarkInRoute>(&query)
        .bind(form.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::InvalidIdentifier)?;

    let lock = state.locks.acquire_row("route", current.route_id).await?;
    let result = apply_sequence_entry_update(&state.db, &current, &form).await;
    state.locks.release(lock).await;
    let entry = result?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("PATCH", urls::LANDMARK_IN_ROUTE),
        json!({ "event": "route_sequence_entry_updated", "entry_id": entry.id }),
    );
    Ok(Json(entry))
}

async fn apply_sequence_entry_update(
    db: &PgPool,
    current: &LandmarkInRoute,
    form: &UpdateSequenceEntryForm,
) -> ApiResult<LandmarkInRoute> {
    let query = format!(
        "SELECT {LANDMARK_IN_ROUTE_COLUMNS} FROM landmark_in_route \
         WHERE route_id = $1 ORDER BY distance_from_start"
    );
    let rows = sqlx::query_as::<_, LandmarkInRoute>(&query)
        .bind(current.route_id)
        .fetch_all(db)
        .await?;

    let mut candidate: Vec<SequenceEntry> = rows
        .iter()
        .map(|row| SequenceEntry {
            landmark_id: row.landmark_id,
            distance_from_start: row.distance_from_start,
            arrival_delta: row.arrival_delta,
            departure_delta: row.departure_delta,
        })
        .collect();
    let position = rows
        .iter()
        .position(|row| row.id == current.id)
        .ok_or(ApiError::InvalidIdentifier)?;
    if let Some(distance) = form.distance_from_start {
        candidate[position].distance_from_start = distance;
    }
    if let Some(arrival) = form.arrival_delta {
        candidate[position].arrival_delta = arrival;
    }
    if let Some(departure) = form.departure_delta {
        candidate[position].departure_delta = departure;
    }
    candidate.sort_by_key(|entry| entry.distance_from_start);
    validate_sequence(&candidate)?;

    let query = format!(
        "UPDATE landmark_in_route \
         SET distance_from_start = $1, arrival_delta = $2, departure_delta = $3, updated_on = now() \
         WHERE id = $4 RETURNING {LANDMARK_IN_ROUTE_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, LandmarkInRoute>(&query)
        .bind(form.distance_from_start.unwrap_or(current.distance_from_start))
        .bind(form.arrival_delta.unwrap_or(current.arrival_delta))
        .bind(form.departure_delta.unwrap_or(current.departure_delta))
        .bind(current.id)
        .fetch_one(db)
        .await?;
    Ok(updated)
}

#[derive(Debug, Deserialize)]
pub struct ClearSequenceParams {
    pub route_id: i32,
}

/// `DELETE /company/route/landmark` — clear a route's landmark sequence.
pub async fn clear_sequence(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<ClearSequenceParams>,
) -> ApiResult<StatusCode> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.update_route || r.delete_route)?;

    route_or_unknown(&state.db, params.route_id).await?;

    let lock = state.locks.acquire_row("route", params.route_id).await?;
    let deleted = sqlx::query("DELETE FROM landmark_in_route WHERE route_id = $1")
        .bind(params.route_id)
        .execute(&state.db)
        .await;
    state.locks.release(lock).await;
    deleted?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("DELETE", urls::LANDMARK_IN_ROUTE),
        json!({ "event": "route_sequence_cleared", "route_id": params.route_id }),
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SequenceSearch {
    pub id: Option<i32>,
    pub id_ge: Option<i32>,
    pub id_le: Option<i32>,
    pub id_list: Option<String>,
    pub route_id: Option<i32>,
    pub company_id: Option<i32>,
    pub landmark_id: Option<i32>,
    pub order_by: Option<String>,
    pub order_in: Option<i32>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// `GET /company/route/landmark`
pub async fn list_sequence(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<SequenceSearch>,
) -> ApiResult<Json<Vec<LandmarkInRoute>>> {
    auth::validate_token(&state.db, &bearer).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {LANDMARK_IN_ROUTE_COLUMNS} FROM landmark_in_route WHERE 1=1"
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
    if let Some(route_id) = params.route_id {
        qb.push(" AND route_id = ").push_bind(route_id);
    }
    if let Some(company_id) = params.company_id {
        qb.push(" AND company_id = ").push_bind(company_id);
    }
    if let Some(landmark_id) = params.landmark_id {
        qb.push(" AND landmark_id = ").push_bind(landmark_id);
    }
    qb.push(order_clause(
        &["id", "route_id", "distance_from_start", "created_on"],
        params.order_by.as_deref(),
        params.order_in,
    )?);
    qb.push(" LIMIT ").push_bind(clamp_limit(params.limit));
    qb.push(" OFFSET ").push_bind(clamp_offset(params.offset)?);

    let entries = qb
        .build_query_as::<LandmarkInRoute>()
        .fetch_all(&state.db)
        .await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(landmark_id: i32, distance: i32, arrival: i32, departure: i32) -> SequenceEntry {
        SequenceEntry {
            landmark_id,
            distance_from_start: distance,
            arrival_delta: arrival,
            departure_delta: departure,
        }
    }

    #[test]
    fn valid_sequences_pass() {
        let seq = vec![
            entry(1, 0, 0, 0),
            entry(2, 1200, 300, 360),
            entry(3, 5000, 900, 900),
        ];
        assert!(validate_sequence(&seq).is_ok());
    }

    #[test]
    fn two_entries_is_the_minimum() {
        assert!(validate_sequence(&[entry(1, 0, 0, 0)]).is_err());
        assert!(validate_sequence(&[entry(1, 0, 0, 0), entry(2, 100, 60, 60)]).is_ok());
    }

    #[test]
    fn sequence_must_start_at_the_origin() {
        let seq = vec![entry(1, 10, 0, 0), entry(2, 100, 60, 60)];
        assert!(validate_sequence(&seq).is_err());
        let seq = vec![entry(1, 0, 5, 5), entry(2, 100, 60, 60)];
        assert!(validate_sequence(&seq).is_err());
    }

    #[test]
    fn deltas_and_distances_must_increase() {
        // Arrival before the previous departure.
        let seq = vec![
            entry(1, 0, 0, 0),
            entry(2, 100, 60, 120),
            entry(3, 200, 90, 200),
        ];
        assert!(validate_sequence(&seq).is_err());
        // Distance going backwards.
        let seq = vec![
            entry(1, 0, 0, 0),
            entry(2, 300, 60, 120),
            entry(3, 200, 180, 180),
        ];
        assert!(validate_sequence(&seq).is_err());
    }

    #[test]
    fn terminus_arrives_and_departs_together() {
        let seq = vec![entry(1, 0, 0, 0), entry(2, 100, 60, 90)];
        assert!(validate_sequence(&seq).is_err());
    }

    #[test]
    fn repeated_landmarks_are_rejected() {
        let seq = vec![
            entry(1, 0, 0, 0),
            entry(2, 100, 60, 60),
        ];
        assert!(validate_sequence(&seq).is_ok());
        let seq = vec![
            entry(1, 0, 0, 0),
            entry(2, 100, 60, 90),
            entry(1, 200, 120, 120),
        ];
        assert!(validate_sequence(&seq).is_err());
    }

    #[test]
    fn start_time_parses_both_forms() {
        assert!(parse_start_time("06:30:00").is_ok());
        assert!(parse_start_time("06:30").is_ok());
        assert!(parse_start_time("6 am").is_err());
        assert!(parse_start_time("25:00:00").is_err());
    }
}
