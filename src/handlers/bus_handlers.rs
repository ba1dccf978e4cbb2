//! Fleet bus CRUD.

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
use crate::models::bus::{Bus, BUS_COLUMNS};
use crate::models::enums::BusStatus;
use crate::services::auth::{self, Bearer};
use crate::services::telemetry::RequestInfo;
use crate::state::AppState;
use crate::urls;

/// Indian plate shape: 2 letters, 2 digits, 0-2 letters, 1-4 digits.
/// e.g. `KL07AB1234`, `KA051`, `TN22C7`.
fn validate_registration_number(plate: &str) -> ApiResult<()> {
    let chars: Vec<char> = plate.chars().collect();
    let invalid = || ApiError::InvalidValue("registration_number");

    if chars.len() < 5 || chars.len() > 10 {
        return Err(invalid());
    }
    if !chars[..2].iter().all(|c| c.is_ascii_uppercase()) {
        return Err(invalid());
    }
    if !chars[2..4].iter().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let series_len = chars[4..]
        .iter()
        .take_while(|c| c.is_ascii_uppercase())
        .count();
    if series_len > 2 {
        return Err(invalid());
    }
    let digits = &chars[4 + series_len..];
    if digits.is_empty() || digits.len() > 4 || !digits.iter().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateBusForm {
    pub company_id: i32,
    pub registration_number: String,
    pub name: String,
    pub capacity: i32,
    /// RFC3339 timestamps.
    pub manufactured_on: DateTime<Utc>,
    pub insurance_upto: Option<DateTime<Utc>>,
    pub pollution_upto: Option<DateTime<Utc>>,
    pub fitness_upto: Option<DateTime<Utc>>,
    pub road_tax_upto: Option<DateTime<Utc>>,
    pub status: Option<i32>,
}

/// `POST /company/bus`
pub async fn create_bus(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Form(form): Form<CreateBusForm>,
) -> ApiResult<impl IntoResponse> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.create_bus)?;

    validate_registration_number(&form.registration_number)?;
    if form.name.is_empty() || form.name.len() > 32 {
        return Err(ApiError::InvalidValue("name"));
    }
    if form.capacity <= 0 {
        return Err(ApiError::InvalidValue("capacity"));
    }
    let status = match form.status {
        Some(value) => BusStatus::try_from(value)?.as_i32(),
        None => BusStatus::Active.as_i32(),
    };
    let exists = sqlx::query_scalar::<_, i32>("SELECT id FROM company WHERE id = $1")
        .bind(form.company_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::UnknownValue("company_id"));
    }

    let lock = state.locks.acquire("bus").await?;
    let query = format!(
        "INSERT INTO bus \
         (company_id, registration_number, name, capacity, manufactured_on, \
          insurance_upto, pollution_upto, fitness_upto, road_tax_upto, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {BUS_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, Bus>(&query)
        .bind(form.company_id)
        .bind(&form.registration_number)
        .bind(&form.name)
        .bind(form.capacity)
        .bind(form.manufactured_on)
        .bind(form.insurance_upto)
        .bind(form.pollution_upto)
        .bind(form.fitness_upto)
        .bind(form.road_tax_upto)
        .bind(status)
        .fetch_one(&state.db)
        .await;
    state.locks.release(lock).await;
    let bus = inserted?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("POST", urls::BUS),
        json!({ "event": "bus_created", "bus_id": bus.id }),
    );
    Ok((StatusCode::CREATED, Json(bus)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBusForm {
    pub id: i32,
    pub registration_number: Option<String>,
    pub name: Option<String>,
    pub capacity: Option<i32>,
    pub manufactured_on: Option<DateTime<Utc>>,
    pub insurance_upto: Option<DateTime<Utc>>,
    pub pollution_upto: Option<DateTime<Utc>>,
    pub fitness_upto: Option<DateTime<Utc>>,
    pub road_tax_upto: Option<DateTime<Utc>>,
    pub status: Option<i32>,
}

/// `PATCH /company/bus`
pub async fn update_bus(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Form(form): Form<UpdateBusForm>,
) -> ApiResult<Json<Bus>> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.update_bus)?;

    let lock = state.locks.acquire_row("bus", form.id).await?;
    let result = apply_bus_update(&state, &form).await;
    state.locks.release(lock).await;
    let bus = result?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("PATCH", urls::BUS),
        json!({ "event": "bus_updated", "bus_id": bus.id }),
    );
    Ok(Json(bus))
}

async fn apply_bus_update(state: &AppState, form: &UpdateBusForm) -> ApiResult<Bus> {
    let query = format!("SELECT {BUS_COLUMNS} FROM bus WHERE id = $1");
    sqlx::query_as::<_, Bus>(&query)
        .bind(form.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::InvalidIdentifier)?;

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE bus SET updated_on = now()");
    if let Some(plate) = form.registration_number.as_deref() {
        validate_registration_number(plate)?;
        qb.push(", registration_number = ").push_bind(plate.to_string());
    }
    if let Some(name) = form.name.as_deref() {
        if name.is_empty() || name.len() > 32 {
            return Err(ApiError::InvalidValue("name"));
        }
        qb.push(", name = ").push_bind(name.to_string());
    }
    if let Some(capacity) = form.capacity {
        if capacity <= 0 {
            return Err(ApiError::InvalidValue("capacity"));
        }
        qb.push(", capacity = ").push_bind(capacity);
    }
    if let Some(manufactured_on) = form.manufactured_on {
        qb.push(", manufactured_on = ").push_bind(manufactured_on);
    }
    if let Some(insurance_upto) = form.insurance_upto {
        qb.push(", insurance_upto = ").push_bind(insurance_upto);
    }
    if let Some(pollution_upto) = form.pollution_upto {
        qb.push(", pollution_upto = ").push_bind(pollution_upto);
    }
    if let Some(fitness_upto) = form.fitness_upto {
        qb.push(", fitness_upto = ").push_bind(fitness_upto);
    }
    if let Some(road_tax_upto) = form.road_tax_upto {
        qb.push(", road_tax_upto = ").push_bind(road_tax_upto);
    }
    if let Some(status) = form.status {
        qb.push(", status = ").push_bind(BusStatus::try_from(status)?.as_i32());
    }
    qb.push(" WHERE id = ").push_bind(form.id);
    qb.push(format!(" RETURNING {BUS_COLUMNS}"));

    let bus = qb.build_query_as::<Bus>().fetch_one(&state.db).await?;
    Ok(bus)
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub id: i32,
}

/// `DELETE /company/bus`
pub async fn delete_bus(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<DeleteParams>,
) -> ApiResult<StatusCode> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.delete_bus)?;

    let lock = state.locks.acquire_row("bus", params.id).await?;
    let deleted = sqlx::query("DELETE FROM bus WHERE id = $1")
        .bind(params.id)
        .execute(&state.db)
        .await;
    state.locks.release(lock).await;
    if deleted?.rows_affected() == 0 {
        return Err(ApiError::InvalidIdentifier);
    }

    state.events.log(
        token.executive_id,
        &RequestInfo::new("DELETE", urls::BUS),
        json!({ "event": "bus_deleted", "bus_id": params.id }),
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct BusSearch {
    pub id: Option<i32>,
    pub id_ge: Option<i32>,
    pub id_le: Option<i32>,
    pub id_list: Option<String>,
    pub company_id: Option<i32>,
    pub registration_number: Option<String>,
    pub name: Option<String>,
    pub status: Option<i32>,
    pub created_ge: Option<DateTime<Utc>>,
    pub created_le: Option<DateTime<Utc>>,
    pub updated_ge: Option<DateTime<Utc>>,
    pub updated_le: Option<DateTime<Utc>>,
    pub order_by: Option<String>,
    pub order_in: Option<i32>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// `GET /company/bus`
pub async fn list_buses(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<BusSearch>,
) -> ApiResult<Json<Vec<Bus>>> {
    auth::validate_token(&state.db, &bearer).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {BUS_COLUMNS} FROM bus WHERE 1=1"
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
    if let Some(plate) = params.registration_number.as_deref() {
        qb.push(" AND registration_number ILIKE ")
            .push_bind(format!("%{}%", plate));
    }
    if let Some(name) = params.name.as_deref() {
        qb.push(" AND name ILIKE ").push_bind(format!("%{}%", name));
    }
    if let Some(status) = params.status {
        qb.push(" AND status = ").push_bind(status);
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
        &["id", "company_id", "registration_number", "name", "created_on", "updated_on"],
        params.order_by.as_deref(),
        params.order_in,
    )?);
    qb.push(" LIMIT ").push_bind(clamp_limit(params.limit));
    qb.push(" OFFSET ").push_bind(clamp_offset(params.offset)?);

    let buses = qb.build_query_as::<Bus>().fetch_all(&state.db).await?;
    Ok(Json(buses))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plate_shapes_are_validated() {
        assert!(validate_registration_number("KL07AB1234").is_ok());
        assert!(validate_registration_number("KA051").is_ok());
        assert!(validate_registration_number("TN22C7").is_ok());
        assert!(validate_registration_number("KL07AB").is_err()); // no trailing digits
        assert!(validate_registration_number("K107AB1234").is_err()); // digit in state code
        assert!(validate_registration_number("KL07ABC123").is_err()); // 3-letter series
        assert!(validate_registration_number("kl07ab1234").is_err()); // lowercase
        assert!(validate_registration_number("KL07AB12345").is_err()); // 5 digits
    }
}
