//! Company CRUD.

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
use crate::models::company::{Company, COMPANY_COLUMNS};
use crate::models::enums::{CompanyStatus, CompanyType};
use crate::services::auth::{self, Bearer};
use crate::services::geometry;
use crate::services::telemetry::RequestInfo;
use crate::state::AppState;
use crate::urls;

fn validate_name(name: &str) -> ApiResult<()> {
    if name.is_empty() || name.len() > 32 {
        return Err(ApiError::InvalidValue("name"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateCompanyForm {
    pub name: String,
    pub address: String,
    pub contact_person: String,
    pub phone_number: String,
    pub email_id: String,
    pub location: String,
    pub status: Option<i32>,
    #[serde(rename = "type")]
    pub kind: Option<i32>,
}

/// `POST /company`
pub async fn create_company(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Form(form): Form<CreateCompanyForm>,
) -> ApiResult<impl IntoResponse> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.create_company)?;

    validate_name(&form.name)?;
    let (_, location) = geometry::validate_point(&form.location)?;
    let status = match form.status {
        Some(value) => CompanyStatus::try_from(value)?.as_i32(),
        None => CompanyStatus::UnderVerification.as_i32(),
    };
    let kind = match form.kind {
        Some(value) => CompanyType::try_from(value)?.as_i32(),
        None => CompanyType::Private.as_i32(),
    };

    let lock = state.locks.acquire("company").await?;
    let query = format!(
        "INSERT INTO company \
         (name, status, type, address, contact_person, phone_number, email_id, location) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, ST_GeomFromText($8, 4326)) \
         RETURNING {COMPANY_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, Company>(&query)
        .bind(&form.name)
        .bind(status)
        .bind(kind)
        .bind(&form.address)
        .bind(&form.contact_person)
        .bind(&form.phone_number)
        .bind(&form.email_id)
        .bind(&location)
        .fetch_one(&state.db)
        .await;
    state.locks.release(lock).await;
    let company = inserted?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("POST", urls::COMPANY),
        json!({ "event": "company_created", "company_id": company.id }),
    );
    Ok((StatusCode::CREATED, Json(company)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateCompanyForm {
    pub id: i32,
    pub name: Option<String>,
    pub address: Option<String>,
    pub contact_person: Option<String>,
    pub phone_number: Option<String>,
    pub email_id: Option<String>,
    pub location: Option<String>,
    pub status: Option<i32>,
    #[serde(rename = "type")]
    pub kind: Option<i32>,
}

/// `PATCH /company`
pub async fn update_company(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Form(form): Form<UpdateCompanyForm>,
) -> ApiResult<Json<Company>> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.update_company)?;

    let lock = state.locks.acquire_row("company", form.id).await?;
    let result = apply_company_update(&state, &form).await;
    state.locks.release(lock).await;
    let company = result?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("PATCH", urls::COMPANY),
        json!({ "event": "company_updated", "company_id": company.id }),
    );
    Ok(Json(company))
}

async fn apply_company_update(state: &AppState, form: &UpdateCompanyForm) -> ApiResult<Company> {
    let query = format!("SELECT {COMPANY_COLUMNS} FROM company WHERE id = $1");
    sqlx::query_as::<_, Company>(&query)
        .bind(form.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::InvalidIdentifier)?;

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE company SET updated_on = now()");
    if let Some(name) = form.name.as_deref() {
        validate_name(name)?;
        qb.push(", name = ").push_bind(name.to_string());
    }
    if let Some(address) = form.address.as_deref() {
        qb.push(", address = ").push_bind(address.to_string());
    }
    if let Some(contact_person) = form.contact_person.as_deref() {
        qb.push(", contact_person = ").push_bind(contact_person.to_string());
    }
    if let Some(phone_number) = form.phone_number.as_deref() {
        qb.push(", phone_number = ").push_bind(phone_number.to_string());
    }
    if let Some(email_id) = form.email_id.as_deref() {
        qb.push(", email_id = ").push_bind(email_id.to_string());
    }
    if let Some(location) = form.location.as_deref() {
        let (_, normalized) = geometry::validate_point(location)?;
        qb.push(", location = ST_GeomFromText(")
            .push_bind(normalized)
            .push(", 4326)");
    }
    if let Some(status) = form.status {
        qb.push(", status = ").push_bind(CompanyStatus::try_from(status)?.as_i32());
    }
    if let Some(kind) = form.kind {
        qb.push(", type = ").push_bind(CompanyType::try_from(kind)?.as_i32());
    }
    qb.push(" WHERE id = ").push_bind(form.id);
    qb.push(format!(" RETURNING {COMPANY_COLUMNS}"));

    let company = qb.build_query_as::<Company>().fetch_one(&state.db).await?;
    Ok(company)
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub id: i32,
}

/// `DELETE /company` — cascades to routes and buses.
pub async fn delete_company(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<DeleteParams>,
) -> ApiResult<StatusCode> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.delete_company)?;

    let lock = state.locks.acquire_row("company", params.id).await?;
    let deleted = sqlx::query("DELETE FROM company WHERE id = $1")
        .bind(params.id)
        .execute(&state.db)
        .await;
    state.locks.release(lock).await;
    if deleted?.rows_affected() == 0 {
        return Err(ApiError::InvalidIdentifier);
    }

    state.events.log(
        token.executive_id,
        &RequestInfo::new("DELETE", urls::COMPANY),
        json!({ "event": "company_deleted", "company_id": params.id }),
    );
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CompanySearch {
    pub id: Option<i32>,
    pub id_ge: Option<i32>,
    pub id_le: Option<i32>,
    pub id_list: Option<String>,
    pub name: Option<String>,
    pub status: Option<i32>,
    #[serde(rename = "type")]
    pub kind: Option<i32>,
    pub created_ge: Option<DateTime<Utc>>,
    pub created_le: Option<DateTime<Utc>>,
    pub updated_ge: Option<DateTime<Utc>>,
    pub updated_le: Option<DateTime<Utc>>,
    pub order_by: Option<String>,
    pub order_in: Option<i32>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// `GET /company`
pub async fn list_companies(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<CompanySearch>,
) -> ApiResult<Json<Vec<Company>>> {
    auth::validate_token(&state.db, &bearer).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {COMPANY_COLUMNS} FROM company WHERE 1=1"
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
    if let Some(status) = params.status {
        qb.push(" AND status = ").push_bind(status);
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
    qb.push(order_clause(
        &["id", "name", "status", "created_on", "updated_on"],
        params.order_by.as_deref(),
        params.order_in,
    )?);
    qb.push(" LIMIT ").push_bind(clamp_limit(params.limit));
    qb.push(" OFFSET ").push_bind(clamp_offset(params.offset)?);

    let companies = qb.build_query_as::<Company>().fetch_all(&state.db).await?;
    Ok(Json(companies))
}
