//! Executive account CRUD, guarded by role permissions.

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
use crate::models::enums::{AccountStatus, GenderType};
use crate::models::executive::{Executive, ExecutiveImage, EXECUTIVE_COLUMNS};
use crate::services::auth::{self, Bearer};
use crate::services::pictures::picture_key;
use crate::services::telemetry::RequestInfo;
use crate::state::AppState;
use crate::urls;

/// Username rule: 4-32 chars, leading letter, then letters, digits, `-.@_`.
fn validate_username(username: &str) -> ApiResult<()> {
    let mut chars = username.chars();
    let valid_first = chars.next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false);
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '@' | '_'));
    if !(4..=32).contains(&username.len()) || !valid_first || !valid_rest {
        return Err(ApiError::InvalidValue("username"));
    }
    Ok(())
}

/// Characters allowed in passwords besides letters and digits.
const PASSWORD_SPECIALS: &str = "-+,.@_$%&*#!^=/?";

/// Password rule: 8-32 chars, each a letter, digit, or one of
/// `PASSWORD_SPECIALS`.
fn validate_password(password: &str) -> ApiResult<()> {
    let valid_chars = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c));
    if !(8..=32).contains(&password.len()) || !valid_chars {
        return Err(ApiError::InvalidValue("password"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateExecutiveForm {
    pub username: String,
    pub password: String,
    pub gender: Option<i32>,
    pub full_name: Option<String>,
    pub designation: Option<String>,
    pub status: Option<i32>,
    pub phone_number: Option<String>,
    pub email_id: Option<String>,
}

/// `POST /entebus/account`
pub async fn create_executive(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Form(form): Form<CreateExecutiveForm>,
) -> ApiResult<impl IntoResponse> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.create_executive)?;

    validate_username(&form.username)?;
    validate_password(&form.password)?;
    let gender = match form.gender {
        Some(value) => GenderType::try_from(value)?.as_i32(),
        None => GenderType::Other.as_i32(),
    };
    let status = match form.status {
        Some(value) => AccountStatus::try_from(value)?.as_i32(),
        None => AccountStatus::Active.as_i32(),
    };
    let password = auth::make_password(&form.password)?;

    let lock = state.locks.acquire("executive").await?;
    let query = format!(
        "INSERT INTO executive \
         (username, password, gender, full_name, designation, status, phone_number, email_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {EXECUTIVE_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, Executive>(&query)
        .bind(&form.username)
        .bind(&password)
        .bind(gender)
        .bind(&form.full_name)
        .bind(&form.designation)
        .bind(status)
        .bind(&form.phone_number)
        .bind(&form.email_id)
        .fetch_one(&state.db)
        .await;
    state.locks.release(lock).await;
    let executive = inserted?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("POST", urls::ACCOUNT),
        json!({ "event": "executive_created", "executive_id": executive.id }),
    );
    Ok((StatusCode::CREATED, Json(executive)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateExecutiveForm {
    pub id: i32,
    pub password: Option<String>,
    pub gender: Option<i32>,
    pub full_name: Option<String>,
    pub designation: Option<String>,
    pub status: Option<i32>,
    pub phone_number: Option<String>,
    pub email_id: Option<String>,
}

/// `PATCH /entebus/account` — partial update; the username is immutable.
pub async fn update_executive(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Form(form): Form<UpdateExecutiveForm>,
) -> ApiResult<Json<Executive>> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.update_executive)?;

    let lock = state.locks.acquire_row("executive", form.id).await?;
    let result = apply_executive_update(&state, &form).await;
    state.locks.release(lock).await;
    let executive = result?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("PATCH", urls::ACCOUNT),
        json!({ "event": "executive_updated", "executive_id": executive.id }),
    );
    Ok(Json(executive))
}

async fn apply_executive_update(
    state: &AppState,
    form: &UpdateExecutiveForm,
) -> ApiResult<Executive> {
    let query = format!("SELECT {EXECUTIVE_COLUMNS} FROM executive WHERE id = $1");
    sqlx::query_as::<_, Executive>(&query)
        .bind(form.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::InvalidIdentifier)?;

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE executive SET updated_on = now()");
    if let Some(password) = form.password.as_deref() {
        validate_password(password)?;
        qb.push(", password = ").push_bind(auth::make_password(password)?);
    }
    if let Some(gender) = form.gender {
        qb.push(", gender = ").push_bind(GenderType::try_from(gender)?.as_i32());
    }
    if let Some(full_name) = form.full_name.as_deref() {
        qb.push(", full_name = ").push_bind(full_name.to_string());
    }
    if let Some(designation) = form.designation.as_deref() {
        qb.push(", designation = ").push_bind(designation.to_string());
    }
    if let Some(status) = form.status {
        qb.push(", status = ").push_bind(AccountStatus::try_from(status)?.as_i32());
    }
    if let Some(phone_number) = form.phone_number.as_deref() {
        qb.push(", phone_number = ").push_bind(phone_number.to_string());
    }
    if let Some(email_id) = form.email_id.as_deref() {
        qb.push(", email_id = ").push_bind(email_id.to_string());
    }
    qb.push(" WHERE id = ").push_bind(form.id);
    qb.push(format!(" RETURNING {EXECUTIVE_COLUMNS}"));

    let executive = qb
        .build_query_as::<Executive>()
        .fetch_one(&state.db)
        .await?;
    Ok(executive)
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub id: i32,
}

/// `DELETE /entebus/account` — remove the account, its tokens, role
/// mappings and stored picture.
pub async fn delete_executive(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<DeleteParams>,
) -> ApiResult<StatusCode> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;
    auth::require_permission(role.as_ref(), |r| r.delete_executive)?;

    let lock = state.locks.acquire_row("executive", params.id).await?;
    let result = remove_executive(&state, params.id).await;
    state.locks.release(lock).await;
    result?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("DELETE", urls::ACCOUNT),
        json!({ "event": "executive_deleted", "executive_id": params.id }),
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_executive(state: &AppState, id: i32) -> ApiResult<()> {
    let images = sqlx::query_as::<_, ExecutiveImage>(
        "SELECT id, executive_id, file_name, file_type, file_size, created_on \
         FROM executive_image WHERE executive_id = $1",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;
    for image in &images {
        // Best effort; the metadata row goes away with the cascade below.
        if let Err(err) = state
            .pictures
            .delete(&picture_key(image.executive_id, &image.file_name))
            .await
        {
            tracing::warn!("orphaned picture object for executive {}: {}", id, err);
        }
    }

    let result = sqlx::query("DELETE FROM executive WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::InvalidIdentifier);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ExecutiveSearch {
    pub id: Option<i32>,
    pub id_ge: Option<i32>,
    pub id_le: Option<i32>,
    pub id_list: Option<String>,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub gender: Option<i32>,
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

/// `GET /entebus/account` — search executives. Any valid token may read.
pub async fn list_executives(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<ExecutiveSearch>,
) -> ApiResult<Json<Vec<Executive>>> {
    auth::validate_token(&state.db, &bearer).await?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {EXECUTIVE_COLUMNS} FROM executive WHERE 1=1"
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
    if let Some(username) = params.username.as_deref() {
        qb.push(" AND username ILIKE ")
            .push_bind(format!("%{}%", username));
    }
    if let Some(full_name) = params.full_name.as_deref() {
        qb.push(" AND full_name ILIKE ")
            .push_bind(format!("%{}%", full_name));
    }
    if let Some(gender) = params.gender {
        qb.push(" AND gender = ").push_bind(gender);
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
        &["id", "username", "created_on", "updated_on"],
        params.order_by.as_deref(),
        params.order_in,
    )?);
    qb.push(" LIMIT ").push_bind(clamp_limit(params.limit));
    qb.push(" OFFSET ").push_bind(clamp_offset(params.offset)?);

    let executives = qb
        .build_query_as::<Executive>()
        .fetch_all(&state.db)
        .await?;
    Ok(Json(executives))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_follow_the_charset_rule() {
        assert!(validate_username("admin").is_ok());
        assert!(validate_username("a.b-c@d_e").is_ok());
        assert!(validate_username("abc").is_err()); // too short
        assert!(validate_username("1admin").is_err()); // leading digit
        assert!(validate_username("ad min").is_err()); // space
        assert!(validate_username(&"a".repeat(33)).is_err());
    }

    #[test]
    fn passwords_need_length_and_the_allowed_alphabet() {
        assert!(validate_password("password").is_ok());
        assert!(validate_password("P@ssw0rd!#").is_ok());
        assert!(validate_password("a-+,.@_$%&*#!^=/?").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password("has a space").is_err());
        assert!(validate_password(&"x".repeat(33)).is_err());
    }

    #[test]
    fn passwords_reject_characters_outside_the_alphabet() {
        assert!(validate_password("pass(word)").is_err());
        assert!(validate_password("tilde~word").is_err());
        assert!(validate_password("colon:word").is_err());
        assert!(validate_password("semi;colon1").is_err());
    }
}
