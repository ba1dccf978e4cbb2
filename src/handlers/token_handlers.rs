//! Access token lifecycle: login, refresh, listing, revocation.

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
use crate::models::enums::{AccountStatus, PlatformType};
use crate::models::executive::{
    Executive, ExecutiveRole, ExecutiveToken, MaskedExecutiveToken, EXECUTIVE_COLUMNS,
    EXECUTIVE_TOKEN_COLUMNS,
};
use crate::services::auth::{self, Bearer};
use crate::services::telemetry::RequestInfo;
use crate::state::AppState;
use crate::urls;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub platform_type: Option<i32>,
    pub client_details: Option<String>,
}

/// `POST /entebus/account/token` — exchange credentials for a bearer token.
///
/// The only authenticated surface reachable without a token. Unknown
/// usernames and bad passwords produce the same error.
pub async fn create_token(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> ApiResult<impl IntoResponse> {
    let platform_type = match form.platform_type {
        Some(value) => PlatformType::try_from(value)?.as_i32(),
        None => PlatformType::Other.as_i32(),
    };

    let query = format!("SELECT {EXECUTIVE_COLUMNS} FROM executive WHERE username = $1");
    let executive = sqlx::query_as::<_, Executive>(&query)
        .bind(&form.username)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;
    if !auth::check_password(&form.password, &executive.password) {
        return Err(ApiError::InvalidCredentials);
    }
    if executive.status != AccountStatus::Active.as_i32() {
        return Err(ApiError::InactiveAccount);
    }

    let lock = state
        .locks
        .acquire_row("executive_token", executive.id)
        .await?;
    let issued = auth::issue_token(&state.db, executive.id, platform_type, form.client_details)
        .await;
    state.locks.release(lock).await;
    let token = issued?;

    state.events.log(
        executive.id,
        &RequestInfo::new("POST", urls::ACCOUNT_TOKEN),
        json!({ "event": "token_created", "token_id": token.id }),
    );
    Ok((StatusCode::CREATED, Json(token)))
}

/// Touching another executive's token takes `manage_ex_token`; your own
/// tokens are always yours to refresh or revoke.
fn ensure_token_access(
    target: &ExecutiveToken,
    caller: &ExecutiveToken,
    role: Option<&ExecutiveRole>,
) -> ApiResult<()> {
    if target.executive_id == caller.executive_id {
        return Ok(());
    }
    auth::require_permission(role, |r| r.manage_ex_token)
}

#[derive(Debug, Deserialize)]
pub struct RefreshParams {
    pub id: Option<i32>,
}

/// `PATCH /entebus/account/token`
///
/// Extends the target token's validity and rotates its secret; the old
/// `access_token` stops working the moment this returns. Without an `id`
/// the presented token refreshes itself.
pub async fn refresh_token(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<RefreshParams>,
) -> ApiResult<impl IntoResponse> {
    let token = auth::validate_token(&state.db, &bearer).await?;

    let target_id = params.id.unwrap_or(token.id);
    let query = format!("SELECT {EXECUTIVE_TOKEN_COLUMNS} FROM executive_token WHERE id = $1");
    let target = sqlx::query_as::<_, ExecutiveToken>(&query)
        .bind(target_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::InvalidIdentifier)?;
    if target.executive_id != token.executive_id {
        let role = auth::executive_role(&state.db, token.executive_id).await?;
        ensure_token_access(&target, &token, role.as_ref())?;
    }

    let lock = state.locks.acquire_row("executive_token", target.id).await?;
    let refreshed = auth::rotate_token(&state.db, target.id).await;
    state.locks.release(lock).await;
    let refreshed = refreshed?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("PATCH", urls::ACCOUNT_TOKEN),
        json!({ "event": "token_refreshed", "token_id": refreshed.id }),
    );
    Ok(Json(refreshed))
}

#[derive(Debug, Deserialize)]
pub struct TokenSearch {
    pub id: Option<i32>,
    pub id_ge: Option<i32>,
    pub id_le: Option<i32>,
    pub id_list: Option<String>,
    pub executive_id: Option<i32>,
    pub platform_type: Option<i32>,
    pub created_ge: Option<DateTime<Utc>>,
    pub created_le: Option<DateTime<Utc>>,
    pub order_by: Option<String>,
    pub order_in: Option<i32>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// `GET /entebus/account/token` — list tokens, masked.
///
/// Without the `manage_ex_token` permission the listing is forced down to
/// the caller's own tokens.
pub async fn list_tokens(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<TokenSearch>,
) -> ApiResult<Json<Vec<MaskedExecutiveToken>>> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let role = auth::executive_role(&state.db, token.executive_id).await?;

    let can_manage = role.as_ref().map(|r| r.manage_ex_token).unwrap_or(false);
    let executive_filter = if can_manage {
        params.executive_id
    } else {
        Some(token.executive_id)
    };

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {EXECUTIVE_TOKEN_COLUMNS} FROM executive_token WHERE 1=1"
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
    if let Some(executive_id) = executive_filter {
        qb.push(" AND executive_id = ").push_bind(executive_id);
    }
    if let Some(platform_type) = params.platform_type {
        qb.push(" AND platform_type = ").push_bind(platform_type);
    }
    if let Some(created_ge) = params.created_ge {
        qb.push(" AND created_on >= ").push_bind(created_ge);
    }
    if let Some(created_le) = params.created_le {
        qb.push(" AND created_on <= ").push_bind(created_le);
    }
    qb.push(order_clause(
        &["id", "executive_id", "expires_at", "created_on"],
        params.order_by.as_deref(),
        params.order_in,
    )?);
    qb.push(" LIMIT ").push_bind(clamp_limit(params.limit));
    qb.push(" OFFSET ").push_bind(clamp_offset(params.offset)?);

    let tokens = qb
        .build_query_as::<ExecutiveToken>()
        .fetch_all(&state.db)
        .await?;
    Ok(Json(tokens.iter().map(ExecutiveToken::masked).collect()))
}

#[derive(Debug, Deserialize)]
pub struct RevokeParams {
    pub id: Option<i32>,
}

/// `DELETE /entebus/account/token` — revoke a token.
///
/// Without an `id` the presented token revokes itself. Revoking another
/// executive's token needs `manage_ex_token`. Deleting an already-gone
/// token is still a 204.
pub async fn delete_token(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<RevokeParams>,
) -> ApiResult<StatusCode> {
    let token = auth::validate_token(&state.db, &bearer).await?;

    let target_id = params.id.unwrap_or(token.id);
    let query = format!("SELECT {EXECUTIVE_TOKEN_COLUMNS} FROM executive_token WHERE id = $1");
    let target = sqlx::query_as::<_, ExecutiveToken>(&query)
        .bind(target_id)
        .fetch_optional(&state.db)
        .await?;
    let Some(target) = target else {
        return Ok(StatusCode::NO_CONTENT);
    };
    if target.executive_id != token.executive_id {
        let role = auth::executive_role(&state.db, token.executive_id).await?;
        ensure_token_access(&target, &token, role.as_ref())?;
    }

    let lock = state.locks.acquire_row("executive_token", target.id).await?;
    let deleted = sqlx::query("DELETE FROM executive_token WHERE id = $1")
        .bind(target.id)
        .execute(&state.db)
        .await;
    state.locks.release(lock).await;
    deleted?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("DELETE", urls::ACCOUNT_TOKEN),
        json!({ "event": "token_revoked", "token_id": target.id }),
    );
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn token(id: i32, executive_id: i32) -> ExecutiveToken {
        ExecutiveToken {
            id,
            executive_id,
            access_token: "0".repeat(64),
            expires_in: 600,
            expires_at: Utc::now(),
            platform_type: 1,
            client_details: None,
            updated_on: None,
            created_on: Utc::now(),
        }
    }

    fn role(manage_ex_token: bool) -> ExecutiveRole {
        ExecutiveRole {
            id: 1,
            name: "Tester".into(),
            manage_ex_token,
            create_executive: false,
            update_executive: false,
            delete_executive: false,
            create_landmark: false,
            update_landmark: false,
            delete_landmark: false,
            create_bus_stop: false,
            update_bus_stop: false,
            delete_bus_stop: false,
            create_company: false,
            update_company: false,
            delete_company: false,
            create_route: false,
            update_route: false,
            delete_route: false,
            create_bus: false,
            update_bus: false,
            delete_bus: false,
            updated_on: None,
            created_on: Utc::now(),
        }
    }

    #[test]
    fn own_tokens_need_no_role() {
        let caller = token(1, 7);
        let target = token(2, 7);
        assert!(ensure_token_access(&target, &caller, None).is_ok());
    }

    #[test]
    fn foreign_tokens_take_manage_ex_token() {
        let caller = token(1, 7);
        let target = token(2, 8);
        assert!(matches!(
            ensure_token_access(&target, &caller, None),
            Err(ApiError::NoPermission)
        ));
        assert!(matches!(
            ensure_token_access(&target, &caller, Some(&role(false))),
            Err(ApiError::NoPermission)
        ));
        assert!(ensure_token_access(&target, &caller, Some(&role(true))).is_ok());
    }

    #[test]
    fn masked_listing_never_carries_the_secret() {
        let full = token(1, 7);
        let masked = serde_json::to_value(full.masked()).unwrap();
        assert!(masked.get("access_token").is_none());
        assert_eq!(masked["executive_id"], 7);
    }
}
