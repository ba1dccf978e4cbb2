//! Authentication and authorization.
//!
//! Passwords are hashed with Argon2. Access tokens are 64-char hex strings
//! with a fixed validity window; each executive keeps at most
//! `MAX_EXECUTIVE_TOKENS` live tokens, rotating the oldest out on login.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use chrono::Utc;
use rand::RngCore;
use sqlx::PgPool;

use crate::constants::{MAX_EXECUTIVE_TOKENS, MAX_TOKEN_VALIDITY};
use crate::errors::{ApiError, ApiResult};
use crate::models::executive::{
    EXECUTIVE_TOKEN_COLUMNS, ExecutiveRole, ExecutiveToken,
};

/// Hash a plain-text password with Argon2 (random salt).
pub fn make_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a plain-text password against a stored Argon2 hash.
pub fn check_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Generate a 64-character lowercase hex access token.
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut token = String::with_capacity(64);
    for byte in bytes {
        token.push_str(&format!("{:02x}", byte));
    }
    token
}

/// Bearer credentials pulled from the `Authorization` header.
pub struct Bearer(pub String);

impl<S> FromRequestParts<S> for Bearer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::InvalidToken)?;
        let token = value.strip_prefix("Bearer ").ok_or(ApiError::InvalidToken)?;
        if token.is_empty() {
            return Err(ApiError::InvalidToken);
        }
        Ok(Bearer(token.to_string()))
    }
}

/// Resolve a bearer credential to a live token row.
///
/// Expired or unknown tokens are both `InvalidToken`; callers cannot tell
/// the two apart.
pub async fn validate_token(db: &PgPool, access_token: &str) -> ApiResult<ExecutiveToken> {
    let query = format!(
        "SELECT {EXECUTIVE_TOKEN_COLUMNS} FROM executive_token \
         WHERE access_token = $1 AND expires_at > now()"
    );
    sqlx::query_as::<_, ExecutiveToken>(&query)
        .bind(access_token)
        .fetch_optional(db)
        .await?
        .ok_or(ApiError::InvalidToken)
}

/// Fetch the role mapped to an executive, if any.
pub async fn executive_role(db: &PgPool, executive_id: i32) -> ApiResult<Option<ExecutiveRole>> {
    let role = sqlx::query_as::<_, ExecutiveRole>(
        "SELECT r.* FROM executive_role r \
         JOIN executive_role_map m ON r.id = m.role_id \
         WHERE m.executive_id = $1",
    )
    .bind(executive_id)
    .fetch_optional(db)
    .await?;
    Ok(role)
}

/// Check a permission flag on an optional role.
pub fn require_permission(
    role: Option<&ExecutiveRole>,
    has: impl Fn(&ExecutiveRole) -> bool,
) -> ApiResult<()> {
    match role {
        Some(role) if has(role) => Ok(()),
        _ => Err(ApiError::NoPermission),
    }
}

/// Issue a new token for an executive, rotating out old tokens so that at
/// most `MAX_EXECUTIVE_TOKENS` survive including the new one.
pub async fn issue_token(
    db: &PgPool,
    executive_id: i32,
    platform_type: i32,
    client_details: Option<String>,
) -> ApiResult<ExecutiveToken> {
    // Drop the oldest tokens beyond the allowance.
    sqlx::query(
        "DELETE FROM executive_token WHERE id IN (\
             SELECT id FROM executive_token WHERE executive_id = $1 \
             ORDER BY created_on DESC OFFSET $2)",
    )
    .bind(executive_id)
    .bind(MAX_EXECUTIVE_TOKENS - 1)
    .execute(db)
    .await?;

    let access_token = generate_access_token();
    let expires_at = Utc::now() + chrono::Duration::seconds(MAX_TOKEN_VALIDITY);
    let query = format!(
        "INSERT INTO executive_token \
         (executive_id, access_token, expires_in, expires_at, platform_type, client_details) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {EXECUTIVE_TOKEN_COLUMNS}"
    );
    let token = sqlx::query_as::<_, ExecutiveToken>(&query)
        .bind(executive_id)
        .bind(&access_token)
        .bind(MAX_TOKEN_VALIDITY as i32)
        .bind(expires_at)
        .bind(platform_type)
        .bind(client_details)
        .fetch_one(db)
        .await?;
    Ok(token)
}

/// Refresh a token: extend its validity by `expires_in` and rotate the
/// secret, invalidating the previous `access_token` immediately.
pub async fn rotate_token(db: &PgPool, token_id: i32) -> ApiResult<ExecutiveToken> {
    let access_token = generate_access_token();
    let query = format!(
        "UPDATE executive_token \
         SET access_token = $1, \
             expires_at = now() + make_interval(secs => expires_in), \
             updated_on = now() \
         WHERE id = $2 RETURNING {EXECUTIVE_TOKEN_COLUMNS}"
    );
    let token = sqlx::query_as::<_, ExecutiveToken>(&query)
        .bind(&access_token)
        .bind(token_id)
        .fetch_one(db)
        .await?;
    Ok(token)
}

/// Delete expired tokens. Returns the number of rows removed.
pub async fn purge_expired_tokens(db: &PgPool) -> ApiResult<u64> {
    let result = sqlx::query("DELETE FROM executive_token WHERE expires_at < now()")
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = make_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(check_password("correct horse", &hash));
        assert!(!check_password("wrong horse", &hash));
    }

    #[test]
    fn garbage_hashes_never_verify() {
        assert!(!check_password("anything", "not-a-phc-string"));
        assert!(!check_password("anything", ""));
    }

    #[test]
    fn access_tokens_are_64_hex_chars() {
        let token = generate_access_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        // Two draws colliding would mean a broken RNG.
        assert_ne!(token, generate_access_token());
    }

    #[test]
    fn permission_check_requires_a_role_with_the_flag() {
        assert!(matches!(
            require_permission(None, |r| r.create_landmark),
            Err(ApiError::NoPermission)
        ));
    }
}
