//! Executive profile pictures: multipart upload into MinIO plus a metadata
//! row, download, and deletion. One picture per executive; re-uploading
//! replaces the previous one.

use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use crate::errors::{ApiError, ApiResult};
use crate::models::executive::ExecutiveImage;
use crate::services::auth::{self, Bearer};
use crate::services::pictures::picture_key;
use crate::services::telemetry::RequestInfo;
use crate::state::AppState;
use crate::urls;

const IMAGE_COLUMNS: &str = "id, executive_id, file_name, file_type, file_size, created_on";
const ALLOWED_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

struct Upload {
    executive_id: Option<i32>,
    file_name: String,
    file_type: String,
    data: Bytes,
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut executive_id = None;
    let mut picture = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::InvalidImage)?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("executive_id") => {
                let text = field.text().await.map_err(|_| ApiError::InvalidImage)?;
                executive_id = Some(
                    text.parse::<i32>()
                        .map_err(|_| ApiError::InvalidValue("executive_id"))?,
                );
            }
            Some("picture") => {
                let file_name = field
                    .file_name()
                    .unwrap_or("picture")
                    .to_string();
                let file_type = field
                    .content_type()
                    .unwrap_or_default()
                    .to_string();
                let data = field.bytes().await.map_err(|_| ApiError::InvalidImage)?;
                picture = Some((file_name, file_type, data));
            }
            _ => {}
        }
    }

    let (file_name, file_type, data) = picture.ok_or(ApiError::InvalidImage)?;
    if data.is_empty() || !ALLOWED_TYPES.contains(&file_type.as_str()) {
        return Err(ApiError::InvalidImage);
    }
    Ok(Upload {
        executive_id,
        file_name,
        file_type,
        data,
    })
}

/// `POST /entebus/account/picture`
///
/// Uploads the caller's own picture by default; targeting another account
/// requires `update_executive`.
pub async fn upload_picture(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let upload = read_upload(multipart).await?;

    let target = upload.executive_id.unwrap_or(token.executive_id);
    if target != token.executive_id {
        let role = auth::executive_role(&state.db, token.executive_id).await?;
        auth::require_permission(role.as_ref(), |r| r.update_executive)?;
    }
    let exists = sqlx::query_scalar::<_, i32>("SELECT id FROM executive WHERE id = $1")
        .bind(target)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(ApiError::UnknownValue("executive_id"));
    }

    let lock = state.locks.acquire_row("executive_image", target).await?;
    let result = store_picture(&state, target, &upload).await;
    state.locks.release(lock).await;
    let image = result?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("POST", urls::ACCOUNT_PICTURE),
        json!({ "event": "picture_uploaded", "executive_id": target, "image_id": image.id }),
    );
    Ok((StatusCode::CREATED, Json(image)))
}

async fn store_picture(
    state: &AppState,
    target: i32,
    upload: &Upload,
) -> ApiResult<ExecutiveImage> {
    let query = format!(
        "SELECT {IMAGE_COLUMNS} FROM executive_image WHERE executive_id = $1"
    );
    if let Some(previous) = sqlx::query_as::<_, ExecutiveImage>(&query)
        .bind(target)
        .fetch_optional(&state.db)
        .await?
    {
        state
            .pictures
            .delete(&picture_key(target, &previous.file_name))
            .await?;
        sqlx::query("DELETE FROM executive_image WHERE id = $1")
            .bind(previous.id)
            .execute(&state.db)
            .await?;
    }

    state
        .pictures
        .upload(
            &picture_key(target, &upload.file_name),
            upload.data.clone(),
            &upload.file_type,
        )
        .await?;

    let query = format!(
        "INSERT INTO executive_image (executive_id, file_name, file_type, file_size) \
         VALUES ($1, $2, $3, $4) RETURNING {IMAGE_COLUMNS}"
    );
    let image = sqlx::query_as::<_, ExecutiveImage>(&query)
        .bind(target)
        .bind(&upload.file_name)
        .bind(&upload.file_type)
        .bind(upload.data.len() as i64)
        .fetch_one(&state.db)
        .await?;
    Ok(image)
}

#[derive(Debug, Deserialize)]
pub struct PictureParams {
    pub executive_id: Option<i32>,
}

/// `GET /entebus/account/picture` — stream the picture bytes back.
pub async fn download_picture(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<PictureParams>,
) -> ApiResult<Response> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let target = params.executive_id.unwrap_or(token.executive_id);

    let query = format!(
        "SELECT {IMAGE_COLUMNS} FROM executive_image WHERE executive_id = $1"
    );
    let image = sqlx::query_as::<_, ExecutiveImage>(&query)
        .bind(target)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::InvalidIdentifier)?;

    let data = state
        .pictures
        .download(&picture_key(target, &image.file_name))
        .await?;

    let mut response = Response::new(Body::from(data));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&image.file_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Ok(value) =
        HeaderValue::from_str(&format!("inline; filename=\"{}\"", image.file_name))
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// `DELETE /entebus/account/picture`
pub async fn delete_picture(
    State(state): State<AppState>,
    Bearer(bearer): Bearer,
    Query(params): Query<PictureParams>,
) -> ApiResult<StatusCode> {
    let token = auth::validate_token(&state.db, &bearer).await?;
    let target = params.executive_id.unwrap_or(token.executive_id);
    if target != token.executive_id {
        let role = auth::executive_role(&state.db, token.executive_id).await?;
        auth::require_permission(role.as_ref(), |r| r.update_executive)?;
    }

    let lock = state.locks.acquire_row("executive_image", target).await?;
    let result = remove_picture(&state, target).await;
    state.locks.release(lock).await;
    result?;

    state.events.log(
        token.executive_id,
        &RequestInfo::new("DELETE", urls::ACCOUNT_PICTURE),
        json!({ "event": "picture_deleted", "executive_id": target }),
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_picture(state: &AppState, target: i32) -> ApiResult<()> {
    let query = format!(
        "SELECT {IMAGE_COLUMNS} FROM executive_image WHERE executive_id = $1"
    );
    let image = sqlx::query_as::<_, ExecutiveImage>(&query)
        .bind(target)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::InvalidIdentifier)?;
    state
        .pictures
        .delete(&picture_key(target, &image.file_name))
        .await?;
    sqlx::query("DELETE FROM executive_image WHERE id = $1")
        .bind(image.id)
        .execute(&state.db)
        .await?;
    Ok(())
}
