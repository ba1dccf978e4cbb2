//! Profile picture storage on MinIO via the S3 API.

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use crate::config::AppConfig;
use crate::constants::EXECUTIVE_PICTURES;
use crate::errors::{ApiError, ApiResult};

#[derive(Clone)]
pub struct PictureStore {
    client: Client,
}

impl PictureStore {
    pub fn new(config: &AppConfig) -> Self {
        let credentials = Credentials::new(
            config.minio_username.clone(),
            config.minio_password.clone(),
            None,
            None,
            "minio",
        );
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(config.minio_endpoint())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();
        Self {
            client: Client::from_conf(s3_config),
        }
    }

    /// Create the pictures bucket if it does not exist yet.
    pub async fn ensure_bucket(&self) -> ApiResult<()> {
        match self
            .client
            .create_bucket()
            .bucket(EXECUTIVE_PICTURES)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_bucket_already_owned_by_you()
                    || service_err.is_bucket_already_exists()
                {
                    Ok(())
                } else {
                    Err(ApiError::Storage(service_err.to_string()))
                }
            }
        }
    }

    pub async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> ApiResult<()> {
        self.client
            .put_object()
            .bucket(EXECUTIVE_PICTURES)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| ApiError::Storage(err.to_string()))?;
        Ok(())
    }

    pub async fn download(&self, key: &str) -> ApiResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(EXECUTIVE_PICTURES)
            .key(key)
            .send()
            .await
            .map_err(|err| ApiError::Storage(err.to_string()))?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|err| ApiError::Storage(err.to_string()))?;
        Ok(data.into_bytes())
    }

    pub async fn delete(&self, key: &str) -> ApiResult<()> {
        self.client
            .delete_object()
            .bucket(EXECUTIVE_PICTURES)
            .key(key)
            .send()
            .await
            .map_err(|err| ApiError::Storage(err.to_string()))?;
        Ok(())
    }

    /// Delete every object in the bucket, then the bucket itself.
    pub async fn purge_bucket(&self) -> ApiResult<()> {
        loop {
            let listing = self
                .client
                .list_objects_v2()
                .bucket(EXECUTIVE_PICTURES)
                .send()
                .await
                .map_err(|err| ApiError::Storage(err.to_string()))?;
            let objects = listing.contents();
            if objects.is_empty() {
                break;
            }
            for object in objects {
                if let Some(key) = object.key() {
                    self.delete(key).await?;
                }
            }
            if listing.is_truncated() != Some(true) {
                break;
            }
        }
        self.client
            .delete_bucket()
            .bucket(EXECUTIVE_PICTURES)
            .send()
            .await
            .map_err(|err| ApiError::Storage(err.to_string()))?;
        Ok(())
    }
}

/// Object key for an executive's picture.
pub fn picture_key(executive_id: i32, file_name: &str) -> String {
    format!("{}/{}", executive_id, file_name)
}
