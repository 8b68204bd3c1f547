//! Common API utilities and shared types
//!
//! Pagination query parsing, service error to HTTP mapping, and the
//! multipart file reader shared by the upload endpoints.

use axum::body::Bytes;
use axum::extract::Multipart;
use serde::Deserialize;

use crate::api::middleware::ApiError;
use crate::models::ListParams;
use crate::services::{BlogServiceError, MediaError, UserServiceError};

pub fn default_page() -> u32 {
    1
}

/// Blogs per page in public listings
pub fn default_page_size() -> u32 {
    5
}

/// Pagination plus optional title search
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            q: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl ListQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.page_size)
    }
}

impl From<BlogServiceError> for ApiError {
    fn from(err: BlogServiceError) -> Self {
        match err {
            BlogServiceError::PermissionDenied(msg) => ApiError::forbidden(msg),
            BlogServiceError::NotFound => ApiError::not_found("Blog not found"),
            BlogServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            BlogServiceError::InternalError(e) => {
                tracing::error!("Blog operation failed: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::AccountInactive => ApiError::forbidden("This account is inactive"),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            UserServiceError::InternalError(e) => {
                tracing::error!("User operation failed: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Io(e) => {
                tracing::error!("Failed to store upload: {}", e);
                ApiError::internal_error("Failed to store file")
            }
            other => ApiError::validation_error(other.to_string()),
        }
    }
}

/// An uploaded file as read from a multipart body
pub struct UploadedFile {
    pub content_type: String,
    pub data: Bytes,
}

/// Read the multipart field named `file`
pub async fn read_file_field(multipart: &mut Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;
        return Ok(UploadedFile { content_type, data });
    }

    Err(ApiError::validation_error("No file provided"))
}
