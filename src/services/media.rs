//! Uploaded media on local disk
//!
//! Files live under the configured upload root as
//! `<kind dir>/<uuid>.<ext>`; that relative path is what gets stored on
//! blogs and users, and `/media/<relative path>` is its public URL.

use crate::config::UploadConfig;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Invalid file type: {0}")]
    UnsupportedType(String),

    #[error("File too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Empty file")]
    Empty,

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    BlogImage,
    ProfileImage,
}

impl MediaKind {
    fn dir(&self) -> &'static str {
        match self {
            MediaKind::BlogImage => "blog_images",
            MediaKind::ProfileImage => "profile_images",
        }
    }
}

pub struct MediaStore {
    config: UploadConfig,
}

impl MediaStore {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn root(&self) -> &Path {
        &self.config.path
    }

    pub fn allowed_types(&self) -> &[String] {
        &self.config.allowed_types
    }

    /// Validate and write an upload, returning its media-relative path
    pub async fn save(
        &self,
        kind: MediaKind,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, MediaError> {
        if !self.config.is_type_allowed(content_type) {
            return Err(MediaError::UnsupportedType(content_type.to_string()));
        }
        if data.is_empty() {
            return Err(MediaError::Empty);
        }
        let size = data.len() as u64;
        if size > self.config.max_file_size {
            return Err(MediaError::TooLarge {
                size,
                max: self.config.max_file_size,
            });
        }

        let dir = self.config.path.join(kind.dir());
        fs::create_dir_all(&dir).await?;

        let name = format!("{}.{}", Uuid::new_v4(), self.config.get_extension(content_type));
        fs::write(dir.join(&name), data).await?;

        let relative = format!("{}/{}", kind.dir(), name);
        tracing::debug!(path = %relative, size, "Stored upload");
        Ok(relative)
    }

    /// Delete a stored file. Failures are logged, never returned.
    pub async fn remove(&self, relative: &str) {
        let Some(path) = self.resolve(relative) else {
            tracing::warn!(path = relative, "Refusing to remove media outside the upload root");
            return;
        };
        match fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(path = relative, "Removed media file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = relative, error = %e, "Failed to remove media file"),
        }
    }

    /// Absolute path for a relative media path; `None` if it would escape the root
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let rel = Path::new(relative);
        let safe = !relative.is_empty()
            && rel.components().all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| self.config.path.join(rel))
    }
}

/// Public URL of a media-relative path
pub fn media_url(relative: &str) -> String {
    format!("/media/{}", relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> MediaStore {
        MediaStore::new(UploadConfig {
            path: dir.path().to_path_buf(),
            max_file_size: 16,
            ..UploadConfig::default()
        })
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let dir = TempDir::new().unwrap();
        let media = store(&dir);

        let rel = media.save(MediaKind::BlogImage, "image/png", b"png-bytes").await.unwrap();
        assert!(rel.starts_with("blog_images/"));
        assert!(rel.ends_with(".png"));
        let path = media.resolve(&rel).unwrap();
        assert!(path.exists());

        media.remove(&rel).await;
        assert!(!path.exists());
        // second removal is a quiet no-op
        media.remove(&rel).await;
    }

    #[tokio::test]
    async fn test_save_rejects_bad_uploads() {
        let dir = TempDir::new().unwrap();
        let media = store(&dir);

        assert!(matches!(
            media.save(MediaKind::ProfileImage, "application/pdf", b"%PDF").await,
            Err(MediaError::UnsupportedType(_))
        ));
        assert!(matches!(
            media.save(MediaKind::ProfileImage, "image/jpeg", &[0u8; 17]).await,
            Err(MediaError::TooLarge { size: 17, max: 16 })
        ));
        assert!(matches!(
            media.save(MediaKind::ProfileImage, "image/jpeg", b"").await,
            Err(MediaError::Empty)
        ));
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let media = store(&dir);
        assert!(media.resolve("../etc/passwd").is_none());
        assert!(media.resolve("/etc/passwd").is_none());
        assert!(media.resolve("").is_none());
        assert!(media.resolve("profile_images/a.png").is_some());
    }

    #[test]
    fn test_media_url() {
        assert_eq!(media_url("blog_images/x.png"), "/media/blog_images/x.png");
    }
}
