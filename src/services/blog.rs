//! Blog service
//!
//! Creation with category classification, the moderated publishing
//! workflow, visibility-aware reads and listings, and cache upkeep for the
//! home page's latest-published list. Permission decisions are delegated to
//! [`crate::services::lifecycle`].

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::BlogRepository;
use crate::models::{
    Actor, Blog, BlogAction, BlogCategory, BlogFilter, BlogStatus, CreateBlogInput, ListParams,
    PagedResult, UpdateBlogInput,
};
use crate::services::classifier::CategoryClassifier;
use crate::services::lifecycle::{self, PermissionDenied};
use crate::services::media::MediaStore;
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Blogs shown on the home page
pub const HOME_LATEST_COUNT: u32 = 5;

pub const MAX_TITLE_LENGTH: usize = 255;

const CACHE_KEY_LATEST: &str = "blogs:latest:";
const CACHE_PATTERN_BLOGS: &str = "blogs:*";

#[derive(Debug, thiserror::Error)]
pub enum BlogServiceError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Missing, or hidden from the caller
    #[error("Blog not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<PermissionDenied> for BlogServiceError {
    fn from(err: PermissionDenied) -> Self {
        BlogServiceError::PermissionDenied(err.0.to_string())
    }
}

/// Blog totals for dashboards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub draft: i64,
    pub pending: i64,
    pub published: i64,
    pub rejected: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.draft + self.pending + self.published + self.rejected
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BlogStats {
    pub total: i64,
    pub by_status: StatusCounts,
    pub recent: Vec<Blog>,
}

pub struct BlogService {
    repo: Arc<dyn BlogRepository>,
    classifier: Arc<dyn CategoryClassifier>,
    cache: Arc<MemoryCache>,
    media: Arc<MediaStore>,
}

impl BlogService {
    pub fn new(
        repo: Arc<dyn BlogRepository>,
        classifier: Arc<dyn CategoryClassifier>,
        cache: Arc<MemoryCache>,
        media: Arc<MediaStore>,
    ) -> Self {
        Self {
            repo,
            classifier,
            cache,
            media,
        }
    }

    /// Create a blog owned by `author`.
    ///
    /// Staff posts go straight to published, everyone else's wait in
    /// pending. The category comes from the classifier, or `General` if it
    /// fails for any reason.
    pub async fn create(
        &self,
        author: &Actor,
        input: CreateBlogInput,
    ) -> Result<Blog, BlogServiceError> {
        let title = validate_title(&input.title)?;
        let content = validate_content(&input.content)?;

        let mut blog = Blog::new(title, content, author.id, lifecycle::initial_status(author));
        blog.category = self.categorize(&blog.title, &blog.content).await;

        let created = self.repo.create(&blog).await.context("Failed to create blog")?;
        tracing::info!(
            blog_id = created.id,
            author_id = author.id,
            status = %created.status,
            category = %created.category,
            "Blog created"
        );

        self.invalidate_cache().await;
        Ok(created)
    }

    /// Apply a workflow action
    pub async fn transition(
        &self,
        id: i64,
        actor: &Actor,
        action: BlogAction,
    ) -> Result<Blog, BlogServiceError> {
        let mut blog = self.load(id).await?;
        let from = blog.status;
        lifecycle::apply_transition(&mut blog, actor, action, Utc::now())?;

        let saved = self.repo.update(&blog).await.context("Failed to save blog status")?;
        tracing::info!(
            blog_id = id,
            actor_id = actor.id,
            %action,
            from = %from,
            to = %saved.status,
            "Blog transitioned"
        );

        self.invalidate_cache().await;
        Ok(saved)
    }

    /// Edit title/content and optionally request a status.
    ///
    /// The requested status is routed through the same rules as
    /// [`transition`](Self::transition), so members cannot self-publish here
    /// either. Without one, a member's change to a published or rejected
    /// blog resubmits it for review. The category is left as classified at
    /// creation.
    pub async fn update(
        &self,
        id: i64,
        actor: &Actor,
        input: UpdateBlogInput,
    ) -> Result<Blog, BlogServiceError> {
        let mut blog = self.load(id).await?;
        lifecycle::ensure_can_edit(&blog, actor)?;

        if !input.has_changes() {
            return Ok(blog);
        }
        let mut edited = false;
        if let Some(title) = input.title.as_deref() {
            let title = validate_title(title)?;
            edited |= title != blog.title;
            blog.title = title;
        }
        if let Some(content) = input.content.as_deref() {
            let content = validate_content(content)?;
            edited |= content != blog.content;
            blog.content = content;
        }

        let action = match input.status {
            Some(status) => Some(status.requesting_action()),
            None if edited => lifecycle::edit_action(&blog, actor),
            None => None,
        };
        if let Some(action) = action {
            lifecycle::apply_transition(&mut blog, actor, action, Utc::now())?;
        }

        let saved = self.repo.update(&blog).await.context("Failed to update blog")?;
        tracing::info!(blog_id = id, actor_id = actor.id, status = %saved.status, "Blog updated");

        self.invalidate_cache().await;
        Ok(saved)
    }

    /// Delete a blog and, best-effort, its image
    pub async fn delete(&self, id: i64, actor: &Actor) -> Result<(), BlogServiceError> {
        let blog = self.load(id).await?;
        lifecycle::ensure_can_delete(&blog, actor)?;

        self.repo.delete(id).await.context("Failed to delete blog")?;
        if let Some(image) = blog.image.as_deref() {
            self.media.remove(image).await;
        }
        tracing::info!(blog_id = id, actor_id = actor.id, "Blog deleted");

        self.invalidate_cache().await;
        Ok(())
    }

    /// Blog the actor may edit; used before accepting an upload for it
    pub async fn get_editable(&self, id: i64, actor: &Actor) -> Result<Blog, BlogServiceError> {
        let blog = self.load(id).await?;
        lifecycle::ensure_can_edit(&blog, actor)?;
        Ok(blog)
    }

    /// Point the cover image at a stored file, removing the previous one.
    ///
    /// Like content edits, a member's new image resubmits a moderated blog.
    pub async fn set_image(
        &self,
        id: i64,
        actor: &Actor,
        relative: String,
    ) -> Result<Blog, BlogServiceError> {
        let mut blog = self.get_editable(id, actor).await?;
        let previous = blog.image.replace(relative);
        if let Some(action) = lifecycle::edit_action(&blog, actor) {
            lifecycle::apply_transition(&mut blog, actor, action, Utc::now())?;
        }

        let saved = self.repo.update(&blog).await.context("Failed to set blog image")?;
        if let Some(previous) = previous.as_deref() {
            self.media.remove(previous).await;
        }

        self.invalidate_cache().await;
        Ok(saved)
    }

    /// A blog as seen by `viewer`; hidden blogs are `NotFound`
    pub async fn get_visible(
        &self,
        id: i64,
        viewer: Option<&Actor>,
    ) -> Result<Blog, BlogServiceError> {
        let blog = self.load(id).await?;
        if lifecycle::can_view(&blog, viewer) {
            Ok(blog)
        } else {
            Err(BlogServiceError::NotFound)
        }
    }

    /// Listing for `viewer`: staff see every blog, everyone else only published ones
    pub async fn list_for(
        &self,
        viewer: Option<&Actor>,
        search: Option<String>,
        params: &ListParams,
    ) -> Result<PagedResult<Blog>, BlogServiceError> {
        let filter = match viewer {
            Some(actor) if actor.is_staff() => BlogFilter::default(),
            _ => BlogFilter::published(),
        }
        .with_search(search);

        let (items, total) = self
            .repo
            .list(&filter, params)
            .await
            .context("Failed to list blogs")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// An author's own blogs in every status, newest first
    pub async fn author_blogs(
        &self,
        author_id: i64,
        params: &ListParams,
    ) -> Result<PagedResult<Blog>, BlogServiceError> {
        let filter = BlogFilter {
            author_id: Some(author_id),
            ..Default::default()
        };
        let (items, total) = self
            .repo
            .list(&filter, params)
            .await
            .context("Failed to list author blogs")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Newest published blogs, cached until the next blog mutation
    pub async fn latest_published(&self, limit: u32) -> Result<Vec<Blog>, BlogServiceError> {
        let key = format!("{}{}", CACHE_KEY_LATEST, limit);
        if let Ok(Some(cached)) = self.cache.get::<Vec<Blog>>(&key).await {
            return Ok(cached);
        }

        let (blogs, _) = self
            .repo
            .list(&BlogFilter::published(), &ListParams::new(1, limit))
            .await
            .context("Failed to load latest blogs")?;

        if let Err(e) = self.cache.set(&key, &blogs, self.cache.default_ttl()).await {
            tracing::warn!(error = %e, "Failed to cache latest blogs");
        }
        Ok(blogs)
    }

    /// Counts per status plus the most recent blogs in any status
    pub async fn stats(&self, recent: u32) -> Result<BlogStats, BlogServiceError> {
        let counts = self
            .repo
            .count_by_status()
            .await
            .context("Failed to count blogs")?;
        let by_status = StatusCounts {
            draft: counts.get(&BlogStatus::Draft).copied().unwrap_or(0),
            pending: counts.get(&BlogStatus::Pending).copied().unwrap_or(0),
            published: counts.get(&BlogStatus::Published).copied().unwrap_or(0),
            rejected: counts.get(&BlogStatus::Rejected).copied().unwrap_or(0),
        };

        let (recent, _) = self
            .repo
            .list(&BlogFilter::default(), &ListParams::new(1, recent))
            .await
            .context("Failed to load recent blogs")?;

        Ok(BlogStats {
            total: by_status.total(),
            by_status,
            recent,
        })
    }

    async fn load(&self, id: i64) -> Result<Blog, BlogServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to load blog")?
            .ok_or(BlogServiceError::NotFound)
    }

    async fn categorize(&self, title: &str, content: &str) -> BlogCategory {
        match self.classifier.classify(title, content).await {
            Ok(category) => category,
            Err(e) => {
                tracing::warn!(error = %e, "Category classification failed; using General");
                BlogCategory::General
            }
        }
    }

    async fn invalidate_cache(&self) {
        if let Err(e) = self.cache.delete_pattern(CACHE_PATTERN_BLOGS).await {
            tracing::warn!(error = %e, "Failed to invalidate blog cache");
        }
    }
}

fn validate_title(title: &str) -> Result<String, BlogServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(BlogServiceError::ValidationError("Title cannot be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(BlogServiceError::ValidationError(format!(
            "Title cannot exceed {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn validate_content(content: &str) -> Result<String, BlogServiceError> {
    if content.trim().is_empty() {
        return Err(BlogServiceError::ValidationError("Content cannot be empty".to_string()));
    }
    Ok(content.to_string())
}
