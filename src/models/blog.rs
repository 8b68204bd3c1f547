//! Blog model
//!
//! - `Blog` entity with its moderation stamp
//! - `BlogStatus` and the `BlogAction`s that move between statuses
//! - `BlogCategory`, the fixed vocabulary the classifier picks from
//! - input and pagination types for the blog service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Blog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blog {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: BlogCategory,
    pub author_id: i64,
    /// Media-relative path of the cover image
    pub image: Option<String>,
    pub status: BlogStatus,
    /// Staff member who last published or rejected the blog
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Blog {
    /// Unsaved blog in the given status with the default category
    pub fn new(title: String, content: String, author_id: i64, status: BlogStatus) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title,
            content,
            category: BlogCategory::default(),
            author_id,
            image: None,
            status,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == BlogStatus::Published
    }
}

/// Publication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    /// Work in progress, visible to the author and staff
    Draft,
    /// Waiting for moderation
    #[default]
    Pending,
    /// Publicly visible
    Published,
    /// Turned down by a moderator
    Rejected,
}

impl BlogStatus {
    pub const ALL: [BlogStatus; 4] = [
        BlogStatus::Draft,
        BlogStatus::Pending,
        BlogStatus::Published,
        BlogStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlogStatus::Draft => "draft",
            BlogStatus::Pending => "pending",
            BlogStatus::Published => "published",
            BlogStatus::Rejected => "rejected",
        }
    }

    /// The action that requests this status
    pub fn requesting_action(&self) -> BlogAction {
        match self {
            BlogStatus::Draft => BlogAction::Draft,
            BlogStatus::Pending => BlogAction::Submit,
            BlogStatus::Published => BlogAction::Publish,
            BlogStatus::Rejected => BlogAction::Reject,
        }
    }
}

impl fmt::Display for BlogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlogStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(BlogStatus::Draft),
            "pending" => Ok(BlogStatus::Pending),
            "published" => Ok(BlogStatus::Published),
            "rejected" => Ok(BlogStatus::Rejected),
            _ => Err(anyhow::anyhow!("Invalid blog status: {}", s)),
        }
    }
}

/// A requested move in the publishing workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogAction {
    /// Send for moderation
    Submit,
    /// Pull back to draft
    Draft,
    /// Make public (staff)
    Publish,
    /// Turn down (staff)
    Reject,
}

impl BlogAction {
    pub const ALL: [BlogAction; 4] = [
        BlogAction::Submit,
        BlogAction::Draft,
        BlogAction::Publish,
        BlogAction::Reject,
    ];
}

impl fmt::Display for BlogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlogAction::Submit => "submit",
            BlogAction::Draft => "draft",
            BlogAction::Publish => "publish",
            BlogAction::Reject => "reject",
        };
        f.write_str(s)
    }
}

/// Fixed category vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BlogCategory {
    Technology,
    Education,
    Health,
    Travel,
    Business,
    Lifestyle,
    Sports,
    #[default]
    General,
}

impl BlogCategory {
    pub const ALL: [BlogCategory; 8] = [
        BlogCategory::Technology,
        BlogCategory::Education,
        BlogCategory::Health,
        BlogCategory::Travel,
        BlogCategory::Business,
        BlogCategory::Lifestyle,
        BlogCategory::Sports,
        BlogCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlogCategory::Technology => "Technology",
            BlogCategory::Education => "Education",
            BlogCategory::Health => "Health",
            BlogCategory::Travel => "Travel",
            BlogCategory::Business => "Business",
            BlogCategory::Lifestyle => "Lifestyle",
            BlogCategory::Sports => "Sports",
            BlogCategory::General => "General",
        }
    }
}

impl fmt::Display for BlogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlogCategory {
    type Err = anyhow::Error;

    /// Case-insensitive; surrounding whitespace and a trailing period are ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned = s.trim().trim_end_matches('.').trim();
        BlogCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(cleaned))
            .ok_or_else(|| anyhow::anyhow!("Unknown blog category: {}", s))
    }
}

/// Input for creating a blog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBlogInput {
    pub title: String,
    pub content: String,
}

/// Input for editing a blog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBlogInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    /// Requested status; routed through the lifecycle rules
    #[serde(default)]
    pub status: Option<BlogStatus>,
}

impl UpdateBlogInput {
    pub fn has_changes(&self) -> bool {
        self.title.is_some() || self.content.is_some() || self.status.is_some()
    }
}

/// Filter for blog listings
#[derive(Debug, Clone, Default)]
pub struct BlogFilter {
    /// Restrict to these statuses; `None` means every status
    pub status: Option<BlogStatus>,
    /// Restrict to one author
    pub author_id: Option<i64>,
    /// Case-insensitive title substring
    pub search: Option<String>,
}

impl BlogFilter {
    pub fn published() -> Self {
        Self {
            status: Some(BlogStatus::Published),
            ..Default::default()
        }
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListParams {
    /// 1-indexed page number
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 5,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 || self.total <= 0 {
            return 0;
        }
        (self.total as u64).div_ceil(u64::from(self.per_page)) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}
