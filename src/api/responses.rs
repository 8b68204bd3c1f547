//! Shared API response types

use serde::{Deserialize, Serialize};

use crate::models::{Blog, PagedResult, User};
use crate::services::{media_url, BlogStats, StatusCounts};

/// User as exposed over the API (no password hash)
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_staff: bool,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            role: user.role.to_string(),
            is_staff: user.is_staff,
            is_active: user.is_active,
            profile_image_url: user.profile_image.as_deref().map(media_url),
            created_at: user.created_at.to_rfc3339(),
            username: user.username,
            email: user.email,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlogResponse {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: String,
    pub author_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub status: String,
    pub approved_by: Option<i64>,
    pub approved_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Blog> for BlogResponse {
    fn from(blog: Blog) -> Self {
        Self {
            id: blog.id,
            category: blog.category.to_string(),
            author_id: blog.author_id,
            image_url: blog.image.as_deref().map(media_url),
            status: blog.status.to_string(),
            approved_by: blog.approved_by,
            approved_at: blog.approved_at.map(|t| t.to_rfc3339()),
            created_at: blog.created_at.to_rfc3339(),
            updated_at: blog.updated_at.to_rfc3339(),
            title: blog.title,
            content: blog.content,
        }
    }
}

/// One page of items plus pagination metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> PageResponse<T> {
    pub fn from_paged<S>(result: PagedResult<S>) -> Self
    where
        T: From<S>,
    {
        let total_pages = result.total_pages();
        Self {
            items: result.items.into_iter().map(T::from).collect(),
            total: result.total,
            page: result.page,
            page_size: result.per_page,
            total_pages,
        }
    }
}

/// Blog totals plus the most recent blogs
#[derive(Debug, Serialize, Deserialize)]
pub struct BlogStatsResponse {
    pub total_blogs: i64,
    pub by_status: StatusCounts,
    pub recent_blogs: Vec<BlogResponse>,
}

impl From<BlogStats> for BlogStatsResponse {
    fn from(stats: BlogStats) -> Self {
        Self {
            total_blogs: stats.total,
            by_status: stats.by_status,
            recent_blogs: stats.recent.into_iter().map(BlogResponse::from).collect(),
        }
    }
}
