//! Blog repository
//!
//! Storage for blogs plus the filtered, paginated listing used by the public
//! list, the dashboards and the admin panel.

use super::LastInsertId;
use crate::db::DynDatabasePool;
use crate::models::{Blog, BlogCategory, BlogFilter, BlogStatus, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait BlogRepository: Send + Sync {
    async fn create(&self, blog: &Blog) -> Result<Blog>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Blog>>;

    /// Persist every mutable column and return the stored row
    async fn update(&self, blog: &Blog) -> Result<Blog>;

    async fn delete(&self, id: i64) -> Result<()>;

    /// Newest first. Returns the page and the total matching the filter.
    async fn list(&self, filter: &BlogFilter, params: &ListParams) -> Result<(Vec<Blog>, i64)>;

    async fn count(&self, filter: &BlogFilter) -> Result<i64>;

    /// Number of blogs in each status; statuses with no blogs are absent
    async fn count_by_status(&self) -> Result<HashMap<BlogStatus, i64>>;
}

pub struct SqlxBlogRepository {
    pool: DynDatabasePool,
}

impl SqlxBlogRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BlogRepository> {
        Arc::new(Self::new(pool))
    }
}

const BLOG_COLUMNS: &str = "id, title, content, category, author_id, image, status, \
    approved_by, approved_at, created_at, updated_at";

macro_rules! blog_from_row {
    ($row:expr) => {{
        let row = $row;
        let status: String = row.get("status");
        let category: String = row.get("category");
        Ok::<Blog, anyhow::Error>(Blog {
            id: row.get("id"),
            title: row.get("title"),
            content: row.get("content"),
            category: category.parse().unwrap_or(BlogCategory::General),
            author_id: row.get("author_id"),
            image: row.get("image"),
            status: status
                .parse()
                .with_context(|| format!("Invalid blog status in database: {}", status))?,
            approved_by: row.get("approved_by"),
            approved_at: row.get("approved_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }};
}

enum Param {
    Text(String),
    Int(i64),
}

/// Build the WHERE clause for a filter along with its bind values, in order
fn where_clause(filter: &BlogFilter) -> (String, Vec<Param>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(status) = filter.status {
        conditions.push("status = ?");
        params.push(Param::Text(status.as_str().to_string()));
    }
    if let Some(author_id) = filter.author_id {
        conditions.push("author_id = ?");
        params.push(Param::Int(author_id));
    }
    if let Some(search) = &filter.search {
        conditions.push("LOWER(title) LIKE ? ESCAPE '!'");
        params.push(Param::Text(format!("%{}%", escape_like(&search.to_lowercase()))));
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '!' | '%' | '_') {
            out.push('!');
        }
        out.push(c);
    }
    out
}

macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                Param::Text(s) => query.bind(s.clone()),
                Param::Int(i) => query.bind(*i),
            };
        }
        query
    }};
}

#[async_trait]
impl BlogRepository for SqlxBlogRepository {
    async fn create(&self, blog: &Blog) -> Result<Blog> {
        let now = Utc::now();
        let sql = "INSERT INTO blogs (title, content, category, author_id, image, status, \
            approved_by, approved_at, created_at, updated_at) \
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

        let id = on_backend!(self.pool, p => sqlx::query(sql)
            .bind(&blog.title)
            .bind(&blog.content)
            .bind(blog.category.as_str())
            .bind(blog.author_id)
            .bind(&blog.image)
            .bind(blog.status.as_str())
            .bind(blog.approved_by)
            .bind(blog.approved_at)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create blog")?
            .last_id());

        Ok(Blog {
            id,
            created_at: now,
            updated_at: now,
            ..blog.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Blog>> {
        let sql = format!("SELECT {} FROM blogs WHERE id = ?", BLOG_COLUMNS);
        on_backend!(self.pool, p => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get blog")?;
            row.map(|r| blog_from_row!(&r)).transpose()
        })
    }

    async fn update(&self, blog: &Blog) -> Result<Blog> {
        let sql = "UPDATE blogs SET title = ?, content = ?, category = ?, image = ?, status = ?, \
            approved_by = ?, approved_at = ?, updated_at = ? WHERE id = ?";
        on_backend!(self.pool, p => {
            sqlx::query(sql)
                .bind(&blog.title)
                .bind(&blog.content)
                .bind(blog.category.as_str())
                .bind(&blog.image)
                .bind(blog.status.as_str())
                .bind(blog.approved_by)
                .bind(blog.approved_at)
                .bind(Utc::now())
                .bind(blog.id)
                .execute(p)
                .await
                .context("Failed to update blog")?;
        });

        self.get_by_id(blog.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Blog not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_backend!(self.pool, p => {
            sqlx::query("DELETE FROM blogs WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete blog")?;
        });
        Ok(())
    }

    async fn list(&self, filter: &BlogFilter, params: &ListParams) -> Result<(Vec<Blog>, i64)> {
        let (clause, binds) = where_clause(filter);
        let sql = format!(
            "SELECT {} FROM blogs{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            BLOG_COLUMNS, clause
        );

        let blogs = on_backend!(self.pool, p => {
            let rows = bind_params!(sqlx::query(&sql), &binds)
                .bind(params.limit())
                .bind(params.offset())
                .fetch_all(p)
                .await
                .context("Failed to list blogs")?;
            rows.iter().map(|r| blog_from_row!(r)).collect::<Result<Vec<_>>>()?
        });

        let total = self.count(filter).await?;
        Ok((blogs, total))
    }

    async fn count(&self, filter: &BlogFilter) -> Result<i64> {
        let (clause, binds) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) AS count FROM blogs{}", clause);
        on_backend!(self.pool, p => {
            let row = bind_params!(sqlx::query(&sql), &binds)
                .fetch_one(p)
                .await
                .context("Failed to count blogs")?;
            Ok(row.get::<i64, _>("count"))
        })
    }

    async fn count_by_status(&self) -> Result<HashMap<BlogStatus, i64>> {
        let sql = "SELECT status, COUNT(*) AS count FROM blogs GROUP BY status";
        let pairs: Vec<(String, i64)> = on_backend!(self.pool, p => sqlx::query(sql)
            .fetch_all(p)
            .await
            .context("Failed to count blogs by status")?
            .iter()
            .map(|r| (r.get::<String, _>("status"), r.get::<i64, _>("count")))
            .collect());

        let mut counts = HashMap::new();
        for (status, count) in pairs {
            match status.parse::<BlogStatus>() {
                Ok(status) => {
                    counts.insert(status, count);
                }
                Err(_) => tracing::warn!("Skipping unknown blog status in counts: {}", status),
            }
        }
        Ok(counts)
    }
}
