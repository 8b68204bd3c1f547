//! User repository

use super::LastInsertId;
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist every mutable column and return the stored row
    async fn update(&self, user: &User) -> Result<User>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn count(&self) -> Result<i64>;

    /// Newest first. Returns the page and the total count.
    async fn list(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64)>;
}

/// SQLx-backed user repository (SQLite and MySQL)
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, role, is_staff, is_active, \
    profile_image, created_at, updated_at";

macro_rules! user_from_row {
    ($row:expr) => {{
        let row = $row;
        let role: String = row.get("role");
        let role: UserRole = role
            .parse()
            .with_context(|| format!("Invalid role in database: {}", role))?;
        Ok::<User, anyhow::Error>(User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            role,
            is_staff: row.get("is_staff"),
            is_active: row.get("is_active"),
            profile_image: row.get("profile_image"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }};
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let sql = "INSERT INTO users (username, email, password_hash, role, is_staff, is_active, \
            profile_image, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";

        let id = on_backend!(self.pool, p => sqlx::query(sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.to_string())
            .bind(user.is_staff)
            .bind(user.is_active)
            .bind(&user.profile_image)
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to create user")?
            .last_id());

        Ok(User {
            id,
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        on_backend!(self.pool, p => {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get user by ID")?;
            row.map(|r| user_from_row!(&r)).transpose()
        })
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
        on_backend!(self.pool, p => {
            let row = sqlx::query(&sql)
                .bind(username)
                .fetch_optional(p)
                .await
                .context("Failed to get user by username")?;
            row.map(|r| user_from_row!(&r)).transpose()
        })
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE LOWER(email) = LOWER(?)", USER_COLUMNS);
        on_backend!(self.pool, p => {
            let row = sqlx::query(&sql)
                .bind(email)
                .fetch_optional(p)
                .await
                .context("Failed to get user by email")?;
            row.map(|r| user_from_row!(&r)).transpose()
        })
    }

    async fn update(&self, user: &User) -> Result<User> {
        let sql = "UPDATE users SET username = ?, email = ?, password_hash = ?, role = ?, \
            is_staff = ?, is_active = ?, profile_image = ?, updated_at = ? WHERE id = ?";
        on_backend!(self.pool, p => {
            sqlx::query(sql)
                .bind(&user.username)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.role.to_string())
                .bind(user.is_staff)
                .bind(user.is_active)
                .bind(&user.profile_image)
                .bind(Utc::now())
                .bind(user.id)
                .execute(p)
                .await
                .context("Failed to update user")?;
        });

        self.get_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        on_backend!(self.pool, p => {
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete user")?;
        });
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        on_backend!(self.pool, p => {
            let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
                .fetch_one(p)
                .await
                .context("Failed to count users")?;
            Ok(row.get::<i64, _>("count"))
        })
    }

    async fn list(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64)> {
        let offset = (page.max(1) - 1) * per_page;
        let sql = format!(
            "SELECT {} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            USER_COLUMNS
        );
        let users = on_backend!(self.pool, p => {
            let rows = sqlx::query(&sql)
                .bind(per_page)
                .bind(offset)
                .fetch_all(p)
                .await
                .context("Failed to list users")?;
            rows.iter().map(|r| user_from_row!(r)).collect::<Result<Vec<_>>>()?
        });
        let total = self.count().await?;
        Ok((users, total))
    }
}
