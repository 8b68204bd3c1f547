//! Session repository

use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Log a user out everywhere
    async fn delete_by_user(&self, user_id: i64) -> Result<u64>;

    /// Remove sessions past their expiry; returns how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        let sql = "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)";
        on_backend!(self.pool, p => {
            sqlx::query(sql)
                .bind(&session.id)
                .bind(session.user_id)
                .bind(session.expires_at)
                .bind(session.created_at)
                .execute(p)
                .await
                .context("Failed to create session")?;
        });
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        let sql = "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?";
        on_backend!(self.pool, p => {
            let row = sqlx::query(sql)
                .bind(id)
                .fetch_optional(p)
                .await
                .context("Failed to get session by ID")?;
            Ok(row.map(|row| Session {
                id: row.get("id"),
                user_id: row.get("user_id"),
                expires_at: row.get("expires_at"),
                created_at: row.get("created_at"),
            }))
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        on_backend!(self.pool, p => {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .context("Failed to delete session")?;
        });
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64> {
        let sql = "DELETE FROM sessions WHERE user_id = ?";
        let removed = on_backend!(self.pool, p => sqlx::query(sql)
            .bind(user_id)
            .execute(p)
            .await
            .context("Failed to delete sessions by user")?
            .rows_affected());
        Ok(removed)
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let sql = "DELETE FROM sessions WHERE expires_at < ?";
        let removed = on_backend!(self.pool, p => sqlx::query(sql)
            .bind(now)
            .execute(p)
            .await
            .context("Failed to delete expired sessions")?
            .rows_affected());
        Ok(removed)
    }
}
