//! Database repositories
//!
//! One repository per entity. Each trait has a `Sqlx*` implementation that
//! serves both SQLite and MySQL: the query body is written once and expanded
//! per backend by [`on_backend!`], so every expansion is type-checked against
//! its own pool and row types.

/// Run `$body` with `$p` bound to the concrete sqlx pool.
macro_rules! on_backend {
    ($pool:expr, $p:ident => $body:expr) => {
        match $pool.backend() {
            $crate::db::Backend::Sqlite($p) => $body,
            $crate::db::Backend::Mysql($p) => $body,
        }
    };
}

pub mod blog;
pub mod session;
pub mod user;

pub use blog::{BlogRepository, SqlxBlogRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Auto-increment id of the row an INSERT just created
pub(crate) trait LastInsertId {
    fn last_id(&self) -> i64;
}

impl LastInsertId for sqlx::sqlite::SqliteQueryResult {
    fn last_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl LastInsertId for sqlx::mysql::MySqlQueryResult {
    fn last_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}
