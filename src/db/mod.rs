//! Database layer
//!
//! SQLite is the default backend (single-file deployment); MySQL is supported
//! for larger installs. The driver is picked from configuration and hidden
//! behind the `DatabasePool` trait.
//!
//! ```ignore
//! use inkpress::config::DatabaseConfig;
//! use inkpress::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
