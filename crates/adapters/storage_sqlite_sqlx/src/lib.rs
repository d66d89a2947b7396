//! # sprinkler-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `RecordStore` port defined in `sprinkler-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//!
//! Records are opaque blobs to this crate; their encoding belongs to
//! `sprinkler-app::records`.
//!
//! ## Dependency rule
//! Depends on `sprinkler-app` (for port traits) and `sprinkler-domain` (for the
//! error type). The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod pool;
pub mod record_store;

pub use error::StorageError;
pub use pool::{Config, Database};
pub use record_store::SqliteRecordStore;
