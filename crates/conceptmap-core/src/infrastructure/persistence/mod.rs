//! Persistence infrastructure
//!
//! SQLite-backed implementation of [`PersistenceStore`](crate::domain::persistence::PersistenceStore).

pub mod repository;

pub use repository::SqlitePersistenceStore;
