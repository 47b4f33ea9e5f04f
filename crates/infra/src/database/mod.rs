//! SQLite-backed persistence for the sync engine.
//!
//! The durable store exposes three logical collections: the operation
//! queue, a single-record sync policy, and a single-record stats row,
//! plus the auxiliary read cache swept by the maintainer.

pub mod cache_repository;
pub mod manager;
pub mod queue_repository;
pub mod settings_repository;

pub use cache_repository::CacheRepository;
pub use manager::DbManager;
pub use queue_repository::SqliteOperationStore;
pub use settings_repository::SqliteSettingsRepository;
