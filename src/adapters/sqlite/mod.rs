//! SQLite adapters implementing the repository ports.

pub mod connection;
pub mod migrations;
pub mod motif_repository;
pub mod prediction_repository;
pub mod strand_repository;

pub use connection::{create_pool, create_test_pool, ConnectionError, PoolConfig};
pub use migrations::{all_migrations, Migration, MigrationError, Migrator};
pub use motif_repository::SqliteMotifRepository;
pub use prediction_repository::SqlitePredictionRepository;
pub use strand_repository::SqliteStrandRepository;
