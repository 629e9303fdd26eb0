//! # studia-db
//!
//! PostgreSQL persistence layer for the studia pipeline.
//!
//! This crate provides:
//! - Connection pool management
//! - Course material repository with pgvector similarity ranking
//! - User context repository (preferences, academic profile, chat history)
//! - Filesystem blob storage for uploaded files
//!
//! ## Example
//!
//! ```rust,ignore
//! use studia_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/studia").await?;
//!     let material = db.materials.fetch(material_id).await?;
//!     println!("{} is {}", material.file_name, material.processing_status);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use sqlx::PgPool;

pub mod blob;
pub mod context;
pub mod materials;
pub mod pool;

// Re-export core types
pub use studia_core::{Error, Result};

pub use blob::{generate_blob_path, FilesystemBlobStore};
pub use context::PgContextRepository;
pub use materials::PgMaterialRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};

/// Bundle of repositories sharing one connection pool.
pub struct Database {
    pool: PgPool,
    pub materials: Arc<PgMaterialRepository>,
    pub context: Arc<PgContextRepository>,
}

impl Database {
    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::from_pool(pool))
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(database_url, config).await?;
        Ok(Self::from_pool(pool))
    }

    /// Build repositories around an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            materials: Arc::new(PgMaterialRepository::new(pool.clone())),
            context: Arc::new(PgContextRepository::new(pool.clone())),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
