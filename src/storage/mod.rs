mod memory;
mod repository;
mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

pub use memory::*;
pub use repository::*;
pub use sqlite::*;

/// SQL migration for the key-value table
pub const MIGRATION_001_KV_STORE: &str = include_str!("migrations/001_kv_store.sql");

/// Durable key-value store the ledger reads at startup and writes after each mutation.
///
/// Values are opaque serialized collections. Implementations must be safe to
/// share between tasks.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read a value, `None` if the key was never written.
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Write a single value, replacing any previous one.
    async fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Write several values so that either all of them or none become visible.
    async fn save_all(&self, entries: &[(String, String)]) -> Result<()>;
}
