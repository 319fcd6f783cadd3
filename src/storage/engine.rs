use super::{Change, StoredRow};
use crate::core::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Row filter evaluated inside the storage engine, so one call is one round-trip.
pub type RowPredicate<'a> = &'a (dyn Fn(&StoredRow) -> bool + Send + Sync);

/// Round-trip counters exposed by a storage engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub commits: u64,
    pub queries: u64,
}

/// Storage boundary: set-based CRUD over schema-less JSON tables.
///
/// One physical table per base type; polymorphic families keep the concrete
/// variant in [`StoredRow::discriminator`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Rows of `table` matching `predicate`, in insertion order.
    async fn select(&self, table: &str, predicate: RowPredicate<'_>) -> Result<Vec<StoredRow>>;

    /// Rows of `table` whose id is in `ids` (id membership query).
    async fn fetch(&self, table: &str, ids: &[Uuid]) -> Result<Vec<StoredRow>>;

    /// Applies all changes as a single commit. Either every change is
    /// applied or none is.
    async fn apply(&self, changes: Vec<Change>) -> Result<()>;

    fn stats(&self) -> StorageStats;
}
