// ============================================================================
// Unit of Work
// ============================================================================
//
// DataContext is shared by every repository and the properties provider of
// one engine. Mutations are staged as Changes and written by save_changes()
// as one storage commit. In batch mode save_changes() is a no-op and the
// buffer is flushed by finish_batch().
//
// Reads through the context see committed rows with pending changes laid on
// top, so validators and upserts observe writes buffered by a batch.
//
// ============================================================================

use crate::core::Result;
use crate::storage::{Change, Storage, StorageStats, StoredRow};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct DataContext {
    storage: Arc<dyn Storage>,
    pending: Mutex<Vec<Change>>,
    batch_mode: AtomicBool,
}

impl DataContext {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            pending: Mutex::new(Vec::new()),
            batch_mode: AtomicBool::new(false),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn stats(&self) -> StorageStats {
        self.storage.stats()
    }

    pub fn is_batch_mode(&self) -> bool {
        self.batch_mode.load(Ordering::SeqCst)
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn stage(&self, change: Change) {
        self.pending.lock().await.push(change);
    }

    pub async fn stage_many(&self, changes: impl IntoIterator<Item = Change>) {
        self.pending.lock().await.extend(changes);
    }

    /// Drops everything staged but not yet committed.
    pub async fn discard_pending(&self) -> usize {
        let mut pending = self.pending.lock().await;
        let dropped = pending.len();
        pending.clear();
        dropped
    }

    /// Commits staged changes unless batch mode is on.
    ///
    /// Returns `true` when a commit was issued. A failed commit drops the
    /// staged changes and propagates the storage error unchanged.
    pub async fn save_changes(&self) -> Result<bool> {
        if self.is_batch_mode() {
            return Ok(false);
        }
        self.commit().await
    }

    pub fn begin_batch(&self) {
        self.batch_mode.store(true, Ordering::SeqCst);
    }

    /// Leaves batch mode and writes every buffered change as one commit.
    pub async fn finish_batch(&self) -> Result<bool> {
        self.batch_mode.store(false, Ordering::SeqCst);
        self.commit().await
    }

    async fn commit(&self) -> Result<bool> {
        let changes = {
            let mut pending = self.pending.lock().await;
            std::mem::take(&mut *pending)
        };
        if changes.is_empty() {
            return Ok(false);
        }

        let count = changes.len();
        match self.storage.apply(changes).await {
            Ok(()) => {
                debug!(changes = count, "unit of work committed");
                Ok(true)
            }
            Err(err) => {
                warn!(changes = count, error = %err, "unit of work commit failed");
                Err(err)
            }
        }
    }

    /// Rows of `table` matching `predicate`, including staged changes.
    pub async fn select<F>(&self, table: &str, predicate: F) -> Result<Vec<StoredRow>>
    where
        F: Fn(&StoredRow) -> bool + Send + Sync,
    {
        let staged = self.staged_for(table).await;
        let committed = self.storage.select(table, &predicate).await?;
        Ok(overlay(committed, staged, &predicate))
    }

    /// Rows of `table` with the given ids, including staged changes.
    pub async fn fetch(&self, table: &str, ids: &[Uuid]) -> Result<Vec<StoredRow>> {
        let staged = self.staged_for(table).await;
        let committed = self.storage.fetch(table, ids).await?;
        Ok(overlay(committed, staged, &|row: &StoredRow| ids.contains(&row.id)))
    }

    async fn staged_for(&self, table: &str) -> Vec<Change> {
        let pending = self.pending.lock().await;
        pending
            .iter()
            .filter(|change| change.table_name() == table)
            .cloned()
            .collect()
    }
}

fn overlay<F>(mut rows: Vec<StoredRow>, staged: Vec<Change>, predicate: &F) -> Vec<StoredRow>
where
    F: Fn(&StoredRow) -> bool + ?Sized,
{
    for change in staged {
        match change {
            Change::Insert { row, .. } | Change::Update { row, .. } | Change::Upsert { row, .. } => {
                let position = rows.iter().position(|existing| existing.id == row.id);
                match (position, predicate(&row)) {
                    (Some(idx), true) => {
                        let seq = rows[idx].seq;
                        rows[idx] = StoredRow { seq, ..row };
                    }
                    (Some(idx), false) => {
                        rows.remove(idx);
                    }
                    (None, true) => rows.push(StoredRow { seq: u64::MAX, ..row }),
                    (None, false) => {}
                }
            }
            Change::Delete { id, .. } => rows.retain(|existing| existing.id != id),
        }
    }
    rows
}
