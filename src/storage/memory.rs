use super::{Change, RowPredicate, Storage, StorageStats, StoredRow};
use crate::core::{CmsError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

type Table = BTreeMap<Uuid, StoredRow>;

/// In-memory storage engine.
///
/// Tables are created on first write. Commits are atomic: touched tables are
/// copied, the change list is applied to the copies and the copies replace the
/// originals only if every change succeeded.
pub struct InMemoryStorage {
    name: String,
    tables: RwLock<HashMap<String, Table>>,
    next_seq: AtomicU64,
    commits: AtomicU64,
    queries: AtomicU64,
}

impl InMemoryStorage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            commits: AtomicU64::new(0),
            queries: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of committed rows in a table (0 for unknown tables).
    pub async fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map(|t| t.len()).unwrap_or(0)
    }

    /// Committed row by id, bypassing the query counter.
    pub async fn peek(&self, table: &str, id: Uuid) -> Option<StoredRow> {
        let tables = self.tables.read().await;
        tables.get(table).and_then(|t| t.get(&id)).cloned()
    }

    pub async fn list_tables(&self) -> Vec<String> {
        let tables = self.tables.read().await;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        names
    }

    fn ordered(rows: impl Iterator<Item = StoredRow>) -> Vec<StoredRow> {
        let mut rows: Vec<StoredRow> = rows.collect();
        rows.sort_by_key(|row| row.seq);
        rows
    }

    fn apply_one(&self, table: &mut Table, change: Change) -> Result<()> {
        match change {
            Change::Insert { table: name, mut row } => {
                if table.contains_key(&row.id) {
                    return Err(CmsError::Storage(format!(
                        "Duplicate key '{}' in table '{}'",
                        row.id, name
                    )));
                }
                row.seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                table.insert(row.id, row);
            }
            Change::Update { table: name, mut row } => {
                let Some(existing) = table.get(&row.id) else {
                    return Err(CmsError::Storage(format!(
                        "Row '{}' not found in table '{}'",
                        row.id, name
                    )));
                };
                row.seq = existing.seq;
                table.insert(row.id, row);
            }
            Change::Upsert { mut row, .. } => {
                row.seq = match table.get(&row.id) {
                    Some(existing) => existing.seq,
                    None => self.next_seq.fetch_add(1, Ordering::SeqCst),
                };
                table.insert(row.id, row);
            }
            Change::Delete { table: name, id } => {
                if table.remove(&id).is_none() {
                    return Err(CmsError::Storage(format!(
                        "Row '{}' not found in table '{}'",
                        id, name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new("default")
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn select(&self, table: &str, predicate: RowPredicate<'_>) -> Result<Vec<StoredRow>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(Self::ordered(
            rows.values().filter(|row| predicate(row)).cloned(),
        ))
    }

    async fn fetch(&self, table: &str, ids: &[Uuid]) -> Result<Vec<StoredRow>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };
        let mut seen = HashSet::with_capacity(ids.len());
        Ok(Self::ordered(
            ids.iter()
                .filter(|id| seen.insert(**id))
                .filter_map(|id| rows.get(id))
                .cloned(),
        ))
    }

    async fn apply(&self, changes: Vec<Change>) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tables = self.tables.write().await;
        let mut staged: HashMap<String, Table> = HashMap::new();

        for change in changes {
            let name = change.table_name().to_string();
            let table = staged
                .entry(name.clone())
                .or_insert_with(|| tables.get(&name).cloned().unwrap_or_default());
            self.apply_one(table, change)?;
        }

        for (name, table) in staged {
            tables.insert(name, table);
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stats(&self) -> StorageStats {
        StorageStats {
            commits: self.commits.load(Ordering::SeqCst),
            queries: self.queries.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(data: serde_json::Value) -> StoredRow {
        StoredRow::new(Uuid::new_v4(), None, data)
    }

    #[tokio::test]
    async fn test_insert_and_select_in_order() {
        let storage = InMemoryStorage::new("test");
        let first = row(json!({ "n": 1 }));
        let second = row(json!({ "n": 2 }));
        storage
            .apply(vec![
                Change::Insert { table: "t".into(), row: first.clone() },
                Change::Insert { table: "t".into(), row: second.clone() },
            ])
            .await
            .unwrap();

        let rows = storage.select("t", &|_| true).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, first.id);
        assert_eq!(rows[1].id, second.id);
        assert_eq!(storage.stats().commits, 1);
    }

    #[tokio::test]
    async fn test_fetch_returns_each_id_once() {
        let storage = InMemoryStorage::new("test");
        let first = row(json!({ "n": 1 }));
        let second = row(json!({ "n": 2 }));
        storage
            .apply(vec![
                Change::Insert { table: "t".into(), row: first.clone() },
                Change::Insert { table: "t".into(), row: second.clone() },
            ])
            .await
            .unwrap();

        let rows = storage
            .fetch("t", &[second.id, first.id, second.id, Uuid::new_v4()])
            .await
            .unwrap();
        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let storage = InMemoryStorage::new("test");
        let good = row(json!({}));
        let result = storage
            .apply(vec![
                Change::Insert { table: "t".into(), row: good.clone() },
                Change::Delete { table: "t".into(), id: Uuid::new_v4() },
            ])
            .await;

        assert!(matches!(result, Err(CmsError::Storage(_))));
        assert_eq!(storage.row_count("t").await, 0);
        assert_eq!(storage.stats().commits, 0);
    }

    #[tokio::test]
    async fn test_update_keeps_sequence() {
        let storage = InMemoryStorage::new("test");
        let mut original = row(json!({ "title": "a" }));
        storage
            .apply(vec![Change::Insert { table: "t".into(), row: original.clone() }])
            .await
            .unwrap();
        let seq = storage.peek("t", original.id).await.unwrap().seq;

        original.data = json!({ "title": "b" });
        storage
            .apply(vec![Change::Update { table: "t".into(), row: original.clone() }])
            .await
            .unwrap();

        let stored = storage.peek("t", original.id).await.unwrap();
        assert_eq!(stored.seq, seq);
        assert_eq!(stored.text("title"), Some("b"));
    }

    #[tokio::test]
    async fn test_fetch_by_ids_counts_one_query() {
        let storage = InMemoryStorage::new("test");
        let a = row(json!({}));
        let b = row(json!({}));
        storage
            .apply(vec![
                Change::Insert { table: "t".into(), row: a.clone() },
                Change::Insert { table: "t".into(), row: b.clone() },
            ])
            .await
            .unwrap();

        let before = storage.stats().queries;
        let rows = storage.fetch("t", &[b.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, b.id);
        assert_eq!(storage.stats().queries, before + 1);
    }

    #[tokio::test]
    async fn test_unknown_table_is_empty() {
        let storage = InMemoryStorage::default();
        assert!(storage.select("nothing", &|_| true).await.unwrap().is_empty());
        assert!(storage.list_tables().await.is_empty());
    }
}
