// ============================================================================
// Change Tracking
// ============================================================================
//
// Every mutation staged by a unit of work is recorded as a Change. A list of
// changes is applied by the storage engine as one atomic commit.
//
// ============================================================================

use super::StoredRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Insert a new row; fails if the id already exists
    Insert { table: String, row: StoredRow },

    /// Replace an existing row; fails if the id does not exist
    Update { table: String, row: StoredRow },

    /// Insert or replace
    Upsert { table: String, row: StoredRow },

    /// Remove an existing row; fails if the id does not exist
    Delete { table: String, id: Uuid },
}

impl Change {
    pub fn table_name(&self) -> &str {
        match self {
            Change::Insert { table, .. } => table,
            Change::Update { table, .. } => table,
            Change::Upsert { table, .. } => table,
            Change::Delete { table, .. } => table,
        }
    }

    pub fn row_id(&self) -> Uuid {
        match self {
            Change::Insert { row, .. } | Change::Update { row, .. } | Change::Upsert { row, .. } => {
                row.id
            }
            Change::Delete { id, .. } => *id,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Change::Delete { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_table_name() {
        let row = StoredRow::new(Uuid::new_v4(), None, json!({}));
        let id = row.id;
        let change = Change::Insert {
            table: "pages".to_string(),
            row,
        };
        assert_eq!(change.table_name(), "pages");
        assert_eq!(change.row_id(), id);
        assert!(!change.is_delete());
    }

    #[test]
    fn test_change_classification() {
        let delete = Change::Delete {
            table: "sites".to_string(),
            id: Uuid::nil(),
        };
        assert!(delete.is_delete());
        assert_eq!(delete.row_id(), Uuid::nil());
    }
}
