use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One physical row: identifier, optional discriminator selecting the concrete
/// variant inside a single-table family, and the JSON payload column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub id: Uuid,
    pub discriminator: Option<String>,
    pub data: serde_json::Value,
    /// Insertion sequence assigned by the storage engine; scans return rows in
    /// this order.
    #[serde(default)]
    pub seq: u64,
}

impl StoredRow {
    pub fn new(id: Uuid, discriminator: Option<String>, data: serde_json::Value) -> Self {
        Self {
            id,
            discriminator,
            data,
            seq: 0,
        }
    }

    /// Reads a top-level string column out of the payload.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.data.get(column).and_then(|v| v.as_str())
    }

    /// Reads a top-level array of uuids (site ids, section ids) out of the payload.
    pub fn uuid_list(&self, column: &str) -> Vec<Uuid> {
        self.data
            .get(column)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .filter_map(|s| Uuid::parse_str(s).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_readers() {
        let site = Uuid::new_v4();
        let row = StoredRow::new(
            Uuid::new_v4(),
            Some("post".into()),
            json!({ "url": "hello", "site_ids": [site.to_string(), "garbage"] }),
        );
        assert_eq!(row.text("url"), Some("hello"));
        assert_eq!(row.text("missing"), None);
        assert_eq!(row.uuid_list("site_ids"), vec![site]);
        assert!(row.uuid_list("section_ids").is_empty());
    }
}
