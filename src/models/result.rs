//! Search pages, flattened records and the final result set.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};

/// One page of an `esearch` response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchPage {
    /// Total matches reported by the server
    pub count: u64,
    /// Number of IDs the server says this page holds
    pub retmax: u64,
    pub ids: BTreeSet<u64>,
}

/// One flattened record: dotted path to value
pub type FetchRecord = Map<String, Value>;

/// Rows with the union of their keys as columns.
///
/// Columns keep first-seen order across rows; a row lacking a column
/// simply has no entry for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataTable {
    columns: Vec<String>,
    rows: Vec<FetchRecord>,
    #[serde(skip)]
    known: HashSet<String>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = FetchRecord>) -> Self {
        let mut table = Self::new();
        for row in rows {
            table.push(row);
        }
        table
    }

    pub fn push(&mut self, row: FetchRecord) {
        for key in row.keys() {
            if self.known.insert(key.clone()) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    /// Append another table's rows after this table's rows
    pub fn append(&mut self, other: MetadataTable) {
        for row in other.rows {
            self.push(row);
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FetchRecord] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<FetchRecord> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell lookup; `None` for an absent key
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

/// Everything one run produced. Built once, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    searched_ids: BTreeSet<u64>,
    ids: Vec<u64>,
    metadata: MetadataTable,
}

impl ResultSet {
    pub fn new(searched_ids: BTreeSet<u64>, ids: Vec<u64>, metadata: MetadataTable) -> Self {
        Self {
            searched_ids,
            ids,
            metadata,
        }
    }

    /// IDs found by term search (empty when no terms were given)
    pub fn searched_ids(&self) -> &BTreeSet<u64> {
        &self.searched_ids
    }

    /// Every ID that was fetched, in batch order
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    pub fn into_parts(self) -> (BTreeSet<u64>, Vec<u64>, MetadataTable) {
        (self.searched_ids, self.ids, self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> FetchRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_columns_are_union_in_first_seen_order() {
        let mut table = MetadataTable::from_rows([
            row(json!({"b": "1", "a": "2"})),
            row(json!({"a": "3", "c": ["x", "y"]})),
        ]);
        table.append(MetadataTable::from_rows([row(json!({"d": null, "b": "4"}))]));

        assert_eq!(table.columns(), &["b", "a", "c", "d"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.cell(1, "b"), None);
        assert_eq!(table.cell(2, "b"), Some(&json!("4")));
    }

    #[test]
    fn test_result_set_serializes_parts() {
        let set = ResultSet::new(
            BTreeSet::from([3, 1]),
            vec![1, 3],
            MetadataTable::from_rows([row(json!({"k": "v"}))]),
        );
        let value = serde_json::to_value(&set).unwrap();

        assert_eq!(value["searched_ids"], json!([1, 3]));
        assert_eq!(value["ids"], json!([1, 3]));
        assert_eq!(value["metadata"]["columns"], json!(["k"]));
        assert_eq!(value["metadata"]["rows"][0]["k"], json!("v"));
    }
}
