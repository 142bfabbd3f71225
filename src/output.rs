//! Writing run results to disk.
//!
//! A run directory receives:
//!
//! - `search_uids.txt`: one searched ID per line (only when a search ran)
//! - `fetch_result.tsv`: one row per record, columns in first-seen order
//! - `fetch_result.json`: the same rows as a JSON array (optional)

use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::FetchError;
use crate::models::{MetadataTable, ResultSet};

pub const SEARCH_IDS_FILE: &str = "search_uids.txt";
pub const TSV_FILE: &str = "fetch_result.tsv";
pub const JSON_FILE: &str = "fetch_result.json";

/// Files written by [`write_results`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputPaths {
    pub search_ids: Option<PathBuf>,
    pub table: PathBuf,
    pub json: Option<PathBuf>,
}

/// Render one cell. Absent and null cells are empty, strings are written
/// raw with control characters escaped, everything else as compact JSON.
pub fn format_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => escape_field(s),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => escape_field(&other.to_string()),
    }
}

fn escape_field(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Write a table as tab-separated values with a header row
pub fn write_tsv<W: Write>(table: &MetadataTable, mut writer: W) -> Result<(), FetchError> {
    let header = table
        .columns()
        .iter()
        .map(|c| escape_field(c))
        .collect::<Vec<_>>()
        .join("\t");
    writeln!(writer, "{}", header)?;

    for row in table.rows() {
        let line = table
            .columns()
            .iter()
            .map(|column| format_cell(row.get(column)))
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(writer, "{}", line)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write the searched IDs, one per line
pub fn write_search_ids<'a, W: Write>(
    ids: impl IntoIterator<Item = &'a u64>,
    mut writer: W,
) -> Result<(), FetchError> {
    for id in ids {
        writeln!(writer, "{}", id)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write every artifact of a run into `dir`, creating it if needed
pub fn write_results(
    dir: &Path,
    result: &ResultSet,
    searched: bool,
    json: bool,
) -> Result<OutputPaths, FetchError> {
    fs::create_dir_all(dir)?;

    let search_ids = if searched {
        let path = dir.join(SEARCH_IDS_FILE);
        write_search_ids(result.searched_ids(), BufWriter::new(File::create(&path)?))?;
        Some(path)
    } else {
        None
    };

    let table = dir.join(TSV_FILE);
    write_tsv(result.metadata(), BufWriter::new(File::create(&table)?))?;

    let json = if json {
        let path = dir.join(JSON_FILE);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, result.metadata().rows())?;
        Some(path)
    } else {
        None
    };

    tracing::info!(dir = %dir.display(), rows = result.metadata().len(), "results written");

    Ok(OutputPaths {
        search_ids,
        table,
        json,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn table() -> MetadataTable {
        let rows = [
            json!({"acc": "SRX1", "files": [{"@url": "u1"}], "n": null}),
            json!({"acc": "SRX2\tx", "extra": 5}),
        ];
        MetadataTable::from_rows(rows.into_iter().map(|v| match v {
            Value::Object(map) => map,
            _ => unreachable!(),
        }))
    }

    #[test]
    fn test_tsv_layout() {
        let mut buffer = Vec::new();
        write_tsv(&table(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "acc\tfiles\tn\textra");
        assert_eq!(lines[1], "SRX1\t[{\"@url\":\"u1\"}]\t\t");
        assert_eq!(lines[2], "SRX2\\tx\t\t\t5");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        let result = ResultSet::new(BTreeSet::from([2, 1]), vec![1, 2], table());

        let paths = write_results(&out, &result, true, true).unwrap();

        let ids = fs::read_to_string(paths.search_ids.unwrap()).unwrap();
        assert_eq!(ids, "1\n2\n");
        assert!(fs::read_to_string(&paths.table).unwrap().starts_with("acc\t"));

        let rows: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(paths.json.unwrap()).unwrap()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["extra"], json!(5));
    }

    #[test]
    fn test_search_ids_skipped_without_search() {
        let dir = tempfile::tempdir().unwrap();
        let result = ResultSet::new(BTreeSet::new(), vec![7], MetadataTable::new());

        let paths = write_results(dir.path(), &result, false, false).unwrap();

        assert!(paths.search_ids.is_none());
        assert!(!dir.path().join(SEARCH_IDS_FILE).exists());
        assert_eq!(fs::read_to_string(paths.table).unwrap(), "\n");
    }
}
