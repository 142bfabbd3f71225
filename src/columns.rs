//! Common-column projection for SRA experiment packages.
//!
//! Keeps the well-known flattened paths under readable names and adds a
//! `Download Links` column with the URL of every run file.

use serde_json::{Map, Value};

use crate::models::{FetchRecord, MetadataTable};

/// Flattened path to display name. Several instrument paths share one name;
/// the first one present in a row wins.
pub const COLUMN_RENAME_MAP: &[(&str, &str)] = &[
    ("EXPERIMENT.@accession", "Experiment Accession"),
    ("EXPERIMENT.@alias", "Experiment Alias"),
    ("EXPERIMENT.TITLE", "Experiment Title"),
    ("EXPERIMENT.IDENTIFIERS.PRIMARY_ID", "Experiment ID"),
    ("STUDY.@accession", "Study Accession"),
    ("STUDY.DESCRIPTOR.STUDY_TITLE", "Study Title"),
    ("STUDY.DESCRIPTOR.STUDY_ABSTRACT", "Study Abstract"),
    ("STUDY.IDENTIFIERS.EXTERNAL_ID.#text", "BioProject ID"),
    ("SAMPLE.@accession", "Sample Accession"),
    ("SAMPLE.@alias", "Sample Alias"),
    ("SAMPLE.SAMPLE_NAME.SCIENTIFIC_NAME", "Scientific Name"),
    ("SAMPLE.SAMPLE_NAME.TAXON_ID", "Taxon ID"),
    ("SAMPLE.DESCRIPTION", "Sample Description"),
    ("EXPERIMENT.DESIGN.LIBRARY_DESCRIPTOR.LIBRARY_NAME", "Library Name"),
    ("EXPERIMENT.DESIGN.LIBRARY_DESCRIPTOR.LIBRARY_STRATEGY", "Library Strategy"),
    ("EXPERIMENT.DESIGN.LIBRARY_DESCRIPTOR.LIBRARY_SOURCE", "Library Source"),
    ("EXPERIMENT.DESIGN.LIBRARY_DESCRIPTOR.LIBRARY_SELECTION", "Library Selection"),
    ("EXPERIMENT.DESIGN.LIBRARY_DESCRIPTOR.LIBRARY_LAYOUT", "Library Layout"),
    ("PLATFORM.OXFORD_NANOPORE.INSTRUMENT_MODEL", "Instrument Model"),
    ("PLATFORM.ILLUMINA.INSTRUMENT_MODEL", "Instrument Model"),
    ("PLATFORM.PACBIO_SMRT.INSTRUMENT_MODEL", "Instrument Model"),
    ("RUN_SET.RUN.@accession", "Run Accession"),
    ("RUN_SET.RUN.@alias", "Run Alias"),
    ("RUN_SET.RUN.@total_spots", "Total Spots"),
    ("RUN_SET.RUN.@total_bases", "Total Bases"),
    ("RUN_SET.RUN.@size", "File Size (bytes)"),
];

pub const DOWNLOAD_LINKS: &str = "Download Links";

const SRA_FILE: &str = "RUN_SET.RUN.SRAFiles.SRAFile";
const SRA_FILE_URL: &str = "RUN_SET.RUN.SRAFiles.SRAFile.@url";

/// URLs of the run files in one row.
///
/// Several files stay a list under [`SRA_FILE`]; a single file has been
/// flattened into its own `@url` column.
pub fn download_links(row: &FetchRecord) -> Vec<String> {
    let url_of = |file: &Value| file.get("@url").and_then(Value::as_str).map(str::to_string);

    match row.get(SRA_FILE) {
        Some(Value::Array(files)) => files.iter().filter_map(url_of).collect(),
        Some(file @ Value::Object(_)) => url_of(file).into_iter().collect(),
        _ => row
            .get(SRA_FILE_URL)
            .and_then(Value::as_str)
            .map(|url| vec![url.to_string()])
            .unwrap_or_default(),
    }
}

/// Project a table onto the common columns.
///
/// Only mapped paths that occur somewhere in the table are kept, in map
/// order. Every row gets every kept column so the layout is stable.
pub fn select_common_columns(table: &MetadataTable) -> MetadataTable {
    let mut kept: Vec<(&str, Vec<&str>)> = Vec::new();
    for &(source, target) in COLUMN_RENAME_MAP {
        if !table.columns().iter().any(|c| c == source) {
            continue;
        }
        match kept.iter_mut().find(|(name, _)| *name == target) {
            Some((_, sources)) => sources.push(source),
            None => kept.push((target, vec![source])),
        }
    }

    let rows = table.rows().iter().map(|row| {
        let mut projected = Map::new();
        for (target, sources) in &kept {
            let value = sources
                .iter()
                .find_map(|source| row.get(*source).filter(|v| !v.is_null()))
                .cloned()
                .unwrap_or(Value::Null);
            projected.insert(target.to_string(), value);
        }
        let links = download_links(row).into_iter().map(Value::String).collect();
        projected.insert(DOWNLOAD_LINKS.to_string(), Value::Array(links));
        projected
    });

    MetadataTable::from_rows(rows)
}
