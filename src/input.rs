//! Reading terms and IDs from plain-text files.

use std::fs;
use std::path::Path;

use crate::error::FetchError;

fn read(path: &Path) -> Result<String, FetchError> {
    fs::read_to_string(path)
        .map_err(|e| FetchError::Config(format!("cannot read {}: {}", path.display(), e)))
}

/// Search terms, one per line. Blank lines are dropped.
pub fn parse_terms(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Integer IDs, one per line. Blank lines are dropped; anything else that is
/// not an unsigned integer is rejected with its 1-based line number.
pub fn parse_ids(text: &str) -> Result<Vec<u64>, FetchError> {
    let mut ids = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let id = line.parse::<u64>().map_err(|_| {
            FetchError::Config(format!("line {}: {:?} is not a valid ID", index + 1, line))
        })?;
        ids.push(id);
    }
    Ok(ids)
}

pub fn read_terms_file(path: &Path) -> Result<Vec<String>, FetchError> {
    let terms = parse_terms(&read(path)?);
    tracing::debug!(path = %path.display(), count = terms.len(), "terms loaded");
    Ok(terms)
}

pub fn read_ids_file(path: &Path) -> Result<Vec<u64>, FetchError> {
    let ids = parse_ids(&read(path)?).map_err(|e| match e {
        FetchError::Config(msg) => FetchError::Config(format!("{}: {}", path.display(), msg)),
        other => other,
    })?;
    tracing::debug!(path = %path.display(), count = ids.len(), "ids loaded");
    Ok(ids)
}
