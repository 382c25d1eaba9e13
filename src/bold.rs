//! Identification of BOLD runs in per-dataset file listings.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Serialize;

use crate::attributes::{BOLD_SUFFIX_PATTERN, FILENAME};
use crate::error::NiqueryError;
use crate::pool::run_bounded;
use crate::progress::ProgressSink;
use crate::table::{Table, read_table};

const LISTING_EXTENSIONS: &[&str] = &["csv", "tsv"];

fn bold_regex() -> &'static Regex {
    static BOLD: OnceLock<Regex> = OnceLock::new();
    BOLD.get_or_init(|| Regex::new(BOLD_SUFFIX_PATTERN).expect("BOLD suffix pattern is valid"))
}

pub fn is_bold_filename(filename: &str) -> bool {
    bold_regex().is_match(filename)
}

/// Keeps the rows whose filename ends with `_bold.nii.gz`.
pub fn filter_bold_records(table: &Table) -> Table {
    table.filter(|record| record.get(FILENAME).is_some_and(is_bold_filename))
}

pub fn load_bold_records(path: &Path, separator: char) -> Result<Table, NiqueryError> {
    let table = read_table(path, separator)?;
    Ok(filter_bold_records(&table))
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingFailure {
    pub dataset_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct BoldIdentification {
    /// BOLD records per dataset, in dataset id order.
    pub datasets: BTreeMap<String, Table>,
    /// Datasets whose listing could not be loaded, in dataset id order.
    pub failures: Vec<ListingFailure>,
}

impl BoldIdentification {
    pub fn bold_count(&self) -> usize {
        self.datasets.values().map(Table::len).sum()
    }
}

/// Loads every listing and keeps its BOLD records. A listing that cannot be
/// read is reported in `failures` and does not stop the others.
pub fn identify_bold(
    listings: &BTreeMap<String, Utf8PathBuf>,
    separator: char,
    max_workers: usize,
    sink: &dyn ProgressSink,
) -> Result<BoldIdentification, NiqueryError> {
    let jobs: Vec<(&String, &Utf8PathBuf)> = listings.iter().collect();
    let outcomes = run_bounded(&jobs, max_workers, "Filtering BOLD files", sink, |(_, path)| {
        load_bold_records(path.as_std_path(), separator)
    })?;

    let mut identification = BoldIdentification::default();
    for ((dataset_id, _), outcome) in jobs.into_iter().zip(outcomes) {
        match outcome {
            Ok(table) => {
                identification.datasets.insert(dataset_id.clone(), table);
            }
            Err(err) => {
                tracing::warn!(dataset = dataset_id.as_str(), "skipping listing: {err}");
                identification.failures.push(ListingFailure {
                    dataset_id: dataset_id.clone(),
                    message: err.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "Found {} BOLD files across {} datasets ({} unreadable listings).",
        identification.bold_count(),
        identification.datasets.len(),
        identification.failures.len()
    );
    Ok(identification)
}

/// Maps each `<dataset id>.csv` / `<dataset id>.tsv` file in `dir` to its dataset id.
pub fn discover_listings(dir: &Utf8Path) -> Result<BTreeMap<String, Utf8PathBuf>, NiqueryError> {
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| NiqueryError::Filesystem(format!("read dir {dir}: {err}")))?;

    let mut listings = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|err| NiqueryError::Filesystem(err.to_string()))?;
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            tracing::warn!("skipping non-utf8 listing path {}", entry.path().display());
            continue;
        };
        if !path.is_file() {
            continue;
        }
        let (Some(stem), Some(ext)) = (path.file_stem(), path.extension()) else {
            continue;
        };
        if LISTING_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            listings.insert(stem.to_string(), path.clone());
        }
    }
    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Record;

    #[test]
    fn suffix_is_anchored_and_case_sensitive() {
        assert!(is_bold_filename("sub-01_task-rest_bold.nii.gz"));
        assert!(!is_bold_filename("sub-01_task-rest_bold.nii.gz.bak"));
        assert!(!is_bold_filename("sub-01_task-rest_BOLD.nii.gz"));
        assert!(!is_bold_filename("sub-01_task-rest_bold.nii"));
        assert!(!is_bold_filename("sub-01_task-rest_boldXnii.gz"));
    }

    #[test]
    fn filter_skips_rows_without_filename() {
        let table = Table::from_records(vec![
            Record::from_pairs([(FILENAME, "a_bold.nii.gz")]),
            Record::from_pairs([("other", "b_bold.nii.gz")]),
            Record::from_pairs([(FILENAME, "a_T1w.nii.gz")]),
        ]);
        let bold = filter_bold_records(&table);
        assert_eq!(bold.len(), 1);
        assert_eq!(bold.columns(), table.columns());
    }
}
