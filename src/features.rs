//! Bulk timepoint extraction for BOLD file records.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::attributes::{DATASETID, FULLPATH, VOLS};
use crate::bold::ListingFailure;
use crate::error::NiqueryError;
use crate::pool::run_bounded;
use crate::progress::ProgressSink;
use crate::remote::{RemoteSource, TimepointReader};
use crate::table::{Record, Table, read_table};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FailedRecord {
    pub dataset_id: String,
    pub full_path: String,
}

#[derive(Debug, Clone, Default)]
pub struct FeatureExtraction {
    /// Every input dataset, in dataset id order, with its successfully annotated records.
    pub successes: BTreeMap<String, Vec<Record>>,
    /// Sorted by dataset id, then full path.
    pub failures: Vec<FailedRecord>,
}

impl FeatureExtraction {
    pub fn success_count(&self) -> usize {
        self.successes.values().map(Vec::len).sum()
    }

    /// Flattens the successes into one run table, ordered by dataset id.
    pub fn into_run_table(self) -> Table {
        Table::from_records(self.successes.into_values().flatten().collect())
    }

    pub fn failures_table(&self) -> Table {
        let mut table = Table::new(vec![DATASETID.to_string(), FULLPATH.to_string()]);
        for failure in &self.failures {
            table.push(Record::from_pairs([
                (DATASETID, failure.dataset_id.as_str()),
                (FULLPATH, failure.full_path.as_str()),
            ]));
        }
        table
    }
}

struct WorkItem<'a> {
    dataset_id: &'a str,
    record: &'a Record,
}

/// Fetches the timepoint count of every record and splits the records into
/// successes and failures. A failing record never affects the others.
pub fn extract_features(
    datasets: &BTreeMap<String, Table>,
    source: &RemoteSource,
    reader: &dyn TimepointReader,
    max_workers: usize,
    sink: &dyn ProgressSink,
) -> Result<FeatureExtraction, NiqueryError> {
    let items: Vec<WorkItem<'_>> = datasets
        .iter()
        .flat_map(|(dataset_id, table)| {
            table.records().iter().map(move |record| WorkItem {
                dataset_id: dataset_id.as_str(),
                record,
            })
        })
        .collect();

    let outcomes = run_bounded(
        &items,
        max_workers,
        "Extracting BOLD features",
        sink,
        |item| -> Result<u64, NiqueryError> {
            let full_path = item
                .record
                .get(FULLPATH)
                .ok_or_else(|| NiqueryError::MissingColumn(FULLPATH.to_string()))?;
            let location = source.locate(item.dataset_id, full_path);
            reader.fetch_timepoints(&location)
        },
    )?;

    let mut extraction = FeatureExtraction {
        successes: datasets
            .keys()
            .map(|dataset_id| (dataset_id.clone(), Vec::new()))
            .collect(),
        failures: Vec::new(),
    };

    for (item, outcome) in items.iter().zip(outcomes) {
        match outcome {
            Ok(timepoints) => {
                let mut record = item.record.clone();
                record.set(DATASETID, item.dataset_id);
                record.set(VOLS, timepoints.to_string());
                if let Some(runs) = extraction.successes.get_mut(item.dataset_id) {
                    runs.push(record);
                }
            }
            Err(err) => {
                let full_path = item.record.get(FULLPATH).unwrap_or_default().to_string();
                tracing::warn!(
                    dataset = item.dataset_id,
                    path = full_path.as_str(),
                    "timepoint extraction failed: {err}"
                );
                extraction.failures.push(FailedRecord {
                    dataset_id: item.dataset_id.to_string(),
                    full_path,
                });
            }
        }
    }
    extraction.failures.sort();

    tracing::info!(
        "Extracted features for {}/{} BOLD runs ({} failures).",
        extraction.success_count(),
        items.len(),
        extraction.failures.len()
    );
    Ok(extraction)
}

/// Reads the BOLD listing of every dataset. A listing that cannot be read is
/// reported as a failure and left out of the returned tables.
pub fn load_listings(
    listings: &BTreeMap<String, Utf8PathBuf>,
    separator: char,
) -> (BTreeMap<String, Table>, Vec<ListingFailure>) {
    let mut datasets = BTreeMap::new();
    let mut failures = Vec::new();
    for (dataset_id, path) in listings {
        match read_table(path.as_std_path(), separator) {
            Ok(table) => {
                datasets.insert(dataset_id.clone(), table);
            }
            Err(err) => {
                tracing::warn!(dataset = dataset_id.as_str(), "skipping listing: {err}");
                failures.push(ListingFailure {
                    dataset_id: dataset_id.clone(),
                    message: err.to_string(),
                });
            }
        }
    }
    (datasets, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;
    use crate::remote::RemoteLocation;

    struct FixedReader;

    impl TimepointReader for FixedReader {
        fn fetch_timepoints(&self, location: &RemoteLocation) -> Result<u64, NiqueryError> {
            match location {
                RemoteLocation::Object { key, .. } if key.ends_with("bad.nii.gz") => {
                    Err(NiqueryError::Decode("truncated".to_string()))
                }
                _ => Ok(240),
            }
        }
    }

    #[test]
    fn record_without_path_is_a_failure() {
        let mut datasets = BTreeMap::new();
        datasets.insert(
            "ds9".to_string(),
            Table::from_records(vec![
                Record::from_pairs([("filename", "x_bold.nii.gz")]),
                Record::from_pairs([(FULLPATH, "sub-01/func/ok_bold.nii.gz")]),
            ]),
        );
        let source: RemoteSource = "s3://bucket".parse().unwrap();
        let out = extract_features(&datasets, &source, &FixedReader, 2, &NoopProgress).unwrap();
        assert_eq!(out.successes["ds9"].len(), 1);
        assert_eq!(
            out.failures,
            vec![FailedRecord {
                dataset_id: "ds9".to_string(),
                full_path: String::new(),
            }]
        );
    }

    #[test]
    fn run_table_carries_dataset_and_vols() {
        let mut datasets = BTreeMap::new();
        datasets.insert(
            "ds2".to_string(),
            Table::from_records(vec![Record::from_pairs([(FULLPATH, "b_bold.nii.gz")])]),
        );
        datasets.insert(
            "ds1".to_string(),
            Table::from_records(vec![
                Record::from_pairs([(FULLPATH, "a_bold.nii.gz")]),
                Record::from_pairs([(FULLPATH, "bad.nii.gz")]),
            ]),
        );
        let source: RemoteSource = "s3://bucket".parse().unwrap();
        let out = extract_features(&datasets, &source, &FixedReader, 4, &NoopProgress).unwrap();
        let failures = out.failures_table();
        assert_eq!(failures.len(), 1);

        let table = out.into_run_table();
        let datasets: Vec<_> = table.column_values(DATASETID).flatten().collect();
        assert_eq!(datasets, vec!["ds1", "ds2"]);
        assert!(table.column_values(VOLS).all(|v| v == Some("240")));
    }
}
