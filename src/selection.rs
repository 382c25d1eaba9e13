//! Seeded selection of BOLD runs under timepoint and per-dataset contribution constraints.
//!
//! Randomness comes from ChaCha8 generators seeded with the caller's seed, so a
//! given input and seed always yield the same selection. The permutation differs
//! from other implementations of the same procedure.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand::seq::index::sample;
use rand_chacha::ChaCha8Rng;

use crate::attributes::{DATASETID, REMOTE, VOLS};
use crate::error::NiqueryError;
use crate::table::{Record, Table};

/// Parses a timepoint count, accepting integral floats such as `240.0`.
pub fn parse_timepoints(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(count) = value.parse::<u64>() {
        return Some(count);
    }
    let float = value.parse::<f64>().ok()?;
    (float.is_finite() && float >= 0.0 && float.fract() == 0.0).then_some(float as u64)
}

/// Keeps runs whose timepoint count lies in `[min_timepoints, max_timepoints]`.
pub fn filter_on_timepoint_count(table: &Table, min_timepoints: u64, max_timepoints: u64) -> Table {
    table.filter(|record| {
        record
            .get(VOLS)
            .and_then(parse_timepoints)
            .is_some_and(|count| (min_timepoints..=max_timepoints).contains(&count))
    })
}

/// Caps every dataset at `contribution_threshold` runs.
///
/// Datasets with at least `contribution_threshold` runs are sampled without
/// replacement; smaller ones are kept whole. Groups come out in dataset id order
/// and columns are reordered to `remote`, `dataset`, then the rest.
pub fn filter_on_run_contribution(
    table: &Table,
    contribution_threshold: usize,
    seed: u64,
) -> Result<Table, NiqueryError> {
    if contribution_threshold == 0 {
        return Err(NiqueryError::InvalidThreshold(contribution_threshold));
    }

    let mut groups: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
    let mut orphans = 0usize;
    for record in table.records() {
        match record.get(DATASETID) {
            Some(dataset_id) if !dataset_id.is_empty() => {
                groups.entry(dataset_id).or_default().push(record)
            }
            _ => orphans += 1,
        }
    }
    if orphans > 0 {
        tracing::warn!("Dropped {orphans} runs without a dataset id.");
    }

    let mut selected = Vec::new();
    for (dataset_id, runs) in groups {
        let kept: Vec<&Record> = if runs.len() >= contribution_threshold {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            sample(&mut rng, runs.len(), contribution_threshold)
                .into_iter()
                .map(|index| runs[index])
                .collect()
        } else {
            runs
        };
        selected.extend(kept.into_iter().map(|record| {
            let mut record = record.clone();
            record.set(DATASETID, dataset_id);
            record
        }));
    }

    let mut result = Table::with_records(table.columns().to_vec(), selected);
    result.move_to_front(&[REMOTE, DATASETID]);
    Ok(result)
}

/// Applies the timepoint range, then the contribution cap.
pub fn filter_runs(
    table: &Table,
    contribution_threshold: usize,
    min_timepoints: u64,
    max_timepoints: u64,
    seed: u64,
) -> Result<Table, NiqueryError> {
    let in_range = filter_on_timepoint_count(table, min_timepoints, max_timepoints);
    tracing::info!(
        "Kept {}/{} runs with [{min_timepoints}, {max_timepoints}] timepoints.",
        in_range.len(),
        table.len()
    );
    filter_on_run_contribution(&in_range, contribution_threshold, seed)
}

/// Shuffles the runs with `seed` and selects the ones meeting the timepoint and
/// contribution constraints.
///
/// `contribution_threshold` must be positive.
pub fn select_runs(
    table: &Table,
    contribution_threshold: usize,
    min_timepoints: u64,
    max_timepoints: u64,
    seed: u64,
) -> Result<Table, NiqueryError> {
    if contribution_threshold == 0 {
        return Err(NiqueryError::InvalidThreshold(contribution_threshold));
    }

    let mut records = table.records().to_vec();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    records.shuffle(&mut rng);
    let shuffled = Table::with_records(table.columns().to_vec(), records);

    let selected = filter_runs(
        &shuffled,
        contribution_threshold,
        min_timepoints,
        max_timepoints,
        seed,
    )?;
    tracing::info!("Selected {}/{} BOLD runs.", selected.len(), table.len());
    Ok(selected)
}
