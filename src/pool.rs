//! Bounded worker pool shared by the batch steps.
//!
//! Tasks run on a rayon pool of `max_workers` threads. Outcomes travel back over
//! a channel to the calling thread, which is the only writer of the result slots
//! and the only caller of the progress sink.

use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use rayon::prelude::*;

use crate::error::NiqueryError;
use crate::progress::{ProgressEvent, ProgressSink};

pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Runs `task` once per item and returns the outcomes in submission order.
pub fn run_bounded<T, R, F>(
    items: &[T],
    max_workers: usize,
    stage: &str,
    sink: &dyn ProgressSink,
    task: F,
) -> Result<Vec<R>, NiqueryError>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if max_workers == 0 {
        return Err(NiqueryError::InvalidWorkers);
    }
    let total = items.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_workers)
        .thread_name(|index| format!("niquery-worker-{index}"))
        .build()
        .map_err(|err| NiqueryError::WorkerPool(err.to_string()))?;

    let started = Instant::now();
    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
    let (tx, rx) = mpsc::channel::<(usize, R)>();

    thread::scope(|scope| {
        let pool = &pool;
        let task = &task;
        scope.spawn(move || {
            pool.install(|| {
                items
                    .par_iter()
                    .enumerate()
                    .for_each_with(tx, |tx, (index, item)| {
                        let _ = tx.send((index, task(item)));
                    });
            });
        });

        for (completed, (index, outcome)) in rx.iter().enumerate() {
            slots[index] = Some(outcome);
            sink.event(ProgressEvent {
                stage: stage.to_string(),
                completed: completed + 1,
                total,
                elapsed: Some(started.elapsed()),
            });
        }
    });

    Ok(slots.into_iter().flatten().collect())
}
