use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub stage: String,
    pub completed: usize,
    pub total: usize,
    pub elapsed: Option<Duration>,
}

/// Receives progress from the coordinating thread of a batch step.
pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn event(&self, _event: ProgressEvent) {}
}

/// Logs progress through `tracing`, at most `steps` times per stage plus the final event.
pub struct LogProgress {
    steps: usize,
}

impl LogProgress {
    pub fn new(steps: usize) -> Self {
        Self {
            steps: steps.max(1),
        }
    }

    fn should_report(&self, event: &ProgressEvent) -> bool {
        if event.completed == event.total {
            return true;
        }
        let stride = (event.total / self.steps).max(1);
        event.completed % stride == 0
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(20)
    }
}

impl ProgressSink for LogProgress {
    fn event(&self, event: ProgressEvent) {
        if !self.should_report(&event) {
            return;
        }
        match event.elapsed {
            Some(elapsed) => tracing::info!(
                "{}: {}/{} ({} ms)",
                event.stage,
                event.completed,
                event.total,
                elapsed.as_millis()
            ),
            None => tracing::info!("{}: {}/{}", event.stage, event.completed, event.total),
        }
    }
}
