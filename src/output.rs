use std::io::{self, Write};

use serde::Serialize;

use crate::bold::{BoldIdentification, ListingFailure};
use crate::features::{FailedRecord, FeatureExtraction};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

/// Outcome of one curation step, as reported to the user.
#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub step: String,
    pub input_rows: usize,
    pub output_rows: usize,
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_records: Vec<FailedRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_listings: Vec<ListingFailure>,
}

impl StepSummary {
    pub fn new(step: &str, input_rows: usize, output_rows: usize) -> Self {
        Self {
            step: step.to_string(),
            input_rows,
            output_rows,
            output: None,
            failed_records: Vec::new(),
            failed_listings: Vec::new(),
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn from_bold(identification: &BoldIdentification, listings: usize) -> Self {
        let mut summary = Self::new("bold", listings, identification.bold_count());
        summary.failed_listings = identification.failures.clone();
        summary
    }

    pub fn from_features(extraction: &FeatureExtraction, input_rows: usize) -> Self {
        let mut summary = Self::new("features", input_rows, extraction.success_count());
        summary.failed_records = extraction.failures.clone();
        summary
    }

    pub fn failure_count(&self) -> usize {
        self.failed_records.len() + self.failed_listings.len()
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &StepSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub fn print_summary(summary: &StepSummary, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Json => JsonOutput::print_summary(summary),
        OutputMode::Human => {
            let mut stdout = io::stdout();
            write!(
                stdout,
                "{}: {} -> {} rows",
                summary.step, summary.input_rows, summary.output_rows
            )?;
            if summary.failure_count() > 0 {
                write!(stdout, ", {} failures", summary.failure_count())?;
            }
            if let Some(output) = &summary.output {
                write!(stdout, " ({output})")?;
            }
            writeln!(stdout)
        }
    }
}
