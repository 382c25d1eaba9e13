use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::NiqueryError;
use crate::header::DEFAULT_RANGE_BYTES;
use crate::pool::DEFAULT_MAX_WORKERS;
use crate::remote::RemoteSource;
use crate::table::separator_byte;

pub const DEFAULT_CONFIG_FILE: &str = "niquery.json";
pub const DEFAULT_REMOTE: &str = "s3://openneuro.org";
pub const TOKEN_ENV: &str = "NIQUERY_HTTP_TOKEN";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub max_workers: Option<usize>,
    #[serde(default)]
    pub separator: Option<char>,
    #[serde(default)]
    pub remote: Option<String>,
    #[serde(default)]
    pub range_bytes: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub http_token: Option<String>,
    #[serde(default)]
    pub selection: SelectionEntry,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SelectionEntry {
    #[serde(default)]
    pub contribution_threshold: Option<usize>,
    #[serde(default)]
    pub min_timepoints: Option<u64>,
    #[serde(default)]
    pub max_timepoints: Option<u64>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionParams {
    pub contribution_threshold: usize,
    pub min_timepoints: u64,
    pub max_timepoints: u64,
    pub seed: u64,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            contribution_threshold: 10,
            min_timepoints: 100,
            max_timepoints: 1000,
            seed: 1234,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub max_workers: usize,
    pub separator: char,
    pub remote: RemoteSource,
    pub range_bytes: u64,
    pub timeout: Duration,
    pub http_token: Option<String>,
    pub selection: SelectionParams,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `niquery.json` when no path is given. Only the default
    /// file may be absent, in which case built-in defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, NiqueryError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| NiqueryError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| NiqueryError::ConfigParse(err.to_string()))?
        };

        let mut resolved = Self::resolve_config(config)?;
        if resolved.http_token.is_none() {
            resolved.http_token = std::env::var(TOKEN_ENV)
                .ok()
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty());
        }
        Ok(resolved)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, NiqueryError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let max_workers = config.max_workers.unwrap_or(DEFAULT_MAX_WORKERS);
        if max_workers == 0 {
            return Err(NiqueryError::InvalidWorkers);
        }

        let separator = config.separator.unwrap_or(',');
        separator_byte(separator)?;

        let remote: RemoteSource = config
            .remote
            .as_deref()
            .unwrap_or(DEFAULT_REMOTE)
            .parse()?;

        let defaults = SelectionParams::default();
        let selection = SelectionParams {
            contribution_threshold: config
                .selection
                .contribution_threshold
                .unwrap_or(defaults.contribution_threshold),
            min_timepoints: config
                .selection
                .min_timepoints
                .unwrap_or(defaults.min_timepoints),
            max_timepoints: config
                .selection
                .max_timepoints
                .unwrap_or(defaults.max_timepoints),
            seed: config.selection.seed.unwrap_or(defaults.seed),
        };
        if selection.contribution_threshold == 0 {
            return Err(NiqueryError::InvalidThreshold(0));
        }

        Ok(ResolvedConfig {
            schema_version,
            max_workers,
            separator,
            remote,
            range_bytes: config.range_bytes.unwrap_or(DEFAULT_RANGE_BYTES).max(1),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(30)),
            http_token: config.http_token.filter(|token| !token.trim().is_empty()),
            selection,
        })
    }
}
