use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{Event, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::NiqueryError;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `<timestamp> - <LEVEL> - <message>` lines.
pub struct PlainFormat;

impl<S, N> FormatEvent<S, N> for PlainFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} - {} - ",
            chrono::Local::now().format(TIMESTAMP_FORMAT),
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

pub fn log_file_path(dir: &Path, command: &str) -> PathBuf {
    dir.join(format!("{}_{command}.log", env!("CARGO_PKG_NAME")))
}

/// Installs the global subscriber: stderr always, plus an appended log file
/// under `log_dir` when given. `RUST_LOG` overrides the default `info` level.
pub fn init_logging(
    log_dir: Option<&Path>,
    command: &str,
) -> Result<Option<PathBuf>, NiqueryError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .event_format(PlainFormat)
        .with_writer(std::io::stderr);

    let (file_layer, log_path) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|err| NiqueryError::Filesystem(err.to_string()))?;
            let path = log_file_path(dir, command);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|err| NiqueryError::Logging(format!("{}: {err}", path.display())))?;
            let layer = tracing_subscriber::fmt::layer()
                .event_format(PlainFormat)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| NiqueryError::Logging(err.to_string()))?;
    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_prefixed_with_package_name() {
        let path = log_file_path(Path::new("/tmp/logs"), "select");
        assert_eq!(path, PathBuf::from("/tmp/logs/niquery_select.log"));
    }
}
