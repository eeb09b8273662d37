//! Layer construction for console and file output

use std::fs::{self, File};
use std::str::FromStr;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{Layer, Registry};

use crate::config::{ConsoleConfig, FileConfig, JsonlConfig, RotationStrategy};
use crate::LoggingError;

/// A type-erased layer stacked directly on the registry
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Console layer, pretty or JSONL depending on configuration
///
/// A console `level` narrows console output below the global filter.
pub fn console_layer(console: &ConsoleConfig, jsonl: &JsonlConfig) -> BoxedLayer {
    let filter = level_filter(console.level.as_deref());

    if console.pretty {
        tracing_subscriber::fmt::layer()
            .with_ansi(console.ansi)
            .with_target(true)
            .with_filter(filter)
            .boxed()
    } else {
        jsonl_layer(std::io::stdout, jsonl)
            .with_filter(filter)
            .boxed()
    }
}

/// Create a JSONL formatting layer writing to `writer`
pub fn jsonl_layer<W>(writer: W, jsonl: &JsonlConfig) -> BoxedLayer
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(jsonl.include_current_span)
        .with_span_list(jsonl.include_spans)
        .flatten_event(jsonl.flatten_events)
        .with_file(jsonl.include_location)
        .with_line_number(jsonl.include_location)
        .with_thread_ids(jsonl.include_thread_info)
        .with_thread_names(jsonl.include_thread_info)
        .with_writer(writer)
        .boxed()
}

/// Open the non-blocking writer for file output
///
/// `Never` truncates a single `<prefix>.log`; the other strategies roll
/// `<prefix>.<date>.log` files and prune beyond `max_files`.
pub fn file_writer(file: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&file.directory)?;

    let rotation = match file.rotation {
        RotationStrategy::Never => {
            let path = file.directory.join(format!("{}.log", file.prefix));
            let handle = File::create(&path)?;
            return Ok(tracing_appender::non_blocking(handle));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(file.prefix.clone())
        .filename_suffix("log");
    if let Some(max) = file.max_files {
        builder = builder.max_log_files(max);
    }

    let appender = builder.build(&file.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Parse a level name, falling back to allowing everything
fn level_filter(level: Option<&str>) -> LevelFilter {
    match level {
        Some(name) => LevelFilter::from_str(name).unwrap_or_else(|_| {
            eprintln!("Warning: unknown console level '{}', using trace", name);
            LevelFilter::TRACE
        }),
        None => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_level_filter_parsing() {
        assert_eq!(level_filter(Some("warn")), LevelFilter::WARN);
        assert_eq!(level_filter(Some("DEBUG")), LevelFilter::DEBUG);
        assert_eq!(level_filter(Some("loud")), LevelFilter::TRACE);
        assert_eq!(level_filter(None), LevelFilter::TRACE);
    }

    #[test]
    fn test_never_rotation_creates_single_file() {
        let temp = TempDir::new().unwrap();
        let config = FileConfig {
            directory: temp.path().join("diag"),
            prefix: "svc".to_string(),
            rotation: RotationStrategy::Never,
            max_files: None,
        };

        let (_writer, _guard) = file_writer(&config).unwrap();
        assert!(temp.path().join("diag").join("svc.log").exists());
    }

    #[test]
    fn test_daily_rotation_creates_directory() {
        let temp = TempDir::new().unwrap();
        let config = FileConfig {
            directory: temp.path().join("rolling"),
            ..FileConfig::default()
        };

        let (_writer, _guard) = file_writer(&config).unwrap();
        assert!(temp.path().join("rolling").is_dir());
    }

    #[test]
    fn test_file_writer_reports_blocked_directory() {
        let temp = TempDir::new().unwrap();
        let blocked = temp.path().join("blocked");
        fs::write(&blocked, b"x").unwrap();

        let config = FileConfig {
            directory: blocked,
            ..FileConfig::default()
        };
        assert!(matches!(file_writer(&config), Err(LoggingError::Io(_))));
    }
}
