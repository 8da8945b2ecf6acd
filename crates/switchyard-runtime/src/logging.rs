//! Logging setup on top of `tracing-subscriber`.
//!
//! Every dispatch runs inside a `request` span carrying the method and path;
//! enable span close events to get one line per finished request:
//!
//! ```rust,ignore
//! use switchyard_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::new()
//!     .directive("switchyard_framework=debug")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```
//!
//! Or from configuration:
//!
//! ```rust,ignore
//! let config = switchyard_runtime::config::load_config()?;
//! switchyard_runtime::logging::init_from_config(&config.logging);
//! ```

use std::path::{Path, PathBuf};

use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

/// Which span lifecycle transitions produce a log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Opening and closing of each span. The close line of a `request` span
    /// carries its busy and idle time.
    pub const LIFECYCLE: Self = Self {
        new: true,
        close: true,
        ..Self::NONE
    };

    /// Everything, including one enter/exit pair per poll.
    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    fn to_fmt_span(self) -> FmtSpan {
        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .fold(FmtSpan::NONE, |acc, (_, flag)| acc | flag)
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(events: &SpanEventConfig) -> Self {
        Self {
            new: events.new,
            enter: events.enter,
            exit: events.exit,
            close: events.close,
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Minutely => Rotation::MINUTELY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the subscriber described by `config`, unless one is already
/// installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// Describes the global subscriber: filter, output format and destination.
#[derive(Debug)]
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    show_target: bool,
    show_thread_ids: bool,
    show_source: bool,
    file_path: Option<PathBuf>,
    rotation: LogRotation,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// `info` level, compact lines on stdout.
    pub fn new() -> Self {
        Self {
            level: tracing::Level::INFO,
            directives: Vec::new(),
            span_events: SpanEvents::NONE,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            show_target: true,
            show_thread_ids: false,
            show_source: false,
            file_path: None,
            rotation: LogRotation::Never,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.to_tracing_level(),
            directives: config
                .filters
                .iter()
                .map(|(target, level)| format!("{target}={level}"))
                .collect(),
            span_events: (&config.span_events).into(),
            format: config.format,
            output: config.output,
            show_thread_ids: config.thread_ids,
            show_source: config.file_location,
            file_path: config.file_path.clone(),
            rotation: config.rotation,
            ..Self::new()
        }
    }

    pub fn level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `switchyard_framework=trace`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn thread_ids(mut self, show: bool) -> Self {
        self.show_thread_ids = show;
        self
    }

    /// File name and line number of each event.
    pub fn source_location(mut self, show: bool) -> Self {
        self.show_source = show;
        self
    }

    /// Writes to `path`, rotated per [`LoggingBuilder::rotation`].
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self.output = LogOutput::File;
        self
    }

    pub fn rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// `RUST_LOG` when set, otherwise the level; directives are added on top
    /// and unparsable ones are reported and skipped.
    fn env_filter(&self) -> EnvFilter {
        let fallback = self.level.as_str().to_ascii_lowercase();
        self.directives.iter().fold(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
            |filter, raw| match raw.parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(e) => {
                    eprintln!("Ignoring invalid log directive {raw:?}: {e}");
                    filter
                }
            },
        )
    }

    fn effective_format(&self) -> LogFormat {
        if self.format == LogFormat::Json && !cfg!(feature = "json-log") {
            LogFormat::Full
        } else {
            self.format
        }
    }

    /// The writer for the configured output, plus a warning to emit once the
    /// subscriber is up when the file could not be used.
    fn writer(&self) -> (BoxMakeWriter, Option<String>) {
        match (self.output, &self.file_path) {
            (LogOutput::Stdout, _) => (BoxMakeWriter::new(std::io::stdout), None),
            (LogOutput::Stderr, _) => (BoxMakeWriter::new(std::io::stderr), None),
            (LogOutput::File, None) => (
                BoxMakeWriter::new(std::io::stdout),
                Some("file output without a file path, logging to stdout".to_string()),
            ),
            (LogOutput::File, Some(path)) => {
                let dir = path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let prefix = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "switchyard.log".to_string());
                match RollingFileAppender::builder()
                    .rotation(self.rotation.into())
                    .filename_prefix(prefix)
                    .build(dir)
                {
                    Ok(appender) => (BoxMakeWriter::new(appender), None),
                    Err(e) => (
                        BoxMakeWriter::new(std::io::stdout),
                        Some(format!("cannot open {}: {e}, logging to stdout", path.display())),
                    ),
                }
            }
        }
    }

    fn fmt_layer(&self, format: LogFormat, writer: BoxMakeWriter) -> BoxedLayer {
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(self.span_events.to_fmt_span())
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_file(self.show_source)
            .with_line_number(self.show_source);
        match format {
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            _ => layer.boxed(),
        }
    }

    /// Installs the subscriber, ignoring an already installed one.
    pub fn init(self) {
        let _ = self.try_init();
    }

    pub fn try_init(self) -> Result<(), TryInitError> {
        let format = self.effective_format();
        let (writer, fallback) = self.writer();

        tracing_subscriber::registry()
            .with(self.fmt_layer(format, writer))
            .with(self.env_filter())
            .try_init()?;

        if let Some(reason) = fallback {
            warn!("{reason}");
        }
        if format != self.format {
            warn!("JSON log format requires the `json-log` feature, using full format");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_from_config() {
        let mut config = LoggingConfig {
            level: LogLevel::Debug,
            thread_ids: true,
            file_location: true,
            span_events: SpanEventConfig {
                close: true,
                ..Default::default()
            },
            ..Default::default()
        };
        config
            .filters
            .insert("switchyard_framework".into(), LogLevel::Trace);

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, tracing::Level::DEBUG);
        assert!(builder.show_thread_ids);
        assert!(builder.show_source);
        assert!(builder.show_target);
        assert_eq!(
            builder.span_events,
            SpanEvents {
                close: true,
                ..SpanEvents::NONE
            }
        );
        assert_eq!(builder.directives, vec!["switchyard_framework=trace"]);
    }

    #[test]
    fn test_directives_accumulate() {
        let builder = LoggingBuilder::new()
            .level(tracing::Level::WARN)
            .directive("switchyard_framework=trace")
            .directive(String::from("hyper=off"));
        assert_eq!(builder.level, tracing::Level::WARN);
        assert_eq!(builder.directives.len(), 2);
    }

    #[test]
    fn test_file_path_implies_file_output() {
        let builder = LoggingBuilder::new().file_path("logs/app.log");
        assert_eq!(builder.output, LogOutput::File);
    }

    #[test]
    fn test_span_event_flags() {
        assert_eq!(
            SpanEvents::LIFECYCLE.to_fmt_span(),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
        assert_eq!(SpanEvents::NONE.to_fmt_span(), FmtSpan::NONE);
        assert_eq!(SpanEvents::FULL.to_fmt_span(), FmtSpan::FULL);
    }

    #[cfg(not(feature = "json-log"))]
    #[test]
    fn test_json_falls_back_without_feature() {
        let builder = LoggingBuilder::new().format(LogFormat::Json);
        assert_eq!(builder.effective_format(), LogFormat::Full);
    }
}
