//! Logging initialisation via tracing-subscriber.
//!
//! [`Logger::install`] sets the global subscriber once. Both the level filter
//! and the output layer sit behind reload handles, so later calls to
//! [`Logger::apply_spec`] and [`Logger::configure_output`] replace the active
//! configuration in place instead of stacking a second subscriber.

use std::fs::OpenOptions;
use std::sync::{Mutex, RwLock};

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, reload};

use crate::config::LogSink;
use crate::error::AppError;

use super::logspec::LoggingSpec;

type FilterLayer = reload::Layer<EnvFilter, Registry>;
type Filtered = Layered<FilterLayer, Registry>;
type OutputLayer = Box<dyn Layer<Filtered> + Send + Sync>;
type PeerSubscriber = Layered<reload::Layer<OutputLayer, Filtered>, Filtered>;

/// Line format of the output layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

impl LogFormat {
    /// Unknown names fall back to [`LogFormat::Full`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Self::Compact,
            _ => Self::Full,
        }
    }
}

/// Handle to the process-wide logging backend.
pub struct Logger {
    filter: reload::Handle<EnvFilter, Registry>,
    output: reload::Handle<OutputLayer, Filtered>,
    installed: bool,
    active: RwLock<LoggingSpec>,
    startup: LoggingSpec,
}

impl Logger {
    /// Install the global subscriber with `spec`, full format, on stderr.
    ///
    /// Never fails: if another subscriber already owns the process the
    /// returned logger is detached and reconfiguration becomes a no-op.
    pub fn install(spec: &LoggingSpec) -> Self {
        let (mut logger, subscriber) = Self::build(spec);
        logger.installed = subscriber.try_init().is_ok();
        logger.report_rejected(spec);
        logger
    }

    /// The subscriber and its handles, not yet registered anywhere.
    fn build(spec: &LoggingSpec) -> (Self, PeerSubscriber) {
        let (filter_layer, filter) = reload::Layer::new(spec.to_env_filter());
        let initial = build_output(LogFormat::Full, BoxMakeWriter::new(std::io::stderr));
        let (output_layer, output) = reload::Layer::new(initial);

        let subscriber = tracing_subscriber::registry()
            .with(filter_layer)
            .with(output_layer);

        let logger = Self {
            filter,
            output,
            installed: false,
            active: RwLock::new(spec.clone()),
            startup: spec.clone(),
        };
        (logger, subscriber)
    }

    /// Whether this logger owns the global subscriber.
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Replace the active level filter.
    pub fn apply_spec(&self, spec: &LoggingSpec) {
        if let Err(e) = self.filter.reload(spec.to_env_filter()) {
            tracing::debug!(error = %e, "logging filter not reloaded");
        }
        if let Ok(mut active) = self.active.write() {
            *active = spec.clone();
        }
        self.report_rejected(spec);
    }

    /// Replace the output format and sink.
    ///
    /// On error the previous output stays in place.
    pub fn configure_output(&self, format: LogFormat, sink: &LogSink) -> Result<(), AppError> {
        let writer = match sink {
            LogSink::Stderr => BoxMakeWriter::new(std::io::stderr),
            LogSink::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogSink::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| {
                        AppError::Logger(format!(
                            "failed to open log file '{}': {e}",
                            path.display()
                        ))
                    })?;
                BoxMakeWriter::new(Mutex::new(file))
            }
        };

        self.output
            .reload(build_output(format, writer))
            .map_err(|e| AppError::Logger(format!("failed to reload output: {e}")))
    }

    /// Spec currently in force.
    pub fn active_spec(&self) -> LoggingSpec {
        self.active
            .read()
            .map(|spec| spec.clone())
            .unwrap_or_else(|_| self.startup.clone())
    }

    /// Spec resolved at bootstrap.
    pub fn startup_spec(&self) -> &LoggingSpec {
        &self.startup
    }

    fn report_rejected(&self, spec: &LoggingSpec) {
        if !spec.rejected().is_empty() {
            tracing::warn!(
                rejected = %spec.rejected().join(", "),
                "ignoring malformed logging spec segments"
            );
        }
    }
}

fn build_output(format: LogFormat, writer: BoxMakeWriter) -> OutputLayer {
    let layer = fmt::layer().with_writer(writer);
    match format {
        LogFormat::Full => layer.boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn format_names_parse() {
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("FULL"), LogFormat::Full);
        assert_eq!(LogFormat::parse("%{color}%{time}"), LogFormat::Full);
    }

    #[test]
    fn reinit_replaces_spec() {
        // May or may not own the global subscriber depending on test order.
        let logger = Logger::install(&LoggingSpec::parse("info"));
        logger.apply_spec(&LoggingSpec::parse("debug"));
        assert_eq!(logger.active_spec().default_level(), LevelFilter::DEBUG);
        assert_eq!(logger.startup_spec().default_level(), LevelFilter::INFO);
    }

    #[test]
    fn second_install_is_detached_not_fatal() {
        let first = Logger::install(&LoggingSpec::default());
        let second = Logger::install(&LoggingSpec::default());
        assert!(!(first.is_installed() && second.is_installed()));
        assert!(!second.is_installed());
    }

    #[test]
    fn file_sink_is_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("peer.log");
        let logger = Logger::install(&LoggingSpec::default());
        // a detached logger reports the dropped subscriber; the file is still opened first
        let _ = logger.configure_output(LogFormat::Compact, &LogSink::File(path.clone()));
        assert!(path.exists());
    }

    #[test]
    fn reconfigured_output_replaces_previous_sink() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.log");
        let second = dir.path().join("second.log");
        let (logger, subscriber) = Logger::build(&LoggingSpec::parse("info"));

        tracing::subscriber::with_default(subscriber, || {
            logger
                .configure_output(LogFormat::Full, &LogSink::File(first.clone()))
                .unwrap();
            logger
                .configure_output(LogFormat::Compact, &LogSink::File(second.clone()))
                .unwrap();
            tracing::info!("after second reconfigure");
        });

        let first = std::fs::read_to_string(&first).unwrap();
        let second = std::fs::read_to_string(&second).unwrap();
        assert!(first.is_empty());
        assert_eq!(second.matches("after second reconfigure").count(), 1);
        assert_eq!(second.lines().count(), 1);
    }

    #[test]
    fn unopenable_file_sink_errors() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::install(&LoggingSpec::default());
        let err = logger
            .configure_output(LogFormat::Full, &LogSink::File(dir.path().join("missing/peer.log")))
            .unwrap_err();
        assert!(err.to_string().contains("failed to open log file"));
    }
}
