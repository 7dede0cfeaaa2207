//! # Grouper Logging
//!
//! Structured logging for the Grouper overlay and its simulator.
//!
//! Console output defaults to JSONL so simulation runs can be post-processed
//! with ordinary line tools; the development preset switches to a pretty,
//! colored console. `RUST_LOG` always overrides the configured levels.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use grouper_logging::GrouperSubscriberBuilder;
//!
//! let _guard = GrouperSubscriberBuilder::new()
//!     .with_level("debug")
//!     .init()
//!     .unwrap();
//!
//! tracing::info!(host = "h1", "broker online");
//! ```

pub mod config;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Errors raised while installing the global subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid filter directives: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("cannot open log directory: {0}")]
    File(#[from] tracing_appender::rolling::InitError),

    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Builder for the Grouper tracing subscriber
pub struct GrouperSubscriberBuilder {
    config: LogConfig,
}

impl GrouperSubscriberBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Create a builder with the given configuration
    pub fn with_config(config: LogConfig) -> Self {
        Self { config }
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Set a level for one target, e.g. `("grouper_crypto", "warn")`
    pub fn with_target(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.config.targets.insert(target.into(), level.into());
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool, pretty: bool) -> Self {
        self.config.console.enabled = enabled;
        self.config.console.pretty = pretty;
        self.config.console.ansi = pretty;
        self
    }

    /// Write JSONL to files under `directory`
    pub fn with_file_output(mut self, directory: impl Into<PathBuf>) -> Self {
        self.config.file = Some(FileConfig {
            directory: directory.into(),
            ..Default::default()
        });
        self
    }

    /// Access the configuration being built
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally.
    ///
    /// Returns the file writer guard when file output is enabled; logs are
    /// flushed when it is dropped, so keep it alive for the whole run.
    pub fn init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.config.directives())?,
        };

        let jsonl = &self.config.jsonl;
        let console = &self.config.console;

        let pretty_layer = (console.enabled && console.pretty).then(|| {
            fmt::layer()
                .pretty()
                .with_ansi(console.ansi)
                .with_target(true)
                .with_thread_ids(true)
        });

        let json_layer = (console.enabled && !console.pretty).then(|| {
            fmt::layer()
                .json()
                .flatten_event(jsonl.flatten_events)
                .with_current_span(true)
                .with_span_list(jsonl.include_spans)
                .with_file(jsonl.include_location)
                .with_line_number(jsonl.include_location)
        });

        let (file_layer, guard) = match &self.config.file {
            Some(file) => {
                let rotation = match file.rotation {
                    RotationStrategy::Daily => Rotation::DAILY,
                    RotationStrategy::Hourly => Rotation::HOURLY,
                    RotationStrategy::Never => Rotation::NEVER,
                };
                let appender = RollingFileAppender::builder()
                    .rotation(rotation)
                    .filename_prefix(&file.prefix)
                    .filename_suffix("jsonl")
                    .build(&file.directory)?;
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .json()
                    .flatten_event(jsonl.flatten_events)
                    .with_current_span(true)
                    .with_span_list(jsonl.include_spans)
                    .with_file(jsonl.include_location)
                    .with_line_number(jsonl.include_location)
                    .with_ansi(false)
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(pretty_layer)
            .with(json_layer)
            .with(file_layer)
            .try_init()?;

        Ok(guard)
    }

    /// Install the subscriber, ignoring the error when one is already set.
    ///
    /// Intended for tests, where several cases race to install a subscriber.
    pub fn try_init(self) -> Option<WorkerGuard> {
        self.init().ok().flatten()
    }
}

impl Default for GrouperSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the default subscriber (JSONL console at `info`)
pub fn init_default() -> Result<(), LoggingError> {
    GrouperSubscriberBuilder::new().init().map(|_| ())
}

/// Install a pretty console subscriber at `debug`
pub fn init_development() -> Result<(), LoggingError> {
    GrouperSubscriberBuilder::with_config(LogConfig::development())
        .init()
        .map(|_| ())
}

/// Install a quiet subscriber for tests; safe to call repeatedly
pub fn init_testing() {
    let _ = GrouperSubscriberBuilder::with_config(LogConfig::testing()).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates_settings() {
        let builder = GrouperSubscriberBuilder::new()
            .with_level("trace")
            .with_target("grouper_broker", "debug")
            .with_console(true, true)
            .with_file_output("/tmp/grouper-logs");

        let config = builder.config();
        assert_eq!(config.default_level, "trace");
        assert!(config.console.pretty);
        assert!(config.console.ansi);
        assert_eq!(config.directives(), "trace,grouper_broker=debug");
        assert_eq!(
            config.file.as_ref().unwrap().directory,
            PathBuf::from("/tmp/grouper-logs")
        );
    }

    #[test]
    fn test_bad_directives_are_rejected() {
        // RUST_LOG would take precedence over the configured level
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let result = GrouperSubscriberBuilder::new()
            .with_target("grouper_broker", "loudest")
            .init();
        assert!(matches!(result, Err(LoggingError::Filter(_))));
    }

    #[test]
    fn test_init_testing_is_idempotent() {
        init_testing();
        init_testing();
        tracing::warn!("still alive");
    }
}
