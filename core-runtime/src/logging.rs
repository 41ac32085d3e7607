//! # Logging & Tracing Infrastructure
//!
//! Installs the global `tracing` subscriber for the sync core:
//! - pretty, JSON or compact output on stdout
//! - an `EnvFilter` built from the config, the `CLOUDSAVE_LOG` variable or
//!   the workspace defaults, in that order
//! - an optional mirror of every surviving event into the host's
//!   [`LoggerSink`]
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::{ConsoleLogger, LogLevel};
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_logger_sink(Arc::new(ConsoleLogger::default())),
//! )?;
//! tracing::warn!(target: "core_sync", game_id = "Celeste", "Poll failed");
//! ```
//!
//! The sink receives a [`LogEntry`] carrying the message, the event's fields
//! and the name of the innermost span (`start`, `run_selected`, ...).

use crate::error::{Error, Result};

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_async::runtime;

use std::fmt;
use std::io;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer, Registry,
};

/// Environment variable holding a filter directive string.
pub const LOG_ENV: &str = "CLOUDSAVE_LOG";

/// Crates whose events are shown at the configured level by default.
const WORKSPACE_TARGETS: &[&str] = &[
    "core_runtime",
    "core_search",
    "core_sync",
    "core_service",
    "bridge_desktop",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored; the debug-build default
    Pretty,
    /// One JSON object per event; the release-build default
    Json,
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level for workspace crates when no filter is given
    pub level: LogLevel,
    /// Explicit filter directives, e.g. `core_sync=trace,bridge_desktop=debug`
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Log span enter/exit (pretty) or span context (json)
    pub enable_spans: bool,
    pub display_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            filter: None,
            logger_sink: None,
            enable_spans: false,
            display_target: true,
        }
    }
}

impl fmt::Debug for LoggingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingConfig")
            .field("format", &self.format)
            .field("level", &self.level)
            .field("filter", &self.filter)
            .field("has_logger_sink", &self.logger_sink.is_some())
            .field("enable_spans", &self.enable_spans)
            .field("display_target", &self.display_target)
            .finish()
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn with_spans(mut self, enable: bool) -> Self {
        self.enable_spans = enable;
        self
    }

    pub fn with_target(mut self, display: bool) -> Self {
        self.display_target = display;
        self
    }

    /// Filter directives actually used: explicit filter, then `CLOUDSAVE_LOG`,
    /// then workspace crates at `level` with everything else at `warn`.
    pub fn directives(&self) -> String {
        if let Some(filter) = &self.filter {
            return filter.clone();
        }
        if let Ok(from_env) = std::env::var(LOG_ENV) {
            if !from_env.trim().is_empty() {
                return from_env;
            }
        }
        std::iter::once("warn".to_string())
            .chain(
                WORKSPACE_TARGETS
                    .iter()
                    .map(|target| format!("{target}={}", self.level)),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// `Config` when the directives do not parse or a global subscriber is
/// already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;

    tracing_subscriber::registry()
        .with(output_layer(&config))
        .with(SinkLayer::new(config.logger_sink.clone()))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {e}")))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = config.directives();
    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("Invalid log filter '{directives}': {e}")))
}

fn output_layer(config: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = tracing_subscriber::fmt::layer()
        .with_target(config.display_target)
        .with_writer(io::stdout);

    match config.format {
        LogFormat::Pretty => {
            let spans = if config.enable_spans {
                FmtSpan::NEW | FmtSpan::CLOSE
            } else {
                FmtSpan::NONE
            };
            layer.pretty().with_span_events(spans).boxed()
        }
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

/// Mirrors events into a [`LoggerSink`].
struct SinkLayer {
    sink: Option<Arc<dyn LoggerSink>>,
}

impl SinkLayer {
    fn new(sink: Option<Arc<dyn LoggerSink>>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for SinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(sink) = &self.sink else {
            return;
        };

        let metadata = event.metadata();
        let level = to_log_level(*metadata.level());
        if level < sink.min_level() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let mut entry = LogEntry::new(
            level,
            metadata.target(),
            fields.message.unwrap_or_else(|| metadata.name().to_string()),
        );
        entry.fields.extend(fields.fields);
        entry.span = ctx.event_span(event).map(|span| span.name().to_string());

        deliver(Arc::clone(sink), entry);
    }
}

/// Hand `entry` to the sink: detached inside a runtime, inline otherwise.
fn deliver(sink: Arc<dyn LoggerSink>, entry: LogEntry) {
    match runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(err) = sink.log(entry).await {
                    eprintln!("LoggerSink error: {err}");
                }
            });
        }
        Err(_) => {
            if let Err(err) = runtime::block_on(sink.log(entry)) {
                eprintln!("LoggerSink error: {err}");
            }
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Vec<(String, String)>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => self.fields.push((name.to_string(), value)),
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{value:?}"));
    }
}

fn to_log_level(level: tracing::Level) -> LogLevel {
    match level {
        tracing::Level::TRACE => LogLevel::Trace,
        tracing::Level::DEBUG => LogLevel::Debug,
        tracing::Level::INFO => LogLevel::Info,
        tracing::Level::WARN => LogLevel::Warn,
        tracing::Level::ERROR => LogLevel::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<LogEntry>>,
        min_level: Option<LogLevel>,
    }

    #[async_trait]
    impl LoggerSink for RecordingSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            self.min_level.unwrap_or(LogLevel::Trace)
        }
    }

    fn recording(sink: &Arc<RecordingSink>) -> SinkLayer {
        let sink: Arc<dyn LoggerSink> = sink.clone();
        SinkLayer::new(Some(sink))
    }

    #[test]
    fn test_default_directives_cover_workspace_crates() {
        let config = LoggingConfig::default().with_level(LogLevel::Debug);
        if std::env::var(LOG_ENV).is_err() {
            let directives = config.directives();
            assert!(directives.starts_with("warn,"));
            assert!(directives.contains("core_sync=debug"));
            assert!(directives.contains("bridge_desktop=debug"));
        }
    }

    #[test]
    fn test_explicit_filter_wins() {
        let config = LoggingConfig::default().with_filter("core_sync=trace");
        assert_eq!(config.directives(), "core_sync=trace");
        assert!(build_filter(&config).is_ok());
    }

    #[test]
    fn test_invalid_filter_is_a_config_error() {
        let config = LoggingConfig::default().with_filter("core_sync=[=");
        assert!(matches!(build_filter(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_sink_receives_message_fields_and_span() {
        let sink = Arc::new(RecordingSink::default());
        let subscriber = tracing_subscriber::registry().with(recording(&sink));
        let _guard = tracing::subscriber::set_default(subscriber);

        let span = tracing::info_span!("start", game_id = "Celeste");
        span.in_scope(|| {
            tracing::info!(target: "core_sync::runner", game_id = "Celeste", run = 2u64, "run started");
        });

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.target, "core_sync::runner");
        assert_eq!(entry.message, "run started");
        assert_eq!(entry.game_id(), Some("Celeste"));
        assert_eq!(entry.fields.get("run").map(String::as_str), Some("2"));
        assert_eq!(entry.span.as_deref(), Some("start"));
    }

    #[test]
    fn test_sink_min_level_drops_quiet_events() {
        let sink = Arc::new(RecordingSink {
            min_level: Some(LogLevel::Warn),
            ..Default::default()
        });
        let subscriber = tracing_subscriber::registry().with(recording(&sink));
        let _guard = tracing::subscriber::set_default(subscriber);

        tracing::info!("ignored");
        tracing::warn!("kept");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "kept");
        assert!(entries[0].span.is_none());
    }
}
