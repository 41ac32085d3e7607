//! Installs the global subscriber once and checks what reaches the host sink.

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for RecordingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

// A process gets one global subscriber, so the whole lifecycle is one test.
#[test]
fn test_global_subscriber_mirrors_to_sink() {
    let sink = Arc::new(RecordingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_filter("warn,core_sync=debug")
        .with_logger_sink(sink.clone());

    init_logging(config).unwrap();

    tracing::info!(target: "core_sync::batch", selected = 3u64, "batch started");
    tracing::trace!(target: "core_sync::runner", "below the filter");
    tracing::info!(target: "hyper::client", "other crates stay at warn");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "batch started");
        assert_eq!(entries[0].target, "core_sync::batch");
        assert_eq!(entries[0].fields.get("selected").map(String::as_str), Some("3"));
    }

    assert!(matches!(
        init_logging(LoggingConfig::default()),
        Err(Error::Config(_))
    ));
}
