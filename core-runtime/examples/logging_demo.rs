//! Prints the log output of a simulated dry run in each format.
//!
//! ```bash
//! cargo run -p core-runtime --example logging_demo            # pretty
//! cargo run -p core-runtime --example logging_demo -- json
//! CLOUDSAVE_LOG=core_sync=trace cargo run -p core-runtime --example logging_demo -- compact
//! ```

use anyhow::Context;
use bridge_traits::time::{ConsoleLogger, LogLevel};
use core_async::time::{sleep, Duration};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::sync::Arc;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

#[core_async::main]
async fn main() -> anyhow::Result<()> {
    let format = match std::env::args().nth(1).as_deref() {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };

    let config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_spans(true)
        .with_logger_sink(Arc::new(ConsoleLogger {
            min_level: LogLevel::Warn,
        }));
    init_logging(config).context("failed to initialize logging")?;

    dry_run("Celeste").await;
    Ok(())
}

#[instrument]
async fn dry_run(game_id: &str) {
    info!(mode = "dryrun", run = 1u64, "Starting sync");

    for poll in 1..=3u32 {
        async {
            debug!(lines = poll * 2, "Engine reported progress");
            sleep(Duration::from_millis(10)).await;
        }
        .instrument(info_span!("poll", poll))
        .await;
    }

    warn!(preview_lines = 6, "Dry run finished, waiting for confirmation");
}
