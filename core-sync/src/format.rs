//! Rendering of engine log output into display lines.
//!
//! Every poll result carries newline-delimited sub-records. A sub-record is
//! normally one JSON log object from the engine, but anything that does not
//! decode is kept as plain text.

use bridge_traits::EngineLogEnvelope;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::job::SyncMode;

/// Informational banners the engine prints on every bisync run.
const DISCLAIMER_PREFIXES: [&str; 2] = ["Bisync is EXPERIMENTAL", "Bisync is IN BETA"];

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Line appended after a real run's terminal record.
pub const SYNC_COMPLETE_LINE: &str = "Sync Complete!";

/// One structured engine log object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineLogRecord {
    #[serde(default)]
    pub msg: String,
    /// Path of the file a pending operation applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    /// Why the operation was skipped (dry runs skip everything).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    /// File size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl EngineLogRecord {
    /// Records naming a file describe a pending operation.
    pub fn is_pending_operation(&self) -> bool {
        self.object.is_some()
    }

    fn render_pending(&self) -> String {
        let reason = self.skipped.as_deref().unwrap_or(&self.msg);
        let object = self.object.as_deref().unwrap_or_default();
        let megabytes = (self.size.unwrap_or(0.0) / BYTES_PER_MB).round();
        format!("PENDING: {reason} - {object}; size {megabytes}MB")
    }
}

/// A decoded sub-record.
#[derive(Debug, Clone, PartialEq)]
pub enum LogLine {
    Structured(EngineLogRecord),
    PlainText(String),
}

impl LogLine {
    /// Decode one sub-record; anything that is not a JSON object is plain text.
    pub fn decode(line: &str) -> Self {
        let trimmed = line.trim_start();
        if !trimmed.starts_with('{') {
            return LogLine::PlainText(line.to_string());
        }

        match serde_json::from_str::<EngineLogRecord>(line) {
            Ok(record) => LogLine::Structured(record),
            Err(e) => {
                debug!(error = %e, "Engine log line is not a log record, keeping as text");
                LogLine::PlainText(line.to_string())
            }
        }
    }

    /// Text shown when the line is rendered verbatim.
    pub fn text(&self) -> &str {
        match self {
            LogLine::Structured(record) => &record.msg,
            LogLine::PlainText(text) => text,
        }
    }

    fn is_disclaimer(&self) -> bool {
        let text = self.text();
        DISCLAIMER_PREFIXES
            .iter()
            .any(|prefix| text.starts_with(prefix))
    }
}

/// Decode a raw poll result.
///
/// Returns `None` for `""` (no new data). A result that is not a valid
/// envelope is treated as a single plain-text progress record.
pub fn decode_envelope(raw: &str) -> Option<EngineLogEnvelope> {
    if raw.is_empty() {
        return None;
    }

    match serde_json::from_str::<EngineLogEnvelope>(raw) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            debug!(error = %e, "Malformed poll result, keeping as text");
            Some(EngineLogEnvelope::progress(raw))
        }
    }
}

/// Turns the records of one run into display lines.
///
/// Holds the per-run "seen a pending operation" state, so a new formatter is
/// needed for every run.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    mode: SyncMode,
    seen_pending: bool,
}

impl MessageFormatter {
    pub fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            seen_pending: false,
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Render the sub-records of one poll result.
    pub fn format(&mut self, message: &str) -> Vec<String> {
        let mut lines = Vec::new();

        for raw in message.split('\n') {
            let raw = raw.trim_end_matches('\r');
            if raw.trim().is_empty() {
                continue;
            }

            let line = LogLine::decode(raw);
            if line.is_disclaimer() {
                continue;
            }

            if let Some(rendered) = self.render(line) {
                if !rendered.is_empty() {
                    lines.push(rendered);
                }
            }
        }

        lines
    }

    /// Lines appended once the terminal record has been rendered.
    pub fn finish(&self) -> Vec<String> {
        match self.mode {
            SyncMode::Real => vec![SYNC_COMPLETE_LINE.to_string()],
            SyncMode::DryRun => Vec::new(),
        }
    }

    fn render(&mut self, line: LogLine) -> Option<String> {
        match (self.mode, line) {
            (SyncMode::DryRun, LogLine::Structured(record)) if record.is_pending_operation() => {
                self.seen_pending = true;
                Some(record.render_pending())
            }
            (SyncMode::DryRun, _) if self.seen_pending => None,
            (_, LogLine::Structured(record)) => Some(record.msg),
            (_, LogLine::PlainText(text)) => Some(text),
        }
    }
}

/// Failure line recorded when a run errors.
pub fn failure_message(mode: SyncMode, error: &str) -> String {
    match mode {
        SyncMode::Real => format!("Error while performing sync: {error}"),
        SyncMode::DryRun => format!("Error while performing dry-run of sync: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> String {
        json.to_string()
    }

    #[test]
    fn test_decode_structured_and_plain() {
        let line = LogLine::decode(r#"{"msg":"Copied","level":"info"}"#);
        assert_eq!(
            line,
            LogLine::Structured(EngineLogRecord {
                msg: "Copied".to_string(),
                level: Some("info".to_string()),
                ..Default::default()
            })
        );

        assert_eq!(
            LogLine::decode("plain words"),
            LogLine::PlainText("plain words".to_string())
        );
        assert_eq!(
            LogLine::decode("{not json"),
            LogLine::PlainText("{not json".to_string())
        );
    }

    #[test]
    fn test_decode_envelope() {
        assert_eq!(decode_envelope(""), None);

        let envelope = decode_envelope(r#"{"Message":"a\nb","Finished":true}"#).unwrap();
        assert!(envelope.finished);
        assert_eq!(envelope.message, "a\nb");

        let envelope = decode_envelope("garbage").unwrap();
        assert!(!envelope.finished);
        assert_eq!(envelope.message, "garbage");
    }

    #[test]
    fn test_dry_run_renders_pending_and_suppresses_after() {
        let mut formatter = MessageFormatter::new(SyncMode::DryRun);
        let message = [
            record(r#"{"msg":"Starting bisync"}"#),
            record(r#"{"msg":"Skipped copy","object":"save1.sav","skipped":"copy","size":3145728}"#),
            record(r#"{"msg":"Summary line"}"#),
            "trailing text".to_string(),
            record(r#"{"msg":"Skipped delete","object":"old.sav","size":524288}"#),
        ]
        .join("\n");

        let lines = formatter.format(&message);
        assert_eq!(
            lines,
            vec![
                "Starting bisync",
                "PENDING: copy - save1.sav; size 3MB",
                "PENDING: Skipped delete - old.sav; size 1MB",
            ]
        );
        assert!(formatter.finish().is_empty());
    }

    #[test]
    fn test_pending_state_spans_poll_results() {
        let mut formatter = MessageFormatter::new(SyncMode::DryRun);
        formatter.format(r#"{"msg":"x","object":"a.sav","skipped":"copy","size":0}"#);

        assert!(formatter.format("later info").is_empty());
    }

    #[test]
    fn test_real_run_renders_everything() {
        let mut formatter = MessageFormatter::new(SyncMode::Real);
        let message = [
            record(r#"{"msg":"Copied (new)","object":"save1.sav","size":10}"#),
            "".to_string(),
            "plain".to_string(),
        ]
        .join("\r\n");

        assert_eq!(formatter.format(&message), vec!["Copied (new)", "plain"]);
        assert_eq!(formatter.finish(), vec![SYNC_COMPLETE_LINE]);
    }

    #[test]
    fn test_disclaimer_is_always_dropped() {
        for mode in [SyncMode::DryRun, SyncMode::Real] {
            let mut formatter = MessageFormatter::new(mode);
            let message = [
                record(r#"{"msg":"Bisync is EXPERIMENTAL. Don't use in production!"}"#),
                "Bisync is IN BETA. Don't use in production!".to_string(),
                "kept".to_string(),
            ]
            .join("\n");

            assert_eq!(formatter.format(&message), vec!["kept"]);
        }
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            failure_message(SyncMode::Real, "exit status 1"),
            "Error while performing sync: exit status 1"
        );
        assert_eq!(
            failure_message(SyncMode::DryRun, "exit status 1"),
            "Error while performing dry-run of sync: exit status 1"
        );
    }
}
