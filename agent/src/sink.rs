use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use helpdesk_core::trace::{RejectedTrace, Trace};

/// Destination for per-request traces. Emission never fails the request;
/// sinks log their own write errors.
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn emit(&self, trace: &Trace);

    async fn emit_rejected(&self, rejected: &RejectedTrace);
}

/// Logs each trace as one structured `pipeline_trace` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTraceSink;

#[async_trait]
impl TraceSink for TracingTraceSink {
    async fn emit(&self, trace: &Trace) {
        let record = serde_json::to_string(trace).unwrap_or_default();
        tracing::info!(
            event = "pipeline_trace",
            request_id = %trace.request_id,
            session_id = %trace.session_id,
            intent = %trace.intent,
            confidence = trace.confidence.as_str(),
            escalation = trace.escalation.map(|c| c.as_str()),
            action_taken = trace.action_taken,
            total_ms = trace.latency_ms.total,
            trace = %record,
            "Request handled"
        );
    }

    async fn emit_rejected(&self, rejected: &RejectedTrace) {
        tracing::info!(
            event = "pipeline_rejected",
            request_id = %rejected.request_id,
            session_id = rejected.session_id.as_deref(),
            rejection = %rejected.rejection,
            escalation = rejected.escalation.map(|c| c.as_str()),
            total_ms = rejected.total_ms,
            "Request rejected"
        );
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonlTraceSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlTraceSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }
}

impl JsonlTraceSink {
    async fn append_record<T: serde::Serialize>(&self, record: &T) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(event = "trace_encode_failed", error = %e, "Failed to encode trace");
                return;
            }
        };
        if let Err(e) = self.append(&line).await {
            tracing::warn!(
                event = "trace_write_failed",
                path = %self.path.display(),
                error = %e,
                "Failed to append trace"
            );
        }
    }
}

#[async_trait]
impl TraceSink for JsonlTraceSink {
    async fn emit(&self, trace: &Trace) {
        self.append_record(trace).await;
    }

    async fn emit_rejected(&self, rejected: &RejectedTrace) {
        self.append_record(rejected).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_trace;

    #[tokio::test]
    async fn jsonl_sink_appends_one_line_per_trace() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlTraceSink::new(dir.path().join("traces.jsonl"));

        sink.emit(&sample_trace("s-1")).await;
        sink.emit(&sample_trace("s-2")).await;

        let text = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["session_id"], "s-2");
        assert_eq!(second["action"]["status"], "not_triggered");
    }

    #[tokio::test]
    async fn jsonl_sink_records_rejections_alongside_traces() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlTraceSink::new(dir.path().join("traces.jsonl"));

        sink.emit(&sample_trace("s-1")).await;
        sink.emit_rejected(&RejectedTrace {
            request_id: uuid::Uuid::now_v7(),
            session_id: Some("s-1".to_string()),
            recorded_at: chrono::Utc::now(),
            rejection: "session_closed".to_string(),
            escalation: None,
            total_ms: 0.1,
        })
        .await;

        let text = std::fs::read_to_string(sink.path()).unwrap();
        let rejected: serde_json::Value = serde_json::from_str(text.lines().nth(1).unwrap()).unwrap();
        assert_eq!(rejected["rejection"], "session_closed");
        assert_eq!(rejected["session_id"], "s-1");
        assert!(rejected.get("escalation").is_none());
    }

    #[tokio::test]
    async fn unwritable_path_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlTraceSink::new(dir.path().join("missing").join("traces.jsonl"));
        sink.emit(&sample_trace("s-1")).await;
        assert!(!sink.path().exists());
    }
}
