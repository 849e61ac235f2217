//! Divergence log
//!
//! When one backend applied a request and another did not, the pairing is
//! written as one JSON line for an out-of-band repair process. Nothing here
//! ever fails the client request: write errors are logged and dropped.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use http::Method;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::metrics::clean;
use tessera_core::{MetricsFacade, MetricsSink, OutcomeDigest};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

/// Destination of divergence lines
#[async_trait]
pub trait SyncLogSink: Send + Sync {
    /// Append one line
    async fn write_line(&self, line: &str) -> io::Result<()>;
}

/// Appends lines to a file through tokio's file handle
#[derive(Debug)]
pub struct FileSyncLog {
    path: PathBuf,
    writer: tokio::sync::Mutex<BufWriter<tokio::fs::File>>,
}

impl FileSyncLog {
    /// Open `path` for appending, creating it if needed
    ///
    /// The file is opened eagerly so a bad path fails at startup.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        debug!("sync log opened at {}", path.display());
        Ok(Self {
            path,
            writer: tokio::sync::Mutex::new(BufWriter::new(tokio::fs::File::from_std(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SyncLogSink for FileSyncLog {
    async fn write_line(&self, line: &str) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        // Each record reaches the file before the next one is taken
        writer.flush().await
    }
}

/// Emits lines on the `synclog` tracing target
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSyncLog;

#[async_trait]
impl SyncLogSink for TracingSyncLog {
    async fn write_line(&self, line: &str) -> io::Result<()> {
        info!(target: "synclog", "{}", line);
        Ok(())
    }
}

/// Keeps lines in memory
#[derive(Debug, Default)]
pub struct MemorySyncLog {
    lines: Mutex<Vec<String>>,
}

impl MemorySyncLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Lines parsed back into records
    pub fn records(&self) -> Vec<DivergenceRecord> {
        self.lines
            .lock()
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

#[async_trait]
impl SyncLogSink for MemorySyncLog {
    async fn write_line(&self, line: &str) -> io::Result<()> {
        self.lines.lock().push(line.to_string());
        Ok(())
    }
}

/// One success/failure backend pairing for one client request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivergenceRecord {
    pub method: String,
    pub path: String,
    pub access_key: String,
    pub user_agent: String,
    /// Content length of the successful response, -1 when unknown
    pub content_length: i64,
    /// Empty when the failing backend answered with an error status
    pub error_msg: String,
    pub request_id: String,
    /// RFC 3339, UTC, nanosecond precision
    pub time: String,
    pub failed_host: String,
    pub success_host: String,
}

impl DivergenceRecord {
    /// Record pairing `success` with `failure`
    pub fn new(success: &OutcomeDigest, failure: &OutcomeDigest) -> Self {
        let request = &success.request;
        Self {
            method: request.method.to_string(),
            path: request.bucket_path().into_owned(),
            access_key: request.access_key().unwrap_or_default(),
            user_agent: request.user_agent().to_string(),
            content_length: success
                .content_length
                .map_or(-1, |len| i64::try_from(len).unwrap_or(i64::MAX)),
            error_msg: failure
                .error
                .as_ref()
                .map(|e| format!("non nil error:{}", e))
                .unwrap_or_default(),
            request_id: request.request_id.clone(),
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
            failed_host: failure.backend.host().to_string(),
            success_host: success.backend.host().to_string(),
        }
    }
}

/// Filters divergences and writes them to the sync log
pub struct SyncSender {
    allowed_methods: HashSet<Method>,
    sink: Option<Arc<dyn SyncLogSink>>,
    metrics: Arc<dyn MetricsSink>,
}

impl SyncSender {
    /// Log divergences of `methods` to `sink`
    pub fn new(methods: impl IntoIterator<Item = Method>, sink: Option<Arc<dyn SyncLogSink>>) -> Self {
        Self {
            allowed_methods: methods.into_iter().collect(),
            sink,
            metrics: Arc::new(MetricsFacade),
        }
    }

    /// Sender that records nothing
    pub fn disabled() -> Self {
        Self::new(Vec::new(), None)
    }

    /// Report inconsistency counters to `metrics` instead of the global facade
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Whether divergences of `method` are recorded at all
    pub fn should_be_logged(&self, method: &Method) -> bool {
        !self.allowed_methods.is_empty()
            && self.sink.is_some()
            && self.allowed_methods.contains(method)
    }

    /// Record every failure diverging from `success`
    pub async fn record(&self, success: &OutcomeDigest, failures: &[OutcomeDigest]) {
        if failures.is_empty() || !self.should_be_logged(&success.request.method) {
            return;
        }
        for failure in failures {
            self.send(success, failure).await;
        }
    }

    async fn send(&self, success: &OutcomeDigest, failure: &OutcomeDigest) {
        let method = &success.request.method;
        if suppressed_in_maintenance(method, failure) {
            debug!(
                "skipping sync log for request {}: {} is in maintenance",
                success.request.request_id,
                failure.backend.host()
            );
            return;
        }

        self.metrics.mark(&format!(
            "reqs.inconsistencies.{}.method-{}",
            clean(failure.backend.host()),
            method
        ));

        let record = DivergenceRecord::new(success, failure);
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!("cannot serialize sync log record: {}", e);
                return;
            }
        };
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.write_line(&line).await {
                warn!("cannot write sync log record: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for SyncSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSender")
            .field("allowed_methods", &self.allowed_methods)
            .field("enabled", &self.sink.is_some())
            .finish()
    }
}

/// A backend in maintenance missed reads on purpose; only writes need repair
fn suppressed_in_maintenance(method: &Method, failure: &OutcomeDigest) -> bool {
    failure.backend.is_in_maintenance() && method != Method::PUT && method != Method::DELETE
}
