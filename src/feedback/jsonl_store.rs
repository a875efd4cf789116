use async_trait::async_trait;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::FeedbackConfig;
use crate::error::{FeedbackRejected, Result, TriageError};
use crate::feedback::FeedbackStore;
use crate::metrics::{FEEDBACK_RETRIES_TOTAL, FEEDBACK_SUBMISSIONS_TOTAL};
use crate::models::FeedbackEntry;

/// Feedback log stored as JSON Lines, one entry per line.
///
/// Appends and reads share one lock, so a reader never observes a line
/// that is still being written. A failed append is truncated away before
/// the next attempt, and an incomplete final line left by a crash is
/// dropped on the next append and skipped on load.
#[derive(Debug)]
pub struct JsonlFeedbackStore {
    path: PathBuf,
    max_retries: u32,
    retry_backoff: Duration,
    lock: Mutex<()>,
}

impl JsonlFeedbackStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let defaults = FeedbackConfig::default();
        Self {
            path: path.into(),
            max_retries: defaults.max_retries,
            retry_backoff: Duration::from_millis(defaults.retry_backoff_ms),
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &FeedbackConfig) -> Self {
        Self::new(config.path.clone()).with_retry(config.max_retries, config.retry_backoff_ms)
    }

    pub fn with_retry(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = Duration::from_millis(backoff_ms);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, line: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.path)
            .await?;

        let len = file.metadata().await?.len();
        let start = committed_len(&mut file, len).await?;
        if start < len {
            warn!(
                path = %self.path.display(),
                dropped_bytes = len - start,
                "Dropping incomplete final feedback line"
            );
            file.set_len(start).await?;
        }
        file.seek(SeekFrom::Start(start)).await?;

        let written = async {
            file.write_all(line).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;

        if let Err(e) = written {
            // Roll back so a retry never duplicates or tears the line
            if let Err(rollback) = file.set_len(start).await {
                warn!(path = %self.path.display(), error = %rollback, "Feedback rollback failed");
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Length of the file up to and including its last newline
async fn committed_len(file: &mut File, len: u64) -> std::io::Result<u64> {
    const CHUNK: u64 = 4096;

    let mut buf = vec![0u8; CHUNK as usize];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start)).await?;
        file.read_exact(chunk).await?;

        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }
    Ok(0)
}

#[async_trait]
impl FeedbackStore for JsonlFeedbackStore {
    async fn submit(&self, entry: FeedbackEntry) -> std::result::Result<(), FeedbackRejected> {
        let mut line = match serde_json::to_vec(&entry) {
            Ok(line) => line,
            Err(e) => {
                FEEDBACK_SUBMISSIONS_TOTAL
                    .with_label_values(&["rejected"])
                    .inc();
                return Err(FeedbackRejected {
                    entry,
                    error: e.into(),
                });
            }
        };
        line.push(b'\n');

        let _guard = self.lock.lock().await;

        let mut attempts = 0;
        loop {
            if attempts > 0 {
                let delay = self.retry_backoff * 2_u32.pow(attempts - 1);
                FEEDBACK_RETRIES_TOTAL.inc();
                info!(
                    incident_id = %entry.incident_id,
                    attempt = attempts + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying feedback append"
                );
                sleep(delay).await;
            }

            match self.append(&line).await {
                Ok(()) => {
                    FEEDBACK_SUBMISSIONS_TOTAL
                        .with_label_values(&["stored"])
                        .inc();
                    debug!(incident_id = %entry.incident_id, path = %self.path.display(), "Feedback appended");
                    return Ok(());
                }
                Err(e) if attempts < self.max_retries => {
                    warn!(incident_id = %entry.incident_id, error = %e, "Feedback append failed");
                    attempts += 1;
                }
                Err(e) => {
                    FEEDBACK_SUBMISSIONS_TOTAL
                        .with_label_values(&["rejected"])
                        .inc();
                    warn!(
                        incident_id = %entry.incident_id,
                        attempts = attempts + 1,
                        error = %e,
                        "Feedback append exhausted retries"
                    );
                    return Err(FeedbackRejected {
                        entry,
                        error: TriageError::persistence("feedback_append", e),
                    });
                }
            }
        }
    }

    async fn load_all(&self) -> Result<Vec<FeedbackEntry>> {
        let _guard = self.lock.lock().await;

        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TriageError::persistence("feedback_load", e)),
        };

        let torn_tail = !contents.is_empty() && !contents.ends_with('\n');
        let lines: Vec<&str> = contents.lines().collect();
        let last = lines.len().saturating_sub(1);

        let mut entries = Vec::with_capacity(lines.len());
        for (index, line) in lines.into_iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) if torn_tail && index == last => {
                    warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        error = %e,
                        "Skipping incomplete final feedback line"
                    );
                }
                Err(e) => {
                    return Err(TriageError::persistence(
                        "feedback_load",
                        format!("line {}: {}", index + 1, e),
                    ))
                }
            }
        }
        Ok(entries)
    }
}
