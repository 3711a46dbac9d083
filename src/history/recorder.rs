//! Append-only per-session transcript

use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::SessionEvent;

/// Writes one line per session event to `session_<stamp>.txt`
pub struct HistoryRecorder {
    path: PathBuf,
    file: File,
}

impl HistoryRecorder {
    /// Create the log directory and the session file, writing its header
    pub async fn create(dir: &Path) -> std::io::Result<Self> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        Self::create_named(dir, &stamp).await
    }

    async fn create_named(dir: &Path, stamp: &str) -> std::io::Result<Self> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(format!("session_{stamp}.txt"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let mut recorder = Self { path, file };
        recorder.write_line(&format!("=== Leo Session {stamp} ===")).await?;
        info!(path = %recorder.path.display(), "session history started");
        Ok(recorder)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record(&mut self, event: &SessionEvent) -> std::io::Result<()> {
        let line = format_line(&Local::now().format("%H:%M:%S").to_string(), event);
        self.write_line(&line).await
    }

    async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.file.write_all(line.as_bytes()).await?;
        self.file.write_all(b"\n").await?;
        self.file.flush().await
    }

    /// Record events until the channel closes
    pub async fn run(mut self, mut events: broadcast::Receiver<SessionEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = self.record(&event).await {
                        warn!(error = %e, path = %self.path.display(), "failed to write history");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "history recorder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("history recorder stopped");
    }
}

fn format_line(time: &str, event: &SessionEvent) -> String {
    match event {
        SessionEvent::Utterance { text } => format!("[{time}] You: {text}"),
        SessionEvent::Spoke { text } => format!("[{time}] Leo: {text}"),
        other => format!("[{time}] * {other}"),
    }
}
