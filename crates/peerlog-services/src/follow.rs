//! Follow-mode line reader over an append-only log file.
//!
//! Yields only newline-terminated lines; a partially written last line is
//! held until its newline arrives. Rotation and truncation are not handled.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::{broadcast, mpsc};

pub struct LineFollower {
    path: PathBuf,
    reader: BufReader<File>,
    poll_interval: Duration,
}

impl LineFollower {
    /// Open `path`. Unless `from_beginning`, existing content is skipped.
    pub async fn open(path: &Path, from_beginning: bool, poll_interval: Duration) -> Result<Self> {
        let mut file = File::open(path)
            .await
            .with_context(|| format!("failed to open log {}", path.display()))?;
        if !from_beginning {
            file.seek(SeekFrom::End(0))
                .await
                .with_context(|| format!("failed to seek to end of {}", path.display()))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            poll_interval,
        })
    }

    /// Push lines into `tx` until shutdown or the receiver goes away.
    ///
    /// `tx` should be bounded: a full channel stops reading, so a slow
    /// consumer leaves unread lines in the file rather than in memory.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<String>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        tracing::info!(path = %self.path.display(), "following log");
        let mut buf = Vec::new();

        loop {
            let read = tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("log follower shutting down");
                    return Ok(());
                }
                r = self.reader.read_until(b'\n', &mut buf) => {
                    r.with_context(|| format!("failed to read {}", self.path.display()))?
                }
            };

            if read == 0 || buf.last() != Some(&b'\n') {
                // EOF, possibly mid-line. Keep what we have and wait for more.
                tokio::select! {
                    _ = shutdown.recv() => {
                        tracing::info!("log follower shutting down");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(self.poll_interval) => continue,
                }
            }

            let line = take_line(&mut buf);
            if tx.send(line).await.is_err() {
                tracing::info!("line consumer dropped, follower exiting");
                return Ok(());
            }
        }
    }
}

fn take_line(buf: &mut Vec<u8>) -> String {
    let mut end = buf.len();
    if buf[..end].ends_with(b"\n") {
        end -= 1;
    }
    if buf[..end].ends_with(b"\r") {
        end -= 1;
    }
    let line = String::from_utf8_lossy(&buf[..end]).into_owned();
    buf.clear();
    line
}
