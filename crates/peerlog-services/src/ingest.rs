//! Ingest pipeline — log lines in, peer records out.
//!
//! Per line: extract → content table filter → resolve → merge/persist.
//! Every per-line failure is logged and counted; nothing short of shutdown or
//! the line source closing stops the loop.
//!
//! With one worker (the default) lines are handled strictly in order, one at
//! a time. With more, each job is routed by record path to a fixed worker, so
//! every record file still has exactly one writer and sees its events in
//! arrival order.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};

use peerlog_core::path::record_dir;
use peerlog_core::{extract, ContentTable, LogEvent};

use crate::record_store::RecordStore;
use crate::resolver::PeerLookup;
use crate::stats::IngestStats;

pub struct IngestPipeline {
    stage: Arc<Stage>,
    workers: usize,
    queue_capacity: usize,
}

/// Shared per-event logic.
struct Stage {
    table: Arc<ContentTable>,
    output_dir: PathBuf,
    /// None = extraction-only mode.
    resolver: Option<Arc<dyn PeerLookup>>,
    store: RecordStore,
    stats: Arc<IngestStats>,
}

/// An event worth resolving, with its record directory already derived.
struct Job {
    event: LogEvent,
    dir: PathBuf,
}

impl IngestPipeline {
    pub fn new(
        table: Arc<ContentTable>,
        output_dir: PathBuf,
        resolver: Option<Arc<dyn PeerLookup>>,
        store: RecordStore,
    ) -> Self {
        Self {
            stage: Arc::new(Stage {
                table,
                output_dir,
                resolver,
                store,
                stats: Arc::new(IngestStats::default()),
            }),
            workers: 1,
            queue_capacity: 1024,
        }
    }

    /// Route jobs to `workers` sharded queues of `queue_capacity` each.
    pub fn with_workers(mut self, workers: usize, queue_capacity: usize) -> Self {
        self.workers = workers.max(1);
        self.queue_capacity = queue_capacity.max(1);
        self
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        self.stage.stats.clone()
    }

    /// Consume `lines` until it closes or shutdown fires.
    pub async fn run(
        self,
        lines: mpsc::Receiver<String>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        tracing::info!(
            workers = self.workers,
            resolve = self.stage.resolver.is_some(),
            known_cids = self.stage.table.len(),
            "ingest pipeline starting"
        );
        if self.workers == 1 {
            self.run_sequential(lines, shutdown).await
        } else {
            self.run_sharded(lines, shutdown).await
        }
    }

    async fn run_sequential(
        self,
        mut lines: mpsc::Receiver<String>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        loop {
            let line = tokio::select! {
                _ = shutdown.recv() => break,
                line = lines.recv() => match line {
                    Some(l) => l,
                    None => break,
                },
            };

            let Some(job) = self.stage.prepare(&line) else {
                continue;
            };
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = self.stage.complete(job) => {}
            }
        }
        tracing::info!("ingest pipeline stopped");
        Ok(())
    }

    async fn run_sharded(
        self,
        mut lines: mpsc::Receiver<String>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        let mut queues = Vec::with_capacity(self.workers);
        let mut handles = Vec::with_capacity(self.workers);
        for worker in 0..self.workers {
            let (tx, rx) = mpsc::channel::<Job>(self.queue_capacity);
            queues.push(tx);
            handles.push(tokio::spawn(worker_loop(
                worker,
                self.stage.clone(),
                rx,
                shutdown.resubscribe(),
            )));
        }

        'lines: loop {
            let line = tokio::select! {
                _ = shutdown.recv() => break,
                line = lines.recv() => match line {
                    Some(l) => l,
                    None => break,
                },
            };

            let Some(job) = self.stage.prepare(&line) else {
                continue;
            };
            let queue = &queues[shard(&job, queues.len())];
            tokio::select! {
                _ = shutdown.recv() => break 'lines,
                sent = queue.send(job) => {
                    if sent.is_err() {
                        tracing::error!("ingest worker exited early");
                        break 'lines;
                    }
                }
            }
        }

        // Closing the queues lets workers drain what they already hold.
        drop(queues);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "ingest worker panicked");
            }
        }
        tracing::info!("ingest pipeline stopped");
        Ok(())
    }
}

async fn worker_loop(
    worker: usize,
    stage: Arc<Stage>,
    mut rx: mpsc::Receiver<Job>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let job = tokio::select! {
            _ = shutdown.recv() => break,
            job = rx.recv() => match job {
                Some(j) => j,
                None => break,
            },
        };
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = stage.complete(job) => {}
        }
    }
    tracing::debug!(worker, "ingest worker exiting");
}

fn shard(job: &Job, n: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    job.dir.hash(&mut hasher);
    job.event.peer_id.hash(&mut hasher);
    (hasher.finish() % n as u64) as usize
}

impl Stage {
    /// Everything that needs no I/O. Returns a job only for events that
    /// should be resolved and stored.
    fn prepare(&self, line: &str) -> Option<Job> {
        IngestStats::bump(&self.stats.lines);
        if line.is_empty() {
            return None;
        }

        let event = match extract(line) {
            Ok(Some(event)) => event,
            Ok(None) => return None,
            Err(e) => {
                IngestStats::bump(&self.stats.malformed);
                tracing::warn!(error = %e, line, "malformed engine line");
                return None;
            }
        };
        IngestStats::bump(&self.stats.events);
        tracing::debug!(cid = %event.cid, peer = %event.peer_id, "want observed");

        let Some(meta) = self.table.get(&event.cid) else {
            IngestStats::bump(&self.stats.unknown_cid);
            return None;
        };

        if self.resolver.is_none() {
            tracing::info!(
                cid = %event.cid,
                peer = %event.peer_id,
                file = %meta.file_name,
                "tracked content requested"
            );
            return None;
        }

        match record_dir(&self.output_dir, meta) {
            Ok(dir) => Some(Job { event, dir }),
            Err(e) => {
                IngestStats::bump(&self.stats.rejected_path);
                tracing::warn!(error = %e, cid = %event.cid, "refusing to build record path");
                None
            }
        }
    }

    /// Resolve the peer and fold the result into its record.
    async fn complete(&self, job: Job) {
        let Some(resolver) = self.resolver.as_ref() else {
            return;
        };
        let Job { event, dir } = job;

        let info = match resolver.resolve(&event.peer_id).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                IngestStats::bump(&self.stats.peer_not_found);
                tracing::info!(
                    peer = %event.peer_id,
                    cid = %event.cid,
                    "peer not found by lookup"
                );
                return;
            }
            Err(e) => {
                IngestStats::bump(&self.stats.resolve_failed);
                tracing::warn!(
                    error = %e,
                    peer = %event.peer_id,
                    cid = %event.cid,
                    "peer lookup failed"
                );
                return;
            }
        };

        match self.store.merge_and_persist(&dir, info) {
            Ok(_) => IngestStats::bump(&self.stats.records_written),
            Err(e) => {
                IngestStats::bump(&self.stats.write_failed);
                tracing::warn!(
                    error = %e,
                    peer = %event.peer_id,
                    dir = %dir.display(),
                    "failed to save peer record"
                );
            }
        }
    }
}
