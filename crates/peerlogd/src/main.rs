//! peerlogd — follows a node log and records which peers ask for tracked content.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};

use peerlog_core::config::PeerlogConfig;
use peerlog_core::ContentTable;
use peerlog_services::{HttpResolver, IngestPipeline, LineFollower, PeerLookup, RecordStore};

mod args;

use args::Args;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match Args::parse(&argv) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            args::print_usage();
            std::process::exit(2);
        }
    };
    if args.help {
        args::print_usage();
        return Ok(());
    }

    // Load config
    let mut config = match &args.config {
        Some(path) => PeerlogConfig::load_explicit(path)?,
        None => {
            if let Err(e) = PeerlogConfig::write_default_if_missing(&PeerlogConfig::file_path()) {
                tracing::warn!(error = %e, "failed to write default config");
            }
            PeerlogConfig::load()?
        }
    };
    args.apply(&mut config);

    let (log_path, table_path) = config.required_paths()?;

    // Output root
    std::fs::create_dir_all(&config.output.dir).with_context(|| {
        format!("failed to create output dir {}", config.output.dir.display())
    })?;

    // Content table
    let table = Arc::new(ContentTable::load(&table_path)?);
    tracing::info!(path = %table_path.display(), cids = table.len(), "content table loaded");
    if table.is_empty() {
        tracing::warn!("content table is empty, no records will be written");
    }

    // Resolver
    let resolver: Option<Arc<dyn PeerLookup>> = if config.resolver.enabled {
        let http = HttpResolver::new(
            config.resolver.endpoint.clone(),
            Duration::from_secs(config.resolver.timeout_secs),
        )
        .context("failed to build lookup client")?;
        tracing::info!(
            endpoint = %config.resolver.endpoint,
            timeout_secs = config.resolver.timeout_secs,
            "peer lookup enabled"
        );
        Some(Arc::new(http) as Arc<dyn PeerLookup>)
    } else {
        tracing::info!("extract-only mode, peers will not be resolved");
        None
    };

    let follower = LineFollower::open(
        &log_path,
        config.source.from_beginning,
        Duration::from_millis(config.source.poll_interval_ms),
    )
    .await?;

    let pipeline = IngestPipeline::new(
        table,
        config.output.dir.clone(),
        resolver,
        RecordStore::new(config.output.quarantine_corrupt),
    )
    .with_workers(config.pipeline.workers, config.pipeline.queue_capacity);
    let stats = pipeline.stats();

    tracing::info!(
        log = %log_path.display(),
        output = %config.output.dir.display(),
        "peerlogd starting"
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let (line_tx, line_rx) = mpsc::channel::<String>(config.pipeline.queue_capacity.max(1));

    let follower_task = tokio::spawn(follower.run(line_tx, shutdown_tx.subscribe()));
    let pipeline_task = tokio::spawn(pipeline.run(line_rx, shutdown_tx.subscribe()));

    let stats_interval = config.pipeline.stats_interval_secs;
    let _stats_printer = (stats_interval > 0).then(|| {
        let stats = stats.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(stats_interval));
            interval.tick().await;
            loop {
                interval.tick().await;
                stats.print_stats();
            }
        })
    });

    // ── Wait for exit ────────────────────────────────────────────────────────

    let follower_result = follower_task.await;
    match follower_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "log follower failed"),
        Err(e) => tracing::error!(error = %e, "log follower panicked"),
    }
    // The follower owns the only line sender; once it is gone the pipeline
    // drains and stops on its own.
    match pipeline_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "ingest pipeline failed"),
        Err(e) => tracing::error!(error = %e, "ingest pipeline panicked"),
    }

    stats.print_stats();
    tracing::info!("peerlogd stopped");
    Ok(())
}
