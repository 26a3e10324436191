//! peerlog integration test harness.
//!
//! Each test runs the real ingest pipeline and `HttpResolver` against an
//! in-process mock of the node's `findpeer` RPC bound to 127.0.0.1:0, and
//! writes records into its own temp directory. No external node is needed:
//!
//!   cargo test --test integration

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tokio::sync::{broadcast, mpsc};

use peerlog_core::{ContentTable, PeerRecord};
use peerlog_services::{HttpResolver, IngestPipeline, PeerLookup, RecordStore, ResolveError};

mod follow;
mod lookup;

// ── Mock node ─────────────────────────────────────────────────────────────────

/// How the mock answers findpeer calls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Behavior {
    /// Known peers get their addresses; unknown peers get an empty list.
    Normal,
    /// Always answer with some other peer.
    Mismatch,
    /// 500 with a plain-text body.
    Fail,
    /// Sleep, then answer normally.
    Slow(Duration),
}

#[derive(Default)]
struct MockState {
    peers: HashMap<String, Vec<String>>,
    behavior: Option<Behavior>,
    calls: Vec<HashMap<String, String>>,
    content_types: Vec<String>,
}

/// Shared handle to the mock's state.
#[derive(Clone, Default)]
pub struct MockNode {
    state: Arc<Mutex<MockState>>,
}

impl MockNode {
    pub fn set_peer(&self, peer: &str, addrs: &[&str]) {
        self.state.lock().unwrap().peers.insert(
            peer.to_string(),
            addrs.iter().map(|a| a.to_string()).collect(),
        );
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        self.state.lock().unwrap().behavior = Some(behavior);
    }

    /// Query strings of every call received, in order.
    pub fn calls(&self) -> Vec<HashMap<String, String>> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn content_types(&self) -> Vec<String> {
        self.state.lock().unwrap().content_types.clone()
    }
}

async fn findpeer(
    State(node): State<MockNode>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let peer = query.get("arg").cloned().unwrap_or_default();
    let (behavior, addrs) = {
        let mut state = node.state.lock().unwrap();
        state.calls.push(query);
        if let Some(ct) = headers.get("content-type").and_then(|v| v.to_str().ok()) {
            state.content_types.push(ct.to_string());
        }
        (
            state.behavior.unwrap_or(Behavior::Normal),
            state.peers.get(&peer).cloned(),
        )
    };

    match behavior {
        Behavior::Fail => {
            (StatusCode::INTERNAL_SERVER_ERROR, "routing: not found").into_response()
        }
        Behavior::Mismatch => Json(serde_json::json!({
            "Responses": [{ "ID": "12D3KooSomeoneElse", "Addrs": ["/ip4/9.9.9.9/tcp/4001"] }]
        }))
        .into_response(),
        Behavior::Slow(delay) => {
            tokio::time::sleep(delay).await;
            normal_response(&peer, addrs)
        }
        Behavior::Normal => normal_response(&peer, addrs),
    }
}

fn normal_response(peer: &str, addrs: Option<Vec<String>>) -> Response {
    let responses = match addrs {
        Some(addrs) => serde_json::json!([{ "ID": peer, "Addrs": addrs }]),
        None => serde_json::json!([]),
    };
    Json(serde_json::json!({ "Responses": responses })).into_response()
}

/// Start a mock node. Returns its state handle and findpeer endpoint URL.
pub async fn spawn_mock() -> Result<(MockNode, String)> {
    let node = MockNode::default();
    let app = Router::new()
        .route("/api/v0/dht/findpeer", post(findpeer))
        .with_state(node.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind mock node")?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok((node, format!("http://{addr}/api/v0/dht/findpeer")))
}

// ── Workspace ─────────────────────────────────────────────────────────────────

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Per-test scratch directory with a content table and an output tree.
pub struct Workspace {
    pub root: PathBuf,
    pub output: PathBuf,
    pub table: Arc<ContentTable>,
}

impl Workspace {
    /// `table_json` is written to disk and loaded the same way the daemon does.
    pub fn new(table_json: &str) -> Result<Self> {
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!(
            "peerlog-integration-{}-{}",
            std::process::id(),
            id
        ));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root)?;

        let table_path = root.join("table.json");
        std::fs::write(&table_path, table_json)?;
        let table = Arc::new(ContentTable::load(&table_path)?);

        Ok(Self {
            output: root.join("data"),
            root,
            table,
        })
    }

    pub fn pipeline(&self, endpoint: &str, timeout: Duration) -> Result<IngestPipeline> {
        let resolver = HttpResolver::new(endpoint, timeout)?;
        Ok(IngestPipeline::new(
            self.table.clone(),
            self.output.clone(),
            Some(Arc::new(resolver) as Arc<dyn PeerLookup>),
            RecordStore::new(true),
        ))
    }

    pub fn record(&self, file_type: &str, file_name: &str, peer: &str) -> Option<PeerRecord> {
        let path = self
            .output
            .join(file_type)
            .join(file_name)
            .join(format!("{peer}.json"));
        read_record(&path)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

pub fn read_record(path: &Path) -> Option<PeerRecord> {
    let bytes = std::fs::read(path).ok()?;
    Some(serde_json::from_slice(&bytes).expect("record should be valid JSON"))
}

pub const TABLE: &str = r#"{"Qm123": {"filename": "a.txt", "filetype": "doc"}}"#;

pub fn want_line(cid: &str, peer: &str) -> String {
    format!(
        "2022-08-03T23:15:32.439-0400\tWARN\tsend\tdecision/engine.go:706\tCid {cid} wanted from peer {peer}"
    )
}

/// Feed `lines` through `pipeline` and wait for it to finish.
pub async fn run_lines(pipeline: IngestPipeline, lines: Vec<String>) -> Result<()> {
    let (tx, rx) = mpsc::channel(16);
    let (shutdown_tx, _) = broadcast::channel(1);
    let task = tokio::spawn(pipeline.run(rx, shutdown_tx.subscribe()));
    for line in lines {
        tx.send(line).await?;
    }
    drop(tx);
    tokio::time::timeout(Duration::from_secs(30), task)
        .await
        .context("pipeline did not finish")???;
    Ok(())
}
