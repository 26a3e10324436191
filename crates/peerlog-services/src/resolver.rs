//! Peer address lookup via the node's DHT `findpeer` RPC.
//!
//! The RPC answers with one or more JSON objects (newline-delimited when the
//! node streams query progress), each carrying a `Responses` list. Only the
//! entry whose `ID` equals the requested peer is trusted.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use peerlog_core::record::{null_as_empty, PeerAddressInfo};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("lookup request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("lookup service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed lookup response: {0}")]
    Parse(String),
}

/// Resolves a peer ID to its current addresses.
///
/// `Ok(None)` means the service answered but did not know the peer.
#[async_trait]
pub trait PeerLookup: Send + Sync {
    async fn resolve(&self, peer_id: &str) -> Result<Option<PeerAddressInfo>, ResolveError>;
}

#[derive(Deserialize)]
struct FindPeerResponse {
    #[serde(rename = "Responses", default, deserialize_with = "null_as_empty")]
    responses: Vec<PeerAddressInfo>,
}

/// HTTP client for the local node's findpeer endpoint.
pub struct HttpResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpResolver {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl PeerLookup for HttpResolver {
    async fn resolve(&self, peer_id: &str) -> Result<Option<PeerAddressInfo>, ResolveError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .query(&[("arg", peer_id), ("verbose", "false")])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ResolveError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        let found = select_peer(&body, peer_id)?;
        match &found {
            Some(info) => tracing::debug!(peer = peer_id, addrs = ?info.addrs, "peer resolved"),
            None => tracing::debug!(peer = peer_id, "peer not in lookup response"),
        }
        Ok(found)
    }
}

/// Scan every response object in `body` for an exact `ID` match.
pub fn select_peer(body: &[u8], peer_id: &str) -> Result<Option<PeerAddressInfo>, ResolveError> {
    let mut objects = 0usize;
    for item in serde_json::Deserializer::from_slice(body).into_iter::<FindPeerResponse>() {
        let response = item.map_err(|e| ResolveError::Parse(e.to_string()))?;
        objects += 1;
        if let Some(info) = response.responses.into_iter().find(|p| p.id == peer_id) {
            return Ok(Some(info));
        }
    }
    if objects == 0 {
        return Err(ResolveError::Parse("empty response body".into()));
    }
    Ok(None)
}
