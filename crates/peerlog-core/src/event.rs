//! Want-event extraction from node log lines.
//!
//! The decision engine logs one line per incoming want:
//!
//! ```text
//! 2022-08-03T23:15:32.439-0400  WARN  send  decision/engine.go:706  Cid QmcxB... wanted from peer 12D3KooWQk...
//! ```
//!
//! Only the token positions after `Cid` matter; whitespace width does not.

/// Source tag of the decision engine. Lines without it are not events.
pub const ENGINE_MARKER: &str = "decision/engine.go";

/// First token of the want payload.
pub const PAYLOAD_TOKEN: &str = "Cid";

const CID_INDEX: usize = 1;
const PEER_INDEX: usize = 5;

/// A peer asking for a CID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub cid: String,
    pub peer_id: String,
}

/// An engine line whose payload could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("no `Cid` payload in engine line")]
    MissingPayload,
    #[error("engine payload has {0} tokens, need at least 6")]
    Truncated(usize),
}

/// Extract a want event from one log line.
///
/// `Ok(None)` for lines that are not engine lines at all; `Err` for engine
/// lines with a malformed payload.
pub fn extract(line: &str) -> Result<Option<LogEvent>, ExtractError> {
    if line.is_empty() || !line.contains(ENGINE_MARKER) {
        return Ok(None);
    }

    let start = line.find(PAYLOAD_TOKEN).ok_or(ExtractError::MissingPayload)?;
    let tokens: Vec<&str> = line[start..].split_whitespace().take(PEER_INDEX + 1).collect();
    if tokens.len() <= PEER_INDEX {
        return Err(ExtractError::Truncated(tokens.len()));
    }

    Ok(Some(LogEvent {
        cid: tokens[CID_INDEX].to_string(),
        peer_id: tokens[PEER_INDEX].to_string(),
    }))
}
