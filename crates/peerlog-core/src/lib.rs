//! peerlog-core — log extraction rules, content table, and peer record types.
//! Everything here is pure; I/O lives in peerlog-services.

pub mod config;
pub mod content;
pub mod event;
pub mod path;
pub mod record;

pub use content::{ContentTable, FileMetadata};
pub use event::{extract, ExtractError, LogEvent};
pub use record::{PeerAddressInfo, PeerRecord};
