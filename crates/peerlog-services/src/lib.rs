//! peerlog-services — the I/O side of peerlog: lookups, record storage,
//! log following, and the ingest pipeline that ties them together.

pub mod follow;
pub mod ingest;
pub mod record_store;
pub mod resolver;
pub mod stats;

pub use follow::LineFollower;
pub use ingest::IngestPipeline;
pub use record_store::{RecordStore, StoreError};
pub use resolver::{HttpResolver, PeerLookup, ResolveError};
pub use stats::IngestStats;
