//! Peer records and the merge rule that keeps them append-only.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

/// One peer as returned by a findpeer lookup. Carries no history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddressInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Addrs", default, deserialize_with = "null_as_empty")]
    pub addrs: Vec<String>,
}

/// Persisted sighting history for one peer.
///
/// Invariants: `addrs` has no duplicates and keeps first-seen order;
/// `accessed_time` only ever grows, one entry per merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Addrs", default, deserialize_with = "null_as_empty")]
    pub addrs: Vec<String>,
    #[serde(rename = "AccessedTime", default, deserialize_with = "null_as_empty")]
    pub accessed_time: Vec<String>,
}

impl PeerRecord {
    /// Fold a fresh lookup into the previous record, if any.
    ///
    /// Addresses: fresh ones in order, then unseen existing ones.
    /// History: existing entries, then `now`.
    pub fn merge(existing: Option<PeerRecord>, fresh: PeerAddressInfo, now: String) -> Self {
        let (old_addrs, mut accessed_time) = match existing {
            Some(record) => (record.addrs, record.accessed_time),
            None => (Vec::new(), Vec::new()),
        };

        let mut seen = HashSet::new();
        let addrs = fresh
            .addrs
            .into_iter()
            .chain(old_addrs)
            .filter(|addr| seen.insert(addr.clone()))
            .collect();

        accessed_time.push(now);

        Self {
            id: fresh.id,
            addrs,
            accessed_time,
        }
    }
}

/// Records written by older tooling serialize empty lists as `null`.
pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
