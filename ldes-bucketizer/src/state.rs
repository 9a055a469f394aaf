//! Persisted orchestrator state
//!
//! One snapshot per stream: a mapping from prefix to the opaque serialized
//! state of each strategy index that has run under that prefix. The blobs
//! themselves are produced and consumed by the strategies; the snapshot only
//! routes them.

use crate::error::Result;
use std::collections::BTreeMap;

/// Snapshot of every strategy's state, keyed by prefix then strategy index.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    prefixes: BTreeMap<String, BTreeMap<usize, String>>,
}

impl StateSnapshot {
    /// Decode a snapshot produced by [`StateSnapshot::encode`].
    pub fn decode(serialized: &str) -> Result<Self> {
        Ok(Self {
            prefixes: serde_json::from_str(serialized)?,
        })
    }

    /// Serialize the snapshot. The output round-trips through
    /// [`StateSnapshot::decode`] with identical subsequent behavior.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.prefixes)?)
    }

    /// The saved blob for a (prefix, strategy index) pair.
    pub fn get(&self, prefix: &str, index: usize) -> Option<&str> {
        self.prefixes
            .get(prefix)
            .and_then(|per_index| per_index.get(&index))
            .map(String::as_str)
    }

    /// Store (or replace) the blob for a (prefix, strategy index) pair.
    pub fn put(&mut self, prefix: &str, index: usize, blob: String) {
        self.prefixes
            .entry(prefix.to_string())
            .or_default()
            .insert(index, blob);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_round_trip() {
        let mut snapshot = StateSnapshot::default();
        snapshot.put("", 0, r#"{"count":3}"#.to_string());
        snapshot.put("/a2", 1, r#"{"count":2}"#.to_string());

        let encoded = snapshot.encode().unwrap();
        let decoded = StateSnapshot::decode(&encoded).unwrap();
        assert_eq!(decoded.get("", 0), Some(r#"{"count":3}"#));
        assert_eq!(decoded.get("/a2", 1), Some(r#"{"count":2}"#));
        assert_eq!(decoded.get("/a2", 0), None);
    }
}
