//! Reversed paging: newest page first
//!
//! The prefix root is a navigator that always points at the current page
//! through a single replaceable plain relation. On rollover the navigator is
//! repointed and the new page links back to the sealed page, bounded by the
//! rollover timestamp when one is available, so readers entering at the root
//! always see the newest members first and can walk backwards in time.

use crate::config::ReversedPagedConfig;
use crate::error::Result;
use crate::scope::StrategyScope;
use crate::strategy::member_timestamp;
use ldes_model::{Record, RelationType, RelationValue};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ReversedPagedState {
    count: u64,
    last_timestamp_ms: Option<i64>,
}

/// Reversed page-based fragmentation strategy.
#[derive(Debug)]
pub struct ReversedPagedStrategy {
    config: ReversedPagedConfig,
    state: ReversedPagedState,
}

impl ReversedPagedStrategy {
    pub fn new(config: ReversedPagedConfig, saved: Option<&str>) -> Result<Self> {
        let state = match saved {
            Some(blob) => serde_json::from_str(blob)?,
            None => ReversedPagedState::default(),
        };
        Ok(Self { config, state })
    }

    pub fn bucketize(
        &mut self,
        record: &dyn Record,
        scope: &mut StrategyScope<'_>,
    ) -> Result<Vec<String>> {
        let timestamp = match &self.config.path {
            Some(path) => member_timestamp(record, path)?,
            None => None,
        };
        if let (Some(ts), Some(last)) = (timestamp, self.state.last_timestamp_ms) {
            if ts.timestamp_millis() < last {
                warn!(
                    member = record.id(),
                    timestamp = %ts,
                    "member is older than the current page; rejecting"
                );
                return Ok(vec![]);
            }
        }

        self.state.count += 1;
        let index = self.state.count / self.config.page_size;
        let root = scope.root();
        let current = scope.bucket(&format!("page-{index}"));

        if self.state.count == 1 {
            scope.add_relation(&root, RelationType::Relation, &current, None, None);
        } else if self.state.count % self.config.page_size == 0 {
            // Rollover: repoint the navigator, seal the old page and link the
            // new page back to it.
            let previous = scope.bucket(&format!("page-{}", index - 1));
            scope.remove_relation(&root, RelationType::Relation, &previous);
            scope.add_relation(&root, RelationType::Relation, &current, None, None);
            match timestamp {
                Some(ts) => scope.add_relation(
                    &current,
                    RelationType::LessThanOrEqualTo,
                    &previous,
                    Some(RelationValue::DateTime(ts)),
                    self.config.descriptor(),
                ),
                None => {
                    scope.add_relation(&current, RelationType::Relation, &previous, None, None)
                }
            }
            scope.mark_immutable(&previous);
        }

        if let Some(ts) = timestamp {
            self.state.last_timestamp_ms = Some(ts.timestamp_millis());
        }
        Ok(vec![current])
    }

    pub fn serialize_state(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldes_model::{BucketRegistry, RelationEvent, StreamMember};

    const TS: &str = "ex:time";

    fn member(i: usize, ts: &str) -> StreamMember {
        StreamMember::new(format!("urn:m:{i}")).with_plain(TS, ts)
    }

    fn strategy() -> ReversedPagedStrategy {
        ReversedPagedStrategy::new(
            ReversedPagedConfig::default()
                .with_page_size(2)
                .with_path(TS),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_navigator_repoints_on_rollover() {
        let mut strategy = strategy();
        let mut registry = BucketRegistry::new();
        let mut events: Vec<RelationEvent> = Vec::new();

        let inputs = [
            (0, "2024-01-01T00:00:00Z"),
            (1, "2024-01-01T01:00:00Z"),
            (2, "2024-01-01T02:00:00Z"),
        ];
        let mut out = Vec::new();
        for (i, ts) in inputs {
            let mut scope = StrategyScope::new("", &mut registry, &mut events);
            out.push(strategy.bucketize(&member(i, ts), &mut scope).unwrap());
        }
        assert_eq!(out[0], vec!["/page-0"]);
        assert_eq!(out[1], vec!["/page-1"]);
        assert_eq!(out[2], vec!["/page-1"]);

        // navigator holds exactly one link, to the current page
        let root_links = &registry.get("").unwrap().links;
        assert_eq!(root_links.len(), 1);
        assert_eq!(root_links[0].target, "/page-1");

        // sealed page reachable backwards through a bounded relation
        let page1_links = &registry.get("/page-1").unwrap().links;
        assert_eq!(page1_links.len(), 1);
        assert_eq!(page1_links[0].relation_type, RelationType::LessThanOrEqualTo);
        assert_eq!(page1_links[0].target, "/page-0");
        assert!(registry.get("/page-0").unwrap().is_immutable());

        // removal of the old navigator link was emitted
        assert!(events
            .iter()
            .any(|e| e.removal && e.origin.is_empty() && e.target == "/page-0"));
    }

    #[test]
    fn test_stale_member_is_rejected_not_fatal() {
        let mut strategy = strategy();
        let mut registry = BucketRegistry::new();
        let mut events = Vec::new();

        let mut scope = StrategyScope::new("", &mut registry, &mut events);
        strategy
            .bucketize(&member(0, "2024-01-01T05:00:00Z"), &mut scope)
            .unwrap();

        let mut scope = StrategyScope::new("", &mut registry, &mut events);
        let out = strategy
            .bucketize(&member(1, "2024-01-01T04:00:00Z"), &mut scope)
            .unwrap();
        assert!(out.is_empty());

        // stream continues afterwards
        let mut scope = StrategyScope::new("", &mut registry, &mut events);
        let out = strategy
            .bucketize(&member(2, "2024-01-01T06:00:00Z"), &mut scope)
            .unwrap();
        assert_eq!(out, vec!["/page-1"]);
    }
}
