//! Hour-window partitioning
//!
//! Tracks the wall-clock hour of the newest member. The first window is the
//! prefix root; when a member's timestamp enters a later hour, the current
//! bucket is sealed and a new bucket keyed by the hour start is opened. The
//! two buckets are linked either by a symmetric pair of plain relations or
//! by greater-or-equal/less-than bounds on the hour boundary.

use crate::config::HourConfig;
use crate::error::Result;
use crate::scope::StrategyScope;
use crate::strategy::member_timestamp;
use chrono::{DateTime, TimeZone, Timelike, Utc};
use ldes_model::{Record, RelationType, RelationValue};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Default, Serialize, Deserialize)]
struct HourState {
    /// Start of the current hour window, epoch ms
    current_start_ms: Option<i64>,
    /// Whether the current window is the first one (the prefix root)
    first_window: bool,
}

/// Hour-based fragmentation strategy.
#[derive(Debug)]
pub struct HourStrategy {
    config: HourConfig,
    state: HourState,
}

fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

fn hour_key(start_ms: i64) -> String {
    let start = Utc
        .timestamp_millis_opt(start_ms)
        .single()
        .unwrap_or_default();
    start.format("%Y-%m-%dT%H:00:00Z").to_string()
}

impl HourStrategy {
    pub fn new(config: HourConfig, saved: Option<&str>) -> Result<Self> {
        let state = match saved {
            Some(blob) => serde_json::from_str(blob)?,
            None => HourState::default(),
        };
        Ok(Self { config, state })
    }

    fn current_bucket(&mut self, scope: &mut StrategyScope<'_>, start_ms: i64) -> String {
        if self.state.first_window {
            scope.root()
        } else {
            scope.bucket(&hour_key(start_ms))
        }
    }

    pub fn bucketize(
        &mut self,
        record: &dyn Record,
        scope: &mut StrategyScope<'_>,
    ) -> Result<Vec<String>> {
        let Some(ts) = member_timestamp(record, &self.config.path)? else {
            warn!(
                member = record.id(),
                path = %self.config.path,
                "member has no timestamp; skipping"
            );
            return Ok(vec![]);
        };
        let hour_start = truncate_to_hour(ts).timestamp_millis();

        match self.state.current_start_ms {
            None => {
                self.state.current_start_ms = Some(hour_start);
                self.state.first_window = true;
                Ok(vec![scope.root()])
            }
            // members at (or before) the current window stay in it
            Some(current) if hour_start <= current => {
                Ok(vec![self.current_bucket(scope, current)])
            }
            Some(current) => {
                let old = self.current_bucket(scope, current);
                let new = scope.bucket(&hour_key(hour_start));
                scope.mark_immutable(&old);

                if self.config.unordered_relations {
                    scope.add_relation(&old, RelationType::Relation, &new, None, None);
                    scope.add_relation(&new, RelationType::Relation, &old, None, None);
                } else {
                    let boundary = RelationValue::from_epoch_millis(hour_start);
                    scope.add_relation(
                        &old,
                        RelationType::GreaterThanOrEqualTo,
                        &new,
                        Some(boundary.clone()),
                        Some(self.config.descriptor()),
                    );
                    scope.add_relation(
                        &new,
                        RelationType::LessThan,
                        &old,
                        Some(boundary),
                        Some(self.config.descriptor()),
                    );
                }

                self.state.current_start_ms = Some(hour_start);
                self.state.first_window = false;
                Ok(vec![new])
            }
        }
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

    fn run(inputs: &[&str], unordered: bool) -> (Vec<Vec<String>>, BucketRegistry) {
        let mut config = HourConfig::new(TS);
        if unordered {
            config = config.with_unordered_relations();
        }
        let mut strategy = HourStrategy::new(config, None).unwrap();
        let mut registry = BucketRegistry::new();
        let mut events: Vec<RelationEvent> = Vec::new();
        let mut out = Vec::new();
        for (i, ts) in inputs.iter().enumerate() {
            let mut scope = StrategyScope::new("", &mut registry, &mut events);
            out.push(strategy.bucketize(&member(i, ts), &mut scope).unwrap());
        }
        (out, registry)
    }

    #[test]
    fn test_same_hour_shares_bucket() {
        let (out, _) = run(
            &["2024-03-01T14:05:00Z", "2024-03-01T14:55:00Z"],
            false,
        );
        assert_eq!(out[0], vec![""]);
        assert_eq!(out[1], vec![""]);
    }

    #[test]
    fn test_new_hour_seals_and_bounds_old_bucket() {
        let (out, registry) = run(
            &["2024-03-01T14:05:00Z", "2024-03-01T15:10:00Z"],
            false,
        );
        assert_eq!(out[1], vec!["/2024-03-01T15:00:00Z"]);
        assert!(registry.get("").unwrap().is_immutable());

        let forward = &registry.get("").unwrap().links[0];
        assert_eq!(forward.relation_type, RelationType::GreaterThanOrEqualTo);
        assert_eq!(forward.value.as_ref().unwrap().to_string(), "2024-03-01T15:00:00.000Z");

        let backward = &registry.get("/2024-03-01T15:00:00Z").unwrap().links[0];
        assert_eq!(backward.relation_type, RelationType::LessThan);
        assert_eq!(backward.target, "");
    }

    #[test]
    fn test_unordered_relations_are_symmetric_plain_links() {
        let (_, registry) = run(
            &["2024-03-01T14:05:00Z", "2024-03-01T15:10:00Z"],
            true,
        );
        let forward = &registry.get("").unwrap().links[0];
        let backward = &registry.get("/2024-03-01T15:00:00Z").unwrap().links[0];
        assert_eq!(forward.relation_type, RelationType::Relation);
        assert_eq!(backward.relation_type, RelationType::Relation);
        assert!(forward.value.is_none());
    }

    #[test]
    fn test_hour_skips_still_chain_consecutive_buckets() {
        let (out, registry) = run(
            &[
                "2024-03-01T14:05:00Z",
                "2024-03-01T16:10:00Z",
                "2024-03-01T16:20:00Z",
            ],
            false,
        );
        // jumping 14h -> 16h links root directly to the 16h bucket
        assert_eq!(out[1], vec!["/2024-03-01T16:00:00Z"]);
        assert_eq!(out[2], vec!["/2024-03-01T16:00:00Z"]);
        assert_eq!(registry.get("").unwrap().links[0].target, "/2024-03-01T16:00:00Z");
    }
}
