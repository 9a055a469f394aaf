//! Multi-level calendar tree
//!
//! Descends a configurable hierarchy of calendar levels (year, then month,
//! then day-of-month, ...) per member timestamp. A node accepts members
//! until its level's `amount` is reached, after which the tree descends into
//! the next level. Before each descent, sibling nodes whose calendar range
//! has fallen behind the newest member by more than the configured buffer
//! are sealed, recursively down their subtrees.

use crate::config::{TimeBucketTreeConfig, TimeRange};
use crate::error::Result;
use crate::scope::StrategyScope;
use crate::strategy::member_timestamp;
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use ldes_model::{Record, RelationType, RelationValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

impl TimeRange {
    /// Canonical key of the unit containing `ts`.
    fn key(&self, ts: DateTime<Utc>) -> String {
        match self {
            TimeRange::Year => ts.year().to_string(),
            TimeRange::Month => MONTH_NAMES[ts.month0() as usize].to_string(),
            TimeRange::DayOfMonth => ts.day().to_string(),
            TimeRange::Hour => ts.hour().to_string(),
            TimeRange::Minute => ts.minute().to_string(),
            TimeRange::Second => ts.second().to_string(),
        }
    }

    /// Half-open bounds of the unit containing `ts`.
    fn bounds(&self, ts: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            TimeRange::Year => {
                let start = Utc
                    .with_ymd_and_hms(ts.year(), 1, 1, 0, 0, 0)
                    .single()
                    .unwrap_or(ts);
                let end = Utc
                    .with_ymd_and_hms(ts.year() + 1, 1, 1, 0, 0, 0)
                    .single()
                    .unwrap_or(ts);
                (start, end)
            }
            TimeRange::Month => {
                let start = Utc
                    .with_ymd_and_hms(ts.year(), ts.month(), 1, 0, 0, 0)
                    .single()
                    .unwrap_or(ts);
                let (next_year, next_month) = if ts.month() == 12 {
                    (ts.year() + 1, 1)
                } else {
                    (ts.year(), ts.month() + 1)
                };
                let end = Utc
                    .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
                    .single()
                    .unwrap_or(ts);
                (start, end)
            }
            TimeRange::DayOfMonth => {
                let start = Utc
                    .with_ymd_and_hms(ts.year(), ts.month(), ts.day(), 0, 0, 0)
                    .single()
                    .unwrap_or(ts);
                (start, start + Duration::days(1))
            }
            TimeRange::Hour => {
                let start = Utc
                    .with_ymd_and_hms(ts.year(), ts.month(), ts.day(), ts.hour(), 0, 0)
                    .single()
                    .unwrap_or(ts);
                (start, start + Duration::hours(1))
            }
            TimeRange::Minute => {
                let start = Utc
                    .with_ymd_and_hms(ts.year(), ts.month(), ts.day(), ts.hour(), ts.minute(), 0)
                    .single()
                    .unwrap_or(ts);
                (start, start + Duration::minutes(1))
            }
            TimeRange::Second => {
                let start = Utc
                    .with_ymd_and_hms(
                        ts.year(),
                        ts.month(),
                        ts.day(),
                        ts.hour(),
                        ts.minute(),
                        ts.second(),
                    )
                    .single()
                    .unwrap_or(ts);
                (start, start + Duration::seconds(1))
            }
        }
    }
}

/// Metadata of one created tree node, kept for the immutability sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeMeta {
    key: String,
    start_ms: i64,
    end_ms: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TreeState {
    /// Members placed per node key
    counts: BTreeMap<String, u64>,
    /// Created children per parent node key ("" = the prefix root)
    children: BTreeMap<String, Vec<NodeMeta>>,
}

/// Calendar-tree fragmentation strategy.
#[derive(Debug)]
pub struct TimeBucketTreeStrategy {
    config: TimeBucketTreeConfig,
    state: TreeState,
}

impl TimeBucketTreeStrategy {
    pub fn new(config: TimeBucketTreeConfig, saved: Option<&str>) -> Result<Self> {
        let state = match saved {
            Some(blob) => serde_json::from_str(blob)?,
            None => TreeState::default(),
        };
        Ok(Self { config, state })
    }

    /// Seal `key` and every node below it.
    fn seal_subtree(&self, scope: &mut StrategyScope<'_>, key: &str) {
        let id = scope.bucket(key);
        if scope.is_immutable(&id) {
            return;
        }
        scope.mark_immutable(&id);
        if let Some(children) = self.state.children.get(key) {
            for child in children.clone() {
                self.seal_subtree(scope, &child.key);
            }
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
        let ts_ms = ts.timestamp_millis();
        let horizon = ts_ms - self.config.time_buffer_ms;

        let levels = self.config.levels.clone();
        let mut parent_key = String::new(); // "" = the prefix root
        for (depth, level) in levels.iter().enumerate() {
            let key_part: Vec<String> = level.ranges.iter().map(|r| r.key(ts)).collect();
            let key_part = key_part.join("-");
            let node_key = if parent_key.is_empty() {
                key_part
            } else {
                format!("{parent_key}/{key_part}")
            };
            // bounds of the level's finest range
            let (start, end) = level
                .ranges
                .last()
                .map(|r| r.bounds(ts))
                .unwrap_or((ts, ts));

            // seal siblings that have fallen behind the horizon
            let expired: Vec<String> = self
                .state
                .children
                .get(&parent_key)
                .map(|siblings| {
                    siblings
                        .iter()
                        .filter(|s| s.key != node_key && s.end_ms < horizon)
                        .map(|s| s.key.clone())
                        .collect()
                })
                .unwrap_or_default();
            for key in expired {
                self.seal_subtree(scope, &key);
            }

            // create the node on demand, bounded from its parent
            let known = self
                .state
                .children
                .get(&parent_key)
                .is_some_and(|siblings| siblings.iter().any(|s| s.key == node_key));
            if !known {
                let parent_id = if parent_key.is_empty() {
                    scope.root()
                } else {
                    scope.bucket(&parent_key)
                };
                let node_id = scope.bucket(&node_key);
                scope.add_relation(
                    &parent_id,
                    RelationType::GreaterThanOrEqualTo,
                    &node_id,
                    Some(RelationValue::DateTime(start)),
                    Some(self.config.descriptor()),
                );
                scope.add_relation(
                    &parent_id,
                    RelationType::LessThan,
                    &node_id,
                    Some(RelationValue::DateTime(end)),
                    Some(self.config.descriptor()),
                );
                self.state
                    .children
                    .entry(parent_key.clone())
                    .or_default()
                    .push(NodeMeta {
                        key: node_key.clone(),
                        start_ms: start.timestamp_millis(),
                        end_ms: end.timestamp_millis(),
                    });
            }

            let count = self.state.counts.entry(node_key.clone()).or_insert(0);
            let deepest = depth == levels.len() - 1;
            if *count < level.amount || deepest {
                *count += 1;
                return Ok(vec![scope.bucket(&node_key)]);
            }
            parent_key = node_key;
        }

        unreachable!("level list is validated non-empty")
    }

    pub fn serialize_state(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.state)?)
    }
}
