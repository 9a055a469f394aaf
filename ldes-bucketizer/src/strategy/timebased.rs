//! Adaptive size/time-bounded paging
//!
//! Maintains a frontier of mutable leaf buckets, oldest-eligible first. Each
//! leaf covers a half-open time range encoded in its key
//! (`start-ms_span-ms_page`). A member walks the frontier: leaves whose
//! range lies entirely in the past are sealed and dropped; the leaf owning
//! the member's timestamp accepts it unless full, in which case the leaf
//! either rolls over to a same-span sibling page (when a split would produce
//! ranges below the configured minimum span) or splits into `k` equal-span
//! children. Splits cascade iteratively: a child can itself be over capacity
//! for the retained members.
//!
//! The input stream must be time-ordered; a regression is a broken
//! precondition and fails the whole run.

use crate::config::TimebasedConfig;
use crate::error::{BucketizerError, Result};
use crate::scope::StrategyScope;
use crate::strategy::member_timestamp;
use ldes_model::{Record, RelationType, RelationValue};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Span of a synthesized top-level bucket: 365 days in ms.
const YEAR_SPAN_MS: i64 = 31_536_000_000;

#[derive(Debug, Default, Serialize, Deserialize)]
struct TimebasedState {
    /// Mutable leaf bucket keys, oldest-eligible first
    mutable_leaves: VecDeque<String>,
    /// Member timestamps of the current front candidate bucket
    members: Vec<i64>,
}

/// Adaptive timebased fragmentation strategy.
#[derive(Debug)]
pub struct TimebasedStrategy {
    config: TimebasedConfig,
    state: TimebasedState,
}

fn encode_key(start_ms: i64, span_ms: i64, page: u32) -> String {
    format!("{start_ms}_{span_ms}_{page}")
}

fn decode_key(key: &str) -> Result<(i64, i64, u32)> {
    let mut parts = key.split('_');
    let parse = |part: Option<&str>| {
        part.and_then(|p| p.parse().ok())
            .ok_or_else(|| BucketizerError::CorruptKey(key.to_string()))
    };
    let start_ms: i64 = parse(parts.next())?;
    let span_ms: i64 = parse(parts.next())?;
    let page: i64 = parse(parts.next())?;
    if parts.next().is_some() || span_ms <= 0 || page < 0 {
        return Err(BucketizerError::CorruptKey(key.to_string()));
    }
    Ok((start_ms, span_ms, page as u32))
}

impl TimebasedStrategy {
    pub fn new(config: TimebasedConfig, saved: Option<&str>) -> Result<Self> {
        let state = match saved {
            Some(blob) => serde_json::from_str(blob)?,
            None => TimebasedState::default(),
        };
        Ok(Self { config, state })
    }

    /// Bound relations (`>= start`, `< end`) from `origin` to `target`.
    fn add_bounds(
        &self,
        scope: &mut StrategyScope<'_>,
        origin: &str,
        target: &str,
        start_ms: i64,
        end_ms: i64,
    ) {
        scope.add_relation(
            origin,
            RelationType::GreaterThanOrEqualTo,
            target,
            Some(RelationValue::from_epoch_millis(start_ms)),
            Some(self.config.descriptor()),
        );
        scope.add_relation(
            origin,
            RelationType::LessThan,
            target,
            Some(RelationValue::from_epoch_millis(end_ms)),
            Some(self.config.descriptor()),
        );
    }

    /// Seal `closed` and, when no mutable leaf shares its parent, seal the
    /// parent too (the root is exempt).
    fn seal_leaf(&self, scope: &mut StrategyScope<'_>, closed: &str) {
        scope.mark_immutable(closed);
        let Some(parent) = scope.parent_of(closed) else {
            return;
        };
        if scope.is_root(&parent) {
            return;
        }
        let sibling_still_open = self
            .state
            .mutable_leaves
            .iter()
            .any(|key| scope.parent_of(&scope.bucket_id(key)).as_deref() == Some(parent.as_str()));
        if !sibling_still_open {
            scope.mark_immutable(&parent);
        }
    }

    /// Split the front bucket into `k` equal-span children. Children whose
    /// range ends at or before `ts` can never receive a member of an ordered
    /// stream and are sealed at once; the rest join the front of the
    /// frontier. Returns the start of the child owning `ts`.
    fn split_front(
        &mut self,
        scope: &mut StrategyScope<'_>,
        front: &str,
        start_ms: i64,
        span_ms: i64,
        ts: i64,
    ) -> i64 {
        let parent_id = scope.bucket(front);
        // the parent keeps its members only logically; the writer must
        // redistribute them into the children
        scope.mark_empty(&parent_id);
        self.state.mutable_leaves.pop_front();

        let k = self.config.k;
        let child_span = span_ms / k;
        let mut owning_start = start_ms;
        let mut insert_at = 0;
        for i in 0..k {
            let c_start = start_ms + i * child_span;
            // last child absorbs the integer-division remainder
            let c_span = if i == k - 1 {
                span_ms - i * child_span
            } else {
                child_span
            };
            let c_key = encode_key(c_start, c_span, 0);
            let c_id = scope.bucket(&c_key);
            self.add_bounds(scope, &parent_id, &c_id, c_start, c_start + c_span);

            if c_start + c_span <= ts {
                scope.mark_immutable(&c_id);
            } else {
                self.state.mutable_leaves.insert(insert_at, c_key);
                insert_at += 1;
            }
            if c_start <= ts && ts < c_start + c_span {
                owning_start = c_start;
            }
        }
        debug!(
            bucket = %parent_id,
            fanout = k,
            child_span_ms = child_span,
            "split full bucket"
        );
        owning_start
    }

    pub fn bucketize(
        &mut self,
        record: &dyn Record,
        scope: &mut StrategyScope<'_>,
    ) -> Result<Vec<String>> {
        let Some(ts_value) = member_timestamp(record, &self.config.path)? else {
            warn!(
                member = record.id(),
                path = %self.config.path,
                "member has no timestamp; skipping"
            );
            return Ok(vec![]);
        };
        let ts = ts_value.timestamp_millis();

        loop {
            let front = match self.state.mutable_leaves.front().cloned() {
                Some(key) => key,
                None => {
                    // frontier exhausted: open a year-long bucket under root
                    let key = encode_key(ts, YEAR_SPAN_MS, 0);
                    let root = scope.root();
                    let bucket = scope.bucket(&key);
                    self.add_bounds(scope, &root, &bucket, ts, ts + YEAR_SPAN_MS);
                    self.state.mutable_leaves.push_back(key.clone());
                    self.state.members.clear();
                    key
                }
            };
            let (start_ms, span_ms, page) = decode_key(&front)?;

            if ts < start_ms {
                return Err(BucketizerError::OutOfOrderMember {
                    bucket: scope.bucket_id(&front),
                    got: ts_value.to_rfc3339(),
                    expected: RelationValue::from_epoch_millis(start_ms).to_string(),
                });
            }

            if ts >= start_ms + span_ms {
                // range fully in the past: retire the leaf
                let closed = scope.bucket(&front);
                self.state.mutable_leaves.pop_front();
                self.state.members.clear();
                self.seal_leaf(scope, &closed);
                continue;
            }

            // the front bucket owns ts; check capacity
            if self.state.members.len() >= self.config.max_size {
                if span_ms / self.config.k < self.config.min_bucket_span_ms {
                    // too fine to split: roll over to a sibling page
                    let next_key = encode_key(start_ms, span_ms, page + 1);
                    let old_id = scope.bucket(&front);
                    let next_id = scope.bucket(&next_key);
                    scope.mark_immutable(&old_id);
                    scope.add_relation(&old_id, RelationType::Relation, &next_id, None, None);
                    self.state.mutable_leaves[0] = next_key;
                    self.state.members.clear();
                } else {
                    let owning_start = self.split_front(scope, &front, start_ms, span_ms, ts);
                    // members that fell into earlier children stay theirs;
                    // the candidate keeps only its own
                    self.state.members.retain(|m| *m >= owning_start);
                }
                continue;
            }

            // room available: verify order within the bucket and accept
            if let Some(&last) = self.state.members.last() {
                if ts < last {
                    return Err(BucketizerError::OutOfOrderMember {
                        bucket: scope.bucket_id(&front),
                        got: ts_value.to_rfc3339(),
                        expected: RelationValue::from_epoch_millis(last).to_string(),
                    });
                }
            }
            self.state.members.push(ts);
            return Ok(vec![scope.bucket(&front)]);
        }
    }

    pub fn serialize_state(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.state)?)
    }
}
