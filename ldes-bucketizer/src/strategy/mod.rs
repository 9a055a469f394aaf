//! Fragmentation strategies
//!
//! One module per strategy kind; [`Strategy`] is the closed dispatch enum
//! selected at configuration-parse time. Every strategy follows the same
//! contract: construction from its config plus an optional previously
//! serialized state blob, a deterministic `bucketize` that returns the ids
//! of the buckets a record belongs to (empty = rejected/skipped), and
//! `serialize_state` for the save snapshot.

pub mod dump;
pub mod hour;
pub mod paged;
pub mod reversed;
pub mod rtree;
pub mod subject;
pub mod time_bucket_tree;
pub mod timebased;

use crate::config::StrategyConfig;
use crate::error::Result;
use crate::scope::StrategyScope;
use chrono::{DateTime, Utc};
use ldes_model::{parse_timestamp, Record};

pub use dump::DumpStrategy;
pub use hour::HourStrategy;
pub use paged::PagedStrategy;
pub use reversed::ReversedPagedStrategy;
pub use rtree::RTreeStrategy;
pub use subject::SubjectStrategy;
pub use time_bucket_tree::TimeBucketTreeStrategy;
pub use timebased::TimebasedStrategy;

/// A fragmentation strategy instance, scoped to one prefix.
#[derive(Debug)]
pub enum Strategy {
    Paged(PagedStrategy),
    ReversedPaged(ReversedPagedStrategy),
    Subject(SubjectStrategy),
    Hour(HourStrategy),
    Dump(DumpStrategy),
    Timebased(TimebasedStrategy),
    Rtree(RTreeStrategy),
    TimeBucketTree(TimeBucketTreeStrategy),
}

impl Strategy {
    /// Materialize a strategy from its configuration and an optional saved
    /// state blob. A fresh instance is created when `saved` is `None`.
    pub fn from_config(config: &StrategyConfig, saved: Option<&str>) -> Result<Self> {
        Ok(match config {
            StrategyConfig::Paged(c) => Strategy::Paged(PagedStrategy::new(c.clone(), saved)?),
            StrategyConfig::ReversedPaged(c) => {
                Strategy::ReversedPaged(ReversedPagedStrategy::new(c.clone(), saved)?)
            }
            StrategyConfig::Subject(c) => {
                Strategy::Subject(SubjectStrategy::new(c.clone(), saved)?)
            }
            StrategyConfig::Hour(c) => Strategy::Hour(HourStrategy::new(c.clone(), saved)?),
            StrategyConfig::Dump(c) => Strategy::Dump(DumpStrategy::new(c.clone(), saved)?),
            StrategyConfig::Timebased(c) => {
                Strategy::Timebased(TimebasedStrategy::new(c.clone(), saved)?)
            }
            StrategyConfig::Rtree(c) => Strategy::Rtree(RTreeStrategy::new(c.clone(), saved)?),
            StrategyConfig::TimeBucketTree(c) => {
                Strategy::TimeBucketTree(TimeBucketTreeStrategy::new(c.clone(), saved)?)
            }
        })
    }

    /// Assign `record` to buckets under the scope's prefix.
    pub fn bucketize(
        &mut self,
        record: &dyn Record,
        scope: &mut StrategyScope<'_>,
    ) -> Result<Vec<String>> {
        match self {
            Strategy::Paged(s) => s.bucketize(record, scope),
            Strategy::ReversedPaged(s) => s.bucketize(record, scope),
            Strategy::Subject(s) => s.bucketize(record, scope),
            Strategy::Hour(s) => s.bucketize(record, scope),
            Strategy::Dump(s) => s.bucketize(record, scope),
            Strategy::Timebased(s) => s.bucketize(record, scope),
            Strategy::Rtree(s) => s.bucketize(record, scope),
            Strategy::TimeBucketTree(s) => s.bucketize(record, scope),
        }
    }

    /// Serialize this instance's state for the save snapshot.
    pub fn serialize_state(&self) -> Result<String> {
        match self {
            Strategy::Paged(s) => s.serialize_state(),
            Strategy::ReversedPaged(s) => s.serialize_state(),
            Strategy::Subject(s) => s.serialize_state(),
            Strategy::Hour(s) => s.serialize_state(),
            Strategy::Dump(s) => s.serialize_state(),
            Strategy::Timebased(s) => s.serialize_state(),
            Strategy::Rtree(s) => s.serialize_state(),
            Strategy::TimeBucketTree(s) => s.serialize_state(),
        }
    }
}

/// Evaluate the first timestamp value of `path` against `record`.
///
/// Returns `Ok(None)` when the record has no value for the path; an
/// unparseable value is an error (a timestamped stream carrying garbage
/// timestamps is a broken precondition, not a skippable member).
pub(crate) fn member_timestamp(
    record: &dyn Record,
    path: &str,
) -> Result<Option<DateTime<Utc>>> {
    match record.values(path).first() {
        Some(value) => Ok(Some(parse_timestamp(&value.value)?)),
        None => Ok(None),
    }
}
