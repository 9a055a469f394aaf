//! Strategy orchestration
//!
//! [`Bucketizer`] cascades each record through the configured strategy
//! pipeline. The frontier starts at the record's entry prefix; every
//! strategy fans the frontier out into the buckets it assigns, and the next
//! strategy runs once per resulting prefix. Strategy instances are
//! materialized lazily per (strategy index, prefix) pair, from their saved
//! state blob when the stream is resumed, and re-serialized by
//! [`Bucketizer::save`].
//!
//! Processing is single-threaded and synchronous per record: one record runs
//! through every strategy (including any cascade of bucket creation and
//! splitting) before the next. The caller controls batch boundaries and
//! snapshots state between batches or at shutdown.

use crate::config::StrategyConfig;
use crate::error::Result;
use crate::scope::StrategyScope;
use crate::state::StateSnapshot;
use crate::strategy::Strategy;
use ldes_model::{BucketRegistry, Record, RelationEvent};
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use tracing::debug;

/// Multi-strategy fragmentation orchestrator for one stream.
pub struct Bucketizer {
    configs: Vec<StrategyConfig>,
    registry: BucketRegistry,
    instances: FxHashMap<(usize, String), Strategy>,
    saved: StateSnapshot,
    events: Vec<RelationEvent>,
}

impl Bucketizer {
    /// Build an orchestrator from a strategy pipeline and an optional
    /// previously saved snapshot. Configuration errors (unknown strategy
    /// kind, invalid calendar nesting, zero page sizes) fail here, before
    /// any record is processed.
    pub fn new(configs: Vec<StrategyConfig>, save: Option<&str>) -> Result<Self> {
        for config in &configs {
            config.validate()?;
        }
        let saved = match save {
            Some(serialized) => StateSnapshot::decode(serialized)?,
            None => StateSnapshot::default(),
        };
        Ok(Self {
            configs,
            registry: BucketRegistry::new(),
            instances: FxHashMap::default(),
            saved,
            events: Vec::new(),
        })
    }

    /// Run one record through the pipeline, starting at `prefix` (usually
    /// the stream root). Returns the ids of the buckets the record belongs
    /// to; an empty result means every branch rejected or skipped it.
    pub fn bucketize(&mut self, record: &dyn Record, prefix: &str) -> Result<Vec<String>> {
        self.registry.get_or_create(prefix, true);
        let mut frontier = vec![prefix.to_string()];

        for (index, config) in self.configs.iter().enumerate() {
            let mut next = Vec::new();
            for current in &frontier {
                let strategy = match self.instances.entry((index, current.clone())) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        let blob = self.saved.get(current, index);
                        entry.insert(Strategy::from_config(config, blob)?)
                    }
                };
                let mut scope = StrategyScope::new(current, &mut self.registry, &mut self.events);
                for id in strategy.bucketize(record, &mut scope)? {
                    if !next.contains(&id) {
                        next.push(id);
                    }
                }
            }
            frontier = next;
            if frontier.is_empty() {
                debug!(
                    member = record.id(),
                    strategy = index,
                    "record left the pipeline without a bucket"
                );
                break;
            }
        }

        Ok(frontier)
    }

    /// Snapshot every strategy's state. Untouched prefixes keep the blob
    /// they were loaded with; live instances are re-serialized. The result
    /// restores an identically behaving orchestrator via
    /// [`Bucketizer::new`].
    pub fn save(&mut self) -> Result<String> {
        for ((index, prefix), strategy) in &self.instances {
            self.saved.put(prefix, *index, strategy.serialize_state()?);
        }
        self.saved.encode()
    }

    /// The shared bucket arena.
    pub fn registry(&self) -> &BucketRegistry {
        &self.registry
    }

    /// Mutable access for the external writer (consuming `empty` flags).
    pub fn registry_mut(&mut self) -> &mut BucketRegistry {
        &mut self.registry
    }

    /// Take the relation events accumulated since the last drain, in
    /// emission order.
    pub fn drain_relation_events(&mut self) -> Vec<RelationEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PagedConfig, SubjectConfig};
    use ldes_model::StreamMember;

    #[test]
    fn test_subject_then_paged_cascade() {
        let configs = vec![
            StrategyConfig::Subject(SubjectConfig::new("ex:sensor")),
            StrategyConfig::Paged(PagedConfig::default().with_page_size(2)),
        ];
        let mut bucketizer = Bucketizer::new(configs, None).unwrap();

        let records = [
            StreamMember::new("urn:m:0").with_plain("ex:sensor", "a1"),
            StreamMember::new("urn:m:1").with_plain("ex:sensor", "a2"),
            StreamMember::new("urn:m:2").with_plain("ex:sensor", "a2"),
        ];
        let mut out = Vec::new();
        for record in &records {
            out.push(bucketizer.bucketize(record, "").unwrap());
        }
        assert_eq!(out[0], vec!["/a1"]);
        assert_eq!(out[1], vec!["/a2"]);
        assert_eq!(out[2], vec!["/a2/page-1"]);
    }

    #[test]
    fn test_rejection_empties_the_frontier() {
        let configs = vec![StrategyConfig::Dump(
            crate::config::DumpConfig::default().with_path("ex:time"),
        )];
        let mut bucketizer = Bucketizer::new(configs, None).unwrap();

        let fresh = StreamMember::new("urn:m:0").with_plain("ex:time", "2024-01-02T00:00:00Z");
        let stale = StreamMember::new("urn:m:1").with_plain("ex:time", "2024-01-01T00:00:00Z");
        assert_eq!(bucketizer.bucketize(&fresh, "").unwrap(), vec![""]);
        assert!(bucketizer.bucketize(&stale, "").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_pipeline_fails_at_construction() {
        let configs = vec![StrategyConfig::Paged(
            PagedConfig::default().with_page_size(0),
        )];
        assert!(Bucketizer::new(configs, None).is_err());
    }
}
