//! Subject-equality partitioning
//!
//! Members are grouped by the distinct values of a configured attribute
//! path. The first time a value is seen its bucket is created and linked
//! from the root with an equal-to relation; repeats reuse the bucket
//! silently. The bucket key is either the matching name-path value or the
//! percent-encoded raw value.

use crate::config::SubjectConfig;
use crate::error::Result;
use crate::scope::StrategyScope;
use ldes_model::{Record, RelationType, RelationValue};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SubjectState {
    seen: BTreeSet<String>,
}

/// Subject-based fragmentation strategy.
#[derive(Debug)]
pub struct SubjectStrategy {
    config: SubjectConfig,
    state: SubjectState,
}

impl SubjectStrategy {
    pub fn new(config: SubjectConfig, saved: Option<&str>) -> Result<Self> {
        let state = match saved {
            Some(blob) => serde_json::from_str(blob)?,
            None => SubjectState::default(),
        };
        Ok(Self { config, state })
    }

    fn default_bucket(&mut self, scope: &mut StrategyScope<'_>, key: &str) -> Vec<String> {
        let bucket = scope.bucket(key);
        if self.state.seen.insert(key.to_string()) {
            let root = scope.root();
            scope.add_relation(&root, RelationType::Relation, &bucket, None, None);
        }
        vec![bucket]
    }

    pub fn bucketize(
        &mut self,
        record: &dyn Record,
        scope: &mut StrategyScope<'_>,
    ) -> Result<Vec<String>> {
        let values = record.values(&self.config.path);
        if values.is_empty() {
            return match self.config.default_name.clone() {
                Some(default) => Ok(self.default_bucket(scope, &default)),
                None => {
                    warn!(
                        member = record.id(),
                        path = %self.config.path,
                        "member has no value for the subject path; skipping"
                    );
                    Ok(vec![])
                }
            };
        }

        let names = self
            .config
            .name_path
            .as_ref()
            .map(|path| record.values(path));

        let mut assigned = Vec::new();
        for (i, value) in values.iter().enumerate() {
            let key = match names.as_ref().and_then(|names| names.get(i)) {
                Some(name) => name.value.clone(),
                None => utf8_percent_encode(&value.value, NON_ALPHANUMERIC).to_string(),
            };
            let bucket = scope.bucket(&key);
            if self.state.seen.insert(key) {
                let root = scope.root();
                scope.add_relation(
                    &root,
                    RelationType::EqualTo,
                    &bucket,
                    Some(RelationValue::Text(value.value.clone())),
                    Some(self.config.descriptor()),
                );
            }
            if !assigned.contains(&bucket) {
                assigned.push(bucket);
            }
        }
        Ok(assigned)
    }

    pub fn serialize_state(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldes_model::{BucketRegistry, RelationEvent, StreamMember};

    const PATH: &str = "ex:sensor";

    fn run(
        strategy: &mut SubjectStrategy,
        registry: &mut BucketRegistry,
        events: &mut Vec<RelationEvent>,
        member: &StreamMember,
    ) -> Vec<String> {
        let mut scope = StrategyScope::new("", registry, events);
        strategy.bucketize(member, &mut scope).unwrap()
    }

    #[test]
    fn test_identical_values_map_to_same_bucket() {
        let mut strategy = SubjectStrategy::new(SubjectConfig::new(PATH), None).unwrap();
        let mut registry = BucketRegistry::new();
        let mut events = Vec::new();

        let a = StreamMember::new("urn:m:0").with_plain(PATH, "a1");
        let b = StreamMember::new("urn:m:1").with_plain(PATH, "a2");
        let b2 = StreamMember::new("urn:m:2").with_plain(PATH, "a2");

        assert_eq!(run(&mut strategy, &mut registry, &mut events, &a), vec!["/a1"]);
        assert_eq!(run(&mut strategy, &mut registry, &mut events, &b), vec!["/a2"]);
        assert_eq!(run(&mut strategy, &mut registry, &mut events, &b2), vec!["/a2"]);

        // one equal-to relation per distinct value, not per member
        let root_links = &registry.get("").unwrap().links;
        assert_eq!(root_links.len(), 2);
        assert!(root_links
            .iter()
            .all(|l| l.relation_type == RelationType::EqualTo));
    }

    #[test]
    fn test_raw_values_are_percent_encoded() {
        let mut strategy = SubjectStrategy::new(SubjectConfig::new(PATH), None).unwrap();
        let mut registry = BucketRegistry::new();
        let mut events = Vec::new();

        let member = StreamMember::new("urn:m:0").with_plain(PATH, "https://example.org/s/1");
        let out = run(&mut strategy, &mut registry, &mut events, &member);
        assert_eq!(out, vec!["/https%3A%2F%2Fexample%2Eorg%2Fs%2F1"]);
    }

    #[test]
    fn test_name_path_overrides_key() {
        let config = SubjectConfig::new(PATH).with_name_path("ex:label");
        let mut strategy = SubjectStrategy::new(config, None).unwrap();
        let mut registry = BucketRegistry::new();
        let mut events = Vec::new();

        let member = StreamMember::new("urn:m:0")
            .with_plain(PATH, "https://example.org/s/1")
            .with_plain("ex:label", "sensor-one");
        let out = run(&mut strategy, &mut registry, &mut events, &member);
        assert_eq!(out, vec!["/sensor-one"]);

        // relation value still carries the raw attribute value
        let root_links = &registry.get("").unwrap().links;
        assert_eq!(
            root_links[0].value,
            Some(RelationValue::Text("https://example.org/s/1".into()))
        );
    }

    #[test]
    fn test_missing_value_without_default_skips() {
        let mut strategy = SubjectStrategy::new(SubjectConfig::new(PATH), None).unwrap();
        let mut registry = BucketRegistry::new();
        let mut events = Vec::new();

        let member = StreamMember::new("urn:m:0");
        assert!(run(&mut strategy, &mut registry, &mut events, &member).is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn test_missing_value_with_default_uses_default_bucket() {
        let config = SubjectConfig::new(PATH).with_default_name("other");
        let mut strategy = SubjectStrategy::new(config, None).unwrap();
        let mut registry = BucketRegistry::new();
        let mut events = Vec::new();

        let member = StreamMember::new("urn:m:0");
        assert_eq!(
            run(&mut strategy, &mut registry, &mut events, &member),
            vec!["/other"]
        );
        // plain link from root, emitted once
        let member2 = StreamMember::new("urn:m:1");
        run(&mut strategy, &mut registry, &mut events, &member2);
        assert_eq!(registry.get("").unwrap().links.len(), 1);
    }

    #[test]
    fn test_multi_valued_member_lands_in_every_bucket() {
        let mut strategy = SubjectStrategy::new(SubjectConfig::new(PATH), None).unwrap();
        let mut registry = BucketRegistry::new();
        let mut events = Vec::new();

        let member = StreamMember::new("urn:m:0")
            .with_plain(PATH, "a")
            .with_plain(PATH, "b");
        let out = run(&mut strategy, &mut registry, &mut events, &member);
        assert_eq!(out, vec!["/a", "/b"]);
    }
}
