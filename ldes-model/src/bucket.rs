//! Bucket and relation types
//!
//! The fragmentation tree is stored as an arena: [`BucketRegistry`] owns
//! every [`Bucket`] keyed by id, and buckets reference their parent and
//! relation targets by id. This keeps the parent/child graph free of
//! ownership cycles.
//!
//! Parent links are established exclusively through
//! [`BucketRegistry::add_relation`]: the origin gains an outgoing relation
//! and the target's parent becomes the origin. A bucket has at most one
//! parent (last writer wins); callers must not create cycles.

use crate::value::RelationValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Typed relation kinds between buckets.
///
/// Comparison kinds are predicates over the relation's [`RelationValue`];
/// `Relation` is a plain navigable link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    /// Plain, untyped link
    Relation,
    /// Members below the target equal the value
    EqualTo,
    /// Members below the target are less than the value
    LessThan,
    /// Members below the target are less than or equal to the value
    LessThanOrEqualTo,
    /// Members below the target are greater than the value
    GreaterThan,
    /// Members below the target are greater than or equal to the value
    GreaterThanOrEqualTo,
    /// The target's members are geospatially contained in the value geometry
    GeospatiallyContains,
}

impl RelationType {
    /// The TREE vocabulary IRI for this relation kind.
    pub fn iri(&self) -> &'static str {
        use ldes_vocab::tree;
        match self {
            RelationType::Relation => tree::RELATION,
            RelationType::EqualTo => tree::EQUAL_TO_RELATION,
            RelationType::LessThan => tree::LESS_THAN_RELATION,
            RelationType::LessThanOrEqualTo => tree::LESS_THAN_OR_EQUAL_TO_RELATION,
            RelationType::GreaterThan => tree::GREATER_THAN_RELATION,
            RelationType::GreaterThanOrEqualTo => tree::GREATER_THAN_OR_EQUAL_TO_RELATION,
            RelationType::GeospatiallyContains => tree::GEOSPATIALLY_CONTAINS_RELATION,
        }
    }
}

/// Directed edge between buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Relation kind
    pub relation_type: RelationType,
    /// Destination bucket id (resolved through the registry)
    pub target: String,
    /// Optional typed literal used by range/equality relations
    pub value: Option<RelationValue>,
    /// Which member attribute the value refers to; opaque to the engine
    pub path: Option<String>,
}

/// A node in the fragmentation tree.
#[derive(Debug, Clone)]
pub struct Bucket {
    /// Stable hierarchical key, globally unique within a stream
    pub id: String,
    /// Parent bucket id; `None` for the root of a prefix
    pub parent: Option<String>,
    /// True only for the entry bucket of a stream prefix
    pub root: bool,
    /// Transient "flush existing members" flag, consumed by the writer
    pub empty: bool,
    /// Ordered outgoing relations
    pub links: Vec<Relation>,
    immutable: bool,
}

impl Bucket {
    fn new(id: String, root: bool) -> Self {
        Self {
            id,
            parent: None,
            root,
            empty: false,
            links: Vec::new(),
            immutable: false,
        }
    }

    /// Whether this bucket will receive no more members or outgoing
    /// structural relations.
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Mark this bucket immutable. The flag is monotonic: there is no way to
    /// clear it.
    pub fn seal(&mut self) {
        self.immutable = true;
    }

    /// Consume the `empty` flag: returns its value and clears it.
    pub fn take_empty(&mut self) -> bool {
        std::mem::take(&mut self.empty)
    }
}

impl PartialEq for Bucket {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Bucket {}

/// Arena owning every bucket of a stream, keyed by id.
#[derive(Debug, Default)]
pub struct BucketRegistry {
    buckets: BTreeMap<String, Bucket>,
}

impl BucketRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the bucket for `id`, creating it if absent.
    pub fn get_or_create(&mut self, id: &str, root: bool) -> &mut Bucket {
        self.buckets
            .entry(id.to_string())
            .or_insert_with(|| Bucket::new(id.to_string(), root))
    }

    /// Fetch an existing bucket.
    pub fn get(&self, id: &str) -> Option<&Bucket> {
        self.buckets.get(id)
    }

    /// Fetch an existing bucket mutably.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Bucket> {
        self.buckets.get_mut(id)
    }

    /// Append `relation` to `origin`'s links and set the target's parent to
    /// `origin`. Both buckets are created if absent.
    ///
    /// A root bucket stays parentless; for any other target the last writer
    /// wins, so callers must not double-parent a bucket they care about.
    pub fn add_relation(&mut self, origin: &str, relation: Relation) {
        let target = relation.target.clone();
        self.get_or_create(origin, false).links.push(relation);
        let target_bucket = self.get_or_create(&target, false);
        if !target_bucket.root {
            target_bucket.parent = Some(origin.to_string());
        }
    }

    /// Remove every relation of `relation_type` from `origin` to `target`,
    /// returning the removed links (with their values and paths) so removal
    /// events can be emitted for each.
    pub fn remove_relations(
        &mut self,
        origin: &str,
        relation_type: RelationType,
        target: &str,
    ) -> Vec<Relation> {
        let Some(bucket) = self.buckets.get_mut(origin) else {
            return Vec::new();
        };
        let mut removed = Vec::new();
        bucket.links.retain(|link| {
            if link.relation_type == relation_type && link.target == target {
                removed.push(link.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Number of buckets in the arena.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Iterate over all buckets in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.values()
    }

    /// Iterate mutably over all buckets in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Bucket> {
        self.buckets.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_relation_sets_parent() {
        let mut registry = BucketRegistry::new();
        registry.get_or_create("", true);
        registry.add_relation(
            "",
            Relation {
                relation_type: RelationType::Relation,
                target: "/page-1".to_string(),
                value: None,
                path: None,
            },
        );

        let child = registry.get("/page-1").unwrap();
        assert_eq!(child.parent.as_deref(), Some(""));
        assert_eq!(registry.get("").unwrap().links.len(), 1);
    }

    #[test]
    fn test_seal_is_monotonic() {
        let mut registry = BucketRegistry::new();
        let bucket = registry.get_or_create("/a", false);
        assert!(!bucket.is_immutable());
        bucket.seal();
        assert!(bucket.is_immutable());
        // No API exists to clear the flag; sealing again is a no-op.
        bucket.seal();
        assert!(bucket.is_immutable());
    }

    #[test]
    fn test_take_empty_clears_flag() {
        let mut registry = BucketRegistry::new();
        let bucket = registry.get_or_create("/a", false);
        bucket.empty = true;
        assert!(bucket.take_empty());
        assert!(!bucket.take_empty());
    }

    #[test]
    fn test_remove_relations_returns_removed_links() {
        let mut registry = BucketRegistry::new();
        registry.add_relation(
            "",
            Relation {
                relation_type: RelationType::GeospatiallyContains,
                target: "/node-1".to_string(),
                value: Some(RelationValue::Text("POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))".into())),
                path: None,
            },
        );
        registry.add_relation(
            "",
            Relation {
                relation_type: RelationType::Relation,
                target: "/node-1".to_string(),
                value: None,
                path: None,
            },
        );

        let removed = registry.remove_relations("", RelationType::GeospatiallyContains, "/node-1");
        assert_eq!(removed.len(), 1);
        assert_eq!(registry.get("").unwrap().links.len(), 1);
    }

    #[test]
    fn test_bucket_equality_is_by_id() {
        let mut registry = BucketRegistry::new();
        registry.get_or_create("/a", false).seal();
        let a1 = registry.get("/a").unwrap().clone();
        let a2 = registry.get("/a").unwrap().clone();
        assert_eq!(a1, a2);
    }
}
