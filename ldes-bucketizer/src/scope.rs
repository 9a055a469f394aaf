//! Strategy execution context
//!
//! [`StrategyScope`] is the context object handed to a strategy for one
//! `bucketize` call. It scopes the shared bucket arena to the strategy's
//! prefix and collects every relation addition/retraction as a
//! [`RelationEvent`] for the external serializer. Strategies never touch the
//! registry or the event queue directly.

use ldes_model::{BucketRegistry, Relation, RelationEvent, RelationType, RelationValue};

/// Replace characters that are unsafe in a bucket id segment.
fn sanitize_key(key: &str) -> String {
    key.replace(['#', ' '], "-")
}

/// Prefix-scoped view over the bucket arena and event queue.
pub struct StrategyScope<'a> {
    prefix: &'a str,
    registry: &'a mut BucketRegistry,
    events: &'a mut Vec<RelationEvent>,
}

impl<'a> StrategyScope<'a> {
    pub(crate) fn new(
        prefix: &'a str,
        registry: &'a mut BucketRegistry,
        events: &'a mut Vec<RelationEvent>,
    ) -> Self {
        Self {
            prefix,
            registry,
            events,
        }
    }

    /// The prefix this strategy instance is scoped to.
    pub fn prefix(&self) -> &str {
        self.prefix
    }

    /// The bucket id a strategy-local key maps to, without creating it.
    pub fn bucket_id(&self, key: &str) -> String {
        format!("{}/{}", self.prefix, sanitize_key(key))
    }

    /// The root bucket of this prefix, created on first reference.
    pub fn root(&mut self) -> String {
        self.registry.get_or_create(self.prefix, true);
        self.prefix.to_string()
    }

    /// The bucket for a strategy-local key, created on first reference.
    pub fn bucket(&mut self, key: &str) -> String {
        let id = self.bucket_id(key);
        self.registry.get_or_create(&id, false);
        id
    }

    /// Mark a bucket immutable. Monotonic; repeated calls are no-ops.
    pub fn mark_immutable(&mut self, id: &str) {
        self.registry.get_or_create(id, false).seal();
    }

    /// Whether a bucket is already immutable.
    pub fn is_immutable(&self, id: &str) -> bool {
        self.registry.get(id).is_some_and(|b| b.is_immutable())
    }

    /// Flag a bucket for the writer to flush its existing members.
    pub fn mark_empty(&mut self, id: &str) {
        self.registry.get_or_create(id, false).empty = true;
    }

    /// The parent bucket id recorded for `id`, if any.
    pub fn parent_of(&self, id: &str) -> Option<String> {
        self.registry.get(id).and_then(|b| b.parent.clone())
    }

    /// Whether `id` is the root bucket of a prefix.
    pub fn is_root(&self, id: &str) -> bool {
        self.registry.get(id).is_some_and(|b| b.root)
    }

    /// Append a relation from `origin` to `target` and emit the matching
    /// event. Sets `target`'s parent to `origin`.
    pub fn add_relation(
        &mut self,
        origin: &str,
        relation_type: RelationType,
        target: &str,
        value: Option<RelationValue>,
        path: Option<&str>,
    ) {
        self.registry.add_relation(
            origin,
            Relation {
                relation_type,
                target: target.to_string(),
                value: value.clone(),
                path: path.map(str::to_string),
            },
        );
        self.events.push(RelationEvent {
            origin: origin.to_string(),
            relation_type,
            target: target.to_string(),
            value,
            path: path.map(str::to_string),
            removal: false,
        });
    }

    /// Retract every relation of `relation_type` from `origin` to `target`,
    /// emitting one removal event per retracted link.
    pub fn remove_relation(&mut self, origin: &str, relation_type: RelationType, target: &str) {
        for removed in self.registry.remove_relations(origin, relation_type, target) {
            self.events.push(RelationEvent {
                origin: origin.to_string(),
                relation_type: removed.relation_type,
                target: removed.target,
                value: removed.value,
                path: removed.path,
                removal: true,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope_parts() -> (BucketRegistry, Vec<RelationEvent>) {
        (BucketRegistry::new(), Vec::new())
    }

    #[test]
    fn test_bucket_ids_are_prefixed_and_sanitized() {
        let (mut registry, mut events) = scope_parts();
        let mut scope = StrategyScope::new("/stream", &mut registry, &mut events);
        assert_eq!(scope.bucket("page 1"), "/stream/page-1");
        assert_eq!(scope.bucket("a#b"), "/stream/a-b");
        assert_eq!(scope.root(), "/stream");
        assert!(registry.get("/stream").unwrap().root);
    }

    #[test]
    fn test_add_then_remove_relation_emits_both_events() {
        let (mut registry, mut events) = scope_parts();
        {
            let mut scope = StrategyScope::new("", &mut registry, &mut events);
            let root = scope.root();
            let page = scope.bucket("page-1");
            scope.add_relation(&root, RelationType::Relation, &page, None, None);
            scope.remove_relation(&root, RelationType::Relation, &page);
        }
        assert_eq!(events.len(), 2);
        assert!(!events[0].removal);
        assert!(events[1].removal);
        assert!(registry.get("").unwrap().links.is_empty());
    }

    #[test]
    fn test_remove_missing_relation_is_silent() {
        let (mut registry, mut events) = scope_parts();
        let mut scope = StrategyScope::new("", &mut registry, &mut events);
        let root = scope.root();
        scope.remove_relation(&root, RelationType::EqualTo, "/nowhere");
        assert!(events.is_empty());
    }
}
