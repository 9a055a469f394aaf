//! Emitted relation records
//!
//! Strategies mutate the bucket arena and emit [`RelationEvent`]s describing
//! every relation added or retracted. The external serializer drains these
//! and turns them into the wire format; the engine never serializes RDF
//! itself.

use crate::bucket::RelationType;
use crate::value::RelationValue;

/// One relation addition or retraction, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationEvent {
    /// Origin bucket id
    pub origin: String,
    /// Relation kind
    pub relation_type: RelationType,
    /// Target bucket id
    pub target: String,
    /// Optional typed literal
    pub value: Option<RelationValue>,
    /// Optional attribute-path descriptor
    pub path: Option<String>,
    /// True when this retracts a previously emitted relation
    pub removal: bool,
}
