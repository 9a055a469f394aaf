//! RDF vocabulary constants for the LDES fragmentation engine.
//!
//! This crate provides a centralized location for the vocabulary IRIs used
//! throughout the fragmentation ecosystem.
//!
//! # Organization
//!
//! Constants are organized by vocabulary:
//! - `tree` - TREE hypermedia vocabulary (https://w3id.org/tree#)
//! - `ldes` - Linked Data Event Streams vocabulary (https://w3id.org/ldes#)
//! - `xsd` - XSD datatype vocabulary (http://www.w3.org/2001/XMLSchema#)

/// TREE hypermedia vocabulary constants
pub mod tree {
    /// tree:Relation IRI (plain, untyped link between nodes)
    pub const RELATION: &str = "https://w3id.org/tree#Relation";

    /// tree:EqualToRelation IRI
    pub const EQUAL_TO_RELATION: &str = "https://w3id.org/tree#EqualToRelation";

    /// tree:LessThanRelation IRI
    pub const LESS_THAN_RELATION: &str = "https://w3id.org/tree#LessThanRelation";

    /// tree:LessThanOrEqualToRelation IRI
    pub const LESS_THAN_OR_EQUAL_TO_RELATION: &str =
        "https://w3id.org/tree#LessThanOrEqualToRelation";

    /// tree:GreaterThanRelation IRI
    pub const GREATER_THAN_RELATION: &str = "https://w3id.org/tree#GreaterThanRelation";

    /// tree:GreaterThanOrEqualToRelation IRI
    pub const GREATER_THAN_OR_EQUAL_TO_RELATION: &str =
        "https://w3id.org/tree#GreaterThanOrEqualToRelation";

    /// tree:GeospatiallyContainsRelation IRI
    pub const GEOSPATIALLY_CONTAINS_RELATION: &str =
        "https://w3id.org/tree#GeospatiallyContainsRelation";

    /// tree:relation IRI (links a node to one of its relations)
    pub const RELATION_PROPERTY: &str = "https://w3id.org/tree#relation";

    /// tree:node IRI (the target node of a relation)
    pub const NODE: &str = "https://w3id.org/tree#node";

    /// tree:value IRI (the comparison value of a relation)
    pub const VALUE: &str = "https://w3id.org/tree#value";

    /// tree:path IRI (the member attribute a relation's value refers to)
    pub const PATH: &str = "https://w3id.org/tree#path";

    /// tree:member IRI
    pub const MEMBER: &str = "https://w3id.org/tree#member";
}

/// Linked Data Event Streams vocabulary constants
pub mod ldes {
    /// ldes:EventStream IRI
    pub const EVENT_STREAM: &str = "https://w3id.org/ldes#EventStream";

    /// ldes:timestampPath IRI
    pub const TIMESTAMP_PATH: &str = "https://w3id.org/ldes#timestampPath";

    /// ldes:BucketizeStrategy IRI
    pub const BUCKETIZE_STRATEGY: &str = "https://w3id.org/ldes#BucketizeStrategy";

    /// ldes:bucket IRI
    pub const BUCKET: &str = "https://w3id.org/ldes#bucket";
}

/// XSD datatype constants
pub mod xsd {
    /// xsd:dateTime IRI
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

    /// xsd:double IRI
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";

    /// xsd:integer IRI
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";

    /// xsd:string IRI
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

    /// geo:wktLiteral IRI (OGC GeoSPARQL)
    pub const WKT_LITERAL: &str = "http://www.opengis.net/ont/geosparql#wktLiteral";
}
