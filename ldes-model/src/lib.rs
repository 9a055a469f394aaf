//! # LDES fragmentation data model
//!
//! Node and edge types of the fragmentation tree produced by the bucketizer:
//!
//! - [`Bucket`]: an addressable fragment of the stream
//! - [`Relation`]: a typed, directed edge between buckets
//! - [`BucketRegistry`]: the arena owning every bucket of a stream
//! - [`RelationValue`]: typed literal carried by comparison relations
//! - [`Record`]: the boundary trait for stream members
//! - [`RelationEvent`]: emitted-relation record for the external serializer
//!
//! ## Design
//!
//! Buckets form a tree with parent back-references. To avoid ownership cycles
//! the registry is an arena keyed by bucket id; buckets reference each other
//! by id only and are resolved through the registry. Buckets are created on
//! first reference and never deleted; they only gain relations or flip to
//! immutable/empty over time.

pub mod bucket;
pub mod error;
pub mod event;
pub mod record;
pub mod value;

pub use bucket::{Bucket, BucketRegistry, Relation, RelationType};
pub use error::{ModelError, Result};
pub use event::RelationEvent;
pub use record::{PathValue, Record, StreamMember};
pub use value::{parse_timestamp, RelationValue};
