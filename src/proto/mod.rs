//! Wire messages for the `seriescount.storage.v1` protobuf package.
//!
//! The message structs are written in the shape `prost-build` emits so the
//! crate builds without `protoc`. Field tags are part of the wire contract and
//! must never be renumbered.
//!
//! - [`common`]: shared primitives (`TimestampRange`)
//! - [`predicate`]: boolean expression trees over series tags
//! - [`source`]: concrete payloads for the polymorphic request source
//! - [`cardinality`]: the cardinality request and `Int64ValuesResponse`
//! - [`service`]: gRPC server/client glue for the `Storage` service

pub mod cardinality;
pub mod common;
pub mod predicate;
pub mod service;
pub mod source;

pub use cardinality::{Int64ValuesResponse, ReadSeriesCardinalityRequest};
pub use common::TimestampRange;
pub use predicate::{node, Node, Predicate};
pub use source::{ReadSource, READ_SOURCE_TYPE_URL};

/// Protobuf package all messages in this module belong to.
pub const PACKAGE: &str = "seriescount.storage.v1";

/// `[0x00]` is the magic tag key that means "measurement name".
pub const TAG_KEY_MEASUREMENT: &[u8] = &[0];

/// `[0xff]` is the magic tag key that means "field name".
pub const TAG_KEY_FIELD: &[u8] = &[255];
