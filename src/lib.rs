//! # seriescount
//!
//! A series cardinality query service.
//!
//! Clients ask "how many distinct series in this bucket have data in this
//! time range and match this predicate?" over gRPC or HTTP and get back a
//! single int64.
//!
//! ## Key Features
//!
//! - **Wire contract**: protobuf `ReadSeriesCardinalityRequest` with a
//!   polymorphic `google.protobuf.Any` source and an optional predicate tree
//! - **Forward compatible decoding**: unknown fields are skipped, unknown
//!   source kinds are kept or rejected according to [`contract::SourcePolicy`]
//! - **Inverted index**: roaring posting lists per tag value, including the
//!   measurement and field pseudo-tags
//!
//! ## Layout
//!
//! - [`proto`]: message and service definitions
//! - [`contract`]: validated request/response types and codec
//! - [`predicate`]: predicate text parser and renderer
//! - [`storage`]: line protocol ingest and per-bucket series index
//! - [`query`]: the cardinality engine
//! - [`api`]: gRPC and HTTP servers

pub mod api;
pub mod config;
pub mod contract;
pub mod predicate;
pub mod proto;
pub mod query;
pub mod storage;
pub mod telemetry;

mod error;

pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::ServerConfig;
    pub use crate::contract::{
        decode_request, decode_response, encode_request, encode_response, CardinalityRequest,
        CardinalityResponse, CardinalitySource, SourcePolicy, SourceRegistry,
    };
    pub use crate::predicate::parse_predicate;
    pub use crate::proto::{Predicate, ReadSource, TimestampRange};
    pub use crate::query::{CardinalityEngine, QueryConfig};
    pub use crate::storage::{BucketKey, DatabaseStore};
    pub use crate::{Error, Result};
}
