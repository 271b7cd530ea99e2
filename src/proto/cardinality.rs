//! Series cardinality request and its integer response.

use super::common::TimestampRange;
use super::predicate::Predicate;

/// Count the distinct series matching `predicate` within `range`.
///
/// On the wire every field is optional; [`crate::contract`] enforces that the
/// source and the range are present.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadSeriesCardinalityRequest {
    #[prost(message, optional, tag = "1")]
    pub read_series_cardinality_source: ::core::option::Option<::prost_types::Any>,
    #[prost(message, optional, tag = "2")]
    pub range: ::core::option::Option<TimestampRange>,
    #[prost(message, optional, tag = "3")]
    pub predicate: ::core::option::Option<Predicate>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Int64ValuesResponse {
    #[prost(int64, repeated, tag = "1")]
    pub values: ::prost::alloc::vec::Vec<i64>,
}
