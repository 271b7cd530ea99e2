//! Concrete payloads for the polymorphic cardinality source.

/// Type URL carried in `google.protobuf.Any` for a packed [`ReadSource`].
pub const READ_SOURCE_TYPE_URL: &str = "type.googleapis.com/seriescount.storage.v1.ReadSource";

/// Read from one organization's bucket.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct ReadSource {
    #[prost(uint64, tag = "1")]
    pub org_id: u64,
    #[prost(uint64, tag = "2")]
    pub bucket_id: u64,
    #[prost(uint64, tag = "3")]
    pub partition_id: u64,
}

impl ReadSource {
    pub fn new(org_id: u64, bucket_id: u64) -> Self {
        Self {
            org_id,
            bucket_id,
            partition_id: 0,
        }
    }
}
