//! Shared storage primitives.

/// Time bounds of a query, in nanoseconds since the epoch.
///
/// Both fields are always present on the wire (proto3 scalars). Whether
/// `start <= end` holds is checked by the query engine, not by the codec.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct TimestampRange {
    #[prost(int64, tag = "1")]
    pub start: i64,
    #[prost(int64, tag = "2")]
    pub end: i64,
}

impl TimestampRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Half-open containment: `start <= ts < end`.
    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.start && ts < self.end
    }

    /// True when `start` does not exceed `end`.
    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }
}
