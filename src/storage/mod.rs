//! Series storage: line protocol ingest and per-bucket in-memory indexes.

pub mod line_protocol;
mod memdb;

pub use line_protocol::{
    parse_lines, parse_points, FieldValue, ParsedLine, SeriesDataType, SeriesKey, SeriesPoint,
};
pub use memdb::{MemDb, WriteStats};

use crate::proto::ReadSource;
use crate::Result;

use dashmap::DashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Identifies one bucket's database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub org_id: u64,
    pub bucket_id: u64,
}

impl BucketKey {
    pub fn new(org_id: u64, bucket_id: u64) -> Self {
        Self { org_id, bucket_id }
    }
}

impl From<&ReadSource> for BucketKey {
    fn from(source: &ReadSource) -> Self {
        Self::new(source.org_id, source.bucket_id)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}/{:016x}", self.org_id, self.bucket_id)
    }
}

/// All bucket databases held by one server.
///
/// Buckets are created on first write. Each has its own lock, so writes to
/// one bucket never block queries against another.
#[derive(Default)]
pub struct DatabaseStore {
    databases: DashMap<BucketKey, Arc<RwLock<MemDb>>>,
}

impl DatabaseStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn db(&self, bucket: &BucketKey) -> Option<Arc<RwLock<MemDb>>> {
        self.databases.get(bucket).map(|db| Arc::clone(db.value()))
    }

    pub fn db_or_create(&self, bucket: BucketKey) -> Arc<RwLock<MemDb>> {
        let db = self.databases.entry(bucket).or_insert_with(|| {
            debug!(bucket = %bucket, "Creating bucket database");
            Arc::new(RwLock::new(MemDb::new()))
        });
        Arc::clone(db.value())
    }

    /// Parse a line protocol body and write it into `bucket`. Lines without a
    /// timestamp are stamped with `default_time`.
    pub fn write_lines(&self, bucket: BucketKey, body: &str, default_time: i64) -> Result<WriteStats> {
        let points = parse_points(body, default_time)?;
        if points.is_empty() {
            return Ok(WriteStats::default());
        }
        let db = self.db_or_create(bucket);
        let mut db = db.write();
        db.write(&points)
    }

    /// Buckets in key order.
    pub fn buckets(&self) -> Vec<BucketKey> {
        let mut keys: Vec<_> = self.databases.iter().map(|entry| *entry.key()).collect();
        keys.sort();
        keys
    }
}
