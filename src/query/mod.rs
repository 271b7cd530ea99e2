//! Cardinality query engine
//!
//! Answers [`CardinalityRequest`]s against a [`DatabaseStore`]:
//! - validates the time range
//! - resolves the request source to a bucket
//! - evaluates the predicate against that bucket's series index
//!
//! The response carries a single value, the distinct series count.

mod telemetry;

use crate::contract::{CardinalityRequest, CardinalityResponse, CardinalitySource, SourcePolicy, SourceRegistry};
use crate::predicate;
use crate::proto::{Node, Predicate, ReadSeriesCardinalityRequest};
use crate::storage::{BucketKey, DatabaseStore};
use crate::{Error, Result};

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span};

/// Configuration for the query engine
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// How unregistered source type URLs are treated on decode
    pub source_policy: SourcePolicy,
    /// Largest predicate tree, in nodes, the engine will evaluate
    pub max_predicate_nodes: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            source_policy: SourcePolicy::Permissive,
            max_predicate_nodes: 1024,
        }
    }
}

/// Executes cardinality queries.
pub struct CardinalityEngine {
    config: QueryConfig,
    registry: SourceRegistry,
    store: Arc<DatabaseStore>,
}

impl CardinalityEngine {
    pub fn new(config: QueryConfig, store: Arc<DatabaseStore>) -> Self {
        let registry = SourceRegistry::new(config.source_policy);
        Self {
            config,
            registry,
            store,
        }
    }

    pub fn store(&self) -> &Arc<DatabaseStore> {
        &self.store
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Validate and run a request as it arrived on the wire.
    pub fn read_series_cardinality_proto(
        &self,
        proto: ReadSeriesCardinalityRequest,
    ) -> Result<CardinalityResponse> {
        let request = CardinalityRequest::from_proto(proto, &self.registry)?;
        self.read_series_cardinality(&request)
    }

    pub fn read_series_cardinality(&self, request: &CardinalityRequest) -> Result<CardinalityResponse> {
        let start = Instant::now();
        let predicate_nodes = request.predicate.as_ref().map(predicate_size).unwrap_or(0);
        let span = info_span!(
            "cardinality.query",
            source = %request.source.type_url(),
            range.start = request.range.start,
            range.end = request.range.end,
        );
        let _guard = span.enter();

        let result = self.execute(request, predicate_nodes);

        let (outcome, error_class, series_matched) = match &result {
            Ok(count) => ("success", None, *count),
            Err(e) => ("error", Some(error_class(e)), 0),
        };
        telemetry::record_query(telemetry::QueryMetrics {
            outcome,
            error_class,
            duration_seconds: start.elapsed().as_secs_f64(),
            series_matched,
            predicate_nodes: predicate_nodes as u64,
        });

        let count = result?;
        let count = i64::try_from(count)
            .map_err(|_| Error::Internal(format!("series count {} overflows int64", count)))?;
        Ok(CardinalityResponse::single(count))
    }

    fn execute(&self, request: &CardinalityRequest, predicate_nodes: usize) -> Result<u64> {
        if !request.range.is_ordered() {
            return Err(Error::InvalidRange {
                start: request.range.start,
                end: request.range.end,
            });
        }
        if predicate_nodes > self.config.max_predicate_nodes {
            return Err(Error::Predicate(format!(
                "predicate has {} nodes, limit is {}",
                predicate_nodes, self.config.max_predicate_nodes
            )));
        }

        let bucket = match &request.source {
            CardinalitySource::Read(source) => BucketKey::from(source),
            CardinalitySource::Unknown { type_url, .. } => {
                return Err(Error::UnknownSourceType(type_url.clone()));
            }
        };

        let Some(db) = self.store.db(&bucket) else {
            debug!(bucket = %bucket, "Bucket has no data");
            return Ok(0);
        };

        if let Some(p) = &request.predicate {
            debug!(bucket = %bucket, predicate = %predicate::display(p), "Evaluating predicate");
        }

        let db = db.read();
        db.series_cardinality(&request.range, request.predicate.as_ref())
    }
}

/// Node count, walked with an explicit stack since long `and`/`or` chains
/// build trees as deep as they are wide.
fn predicate_size(predicate: &Predicate) -> usize {
    let mut pending: Vec<&Node> = predicate.root.iter().collect();
    let mut size = 0;
    while let Some(node) = pending.pop() {
        size += 1;
        pending.extend(node.children.iter());
    }
    size
}

fn error_class(e: &Error) -> &'static str {
    match e {
        Error::MalformedMessage(_) => "malformed_message",
        Error::MissingRequiredField(_) => "missing_required_field",
        Error::UnknownSourceType(_) => "unknown_source_type",
        Error::InvalidRange { .. } => "invalid_range",
        Error::Predicate(_) => "predicate",
        _ => "internal",
    }
}
