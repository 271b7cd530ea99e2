//! HTTP read endpoints
//!
//! GET /api/v1/cardinality?org=&bucket=&start=&end=[&predicate=]
//! GET /api/v1/tag_keys?org=&bucket=
//! GET /api/v1/tag/:key/values?org=&bucket=

use crate::api::{error_response, ApiState};
use crate::contract::CardinalityRequest;
use crate::predicate::parse_predicate;
use crate::proto::{ReadSource, TimestampRange};
use crate::storage::BucketKey;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Cardinality query parameters
#[derive(Debug, Deserialize)]
pub struct CardinalityParams {
    pub org: u64,
    pub bucket: u64,
    pub start: i64,
    pub end: i64,
    /// Predicate text, e.g. `host = "a" and _m = "cpu"`
    #[serde(default)]
    pub predicate: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardinalityBody {
    pub values: Vec<i64>,
}

/// Bucket selector for tag listing
#[derive(Debug, Deserialize)]
pub struct BucketParams {
    pub org: u64,
    pub bucket: u64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagListBody {
    pub data: Vec<String>,
}

pub async fn read_cardinality(
    State(state): State<ApiState>,
    Query(params): Query<CardinalityParams>,
) -> Response {
    let mut request = CardinalityRequest::new(
        ReadSource::new(params.org, params.bucket),
        TimestampRange::new(params.start, params.end),
    );
    if let Some(text) = params.predicate.as_deref().filter(|t| !t.trim().is_empty()) {
        match parse_predicate(text) {
            Ok(predicate) => request = request.with_predicate(predicate),
            Err(e) => return error_response(e),
        }
    }

    match state.engine.read_series_cardinality(&request) {
        Ok(response) => Json(CardinalityBody {
            values: response.values,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn tag_keys(
    State(state): State<ApiState>,
    Query(params): Query<BucketParams>,
) -> Json<TagListBody> {
    let bucket = BucketKey::new(params.org, params.bucket);
    let data = match state.engine.store().db(&bucket) {
        Some(db) => {
            let db = db.read();
            let keys: Vec<String> = db.tag_keys().map(str::to_string).collect();
            keys
        }
        None => Vec::new(),
    };
    Json(TagListBody { data })
}

pub async fn tag_values(
    State(state): State<ApiState>,
    Path(key): Path<String>,
    Query(params): Query<BucketParams>,
) -> Json<TagListBody> {
    let bucket = BucketKey::new(params.org, params.bucket);
    let data = match state.engine.store().db(&bucket) {
        Some(db) => {
            let db = db.read();
            let values: Vec<String> = db.tag_values(&key).map(str::to_string).collect();
            values
        }
        None => Vec::new(),
    };
    Json(TagListBody { data })
}
