//! Line protocol write endpoint
//!
//! POST /api/v1/write?org=<id>&bucket=<id>
//! Content-Type: text/plain
//! Content-Encoding: gzip (optional)

use crate::api::telemetry::record_write;
use crate::api::{error_response, ApiState};
use crate::storage::BucketKey;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::Read;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct WriteParams {
    pub org: u64,
    pub bucket: u64,
}

/// Handle a line protocol write. Returns 204 on success.
pub async fn handle_write(
    State(state): State<ApiState>,
    Query(params): Query<WriteParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = match decode_body(&headers, body, state.max_body_size) {
        Ok(body) => body,
        Err((status, message)) => {
            warn!(status = %status, error = %message, "Rejected write body");
            record_write(0, 0, true);
            return (status, message).into_response();
        }
    };
    let body = match std::str::from_utf8(&body) {
        Ok(body) => body,
        Err(e) => {
            record_write(0, 0, true);
            return (StatusCode::BAD_REQUEST, format!("body is not valid UTF-8: {e}"))
                .into_response();
        }
    };

    let bucket = BucketKey::new(params.org, params.bucket);
    let now = now_nanos();
    match state.engine.store().write_lines(bucket, body, now) {
        Ok(stats) => {
            debug!(
                bucket = %bucket,
                points = stats.points,
                new_series = stats.new_series,
                "Write accepted"
            );
            record_write(stats.points as u64, stats.new_series as u64, false);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            record_write(0, 0, true);
            error_response(e)
        }
    }
}

/// Apply the request's `Content-Encoding`. Gzip output is capped at `limit`
/// bytes.
fn decode_body(
    headers: &HeaderMap,
    body: Bytes,
    limit: usize,
) -> std::result::Result<Bytes, (StatusCode, String)> {
    let encoding = match headers.get(header::CONTENT_ENCODING) {
        None => return Ok(body),
        Some(value) => value.to_str().map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                "Content-Encoding is not valid ASCII".to_string(),
            )
        })?,
    };

    match encoding.trim().to_ascii_lowercase().as_str() {
        "" | "identity" => Ok(body),
        "gzip" => {
            let mut decoded = Vec::new();
            GzDecoder::new(&body[..])
                .take(limit as u64 + 1)
                .read_to_end(&mut decoded)
                .map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("body is not valid gzip: {e}"),
                    )
                })?;
            if decoded.len() > limit {
                return Err((
                    StatusCode::PAYLOAD_TOO_LARGE,
                    format!("decompressed body exceeds {limit} bytes"),
                ));
            }
            Ok(Bytes::from(decoded))
        }
        other => Err((
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("unsupported Content-Encoding '{other}'"),
        )),
    }
}

fn now_nanos() -> i64 {
    let now = chrono::Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000))
}
