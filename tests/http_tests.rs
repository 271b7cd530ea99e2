//! End-to-end tests for the HTTP API

mod common;

use common::{TestServer, SAMPLE_LINES};
use seriescount::contract::CardinalityRequest;
use seriescount::proto::{ReadSource, TimestampRange};

use reqwest::StatusCode;
use serde_json::Value;

async fn cardinality(server: &TestServer, query: &[(&str, &str)]) -> (StatusCode, Value) {
    let response = server
        .http
        .get(server.http_url("/api/v1/cardinality"))
        .query(query)
        .send()
        .await
        .unwrap();
    let status = response.status();
    let body = response.json::<Value>().await.unwrap();
    (status, body)
}

#[tokio::test]
async fn test_health_and_ready() {
    let server = TestServer::start().await.unwrap();

    let health = server.http.get(server.http_url("/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(health.text().await.unwrap(), "OK");

    let ready = server.http.get(server.http_url("/ready")).send().await.unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(ready.text().await.unwrap(), "READY");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_write_then_count() {
    let server = TestServer::start().await.unwrap();
    assert_eq!(server.write(7, 8, SAMPLE_LINES).await.unwrap(), StatusCode::NO_CONTENT);

    let (status, body) = cardinality(
        &server,
        &[("org", "7"), ("bucket", "8"), ("start", "0"), ("end", "1000")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "values": [5] }));

    let (_, body) = cardinality(
        &server,
        &[
            ("org", "7"),
            ("bucket", "8"),
            ("start", "0"),
            ("end", "1000"),
            ("predicate", r#"_m = "mem""#),
        ],
    )
    .await;
    assert_eq!(body["values"][0], 2);
}

#[tokio::test]
async fn test_http_and_engine_agree() {
    let server = TestServer::start().await.unwrap();
    server.write(1, 1, SAMPLE_LINES).await.unwrap();

    let direct = server
        .engine
        .read_series_cardinality(&CardinalityRequest::new(
            ReadSource::new(1, 1),
            TimestampRange::new(150, 300),
        ))
        .unwrap();

    let (_, body) = cardinality(
        &server,
        &[("org", "1"), ("bucket", "1"), ("start", "150"), ("end", "300")],
    )
    .await;
    assert_eq!(body["values"][0].as_i64(), Some(direct.values[0]));
    assert_eq!(direct.values, vec![3]);
}

#[tokio::test]
async fn test_bad_line_protocol_is_rejected() {
    let server = TestServer::start().await.unwrap();

    let response = server
        .http
        .post(server.http_url("/api/v1/write?org=1&bucket=1"))
        .body("cpu,host=a\n")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("line 1"));
}

#[tokio::test]
async fn test_field_type_conflict_is_rejected() {
    let server = TestServer::start().await.unwrap();
    assert_eq!(
        server.write(1, 1, "cpu,host=a usage=1i 1").await.unwrap(),
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        server.write(1, 1, "cpu,host=a usage=1.5 2").await.unwrap(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_invalid_query_parameters() {
    let server = TestServer::start().await.unwrap();

    let (status, body) = cardinality(
        &server,
        &[("org", "1"), ("bucket", "1"), ("start", "10"), ("end", "5")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid timestamp range"));

    let (status, _) = cardinality(
        &server,
        &[
            ("org", "1"),
            ("bucket", "1"),
            ("start", "0"),
            ("end", "5"),
            ("predicate", "host = "),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tag_listing() {
    let server = TestServer::start().await.unwrap();
    server.write(1, 1, SAMPLE_LINES).await.unwrap();

    let keys = server
        .http
        .get(server.http_url("/api/v1/tag_keys?org=1&bucket=1"))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    let keys: Vec<&str> = keys["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(keys.contains(&"host"));
    assert!(keys.contains(&"region"));

    let values = server
        .http
        .get(server.http_url("/api/v1/tag/region/values?org=1&bucket=1"))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(values, serde_json::json!({ "data": ["east", "west"] }));

    let empty = server
        .http
        .get(server.http_url("/api/v1/tag_keys?org=9&bucket=9"))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(empty, serde_json::json!({ "data": [] }));
}

// ============================================================================
// Content encoding
// ============================================================================

fn gzip(data: &str) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

#[tokio::test]
async fn test_gzip_write() {
    let server = TestServer::start().await.unwrap();

    let response = server
        .http
        .post(server.http_url("/api/v1/write?org=3&bucket=4"))
        .header("Content-Encoding", "gzip")
        .body(gzip(SAMPLE_LINES))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, body) = cardinality(
        &server,
        &[("org", "3"), ("bucket", "4"), ("start", "0"), ("end", "1000")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "values": [5] }));
}

#[tokio::test]
async fn test_unsupported_content_encoding_is_rejected() {
    let server = TestServer::start().await.unwrap();

    let response = server
        .http
        .post(server.http_url("/api/v1/write?org=3&bucket=4"))
        .header("Content-Encoding", "deflate")
        .body(SAMPLE_LINES)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let response = server
        .http
        .post(server.http_url("/api/v1/write?org=3&bucket=4"))
        .header("Content-Encoding", "gzip")
        .body(SAMPLE_LINES)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(server.engine.store().buckets().is_empty());
}

// ============================================================================
// Predicate limits
// ============================================================================

#[tokio::test]
async fn test_deeply_nested_predicate_is_rejected() {
    let server = TestServer::start().await.unwrap();
    server.write(1, 1, SAMPLE_LINES).await.unwrap();

    let nested = |depth: usize| {
        format!("{}host = \"a\"{}", "(".repeat(depth), ")".repeat(depth))
    };

    let deep = nested(1_000);
    let (status, body) = cardinality(
        &server,
        &[
            ("org", "1"),
            ("bucket", "1"),
            ("start", "0"),
            ("end", "1000"),
            ("predicate", deep.as_str()),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("nested"));

    let shallow = nested(8);
    let (status, body) = cardinality(
        &server,
        &[
            ("org", "1"),
            ("bucket", "1"),
            ("start", "0"),
            ("end", "1000"),
            ("predicate", shallow.as_str()),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "values": [2] }));
}
