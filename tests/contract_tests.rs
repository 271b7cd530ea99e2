//! Wire contract tests for the cardinality request and response
//!
//! Covers:
//! - Round trips for requests and responses
//! - Forward compatibility with unknown fields
//! - Required range and optional predicate
//! - Byte-exact encoding of a known request

use seriescount::contract::{
    decode_request, decode_request_with, decode_response, encode_request, encode_response,
    CardinalityRequest, CardinalityResponse, CardinalitySource, SourcePolicy, SourceRegistry,
};
use seriescount::proto::{
    Int64ValuesResponse, Node, Predicate, ReadSeriesCardinalityRequest, ReadSource,
    TimestampRange, TAG_KEY_MEASUREMENT,
};
use seriescount::Error;

use bytes::Bytes;
use prost::Message;
use proptest::prelude::*;

const OPAQUE_TYPE_URL: &str = "type.example.com/example.BucketName";

fn opaque_source(name: &str) -> CardinalitySource {
    CardinalitySource::Unknown {
        type_url: OPAQUE_TYPE_URL.to_string(),
        value: Bytes::from(name.as_bytes().to_vec()),
    }
}

fn host_predicate() -> Predicate {
    Predicate::new(Node::and(
        Node::tag_eq(TAG_KEY_MEASUREMENT.to_vec(), "cpu"),
        Node::tag_eq("host", "a"),
    ))
}

/// Encode a request that carries only the given fields.
fn partial(
    source: Option<&CardinalitySource>,
    range: Option<TimestampRange>,
    predicate: Option<Predicate>,
) -> Vec<u8> {
    ReadSeriesCardinalityRequest {
        read_series_cardinality_source: source.map(CardinalitySource::to_any),
        range,
        predicate,
    }
    .encode_to_vec()
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

// =========================================================================
// Round trips
// =========================================================================

fn arb_predicate() -> impl Strategy<Value = Option<Predicate>> {
    prop_oneof![
        Just(None),
        Just(Some(Predicate::default())),
        ("[a-z]{1,8}", "[a-z0-9]{0,8}")
            .prop_map(|(key, value)| Some(Predicate::new(Node::tag_eq(key, value)))),
        ("[a-z]{1,8}", "[a-z]{1,8}").prop_map(|(a, b)| Some(Predicate::new(Node::or(
            Node::tag_eq("host", a),
            Node::paren(Node::tag_eq("region", b)),
        )))),
    ]
}

fn arb_source() -> impl Strategy<Value = CardinalitySource> {
    prop_oneof![
        (any::<u64>(), any::<u64>(), any::<u64>()).prop_map(|(org_id, bucket_id, partition_id)| {
            CardinalitySource::Read(ReadSource {
                org_id,
                bucket_id,
                partition_id,
            })
        }),
        "[a-zA-Z0-9-]{0,16}".prop_map(|name| opaque_source(&name)),
    ]
}

proptest! {
    #[test]
    fn test_request_round_trip(
        source in arb_source(),
        start in any::<i64>(),
        end in any::<i64>(),
        predicate in arb_predicate(),
    ) {
        let request = CardinalityRequest {
            source,
            range: TimestampRange::new(start, end),
            predicate,
        };
        let decoded = decode_request(&encode_request(&request)).unwrap();
        prop_assert_eq!(decoded, request);
    }

    #[test]
    fn test_response_round_trip(values in proptest::collection::vec(any::<i64>(), 0..32)) {
        let response = CardinalityResponse::new(values);
        let decoded = decode_response(&encode_response(&response)).unwrap();
        prop_assert_eq!(decoded, response);
    }
}

#[test]
fn test_empty_response_round_trip() {
    let encoded = encode_response(&CardinalityResponse::default());
    assert!(encoded.is_empty(), "Empty values encode to zero bytes");

    let decoded = decode_response(&encoded).unwrap();
    assert_eq!(decoded.values.len(), 0);

    let decoded = decode_response(&[]).unwrap();
    assert!(decoded.values.is_empty(), "Empty buffer is an empty response");
}

#[test]
fn test_response_accepts_unpacked_values() {
    // Two unpacked varint entries for tag 1: 7 and 9
    let decoded = decode_response(&[0x08, 0x07, 0x08, 0x09]).unwrap();
    assert_eq!(decoded.values, vec![7, 9]);
}

// =========================================================================
// Forward compatibility
// =========================================================================

#[test]
fn test_unknown_fields_are_skipped() {
    let source = CardinalitySource::Read(ReadSource::new(3, 4));
    let range = TimestampRange::new(-5, 500);

    let mut buf = Vec::new();
    // field 9, varint 5
    buf.extend_from_slice(&[0x48, 0x05]);
    buf.extend(partial(Some(&source), None, None));
    // field 100, length-delimited "abc"
    buf.extend_from_slice(&[0xA2, 0x06, 0x03, b'a', b'b', b'c']);
    buf.extend(partial(None, Some(range), None));
    // field 15, fixed64
    buf.extend_from_slice(&[0x79, 1, 2, 3, 4, 5, 6, 7, 8]);
    buf.extend(partial(None, None, Some(host_predicate())));
    // field 16, fixed32
    buf.extend_from_slice(&[0x85, 0x01, 9, 9, 9, 9]);

    let decoded = decode_request(&buf).unwrap();
    assert_eq!(decoded.source, source);
    assert_eq!(decoded.range, range);
    assert_eq!(decoded.predicate, Some(host_predicate()));
}

#[test]
fn test_unknown_source_kind_is_preserved_by_default() {
    let source = opaque_source("bucket-A");
    let buf = partial(Some(&source), Some(TimestampRange::new(0, 1)), None);

    let decoded = decode_request(&buf).unwrap();
    assert_eq!(decoded.source, source);
    assert_eq!(decoded.source.type_url(), OPAQUE_TYPE_URL);
}

#[test]
fn test_unknown_source_kind_rejected_when_strict() {
    let buf = partial(
        Some(&opaque_source("bucket-A")),
        Some(TimestampRange::new(0, 1)),
        None,
    );

    let registry = SourceRegistry::new(SourcePolicy::Strict);
    match decode_request_with(&buf, &registry) {
        Err(Error::UnknownSourceType(type_url)) => assert_eq!(type_url, OPAQUE_TYPE_URL),
        other => panic!("Expected UnknownSourceType, got {:?}", other),
    }
}

// =========================================================================
// Required and optional fields
// =========================================================================

#[test]
fn test_missing_range_is_rejected() {
    let buf = partial(
        Some(&CardinalitySource::Read(ReadSource::new(1, 1))),
        None,
        Some(host_predicate()),
    );

    match decode_request(&buf) {
        Err(Error::MissingRequiredField(field)) => assert_eq!(field, "range"),
        other => panic!("Expected MissingRequiredField, got {:?}", other),
    }
}

#[test]
fn test_missing_source_is_rejected() {
    let buf = partial(None, Some(TimestampRange::new(0, 1)), None);
    assert!(matches!(
        decode_request(&buf),
        Err(Error::MissingRequiredField(_))
    ));
}

#[test]
fn test_missing_predicate_means_match_all() {
    let buf = partial(
        Some(&CardinalitySource::Read(ReadSource::new(1, 1))),
        Some(TimestampRange::new(0, 1)),
        None,
    );

    let decoded = decode_request(&buf).unwrap();
    assert!(decoded.predicate.is_none(), "Absent predicate decodes to None");
}

#[test]
fn test_zero_range_is_still_present() {
    // An explicitly encoded range with default values serializes as an empty
    // sub-message and must not be confused with an absent range.
    let buf = partial(
        Some(&CardinalitySource::Read(ReadSource::new(1, 1))),
        Some(TimestampRange::new(0, 0)),
        None,
    );
    assert!(contains_subslice(&buf, &[0x12, 0x00]));

    let decoded = decode_request(&buf).unwrap();
    assert_eq!(decoded.range, TimestampRange::new(0, 0));
}

#[test]
fn test_truncated_buffer_is_malformed() {
    let request = CardinalityRequest::new(ReadSource::new(1, 2), TimestampRange::new(1, 2))
        .with_predicate(host_predicate());
    let encoded = encode_request(&request);

    let err = decode_request(&encoded[..encoded.len() - 1]).unwrap_err();
    assert!(matches!(err, Error::MalformedMessage(_)));
}

// =========================================================================
// Known encoding
// =========================================================================

#[test]
fn test_known_request_encoding() {
    let request = CardinalityRequest::new(opaque_source("bucket-A"), TimestampRange::new(1000, 2000));

    let encoded = encode_request(&request);
    assert_eq!(encoded, encode_request(&request), "Encoding is deterministic");

    // tag 2, length 6, then start=1000 and end=2000 as varints
    let range_field = [0x12, 0x06, 0x08, 0xE8, 0x07, 0x10, 0xD0, 0x0F];
    assert!(
        contains_subslice(&encoded, &range_field),
        "Range sub-message should be 08 E8 07 10 D0 0F, got {:02X?}",
        encoded.as_ref()
    );
    assert_eq!(encoded[0], 0x0A, "Source is written first as tag 1");

    let decoded = decode_request(&encoded).unwrap();
    assert_eq!(decoded.range.start, 1000);
    assert_eq!(decoded.range.end, 2000);
    assert_eq!(decoded.predicate, None);
    match decoded.source {
        CardinalitySource::Unknown { type_url, value } => {
            assert_eq!(type_url, OPAQUE_TYPE_URL);
            assert_eq!(value.as_ref(), b"bucket-A");
        }
        other => panic!("Expected opaque source, got {:?}", other),
    }
}

#[test]
fn test_read_source_type_url_resolves() {
    let request = CardinalityRequest::new(ReadSource::new(7, 8), TimestampRange::new(0, 10));
    let proto = ReadSeriesCardinalityRequest::from(&request);
    let any = proto.read_series_cardinality_source.clone().unwrap();
    assert_eq!(any.type_url, seriescount::proto::READ_SOURCE_TYPE_URL);

    let decoded = CardinalityRequest::from_proto(proto, &SourceRegistry::default()).unwrap();
    assert_eq!(decoded.source, CardinalitySource::Read(ReadSource::new(7, 8)));
}

#[test]
fn test_response_wire_shape() {
    let proto = Int64ValuesResponse { values: vec![1, 300] };
    // packed: tag 1 length-delimited, 3 bytes of varints
    assert_eq!(proto.encode_to_vec(), vec![0x0A, 0x03, 0x01, 0xAC, 0x02]);
}
