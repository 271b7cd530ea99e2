//! Series cardinality query contract.
//!
//! Domain types for the cardinality request/response pair and the functions
//! that move them on and off the wire. The wire structs in [`crate::proto`]
//! make every message field optional; the types here make the required ones
//! unrepresentable when absent:
//!
//! - the source is exactly one [`CardinalitySource`]
//! - the range is a plain [`TimestampRange`]
//! - the predicate is `Option<Predicate>`, where `None` means match all
//!
//! Decoding skips unknown field tags so that newer encoders can add fields
//! without breaking older decoders. A recognized tag carrying the wrong wire
//! type is a [`Error::MalformedMessage`].

mod registry;

pub use registry::{SourceDecoder, SourcePolicy, SourceRegistry};

use crate::proto::{
    Int64ValuesResponse, Predicate, ReadSeriesCardinalityRequest, ReadSource, TimestampRange,
    READ_SOURCE_TYPE_URL,
};
use crate::{Error, Result};

use bytes::Bytes;
use prost::Message;

/// Where to count series from.
#[derive(Debug, Clone, PartialEq)]
pub enum CardinalitySource {
    /// An organization/bucket pair.
    Read(ReadSource),
    /// A payload whose type URL the receiving registry does not know.
    ///
    /// Only decoding under [`SourcePolicy::Permissive`] should build this.
    /// The type URL must not be one the peer registry knows: an `Unknown`
    /// carrying [`READ_SOURCE_TYPE_URL`] encodes to the same bytes as a
    /// `Read` source and decodes as one, so it does not survive a round trip.
    Unknown { type_url: String, value: Bytes },
}

impl CardinalitySource {
    pub fn type_url(&self) -> &str {
        match self {
            CardinalitySource::Read(_) => READ_SOURCE_TYPE_URL,
            CardinalitySource::Unknown { type_url, .. } => type_url,
        }
    }

    /// Pack into `google.protobuf.Any`.
    pub fn to_any(&self) -> prost_types::Any {
        match self {
            CardinalitySource::Read(source) => prost_types::Any {
                type_url: READ_SOURCE_TYPE_URL.to_string(),
                value: source.encode_to_vec(),
            },
            CardinalitySource::Unknown { type_url, value } => prost_types::Any {
                type_url: type_url.clone(),
                value: value.to_vec(),
            },
        }
    }
}

impl From<ReadSource> for CardinalitySource {
    fn from(source: ReadSource) -> Self {
        CardinalitySource::Read(source)
    }
}

/// A request to count distinct series.
#[derive(Debug, Clone, PartialEq)]
pub struct CardinalityRequest {
    pub source: CardinalitySource,
    pub range: TimestampRange,
    pub predicate: Option<Predicate>,
}

impl CardinalityRequest {
    pub fn new(source: impl Into<CardinalitySource>, range: TimestampRange) -> Self {
        Self {
            source: source.into(),
            range,
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Validate field presence of a decoded wire message and resolve its
    /// source through `registry`.
    pub fn from_proto(
        proto: ReadSeriesCardinalityRequest,
        registry: &SourceRegistry,
    ) -> Result<Self> {
        let any = proto
            .read_series_cardinality_source
            .ok_or(Error::MissingRequiredField("read_series_cardinality_source"))?;
        let range = proto.range.ok_or(Error::MissingRequiredField("range"))?;
        let source = registry.resolve(any)?;

        Ok(Self {
            source,
            range,
            predicate: proto.predicate,
        })
    }
}

impl From<&CardinalityRequest> for ReadSeriesCardinalityRequest {
    fn from(request: &CardinalityRequest) -> Self {
        Self {
            read_series_cardinality_source: Some(request.source.to_any()),
            range: Some(request.range),
            predicate: request.predicate.clone(),
        }
    }
}

impl From<CardinalityRequest> for ReadSeriesCardinalityRequest {
    fn from(request: CardinalityRequest) -> Self {
        Self {
            read_series_cardinality_source: Some(request.source.to_any()),
            range: Some(request.range),
            predicate: request.predicate,
        }
    }
}

/// The counts answered for a [`CardinalityRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CardinalityResponse {
    pub values: Vec<i64>,
}

impl CardinalityResponse {
    pub fn new(values: Vec<i64>) -> Self {
        Self { values }
    }

    /// A response holding one aggregate count.
    pub fn single(count: i64) -> Self {
        Self {
            values: vec![count],
        }
    }
}

impl From<Int64ValuesResponse> for CardinalityResponse {
    fn from(proto: Int64ValuesResponse) -> Self {
        Self {
            values: proto.values,
        }
    }
}

impl From<CardinalityResponse> for Int64ValuesResponse {
    fn from(response: CardinalityResponse) -> Self {
        Self {
            values: response.values,
        }
    }
}

/// Encode a request as a `ReadSeriesCardinalityRequest`.
pub fn encode_request(request: &CardinalityRequest) -> Bytes {
    let proto = ReadSeriesCardinalityRequest::from(request);
    Bytes::from(proto.encode_to_vec())
}

/// Decode a request, resolving the source with the default registry.
pub fn decode_request(buf: &[u8]) -> Result<CardinalityRequest> {
    decode_request_with(buf, &SourceRegistry::default())
}

/// Decode a request, resolving the source with `registry`.
pub fn decode_request_with(buf: &[u8], registry: &SourceRegistry) -> Result<CardinalityRequest> {
    let proto = ReadSeriesCardinalityRequest::decode(buf)?;
    CardinalityRequest::from_proto(proto, registry)
}

/// Encode a response as an `Int64ValuesResponse`.
pub fn encode_response(response: &CardinalityResponse) -> Bytes {
    let proto = Int64ValuesResponse {
        values: response.values.clone(),
    };
    Bytes::from(proto.encode_to_vec())
}

pub fn decode_response(buf: &[u8]) -> Result<CardinalityResponse> {
    let proto = Int64ValuesResponse::decode(buf)?;
    Ok(proto.into())
}
