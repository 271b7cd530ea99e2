//! Resolution of `google.protobuf.Any` payloads into known source kinds.

use super::CardinalitySource;
use crate::proto::{ReadSource, READ_SOURCE_TYPE_URL};
use crate::{Error, Result};

use bytes::Bytes;
use prost::Message;
use std::collections::HashMap;
use std::fmt;

/// Decodes the `value` bytes of an `Any` whose type URL is registered.
pub type SourceDecoder = fn(&[u8]) -> Result<CardinalitySource>;

/// What to do with a type URL that has no registered decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourcePolicy {
    /// Keep the payload as [`CardinalitySource::Unknown`].
    #[default]
    Permissive,
    /// Fail with [`Error::UnknownSourceType`].
    Strict,
}

impl SourcePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePolicy::Permissive => "permissive",
            SourcePolicy::Strict => "strict",
        }
    }
}

impl std::str::FromStr for SourcePolicy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            other => Err(format!(
                "unknown source policy '{}'; expected one of permissive, strict",
                other
            )),
        }
    }
}

/// Maps type URLs to decoders for the polymorphic request source.
#[derive(Clone)]
pub struct SourceRegistry {
    decoders: HashMap<String, SourceDecoder>,
    policy: SourcePolicy,
}

impl SourceRegistry {
    /// Registry with the built-in [`ReadSource`] kind.
    pub fn new(policy: SourcePolicy) -> Self {
        let mut registry = Self::empty(policy);
        registry.register(READ_SOURCE_TYPE_URL, decode_read_source);
        registry
    }

    /// Registry that knows no source kinds at all.
    pub fn empty(policy: SourcePolicy) -> Self {
        Self {
            decoders: HashMap::new(),
            policy,
        }
    }

    pub fn register(&mut self, type_url: impl Into<String>, decoder: SourceDecoder) {
        self.decoders.insert(type_url.into(), decoder);
    }

    pub fn policy(&self) -> SourcePolicy {
        self.policy
    }

    pub fn is_registered(&self, type_url: &str) -> bool {
        self.decoders.contains_key(type_url)
    }

    /// Resolve a packed source.
    ///
    /// A registered type URL whose payload fails to decode is a malformed
    /// message regardless of policy.
    pub fn resolve(&self, any: prost_types::Any) -> Result<CardinalitySource> {
        match self.decoders.get(&any.type_url) {
            Some(decode) => decode(&any.value),
            None => match self.policy {
                SourcePolicy::Permissive => Ok(CardinalitySource::Unknown {
                    type_url: any.type_url,
                    value: Bytes::from(any.value),
                }),
                SourcePolicy::Strict => Err(Error::UnknownSourceType(any.type_url)),
            },
        }
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new(SourcePolicy::default())
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut type_urls: Vec<_> = self.decoders.keys().collect();
        type_urls.sort();
        f.debug_struct("SourceRegistry")
            .field("type_urls", &type_urls)
            .field("policy", &self.policy)
            .finish()
    }
}

fn decode_read_source(value: &[u8]) -> Result<CardinalitySource> {
    let source = ReadSource::decode(value)?;
    Ok(CardinalitySource::Read(source))
}
