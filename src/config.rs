//! Environment-based server configuration
//!
//! Environment variables:
//! - SERIESCOUNT_GRPC_ADDR: gRPC listen address (default: 0.0.0.0:8082)
//! - SERIESCOUNT_HTTP_ADDR: HTTP listen address (default: 0.0.0.0:8080)
//! - SERIESCOUNT_MAX_MESSAGE_SIZE: gRPC message limit in bytes (default: 4MiB)
//! - SERIESCOUNT_MAX_BODY_SIZE: HTTP body limit in bytes (default: 16MiB)
//! - SERIESCOUNT_ENABLE_CORS: enable permissive CORS (default: true)
//! - SERIESCOUNT_SOURCE_POLICY: "permissive" (default) or "strict"
//! - SERIESCOUNT_MAX_PREDICATE_NODES: predicate size limit (default: 1024)

use crate::contract::SourcePolicy;
use crate::query::QueryConfig;
use crate::{Error, Result};

use std::net::SocketAddr;
use std::str::FromStr;

pub const DEFAULT_GRPC_ADDR: &str = "0.0.0.0:8082";
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub grpc_addr: SocketAddr,
    pub http_addr: SocketAddr,
    /// Maximum encoded or decoded gRPC message size
    pub max_message_size: usize,
    /// Maximum HTTP request body size
    pub max_body_size: usize,
    pub enable_cors: bool,
    pub query: QueryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: SocketAddr::from(([0, 0, 0, 0], 8082)),
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_message_size: 4 * 1024 * 1024, // 4MB
            max_body_size: 16 * 1024 * 1024, // 16MB
            enable_cors: true,
            query: QueryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build from `SERIESCOUNT_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            grpc_addr: parse_var(&lookup, "SERIESCOUNT_GRPC_ADDR")?.unwrap_or(defaults.grpc_addr),
            http_addr: parse_var(&lookup, "SERIESCOUNT_HTTP_ADDR")?.unwrap_or(defaults.http_addr),
            max_message_size: parse_var(&lookup, "SERIESCOUNT_MAX_MESSAGE_SIZE")?
                .unwrap_or(defaults.max_message_size),
            max_body_size: parse_var(&lookup, "SERIESCOUNT_MAX_BODY_SIZE")?
                .unwrap_or(defaults.max_body_size),
            enable_cors: match lookup("SERIESCOUNT_ENABLE_CORS") {
                Some(raw) => parse_bool("SERIESCOUNT_ENABLE_CORS", &raw)?,
                None => defaults.enable_cors,
            },
            query: QueryConfig {
                source_policy: parse_var::<SourcePolicy, _>(&lookup, "SERIESCOUNT_SOURCE_POLICY")?
                    .unwrap_or(defaults.query.source_policy),
                max_predicate_nodes: parse_var(&lookup, "SERIESCOUNT_MAX_PREDICATE_NODES")?
                    .unwrap_or(defaults.query.max_predicate_nodes),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_message_size == 0 {
            return Err(Error::Config("max_message_size must be positive".to_string()));
        }
        if self.max_body_size == 0 {
            return Err(Error::Config("max_body_size must be positive".to_string()));
        }
        if self.query.max_predicate_nodes == 0 {
            return Err(Error::Config(
                "max_predicate_nodes must be positive".to_string(),
            ));
        }
        if self.grpc_addr.port() != 0 && self.grpc_addr == self.http_addr {
            return Err(Error::Config(format!(
                "gRPC and HTTP cannot share address {}",
                self.grpc_addr
            )));
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e| Error::Config(format!("{name}: invalid value '{raw}': {e}")))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{name} must be a boolean (true/false/1/0), got '{raw}'"
        ))),
    }
}
