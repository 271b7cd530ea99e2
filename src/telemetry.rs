//! Shared telemetry bootstrap for seriescount binaries.

use crate::{Error, Result};

use opentelemetry::global;
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use std::collections::BTreeMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

const ATTR_SERVICE_NAME: &str = "service.name";
const ATTR_SERVICE_NAMESPACE: &str = "service.namespace";
const ATTR_SERVICE_VERSION: &str = "service.version";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(Error::Config(format!(
                "log format must be one of [json, pretty], got '{other}'"
            ))),
        }
    }
}

/// Parsed telemetry configuration from environment.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_format: LogFormat,
    pub resource_attributes: Vec<KeyValue>,
}

impl TelemetryConfig {
    /// Environment variables:
    /// - OTEL_SERVICE_NAME: overrides `default_service_name`
    /// - OTEL_RESOURCE_ATTRIBUTES: comma separated `key=value` pairs
    /// - SERIESCOUNT_LOG_FORMAT: "json" (default) or "pretty"
    pub fn from_env(default_service_name: &str) -> Result<Self> {
        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| default_service_name.to_string());
        let service_name = service_name.trim();
        if service_name.is_empty() {
            return Err(Error::Config(
                "OTEL_SERVICE_NAME cannot be empty".to_string(),
            ));
        }

        let log_format = match std::env::var("SERIESCOUNT_LOG_FORMAT") {
            Ok(raw) => raw.parse()?,
            Err(_) => LogFormat::Json,
        };

        let mut attr_map: BTreeMap<String, String> = BTreeMap::new();
        if let Ok(attr_str) = std::env::var("OTEL_RESOURCE_ATTRIBUTES") {
            for (key, value) in parse_resource_attributes(&attr_str)? {
                attr_map.insert(key, value);
            }
        }

        attr_map.insert(ATTR_SERVICE_NAME.to_string(), service_name.to_string());
        attr_map
            .entry(ATTR_SERVICE_NAMESPACE.to_string())
            .or_insert_with(|| "seriescount".to_string());
        attr_map
            .entry(ATTR_SERVICE_VERSION.to_string())
            .or_insert_with(|| env!("CARGO_PKG_VERSION").to_string());

        let attributes = attr_map
            .into_iter()
            .map(|(k, v)| KeyValue::new(k, v))
            .collect::<Vec<_>>();

        Ok(Self {
            service_name: service_name.to_string(),
            log_format,
            resource_attributes: attributes,
        })
    }
}

/// Handle that keeps the meter provider alive for process lifetime.
pub struct Telemetry {
    config: TelemetryConfig,
    meter_provider: SdkMeterProvider,
}

impl Telemetry {
    /// Initialize tracing and the OTel meter provider for a binary.
    ///
    /// `log_level` is an `EnvFilter` directive; `RUST_LOG` wins when set.
    pub fn init_for_component(default_service_name: &str, log_level: &str) -> Result<Self> {
        let config = TelemetryConfig::from_env(default_service_name)?;
        let filter = build_filter(log_level)?;

        let init = match config.log_format {
            LogFormat::Json => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .pretty()
                .try_init(),
        };
        init.map_err(|e| {
            Error::Config(format!("failed to initialize telemetry subscriber: {e}"))
        })?;

        let resource =
            Resource::default().merge(&Resource::new(config.resource_attributes.clone()));
        let meter_provider = SdkMeterProvider::builder().with_resource(resource).build();
        global::set_meter_provider(meter_provider.clone());

        info!(
            service_name = %config.service_name,
            log_format = config.log_format.as_str(),
            "Telemetry bootstrap initialized"
        );

        Ok(Self {
            config,
            meter_provider,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }

    pub fn log_format(&self) -> LogFormat {
        self.config.log_format
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        let _ = self.meter_provider.shutdown();
    }
}

fn build_filter(log_level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = log_level.trim();
    if directive.is_empty() {
        return Err(Error::Config("log level cannot be empty".to_string()));
    }
    EnvFilter::try_new(directive)
        .map_err(|e| Error::Config(format!("invalid log level '{directive}': {e}")))
}

fn parse_resource_attributes(raw: &str) -> Result<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for pair in raw.split(',') {
        let trimmed = pair.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(Error::Config(format!(
                "OTEL_RESOURCE_ATTRIBUTES entry '{trimmed}' is invalid, expected key=value"
            )));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Config(
                "OTEL_RESOURCE_ATTRIBUTES contains an empty attribute key".to_string(),
            ));
        }

        attrs.push((key.to_string(), value.trim().to_string()));
    }
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_resource_attributes_accepts_valid_input() {
        let attrs = parse_resource_attributes("service.instance.id=abc, foo=bar,").unwrap();
        assert_eq!(
            attrs,
            vec![
                ("service.instance.id".to_string(), "abc".to_string()),
                ("foo".to_string(), "bar".to_string())
            ]
        );
    }

    #[test]
    fn parse_resource_attributes_rejects_invalid_pairs() {
        let err = parse_resource_attributes("broken").unwrap_err();
        assert!(format!("{err}").contains("key=value"));

        let err = parse_resource_attributes("=value").unwrap_err();
        assert!(format!("{err}").contains("empty attribute key"));
    }

    #[test]
    fn log_format_parses_aliases() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
