//! Error types for seriescount

use std::fmt;

/// Result type alias for seriescount operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for seriescount
#[derive(Debug)]
pub enum Error {
    /// Bytes do not conform to the wire grammar
    MalformedMessage(prost::DecodeError),
    /// A mandatory field was absent after decode
    MissingRequiredField(&'static str),
    /// The source type discriminator could not be resolved
    UnknownSourceType(String),
    /// Timestamp range with start after end
    InvalidRange { start: i64, end: i64 },
    /// Predicate could not be parsed or evaluated
    Predicate(String),
    /// Line protocol parse failure
    LineProtocol { line: usize, message: String },
    /// Write changes the value type of an existing series
    FieldTypeConflict {
        series: String,
        existing: &'static str,
        attempted: &'static str,
    },
    /// Configuration errors
    Config(String),
    /// IO errors
    Io(std::io::Error),
    /// gRPC transport errors
    Transport(tonic::transport::Error),
    /// Internal error
    Internal(String),
}

impl Error {
    /// True for errors caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedMessage(_)
                | Error::MissingRequiredField(_)
                | Error::UnknownSourceType(_)
                | Error::InvalidRange { .. }
                | Error::Predicate(_)
                | Error::LineProtocol { .. }
                | Error::FieldTypeConflict { .. }
        )
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MalformedMessage(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedMessage(e) => write!(f, "Malformed message: {}", e),
            Error::MissingRequiredField(field) => {
                write!(f, "Missing required field: {}", field)
            }
            Error::UnknownSourceType(type_url) => {
                write!(f, "Unknown source type: {}", type_url)
            }
            Error::InvalidRange { start, end } => {
                write!(f, "Invalid timestamp range: start {} is after end {}", start, end)
            }
            Error::Predicate(msg) => write!(f, "Predicate error: {}", msg),
            Error::LineProtocol { line, message } => {
                write!(f, "Line protocol error on line {}: {}", line, message)
            }
            Error::FieldTypeConflict {
                series,
                existing,
                attempted,
            } => write!(
                f,
                "Field type conflict for series {}: existing type {}, attempted {}",
                series, existing, attempted
            ),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Transport(e) => write!(f, "Transport error: {}", e),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl From<prost::DecodeError> for Error {
    fn from(e: prost::DecodeError) -> Self {
        Error::MalformedMessage(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(e: tonic::transport::Error) -> Self {
        Error::Transport(e)
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::Predicate(format!("invalid regex: {}", e))
    }
}

impl From<Error> for tonic::Status {
    fn from(e: Error) -> Self {
        match &e {
            Error::UnknownSourceType(_) => tonic::Status::unimplemented(e.to_string()),
            _ if e.is_client_error() => tonic::Status::invalid_argument(e.to_string()),
            _ => tonic::Status::internal(e.to_string()),
        }
    }
}
