//! Error taxonomy shared by every backend adapter.
//!
//! Backends translate native failures (an ADIOS2 exception, an `herr_t` return
//! code, a JSON parse error) into one of the variants here before the error
//! crosses back into the frontend, which needs a richer, matchable shape
//! than a single error code.

use std::fmt;

/// Which kind of object an [`Error::Read`] failure concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AffectedObject {
    File,
    Dataset,
    Attribute,
    Path,
    Other,
}

impl fmt::Display for AffectedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AffectedObject::File => "file",
            AffectedObject::Dataset => "dataset",
            AffectedObject::Attribute => "attribute",
            AffectedObject::Path => "path",
            AffectedObject::Other => "object",
        };
        f.write_str(s)
    }
}

/// Why a read failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadReason {
    NotFound,
    Inaccessible,
    CannotRead,
    UnexpectedContent,
}

impl fmt::Display for ReadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReadReason::NotFound => "not found",
            ReadReason::Inaccessible => "inaccessible",
            ReadReason::CannotRead => "cannot read",
            ReadReason::UnexpectedContent => "unexpected content",
        };
        f.write_str(s)
    }
}

/// Closed error taxonomy for the I/O core, per spec §7.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A read of a file/path/dataset/attribute failed.
    #[error("failed to read {object} {name:?}: {reason}")]
    Read {
        object: AffectedObject,
        name: String,
        reason: ReadReason,
    },

    /// The active backend does not implement the requested operation.
    #[error("operation unsupported in backend {backend_name}: {details}")]
    OperationUnsupportedInBackend {
        backend_name: &'static str,
        details: String,
    },

    /// A JSON/TOML configuration value did not match the expected schema.
    #[error("invalid backend configuration at {}: {message}", json_path.join("."))]
    BackendConfigSchema {
        json_path: Vec<String>,
        message: String,
    },

    /// The frontend called an operation the current access mode forbids.
    #[error("wrong API usage: {message}")]
    WrongAPIUsage { message: String },

    /// An invariant of the core itself was violated; always a bug.
    #[error("internal error: {message}")]
    Internal { message: String },

    /// An attribute lookup by name failed to find the attribute.
    #[error("no such attribute: {name}")]
    NoSuchAttribute { name: String },

    /// Well-formed input that the core cannot make sense of.
    #[error("unsupported data: {message}")]
    UnsupportedData { message: String },
}

impl Error {
    pub fn read(object: AffectedObject, name: impl Into<String>, reason: ReadReason) -> Self {
        Error::Read {
            object,
            name: name.into(),
            reason,
        }
    }

    pub fn unsupported(backend_name: &'static str, details: impl Into<String>) -> Self {
        Error::OperationUnsupportedInBackend {
            backend_name,
            details: details.into(),
        }
    }

    pub fn config_schema(json_path: &[&str], message: impl Into<String>) -> Self {
        Error::BackendConfigSchema {
            json_path: json_path.iter().map(|s| s.to_string()).collect(),
            message: message.into(),
        }
    }

    pub fn wrong_api_usage(message: impl Into<String>) -> Self {
        Error::WrongAPIUsage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }
}

/// Result type used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;
