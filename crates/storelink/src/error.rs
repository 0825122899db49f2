//! Error types for storelink
//!
//! Errors are split by what a caller can do about them:
//! - Connection-class errors (dial, operation, timeout) invalidate the cached
//!   handle and are retried exactly once by [`ConnectionCache::with_connection`]
//! - Data-shape errors (bind, not found, configuration) are never retried
//!
//! [`ConnectionCache::with_connection`]: crate::cache::ConnectionCache::with_connection

use std::fmt;
use thiserror::Error;

use crate::config::BackendKind;

/// Result type for storelink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error from a wrapped client library
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Could not establish a handle
    Dial,
    /// A call through an established handle failed
    Operation,
    /// An operation exceeded its deadline
    Timeout,
    /// A lookup or scalar bind found no row
    NotFound,
    /// Decoding a result into a target failed
    Bind,
    /// Malformed or contradictory configuration
    Configuration,
}

impl ErrorCategory {
    /// Whether errors in this category mean the handle should be replaced
    #[inline]
    pub const fn is_connection_error(self) -> bool {
        matches!(self, Self::Dial | Self::Operation | Self::Timeout)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dial => write!(f, "dial"),
            Self::Operation => write!(f, "operation"),
            Self::Timeout => write!(f, "timeout"),
            Self::NotFound => write!(f, "not_found"),
            Self::Bind => write!(f, "bind"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Main error type for storelink
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Could not establish a handle for a fingerprint
    #[error("{backend} dial error: {message}")]
    Dial {
        backend: BackendKind,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A call through an established handle failed
    #[error("operation error: {message}")]
    Operation {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Operation exceeded its deadline
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// Empty result for a scalar target, or a lookup that found nothing
    #[error("not found")]
    NotFound,

    /// Result did not decode into the target
    #[error(transparent)]
    Bind(#[from] BindError),

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Dial { .. } => ErrorCategory::Dial,
            Self::Operation { .. } => ErrorCategory::Operation,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::NotFound => ErrorCategory::NotFound,
            Self::Bind(_) => ErrorCategory::Bind,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }

    /// Whether this error should invalidate the handle it happened on
    #[inline]
    pub fn is_connection_error(&self) -> bool {
        self.category().is_connection_error()
    }

    /// Whether this is the distinguished not-found outcome
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Create a dial error
    pub fn dial(backend: BackendKind, message: impl Into<String>) -> Self {
        Self::Dial {
            backend,
            message: message.into(),
            source: None,
        }
    }

    /// Create a dial error with source
    pub fn dial_with_source(
        backend: BackendKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Dial {
            backend,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an operation error
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation error with source
    pub fn operation_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Operation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::config(err.to_string())
    }
}

/// Decoding failure, always carrying the column or field it happened on
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BindError {
    /// Raw value could not be parsed as the expected kind
    #[error("cannot parse {value:?} for `{target}` as {expected}")]
    Parse {
        target: String,
        value: String,
        expected: &'static str,
    },

    /// Value parsed but does not fit the destination width
    #[error("value {value:?} overflows {kind} for `{target}`")]
    Overflow {
        target: String,
        value: String,
        kind: &'static str,
    },

    /// Required-non-empty field resolved to an empty value
    #[error("field `{field}` must not be empty ({})", presence(.absent))]
    Required { field: String, absent: bool },

    /// Field kind the binder cannot populate
    #[error("unsupported field kind {kind} for `{field}`")]
    Unsupported { field: String, kind: String },
}

fn presence(absent: &bool) -> &'static str {
    if *absent {
        "column absent"
    } else {
        "column empty"
    }
}

impl BindError {
    /// Name of the column or field the failure is attached to
    pub fn target(&self) -> &str {
        match self {
            Self::Parse { target, .. } | Self::Overflow { target, .. } => target,
            Self::Required { field, .. } | Self::Unsupported { field, .. } => field,
        }
    }

    /// Whether the failure is a width overflow
    #[inline]
    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::Overflow { .. })
    }
}
