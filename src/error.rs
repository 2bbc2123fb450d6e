//! Error types for the telemetry pipeline.
//!
//! Every failure in the client and collector is a [`TelemetryError`]. Each
//! variant belongs to exactly one [`ErrorClass`], which decides how the
//! surrounding loop reacts:
//!
//! - **Transient**: dial, stream-open and single-frame failures. Retried or skipped.
//! - **Session-fatal**: a write failure on a connected session. Ends the session
//!   and hands control back to the reconnector.
//! - **Cancellation**: the shared shutdown signal fired. Clean exit, never logged
//!   as an error.
//! - **Configuration**: malformed parameters or credentials, detected before any
//!   task starts. The only class that aborts the process.
//!
//! ```rust
//! use suction::{ErrorClass, TelemetryError};
//!
//! let error = TelemetryError::dial_failed("127.0.0.1:4242", "connection refused");
//! assert_eq!(error.class(), ErrorClass::Transient);
//! assert!(error.is_retryable());
//!
//! let shutdown = TelemetryError::Cancelled;
//! assert!(shutdown.is_cancelled());
//! assert!(!shutdown.is_retryable());
//! ```

use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How a failure is handled by the loop that observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retried with backoff, or the offending frame is skipped.
    Transient,
    /// Ends the current transport session and triggers a reconnect.
    SessionFatal,
    /// Shutdown was requested.
    Cancellation,
    /// Invalid setup; fails fast before any task starts.
    Configuration,
}

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("TLS credential error: {reason}")]
    Tls {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Failed to connect to {address}: {reason}")]
    Dial {
        address: String,
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Failed to open stream: {reason}")]
    StreamOpen {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Stream write failed: {reason}")]
    StreamWrite {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Failed to accept {what}: {reason}")]
    Accept { what: &'static str, reason: String },

    #[error("Session is closed")]
    SessionClosed,

    #[error("Failed to encode batch: {details}")]
    Encode { details: String },

    #[error("Failed to decompress frame of {len} bytes")]
    Decompress {
        len: usize,
        #[source]
        source: snap::Error,
    },

    #[error("Failed to decode batch")]
    Decode {
        #[source]
        source: prost::DecodeError,
    },

    #[error("Invalid batch: {reason}")]
    InvalidBatch { reason: String },

    #[error("Cache error: {reason}")]
    Cache {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl TelemetryError {
    /// Taxonomy class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            TelemetryError::Config { .. } | TelemetryError::Tls { .. } => {
                ErrorClass::Configuration
            }
            TelemetryError::Cancelled => ErrorClass::Cancellation,
            TelemetryError::StreamWrite { .. } | TelemetryError::SessionClosed => {
                ErrorClass::SessionFatal
            }
            TelemetryError::Dial { .. }
            | TelemetryError::StreamOpen { .. }
            | TelemetryError::Accept { .. }
            | TelemetryError::Encode { .. }
            | TelemetryError::Decompress { .. }
            | TelemetryError::Decode { .. }
            | TelemetryError::InvalidBatch { .. }
            | TelemetryError::Cache { .. }
            | TelemetryError::Io(_) => ErrorClass::Transient,
        }
    }

    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// Session-fatal errors are retryable too: the session is discarded and a
    /// fresh one is dialed.
    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::Transient | ErrorClass::SessionFatal)
    }

    /// Whether this error represents a shutdown request rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TelemetryError::Cancelled)
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Config { .. } => vec![
                "Check the configuration file and SUCTION_* environment variables",
                "Ensure keep-alive period is shorter than the idle timeout",
                "Ensure initial receive windows do not exceed max windows",
            ],
            TelemetryError::Tls { .. } => vec![
                "Check certificate and key paths",
                "Verify files are PEM encoded",
                "Ensure the client trusts the server certificate",
            ],
            TelemetryError::Dial { .. } | TelemetryError::StreamOpen { .. } => vec![
                "Ensure the collector is running and reachable",
                "Check the dial address and server name",
                "Wait for the reconnector to retry",
            ],
            TelemetryError::StreamWrite { .. } | TelemetryError::SessionClosed => vec![
                "Check network connectivity",
                "Check collector logs for closed connections",
            ],
            TelemetryError::Accept { .. } => vec!["Check collector network interfaces"],
            TelemetryError::Encode { .. } => vec!["Reduce batch interval to keep batches small"],
            TelemetryError::Decompress { .. }
            | TelemetryError::Decode { .. }
            | TelemetryError::InvalidBatch { .. } => vec![
                "Verify client and collector wire versions match",
                "Increase the server stream buffer size for large batches",
            ],
            TelemetryError::Cache { .. } => vec![
                "Ensure the cache server is running",
                "Check the cache URL",
            ],
            TelemetryError::Io(_) => vec!["Check system resources and permissions"],
            TelemetryError::Cancelled => vec![],
        }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        TelemetryError::Config { reason: reason.into() }
    }

    /// Helper constructor for TLS credential errors.
    pub fn tls(reason: impl Into<String>) -> Self {
        TelemetryError::Tls { reason: reason.into(), source: None }
    }

    /// Helper constructor for TLS credential errors with source.
    pub fn tls_with_source(reason: impl Into<String>, source: impl Into<BoxError>) -> Self {
        TelemetryError::Tls { reason: reason.into(), source: Some(source.into()) }
    }

    /// Helper constructor for dial failures.
    pub fn dial_failed(address: impl Into<String>, reason: impl Into<String>) -> Self {
        TelemetryError::Dial { address: address.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for dial failures with source.
    pub fn dial_failed_with_source(
        address: impl Into<String>,
        reason: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        TelemetryError::Dial {
            address: address.into(),
            reason: reason.into(),
            source: Some(source.into()),
        }
    }

    /// Helper constructor for stream-open failures.
    pub fn stream_open_failed(reason: impl Into<String>, source: Option<BoxError>) -> Self {
        TelemetryError::StreamOpen { reason: reason.into(), source }
    }

    /// Helper constructor for stream write failures.
    pub fn stream_write_failed(reason: impl Into<String>, source: Option<BoxError>) -> Self {
        TelemetryError::StreamWrite { reason: reason.into(), source }
    }

    /// Helper constructor for transient accept failures.
    pub fn accept_failed(what: &'static str, reason: impl Into<String>) -> Self {
        TelemetryError::Accept { what, reason: reason.into() }
    }

    /// Helper constructor for cache failures.
    pub fn cache(reason: impl Into<String>, source: Option<BoxError>) -> Self {
        TelemetryError::Cache { reason: reason.into(), source }
    }
}
