// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Error Types
 * Engine, orchestration and reconciliation failures
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::time::Duration;
use thiserror::Error;

/// Failures raised while driving a scan engine through a run.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Connection, timeout or authentication failure. Retryable with backoff.
    #[error("Scan engine unavailable at {endpoint}: {reason}")]
    EngineUnavailable {
        endpoint: String,
        reason: String,
    },

    /// The engine refused the request (bad target, bad spec, unknown scan id).
    #[error("Scan engine rejected {operation}: {reason}")]
    EngineRejected {
        operation: String,
        reason: String,
    },

    /// The engine answered, but not in the shape we expect.
    #[error("Failed to decode {operation} response: {reason}")]
    Decode {
        operation: String,
        reason: String,
    },

    /// Scan finished but alerts or summary could not be fetched.
    #[error("Result collection failed for {target}: {reason}")]
    ResultCollectionFailed {
        target: String,
        reason: String,
    },

    #[error("Scan cancelled: {reason}")]
    Cancelled {
        reason: CancelReason,
    },

    /// API specification import discovered nothing and the run is configured to fail on it.
    #[error("OpenAPI import from {spec_url} discovered no URLs")]
    EmptyImport {
        spec_url: String,
    },

    #[error("A scan is already in flight for {target}")]
    AlreadyRunning {
        target: String,
    },
}

/// Why a run stopped before reaching a terminal phase on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Signal,
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Signal => write!(f, "cancellation requested"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

impl ScanError {
    pub fn unavailable(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        ScanError::EngineUnavailable {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    pub fn rejected(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        ScanError::EngineRejected {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        ScanError::Decode {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ScanError::EngineUnavailable { .. } => true,
            ScanError::ResultCollectionFailed { .. } => true,
            ScanError::EngineRejected { .. } => false,
            ScanError::Decode { .. } => false,
            ScanError::Cancelled { .. } => false,
            ScanError::EmptyImport { .. } => false,
            ScanError::AlreadyRunning { .. } => false,
        }
    }

    /// Cancellation is terminal but not a failure for reporting purposes.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ScanError::Cancelled { .. })
    }

    /// Get suggested retry delay for this error
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            ScanError::EngineUnavailable { .. } => None,
            ScanError::ResultCollectionFailed { .. } => Some(Duration::from_secs(5)),
            _ => None,
        }
    }
}

/// Map an HTTP status answered by the engine onto the taxonomy.
pub fn classify_status(operation: &str, status: u16, message: &str) -> ScanError {
    match status {
        401 | 403 => ScanError::unavailable(operation, format!("HTTP {}: {}", status, message)),
        408 | 429 => ScanError::unavailable(operation, format!("HTTP {}: {}", status, message)),
        400..=499 => ScanError::rejected(operation, format!("HTTP {}: {}", status, message)),
        _ => ScanError::unavailable(operation, format!("HTTP {}: {}", status, message)),
    }
}

/// Failures raised while converging supporting infrastructure.
///
/// Every variant is handed back to the watch framework, which retries the
/// whole reconciliation.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Cluster API error during {operation} of {resource}: {reason}")]
    Api {
        operation: String,
        resource: String,
        reason: String,
    },

    #[error("Conflict updating {resource}: {reason}")]
    Conflict {
        resource: String,
        reason: String,
    },

    #[error("Invalid desired spec for {resource}: {reason}")]
    InvalidSpec {
        resource: String,
        reason: String,
    },
}

/// Failures exposing a finished report
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to encode results: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to write results to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to bind result server on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Result server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Result type for engine and orchestration operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;
