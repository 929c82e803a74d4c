//! Error taxonomy for the collection phase.
//!
//! Every variant here is fatal for the current run. Throttling never
//! surfaces as an error unless a retry cap was configured, and directory
//! misses are not errors at all.

use activity_store::ActivityStoreError;
use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{source_label} {operation} request failed: {source}")]
    Transport {
        source_label: &'static str,
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{source_label} returned unexpected status {status}: {body}")]
    UnexpectedStatus {
        source_label: &'static str,
        status: u16,
        body: String,
    },
    #[error("failed to decode {source_label} page: {detail}")]
    Decode {
        source_label: &'static str,
        detail: String,
    },
    #[error("{source_label} still throttled after {attempts} attempts")]
    ThrottleRetriesExhausted {
        source_label: &'static str,
        attempts: usize,
    },
    #[error("run deadline exceeded before {operation}")]
    DeadlineExceeded { operation: String },
    #[error("membership directory unavailable: {0}")]
    Directory(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Store(#[from] ActivityStoreError),
}
