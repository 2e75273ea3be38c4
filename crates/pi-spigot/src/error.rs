//! Error types for digit computation.
//!
//! This module defines the central [`Error`] enum shared by every layer of the
//! crate. Any variant surfacing from [`crate::compute_digits`] means the whole
//! request failed: callers never receive partially computed digits.
//!
//! ## Error Cases
//! - `DigitOverflow`: a BBP partial sum left the range where `f64` represents
//!   integers exactly.
//! - `WorkerReported`: a worker finished its assignment with an error.
//! - `WorkerTerminated`: a worker thread exited without answering.
//! - `ChannelError`: an internal channel was closed unexpectedly.
//! - `InvalidRequest`: the caller violated a precondition.
//! - `Assembly`: the collected results do not cover the requested range.
//! - `ServiceShutdown`: the pool has been shut down.

use crate::types::DigitPosition;
use thiserror::Error;

/// Unified error type for digit computation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A partial sum exceeded the exact integer range of `f64`.
    #[error("Digit at position {position} is unsafe to compute due to numeric overflow")]
    DigitOverflow { position: DigitPosition },

    /// A worker reported an error while computing its assignment.
    #[error("Worker {worker_id} reported an error: {source}")]
    WorkerReported {
        worker_id: usize,
        #[source]
        source: Box<Error>,
    },

    /// A worker thread terminated before responding.
    #[error("Worker {worker_id} terminated abnormally")]
    WorkerTerminated { worker_id: usize },

    /// Internal channel send/receive failure.
    #[error("Channel communication error: {context}")]
    ChannelError { context: String },

    /// The request violated a precondition.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Collected digit results could not be assembled.
    #[error("Result assembly failed: {reason}")]
    Assembly { reason: String },

    /// The pool is shutting down or already shut down.
    #[error("Worker pool is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Returns `true` if the failure originated in a worker, either reported
    /// or by abnormal termination.
    pub const fn is_worker_failure(&self) -> bool {
        matches!(
            self,
            Self::WorkerReported { .. } | Self::WorkerTerminated { .. }
        )
    }
}

pub type Result<T> = core::result::Result<T, Error>;
