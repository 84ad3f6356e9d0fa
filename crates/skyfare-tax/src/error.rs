//! # Error Types
//!
//! Request-logic errors for the tax pipeline.
//!
//! ## Propagation Policy
//! Only request-logic errors (malformed or inconsistent input data) cross
//! the pipeline boundary as `Err`. A tax failing to apply at a tax point is
//! a normal outcome recorded on the `PaymentDetail`; missing catalog rows
//! are data-quality defects that are logged and dropped.

use thiserror::Error;

use skyfare_core::CoreError;

// =============================================================================
// Tax Error
// =============================================================================

/// Errors that abort the whole transaction. Never retried; surfaced to the
/// host with descriptive text.
#[derive(Debug, Error)]
pub enum TaxError {
    /// An itinerary references a path that does not exist in the request.
    #[error("itin {itin_id}: {path_kind} path reference {reference} out of range (len {len})")]
    PathRefOutOfRange {
        itin_id: usize,
        path_kind: &'static str,
        reference: usize,
        len: usize,
    },

    /// A subject references an entity that does not exist in the request.
    #[error("{subject} reference {reference} out of range (len {len})")]
    SubjectRefOutOfRange {
        subject: &'static str,
        reference: usize,
        len: usize,
    },

    /// The orderer was used before `commit` or after exhaustion in a way
    /// that indicates a driver bug surfaced by inconsistent input.
    #[error("processing orderer misuse: {0}")]
    OrdererMisuse(&'static str),

    /// Malformed core value in external input.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Convenience type alias for Results with TaxError.
pub type TaxResult<T> = Result<T, TaxError>;

// =============================================================================
// Unit Tests
// =============================================================================
