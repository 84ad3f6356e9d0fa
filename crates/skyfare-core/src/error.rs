//! # Error Types
//!
//! Domain-specific error types for skyfare-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  skyfare-core errors (this file)                                       │
//! │  └── CoreError        - Malformed codes, bad amounts                   │
//! │                                                                         │
//! │  skyfare-tax errors (separate crate)                                   │
//! │  └── TaxError         - Request-logic failures that abort a run        │
//! │                                                                         │
//! │  Flow: CoreError → TaxError → host error surface                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (the offending code, the index)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised while constructing core domain values.
///
/// These occur at trust boundaries only (external inputs); internal
/// collaborators assume validated state past those boundaries.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A code has the wrong length or alphabet for its kind.
    #[error("invalid {kind} code {code:?}: expected {expected}")]
    InvalidCode {
        kind: &'static str,
        code: String,
        expected: &'static str,
    },

    /// A rounding unit must be a positive amount.
    #[error("rounding unit must be positive, got {micros} micro-units")]
    InvalidRoundingUnit { micros: i64 },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
