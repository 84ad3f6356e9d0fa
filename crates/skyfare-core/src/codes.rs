//! # Code Types
//!
//! Newtype string codes used throughout the pricing platform.
//!
//! ## Why Newtypes?
//! The tax catalog is keyed by several short alphanumeric codes (nation,
//! tax code, tax type, vendor, carrier, currency). Passing them around as
//! bare `String`s invites swapping a nation for a tax code at a call site;
//! the type system catches that for free.
//!
//! ## Empty Codes
//! An empty code is a legal value for every kind: it is the
//! "uninitialized" state at the trust boundary and, for [`TaxType`], the
//! wildcard that matches any concrete type of the same tax code.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Code Newtype Macro
// =============================================================================

/// Declares a string code newtype with a validating `parse` constructor.
///
/// `new` accepts anything (trust-boundary data is validated once via
/// `parse`, internal construction is assumed correct).
macro_rules! code_type {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $len:expr, $expected:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the code without validation.
            pub fn new(code: impl Into<String>) -> Self {
                Self(code.into())
            }

            /// Validating constructor for external input.
            ///
            /// Accepts the empty string (uninitialized/wildcard) or exactly
            /// the expected length of ASCII alphanumerics.
            pub fn parse(code: &str) -> CoreResult<Self> {
                let code = code.trim();
                if !code.is_empty()
                    && (code.len() != $len
                        || !code.chars().all(|c| c.is_ascii_alphanumeric()))
                {
                    return Err(CoreError::InvalidCode {
                        kind: $kind,
                        code: code.to_string(),
                        expected: $expected,
                    });
                }
                Ok(Self(code.to_string()))
            }

            /// Returns the code as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// An empty code is the uninitialized/wildcard state.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(code: &str) -> Self {
                Self::new(code)
            }
        }
    };
}

// =============================================================================
// Code Types
// =============================================================================

code_type!(
    /// ISO country code owning a tax (e.g. "US", "GB").
    ///
    /// The special value `ZZ` is the wildcard nation: a tax carrying it
    /// applies at every tax point regardless of geography.
    Nation,
    "nation",
    2,
    "2 alphanumeric characters"
);

impl Nation {
    /// The wildcard nation code.
    pub const WILDCARD: &'static str = "ZZ";

    /// Returns the wildcard nation `ZZ`.
    pub fn wildcard() -> Self {
        Nation::new(Self::WILDCARD)
    }

    /// Checks whether this is the wildcard nation.
    pub fn is_wildcard(&self) -> bool {
        self.as_str() == Self::WILDCARD
    }
}

code_type!(
    /// Two-character tax code (e.g. "AY", "US", "YQ").
    TaxCode,
    "tax code",
    2,
    "2 alphanumeric characters"
);

code_type!(
    /// Three-character tax type; empty acts as a wildcard matching any
    /// concrete type sharing the tax code.
    TaxType,
    "tax type",
    3,
    "3 alphanumeric characters or empty"
);

code_type!(
    /// Rules vendor code (e.g. "ATP", "SBR").
    Vendor,
    "vendor",
    3,
    "3 alphanumeric characters"
);

code_type!(
    /// Two-character airline designator.
    CarrierCode,
    "carrier",
    2,
    "2 alphanumeric characters"
);

code_type!(
    /// ISO 4217 currency code.
    CurrencyCode,
    "currency",
    3,
    "3 alphanumeric characters"
);

code_type!(
    /// Requested passenger type code (e.g. "ADT", "CNN").
    PassengerCode,
    "passenger",
    3,
    "3 alphanumeric characters"
);

// =============================================================================
// Unit Tests
// =============================================================================
