//! # skyfare-core: Pure Domain Types for Skyfare Pricing
//!
//! This crate is the shared vocabulary of the Skyfare pricing platform.
//! It contains codes, amounts, geography and tax identities as pure types
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Skyfare Tax Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Hosting Pricing Server (out of scope)              │   │
//! │  │    request parsing ──► tax pipeline ──► response rendering      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    skyfare-tax (pipeline)                       │   │
//! │  │    orderer ──► subjects ──► validator ──► limiter ──► rounding  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ skyfare-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   codes   │  │   money   │  │    geo    │  │ tax_name  │  │   │
//! │  │   │  Nation   │  │  Amount   │  │    Geo    │  │  TaxName  │  │   │
//! │  │   │  TaxCode  │  │ Rounding  │  │  GeoPath  │  │  TaxKey   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Amounts**: All monetary values are in micro-units (i64) to avoid
//!    float errors while keeping sub-rounding-unit precision for percentage taxes
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod codes;
pub mod error;
pub mod geo;
pub mod money;
pub mod tax_name;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use skyfare_core::Amount` instead of
// `use skyfare_core::money::Amount`

pub use codes::{CarrierCode, CurrencyCode, Nation, PassengerCode, TaxCode, TaxType, Vendor};
pub use error::{CoreError, CoreResult};
pub use geo::{Flight, FlightUsage, Geo, GeoPath, TaxPointTag};
pub use money::{Amount, RoundingDir, RoundingUnit};
pub use tax_name::{
    PercentFlatTag, ProcessingGroup, TaxKey, TaxName, TaxableUnit, TaxableUnitSet,
};
