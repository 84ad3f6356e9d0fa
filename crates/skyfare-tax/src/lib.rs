//! # skyfare-tax: Tax Business-Rules Evaluation Pipeline
//!
//! The **heart** of Skyfare tax computation. For every itinerary in a
//! request, decide which taxes apply, at which geographic tax points,
//! honoring inter-tax dependencies, subject categories, application limits,
//! and rounding reconciliation, all without performing any I/O.
//!
//! ## Control Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   BusinessRulesProcessor::run                           │
//! │                                                                         │
//! │  catalog (RulesRecordsService, cached by nation × tag)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ProcessingOrderer ──► ordered tax batches (+ TaxOnTax catch-all last)  │
//! │       │                                                                 │
//! │       ▼   per itinerary × processing group × tax × tax point            │
//! │  RawSubjectsCollector ──► TaxValidator loop (progress-gated)            │
//! │       │                                                                 │
//! │       ▼   per itinerary × tax                                           │
//! │  TaxLimiter ──► calculator chains ──► PaymentDetail::Calculated         │
//! │       │                                                                 │
//! │       ▼   per itinerary                                                 │
//! │  percentage-tax rounding reconciliation ──► ItinsPayments               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`request`] - Request-scoped input model (itineraries, subjects, options)
//! - [`services`] - Traits for the opaque external collaborators
//! - [`catalog`] - Tax rule records and the per-request container cache
//! - [`payment`] - PaymentDetail state machine and the payments arenas
//! - [`orderer`] - Dependency ordering of taxes
//! - [`subjects`] - Taxable-subject collection per tax point
//! - [`progress`] - Per-category progress monitors
//! - [`validator`] - Driving one tax through its rule containers
//! - [`limiter`] - Overlap removal and application-count limits
//! - [`filter`] - Diagnostic filter parameters (never change amounts)
//! - [`processor`] - The top-level driver

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod error;
pub mod filter;
pub mod limiter;
pub mod orderer;
pub mod payment;
pub mod processor;
pub mod progress;
pub mod request;
pub mod services;
pub mod subjects;
pub mod validator;

#[cfg(test)]
pub(crate) mod testkit;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use catalog::{
    BusinessRulesContainer, ContainersCache, LimitGroup, RuleApplicator, RuleOutcome, TaxData,
    TaxValue,
};
pub use error::{TaxError, TaxResult};
pub use payment::{ItinsPayments, PaymentDetail, PaymentState, RawPayments};
pub use processor::{BusinessRulesProcessor, OrderedTaxes, PipelineConfig};
pub use services::Services;
