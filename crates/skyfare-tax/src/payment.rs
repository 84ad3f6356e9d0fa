//! # Payment Details
//!
//! [`PaymentDetail`] is the working record produced once per
//! (tax, tax point, itinerary) attempt; [`RawPayments`] is the per-itinerary
//! arena that owns them; [`ItinsPayments`] is the final output handed to
//! response formatting.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │     unseen ──[filter reject]──► (no detail created)                     │
//! │                                                                         │
//! │     Unvalidated ──► Validated ──► Calculated                            │
//! │          │                                                              │
//! │          └────────► Failed   (terminal)                                 │
//! │                                                                         │
//! │  Transitions are MONOTONIC; a detail is created exactly once.           │
//! │  The limiter "removes" a candidate by failing its itinerary category;   │
//! │  whole-detail failure = terminal Failed OR every present subject        │
//! │  category failed.                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//! Details live exclusively in their itinerary's `RawPayments` (push-only
//! vector, indices never invalidated) until copied into `ItinsPayments`.
//! Cross-references between details are indices, never pointers.

use serde::Serialize;
use std::sync::Arc;

use skyfare_core::{
    Amount, CarrierCode, CurrencyCode, PassengerCode, ProcessingGroup, RoundingDir, RoundingUnit,
    TaxCode, TaxName, Vendor,
};

use crate::catalog::{BusinessRulesContainer, LimitGroup};
use crate::request::ServiceKind;

// =============================================================================
// Subject Snapshots
// =============================================================================

/// Itinerary-fare subject captured into a detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItinerarySubject {
    pub fare_amount: Amount,
    pub markup_amount: Amount,
}

/// One YQYR surcharge taxed by a detail; the taxed range ends at the
/// next/previous tax point supplied at collection time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxableYqYr {
    /// Index of the usage within the itinerary's YQYR path.
    pub usage_index: usize,
    pub code: TaxCode,
    pub amount: Amount,
    pub taxed_range_end: usize,
    pub failed: bool,
}

/// One optional-service charge taxed by a detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalServiceItem {
    /// Global index into the request's optional services; stable across
    /// tax points, so duplicate claims can be recognized.
    pub service_ref: usize,
    pub kind: ServiceKind,
    pub subtype: String,
    pub amount: Amount,
    pub begin_tax_point: usize,
    pub end_tax_point: usize,
    /// Claimed by an earlier detail of the same tax; excluded from "has
    /// valid optional services".
    pub duplicated: bool,
    pub failed: bool,
}

impl OptionalServiceItem {
    /// Eligible = neither failed nor claimed by an earlier detail.
    pub fn is_eligible(&self) -> bool {
        !self.failed && !self.duplicated
    }
}

/// One ticketing (OB) fee taxed by a detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketingFeeSubject {
    pub subcode: String,
    pub amount: Amount,
}

// =============================================================================
// Calculation Details
// =============================================================================

/// Rounding context and pre-rounding amounts filled by the calculator
/// chain; read back by final rounding reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalcDetails {
    pub tax_before_rounding: Amount,
    pub tax_with_markup_before_rounding: Amount,
    pub rounding_unit: RoundingUnit,
    pub rounding_dir: RoundingDir,
}

// =============================================================================
// Payment State
// =============================================================================

/// Monotonic lifecycle of a payment detail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PaymentState {
    #[default]
    Unvalidated,
    Validated,
    Failed,
    Calculated,
}

// =============================================================================
// Payment Detail
// =============================================================================

/// The per-(tax, tax point, itinerary) working record.
///
/// Created once by the validator, filled by the calculator chain, read by
/// the limiter, rounding reconciliation, and the output builders.
#[derive(Debug, Clone)]
pub struct PaymentDetail {
    pub tax_name: TaxName,
    pub vendor: Vendor,
    pub seq_no: u32,
    /// Geo index the tax point sits at.
    pub tax_point_begin: usize,
    /// Next (Departure) or previous (Arrival) tax point; journey end for Sale.
    pub tax_point_end: usize,
    pub marketing_carrier: CarrierCode,
    pub round_trip_or_open_jaw: bool,
    pub limit_group: Option<LimitGroup>,
    pub application_limit: Option<u32>,

    // Subject snapshot
    pub itinerary_subject: Option<ItinerarySubject>,
    pub yqyrs: Vec<TaxableYqYr>,
    pub optional_services: Vec<OptionalServiceItem>,
    pub change_fee: Option<Amount>,
    pub ticketing_fees: Vec<TicketingFeeSubject>,

    // Computed amounts
    /// Tax amount after per-detail rounding.
    pub tax_amount: Amount,
    pub tax_with_markup_amount: Amount,
    pub calc: CalcDetails,

    // Flags
    pub exempt: bool,
    pub command_exempt: bool,

    state: PaymentState,
    itinerary_failed: bool,
}

impl PaymentDetail {
    pub fn new(tax_name: TaxName, vendor: Vendor, seq_no: u32) -> Self {
        PaymentDetail {
            tax_name,
            vendor,
            seq_no,
            tax_point_begin: 0,
            tax_point_end: 0,
            marketing_carrier: CarrierCode::default(),
            round_trip_or_open_jaw: false,
            limit_group: None,
            application_limit: None,
            itinerary_subject: None,
            yqyrs: Vec::new(),
            optional_services: Vec::new(),
            change_fee: None,
            ticketing_fees: Vec::new(),
            tax_amount: Amount::zero(),
            tax_with_markup_amount: Amount::zero(),
            calc: CalcDetails::default(),
            exempt: false,
            command_exempt: false,
            state: PaymentState::Unvalidated,
            itinerary_failed: false,
        }
    }

    // -------------------------------------------------------------------------
    // State transitions (monotonic; illegal transitions are ignored)
    // -------------------------------------------------------------------------

    pub fn state(&self) -> PaymentState {
        self.state
    }

    pub fn set_validated(&mut self) {
        if self.state == PaymentState::Unvalidated {
            self.state = PaymentState::Validated;
        }
    }

    pub fn set_failed(&mut self) {
        if self.state == PaymentState::Unvalidated {
            self.state = PaymentState::Failed;
        }
    }

    pub fn set_calculated(&mut self) {
        if self.state == PaymentState::Validated {
            self.state = PaymentState::Calculated;
        }
    }

    pub fn is_validated(&self) -> bool {
        matches!(self.state, PaymentState::Validated | PaymentState::Calculated)
    }

    pub fn is_calculated(&self) -> bool {
        self.state == PaymentState::Calculated
    }

    // -------------------------------------------------------------------------
    // Category failures
    // -------------------------------------------------------------------------

    /// The limiter removes a candidate by failing its itinerary category.
    pub fn fail_itinerary(&mut self) {
        self.itinerary_failed = true;
    }

    pub fn is_itinerary_failed(&self) -> bool {
        self.itinerary_failed
    }

    pub fn has_valid_optional_services(&self) -> bool {
        self.optional_services.iter().any(|s| s.is_eligible())
    }

    pub fn are_all_optional_services_failed(&self) -> bool {
        !self.optional_services.is_empty() && !self.has_valid_optional_services()
    }

    /// Whole-detail failure: terminal Failed, or every present subject
    /// category has failed. A detail with no subjects at all is failed.
    /// Change-fee and ticketing-fee subjects only fail with the whole
    /// detail; nothing removes them individually.
    pub fn is_failed(&self) -> bool {
        if self.state == PaymentState::Failed {
            return true;
        }
        let itin_ok = self.itinerary_subject.is_some() && !self.itinerary_failed;
        let yqyr_ok = self.yqyrs.iter().any(|y| !y.failed);
        let oc_ok = self.has_valid_optional_services();
        let change_fee_ok = self.change_fee.is_some();
        let fees_ok = !self.ticketing_fees.is_empty();
        !(itin_ok || yqyr_ok || oc_ok || change_fee_ok || fees_ok)
    }

    /// Anything left to validate: at least one present, non-duplicate
    /// subject.
    pub fn has_eligible_content(&self) -> bool {
        self.itinerary_subject.is_some()
            || self.yqyrs.iter().any(|y| !y.failed)
            || self.has_valid_optional_services()
            || self.change_fee.is_some()
            || !self.ticketing_fees.is_empty()
    }
}

// =============================================================================
// Raw Payments Arena
// =============================================================================

/// Per-itinerary, per-processing-group, insertion-ordered sequence of
/// payment details.
///
/// Push-only: indices handed out by [`RawPayments::push`] stay valid for
/// the life of the arena. Order matters for rounding reconciliation (the
/// first/last element receive the correction).
#[derive(Debug, Clone, Default)]
pub struct RawPayments {
    details: Vec<PaymentDetail>,
}

impl RawPayments {
    pub fn new() -> Self {
        RawPayments::default()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.details.reserve(additional);
    }

    /// Appends a detail, returning its stable index.
    pub fn push(&mut self, detail: PaymentDetail) -> usize {
        self.details.push(detail);
        self.details.len() - 1
    }

    pub fn get(&self, index: usize) -> &PaymentDetail {
        &self.details[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut PaymentDetail {
        &mut self.details[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &PaymentDetail> {
        self.details.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PaymentDetail> {
        self.details.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.details.len()
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }
}

/// A validated candidate queued for limiting and calculation.
///
/// Holds the detail's arena index plus the rule container whose calculator
/// chain will fill the amounts. `container` is `None` for already-processed
/// payments pulled into a cross-batch limit scan.
#[derive(Debug, Clone)]
pub struct PaymentWithRules {
    pub index: usize,
    pub container: Option<Arc<BusinessRulesContainer>>,
}

// =============================================================================
// Per-Group Raw Payments
// =============================================================================

/// All raw payments of one transaction: per processing group, one arena
/// per itinerary.
#[derive(Debug, Default)]
pub struct ItinsRawPayments {
    per_group: [Vec<RawPayments>; 5],
}

impl ItinsRawPayments {
    pub fn new(itin_count: usize) -> Self {
        ItinsRawPayments {
            per_group: std::array::from_fn(|_| {
                (0..itin_count).map(|_| RawPayments::new()).collect()
            }),
        }
    }

    pub fn get(&self, group: ProcessingGroup) -> &Vec<RawPayments> {
        &self.per_group[group.index()]
    }

    pub fn get_mut(&mut self, group: ProcessingGroup) -> &mut Vec<RawPayments> {
        &mut self.per_group[group.index()]
    }
}

// =============================================================================
// Output Payments
// =============================================================================

/// One computed payment in the final output.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub tax_name: TaxName,
    pub processing_group: ProcessingGroup,
    pub seq_no: u32,
    pub amount: Amount,
    pub amount_with_markup: Amount,
    pub exempt: bool,
    pub command_exempt: bool,
    /// Only ever true in the all-payments (diagnostic) view.
    pub failed: bool,
}

impl Payment {
    fn from_detail(detail: &PaymentDetail, group: ProcessingGroup) -> Self {
        Payment {
            tax_name: detail.tax_name.clone(),
            processing_group: group,
            seq_no: detail.seq_no,
            amount: detail.tax_amount,
            amount_with_markup: detail.tax_with_markup_amount,
            exempt: detail.exempt,
            command_exempt: detail.command_exempt,
            failed: detail.is_failed(),
        }
    }
}

/// One itinerary's ordered payment collection.
#[derive(Debug, Clone, Serialize)]
pub struct ItinPayments {
    pub itin_id: usize,
    pub passenger_code: PassengerCode,
    pub validating_carrier: CarrierCode,
    pub payments: Vec<Payment>,
}

impl ItinPayments {
    pub fn new(
        itin_id: usize,
        passenger_code: PassengerCode,
        validating_carrier: CarrierCode,
    ) -> Self {
        ItinPayments {
            itin_id,
            passenger_code,
            validating_carrier,
            payments: Vec::new(),
        }
    }

    /// Appends calculated, non-failed payments (the regular response view).
    pub fn add_valid_taxes(&mut self, group: ProcessingGroup, raw: &RawPayments) {
        for detail in raw.iter() {
            if detail.is_calculated() && !detail.is_failed() {
                self.payments.push(Payment::from_detail(detail, group));
            }
        }
    }

    /// Appends every payment including failed ones (diagnostic views).
    pub fn add_all_taxes(&mut self, group: ProcessingGroup, raw: &RawPayments) {
        for detail in raw.iter() {
            self.payments.push(Payment::from_detail(detail, group));
        }
    }
}

/// The transaction's final output, consumed by response formatting and
/// previous-ticket-tax selection.
#[derive(Debug, Clone, Serialize)]
pub struct ItinsPayments {
    pub itin_payments: Vec<ItinPayments>,
    pub payment_currency: CurrencyCode,
    pub payment_currency_decimals: u8,
}

// =============================================================================
// Unit Tests
// =============================================================================
