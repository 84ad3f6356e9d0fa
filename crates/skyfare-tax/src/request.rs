//! # Request Model
//!
//! The request-scoped input to one pipeline run: itineraries, their geo and
//! subject paths, processing options, and the diagnostic command.
//!
//! ## Reference Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Request                                                                │
//! │    itins[] ──geo_path_ref──────────► geo_paths[]                        │
//! │            ──point_of_sale_ref─────► pos_tax_points[]                   │
//! │            ──yqyr_path_ref─────────► yqyr_paths[] ──► yqyrs[]           │
//! │            ──optional_service_path_ref ──► optional_service_paths[]     │
//! │                                             └──► optional_services[]    │
//! │            ──flight_usages[] ──────► flights[]                          │
//! │                                                                         │
//! │  All cross-references are indices. An out-of-range REQUIRED reference   │
//! │  is a request-logic error that aborts the transaction; a missing        │
//! │  OPTIONAL path simply means "nothing to tax" for that category.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is read-only during processing and discarded with the
//! transaction.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use skyfare_core::{
    Amount, CarrierCode, CurrencyCode, Flight, FlightUsage, Geo, GeoPath, PassengerCode,
    ProcessingGroup, TaxCode, TaxableUnit, TaxName,
};

use crate::error::{TaxError, TaxResult};

// =============================================================================
// YQYR Surcharges
// =============================================================================

/// A carrier-imposed YQ/YR surcharge attached to flight segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YqYr {
    pub code: TaxCode,
    pub amount: Amount,
}

/// One itinerary's use of a YQYR, mapped onto a geo range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YqYrUsage {
    pub yqyr_ref: usize,
    /// First geo index the surcharge covers.
    pub begin_geo: usize,
    /// Last geo index the surcharge covers (inclusive).
    pub end_geo: usize,
}

impl YqYrUsage {
    /// The mapped geo range contains the given tax point.
    pub fn covers(&self, geo_index: usize) -> bool {
        self.begin_geo <= geo_index && geo_index <= self.end_geo
    }
}

/// Per-itinerary sequence of YQYR usages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YqYrPath {
    pub usages: Vec<YqYrUsage>,
}

// =============================================================================
// Optional Services
// =============================================================================

/// The category of an ancillary/optional-service charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceKind {
    FlightRelated,
    TicketRelated,
    Merchandise,
    FareRelated,
    BaggageCharge,
}

impl ServiceKind {
    /// The taxable unit a rule container must carry to tax this service.
    pub const fn taxable_unit(self) -> TaxableUnit {
        match self {
            ServiceKind::FlightRelated => TaxableUnit::OcFlightRelated,
            ServiceKind::TicketRelated => TaxableUnit::OcTicketRelated,
            ServiceKind::Merchandise => TaxableUnit::OcMerchandise,
            ServiceKind::FareRelated => TaxableUnit::OcFareRelated,
            ServiceKind::BaggageCharge => TaxableUnit::BaggageCharge,
        }
    }

    /// OC-type validity for a processing group.
    pub fn valid_for(self, group: ProcessingGroup) -> bool {
        match group {
            ProcessingGroup::OptionalServices => !matches!(self, ServiceKind::BaggageCharge),
            ProcessingGroup::Baggage => matches!(self, ServiceKind::BaggageCharge),
            _ => false,
        }
    }
}

/// An ancillary charge (seat, bag, lounge, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionalService {
    pub kind: ServiceKind,
    /// ATPCO service subtype code (e.g. "0AA").
    pub subtype: String,
    pub amount: Amount,
}

/// One itinerary's use of an optional service, mapped onto a geo range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionalServiceUsage {
    pub service_ref: usize,
    pub begin_geo: usize,
    pub end_geo: usize,
}

impl OptionalServiceUsage {
    pub fn covers(&self, geo_index: usize) -> bool {
        self.begin_geo <= geo_index && geo_index <= self.end_geo
    }
}

/// Per-itinerary sequence of optional-service usages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionalServicePath {
    pub usages: Vec<OptionalServiceUsage>,
}

// =============================================================================
// Fees / Fare Path
// =============================================================================

/// A ticketing (OB) fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketingFee {
    /// OB fee subcode (e.g. "FCA").
    pub subcode: String,
    pub amount: Amount,
}

/// One priced fare component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareUsage {
    pub amount: Amount,
}

/// The itinerary's priced fare.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarePath {
    pub fare_usages: Vec<FareUsage>,
    /// Total base fare.
    pub total_amount: Amount,
    /// Agency markup on top of the base fare (zero when absent).
    pub markup_amount: Amount,
    pub validating_carrier: CarrierCode,
}

// =============================================================================
// Itinerary
// =============================================================================

/// One priced itinerary within the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Itin {
    pub id: usize,
    pub geo_path_ref: usize,
    pub point_of_sale_ref: usize,
    pub yqyr_path_ref: Option<usize>,
    pub optional_service_path_ref: Option<usize>,
    pub flight_usages: Vec<FlightUsage>,
    pub fare_path: FarePath,
    pub change_fee: Option<Amount>,
    pub ticketing_fees: Vec<TicketingFee>,
    pub passenger_code: PassengerCode,
}

// =============================================================================
// Options
// =============================================================================

/// Ticketing context for the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketingOptions {
    /// Date filtering of rule containers keys off this timestamp.
    pub ticketing_date: NaiveDateTime,
    pub payment_currency: CurrencyCode,
}

/// Processing-wide options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingOptions {
    /// Which subject groups to process, in order.
    pub processing_groups: Vec<ProcessingGroup>,
    /// Tax codes exempted by ticketing command; computed but marked exempt.
    pub exempted_tax_codes: HashSet<TaxCode>,
    /// Tax codes excluded wholesale; never validated.
    pub excluded_tax_codes: HashSet<TaxCode>,
    /// Tax YQYR on the whole base fare regardless of tax-point coverage.
    pub on_all_base_fare: bool,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        ProcessingOptions {
            processing_groups: ProcessingGroup::ALL.to_vec(),
            exempted_tax_codes: HashSet::new(),
            excluded_tax_codes: HashSet::new(),
            on_all_base_fare: false,
        }
    }
}

impl ProcessingOptions {
    /// A tax excluded wholesale is never driven through validation.
    pub fn is_allowed(&self, tax_name: &TaxName) -> bool {
        !self.excluded_tax_codes.contains(&tax_name.tax_code)
    }

    /// Command exemption: the tax is computed, then flagged exempt.
    pub fn is_exempted(&self, tax_code: &TaxCode) -> bool {
        self.exempted_tax_codes.contains(tax_code)
    }
}

// =============================================================================
// Diagnostic Command
// =============================================================================

/// Which payments view the host asked for.
///
/// Diagnostic views widen the output to include failed payments; they never
/// change computed amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticView {
    /// Regular response: valid payments only.
    #[default]
    None,
    /// Positive diagnostic: all payments, for rendering applied rules.
    Positive,
    /// Negative diagnostic: all payments including failed ones.
    Negative,
}

/// A diagnostic key/value parameter (IV/IN/IC/IT/IS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The diagnostic command attached to a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticCommand {
    pub view: DiagnosticView,
    pub parameters: Vec<Parameter>,
}

// =============================================================================
// Request
// =============================================================================

/// One transaction's complete input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Transaction identifier, for log correlation only.
    pub id: Uuid,
    pub itins: Vec<Itin>,
    pub geo_paths: Vec<GeoPath>,
    /// Point-of-sale tax points referenced by itineraries.
    pub pos_tax_points: Vec<Geo>,
    pub flights: Vec<Flight>,
    pub yqyrs: Vec<YqYr>,
    pub yqyr_paths: Vec<YqYrPath>,
    pub optional_services: Vec<OptionalService>,
    pub optional_service_paths: Vec<OptionalServicePath>,
    pub ticketing: TicketingOptions,
    pub processing: ProcessingOptions,
    pub diagnostic: DiagnosticCommand,
}

impl Request {
    /// The geo path of an itinerary; out-of-range is a request-logic error.
    pub fn geo_path(&self, itin: &Itin) -> TaxResult<&GeoPath> {
        self.geo_paths
            .get(itin.geo_path_ref)
            .ok_or(TaxError::PathRefOutOfRange {
                itin_id: itin.id,
                path_kind: "geo",
                reference: itin.geo_path_ref,
                len: self.geo_paths.len(),
            })
    }

    /// The point-of-sale tax point of an itinerary.
    pub fn pos_tax_point(&self, itin: &Itin) -> TaxResult<&Geo> {
        self.pos_tax_points
            .get(itin.point_of_sale_ref)
            .ok_or(TaxError::PathRefOutOfRange {
                itin_id: itin.id,
                path_kind: "point-of-sale",
                reference: itin.point_of_sale_ref,
                len: self.pos_tax_points.len(),
            })
    }

    /// The itinerary's YQYR path, if any.
    pub fn yqyr_path(&self, itin: &Itin) -> TaxResult<Option<&YqYrPath>> {
        match itin.yqyr_path_ref {
            None => Ok(None),
            Some(reference) => self
                .yqyr_paths
                .get(reference)
                .map(Some)
                .ok_or(TaxError::PathRefOutOfRange {
                    itin_id: itin.id,
                    path_kind: "yqyr",
                    reference,
                    len: self.yqyr_paths.len(),
                }),
        }
    }

    /// The itinerary's optional-service path, if any.
    pub fn optional_service_path(&self, itin: &Itin) -> TaxResult<Option<&OptionalServicePath>> {
        match itin.optional_service_path_ref {
            None => Ok(None),
            Some(reference) => self
                .optional_service_paths
                .get(reference)
                .map(Some)
                .ok_or(TaxError::PathRefOutOfRange {
                    itin_id: itin.id,
                    path_kind: "optional-service",
                    reference,
                    len: self.optional_service_paths.len(),
                }),
        }
    }

    /// Resolves a YQYR usage to its surcharge record.
    pub fn yqyr(&self, usage: &YqYrUsage) -> TaxResult<&YqYr> {
        self.yqyrs
            .get(usage.yqyr_ref)
            .ok_or(TaxError::SubjectRefOutOfRange {
                subject: "yqyr",
                reference: usage.yqyr_ref,
                len: self.yqyrs.len(),
            })
    }

    /// Resolves an optional-service usage to its charge record.
    pub fn optional_service(&self, usage: &OptionalServiceUsage) -> TaxResult<&OptionalService> {
        self.optional_services
            .get(usage.service_ref)
            .ok_or(TaxError::SubjectRefOutOfRange {
                subject: "optional service",
                reference: usage.service_ref,
                len: self.optional_services.len(),
            })
    }

    /// Marketing carrier of the flight under a tax point; geo index `2i`
    /// and `2i + 1` belong to flight usage `i`. Sale points and unmapped
    /// indices have no flight, yielding the empty carrier.
    pub fn marketing_carrier(&self, itin: &Itin, geo_index: usize) -> CarrierCode {
        itin.flight_usages
            .get(geo_index / 2)
            .and_then(|usage| self.flights.get(usage.flight_ref))
            .map(|flight| flight.marketing_carrier.clone())
            .unwrap_or_default()
    }

    /// Looks up an itinerary by its id.
    pub fn itin_by_id(&self, itin_id: usize) -> Option<&Itin> {
        self.itins.iter().find(|itin| itin.id == itin_id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn test_geo_path_out_of_range_is_request_logic_error() {
        let mut request = testkit::one_itin_request(&["US", "GB"]);
        request.itins[0].geo_path_ref = 9;
        let err = request.geo_path(&request.itins[0]).unwrap_err();
        assert!(err.to_string().contains("geo path reference 9"));
    }

    #[test]
    fn test_missing_optional_paths_mean_nothing_to_tax() {
        let request = testkit::one_itin_request(&["US", "GB"]);
        assert!(request.yqyr_path(&request.itins[0]).unwrap().is_none());
        assert!(request
            .optional_service_path(&request.itins[0])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_marketing_carrier_lookup() {
        let request = testkit::one_itin_request(&["US", "GB", "GB", "US"]);
        // both geo 0 and geo 1 map to flight usage 0
        assert_eq!(
            request.marketing_carrier(&request.itins[0], 0),
            CarrierCode::new("AA")
        );
        assert_eq!(
            request.marketing_carrier(&request.itins[0], 1),
            CarrierCode::new("AA")
        );
        // out of range: empty carrier
        assert!(request.marketing_carrier(&request.itins[0], 10).is_empty());
    }

    #[test]
    fn test_service_kind_group_validity() {
        assert!(ServiceKind::BaggageCharge.valid_for(ProcessingGroup::Baggage));
        assert!(!ServiceKind::BaggageCharge.valid_for(ProcessingGroup::OptionalServices));
        assert!(ServiceKind::FlightRelated.valid_for(ProcessingGroup::OptionalServices));
        assert!(!ServiceKind::FlightRelated.valid_for(ProcessingGroup::Itinerary));
    }

    #[test]
    fn test_excluded_and_exempted_codes() {
        let mut options = ProcessingOptions::default();
        options.excluded_tax_codes.insert(TaxCode::new("XG"));
        options.exempted_tax_codes.insert(TaxCode::new("US"));

        let excluded = testkit::tax_name("GB", "XG", "001");
        let allowed = testkit::tax_name("US", "US", "001");
        assert!(!options.is_allowed(&excluded));
        assert!(options.is_allowed(&allowed));
        assert!(options.is_exempted(&TaxCode::new("US")));
    }
}
