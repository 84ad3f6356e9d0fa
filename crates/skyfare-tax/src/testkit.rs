//! Shared test fixtures: a minimal request builder, service doubles and
//! canned rule bodies for exercising the pipeline without real catalog
//! data.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};

use skyfare_core::money::standard_round;
use skyfare_core::{
    Amount, CarrierCode, CurrencyCode, Flight, FlightUsage, Geo, GeoPath, Nation, PassengerCode,
    PercentFlatTag, RoundingDir, RoundingUnit, TaxPointTag, TaxName, Vendor,
};

use crate::catalog::{RuleApplicator, RuleOutcome, TaxValue};
use crate::payment::PaymentDetail;
use crate::request::{
    DiagnosticCommand, FarePath, FareUsage, Itin, ProcessingOptions, Request, TicketingOptions,
};
use crate::services::{
    CurrencyService, RulesRecordsService, ServiceBaggage, ServiceBaggageService, Services,
    StandardRounding,
};

// =============================================================================
// Fixtures
// =============================================================================

/// Routes pipeline tracing through the test harness; safe to call from
/// every test, only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn ticketing_date() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 15)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

/// A departure-point percent tax name; tag and percent/flat rarely matter
/// to the test at hand.
pub fn tax_name(nation: &str, code: &str, tax_type: &str) -> TaxName {
    TaxName::new(
        nation,
        code,
        tax_type,
        TaxPointTag::Departure,
        PercentFlatTag::Percent,
    )
}

/// One itinerary over the given geo-path nations (even index = departure,
/// odd = arrival), every segment on carrier AA, sold in the US, base fare
/// 100 USD.
pub fn one_itin_request(nations: &[&str]) -> Request {
    let geos = nations
        .iter()
        .enumerate()
        .map(|(i, nation)| {
            let tag = if i % 2 == 0 {
                TaxPointTag::Departure
            } else {
                TaxPointTag::Arrival
            };
            Geo::new(tag, *nation)
        })
        .collect();
    let flight_usages = (0..nations.len() / 2)
        .map(|_| FlightUsage { flight_ref: 0 })
        .collect();
    Request {
        id: uuid::Uuid::new_v4(),
        itins: vec![Itin {
            id: 0,
            geo_path_ref: 0,
            point_of_sale_ref: 0,
            yqyr_path_ref: None,
            optional_service_path_ref: None,
            flight_usages,
            fare_path: FarePath {
                fare_usages: vec![FareUsage {
                    amount: Amount::from_units(100),
                }],
                total_amount: Amount::from_units(100),
                markup_amount: Amount::zero(),
                validating_carrier: CarrierCode::new("AA"),
            },
            change_fee: None,
            ticketing_fees: Vec::new(),
            passenger_code: PassengerCode::new("ADT"),
        }],
        geo_paths: vec![GeoPath::new(geos)],
        pos_tax_points: vec![Geo::new(TaxPointTag::Sale, "US")],
        flights: vec![Flight {
            marketing_carrier: CarrierCode::new("AA"),
        }],
        yqyrs: Vec::new(),
        yqyr_paths: Vec::new(),
        optional_services: Vec::new(),
        optional_service_paths: Vec::new(),
        ticketing: TicketingOptions {
            ticketing_date: ticketing_date(),
            payment_currency: CurrencyCode::new("USD"),
        },
        processing: ProcessingOptions::default(),
        diagnostic: DiagnosticCommand::default(),
    }
}

// =============================================================================
// Service Doubles
// =============================================================================

/// Serves each tax under its own (nation, tag) key.
#[derive(Debug, Default)]
struct CatalogStub {
    taxes: Vec<TaxValue>,
}

impl RulesRecordsService for CatalogStub {
    fn tax_rules_containers(
        &self,
        nation: &Nation,
        tag: TaxPointTag,
        _ticketing_date: NaiveDateTime,
    ) -> Vec<TaxValue> {
        self.taxes
            .iter()
            .filter(|t| t.tax_name().nation == *nation && t.tax_name().tax_point_tag == tag)
            .cloned()
            .collect()
    }
}

/// In-memory service-baggage table, keyed by item number only.
#[derive(Debug, Default)]
struct BaggageStub {
    items: HashMap<u32, Arc<ServiceBaggage>>,
}

impl ServiceBaggageService for BaggageStub {
    fn service_baggage(&self, _vendor: &Vendor, item_no: u32) -> Option<Arc<ServiceBaggage>> {
        self.items.get(&item_no).cloned()
    }
}

#[derive(Debug, Default)]
struct TwoDecimalCurrency;

impl CurrencyService for TwoDecimalCurrency {
    fn currency_decimals(&self, _currency: &CurrencyCode) -> u8 {
        2
    }
}

/// Builder for a `Services` bundle backed by the doubles above.
#[derive(Default)]
pub struct ServicesBuilder {
    taxes: Vec<TaxValue>,
    baggage: HashMap<u32, Arc<ServiceBaggage>>,
}

impl ServicesBuilder {
    pub fn new() -> Self {
        ServicesBuilder::default()
    }

    pub fn catalog(mut self, taxes: Vec<TaxValue>) -> Self {
        self.taxes = taxes;
        self
    }

    pub fn service_baggage(mut self, item_no: u32, baggage: ServiceBaggage) -> Self {
        self.baggage.insert(item_no, Arc::new(baggage));
        self
    }

    pub fn build(self) -> Services {
        Services::new(
            Box::new(CatalogStub { taxes: self.taxes }),
            Box::new(BaggageStub { items: self.baggage }),
            Box::new(TwoDecimalCurrency),
            Box::new(StandardRounding),
        )
    }
}

pub fn services_with_catalog(taxes: Vec<TaxValue>) -> Services {
    ServicesBuilder::new().catalog(taxes).build()
}

// =============================================================================
// Rule Doubles
// =============================================================================

#[derive(Debug)]
struct PassRule;

impl RuleApplicator for PassRule {
    fn apply(&self, _detail: &mut PaymentDetail) -> RuleOutcome {
        RuleOutcome::Pass
    }
}

pub fn pass_rule() -> Box<dyn RuleApplicator> {
    Box::new(PassRule)
}

#[derive(Debug)]
struct FailRule;

impl RuleApplicator for FailRule {
    fn apply(&self, _detail: &mut PaymentDetail) -> RuleOutcome {
        RuleOutcome::Fail
    }
}

pub fn fail_rule() -> Box<dyn RuleApplicator> {
    Box::new(FailRule)
}

/// Passes while counting how often it was applied.
#[derive(Debug)]
struct CountingRule(Arc<AtomicUsize>);

impl RuleApplicator for CountingRule {
    fn apply(&self, _detail: &mut PaymentDetail) -> RuleOutcome {
        self.0.fetch_add(1, Ordering::SeqCst);
        RuleOutcome::Pass
    }
}

pub fn counting_rule(counter: Arc<AtomicUsize>) -> Box<dyn RuleApplicator> {
    Box::new(CountingRule(counter))
}

/// Passes while appending its label to a shared evaluation log.
#[derive(Debug)]
struct RecordingRule {
    label: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl RuleApplicator for RecordingRule {
    fn apply(&self, _detail: &mut PaymentDetail) -> RuleOutcome {
        if let Ok(mut log) = self.log.lock() {
            log.push(self.label);
        }
        RuleOutcome::Pass
    }
}

pub fn recording_rule(
    label: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
) -> Box<dyn RuleApplicator> {
    Box::new(RecordingRule { label, log })
}

/// Calculator double: a fixed amount, no rounding.
#[derive(Debug)]
struct FlatCalculator(Amount);

impl RuleApplicator for FlatCalculator {
    fn apply(&self, detail: &mut PaymentDetail) -> RuleOutcome {
        detail.calc.tax_before_rounding = self.0;
        detail.calc.tax_with_markup_before_rounding = self.0;
        detail.calc.rounding_unit = RoundingUnit::none();
        detail.calc.rounding_dir = RoundingDir::NoRounding;
        detail.tax_amount = self.0;
        detail.tax_with_markup_amount = self.0;
        RuleOutcome::Pass
    }
}

pub fn flat_calculator(amount: Amount) -> Box<dyn RuleApplicator> {
    Box::new(FlatCalculator(amount))
}

/// Calculator double: basis points of the itinerary base fare, rounded
/// per-detail with the given unit and direction.
#[derive(Debug)]
struct PercentCalculator {
    bps: i64,
    unit: RoundingUnit,
    dir: RoundingDir,
}

impl RuleApplicator for PercentCalculator {
    fn apply(&self, detail: &mut PaymentDetail) -> RuleOutcome {
        let (fare, markup) = detail
            .itinerary_subject
            .map(|s| (s.fare_amount, s.markup_amount))
            .unwrap_or((Amount::zero(), Amount::zero()));
        let before = fare.percent_bps(self.bps);
        let before_markup = (fare + markup).percent_bps(self.bps);
        detail.calc.tax_before_rounding = before;
        detail.calc.tax_with_markup_before_rounding = before_markup;
        detail.calc.rounding_unit = self.unit;
        detail.calc.rounding_dir = self.dir;
        detail.tax_amount = standard_round(before, self.unit, self.dir);
        detail.tax_with_markup_amount = standard_round(before_markup, self.unit, self.dir);
        RuleOutcome::Pass
    }
}

pub fn percent_calculator(bps: i64, unit: RoundingUnit, dir: RoundingDir) -> Box<dyn RuleApplicator> {
    Box::new(PercentCalculator { bps, unit, dir })
}
