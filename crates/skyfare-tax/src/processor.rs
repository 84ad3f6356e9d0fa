//! # Business Rules Processor
//!
//! The pipeline driver: collects and orders the tax catalog, then walks
//! itinerary × processing group × tax batch × tax × tax point, validating,
//! limiting and calculating payment details.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  collect_ordered_taxes                                                  │
//! │    walk itinerary geos ──► load (nation, tag) containers, cached        │
//! │    register taxes; tax-on-tax ──► catch-all group                       │
//! │    harvest service-baggage edges ──► orderer.commit                     │
//! │                                                                         │
//! │  per itinerary × group:                                                 │
//! │    per tax: Departure 0,2,4,…  /  Arrival N−1,N−3,…  /  Sale once       │
//! │      validator loop per tax point, candidates accumulate                │
//! │      limiter (skipped for Sale) ──► calculators ──► exempt flags        │
//! │    final rounding reconciliation per tax code                           │
//! │                                                                         │
//! │  copy into ItinsPayments (valid-only or diagnostic view)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use tracing::{debug, info, warn};

use skyfare_core::{
    Amount, CarrierCode, Nation, ProcessingGroup, RoundingDir, RoundingUnit, TaxableUnit,
    TaxCode, TaxKey, TaxPointTag, TaxType,
};

use crate::catalog::{ContainersCache, RuleOutcome, ServiceBaggageApplTag, TaxValue};
use crate::error::TaxResult;
use crate::filter::RulesFilter;
use crate::limiter::TaxLimiter;
use crate::payment::{
    ItinPayments, ItinsPayments, ItinsRawPayments, PaymentWithRules, RawPayments,
};
use crate::request::{DiagnosticView, Itin, Request};
use crate::services::Services;
use crate::subjects::RawSubjectsCollector;
use crate::validator::{TaxPointProperties, TaxValidator};

/// Charge codes naming subjects, not ordering dependencies.
const SUBJECT_CODES: [&str; 3] = ["OC", "YQ", "YR"];

// =============================================================================
// Pipeline Config
// =============================================================================

/// Feature toggles fixed at processor construction.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Cross-sibling rounding reconciliation for percentage taxes.
    pub enable_final_rounding: bool,
    /// The same reconciliation on the markup-adjusted amounts.
    pub enable_markup_rounding: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            enable_final_rounding: true,
            enable_markup_rounding: true,
        }
    }
}

// =============================================================================
// Ordered Taxes
// =============================================================================

/// The request's tax catalog, resolved into dependency-ordered batches.
/// Shared by every itinerary of the transaction.
#[derive(Debug)]
pub struct OrderedTaxes {
    batches: Vec<Vec<TaxValue>>,
}

impl OrderedTaxes {
    pub fn batches(&self) -> &[Vec<TaxValue>] {
        &self.batches
    }

    pub fn tax_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }
}

// =============================================================================
// Processor
// =============================================================================

/// One transaction's evaluation pipeline. Single-threaded; performs no I/O
/// beyond the injected service calls.
pub struct BusinessRulesProcessor<'s> {
    services: &'s Services,
    config: PipelineConfig,
}

impl<'s> BusinessRulesProcessor<'s> {
    pub fn new(services: &'s Services, config: PipelineConfig) -> Self {
        BusinessRulesProcessor { services, config }
    }

    /// Runs the whole pipeline for one request.
    pub fn run(&self, request: &Request) -> TaxResult<ItinsPayments> {
        info!(request = %request.id, itins = request.itins.len(), "tax pipeline start");

        let filter = RulesFilter::from_parameters(&request.diagnostic.parameters);
        let ordered = self.collect_ordered_taxes(request)?;
        debug!(
            batches = ordered.batches.len(),
            taxes = ordered.tax_count(),
            "tax catalog ordered"
        );

        let mut raw_payments = ItinsRawPayments::new(request.itins.len());
        for (itin_pos, itin) in request.itins.iter().enumerate() {
            for &group in &request.processing.processing_groups {
                // Unpriced itineraries have no fare to tax.
                if group == ProcessingGroup::Itinerary && itin.fare_path.fare_usages.is_empty() {
                    debug!(itin = itin.id, "no priced fare usages, skipping itinerary group");
                    continue;
                }
                let raw = &mut raw_payments.get_mut(group)[itin_pos];
                self.reserve_estimate(request, itin, group, &ordered, raw)?;
                for batch in &ordered.batches {
                    for tax in batch {
                        if !request.processing.is_allowed(tax.tax_name()) {
                            continue;
                        }
                        self.process_tax(request, itin, group, tax, &filter, raw)?;
                    }
                }
                if self.config.enable_final_rounding {
                    self.reconcile_rounding(raw);
                }
            }
            debug!(itin = itin.id, "itinerary processed");
        }

        let output = self.build_output(request, &raw_payments);
        info!(request = %request.id, "tax pipeline done");
        Ok(output)
    }

    // =========================================================================
    // Catalog collection and ordering
    // =========================================================================

    /// Loads every (nation, tag) container set the itineraries can touch,
    /// registers taxes with the orderer (tax-on-tax diverted to the
    /// catch-all group) and harvests service-baggage ordering edges.
    fn collect_ordered_taxes(&self, request: &Request) -> TaxResult<OrderedTaxes> {
        use crate::orderer::ProcessingOrderer;

        let ticketing_date = request.ticketing.ticketing_date;
        let mut cache = ContainersCache::new();
        let mut orderer = ProcessingOrderer::new();

        let register = |taxes: &[TaxValue], orderer: &mut ProcessingOrderer| -> TaxResult<()> {
            for tax in taxes {
                if self.is_diverted_tax_on_tax(request, tax) {
                    orderer.add_catch_all(tax.clone())?;
                } else {
                    orderer.add_value(tax.tax_name().key(), tax.clone())?;
                }
                self.harvest_edges(request, tax, orderer)?;
            }
            Ok(())
        };

        let mut sale_nations: HashSet<Nation> = HashSet::new();
        sale_nations.insert(Nation::wildcard());

        for itin in &request.itins {
            let path = request.geo_path(itin)?;
            for index in 0..path.len() {
                let Some(geo) = path.geo(index) else { continue };
                sale_nations.insert(geo.nation.clone());
                for nation in [geo.nation.clone(), Nation::wildcard()] {
                    let (taxes, fresh) =
                        cache.get_or_load(&nation, geo.tag, ticketing_date, self.services);
                    if fresh {
                        register(&taxes, &mut orderer)?;
                    }
                }
            }
            let pos = request.pos_tax_point(itin)?;
            sale_nations.insert(pos.nation.clone());
        }

        for nation in &sale_nations {
            let (taxes, fresh) =
                cache.get_or_load(nation, TaxPointTag::Sale, ticketing_date, self.services);
            if fresh {
                register(&taxes, &mut orderer)?;
            }
        }

        orderer.commit()?;
        let mut batches = Vec::new();
        loop {
            let batch = orderer.next_batch()?;
            if batch.is_empty() {
                break;
            }
            batches.push(batch);
        }
        Ok(OrderedTaxes { batches })
    }

    /// A tax flagged tax-on-tax is evaluated in the final catch-all group
    /// regardless of its edges; the diversion applies only when the
    /// Itinerary group is requested.
    fn is_diverted_tax_on_tax(&self, request: &Request, tax: &TaxValue) -> bool {
        request
            .processing
            .processing_groups
            .contains(&ProcessingGroup::Itinerary)
            && tax
                .containers(ProcessingGroup::Itinerary)
                .iter()
                .any(|c| c.taxable_units.has(TaxableUnit::TaxOnTax))
    }

    /// Turns service-baggage cross-references into ordering edges. Subject
    /// codes and malformed entries contribute nothing; unresolvable items
    /// are logged and dropped.
    fn harvest_edges(
        &self,
        request: &Request,
        tax: &TaxValue,
        orderer: &mut crate::orderer::ProcessingOrderer,
    ) -> TaxResult<()> {
        for &group in &request.processing.processing_groups {
            for container in tax.containers(group) {
                if container.service_baggage_item_no == 0 {
                    continue;
                }
                if container.service_baggage_appl_tag == Some(ServiceBaggageApplTag::E)
                    && !container.taxable_units.has(TaxableUnit::TaxOnTax)
                {
                    continue;
                }
                let Some(baggage) = self
                    .services
                    .service_baggage()
                    .service_baggage(&container.vendor, container.service_baggage_item_no)
                else {
                    warn!(
                        vendor = %container.vendor,
                        item_no = container.service_baggage_item_no,
                        "unresolvable service-baggage item, dropping ordering edges"
                    );
                    continue;
                };
                for entry in &baggage.entries {
                    if SUBJECT_CODES.contains(&entry.tax_code.as_str()) {
                        continue;
                    }
                    let subcode = entry.tax_type_subcode.as_str();
                    if !subcode.is_empty() && subcode.len() != 3 {
                        warn!(
                            tax_code = %entry.tax_code,
                            subcode,
                            "malformed service-baggage subcode, dropping entry"
                        );
                        continue;
                    }
                    let dependee = TaxKey::new(entry.tax_code.clone(), TaxType::new(subcode));
                    orderer.add_edge(tax.tax_name().key(), dependee)?;
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Per-tax driving
    // =========================================================================

    /// Pre-sizes the arena from matching tax points × in-effect containers.
    fn reserve_estimate(
        &self,
        request: &Request,
        itin: &Itin,
        group: ProcessingGroup,
        ordered: &OrderedTaxes,
        raw: &mut RawPayments,
    ) -> TaxResult<()> {
        let path = request.geo_path(itin)?;
        let ticketing_date = request.ticketing.ticketing_date;

        let mut estimate = 0usize;
        for batch in &ordered.batches {
            for tax in batch {
                let name = tax.tax_name();
                let points = match name.tax_point_tag {
                    TaxPointTag::Departure | TaxPointTag::Arrival => (0..path.len())
                        .step_by(2)
                        .filter(|&id| {
                            let geo_id = if name.tax_point_tag == TaxPointTag::Departure {
                                id
                            } else {
                                path.len().saturating_sub(1 + id)
                            };
                            path.geo(geo_id)
                                .map(|g| name.nation.is_wildcard() || g.nation == name.nation)
                                .unwrap_or(false)
                        })
                        .count(),
                    TaxPointTag::Sale => {
                        usize::from(self.sale_matches(request, itin, &name.nation)?)
                    }
                };
                estimate += points * tax.date_filtered_len(group, ticketing_date);
            }
        }
        raw.reserve(estimate);
        Ok(())
    }

    /// Sale taxes match the point-of-sale nation, any itinerary geo nation,
    /// or the wildcard.
    fn sale_matches(&self, request: &Request, itin: &Itin, nation: &Nation) -> TaxResult<bool> {
        if nation.is_wildcard() {
            return Ok(true);
        }
        let pos = request.pos_tax_point(itin)?;
        if pos.nation == *nation {
            return Ok(true);
        }
        let path = request.geo_path(itin)?;
        Ok((0..path.len()).any(|i| path.geo(i).map(|g| g.nation == *nation).unwrap_or(false)))
    }

    /// Drives one tax across its tax points, then limits and calculates
    /// over the accumulated candidate set.
    fn process_tax(
        &self,
        request: &Request,
        itin: &Itin,
        group: ProcessingGroup,
        tax: &TaxValue,
        filter: &RulesFilter,
        raw: &mut RawPayments,
    ) -> TaxResult<()> {
        let name = tax.tax_name();
        let containers = tax.date_filtered(group, request.ticketing.ticketing_date);
        if containers.is_empty() {
            return Ok(());
        }

        let path = request.geo_path(itin)?;
        let rt_oj = path.is_round_trip_or_open_jaw();
        let mut candidates: Vec<PaymentWithRules> = Vec::new();
        let mut oc_claimed: HashSet<usize> = HashSet::new();

        let validate_point = |tax_point: usize,
                                  next_prev: usize,
                                  carrier: CarrierCode,
                                  raw: &mut RawPayments,
                                  candidates: &mut Vec<PaymentWithRules>,
                                  oc_claimed: &mut HashSet<usize>|
         -> TaxResult<()> {
            let subjects = RawSubjectsCollector::new(
                group,
                request,
                itin,
                name.tax_point_tag,
                tax_point,
                next_prev,
            )?;
            let properties = TaxPointProperties {
                tax_point_begin: tax_point,
                tax_point_end: next_prev,
                marketing_carrier: carrier,
                round_trip_or_open_jaw: rt_oj,
            };
            let mut validator =
                TaxValidator::new(name, filter, &subjects, properties, oc_claimed);
            for container in &containers {
                if validator.validate(container, raw, candidates) {
                    break;
                }
            }
            Ok(())
        };

        match name.tax_point_tag {
            TaxPointTag::Departure => {
                let mut id = 0;
                while id + 1 < path.len() {
                    let matches = path
                        .geo(id)
                        .map(|g| name.nation.is_wildcard() || g.nation == name.nation)
                        .unwrap_or(false);
                    if matches {
                        let carrier = request.marketing_carrier(itin, id);
                        validate_point(id, id + 1, carrier, raw, &mut candidates, &mut oc_claimed)?;
                    }
                    id += 2;
                }
            }
            TaxPointTag::Arrival => {
                let mut id = path.len();
                while id > 1 {
                    let tax_point = id - 1;
                    let matches = path
                        .geo(tax_point)
                        .map(|g| name.nation.is_wildcard() || g.nation == name.nation)
                        .unwrap_or(false);
                    if matches {
                        let carrier = request.marketing_carrier(itin, tax_point);
                        validate_point(
                            tax_point,
                            id - 2,
                            carrier,
                            raw,
                            &mut candidates,
                            &mut oc_claimed,
                        )?;
                    }
                    id -= 2;
                }
            }
            TaxPointTag::Sale => {
                if self.sale_matches(request, itin, &name.nation)? {
                    let end = path.len().saturating_sub(1);
                    validate_point(
                        0,
                        end,
                        CarrierCode::default(),
                        raw,
                        &mut candidates,
                        &mut oc_claimed,
                    )?;
                }
            }
        }

        // No point limiting sale taxes: a single application per itinerary.
        if name.tax_point_tag != TaxPointTag::Sale {
            TaxLimiter::limit_tax(name, raw, &candidates);
        }
        self.calculate_tax(request, raw, &candidates);
        Ok(())
    }

    /// Runs calculator chains over surviving candidates and resolves
    /// command-exempt status.
    fn calculate_tax(
        &self,
        request: &Request,
        raw: &mut RawPayments,
        candidates: &[PaymentWithRules],
    ) {
        for candidate in candidates {
            let Some(container) = &candidate.container else {
                continue;
            };
            let detail = raw.get_mut(candidate.index);
            if !detail.is_validated() || detail.is_failed() {
                continue;
            }
            let passed = container
                .calculators
                .iter()
                .all(|rule| rule.apply(detail) == RuleOutcome::Pass);
            if !passed {
                detail.fail_itinerary();
                continue;
            }
            if request.processing.is_exempted(&detail.tax_name.tax_code) {
                detail.command_exempt = true;
                detail.exempt = true;
            }
            detail.set_calculated();
        }
    }

    // =========================================================================
    // Rounding reconciliation
    // =========================================================================

    /// One rounded total per tax code must equal the sum of its details.
    /// The naive per-detail rounding drifts; the difference against a
    /// single round of the true unrounded sum lands on the first detail
    /// (positive) or the last (negative).
    fn reconcile_rounding(&self, raw: &mut RawPayments) {
        let mut codes: Vec<TaxCode> = Vec::new();
        for detail in raw.iter() {
            if !codes.contains(&detail.tax_name.tax_code) {
                codes.push(detail.tax_name.tax_code.clone());
            }
        }
        for code in codes {
            self.reconcile_code(raw, &code, false);
            if self.config.enable_markup_rounding {
                self.reconcile_code(raw, &code, true);
            }
        }
    }

    fn reconcile_code(&self, raw: &mut RawPayments, code: &TaxCode, markup: bool) {
        let siblings: Vec<usize> = (0..raw.len())
            .filter(|&i| {
                let d = raw.get(i);
                d.tax_name.tax_code == *code
                    && d.tax_name.percent_flat_tag == skyfare_core::PercentFlatTag::Percent
                    && d.is_calculated()
                    && !d.is_failed()
                    && !d.exempt
                    && !if markup {
                        d.tax_with_markup_amount.is_zero()
                    } else {
                        d.tax_amount.is_zero()
                    }
            })
            .collect();
        if siblings.len() < 2 {
            return;
        }

        let (naive_sum, true_sum) = siblings.iter().fold(
            (Amount::zero(), Amount::zero()),
            |(naive, unrounded), &i| {
                let d = raw.get(i);
                if markup {
                    (
                        naive + d.tax_with_markup_amount,
                        unrounded + d.calc.tax_with_markup_before_rounding,
                    )
                } else {
                    (naive + d.tax_amount, unrounded + d.calc.tax_before_rounding)
                }
            },
        );

        // The first sibling's rounding parameters win.
        let (unit, dir): (RoundingUnit, RoundingDir) = {
            let first = raw.get(siblings[0]);
            (first.calc.rounding_unit, first.calc.rounding_dir)
        };
        let rounded_total = self.services.rounding().standard_round(true_sum, unit, dir);
        let diff = rounded_total - naive_sum;
        if diff.is_zero() {
            return;
        }

        let target = if diff.is_positive() {
            siblings[0]
        } else {
            *siblings.last().unwrap_or(&siblings[0])
        };
        let detail = raw.get_mut(target);
        if markup {
            detail.tax_with_markup_amount += diff;
        } else {
            detail.tax_amount += diff;
        }
        debug!(code = %code, diff = %diff, markup, "rounding reconciliation applied");
    }

    // =========================================================================
    // Output
    // =========================================================================

    fn build_output(&self, request: &Request, raw_payments: &ItinsRawPayments) -> ItinsPayments {
        let all_view = request.diagnostic.view != DiagnosticView::None;
        let mut itin_payments = Vec::with_capacity(request.itins.len());
        for (itin_pos, itin) in request.itins.iter().enumerate() {
            let mut payments = ItinPayments::new(
                itin.id,
                itin.passenger_code.clone(),
                itin.fare_path.validating_carrier.clone(),
            );
            for &group in &request.processing.processing_groups {
                let raw = &raw_payments.get(group)[itin_pos];
                if all_view {
                    payments.add_all_taxes(group, raw);
                } else {
                    payments.add_valid_taxes(group, raw);
                }
            }
            itin_payments.push(payments);
        }
        let currency = request.ticketing.payment_currency.clone();
        let decimals = self.services.currency().currency_decimals(&currency);
        ItinsPayments {
            itin_payments,
            payment_currency: currency,
            payment_currency_decimals: decimals,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BusinessRulesContainer, TaxData};
    use crate::services::{ServiceBaggage, ServiceBaggageEntry};
    use crate::testkit;
    use skyfare_core::{PercentFlatTag, TaxableUnitSet, TaxName};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn itinerary_tax(
        nation: &str,
        code: &str,
        tag: TaxPointTag,
        flat: PercentFlatTag,
        build: impl FnOnce(&mut BusinessRulesContainer),
    ) -> TaxValue {
        let name = TaxName::new(nation, code, "001", tag, flat);
        let mut container = BusinessRulesContainer::new(
            "ATP",
            100,
            TaxableUnitSet::of(&[TaxableUnit::Itinerary]),
        );
        container.validators.push(testkit::pass_rule());
        build(&mut container);
        let mut tax = TaxData::new(name);
        tax.push_container(ProcessingGroup::Itinerary, Arc::new(container));
        Arc::new(tax)
    }

    fn run(taxes: Vec<TaxValue>, request: &Request) -> ItinsPayments {
        testkit::init_tracing();
        let services = testkit::services_with_catalog(taxes);
        BusinessRulesProcessor::new(&services, PipelineConfig::default())
            .run(request)
            .unwrap()
    }

    #[test]
    fn test_wildcard_departure_tax_visits_even_indices() {
        // 4-point path: validation attempts at geo 0 and geo 2 only.
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let tax = itinerary_tax(
            "ZZ",
            "XD",
            TaxPointTag::Departure,
            PercentFlatTag::Flat,
            move |c| {
                c.validators.insert(0, testkit::counting_rule(counter));
                c.calculators.push(testkit::flat_calculator(Amount::from_units(5)));
            },
        );
        let request = testkit::one_itin_request(&["US", "GB", "GB", "US"]);
        let output = run(vec![tax], &request);

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(output.itin_payments[0].payments.len(), 2);
    }

    #[test]
    fn test_departure_and_arrival_symmetric_counts() {
        let dep_attempts = Arc::new(AtomicUsize::new(0));
        let arr_attempts = Arc::new(AtomicUsize::new(0));
        let dep_counter = Arc::clone(&dep_attempts);
        let arr_counter = Arc::clone(&arr_attempts);
        let dep = itinerary_tax(
            "ZZ",
            "XD",
            TaxPointTag::Departure,
            PercentFlatTag::Flat,
            move |c| c.validators.insert(0, testkit::counting_rule(dep_counter)),
        );
        let arr = itinerary_tax(
            "ZZ",
            "XA",
            TaxPointTag::Arrival,
            PercentFlatTag::Flat,
            move |c| c.validators.insert(0, testkit::counting_rule(arr_counter)),
        );
        let request = testkit::one_itin_request(&["US", "GB", "GB", "FR", "FR", "US"]);
        run(vec![dep, arr], &request);

        assert_eq!(dep_attempts.load(Ordering::SeqCst), 3);
        assert_eq!(arr_attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_sale_tax_validates_once_at_point_of_sale() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        // testkit point of sale is nation US
        let tax = itinerary_tax(
            "US",
            "XS",
            TaxPointTag::Sale,
            PercentFlatTag::Flat,
            move |c| {
                c.validators.insert(0, testkit::counting_rule(counter));
                c.calculators.push(testkit::flat_calculator(Amount::from_units(7)));
            },
        );
        let request = testkit::one_itin_request(&["GB", "FR", "FR", "GB"]);
        let output = run(vec![tax], &request);

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(output.itin_payments[0].payments.len(), 1);
        assert_eq!(
            output.itin_payments[0].payments[0].amount,
            Amount::from_units(7)
        );
    }

    #[test]
    fn test_sale_tax_foreign_nation_never_validated() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let tax = itinerary_tax(
            "JP",
            "XS",
            TaxPointTag::Sale,
            PercentFlatTag::Flat,
            move |c| c.validators.insert(0, testkit::counting_rule(counter)),
        );
        let request = testkit::one_itin_request(&["GB", "FR", "FR", "GB"]);
        run(vec![tax], &request);
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tax_on_tax_with_bad_edge_runs_in_catch_all() {
        let order: Arc<std::sync::Mutex<Vec<&'static str>>> = Default::default();

        let plain_order = Arc::clone(&order);
        let plain = itinerary_tax(
            "ZZ",
            "US",
            TaxPointTag::Departure,
            PercentFlatTag::Flat,
            move |c| {
                c.validators.insert(0, testkit::recording_rule("US", plain_order));
                c.calculators.push(testkit::flat_calculator(Amount::from_units(3)));
            },
        );

        // Tax-on-tax with a service-baggage edge to a nonexistent code.
        let tot_order = Arc::clone(&order);
        let tot = {
            let name = TaxName::new("ZZ", "XT", "001", TaxPointTag::Departure, PercentFlatTag::Flat);
            let mut container = BusinessRulesContainer::new(
                "ATP",
                100,
                TaxableUnitSet::of(&[TaxableUnit::Itinerary, TaxableUnit::TaxOnTax]),
            );
            container.service_baggage_item_no = 1;
            container.validators.push(testkit::recording_rule("XT", tot_order));
            container.validators.push(testkit::pass_rule());
            container
                .calculators
                .push(testkit::flat_calculator(Amount::from_units(1)));
            let mut tax = TaxData::new(name);
            tax.push_container(ProcessingGroup::Itinerary, Arc::new(container));
            Arc::new(tax)
        };

        let mut request = testkit::one_itin_request(&["US", "GB"]);
        request.processing.processing_groups = vec![ProcessingGroup::Itinerary];
        let services = testkit::ServicesBuilder::new()
            .catalog(vec![plain, tot])
            .service_baggage(
                1,
                ServiceBaggage {
                    entries: vec![ServiceBaggageEntry {
                        tax_code: TaxCode::new("QQ"),
                        tax_type_subcode: String::new(),
                    }],
                },
            )
            .build();
        let output = BusinessRulesProcessor::new(&services, PipelineConfig::default())
            .run(&request)
            .unwrap();

        // Both computed, tax-on-tax last.
        assert_eq!(output.itin_payments[0].payments.len(), 2);
        let seen = order.lock().unwrap();
        assert_eq!(*seen, vec!["US", "XT"]);
    }

    #[test]
    fn test_dependency_order_respected() {
        let order: Arc<std::sync::Mutex<Vec<&'static str>>> = Default::default();

        let aa_order = Arc::clone(&order);
        let aa = itinerary_tax(
            "ZZ",
            "AA",
            TaxPointTag::Departure,
            PercentFlatTag::Flat,
            move |c| {
                c.validators.insert(0, testkit::recording_rule("AA", aa_order));
                // AA taxes on top of BB via a service-baggage reference.
                c.service_baggage_item_no = 1;
            },
        );
        let bb_order = Arc::clone(&order);
        let bb = itinerary_tax(
            "ZZ",
            "BB",
            TaxPointTag::Departure,
            PercentFlatTag::Flat,
            move |c| c.validators.insert(0, testkit::recording_rule("BB", bb_order)),
        );

        let request = testkit::one_itin_request(&["US", "GB"]);
        let services = testkit::ServicesBuilder::new()
            // AA registered first, but its edge forces BB ahead.
            .catalog(vec![aa, bb])
            .service_baggage(
                1,
                ServiceBaggage {
                    entries: vec![ServiceBaggageEntry {
                        tax_code: TaxCode::new("BB"),
                        tax_type_subcode: "001".to_string(),
                    }],
                },
            )
            .build();
        BusinessRulesProcessor::new(&services, PipelineConfig::default())
            .run(&request)
            .unwrap();

        let seen = order.lock().unwrap();
        assert_eq!(*seen, vec!["BB", "AA"]);
    }

    #[test]
    fn test_rounding_reconciliation_is_exact() {
        // Two percent details of one code: 3.333333 and 3.333333 each round
        // to 3.33; one round of the true sum 6.666666 gives 6.67. The +0.01
        // correction lands on the first detail.
        let make = |code: &'static str| {
            itinerary_tax(
                "ZZ",
                code,
                TaxPointTag::Departure,
                PercentFlatTag::Percent,
                move |c| {
                    c.calculators.push(testkit::percent_calculator(
                        333,
                        RoundingUnit::hundredth(),
                        RoundingDir::Nearest,
                    ))
                },
            )
        };
        let mut request = testkit::one_itin_request(&["US", "GB", "GB", "US"]);
        request.itins[0].fare_path.total_amount = Amount::from_micros(100_100_100);
        let output = run(vec![make("XP")], &request);

        let payments = &output.itin_payments[0].payments;
        assert_eq!(payments.len(), 2);
        let naive_each = Amount::from_micros(3_330_000);
        // true sum = 2 × 3.333333 ≈ 6.666667 → rounds to 6.67
        let total: Amount = payments.iter().map(|p| p.amount).sum();
        assert_eq!(total, Amount::from_micros(6_670_000));
        assert_eq!(payments[0].amount, naive_each + Amount::from_micros(10_000));
        assert_eq!(payments[1].amount, naive_each);
    }

    #[test]
    fn test_rounding_reconciliation_can_be_disabled() {
        let tax = itinerary_tax(
            "ZZ",
            "XP",
            TaxPointTag::Departure,
            PercentFlatTag::Percent,
            |c| {
                c.calculators.push(testkit::percent_calculator(
                    333,
                    RoundingUnit::hundredth(),
                    RoundingDir::Nearest,
                ))
            },
        );
        let mut request = testkit::one_itin_request(&["US", "GB", "GB", "US"]);
        request.itins[0].fare_path.total_amount = Amount::from_micros(100_100_100);

        let services = testkit::services_with_catalog(vec![tax]);
        let config = PipelineConfig {
            enable_final_rounding: false,
            enable_markup_rounding: false,
        };
        let output = BusinessRulesProcessor::new(&services, config)
            .run(&request)
            .unwrap();

        let total: Amount = output.itin_payments[0]
            .payments
            .iter()
            .map(|p| p.amount)
            .sum();
        assert_eq!(total, Amount::from_micros(6_660_000));
    }

    #[test]
    fn test_command_exempt_taxes_are_computed_and_flagged() {
        let tax = itinerary_tax(
            "ZZ",
            "US",
            TaxPointTag::Departure,
            PercentFlatTag::Flat,
            |c| c.calculators.push(testkit::flat_calculator(Amount::from_units(5))),
        );
        let mut request = testkit::one_itin_request(&["US", "GB"]);
        request
            .processing
            .exempted_tax_codes
            .insert(TaxCode::new("US"));
        let output = run(vec![tax], &request);

        let payment = &output.itin_payments[0].payments[0];
        assert!(payment.exempt);
        assert!(payment.command_exempt);
        assert_eq!(payment.amount, Amount::from_units(5));
    }

    #[test]
    fn test_excluded_tax_codes_are_never_driven() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let tax = itinerary_tax(
            "ZZ",
            "XG",
            TaxPointTag::Departure,
            PercentFlatTag::Flat,
            move |c| c.validators.insert(0, testkit::counting_rule(counter)),
        );
        let mut request = testkit::one_itin_request(&["US", "GB"]);
        request
            .processing
            .excluded_tax_codes
            .insert(TaxCode::new("XG"));
        let output = run(vec![tax], &request);

        assert_eq!(attempts.load(Ordering::SeqCst), 0);
        assert!(output.itin_payments[0].payments.is_empty());
    }

    #[test]
    fn test_negative_diagnostic_view_includes_failed_payments() {
        let tax = itinerary_tax(
            "ZZ",
            "XF",
            TaxPointTag::Departure,
            PercentFlatTag::Flat,
            |c| {
                c.validators.clear();
                c.validators.push(testkit::fail_rule());
            },
        );
        let mut request = testkit::one_itin_request(&["US", "GB"]);
        let taxes = vec![tax];

        let output = run(taxes.clone(), &request);
        assert!(output.itin_payments[0].payments.is_empty());

        request.diagnostic.view = DiagnosticView::Negative;
        let output = run(taxes, &request);
        assert_eq!(output.itin_payments[0].payments.len(), 1);
        assert!(output.itin_payments[0].payments[0].failed);
    }

    #[test]
    fn test_unpriced_itinerary_skips_itinerary_group() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let tax = itinerary_tax(
            "ZZ",
            "XD",
            TaxPointTag::Departure,
            PercentFlatTag::Flat,
            move |c| c.validators.insert(0, testkit::counting_rule(counter)),
        );
        let mut request = testkit::one_itin_request(&["US", "GB"]);
        request.itins[0].fare_path.fare_usages.clear();
        let output = run(vec![tax], &request);

        assert_eq!(attempts.load(Ordering::SeqCst), 0);
        assert!(output.itin_payments[0].payments.is_empty());
    }

    #[test]
    fn test_matching_diagnostic_filter_never_changes_amounts() {
        let make = || {
            itinerary_tax(
                "ZZ",
                "XP",
                TaxPointTag::Departure,
                PercentFlatTag::Percent,
                |c| {
                    c.calculators.push(testkit::percent_calculator(
                        333,
                        RoundingUnit::hundredth(),
                        RoundingDir::Nearest,
                    ))
                },
            )
        };
        let request = testkit::one_itin_request(&["US", "GB"]);
        let unfiltered = run(vec![make()], &request);

        let mut filtered_request = testkit::one_itin_request(&["US", "GB"]);
        filtered_request.diagnostic.parameters = vec![
            crate::request::Parameter::new("IC", "XP"),
            crate::request::Parameter::new("IS", "100"),
        ];
        let filtered = run(vec![make()], &filtered_request);

        assert_eq!(unfiltered.itin_payments[0].payments.len(), 1);
        assert_eq!(filtered.itin_payments[0].payments.len(), 1);
        assert_eq!(
            unfiltered.itin_payments[0].payments[0].amount,
            filtered.itin_payments[0].payments[0].amount
        );
    }

    #[test]
    fn test_nation_filter_skips_non_matching_tax_points() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let tax = itinerary_tax(
            "GB",
            "GB",
            TaxPointTag::Departure,
            PercentFlatTag::Flat,
            move |c| c.validators.insert(0, testkit::counting_rule(counter)),
        );
        // Departure points are geo 0 (US) and geo 2 (GB); only GB matches.
        let request = testkit::one_itin_request(&["US", "GB", "GB", "US"]);
        run(vec![tax], &request);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
