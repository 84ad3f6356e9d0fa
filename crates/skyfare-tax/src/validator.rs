//! # Tax Validation
//!
//! Drives one tax's rule containers at one tax point, producing at most one
//! `PaymentDetail` per container tried.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate(container):                                                   │
//! │    filter mismatch ──► skipped, no detail                               │
//! │    build detail  ──► mark duplicate services ──► eligible content?      │
//! │        │                                              │                 │
//! │        │ no: failed detail                            │ yes             │
//! │        ▼                                              ▼                 │
//! │    append to RawPayments ◄── run validator chain {Pass* | Fail}         │
//! │    update progress; return is_finished()                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The caller keeps trying containers until `validate` reports finished or
//! the container list is exhausted.

use std::collections::HashSet;
use std::sync::Arc;

use skyfare_core::{CarrierCode, TaxName};

use crate::catalog::{BusinessRulesContainer, RuleOutcome};
use crate::filter::RulesFilter;
use crate::payment::{PaymentDetail, PaymentWithRules, RawPayments};
use crate::progress::TaxPointValidationProgress;
use crate::subjects::RawSubjectsCollector;

// =============================================================================
// Tax Point Properties
// =============================================================================

/// Geography snapshot shared by every detail built at one tax point.
#[derive(Debug, Clone)]
pub struct TaxPointProperties {
    pub tax_point_begin: usize,
    pub tax_point_end: usize,
    pub marketing_carrier: CarrierCode,
    pub round_trip_or_open_jaw: bool,
}

// =============================================================================
// Tax Validator
// =============================================================================

/// Validation driver for one (tax, itinerary, tax point).
pub struct TaxValidator<'a> {
    tax_name: &'a TaxName,
    filter: &'a RulesFilter,
    subjects: &'a RawSubjectsCollector,
    properties: TaxPointProperties,
    progress: TaxPointValidationProgress,
    /// Service refs claimed by validated details of this tax at earlier
    /// tax points; drives duplicate marking, spans the whole tax.
    oc_claimed: &'a mut HashSet<usize>,
}

impl<'a> TaxValidator<'a> {
    pub fn new(
        tax_name: &'a TaxName,
        filter: &'a RulesFilter,
        subjects: &'a RawSubjectsCollector,
        properties: TaxPointProperties,
        oc_claimed: &'a mut HashSet<usize>,
    ) -> Self {
        let progress = TaxPointValidationProgress::new(
            subjects.has_itinerary_category(),
            subjects.yqyr_count(),
            subjects.considered_service_refs(),
            oc_claimed,
        );
        TaxValidator {
            tax_name,
            filter,
            subjects,
            properties,
            progress,
            oc_claimed,
        }
    }

    /// Tries one rule container. Appends at most one detail to `raw`;
    /// validated details are also queued on `candidates`. Returns whether
    /// this tax point needs no further containers.
    pub fn validate(
        &mut self,
        container: &Arc<BusinessRulesContainer>,
        raw: &mut RawPayments,
        candidates: &mut Vec<PaymentWithRules>,
    ) -> bool {
        if !self
            .filter
            .matches(self.tax_name, &container.vendor, container.seq_no)
        {
            return self.progress.is_finished();
        }

        let mut detail = self.build_detail(container);

        if detail.has_eligible_content() {
            let passed = container
                .validators
                .iter()
                .all(|rule| rule.apply(&mut detail) == RuleOutcome::Pass);
            if passed {
                detail.set_validated();
            }
        }
        if !detail.is_validated() {
            detail.set_failed();
            for item in &mut detail.optional_services {
                item.failed = true;
            }
        }

        self.progress.update(&detail, container.taxable_units);
        if detail.is_validated() {
            for item in &detail.optional_services {
                if item.is_eligible() {
                    self.oc_claimed.insert(item.service_ref);
                }
            }
        }

        let validated = detail.is_validated();
        let index = raw.push(detail);
        if validated {
            candidates.push(PaymentWithRules {
                index,
                container: Some(Arc::clone(container)),
            });
        }
        self.progress.is_finished()
    }

    fn build_detail(&self, container: &Arc<BusinessRulesContainer>) -> PaymentDetail {
        let mut detail = PaymentDetail::new(
            self.tax_name.clone(),
            container.vendor.clone(),
            container.seq_no,
        );
        detail.tax_point_begin = self.properties.tax_point_begin;
        detail.tax_point_end = self.properties.tax_point_end;
        detail.marketing_carrier = self.properties.marketing_carrier.clone();
        detail.round_trip_or_open_jaw = self.properties.round_trip_or_open_jaw;
        detail.limit_group = container.limit_group;
        detail.application_limit = container.application_limit;
        self.subjects.fill_detail(&mut detail, container.taxable_units);
        for item in &mut detail.optional_services {
            if self.progress.oc.is_matched(item.service_ref) {
                item.duplicated = true;
            }
        }
        detail
    }

    pub fn is_finished(&self) -> bool {
        self.progress.is_finished()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
