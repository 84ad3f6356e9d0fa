//! # Validation Progress
//!
//! Per-(tax, tax point) trackers deciding when the validator may stop
//! trying further rule containers.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ItinProgressMonitor    OR-latch: first non-failed itinerary hit wins;  │
//! │                         starts finished with no itinerary subjects      │
//! │  YqYrProgressMonitor    done when all N usages have an outcome          │
//! │  OcProgressMonitor      done when every considered item matched once;   │
//! │                         matched set also drives duplicate marking       │
//! │                                                                         │
//! │  TaxPointValidationProgress = routing by taxable-unit set,              │
//! │                               is_finished = AND of all three            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Monitors for categories with nothing to track start finished, so the
//! AND collapses to the categories the tax point actually has.

use std::collections::HashSet;

use skyfare_core::{TaxableUnit, TaxableUnitSet};

use crate::payment::PaymentDetail;

// =============================================================================
// Itinerary Monitor
// =============================================================================

/// Monotonic OR-latch over itinerary applications.
#[derive(Debug)]
pub struct ItinProgressMonitor {
    finished: bool,
}

impl ItinProgressMonitor {
    /// `tracked` is false when the tax point has no itinerary-category
    /// subjects at all; an untracked latch starts finished.
    pub fn new(tracked: bool) -> Self {
        ItinProgressMonitor { finished: !tracked }
    }

    pub fn update(&mut self, detail: &PaymentDetail) {
        if detail.is_validated() && !detail.is_itinerary_failed() {
            self.finished = true;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

// =============================================================================
// YQYR Monitor
// =============================================================================

/// Finished once every one of the N usages fixed at construction has
/// recorded an outcome, matched or failed.
#[derive(Debug)]
pub struct YqYrProgressMonitor {
    total: usize,
    seen: HashSet<usize>,
}

impl YqYrProgressMonitor {
    pub fn new(total: usize) -> Self {
        YqYrProgressMonitor {
            total,
            seen: HashSet::new(),
        }
    }

    pub fn update(&mut self, detail: &PaymentDetail) {
        for yqyr in &detail.yqyrs {
            self.seen.insert(yqyr.usage_index);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.seen.len() >= self.total
    }
}

// =============================================================================
// Optional-Service Monitor
// =============================================================================

/// Finished once every considered optional-service item has matched at
/// least once. The matched set is shared across tax points of one tax so
/// later details can mark re-claimed items as duplicates.
#[derive(Debug)]
pub struct OcProgressMonitor {
    considered: Vec<usize>,
    matched: HashSet<usize>,
}

impl OcProgressMonitor {
    /// `considered` holds the service refs in scope at this tax point;
    /// `claimed` seeds items already matched at earlier tax points.
    pub fn new(considered: Vec<usize>, claimed: &HashSet<usize>) -> Self {
        let matched = considered
            .iter()
            .filter(|r| claimed.contains(r))
            .copied()
            .collect();
        OcProgressMonitor { considered, matched }
    }

    pub fn update(&mut self, detail: &PaymentDetail) {
        for item in &detail.optional_services {
            if item.is_eligible() {
                self.matched.insert(item.service_ref);
            }
        }
    }

    pub fn is_matched(&self, service_ref: usize) -> bool {
        self.matched.contains(&service_ref)
    }

    pub fn matched_refs(&self) -> &HashSet<usize> {
        &self.matched
    }

    pub fn is_finished(&self) -> bool {
        self.considered.iter().all(|r| self.matched.contains(r))
    }
}

// =============================================================================
// Combined Progress
// =============================================================================

/// Routes a detail outcome to the monitors implied by a rule's
/// taxable-unit set and aggregates their finished states.
#[derive(Debug)]
pub struct TaxPointValidationProgress {
    pub itin: ItinProgressMonitor,
    pub yqyr: YqYrProgressMonitor,
    pub oc: OcProgressMonitor,
}

impl TaxPointValidationProgress {
    pub fn new(
        itin_tracked: bool,
        yqyr_total: usize,
        oc_considered: Vec<usize>,
        oc_claimed: &HashSet<usize>,
    ) -> Self {
        TaxPointValidationProgress {
            itin: ItinProgressMonitor::new(itin_tracked),
            yqyr: YqYrProgressMonitor::new(yqyr_total),
            oc: OcProgressMonitor::new(oc_considered, oc_claimed),
        }
    }

    pub fn update(&mut self, detail: &PaymentDetail, units: TaxableUnitSet) {
        if units.has(TaxableUnit::YqYr) {
            self.yqyr.update(detail);
        }
        if units.has_any(&[
            TaxableUnit::OcFlightRelated,
            TaxableUnit::OcTicketRelated,
            TaxableUnit::OcMerchandise,
            TaxableUnit::OcFareRelated,
            TaxableUnit::BaggageCharge,
        ]) {
            self.oc.update(detail);
        }
        if units.has_any(&[
            TaxableUnit::Itinerary,
            TaxableUnit::TaxOnTax,
            TaxableUnit::ChangeFee,
            TaxableUnit::TicketingFee,
        ]) {
            self.itin.update(detail);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.itin.is_finished() && self.yqyr.is_finished() && self.oc.is_finished()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
