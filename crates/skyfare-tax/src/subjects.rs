//! # Raw Subjects Collection
//!
//! Builds the taxable-subject snapshot for one (processing group, itinerary,
//! tax point) before validation starts.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  group = Itinerary     → base fare + YQYR usages covering the point     │
//! │  group = OC / Baggage  → optional services of a valid kind, walked in   │
//! │                          path order (reversed for Arrival)              │
//! │  group = ChangeFee     → the itinerary's change-fee amount              │
//! │  group = TicketingFee  → the itinerary's OB fees                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Collection is side-effect-free on the request. A missing optional path
//! yields empty subjects, a valid "nothing to tax" outcome. The validator
//! then copies the categories each rule container's taxable-unit set asks
//! for into every new `PaymentDetail`.

use skyfare_core::{Amount, ProcessingGroup, TaxableUnit, TaxableUnitSet, TaxPointTag};

use crate::error::TaxResult;
use crate::payment::{
    ItinerarySubject, OptionalServiceItem, PaymentDetail, TaxableYqYr, TicketingFeeSubject,
};
use crate::request::{Itin, Request};

// =============================================================================
// Collector
// =============================================================================

/// Snapshot of everything taxable at one tax point.
#[derive(Debug)]
pub struct RawSubjectsCollector {
    itinerary_subject: Option<ItinerarySubject>,
    yqyrs: Vec<TaxableYqYr>,
    optional_services: Vec<OptionalServiceItem>,
    change_fee: Option<Amount>,
    ticketing_fees: Vec<TicketingFeeSubject>,
}

impl RawSubjectsCollector {
    /// Collects subjects for `tax_point`; `next_prev_tax_point` is the
    /// journey-direction end of the taxed range.
    pub fn new(
        group: ProcessingGroup,
        request: &Request,
        itin: &Itin,
        tag: TaxPointTag,
        tax_point: usize,
        next_prev_tax_point: usize,
    ) -> TaxResult<Self> {
        let mut collector = RawSubjectsCollector {
            itinerary_subject: None,
            yqyrs: Vec::new(),
            optional_services: Vec::new(),
            change_fee: None,
            ticketing_fees: Vec::new(),
        };
        match group {
            ProcessingGroup::Itinerary => {
                collector.itinerary_subject = Some(ItinerarySubject {
                    fare_amount: itin.fare_path.total_amount,
                    markup_amount: itin.fare_path.markup_amount,
                });
                collector.add_yqyrs(request, itin, tag, tax_point, next_prev_tax_point)?;
            }
            ProcessingGroup::OptionalServices | ProcessingGroup::Baggage => {
                collector.add_optional_services(group, request, itin, tag, tax_point)?;
            }
            ProcessingGroup::ChangeFee => {
                collector.change_fee = itin.change_fee;
            }
            ProcessingGroup::TicketingFee => {
                collector.ticketing_fees = itin
                    .ticketing_fees
                    .iter()
                    .map(|fee| TicketingFeeSubject {
                        subcode: fee.subcode.clone(),
                        amount: fee.amount,
                    })
                    .collect();
            }
        }
        Ok(collector)
    }

    /// YQYR usages whose mapped range contains the tax point; all of them
    /// for Sale taxes or when taxing on the whole base fare.
    fn add_yqyrs(
        &mut self,
        request: &Request,
        itin: &Itin,
        tag: TaxPointTag,
        tax_point: usize,
        next_prev_tax_point: usize,
    ) -> TaxResult<()> {
        let Some(path) = request.yqyr_path(itin)? else {
            return Ok(());
        };
        let take_all = tag == TaxPointTag::Sale || request.processing.on_all_base_fare;
        for (usage_index, usage) in path.usages.iter().enumerate() {
            if !take_all && !usage.covers(tax_point) {
                continue;
            }
            let yqyr = request.yqyr(usage)?;
            self.yqyrs.push(TaxableYqYr {
                usage_index,
                code: yqyr.code.clone(),
                amount: yqyr.amount,
                taxed_range_end: next_prev_tax_point,
                failed: false,
            });
        }
        Ok(())
    }

    /// Optional services of a kind valid for the group whose mapped range
    /// contains the tax point. Arrival walks the path backwards and swaps
    /// the begin/end tax points to the journey direction.
    fn add_optional_services(
        &mut self,
        group: ProcessingGroup,
        request: &Request,
        itin: &Itin,
        tag: TaxPointTag,
        tax_point: usize,
    ) -> TaxResult<()> {
        let Some(path) = request.optional_service_path(itin)? else {
            return Ok(());
        };
        let reversed = tag == TaxPointTag::Arrival;
        let indices: Vec<usize> = if reversed {
            (0..path.usages.len()).rev().collect()
        } else {
            (0..path.usages.len()).collect()
        };
        for i in indices {
            let usage = &path.usages[i];
            if !usage.covers(tax_point) {
                continue;
            }
            let service = request.optional_service(usage)?;
            if !service.kind.valid_for(group) {
                continue;
            }
            let (begin, end) = if reversed {
                (usage.end_geo, usage.begin_geo)
            } else {
                (usage.begin_geo, usage.end_geo)
            };
            self.optional_services.push(OptionalServiceItem {
                service_ref: usage.service_ref,
                kind: service.kind,
                subtype: service.subtype.clone(),
                amount: service.amount,
                begin_tax_point: begin,
                end_tax_point: end,
                duplicated: false,
                failed: false,
            });
        }
        Ok(())
    }

    /// The tax point carries itinerary-category content (fare, change fee
    /// or ticketing fees) for the itinerary progress latch to track.
    pub fn has_itinerary_category(&self) -> bool {
        self.itinerary_subject.is_some()
            || self.change_fee.is_some()
            || !self.ticketing_fees.is_empty()
    }

    /// Service refs in scope at this tax point, for progress tracking.
    pub fn considered_service_refs(&self) -> Vec<usize> {
        self.optional_services.iter().map(|s| s.service_ref).collect()
    }

    pub fn yqyr_count(&self) -> usize {
        self.yqyrs.len()
    }

    /// Copies the categories a rule container's taxable-unit set asks for
    /// into a fresh detail.
    pub fn fill_detail(&self, detail: &mut PaymentDetail, units: TaxableUnitSet) {
        if units.has_any(&[
            TaxableUnit::Itinerary,
            TaxableUnit::TaxOnTax,
        ]) {
            detail.itinerary_subject = self.itinerary_subject;
        }
        if units.has(TaxableUnit::YqYr) {
            detail.yqyrs = self.yqyrs.clone();
        }
        detail.optional_services = self
            .optional_services
            .iter()
            .filter(|s| units.has(s.kind.taxable_unit()))
            .cloned()
            .collect();
        if units.has(TaxableUnit::ChangeFee) {
            detail.change_fee = self.change_fee;
        }
        if units.has(TaxableUnit::TicketingFee) {
            detail.ticketing_fees = self.ticketing_fees.clone();
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
