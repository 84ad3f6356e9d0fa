//! # Tax Catalog
//!
//! Immutable, request-scoped rule records supplied by the external
//! rules-records service, one set per (nation, tax-point-tag).
//!
//! ## Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TaxData (one per TaxName)                                              │
//! │    └── per processing group: ordered BusinessRulesContainer list        │
//! │          ├── taxable-unit bitset (Itinerary / YqYr / OC / TaxOnTax...)  │
//! │          ├── optional service-baggage cross-reference (ordering edges)  │
//! │          ├── validator rule chain  {apply(&mut PaymentDetail)}          │
//! │          └── calculator rule chain {apply(&mut PaymentDetail)}          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rule bodies are opaque capability objects; this crate only orders,
//! drives and aggregates them. Containers are shared (`Arc`) because one
//! catalog entry serves every itinerary in the request.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::debug;

use skyfare_core::{Nation, ProcessingGroup, TaxableUnitSet, TaxName, TaxPointTag, Vendor};

use crate::payment::PaymentDetail;
use crate::services::Services;

/// A shared handle to one catalog entry.
pub type TaxValue = Arc<TaxData>;

// =============================================================================
// Rule Capability
// =============================================================================

/// Outcome of applying one rule to a payment detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Pass,
    Fail,
}

/// One validator or calculator rule body.
///
/// Validators decide whether the tax applies to the detail's subjects;
/// calculators fill in the money amounts. Both are supplied by the host
/// and treated as black boxes.
pub trait RuleApplicator: fmt::Debug {
    fn apply(&self, detail: &mut PaymentDetail) -> RuleOutcome;
}

// =============================================================================
// Limit Groups / Appl Tags
// =============================================================================

/// Identifies a set of rule containers whose payment details may not
/// overlap on the geo path; details sharing a group are overlap-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LimitGroup(pub u32);

/// Service-baggage application tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceBaggageApplTag {
    /// Exempt-style reference: contributes edges only for TaxOnTax rules.
    E,
    /// Charge-style reference.
    C,
}

// =============================================================================
// Business Rules Container
// =============================================================================

/// One ordered rule record of a tax: the unit of validation.
#[derive(Debug)]
pub struct BusinessRulesContainer {
    pub vendor: Vendor,
    pub seq_no: u32,
    /// Which subject categories this record taxes.
    pub taxable_units: TaxableUnitSet,
    /// Nonzero when the record carries a service-baggage cross-reference.
    pub service_baggage_item_no: u32,
    pub service_baggage_appl_tag: Option<ServiceBaggageApplTag>,
    /// Overlap-limit group shared with sibling records.
    pub limit_group: Option<LimitGroup>,
    /// Cap on applications per itinerary enforced by the geography limiter.
    pub application_limit: Option<u32>,
    /// Effective-date window, half-open; `None` = open-ended.
    pub effective_from: Option<NaiveDateTime>,
    pub effective_to: Option<NaiveDateTime>,
    pub validators: Vec<Box<dyn RuleApplicator>>,
    pub calculators: Vec<Box<dyn RuleApplicator>>,
}

impl BusinessRulesContainer {
    pub fn new(vendor: impl Into<Vendor>, seq_no: u32, taxable_units: TaxableUnitSet) -> Self {
        BusinessRulesContainer {
            vendor: vendor.into(),
            seq_no,
            taxable_units,
            service_baggage_item_no: 0,
            service_baggage_appl_tag: None,
            limit_group: None,
            application_limit: None,
            effective_from: None,
            effective_to: None,
            validators: Vec::new(),
            calculators: Vec::new(),
        }
    }

    /// In effect at the ticketing date (half-open window).
    pub fn in_effect(&self, ticketing_date: NaiveDateTime) -> bool {
        if let Some(from) = self.effective_from {
            if ticketing_date < from {
                return false;
            }
        }
        if let Some(to) = self.effective_to {
            if ticketing_date >= to {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Tax Data
// =============================================================================

/// One catalog entry: a tax identity plus its per-processing-group ordered
/// rule containers.
#[derive(Debug)]
pub struct TaxData {
    tax_name: TaxName,
    containers: [Vec<Arc<BusinessRulesContainer>>; 5],
}

impl TaxData {
    pub fn new(tax_name: TaxName) -> Self {
        TaxData {
            tax_name,
            containers: Default::default(),
        }
    }

    pub fn tax_name(&self) -> &TaxName {
        &self.tax_name
    }

    /// Appends a rule container to a processing group, keeping catalog
    /// order.
    pub fn push_container(
        &mut self,
        group: ProcessingGroup,
        container: Arc<BusinessRulesContainer>,
    ) {
        self.containers[group.index()].push(container);
    }

    /// All containers of a group, unfiltered.
    pub fn containers(&self, group: ProcessingGroup) -> &[Arc<BusinessRulesContainer>] {
        &self.containers[group.index()]
    }

    /// The group's containers in effect at the ticketing date.
    pub fn date_filtered(
        &self,
        group: ProcessingGroup,
        ticketing_date: NaiveDateTime,
    ) -> Vec<Arc<BusinessRulesContainer>> {
        self.containers[group.index()]
            .iter()
            .filter(|c| c.in_effect(ticketing_date))
            .cloned()
            .collect()
    }

    /// Count of in-effect containers, used for arena pre-sizing.
    pub fn date_filtered_len(&self, group: ProcessingGroup, ticketing_date: NaiveDateTime) -> usize {
        self.containers[group.index()]
            .iter()
            .filter(|c| c.in_effect(ticketing_date))
            .count()
    }
}

// =============================================================================
// Containers Cache
// =============================================================================

/// Per-transaction catalog cache keyed by (nation, tag).
///
/// Populated lazily; read-only once a key exists. The bool in the return
/// tells the caller whether the key was freshly loaded, which gates
/// one-time work such as orderer registration.
#[derive(Default)]
pub struct ContainersCache {
    map: HashMap<(Nation, TaxPointTag), Arc<Vec<TaxValue>>>,
}

impl ContainersCache {
    pub fn new() -> Self {
        ContainersCache::default()
    }

    /// Get-or-compute semantics over the rules-records service.
    pub fn get_or_load(
        &mut self,
        nation: &Nation,
        tag: TaxPointTag,
        ticketing_date: NaiveDateTime,
        services: &Services,
    ) -> (Arc<Vec<TaxValue>>, bool) {
        let key = (nation.clone(), tag);
        if let Some(existing) = self.map.get(&key) {
            return (Arc::clone(existing), false);
        }
        let loaded = Arc::new(
            services
                .rules_records()
                .tax_rules_containers(nation, tag, ticketing_date),
        );
        debug!(nation = %nation, ?tag, taxes = loaded.len(), "loaded tax rules containers");
        self.map.insert(key, Arc::clone(&loaded));
        (loaded, true)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;
    use chrono::NaiveDate;
    use skyfare_core::{PercentFlatTag, TaxableUnit, TaxPointTag};

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_date_filtering_half_open() {
        let mut container = BusinessRulesContainer::new(
            "ATP",
            100,
            TaxableUnitSet::of(&[TaxableUnit::Itinerary]),
        );
        container.effective_from = Some(ts(2026, 1, 1));
        container.effective_to = Some(ts(2026, 7, 1));

        assert!(!container.in_effect(ts(2025, 12, 31)));
        assert!(container.in_effect(ts(2026, 1, 1)));
        assert!(container.in_effect(ts(2026, 6, 30)));
        assert!(!container.in_effect(ts(2026, 7, 1)));
    }

    #[test]
    fn test_open_ended_container_always_in_effect() {
        let container = BusinessRulesContainer::new(
            "ATP",
            100,
            TaxableUnitSet::of(&[TaxableUnit::Itinerary]),
        );
        assert!(container.in_effect(ts(1980, 1, 1)));
        assert!(container.in_effect(ts(2090, 1, 1)));
    }

    #[test]
    fn test_tax_data_groups_are_independent() {
        let name = TaxName::new("US", "US", "001", TaxPointTag::Departure, PercentFlatTag::Percent);
        let mut tax = TaxData::new(name);
        tax.push_container(
            ProcessingGroup::Itinerary,
            Arc::new(BusinessRulesContainer::new(
                "ATP",
                1,
                TaxableUnitSet::of(&[TaxableUnit::Itinerary]),
            )),
        );
        assert_eq!(tax.containers(ProcessingGroup::Itinerary).len(), 1);
        assert!(tax.containers(ProcessingGroup::Baggage).is_empty());
        assert_eq!(tax.date_filtered_len(ProcessingGroup::Itinerary, ts(2026, 1, 1)), 1);
    }

    #[test]
    fn test_cache_loads_once_per_key() {
        let services = testkit::services_with_catalog(vec![]);
        let mut cache = ContainersCache::new();
        let nation = Nation::new("US");

        let (_, fresh) =
            cache.get_or_load(&nation, TaxPointTag::Departure, ts(2026, 1, 1), &services);
        assert!(fresh);
        let (_, fresh) =
            cache.get_or_load(&nation, TaxPointTag::Departure, ts(2026, 1, 1), &services);
        assert!(!fresh);
        let (_, fresh) =
            cache.get_or_load(&nation, TaxPointTag::Arrival, ts(2026, 1, 1), &services);
        assert!(fresh);
        assert_eq!(cache.len(), 2);
    }
}
