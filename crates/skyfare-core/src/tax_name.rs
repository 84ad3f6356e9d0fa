//! # Tax Identity Module
//!
//! [`TaxName`] is the immutable identity of a catalog tax; [`TaxKey`] is its
//! ordering key with wildcard-aware matching; [`TaxableUnitSet`] declares
//! which subject categories a rule container taxes.
//!
//! ## Identity vs Key
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TaxName  = {nation, tax_code, tax_type, tax_point_tag, percent/flat}  │
//! │             one catalog entry; request-scoped; never mutated            │
//! │                                                                         │
//! │  TaxKey   = (tax_code, tax_type)                                        │
//! │             dependency-ordering key; empty tax_type is a WILDCARD       │
//! │             matching any concrete type of the same code                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codes::{Nation, TaxCode, TaxType};
use crate::geo::TaxPointTag;

// =============================================================================
// Percent / Flat
// =============================================================================

/// Whether a tax is a percentage of its base or a flat amount.
///
/// Only percentage taxes take part in final rounding reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PercentFlatTag {
    Percent,
    Flat,
}

// =============================================================================
// Processing Group
// =============================================================================

/// Partition of taxable subjects; the pipeline runs once per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingGroup {
    /// Itinerary fare (plus YQYR surcharges and tax-on-tax).
    Itinerary,
    /// Optional services other than baggage.
    OptionalServices,
    /// Baggage charges.
    Baggage,
    /// Change fee.
    ChangeFee,
    /// Ticketing (OB) fees.
    TicketingFee,
}

impl ProcessingGroup {
    /// All groups, in canonical processing order.
    pub const ALL: [ProcessingGroup; 5] = [
        ProcessingGroup::Itinerary,
        ProcessingGroup::OptionalServices,
        ProcessingGroup::Baggage,
        ProcessingGroup::ChangeFee,
        ProcessingGroup::TicketingFee,
    ];

    /// Dense index for per-group storage.
    pub const fn index(self) -> usize {
        match self {
            ProcessingGroup::Itinerary => 0,
            ProcessingGroup::OptionalServices => 1,
            ProcessingGroup::Baggage => 2,
            ProcessingGroup::ChangeFee => 3,
            ProcessingGroup::TicketingFee => 4,
        }
    }
}

// =============================================================================
// Taxable Units
// =============================================================================

/// One taxable-subject category a rule container may apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum TaxableUnit {
    /// Carrier-imposed YQ/YR surcharges.
    YqYr = 0,
    /// Ticketing (OB) fees.
    TicketingFee = 1,
    /// Flight-related optional services.
    OcFlightRelated = 2,
    /// Ticket-related optional services.
    OcTicketRelated = 3,
    /// Merchandise optional services.
    OcMerchandise = 4,
    /// Fare-related optional services.
    OcFareRelated = 5,
    /// Baggage charges.
    BaggageCharge = 6,
    /// Previously computed tax amounts.
    TaxOnTax = 7,
    /// The itinerary fare itself.
    Itinerary = 8,
    /// Change fee.
    ChangeFee = 9,
}

impl TaxableUnit {
    const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// The optional-service categories belonging to a processing group,
    /// if that group carries optional services at all.
    pub fn oc_units_for(group: ProcessingGroup) -> &'static [TaxableUnit] {
        match group {
            ProcessingGroup::OptionalServices => &[
                TaxableUnit::OcFlightRelated,
                TaxableUnit::OcTicketRelated,
                TaxableUnit::OcMerchandise,
                TaxableUnit::OcFareRelated,
            ],
            ProcessingGroup::Baggage => &[TaxableUnit::BaggageCharge],
            _ => &[],
        }
    }
}

/// A bitset of [`TaxableUnit`]s.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaxableUnitSet(u16);

impl TaxableUnitSet {
    /// The empty set.
    pub const fn empty() -> Self {
        TaxableUnitSet(0)
    }

    /// Builds a set from a list of units.
    pub fn of(units: &[TaxableUnit]) -> Self {
        let mut set = TaxableUnitSet(0);
        for unit in units {
            set.insert(*unit);
        }
        set
    }

    /// Adds a unit to the set.
    pub fn insert(&mut self, unit: TaxableUnit) {
        self.0 |= unit.bit();
    }

    /// Membership test.
    pub const fn has(&self, unit: TaxableUnit) -> bool {
        self.0 & unit.bit() != 0
    }

    /// True when the set contains any of `units`.
    pub fn has_any(&self, units: &[TaxableUnit]) -> bool {
        units.iter().any(|u| self.has(*u))
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// TaxName / TaxKey
// =============================================================================

/// Immutable identity of one catalog tax.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaxName {
    pub nation: Nation,
    pub tax_code: TaxCode,
    pub tax_type: TaxType,
    pub tax_point_tag: TaxPointTag,
    pub percent_flat_tag: PercentFlatTag,
}

impl TaxName {
    pub fn new(
        nation: impl Into<Nation>,
        tax_code: impl Into<TaxCode>,
        tax_type: impl Into<TaxType>,
        tax_point_tag: TaxPointTag,
        percent_flat_tag: PercentFlatTag,
    ) -> Self {
        TaxName {
            nation: nation.into(),
            tax_code: tax_code.into(),
            tax_type: tax_type.into(),
            tax_point_tag,
            percent_flat_tag,
        }
    }

    /// The dependency-ordering key.
    pub fn key(&self) -> TaxKey {
        TaxKey {
            tax_code: self.tax_code.clone(),
            tax_type: self.tax_type.clone(),
        }
    }
}

impl fmt::Display for TaxName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}{}",
            self.nation,
            self.tax_code,
            if self.tax_type.is_empty() {
                String::new()
            } else {
                format!("-{}", self.tax_type)
            }
        )
    }
}

/// `(tax_code, tax_type)` ordering key.
///
/// An empty `tax_type` acts as a wildcard matching any concrete type of the
/// same code; matching is symmetric in both arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaxKey {
    pub tax_code: TaxCode,
    pub tax_type: TaxType,
}

impl TaxKey {
    pub fn new(tax_code: impl Into<TaxCode>, tax_type: impl Into<TaxType>) -> Self {
        TaxKey {
            tax_code: tax_code.into(),
            tax_type: tax_type.into(),
        }
    }

    /// A key without a wildcard component.
    pub fn is_simple(&self) -> bool {
        !self.tax_type.is_empty()
    }

    /// Wildcard-aware, symmetric match.
    pub fn matches(&self, other: &TaxKey) -> bool {
        self.tax_code == other.tax_code
            && (self.tax_type == other.tax_type
                || self.tax_type.is_empty()
                || other.tax_type.is_empty())
    }
}

impl fmt::Display for TaxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tax_code, self.tax_type)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxable_unit_set() {
        let set = TaxableUnitSet::of(&[TaxableUnit::Itinerary, TaxableUnit::YqYr]);
        assert!(set.has(TaxableUnit::Itinerary));
        assert!(set.has(TaxableUnit::YqYr));
        assert!(!set.has(TaxableUnit::TaxOnTax));
        assert!(set.has_any(&[TaxableUnit::TaxOnTax, TaxableUnit::YqYr]));
        assert!(TaxableUnitSet::empty().is_empty());
    }

    #[test]
    fn test_oc_units_per_group() {
        assert_eq!(
            TaxableUnit::oc_units_for(ProcessingGroup::Baggage),
            &[TaxableUnit::BaggageCharge]
        );
        assert!(TaxableUnit::oc_units_for(ProcessingGroup::Itinerary).is_empty());
        assert_eq!(
            TaxableUnit::oc_units_for(ProcessingGroup::OptionalServices).len(),
            4
        );
    }

    #[test]
    fn test_key_exact_match() {
        let a = TaxKey::new("US", "001");
        let b = TaxKey::new("US", "001");
        let c = TaxKey::new("US", "002");
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
    }

    #[test]
    fn test_key_wildcard_match_is_symmetric() {
        let wildcard = TaxKey::new("US", "");
        let concrete = TaxKey::new("US", "001");
        assert!(wildcard.matches(&concrete));
        assert!(concrete.matches(&wildcard));
        assert!(!wildcard.is_simple());
        assert!(concrete.is_simple());
    }

    #[test]
    fn test_key_wildcard_needs_same_code() {
        let wildcard = TaxKey::new("US", "");
        let other_code = TaxKey::new("GB", "001");
        assert!(!wildcard.matches(&other_code));
    }

    #[test]
    fn test_tax_name_is_hashable() {
        let mut seen = std::collections::HashSet::new();
        let name = TaxName::new("US", "AY", "001", TaxPointTag::Departure, PercentFlatTag::Flat);
        assert!(seen.insert(name.clone()));
        assert!(!seen.insert(name));
    }

    #[test]
    fn test_tax_name_display() {
        let name = TaxName::new(
            "US",
            "AY",
            "001",
            TaxPointTag::Departure,
            PercentFlatTag::Flat,
        );
        assert_eq!(name.to_string(), "US/AY-001");
        assert_eq!(name.key(), TaxKey::new("AY", "001"));
    }
}
