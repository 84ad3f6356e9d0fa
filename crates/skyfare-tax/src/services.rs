//! # Service Interfaces
//!
//! Traits for the opaque external collaborators consumed by the pipeline.
//! The hosting process implements them against its data sources; the
//! pipeline treats every call as a black box and performs no I/O itself.
//!
//! ## Collaborators
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RulesRecordsService       nation × tag × date ──► ordered TaxData      │
//! │  ServiceBaggageService     vendor × item no   ──► tax-on-tax edges      │
//! │  CurrencyService           currency code      ──► decimal count         │
//! │  TaxRoundingInfoService    amount × unit × dir ──► rounded amount       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::NaiveDateTime;

use skyfare_core::money::standard_round;
use skyfare_core::{Amount, CurrencyCode, Nation, RoundingDir, RoundingUnit, TaxCode, TaxPointTag, Vendor};

use crate::catalog::TaxValue;

// =============================================================================
// Service Baggage (tax-on-tax cross-references)
// =============================================================================

/// One cross-referenced charge code in a service-baggage table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBaggageEntry {
    pub tax_code: TaxCode,
    /// Tax type or service subcode; must be empty or exactly 3 characters,
    /// anything else is a catalog data error.
    pub tax_type_subcode: String,
}

/// A catalog table declaring which other charge codes a tax also applies
/// to. Entries with codes OC/YQ/YR name subjects; the rest are ordering
/// edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceBaggage {
    pub entries: Vec<ServiceBaggageEntry>,
}

// =============================================================================
// Service Traits
// =============================================================================

/// Supplies the tax rule catalog, one ordered set per (nation, tag).
pub trait RulesRecordsService {
    fn tax_rules_containers(
        &self,
        nation: &Nation,
        tag: TaxPointTag,
        ticketing_date: NaiveDateTime,
    ) -> Vec<TaxValue>;
}

/// Resolves service-baggage items. `None` means the item does not exist,
/// a data-quality defect handled by dropping the affected edges.
pub trait ServiceBaggageService {
    fn service_baggage(&self, vendor: &Vendor, item_no: u32) -> Option<Arc<ServiceBaggage>>;
}

/// Currency metadata.
pub trait CurrencyService {
    fn currency_decimals(&self, currency: &CurrencyCode) -> u8;
}

/// Rounds tax amounts per nation/currency rounding rules.
pub trait TaxRoundingInfoService {
    fn standard_round(&self, amount: Amount, unit: RoundingUnit, dir: RoundingDir) -> Amount;
}

/// Default rounding: plain arithmetic rounding from skyfare-core. Hosts
/// with nation-specific rounding tables substitute their own.
#[derive(Debug, Default)]
pub struct StandardRounding;

impl TaxRoundingInfoService for StandardRounding {
    fn standard_round(&self, amount: Amount, unit: RoundingUnit, dir: RoundingDir) -> Amount {
        standard_round(amount, unit, dir)
    }
}

// =============================================================================
// Services Bundle
// =============================================================================

/// The full collaborator set handed to the pipeline at construction.
pub struct Services {
    rules_records: Box<dyn RulesRecordsService>,
    service_baggage: Box<dyn ServiceBaggageService>,
    currency: Box<dyn CurrencyService>,
    rounding: Box<dyn TaxRoundingInfoService>,
}

impl Services {
    pub fn new(
        rules_records: Box<dyn RulesRecordsService>,
        service_baggage: Box<dyn ServiceBaggageService>,
        currency: Box<dyn CurrencyService>,
        rounding: Box<dyn TaxRoundingInfoService>,
    ) -> Self {
        Services {
            rules_records,
            service_baggage,
            currency,
            rounding,
        }
    }

    pub fn rules_records(&self) -> &dyn RulesRecordsService {
        self.rules_records.as_ref()
    }

    pub fn service_baggage(&self) -> &dyn ServiceBaggageService {
        self.service_baggage.as_ref()
    }

    pub fn currency(&self) -> &dyn CurrencyService {
        self.currency.as_ref()
    }

    pub fn rounding(&self) -> &dyn TaxRoundingInfoService {
        self.rounding.as_ref()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
