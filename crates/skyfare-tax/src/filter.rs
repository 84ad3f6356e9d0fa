//! # Diagnostic Filtering
//!
//! Narrows which rule containers are considered during a diagnostic run.
//! Filtering only ever skips containers; it never changes a computed
//! amount.
//!
//! Parameters (string key/value):
//! ```text
//! IV vendor      IN nation      IC tax code      IT tax type
//! IS sequence    "NNN" exact | "NNN-" open range | "NNN-MMM" closed range
//! ```
//!
//! Malformed values are ignored rather than raised; a diagnostic typo must
//! not abort a transaction.

use skyfare_core::{Nation, TaxCode, TaxName, TaxType, Vendor};

use crate::request::Parameter;

// =============================================================================
// Sequence Range
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeqRange {
    Exact(u32),
    From(u32),
    Between(u32, u32),
}

impl SeqRange {
    fn parse(value: &str) -> Option<SeqRange> {
        match value.split_once('-') {
            None => value.parse().ok().map(SeqRange::Exact),
            Some((lo, "")) => lo.parse().ok().map(SeqRange::From),
            Some((lo, hi)) => {
                let lo = lo.parse().ok()?;
                let hi = hi.parse().ok()?;
                Some(SeqRange::Between(lo, hi))
            }
        }
    }

    fn contains(self, seq_no: u32) -> bool {
        match self {
            SeqRange::Exact(n) => seq_no == n,
            SeqRange::From(lo) => seq_no >= lo,
            SeqRange::Between(lo, hi) => lo <= seq_no && seq_no <= hi,
        }
    }
}

// =============================================================================
// Rules Filter
// =============================================================================

/// The active diagnostic restriction; empty means "consider everything".
#[derive(Debug, Clone, Default)]
pub struct RulesFilter {
    vendor: Option<Vendor>,
    nation: Option<Nation>,
    tax_code: Option<TaxCode>,
    tax_type: Option<TaxType>,
    seq_range: Option<SeqRange>,
}

impl RulesFilter {
    pub fn from_parameters(parameters: &[Parameter]) -> Self {
        let mut filter = RulesFilter::default();
        for param in parameters {
            match param.name.as_str() {
                "IV" => filter.vendor = Some(Vendor::new(param.value.as_str())),
                "IN" => filter.nation = Some(Nation::new(param.value.as_str())),
                "IC" => filter.tax_code = Some(TaxCode::new(param.value.as_str())),
                "IT" => filter.tax_type = Some(TaxType::new(param.value.as_str())),
                "IS" => filter.seq_range = SeqRange::parse(&param.value),
                _ => {}
            }
        }
        filter
    }

    /// Whether a rule container passes the restriction.
    pub fn matches(&self, tax_name: &TaxName, vendor: &Vendor, seq_no: u32) -> bool {
        if let Some(want) = &self.vendor {
            if want != vendor {
                return false;
            }
        }
        if let Some(want) = &self.nation {
            if *want != tax_name.nation {
                return false;
            }
        }
        if let Some(want) = &self.tax_code {
            if *want != tax_name.tax_code {
                return false;
            }
        }
        if let Some(want) = &self.tax_type {
            if *want != tax_name.tax_type {
                return false;
            }
        }
        if let Some(range) = self.seq_range {
            if !range.contains(seq_no) {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
