//! # Tax Limiting
//!
//! Removes candidates that a government limit forbids from co-existing,
//! after validation and before calculation.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  overlap pass      details sharing a limit group may not overlap on     │
//! │                    the geo path; the earlier application wins           │
//! │  AY cross-scan     tax code AY is additionally checked against every    │
//! │                    already-validated AY payment of the itinerary        │
//! │  count pass        application_limit caps non-failed applications,     │
//! │                    later tax points lose                                │
//! │  YQYR pass         each surcharge usage is claimed by one detail;       │
//! │                    later claims are failed per-entry                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "Removing" a candidate means failing its itinerary category (or the
//! individual YQYR entry); the detail stays in the arena for diagnostics.

use std::collections::{HashMap, HashSet};

use skyfare_core::{TaxCode, TaxName};

use crate::catalog::LimitGroup;
use crate::payment::{PaymentWithRules, RawPayments};

/// Tax code with itinerary-wide cross-application limits.
const CROSS_SCAN_CODE: &str = "AY";

// =============================================================================
// Geo Range
// =============================================================================

/// Normalized [lo, hi] geo range of a detail; arrival details store their
/// tax points backwards.
#[derive(Debug, Clone, Copy)]
struct GeoRange {
    lo: usize,
    hi: usize,
}

impl GeoRange {
    fn of(begin: usize, end: usize) -> GeoRange {
        GeoRange {
            lo: begin.min(end),
            hi: begin.max(end),
        }
    }

    fn overlaps(self, other: GeoRange) -> bool {
        self.lo <= other.hi && other.lo <= self.hi
    }
}

// =============================================================================
// Tax Limiter
// =============================================================================

/// Stateless limiting passes over one (itinerary, tax) candidate set.
pub struct TaxLimiter;

impl TaxLimiter {
    /// Runs every limiting pass, mutating failure flags in the arena.
    pub fn limit_tax(tax_name: &TaxName, raw: &mut RawPayments, candidates: &[PaymentWithRules]) {
        Self::overlap_itinerary(tax_name, raw, candidates);
        Self::limit_applications(raw, candidates);
        Self::overlap_yqyrs(raw, candidates);
    }

    /// Overlap check per limit group. For the cross-scan tax code the
    /// accepted set is seeded with every already-validated, non-failed
    /// payment of the same code anywhere in the itinerary.
    fn overlap_itinerary(
        tax_name: &TaxName,
        raw: &mut RawPayments,
        candidates: &[PaymentWithRules],
    ) {
        let cross_scan = tax_name.tax_code == TaxCode::new(CROSS_SCAN_CODE);
        let candidate_indices: HashSet<usize> = candidates.iter().map(|c| c.index).collect();

        // key None = the single code-wide group used by the cross-scan.
        let mut accepted: HashMap<Option<LimitGroup>, Vec<GeoRange>> = HashMap::new();

        if cross_scan {
            let seeded: Vec<GeoRange> = (0..raw.len())
                .filter(|i| !candidate_indices.contains(i))
                .map(|i| raw.get(i))
                .filter(|d| d.tax_name.tax_code == tax_name.tax_code)
                .filter(|d| d.is_validated() && !d.is_failed())
                .map(|d| GeoRange::of(d.tax_point_begin, d.tax_point_end))
                .collect();
            accepted.insert(None, seeded);
        }

        for candidate in candidates {
            let detail = raw.get(candidate.index);
            if !detail.is_validated() || detail.is_itinerary_failed() {
                continue;
            }
            let group = if cross_scan { None } else { detail.limit_group };
            if group.is_none() && !cross_scan {
                // No limit group: never overlap-checked.
                continue;
            }
            let range = GeoRange::of(detail.tax_point_begin, detail.tax_point_end);
            let slot = accepted.entry(group).or_default();
            if slot.iter().any(|prior| prior.overlaps(range)) {
                raw.get_mut(candidate.index).fail_itinerary();
            } else {
                slot.push(range);
            }
        }
    }

    /// Caps the number of non-failed applications; candidates arrive in
    /// geographic order, so the later tax points lose.
    fn limit_applications(raw: &mut RawPayments, candidates: &[PaymentWithRules]) {
        let mut applied: u32 = 0;
        for candidate in candidates {
            let detail = raw.get(candidate.index);
            if !detail.is_validated() || detail.is_itinerary_failed() {
                continue;
            }
            let Some(limit) = detail.application_limit else {
                continue;
            };
            if applied >= limit {
                raw.get_mut(candidate.index).fail_itinerary();
            } else {
                applied += 1;
            }
        }
    }

    /// Each YQYR usage may fund at most one detail of this tax; the first
    /// claim wins, later entries are failed individually.
    fn overlap_yqyrs(raw: &mut RawPayments, candidates: &[PaymentWithRules]) {
        let mut claimed: HashSet<usize> = HashSet::new();
        for candidate in candidates {
            let detail = raw.get_mut(candidate.index);
            if !detail.is_validated() {
                continue;
            }
            for yqyr in &mut detail.yqyrs {
                if yqyr.failed {
                    continue;
                }
                if !claimed.insert(yqyr.usage_index) {
                    yqyr.failed = true;
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
