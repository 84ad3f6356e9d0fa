//! # Processing Orderer
//!
//! Orders taxes into evaluation batches so that any tax taxing on top of
//! another runs after it.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   add_value(key, tax)    register a tax under its (code, type) key      │
//! │   add_catch_all(tax)     divert a tax-on-tax tax to the final group     │
//! │   add_edge(key, dep)     "key taxes on top of dep"                      │
//! │   commit()               resolve edges (wildcard keys), freeze graph    │
//! │   next_batch()*          taxes with no unemitted predecessors,          │
//! │                          registration order; catch-all group last;      │
//! │                          empty batch = exhausted                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Edges to unregistered keys are dropped (bad catalog data never halts
//! computation). A genuine dependency cycle would starve the batch loop, so
//! a stalled graph is flushed as one final batch in registration order with
//! a warning.

use std::collections::HashSet;

use tracing::{debug, warn};

use skyfare_core::TaxKey;

use crate::catalog::TaxValue;
use crate::error::{TaxError, TaxResult};

// =============================================================================
// Graph Entry
// =============================================================================

#[derive(Debug)]
struct Entry {
    key: TaxKey,
    taxes: Vec<TaxValue>,
    /// Indices of predecessor entries that must be emitted first.
    preds: HashSet<usize>,
    emitted: bool,
}

// =============================================================================
// Processing Orderer
// =============================================================================

/// Dependency-ordered batching of tax identities.
#[derive(Debug, Default)]
pub struct ProcessingOrderer {
    entries: Vec<Entry>,
    catch_all: Vec<TaxValue>,
    /// (dependent, predecessor) pairs collected before commit.
    pending_edges: Vec<(TaxKey, TaxKey)>,
    committed: bool,
    catch_all_emitted: bool,
}

impl ProcessingOrderer {
    pub fn new() -> Self {
        ProcessingOrderer::default()
    }

    /// Registers a tax under its key. Taxes sharing an exact key are
    /// batched together.
    pub fn add_value(&mut self, key: TaxKey, tax: TaxValue) -> TaxResult<()> {
        if self.committed {
            return Err(TaxError::OrdererMisuse("add_value after commit"));
        }
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.taxes.push(tax);
        } else {
            self.entries.push(Entry {
                key,
                taxes: vec![tax],
                preds: HashSet::new(),
                emitted: false,
            });
        }
        Ok(())
    }

    /// Diverts a tax-on-tax tax into the unordered final group; its edges,
    /// if any, are ignored.
    pub fn add_catch_all(&mut self, tax: TaxValue) -> TaxResult<()> {
        if self.committed {
            return Err(TaxError::OrdererMisuse("add_catch_all after commit"));
        }
        self.catch_all.push(tax);
        Ok(())
    }

    /// Records "`key` taxes on top of `dependee`".
    pub fn add_edge(&mut self, key: TaxKey, dependee: TaxKey) -> TaxResult<()> {
        if self.committed {
            return Err(TaxError::OrdererMisuse("add_edge after commit"));
        }
        self.pending_edges.push((key, dependee));
        Ok(())
    }

    /// Resolves pending edges against registered keys with wildcard-aware
    /// matching and freezes the graph. Edges whose ends match no entry are
    /// dropped; self-edges are skipped.
    pub fn commit(&mut self) -> TaxResult<()> {
        if self.committed {
            return Err(TaxError::OrdererMisuse("commit called twice"));
        }
        let edges = std::mem::take(&mut self.pending_edges);
        for (dependent, dependee) in edges {
            let dependents: Vec<usize> = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.key.matches(&dependent))
                .map(|(i, _)| i)
                .collect();
            let dependees: Vec<usize> = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.key.matches(&dependee))
                .map(|(i, _)| i)
                .collect();
            if dependents.is_empty() || dependees.is_empty() {
                debug!(%dependent, %dependee, "dropping unresolvable ordering edge");
                continue;
            }
            for &d in &dependents {
                for &p in &dependees {
                    if d != p {
                        self.entries[d].preds.insert(p);
                    }
                }
            }
        }
        self.committed = true;
        Ok(())
    }

    /// Yields the next batch: every unemitted tax whose predecessors have
    /// all been emitted, in registration order. After the ordered entries
    /// are exhausted the catch-all group is yielded once. An empty batch
    /// means exhaustion.
    pub fn next_batch(&mut self) -> TaxResult<Vec<TaxValue>> {
        if !self.committed {
            return Err(TaxError::OrdererMisuse("next_batch before commit"));
        }

        let ready: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.emitted)
            .filter(|(_, e)| e.preds.iter().all(|&p| self.entries[p].emitted))
            .map(|(i, _)| i)
            .collect();

        let batch_indices = if ready.is_empty() {
            let stalled: Vec<usize> = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| !e.emitted)
                .map(|(i, _)| i)
                .collect();
            if !stalled.is_empty() {
                warn!(
                    taxes = stalled.len(),
                    "dependency cycle among tax ordering edges, flushing remaining taxes"
                );
            }
            stalled
        } else {
            ready
        };

        if batch_indices.is_empty() {
            if !self.catch_all_emitted {
                self.catch_all_emitted = true;
                return Ok(std::mem::take(&mut self.catch_all));
            }
            return Ok(Vec::new());
        }

        let mut batch = Vec::new();
        for i in batch_indices {
            self.entries[i].emitted = true;
            batch.extend(self.entries[i].taxes.iter().cloned());
        }
        Ok(batch)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
