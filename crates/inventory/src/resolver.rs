//! Read-only composition queries over the ledger.
//!
//! - **Flattening** expands a composite down to its non-composite leaves.
//! - **Sufficiency** asks whether available stock (directly, or by composing from
//!   components) covers a request, and if not, which leaves are short.
//! - **Breakdown search** looks for small sets of finished composites that, broken
//!   back into parts, would cover the shortfall.
//!
//! Nothing here mutates quantities. The only interior state is the single-unit
//! flattening cache, which the ledger invalidates on every composition change.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, EntryId};

use crate::ledger::InventoryLedger;

/// Leaf entry → quantity.
pub type BaseParts = BTreeMap<EntryId, i64>;

/// Composite entry → number of units to break down.
pub type BreakdownSolution = BTreeMap<EntryId, i64>;

/// Bounds for [`InventoryLedger::find_breakdown_solutions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchLimits {
    /// Largest number of distinct composites combined in one solution.
    pub max_combination_size: usize,
    /// Stop once this many solutions were accepted.
    pub max_solutions: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_combination_size: 10,
            max_solutions: 5,
        }
    }
}

/// Memoised single-unit flattenings, keyed by entry.
#[derive(Debug, Default)]
pub(crate) struct BomCache {
    units: RwLock<HashMap<EntryId, Arc<BaseParts>>>,
}

impl BomCache {
    fn get(&self, id: EntryId) -> Option<Arc<BaseParts>> {
        self.units.read().ok()?.get(&id).cloned()
    }

    fn insert(&self, id: EntryId, parts: Arc<BaseParts>) {
        if let Ok(mut units) = self.units.write() {
            units.insert(id, parts);
        }
    }

    pub(crate) fn invalidate(&self, ids: impl IntoIterator<Item = EntryId>) {
        if let Ok(mut units) = self.units.write() {
            for id in ids {
                units.remove(&id);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: EntryId) -> bool {
        self.units.read().map(|u| u.contains_key(&id)).unwrap_or(false)
    }
}

impl InventoryLedger {
    /// Expand `id` into its non-composite leaves, scaled by `amount`.
    ///
    /// A non-composite entry flattens to itself.
    pub fn flatten_to_base_parts(&self, id: EntryId, amount: i64) -> DomainResult<BaseParts> {
        if amount < 0 {
            return Err(DomainError::validation("amount cannot be negative"));
        }
        let unit = self.unit_base_parts(id)?;
        if amount == 0 {
            return Ok(BaseParts::new());
        }
        unit.iter()
            .map(|(leaf, quantity)| {
                quantity
                    .checked_mul(amount)
                    .map(|scaled| (*leaf, scaled))
                    .ok_or_else(|| DomainError::validation("quantity overflow"))
            })
            .collect()
    }

    fn unit_base_parts(&self, id: EntryId) -> DomainResult<Arc<BaseParts>> {
        if let Some(cached) = self.bom_cache.get(id) {
            return Ok(cached);
        }

        let entry = self.entry(id)?;
        let mut parts = BaseParts::new();
        if entry.is_composite() {
            for line in entry.composition() {
                let sub = self.unit_base_parts(line.component)?;
                for (leaf, quantity) in sub.iter() {
                    let add = quantity
                        .checked_mul(line.quantity)
                        .ok_or_else(|| DomainError::validation("quantity overflow"))?;
                    let slot = parts.entry(*leaf).or_insert(0);
                    *slot = slot
                        .checked_add(add)
                        .ok_or_else(|| DomainError::validation("quantity overflow"))?;
                }
            }
        } else {
            parts.insert(id, 1);
        }

        let parts = Arc::new(parts);
        self.bom_cache.insert(id, Arc::clone(&parts));
        Ok(parts)
    }

    /// True if available stock covers `quantity`, or, for composites, if every
    /// component can cover `shortfall × edge quantity` (recursively).
    pub fn is_sufficient_recursive(&self, id: EntryId, quantity: i64) -> DomainResult<bool> {
        let available = self.available_quantity(id)?;
        if available >= quantity {
            return Ok(true);
        }

        let entry = self.entry(id)?;
        if !entry.is_composite() {
            return Ok(false);
        }

        let shortfall = quantity - available;
        for line in entry.composition() {
            let needed = shortfall
                .checked_mul(line.quantity)
                .ok_or_else(|| DomainError::validation("quantity overflow"))?;
            if !self.is_sufficient_recursive(line.component, needed)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Leaf-level shortfall for `quantity` units of `id`.
    ///
    /// Only non-composite entries with a positive missing amount appear. Empty when
    /// the entry is already sufficient.
    pub fn missing_recursive(&self, id: EntryId, quantity: i64) -> DomainResult<BaseParts> {
        let mut missing = BaseParts::new();
        self.collect_missing(id, quantity, &mut missing)?;
        Ok(missing)
    }

    fn collect_missing(&self, id: EntryId, quantity: i64, missing: &mut BaseParts) -> DomainResult<()> {
        let available = self.available_quantity(id)?;
        if available >= quantity {
            return Ok(());
        }

        let shortfall = quantity - available;
        let entry = self.entry(id)?;
        if !entry.is_composite() {
            *missing.entry(id).or_insert(0) += shortfall;
            return Ok(());
        }

        for line in entry.composition() {
            let needed = shortfall
                .checked_mul(line.quantity)
                .ok_or_else(|| DomainError::validation("quantity overflow"))?;
            self.collect_missing(line.component, needed, missing)?;
        }
        Ok(())
    }

    /// Suggest sets of finished composites whose breakdown would cover the leaf
    /// shortfall of `amount` units of `id`.
    ///
    /// Each solution breaks every listed composite once. Solutions are minimal with
    /// respect to earlier (smaller) ones: a superset of an accepted solution is never
    /// reported. Candidates are visited in serial order, so results are stable.
    pub fn find_breakdown_solutions(
        &self,
        id: EntryId,
        amount: i64,
        limits: SearchLimits,
    ) -> DomainResult<Vec<BreakdownSolution>> {
        let missing = self.missing_recursive(id, amount)?;
        if missing.is_empty() || limits.max_solutions == 0 {
            return Ok(Vec::new());
        }

        let mut candidates = BTreeSet::new();
        for leaf in missing.keys() {
            let mut producers = self.ancestors(*leaf);
            producers.remove(&id);
            if producers.is_empty() {
                // Nothing in the catalog can ever yield this part.
                return Ok(Vec::new());
            }
            candidates.extend(producers);
        }

        // A member must itself be on hand to be broken down.
        let mut pool: Vec<(EntryId, Arc<BaseParts>)> = Vec::new();
        for candidate in candidates {
            if self.available_quantity(candidate)? >= 1 {
                pool.push((candidate, self.unit_base_parts(candidate)?));
            }
        }
        pool.sort_by(|a, b| {
            let sa = self.entry(a.0).map(|e| e.serial().clone()).ok();
            let sb = self.entry(b.0).map(|e| e.serial().clone()).ok();
            sa.cmp(&sb)
        });

        let mut accepted: Vec<Vec<usize>> = Vec::new();
        let largest = limits.max_combination_size.min(pool.len());

        for size in 1..=largest {
            let mut indices: Vec<usize> = (0..size).collect();
            loop {
                let is_superset = accepted
                    .iter()
                    .any(|solution| solution.iter().all(|i| indices.contains(i)));

                if !is_superset && covers(&missing, indices.iter().map(|i| pool[*i].1.as_ref())) {
                    accepted.push(indices.clone());
                    if accepted.len() >= limits.max_solutions {
                        return Ok(to_solutions(&pool, &accepted));
                    }
                }

                if !next_combination(&mut indices, pool.len()) {
                    break;
                }
            }
        }

        Ok(to_solutions(&pool, &accepted))
    }
}

fn covers<'a>(missing: &BaseParts, yields: impl Iterator<Item = &'a BaseParts> + Clone) -> bool {
    missing.iter().all(|(leaf, needed)| {
        let produced: i64 = yields.clone().filter_map(|parts| parts.get(leaf)).sum();
        produced >= *needed
    })
}

fn to_solutions(pool: &[(EntryId, Arc<BaseParts>)], accepted: &[Vec<usize>]) -> Vec<BreakdownSolution> {
    accepted
        .iter()
        .map(|indices| indices.iter().map(|i| (pool[*i].0, 1)).collect())
        .collect()
}

/// Advance `indices` to the next k-combination of `0..n` in lexicographic order.
fn next_combination(indices: &mut [usize], n: usize) -> bool {
    let k = indices.len();
    let mut i = k;
    while i > 0 {
        i -= 1;
        if indices[i] < n - k + i {
            indices[i] += 1;
            for j in i + 1..k {
                indices[j] = indices[j - 1] + 1;
            }
            return true;
        }
    }
    false
}
