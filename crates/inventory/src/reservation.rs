//! Per-order reservations.
//!
//! The book is the one structure that a background marketplace poller may write to
//! while the ledger is owned by another thread, so it carries its own lock and is
//! shared through an `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use stockroom_core::{DomainError, DomainResult, EntryId, OrderId};

#[derive(Debug, Default)]
pub struct ReservationBook {
    inner: RwLock<HashMap<EntryId, BTreeMap<OrderId, i64>>>,
}

impl ReservationBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `quantity` to the reservation row of (`order_id`, `entry`).
    pub fn reserve(&self, order_id: &OrderId, entry: EntryId, quantity: i64) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation("reserved quantity must be positive"));
        }
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::invariant("reservation lock poisoned"))?;
        let row = map.entry(entry).or_default().entry(order_id.clone()).or_insert(0);
        *row = row
            .checked_add(quantity)
            .ok_or_else(|| DomainError::validation("reserved quantity overflow"))?;
        Ok(())
    }

    /// Remove the reservation row of (`order_id`, `entry`), returning what it held.
    ///
    /// Releasing the last row of an entry drops the entry's bucket entirely.
    pub fn release(&self, order_id: &OrderId, entry: EntryId) -> DomainResult<Option<i64>> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::invariant("reservation lock poisoned"))?;
        let Some(bucket) = map.get_mut(&entry) else {
            return Ok(None);
        };
        let released = bucket.remove(order_id);
        if bucket.is_empty() {
            map.remove(&entry);
        }
        Ok(released)
    }

    /// Remove every row held by `order_id`.
    pub fn release_order(&self, order_id: &OrderId) -> DomainResult<Vec<(EntryId, i64)>> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::invariant("reservation lock poisoned"))?;
        let mut released = Vec::new();
        map.retain(|entry, bucket| {
            if let Some(quantity) = bucket.remove(order_id) {
                released.push((*entry, quantity));
            }
            !bucket.is_empty()
        });
        released.sort();
        Ok(released)
    }

    /// Drop every reservation on `entry` (the entry is being removed).
    pub fn clear_entry(&self, entry: EntryId) -> DomainResult<()> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| DomainError::invariant("reservation lock poisoned"))?;
        map.remove(&entry);
        Ok(())
    }

    /// Total reserved across all orders for `entry`.
    pub fn reserved(&self, entry: EntryId) -> i64 {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return 0,
        };
        map.get(&entry).map(|bucket| bucket.values().sum()).unwrap_or(0)
    }

    pub fn reservations_for(&self, entry: EntryId) -> BTreeMap<OrderId, i64> {
        self.inner
            .read()
            .ok()
            .and_then(|map| map.get(&entry).cloned())
            .unwrap_or_default()
    }

    pub fn has_bucket(&self, entry: EntryId) -> bool {
        self.inner
            .read()
            .map(|map| map.contains_key(&entry))
            .unwrap_or(false)
    }
}
