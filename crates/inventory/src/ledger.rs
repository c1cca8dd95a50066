use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;

use stockroom_core::{DomainError, DomainResult, Entity, EntryId, OrderId, Serial, Sku};

use crate::event::{
    EntryCreated, EntryRemoved, InventoryEvent, OrderReleased, OrderReserved, QuantitySet,
    StockAdded, StockDecreased,
};
use crate::item::{CatalogEntry, ComponentLine, NewEntry, SKU_SLOTS, SkuSlot};
use crate::reservation::ReservationBook;
use crate::resolver::BomCache;

/// On-hand stock per catalog entry.
///
/// The ledger owns every entry (arena keyed by [`EntryId`]) together with:
///
/// - four lookup indices (serial + one per SKU slot), only ever touched by
///   [`register`](Self::register) / [`unregister`](Self::unregister)
/// - the composes-into index, only ever touched by
///   [`replace_composition`](Self::replace_composition) and the removal cascade
/// - the single-unit BOM cache used by the resolver
/// - a shared [`ReservationBook`]
///
/// An entry with quantity 0 still exists; absence means "does not exist".
#[derive(Debug)]
pub struct InventoryLedger {
    entries: HashMap<EntryId, CatalogEntry>,
    quantities: HashMap<EntryId, i64>,
    by_serial: HashMap<Serial, EntryId>,
    by_sku: [HashMap<Sku, EntryId>; SKU_SLOTS],
    composes_into: HashMap<EntryId, BTreeSet<EntryId>>,
    reservations: Arc<ReservationBook>,
    pub(crate) bom_cache: BomCache,
    next_id: EntryId,
}

impl Default for InventoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryLedger {
    pub fn new() -> Self {
        Self::with_reservations(Arc::new(ReservationBook::new()))
    }

    /// Build a ledger around an existing (possibly shared) reservation book.
    pub fn with_reservations(reservations: Arc<ReservationBook>) -> Self {
        Self {
            entries: HashMap::new(),
            quantities: HashMap::new(),
            by_serial: HashMap::new(),
            by_sku: Default::default(),
            composes_into: HashMap::new(),
            reservations,
            bom_cache: BomCache::default(),
            next_id: EntryId::from_raw(1),
        }
    }

    pub fn reservations(&self) -> Arc<ReservationBook> {
        Arc::clone(&self.reservations)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn ensure_registered(&self, id: EntryId) -> DomainResult<()> {
        if self.entries.contains_key(&id) {
            Ok(())
        } else {
            Err(DomainError::unknown_entry(id.to_string()))
        }
    }

    pub fn entry(&self, id: EntryId) -> DomainResult<&CatalogEntry> {
        self.entries
            .get(&id)
            .ok_or_else(|| DomainError::unknown_entry(id.to_string()))
    }

    /// Mutable access for name / trigger / icon edits. Serial, SKUs and composition
    /// have no public setters on the entry; change them through the ledger.
    pub fn entry_mut(&mut self, id: EntryId) -> DomainResult<&mut CatalogEntry> {
        self.entries
            .get_mut(&id)
            .ok_or_else(|| DomainError::unknown_entry(id.to_string()))
    }

    pub fn serial_of(&self, id: EntryId) -> DomainResult<&Serial> {
        self.entry(id).map(CatalogEntry::serial)
    }

    pub fn find_by_serial(&self, serial: &Serial) -> Option<EntryId> {
        self.by_serial.get(serial).copied()
    }

    /// Look a SKU up in every slot.
    pub fn find_by_sku(&self, sku: &Sku) -> Option<EntryId> {
        self.by_sku.iter().find_map(|index| index.get(sku).copied())
    }

    pub fn find_by_sku_in(&self, slot: SkuSlot, sku: &Sku) -> Option<EntryId> {
        self.by_sku[slot.index()].get(sku).copied()
    }

    /// All entries, ordered by serial.
    pub fn entries(&self) -> Vec<(EntryId, &CatalogEntry)> {
        let mut all: Vec<_> = self.entries.iter().map(|(id, e)| (*id, e)).collect();
        all.sort_by(|a, b| a.1.id().cmp(b.1.id()));
        all
    }

    /// Entries that list `id` directly as a component.
    pub fn composes_into(&self, id: EntryId) -> BTreeSet<EntryId> {
        self.composes_into.get(&id).cloned().unwrap_or_default()
    }

    /// Entries that contain `id` directly or transitively.
    pub fn ancestors(&self, id: EntryId) -> BTreeSet<EntryId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if let Some(parents) = self.composes_into.get(&current) {
                for parent in parents {
                    if seen.insert(*parent) {
                        queue.push_back(*parent);
                    }
                }
            }
        }
        seen
    }

    // ---------------------------------------------------------------------
    // Quantities
    // ---------------------------------------------------------------------

    /// On-hand quantity; 0 for unknown entries.
    pub fn quantity(&self, id: EntryId) -> i64 {
        self.quantities.get(&id).copied().unwrap_or(0)
    }

    /// On-hand minus everything reserved for orders. May be negative when more is
    /// promised than is on the shelf.
    pub fn available_quantity(&self, id: EntryId) -> DomainResult<i64> {
        self.ensure_registered(id)?;
        Ok(self.quantity(id) - self.reservations.reserved(id))
    }

    pub fn add_amount(&mut self, id: EntryId, amount: i64) -> DomainResult<InventoryEvent> {
        if amount < 0 {
            return Err(DomainError::validation("amount cannot be negative"));
        }
        let quantity_after = self.adjust(id, amount)?;
        Ok(InventoryEvent::StockAdded(StockAdded {
            serial: self.serial_of(id)?.clone(),
            amount,
            quantity_after,
            occurred_at: Utc::now(),
        }))
    }

    /// Decrease on-hand stock, clamping at zero. The event reports how much was
    /// actually taken off.
    pub fn decrease_amount(&mut self, id: EntryId, amount: i64) -> DomainResult<InventoryEvent> {
        if amount < 0 {
            return Err(DomainError::validation("amount cannot be negative"));
        }
        self.ensure_registered(id)?;
        let applied = amount.min(self.quantity(id));
        let quantity_after = self.adjust(id, -applied)?;
        Ok(InventoryEvent::StockDecreased(StockDecreased {
            serial: self.serial_of(id)?.clone(),
            requested: amount,
            applied,
            quantity_after,
            occurred_at: Utc::now(),
        }))
    }

    pub fn set_quantity(&mut self, id: EntryId, quantity: i64) -> DomainResult<InventoryEvent> {
        if quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        self.ensure_registered(id)?;
        let before = self.quantity(id);
        self.quantities.insert(id, quantity);
        Ok(InventoryEvent::QuantitySet(QuantitySet {
            serial: self.serial_of(id)?.clone(),
            before,
            after: quantity,
            occurred_at: Utc::now(),
        }))
    }

    /// Apply a signed delta. Never lets a quantity go below zero.
    pub(crate) fn adjust(&mut self, id: EntryId, delta: i64) -> DomainResult<i64> {
        let quantity = self
            .quantities
            .get_mut(&id)
            .ok_or_else(|| DomainError::unknown_entry(id.to_string()))?;
        let next = quantity
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;
        if next < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        *quantity = next;
        Ok(next)
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    /// Insert an entry into the arena and all four indices.
    pub fn register(&mut self, entry: CatalogEntry, quantity: i64) -> DomainResult<EntryId> {
        if quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        if entry.serial().as_str().trim().is_empty() {
            return Err(DomainError::invalid_id("Serial: empty"));
        }
        if self.by_serial.contains_key(entry.serial()) {
            return Err(DomainError::conflict(format!(
                "serial {} is already registered",
                entry.serial()
            )));
        }
        let mut seen = BTreeSet::new();
        for sku in entry.skus().iter().flatten() {
            if self.find_by_sku(sku).is_some() || !seen.insert(sku) {
                return Err(DomainError::conflict(format!("SKU {sku} is already in use")));
            }
        }

        let id = self.next_id;
        self.next_id = id.next();

        self.by_serial.insert(entry.serial().clone(), id);
        for slot in SkuSlot::ALL {
            if let Some(sku) = entry.sku(slot) {
                self.by_sku[slot.index()].insert(sku.clone(), id);
            }
        }
        self.quantities.insert(id, quantity);
        self.entries.insert(id, entry);
        Ok(id)
    }

    /// Remove an entry from the arena and all four indices.
    ///
    /// This is the raw index routine: the entry must no longer take part in any
    /// composition. [`remove_entry`](Self::remove_entry) performs the full cascade.
    pub fn unregister(&mut self, id: EntryId) -> DomainResult<(CatalogEntry, i64)> {
        let entry = self.entry(id)?;
        if entry.is_composite() || self.composes_into.contains_key(&id) {
            return Err(DomainError::invariant(format!(
                "{} is still linked in a composition",
                entry.serial()
            )));
        }

        let entry = self
            .entries
            .remove(&id)
            .ok_or_else(|| DomainError::unknown_entry(id.to_string()))?;
        self.by_serial.remove(entry.serial());
        for slot in SkuSlot::ALL {
            if let Some(sku) = entry.sku(slot) {
                self.by_sku[slot.index()].remove(sku);
            }
        }
        let quantity = self.quantities.remove(&id).unwrap_or(0);
        Ok((entry, quantity))
    }

    /// Assign (or clear) the SKU of one slot, keeping the slot index in step.
    pub fn set_sku(&mut self, id: EntryId, slot: SkuSlot, sku: Option<Sku>) -> DomainResult<()> {
        self.ensure_registered(id)?;
        if let Some(sku) = &sku {
            let taken_elsewhere = SkuSlot::ALL.iter().any(|other| {
                self.find_by_sku_in(*other, sku)
                    .is_some_and(|owner| owner != id || *other != slot)
            });
            if taken_elsewhere {
                return Err(DomainError::conflict(format!("SKU {sku} is already in use")));
            }
        }

        let entry = self.entry_mut(id)?;
        let previous = entry.sku(slot).cloned();
        entry.set_sku(slot, sku.clone());

        let index = &mut self.by_sku[slot.index()];
        if let Some(previous) = previous {
            index.remove(&previous);
        }
        if let Some(sku) = sku {
            index.insert(sku, id);
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Create a new entry, or restock the existing one when the serial or any of the
    /// given SKUs is already known.
    pub fn create_entry(&mut self, new: NewEntry) -> DomainResult<(EntryId, InventoryEvent)> {
        if new.serial.as_str().trim().is_empty() {
            return Err(DomainError::invalid_id("Serial: empty"));
        }
        if new.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if new.initial_quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }

        let existing = self
            .find_by_serial(&new.serial)
            .or_else(|| new.skus.iter().flatten().find_map(|sku| self.find_by_sku(sku)));
        if let Some(id) = existing {
            let event = self.add_amount(id, new.initial_quantity)?;
            return Ok((id, event));
        }

        let lines = self.merge_lines(None, new.composition.iter().copied())?;

        let mut entry = CatalogEntry::new(new.serial.clone(), new.name.clone());
        entry.set_low_stock_trigger(new.low_stock_trigger)?;
        entry.set_icon(new.icon.clone());
        for slot in SkuSlot::ALL {
            entry.set_sku(slot, new.skus[slot.index()].clone());
        }

        let id = self.register(entry, new.initial_quantity)?;
        let edges = lines.into_iter().map(|line| (line.component, line.quantity));
        if let Err(err) = self.replace_composition(id, edges) {
            self.unregister(id)?;
            return Err(err);
        }

        Ok((
            id,
            InventoryEvent::EntryCreated(EntryCreated {
                serial: new.serial,
                name: new.name,
                quantity: new.initial_quantity,
                occurred_at: Utc::now(),
            }),
        ))
    }

    /// Remove an entry: composition edges on both sides are cleared, reservations are
    /// dropped and the entry leaves every index.
    pub fn remove_entry(&mut self, id: EntryId) -> DomainResult<InventoryEvent> {
        let serial = self.serial_of(id)?.clone();
        self.invalidate_bom(id);

        let parents = self.composes_into.remove(&id).unwrap_or_default();
        for parent in parents {
            if let Some(entry) = self.entries.get_mut(&parent) {
                entry.detach_component(id, &serial);
            }
        }

        let components: Vec<EntryId> = self
            .entry(id)?
            .composition()
            .iter()
            .map(|line| line.component)
            .collect();
        for component in components {
            self.unlink(component, id);
        }
        self.entry_mut(id)?.set_composition(Vec::new(), Vec::new());

        self.reservations.clear_entry(id)?;
        let (entry, quantity) = self.unregister(id)?;

        Ok(InventoryEvent::EntryRemoved(EntryRemoved {
            serial,
            name: entry.name().to_string(),
            quantity,
            icon: entry.icon().map(str::to_string),
            occurred_at: Utc::now(),
        }))
    }

    // ---------------------------------------------------------------------
    // Composition
    // ---------------------------------------------------------------------

    /// Replace the composition of `id`.
    ///
    /// Unknown or self-referencing components and non-positive quantities are dropped,
    /// duplicates are merged by summing. A composition that would make the graph
    /// cyclic is rejected and nothing changes.
    pub fn replace_composition<I>(&mut self, id: EntryId, lines: I) -> DomainResult<()>
    where
        I: IntoIterator<Item = (EntryId, i64)>,
    {
        self.ensure_registered(id)?;
        let merged = self.merge_lines(Some(id), lines)?;

        let ancestors = self.ancestors(id);
        if let Some(line) = merged.iter().find(|line| ancestors.contains(&line.component)) {
            return Err(DomainError::validation(format!(
                "{} already contains {}; composition would be cyclic",
                self.serial_of(line.component)?,
                self.serial_of(id)?
            )));
        }

        let mut saved = Vec::with_capacity(merged.len());
        for line in &merged {
            saved.push((self.serial_of(line.component)?.clone(), line.quantity));
        }

        self.invalidate_bom(id);

        let previous: Vec<EntryId> = self
            .entry(id)?
            .composition()
            .iter()
            .map(|line| line.component)
            .collect();
        for component in previous {
            self.unlink(component, id);
        }
        for line in &merged {
            self.composes_into.entry(line.component).or_default().insert(id);
        }

        self.entry_mut(id)?.set_composition(merged, saved);
        Ok(())
    }

    /// Drop unknown or self-referencing components and non-positive quantities, and
    /// sum duplicates. First-seen order is kept.
    fn merge_lines<I>(&self, owner: Option<EntryId>, lines: I) -> DomainResult<Vec<ComponentLine>>
    where
        I: IntoIterator<Item = (EntryId, i64)>,
    {
        let mut merged: Vec<ComponentLine> = Vec::new();
        for (component, quantity) in lines {
            if Some(component) == owner || quantity <= 0 || !self.entries.contains_key(&component) {
                continue;
            }
            match merged.iter_mut().find(|line| line.component == component) {
                Some(line) => {
                    line.quantity = line
                        .quantity
                        .checked_add(quantity)
                        .ok_or_else(|| DomainError::validation("component quantity overflow"))?;
                }
                None => merged.push(ComponentLine { component, quantity }),
            }
        }
        Ok(merged)
    }

    fn unlink(&mut self, component: EntryId, parent: EntryId) {
        if let Some(parents) = self.composes_into.get_mut(&component) {
            parents.remove(&parent);
            if parents.is_empty() {
                self.composes_into.remove(&component);
            }
        }
    }

    /// Forget cached flattenings of `id` and everything built from it.
    fn invalidate_bom(&self, id: EntryId) {
        let mut stale = self.ancestors(id);
        stale.insert(id);
        self.bom_cache.invalidate(stale);
    }

    // ---------------------------------------------------------------------
    // Reservations
    // ---------------------------------------------------------------------

    /// Reserve stock for an order. All lines are validated before any is booked.
    pub fn reserve_for_order(
        &self,
        order_id: &OrderId,
        lines: &[(EntryId, i64)],
    ) -> DomainResult<InventoryEvent> {
        let mut booked = Vec::with_capacity(lines.len());
        for (id, quantity) in lines {
            if *quantity <= 0 {
                return Err(DomainError::validation("reserved quantity must be positive"));
            }
            booked.push((self.serial_of(*id)?.clone(), *quantity));
        }
        for (id, quantity) in lines {
            self.reservations.reserve(order_id, *id, *quantity)?;
        }
        Ok(InventoryEvent::OrderReserved(OrderReserved {
            order_id: order_id.clone(),
            lines: booked,
            occurred_at: Utc::now(),
        }))
    }

    /// Release an order's reservations on `entries`, or on every entry when the
    /// slice is empty.
    pub fn release_for_order(
        &self,
        order_id: &OrderId,
        entries: &[EntryId],
    ) -> DomainResult<InventoryEvent> {
        for id in entries {
            self.ensure_registered(*id)?;
        }

        let released: Vec<(EntryId, i64)> = if entries.is_empty() {
            self.reservations.release_order(order_id)?
        } else {
            let mut released = Vec::new();
            for id in entries {
                if let Some(quantity) = self.reservations.release(order_id, *id)? {
                    released.push((*id, quantity));
                }
            }
            released
        };

        let mut lines = Vec::with_capacity(released.len());
        for (id, quantity) in released {
            lines.push((self.serial_of(id)?.clone(), quantity));
        }
        Ok(InventoryEvent::OrderReleased(OrderReleased {
            order_id: order_id.clone(),
            lines,
            occurred_at: Utc::now(),
        }))
    }
}
