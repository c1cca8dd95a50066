use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, EntryId, Serial, Sku};

/// Number of marketplace SKU slots per entry.
pub const SKU_SLOTS: usize = 3;

/// One of the marketplace SKU slots of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkuSlot {
    First,
    Second,
    Third,
}

impl SkuSlot {
    pub const ALL: [SkuSlot; SKU_SLOTS] = [SkuSlot::First, SkuSlot::Second, SkuSlot::Third];

    pub fn index(self) -> usize {
        match self {
            SkuSlot::First => 0,
            SkuSlot::Second => 1,
            SkuSlot::Third => 2,
        }
    }
}

/// Serial form of a composition: component serial and per-unit quantity, in order.
pub type SavedComposition = Vec<(Serial, i64)>;

/// A resolved composition edge: `quantity` units of `component` per unit of the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentLine {
    pub component: EntryId,
    pub quantity: i64,
}

/// A stock item. Composite when its composition is non-empty.
///
/// Entries are owned by an [`InventoryLedger`](crate::InventoryLedger); composition edges
/// point at other entries by [`EntryId`]. The composition itself can only be changed
/// through the ledger, which keeps the composes-into index and the BOM cache in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    serial: Serial,
    name: String,
    low_stock_trigger: i64,
    skus: [Option<Sku>; SKU_SLOTS],
    icon: Option<String>,
    composition: Vec<ComponentLine>,
    /// Serial mirror of `composition`, in the same order. While loading from saved state
    /// this is the only copy, until references are resolved.
    saved_composition: SavedComposition,
}

impl CatalogEntry {
    pub fn new(serial: Serial, name: impl Into<String>) -> Self {
        Self {
            serial,
            name: name.into(),
            low_stock_trigger: 0,
            skus: Default::default(),
            icon: None,
            composition: Vec::new(),
            saved_composition: Vec::new(),
        }
    }

    pub fn serial(&self) -> &Serial {
        &self.serial
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> DomainResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        self.name = name;
        Ok(())
    }

    /// Quantity at or below which a low-stock alert is raised. 0 disables alerts.
    pub fn low_stock_trigger(&self) -> i64 {
        self.low_stock_trigger
    }

    pub fn set_low_stock_trigger(&mut self, trigger: i64) -> DomainResult<()> {
        if trigger < 0 {
            return Err(DomainError::validation("low-stock trigger cannot be negative"));
        }
        self.low_stock_trigger = trigger;
        Ok(())
    }

    pub fn sku(&self, slot: SkuSlot) -> Option<&Sku> {
        self.skus[slot.index()].as_ref()
    }

    pub fn skus(&self) -> &[Option<Sku>; SKU_SLOTS] {
        &self.skus
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn set_icon(&mut self, icon: Option<String>) {
        self.icon = icon;
    }

    pub fn composition(&self) -> &[ComponentLine] {
        &self.composition
    }

    pub fn saved_composition(&self) -> &[(Serial, i64)] {
        &self.saved_composition
    }

    /// Per-unit quantity of the component with `serial`, read from the serial mirror.
    pub fn saved_quantity(&self, serial: &Serial) -> Option<i64> {
        self.saved_composition
            .iter()
            .find(|(component, _)| component == serial)
            .map(|(_, quantity)| *quantity)
    }

    /// Per-unit quantity of `component`, if it is part of this entry.
    pub fn component_quantity(&self, component: EntryId) -> Option<i64> {
        self.composition
            .iter()
            .find(|line| line.component == component)
            .map(|line| line.quantity)
    }

    pub fn is_composite(&self) -> bool {
        !self.composition.is_empty()
    }

    /// True when the entry was loaded with serial references that are not yet linked.
    pub fn has_unresolved_composition(&self) -> bool {
        self.composition.is_empty() && !self.saved_composition.is_empty()
    }

    pub(crate) fn set_sku(&mut self, slot: SkuSlot, sku: Option<Sku>) {
        self.skus[slot.index()] = sku;
    }

    pub(crate) fn set_composition(&mut self, lines: Vec<ComponentLine>, saved: SavedComposition) {
        self.composition = lines;
        self.saved_composition = saved;
    }

    pub(crate) fn set_saved_composition(&mut self, saved: SavedComposition) {
        self.saved_composition = saved;
    }

    /// Drop every edge to `component` (used when that entry is removed).
    pub(crate) fn detach_component(&mut self, component: EntryId, serial: &Serial) {
        self.composition.retain(|line| line.component != component);
        self.saved_composition.retain(|(component, _)| component != serial);
    }
}

impl Entity for CatalogEntry {
    type Id = Serial;

    fn id(&self) -> &Self::Id {
        &self.serial
    }
}

/// Input for [`InventoryLedger::create_entry`](crate::InventoryLedger::create_entry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub serial: Serial,
    pub name: String,
    pub low_stock_trigger: i64,
    pub composition: Vec<(EntryId, i64)>,
    pub icon: Option<String>,
    pub skus: [Option<Sku>; SKU_SLOTS],
    pub initial_quantity: i64,
}

impl NewEntry {
    pub fn new(serial: Serial, name: impl Into<String>) -> Self {
        Self {
            serial,
            name: name.into(),
            low_stock_trigger: 0,
            composition: Vec::new(),
            icon: None,
            skus: Default::default(),
            initial_quantity: 0,
        }
    }

    pub fn with_low_stock_trigger(mut self, trigger: i64) -> Self {
        self.low_stock_trigger = trigger;
        self
    }

    pub fn with_component(mut self, component: EntryId, quantity: i64) -> Self {
        self.composition.push((component, quantity));
        self
    }

    pub fn with_sku(mut self, slot: SkuSlot, sku: Sku) -> Self {
        self.skus[slot.index()] = Some(sku);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.initial_quantity = quantity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_is_not_composite() {
        let entry = CatalogEntry::new(Serial::new("BOLT"), "Bolt");
        assert!(!entry.is_composite());
        assert!(!entry.has_unresolved_composition());
        assert_eq!(entry.low_stock_trigger(), 0);
    }

    #[test]
    fn rejects_negative_trigger_and_blank_name() {
        let mut entry = CatalogEntry::new(Serial::new("BOLT"), "Bolt");
        assert!(entry.set_low_stock_trigger(-1).is_err());
        assert!(entry.set_name("  ").is_err());
        assert_eq!(entry.name(), "Bolt");

        entry.set_low_stock_trigger(4).unwrap();
        assert_eq!(entry.low_stock_trigger(), 4);
    }

    #[test]
    fn component_quantity_looks_up_lines() {
        let mut entry = CatalogEntry::new(Serial::new("KIT"), "Kit");
        let bolt = EntryId::from_raw(1);
        let saved = vec![(Serial::new("BOLT"), 2)];
        entry.set_composition(vec![ComponentLine { component: bolt, quantity: 2 }], saved);

        assert!(entry.is_composite());
        assert_eq!(entry.component_quantity(bolt), Some(2));
        assert_eq!(entry.component_quantity(EntryId::from_raw(9)), None);

        entry.detach_component(bolt, &Serial::new("BOLT"));
        assert!(!entry.is_composite());
        assert!(entry.saved_composition().is_empty());
    }
}
