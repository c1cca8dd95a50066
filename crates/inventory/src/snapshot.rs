//! Saving and rehydrating a ledger.
//!
//! Entries reference each other through their composition, so they are loaded in two
//! passes: every entry is registered with its composition stored as serials, then
//! [`InventoryLedger::resolve_composition_references`] links the serials to live
//! entries in one go.

use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, EntryId, Serial, Sku};

use crate::item::{CatalogEntry, SKU_SLOTS, SavedComposition, SkuSlot};
use crate::ledger::InventoryLedger;

/// Persisted form of one entry and its on-hand quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub serial: Serial,
    pub name: String,
    #[serde(default)]
    pub low_stock_trigger: i64,
    #[serde(default)]
    pub skus: [Option<Sku>; SKU_SLOTS],
    #[serde(default)]
    pub icon: Option<String>,
    /// Component serial and per-unit quantity, in composition order.
    #[serde(default)]
    pub composition: SavedComposition,
    pub quantity: i64,
}

impl InventoryLedger {
    /// Register a saved entry. Its composition stays unresolved until
    /// [`resolve_composition_references`](Self::resolve_composition_references) runs.
    pub fn create_entry_from_saved(&mut self, record: EntryRecord) -> DomainResult<EntryId> {
        let mut entry = CatalogEntry::new(record.serial, record.name);
        entry.set_low_stock_trigger(record.low_stock_trigger)?;
        entry.set_icon(record.icon);
        for slot in SkuSlot::ALL {
            entry.set_sku(slot, record.skus[slot.index()].clone());
        }
        entry.set_saved_composition(record.composition);
        self.register(entry, record.quantity)
    }

    /// Replace serial references in every unresolved composition with live entries.
    ///
    /// A reference to a serial that is not in the ledger, or a set of references that
    /// forms a cycle, is a `DataIntegrity` failure: the graph cannot be made consistent.
    pub fn resolve_composition_references(&mut self) -> DomainResult<()> {
        let mut pending: Vec<(Serial, EntryId, Vec<(EntryId, i64)>)> = Vec::new();
        for (id, entry) in self.entries() {
            if !entry.has_unresolved_composition() {
                continue;
            }
            let mut lines = Vec::with_capacity(entry.saved_composition().len());
            for (component, quantity) in entry.saved_composition() {
                let component_id = self.find_by_serial(component).ok_or_else(|| {
                    DomainError::data_integrity(format!(
                        "{} refers to missing component {}",
                        entry.serial(),
                        component
                    ))
                })?;
                lines.push((component_id, *quantity));
            }
            pending.push((entry.serial().clone(), id, lines));
        }

        for (serial, id, lines) in pending {
            let expected = lines.len();
            self.replace_composition(id, lines).map_err(|err| match err {
                DomainError::Validation(msg) => DomainError::data_integrity(msg),
                other => other,
            })?;
            if self.entry(id)?.composition().len() != expected {
                return Err(DomainError::data_integrity(format!(
                    "{serial} has an invalid composition line"
                )));
            }
        }
        Ok(())
    }

    /// Every entry in persisted form, ordered by serial.
    pub fn export_entries(&self) -> Vec<EntryRecord> {
        self.entries()
            .into_iter()
            .map(|(id, entry)| EntryRecord {
                serial: entry.serial().clone(),
                name: entry.name().to_string(),
                low_stock_trigger: entry.low_stock_trigger(),
                skus: entry.skus().clone(),
                icon: entry.icon().map(str::to_string),
                composition: entry.saved_composition().to_vec(),
                quantity: self.quantity(id),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(serial: &str, quantity: i64, composition: &[(&str, i64)]) -> EntryRecord {
        EntryRecord {
            serial: Serial::new(serial),
            name: serial.to_string(),
            low_stock_trigger: 0,
            skus: Default::default(),
            icon: None,
            composition: composition
                .iter()
                .map(|(s, q)| (Serial::new(*s), *q))
                .collect(),
            quantity,
        }
    }

    #[test]
    fn composites_can_be_loaded_before_their_components() {
        let mut ledger = InventoryLedger::new();
        let kit = ledger
            .create_entry_from_saved(record("KIT", 1, &[("BOLT", 2), ("WASHER", 1)]))
            .unwrap();
        let bolt = ledger.create_entry_from_saved(record("BOLT", 4, &[])).unwrap();
        let washer = ledger.create_entry_from_saved(record("WASHER", 2, &[])).unwrap();

        assert!(ledger.entry(kit).unwrap().has_unresolved_composition());
        ledger.resolve_composition_references().unwrap();

        let entry = ledger.entry(kit).unwrap();
        assert_eq!(entry.component_quantity(bolt), Some(2));
        assert_eq!(entry.component_quantity(washer), Some(1));
        assert!(ledger.composes_into(bolt).contains(&kit));
        assert_eq!(ledger.quantity(kit), 1);
    }

    #[test]
    fn dangling_reference_is_a_data_integrity_failure() {
        let mut ledger = InventoryLedger::new();
        ledger
            .create_entry_from_saved(record("KIT", 0, &[("GHOST", 1)]))
            .unwrap();

        let err = ledger.resolve_composition_references().unwrap_err();
        assert!(matches!(err, DomainError::DataIntegrity(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn cyclic_saved_compositions_are_rejected() {
        let mut ledger = InventoryLedger::new();
        ledger.create_entry_from_saved(record("A", 0, &[("B", 1)])).unwrap();
        ledger.create_entry_from_saved(record("B", 0, &[("A", 1)])).unwrap();

        let err = ledger.resolve_composition_references().unwrap_err();
        assert!(matches!(err, DomainError::DataIntegrity(_)));
    }

    #[test]
    fn export_then_reload_preserves_graph_and_quantities() {
        let mut ledger = InventoryLedger::new();
        ledger.create_entry_from_saved(record("BOLT", 4, &[])).unwrap();
        ledger.create_entry_from_saved(record("WASHER", 2, &[])).unwrap();
        ledger
            .create_entry_from_saved(record("KIT", 1, &[("BOLT", 2), ("WASHER", 1)]))
            .unwrap();
        ledger.resolve_composition_references().unwrap();

        let json = serde_json::to_string(&ledger.export_entries()).unwrap();
        let records: Vec<EntryRecord> = serde_json::from_str(&json).unwrap();

        let mut reloaded = InventoryLedger::new();
        for record in records {
            reloaded.create_entry_from_saved(record).unwrap();
        }
        reloaded.resolve_composition_references().unwrap();

        assert_eq!(reloaded.export_entries(), ledger.export_entries());
        let kit = reloaded.find_by_serial(&Serial::new("KIT")).unwrap();
        let bolt = reloaded.find_by_serial(&Serial::new("BOLT")).unwrap();
        assert_eq!(reloaded.flatten_to_base_parts(kit, 1).unwrap().get(&bolt), Some(&2));
    }

    #[test]
    fn reload_keeps_composition_order() {
        let mut ledger = InventoryLedger::new();
        ledger.create_entry_from_saved(record("BOLT", 4, &[])).unwrap();
        ledger.create_entry_from_saved(record("WASHER", 2, &[])).unwrap();
        ledger
            .create_entry_from_saved(record("KIT", 0, &[("WASHER", 1), ("BOLT", 2)]))
            .unwrap();
        ledger.resolve_composition_references().unwrap();

        let json = serde_json::to_string(&ledger.export_entries()).unwrap();
        let mut reloaded = InventoryLedger::new();
        for record in serde_json::from_str::<Vec<EntryRecord>>(&json).unwrap() {
            reloaded.create_entry_from_saved(record).unwrap();
        }
        reloaded.resolve_composition_references().unwrap();

        let kit = reloaded.find_by_serial(&Serial::new("KIT")).unwrap();
        let order: Vec<_> = reloaded
            .entry(kit)
            .unwrap()
            .composition()
            .iter()
            .map(|line| reloaded.serial_of(line.component).unwrap().to_string())
            .collect();
        assert_eq!(order, vec!["WASHER", "BOLT"]);

        match reloaded.compose(kit, 1).unwrap() {
            crate::InventoryEvent::Composed(e) => assert_eq!(
                e.consumed,
                vec![(Serial::new("WASHER"), 1), (Serial::new("BOLT"), 2)]
            ),
            other => panic!("unexpected event {other:?}"),
        }
    }
}
