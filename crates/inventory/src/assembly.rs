use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, EntryId, Serial};

use crate::event::{Composed, InventoryEvent};
use crate::ledger::InventoryLedger;

/// Outcome of breaking one composite unit back into parts.
///
/// Maps are keyed by component serial so the summary can be logged and persisted
/// as-is. Zero rows are omitted from `used` and `remainder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownSummary {
    pub serial: Serial,
    /// Composition of one unit at the time of the breakdown.
    pub original: BTreeMap<Serial, i64>,
    /// Components consumed (not returned to stock).
    pub used: BTreeMap<Serial, i64>,
    /// Components returned to stock.
    pub remainder: BTreeMap<Serial, i64>,
    /// Composite on-hand before and after.
    pub before: i64,
    pub after: i64,
    pub occurred_at: DateTime<Utc>,
}

impl InventoryLedger {
    /// Build `amount` units of a composite from its components.
    ///
    /// Every component must have `edge quantity × amount` on hand; otherwise nothing
    /// changes and `InsufficientStock` names the first short component.
    pub fn compose(&mut self, id: EntryId, amount: i64) -> DomainResult<InventoryEvent> {
        if amount <= 0 {
            return Err(DomainError::validation("amount to compose must be positive"));
        }
        let entry = self.entry(id)?;
        if !entry.is_composite() {
            return Err(DomainError::validation(format!(
                "{} is not a composite entry",
                entry.serial()
            )));
        }

        let mut plan = Vec::with_capacity(entry.composition().len());
        for line in entry.composition() {
            let required = line
                .quantity
                .checked_mul(amount)
                .ok_or_else(|| DomainError::validation("quantity overflow"))?;
            let on_hand = self.quantity(line.component);
            if on_hand < required {
                return Err(DomainError::insufficient(
                    self.serial_of(line.component)?.as_str(),
                    required,
                    on_hand,
                ));
            }
            plan.push((line.component, required));
        }

        let mut consumed = Vec::with_capacity(plan.len());
        for (component, required) in plan {
            self.adjust(component, -required)?;
            consumed.push((self.serial_of(component)?.clone(), required));
        }
        let quantity_after = self.adjust(id, amount)?;

        Ok(InventoryEvent::Composed(Composed {
            serial: self.serial_of(id)?.clone(),
            amount,
            consumed,
            quantity_after,
            occurred_at: Utc::now(),
        }))
    }

    /// Break one unit of a composite back into parts.
    ///
    /// `used` lists, per component, how many of the per-unit quantity were consumed;
    /// the rest goes back to stock. Components not listed are returned in full.
    pub fn break_down(
        &mut self,
        id: EntryId,
        used: &BTreeMap<EntryId, i64>,
    ) -> DomainResult<BreakdownSummary> {
        let entry = self.entry(id)?;
        if !entry.is_composite() {
            return Err(DomainError::validation(format!(
                "{} is not a composite entry",
                entry.serial()
            )));
        }

        for (component, quantity) in used {
            let Some(edge) = entry.component_quantity(*component) else {
                return Err(DomainError::validation(format!(
                    "{} is not a component of {}",
                    self.serial_of(*component)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|_| component.to_string()),
                    entry.serial()
                )));
            };
            if *quantity < 0 || *quantity > edge {
                return Err(DomainError::validation(format!(
                    "used quantity {quantity} of {} is outside 0..={edge}",
                    self.serial_of(*component)?
                )));
            }
        }

        let before = self.quantity(id);
        if before < 1 {
            return Err(DomainError::insufficient(entry.serial().as_str(), 1, before));
        }

        let lines: Vec<_> = entry.composition().to_vec();
        let serial = entry.serial().clone();

        let mut original = BTreeMap::new();
        let mut used_by_serial = BTreeMap::new();
        let mut remainder = BTreeMap::new();
        for line in &lines {
            let component_serial = self.serial_of(line.component)?.clone();
            let consumed = used.get(&line.component).copied().unwrap_or(0);
            let returned = line.quantity - consumed;

            original.insert(component_serial.clone(), line.quantity);
            if consumed > 0 {
                used_by_serial.insert(component_serial.clone(), consumed);
            }
            if returned > 0 {
                remainder.insert(component_serial, returned);
            }
        }

        for line in &lines {
            let consumed = used.get(&line.component).copied().unwrap_or(0);
            self.adjust(line.component, line.quantity - consumed)?;
        }
        let after = self.adjust(id, -1)?;

        Ok(BreakdownSummary {
            serial,
            original,
            used: used_by_serial,
            remainder,
            before,
            after,
            occurred_at: Utc::now(),
        })
    }
}

impl From<BreakdownSummary> for InventoryEvent {
    fn from(summary: BreakdownSummary) -> Self {
        InventoryEvent::BrokenDown(summary)
    }
}
