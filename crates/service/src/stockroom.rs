//! The stockroom facade.
//!
//! Every mutation runs the same pipeline:
//!
//! ```text
//! lock state
//!   ↓
//! 1. Apply the operation to the ledger (or the audit log)
//!   ↓
//! 2. Record the resulting event as an audit log
//!   ↓
//! 3. Refresh stock alerts (when enabled)
//!   ↓
//! unlock, then publish entry and log changes
//! ```
//!
//! A failed operation leaves the ledger untouched and records nothing.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use stockroom_audit::{AuditLog, Log, LogType};
use stockroom_core::{DomainError, DomainResult, EntryId, LogId, OrderId, Serial, Sku};
use stockroom_events::{
    EntryChange, EntryChangeKind, Event, EventBus, InMemoryEventBus, LogChange, Subscription,
};
use stockroom_inventory::{
    BaseParts, BreakdownSolution, BreakdownSummary, CatalogEntry, EntryRecord, InventoryEvent,
    InventoryLedger, NewEntry, ReservationBook, SkuSlot,
};

use crate::config::StockroomConfig;
use crate::error::StockroomError;
use crate::snapshot::Snapshot;

struct State {
    ledger: InventoryLedger,
    audit: AuditLog,
    entry_changes: Vec<EntryChange>,
}

impl State {
    fn record(&mut self, event: InventoryEvent) -> LogId {
        debug!(event = event.event_type(), version = event.version(), "ledger event");
        self.entry_changes.extend(entry_changes(&event));
        self.audit.record(&event)
    }

    fn touch(&mut self, id: EntryId) -> DomainResult<()> {
        let serial = self.ledger.serial_of(id)?.clone();
        self.entry_changes
            .push(EntryChange::new(EntryChangeKind::Updated, serial));
        Ok(())
    }
}

/// Single-writer owner of the ledger and the audit log.
pub struct Stockroom {
    state: Mutex<State>,
    reservations: Arc<ReservationBook>,
    entry_bus: InMemoryEventBus<EntryChange>,
    log_bus: InMemoryEventBus<LogChange>,
    config: StockroomConfig,
}

impl Default for Stockroom {
    fn default() -> Self {
        Self::new(StockroomConfig::default())
    }
}

impl Stockroom {
    pub fn new(config: StockroomConfig) -> Self {
        let reservations = Arc::new(ReservationBook::new());
        Self {
            state: Mutex::new(State {
                ledger: InventoryLedger::with_reservations(Arc::clone(&reservations)),
                audit: AuditLog::new(),
                entry_changes: Vec::new(),
            }),
            reservations,
            entry_bus: InMemoryEventBus::new(),
            log_bus: InMemoryEventBus::new(),
            config,
        }
    }

    /// Build a stockroom from saved state.
    pub fn from_snapshot(config: StockroomConfig, snapshot: Snapshot) -> Result<Self, StockroomError> {
        let stockroom = Self::new(config);
        stockroom.load(snapshot)?;
        Ok(stockroom)
    }

    pub fn config(&self) -> StockroomConfig {
        self.config
    }

    /// The reservation book, shareable with a background order poller.
    pub fn reservations(&self) -> Arc<ReservationBook> {
        Arc::clone(&self.reservations)
    }

    /// Entry added / removed / changed notifications.
    pub fn subscribe_entries(&self) -> Subscription<EntryChange> {
        self.entry_bus.subscribe()
    }

    /// Log collection notifications.
    pub fn subscribe_logs(&self) -> Subscription<LogChange> {
        self.log_bus.subscribe()
    }

    // ---------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------

    /// Load saved entries and logs into an empty stockroom.
    ///
    /// Entries are registered first, then composition references are resolved, then
    /// logs are loaded. Nothing is kept if any step fails.
    pub fn load(&self, snapshot: Snapshot) -> Result<usize, StockroomError> {
        self.mutate("load", |state| {
            if !state.ledger.is_empty() || !state.audit.is_empty() {
                return Err(DomainError::conflict("can only load into an empty stockroom"));
            }

            let mut ledger = InventoryLedger::with_reservations(Arc::clone(&self.reservations));
            for record in snapshot.entries {
                ledger.create_entry_from_saved(record)?;
            }
            ledger.resolve_composition_references()?;

            let mut audit = AuditLog::new();
            let logs = audit.load_logs(snapshot.logs);

            let entries = ledger.len();
            state.entry_changes.extend(
                ledger
                    .entries()
                    .into_iter()
                    .map(|(_, entry)| EntryChange::new(EntryChangeKind::Added, entry.serial().clone())),
            );
            state.ledger = ledger;
            state.audit = audit;
            info!(entries, logs, "stockroom loaded");
            Ok(entries)
        })
    }

    pub fn snapshot(&self) -> Result<Snapshot, StockroomError> {
        self.read(|state| {
            Ok(Snapshot {
                entries: state.ledger.export_entries(),
                logs: state.audit.export_logs(),
            })
        })
    }

    // ---------------------------------------------------------------------
    // Catalog
    // ---------------------------------------------------------------------

    /// Create an entry, or restock the existing one when its serial or a SKU is known.
    pub fn create_entry(&self, new: NewEntry) -> Result<(EntryId, LogId), StockroomError> {
        self.mutate("create_entry", |state| {
            let serial = new.serial.clone();
            let (id, event) = state.ledger.create_entry(new)?;
            let log = state.record(event);
            info!(%serial, entry = %id, log = %log, "entry created");
            Ok((id, log))
        })
    }

    /// Delete an entry. Its logs go with it; composites that used it lose the line.
    pub fn remove_entry(&self, id: EntryId) -> Result<LogId, StockroomError> {
        self.mutate("remove_entry", |state| {
            let serial = state.ledger.serial_of(id)?.clone();
            let parents = state.ledger.composes_into(id);
            let event = state.ledger.remove_entry(id)?;
            for parent in parents {
                state.touch(parent)?;
            }
            let removed = state.audit.remove_logs_for_serial(&serial);
            let log = state.record(event);
            info!(%serial, logs_removed = removed, "entry removed");
            Ok(log)
        })
    }

    pub fn set_composition(&self, id: EntryId, lines: Vec<(EntryId, i64)>) -> Result<(), StockroomError> {
        self.mutate("set_composition", |state| {
            state.ledger.replace_composition(id, lines)?;
            state.touch(id)?;
            info!(entry = %id, "composition replaced");
            Ok(())
        })
    }

    pub fn rename(&self, id: EntryId, name: impl Into<String>) -> Result<(), StockroomError> {
        self.mutate("rename", |state| {
            state.ledger.entry_mut(id)?.set_name(name)?;
            state.touch(id)
        })
    }

    pub fn set_low_stock_trigger(&self, id: EntryId, trigger: i64) -> Result<(), StockroomError> {
        self.mutate("set_low_stock_trigger", |state| {
            state.ledger.entry_mut(id)?.set_low_stock_trigger(trigger)?;
            state.touch(id)
        })
    }

    pub fn set_sku(&self, id: EntryId, slot: SkuSlot, sku: Option<Sku>) -> Result<(), StockroomError> {
        self.mutate("set_sku", |state| {
            state.ledger.set_sku(id, slot, sku)?;
            state.touch(id)
        })
    }

    pub fn find_by_serial(&self, serial: &Serial) -> Result<Option<EntryId>, StockroomError> {
        self.read(|state| Ok(state.ledger.find_by_serial(serial)))
    }

    pub fn find_by_sku(&self, sku: &Sku) -> Result<Option<EntryId>, StockroomError> {
        self.read(|state| Ok(state.ledger.find_by_sku(sku)))
    }

    pub fn entry(&self, id: EntryId) -> Result<CatalogEntry, StockroomError> {
        self.read(|state| state.ledger.entry(id).cloned())
    }

    /// Every entry with its quantity, ordered by serial.
    pub fn entries(&self) -> Result<Vec<EntryRecord>, StockroomError> {
        self.read(|state| Ok(state.ledger.export_entries()))
    }

    // ---------------------------------------------------------------------
    // Stock
    // ---------------------------------------------------------------------

    pub fn add_amount(&self, id: EntryId, amount: i64) -> Result<LogId, StockroomError> {
        self.mutate("add_amount", |state| {
            let event = state.ledger.add_amount(id, amount)?;
            let log = state.record(event);
            info!(entry = %id, amount, log = %log, "stock added");
            Ok(log)
        })
    }

    /// Take stock off the shelf. Over-selling clamps at zero; the log records what was
    /// actually taken.
    pub fn sell(&self, id: EntryId, amount: i64) -> Result<LogId, StockroomError> {
        self.mutate("sell", |state| {
            let event = state.ledger.decrease_amount(id, amount)?;
            if let InventoryEvent::StockDecreased(e) = &event {
                if e.applied < e.requested {
                    warn!(serial = %e.serial, requested = e.requested, applied = e.applied, "sale clamped at zero");
                }
            }
            let log = state.record(event);
            info!(entry = %id, amount, log = %log, "stock sold");
            Ok(log)
        })
    }

    pub fn set_quantity(&self, id: EntryId, quantity: i64) -> Result<LogId, StockroomError> {
        self.mutate("set_quantity", |state| {
            let event = state.ledger.set_quantity(id, quantity)?;
            let log = state.record(event);
            info!(entry = %id, quantity, log = %log, "quantity set");
            Ok(log)
        })
    }

    pub fn compose(&self, id: EntryId, amount: i64) -> Result<LogId, StockroomError> {
        self.mutate("compose", |state| {
            let event = state.ledger.compose(id, amount)?;
            let log = state.record(event);
            info!(entry = %id, amount, log = %log, "composed");
            Ok(log)
        })
    }

    pub fn break_down(
        &self,
        id: EntryId,
        used: &BTreeMap<EntryId, i64>,
    ) -> Result<(BreakdownSummary, LogId), StockroomError> {
        self.mutate("break_down", |state| {
            let summary = state.ledger.break_down(id, used)?;
            let log = state.record(InventoryEvent::from(summary.clone()));
            info!(entry = %id, log = %log, "broken down");
            Ok((summary, log))
        })
    }

    /// On-hand quantity; 0 for an unknown entry.
    pub fn quantity(&self, id: EntryId) -> Result<i64, StockroomError> {
        self.read(|state| Ok(state.ledger.quantity(id)))
    }

    pub fn available_quantity(&self, id: EntryId) -> Result<i64, StockroomError> {
        self.read(|state| state.ledger.available_quantity(id))
    }

    pub fn is_sufficient(&self, id: EntryId, quantity: i64) -> Result<bool, StockroomError> {
        self.read(|state| state.ledger.is_sufficient_recursive(id, quantity))
    }

    pub fn missing(&self, id: EntryId, quantity: i64) -> Result<BaseParts, StockroomError> {
        self.read(|state| state.ledger.missing_recursive(id, quantity))
    }

    /// Composites worth breaking down to cover a shortfall, bounded by the configured
    /// search limits.
    pub fn find_breakdown_solutions(
        &self,
        id: EntryId,
        quantity: i64,
    ) -> Result<Vec<BreakdownSolution>, StockroomError> {
        let limits = self.config.search;
        self.read(|state| {
            let solutions = state.ledger.find_breakdown_solutions(id, quantity, limits)?;
            debug!(
                entry = %id,
                quantity,
                solutions = solutions.len(),
                max_combination_size = limits.max_combination_size,
                "breakdown search finished"
            );
            Ok(solutions)
        })
    }

    // ---------------------------------------------------------------------
    // Orders
    // ---------------------------------------------------------------------

    pub fn reserve_for_order(&self, order_id: &OrderId, lines: &[(EntryId, i64)]) -> Result<LogId, StockroomError> {
        self.mutate("reserve_for_order", |state| {
            let event = state.ledger.reserve_for_order(order_id, lines)?;
            let log = state.record(event);
            info!(%order_id, lines = lines.len(), log = %log, "order reserved");
            Ok(log)
        })
    }

    /// Release an order's reservations on `entries`, or on everything when empty.
    pub fn release_for_order(&self, order_id: &OrderId, entries: &[EntryId]) -> Result<LogId, StockroomError> {
        self.mutate("release_for_order", |state| {
            let event = state.ledger.release_for_order(order_id, entries)?;
            let log = state.record(event);
            info!(%order_id, log = %log, "order released");
            Ok(log)
        })
    }

    // ---------------------------------------------------------------------
    // Audit log
    // ---------------------------------------------------------------------

    /// Record a log raised outside the ledger (marketplace warnings, manual notes).
    pub fn create_log(
        &self,
        log_type: LogType,
        amount: Option<i64>,
        message: impl Into<String>,
        serial: Option<Serial>,
    ) -> Result<LogId, StockroomError> {
        self.mutate("create_log", |state| {
            Ok(state.audit.create_log(log_type, amount, message, serial))
        })
    }

    /// Undo a log. Reverting a creation deletes the entry the same way
    /// [`remove_entry`](Self::remove_entry) does.
    pub fn revert_log(&self, id: LogId) -> Result<LogId, StockroomError> {
        self.mutate("revert_log", |state| {
            let parents = state
                .audit
                .get(id)
                .filter(|log| log.log_type() == LogType::NewItemCreated)
                .and_then(Log::serial)
                .and_then(|serial| state.ledger.find_by_serial(serial))
                .map(|entry| state.ledger.composes_into(entry))
                .unwrap_or_default();

            let State { ledger, audit, .. } = &mut *state;
            let revert = audit.revert_log(id, ledger)?;

            debug!(event = revert.event.event_type(), "ledger event");
            state.entry_changes.extend(entry_changes(&revert.event));
            for parent in parents {
                state.touch(parent)?;
            }
            info!(log = %id, reverter = %revert.log, "log reverted");
            Ok(revert.log)
        })
    }

    pub fn can_revert(&self, id: LogId) -> Result<bool, StockroomError> {
        self.read(|state| Ok(state.audit.can_revert(id)))
    }

    pub fn can_revert_safely(&self, id: LogId) -> Result<bool, StockroomError> {
        self.read(|state| Ok(state.audit.can_revert_safely(id)))
    }

    pub fn suppress_log(&self, id: LogId) -> Result<LogId, StockroomError> {
        self.mutate("suppress_log", |state| state.audit.suppress_log(id))
    }

    pub fn unsuppress_log(&self, id: LogId) -> Result<(), StockroomError> {
        self.mutate("unsuppress_log", |state| state.audit.unsuppress_log(id))
    }

    pub fn solve_log(&self, id: LogId) -> Result<LogId, StockroomError> {
        self.mutate("solve_log", |state| state.audit.solve_log(id))
    }

    /// Run the stock alert check now, regardless of configuration.
    pub fn check_low_and_out_of_stock(&self) -> Result<(), StockroomError> {
        self.mutate("check_low_and_out_of_stock", |state| {
            let State { ledger, audit, .. } = &mut *state;
            audit.check_low_and_out_of_stock(ledger);
            Ok(())
        })
    }

    pub fn log(&self, id: LogId) -> Result<Option<Log>, StockroomError> {
        self.read(|state| Ok(state.audit.get(id).cloned()))
    }

    /// Every log in creation order.
    pub fn logs(&self) -> Result<Vec<Log>, StockroomError> {
        self.read(|state| Ok(state.audit.export_logs()))
    }

    pub fn logs_for_serial(&self, serial: &Serial) -> Result<Vec<Log>, StockroomError> {
        self.read(|state| {
            Ok(state
                .audit
                .logs_for_serial(serial)
                .into_iter()
                .cloned()
                .collect())
        })
    }

    // ---------------------------------------------------------------------
    // Plumbing
    // ---------------------------------------------------------------------

    fn read<T>(&self, f: impl FnOnce(&State) -> DomainResult<T>) -> Result<T, StockroomError> {
        let state = self.state.lock().map_err(|_| StockroomError::Poisoned)?;
        Ok(f(&*state)?)
    }

    fn mutate<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut State) -> DomainResult<T>,
    ) -> Result<T, StockroomError> {
        let (result, entry_changes, log_changes) = {
            let mut state = self.state.lock().map_err(|_| StockroomError::Poisoned)?;
            let result = f(&mut *state);
            if result.is_ok() && self.config.check_alerts {
                let State { ledger, audit, .. } = &mut *state;
                audit.check_low_and_out_of_stock(ledger);
            }
            let entry_changes = std::mem::take(&mut state.entry_changes);
            let log_changes = state.audit.take_changes();
            (result, entry_changes, log_changes)
        };

        if let Err(err) = &result {
            warn!(operation, error = %err, "operation rejected");
        }
        self.publish(entry_changes, log_changes);
        result.map_err(StockroomError::from)
    }

    fn publish(&self, entry_changes: Vec<EntryChange>, log_changes: Vec<LogChange>) {
        for change in entry_changes {
            debug!(event = change.event_type(), serial = %change.serial, "publishing entry change");
            if let Err(err) = self.entry_bus.publish(change) {
                warn!(error = %err, "entry change not published");
            }
        }
        for change in log_changes {
            debug!(event = change.event_type(), log = %change.log_id, "publishing log change");
            if let Err(err) = self.log_bus.publish(change) {
                warn!(error = %err, "log change not published");
            }
        }
    }
}

fn entry_changes(event: &InventoryEvent) -> Vec<EntryChange> {
    match event {
        InventoryEvent::EntryCreated(e) => {
            vec![EntryChange::new(EntryChangeKind::Added, e.serial.clone())]
        }
        InventoryEvent::EntryRemoved(e) => vec![
            EntryChange::new(EntryChangeKind::Removed, e.serial.clone()).with_icon(e.icon.clone()),
        ],
        InventoryEvent::OrderReserved(e) => updated(e.lines.iter().map(|(serial, _)| serial.clone())),
        InventoryEvent::OrderReleased(e) => updated(e.lines.iter().map(|(serial, _)| serial.clone())),
        other => updated(other.touched_serials()),
    }
}

fn updated(serials: impl IntoIterator<Item = Serial>) -> Vec<EntryChange> {
    serials
        .into_iter()
        .map(|serial| EntryChange::new(EntryChangeKind::Updated, serial))
        .collect()
}
