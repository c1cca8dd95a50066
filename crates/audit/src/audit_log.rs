use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use stockroom_core::{DomainError, DomainResult, LogId, Serial};
use stockroom_events::change::{LogChange, LogChangeKind};
use stockroom_inventory::{InventoryEvent, InventoryLedger};

use crate::allocator::LogIdAllocator;
use crate::log::{Log, LogType, Severity};

/// The audit log and its indices.
///
/// Every log is reachable from the chronological list, its severity bucket, the ID
/// lookup and (when it names a serial) the per-serial list. `index`/`deindex` are the
/// only places that touch these collections.
///
/// Changes to the collection are queued as [`LogChange`]s; the owner drains them with
/// [`take_changes`](Self::take_changes) and publishes them.
/// Outcome of [`AuditLog::revert_log`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revert {
    /// The reciprocal log.
    pub log: LogId,
    /// What undoing the target did to the ledger.
    pub event: InventoryEvent,
}

#[derive(Debug, Default)]
pub struct AuditLog {
    allocator: LogIdAllocator,
    logs: HashMap<LogId, Log>,
    chronological: Vec<LogId>,
    by_severity: BTreeMap<Severity, Vec<LogId>>,
    by_serial: HashMap<Serial, Vec<LogId>>,
    /// Latest stock-moving log per serial, the only one that can be reverted safely.
    latest: HashMap<Serial, LogId>,
    changes: Vec<LogChange>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    pub fn get(&self, id: LogId) -> Option<&Log> {
        self.logs.get(&id)
    }

    /// Logs in creation order.
    pub fn logs(&self) -> impl Iterator<Item = &Log> {
        self.chronological.iter().filter_map(|id| self.logs.get(id))
    }

    pub fn by_severity(&self, severity: Severity) -> Vec<&Log> {
        self.by_severity
            .get(&severity)
            .map(|ids| ids.iter().filter_map(|id| self.logs.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn logs_for_serial(&self, serial: &Serial) -> Vec<&Log> {
        self.by_serial
            .get(serial)
            .map(|ids| ids.iter().filter_map(|id| self.logs.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn latest_for_serial(&self, serial: &Serial) -> Option<LogId> {
        self.latest.get(serial).copied()
    }

    /// Drain the change notifications queued since the last call.
    pub fn take_changes(&mut self) -> Vec<LogChange> {
        std::mem::take(&mut self.changes)
    }

    /// Create a log with the next ID. Severity follows from `log_type`.
    pub fn create_log(
        &mut self,
        log_type: LogType,
        amount: Option<i64>,
        message: impl Into<String>,
        serial: Option<Serial>,
    ) -> LogId {
        let log = Log::new(self.allocator.allocate(), log_type, amount, message.into(), serial);
        self.insert(log)
    }

    fn insert(&mut self, log: Log) -> LogId {
        let id = log.id();
        debug!(log_id = %id, log_type = ?log.log_type(), "log created");
        self.index(log);
        self.changes.push(LogChange::new(LogChangeKind::Created, id));
        id
    }

    /// Translate a ledger event into its audit log.
    pub fn record(&mut self, event: &InventoryEvent) -> LogId {
        let (log_type, amount, message) = describe(event);
        let serial = event.serial().cloned();
        let related: Vec<Serial> = event
            .touched_serials()
            .into_iter()
            .filter(|s| Some(s) != serial.as_ref())
            .collect();
        let log = Log::new(self.allocator.allocate(), log_type, amount, message, serial)
            .with_related(related);
        self.insert(log)
    }

    /// Not reverted, Normal severity and a revertible type.
    pub fn can_revert(&self, id: LogId) -> bool {
        self.logs.get(&id).is_some_and(|log| {
            !log.is_reverted() && log.severity() == Severity::Normal && log.log_type().is_revertible()
        })
    }

    /// `can_revert`, and no later stock-moving log touches the same serial.
    pub fn can_revert_safely(&self, id: LogId) -> bool {
        self.can_revert(id)
            && self
                .logs
                .get(&id)
                .and_then(Log::serial)
                .is_some_and(|serial| self.latest.get(serial) == Some(&id))
    }

    /// Undo a log's quantity effect on `ledger` and record the reciprocal log.
    ///
    /// Reverting a `NewItemCreated` log deletes the entry (with the usual cascade) and
    /// records an `ItemRemoved` log.
    pub fn revert_log(&mut self, id: LogId, ledger: &mut InventoryLedger) -> DomainResult<Revert> {
        let log = self
            .logs
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::rejected(format!("no log {id}")))?;

        if log.is_reverted() {
            warn!(log_id = %id, "revert rejected: already reverted");
            return Err(DomainError::rejected(format!("log {id} was already reverted")));
        }

        if log.log_type() == LogType::NewItemCreated {
            return self.revert_creation(&log, ledger);
        }

        if !self.can_revert_safely(id) {
            warn!(log_id = %id, log_type = ?log.log_type(), "revert rejected");
            let reason = if self.can_revert(id) {
                "a later log touches the same entry"
            } else {
                "its type cannot be reverted"
            };
            return Err(DomainError::rejected(format!("log {id} cannot be reverted: {reason}")));
        }

        let serial = log
            .serial()
            .cloned()
            .ok_or_else(|| DomainError::invariant(format!("log {id} names no entry")))?;
        let entry = ledger
            .find_by_serial(&serial)
            .ok_or_else(|| DomainError::rejected(format!("{serial} no longer exists")))?;
        let amount = log.amount().unwrap_or(0);

        let (event, message) = match log.log_type() {
            LogType::ItemAdded => (
                ledger.decrease_amount(entry, amount)?,
                format!("Reverted {id}: removed {amount} × {serial}"),
            ),
            LogType::ItemSold => (
                ledger.add_amount(entry, amount)?,
                format!("Reverted {id}: returned {amount} × {serial}"),
            ),
            other => {
                return Err(DomainError::invariant(format!("{other:?} passed the revert check")));
            }
        };

        if let Some(original) = self.logs.get_mut(&id) {
            original.set_reverted();
        }
        self.changes.push(LogChange::new(LogChangeKind::Updated, id));

        let reverter = Log::new(
            self.allocator.allocate(),
            LogType::Reverted,
            Some(amount),
            message,
            Some(serial),
        )
        .with_refers_to(id)
        .as_reverter();
        let reverter_id = self.insert(reverter);
        info!(log_id = %id, reverter = %reverter_id, "log reverted");
        Ok(Revert {
            log: reverter_id,
            event,
        })
    }

    fn revert_creation(&mut self, log: &Log, ledger: &mut InventoryLedger) -> DomainResult<Revert> {
        let id = log.id();
        let serial = log
            .serial()
            .cloned()
            .ok_or_else(|| DomainError::invariant(format!("log {id} names no entry")))?;
        let entry = ledger
            .find_by_serial(&serial)
            .ok_or_else(|| DomainError::rejected(format!("{serial} no longer exists")))?;

        let event = ledger.remove_entry(entry)?;
        self.remove_logs_for_serial(&serial);

        let (_, amount, message) = describe(&event);
        let removal = Log::new(
            self.allocator.allocate(),
            LogType::ItemRemoved,
            amount,
            format!("Reverted {id}: {message}"),
            Some(serial),
        )
        .with_refers_to(id)
        .as_reverter();
        let removal_id = self.insert(removal);
        info!(log_id = %id, reverter = %removal_id, "entry creation reverted");
        Ok(Revert {
            log: removal_id,
            event,
        })
    }

    /// Silence a Warning or Critical log. Leaves a `Suppressed` companion log.
    pub fn suppress_log(&mut self, id: LogId) -> DomainResult<LogId> {
        let log = self
            .logs
            .get_mut(&id)
            .ok_or_else(|| DomainError::rejected(format!("no log {id}")))?;
        if !log.log_type().is_suppressible() {
            return Err(DomainError::rejected(format!(
                "{} logs cannot be suppressed",
                log.log_type().label()
            )));
        }
        if log.is_suppressed() {
            return Err(DomainError::rejected(format!("log {id} is already suppressed")));
        }
        log.set_suppressed(true);
        let serial = log.serial().cloned();
        let message = format!("Suppressed {id}: {}", log.message());
        self.changes.push(LogChange::new(LogChangeKind::Updated, id));

        let companion = Log::new(self.allocator.allocate(), LogType::Suppressed, None, message, serial)
            .with_refers_to(id);
        Ok(self.insert(companion))
    }

    /// Undo [`suppress_log`](Self::suppress_log): the companion log is removed.
    pub fn unsuppress_log(&mut self, id: LogId) -> DomainResult<()> {
        let log = self
            .logs
            .get_mut(&id)
            .ok_or_else(|| DomainError::rejected(format!("no log {id}")))?;
        if !log.log_type().is_suppressible() {
            return Err(DomainError::rejected(format!(
                "{} logs cannot be suppressed",
                log.log_type().label()
            )));
        }
        if !log.is_suppressed() {
            return Err(DomainError::rejected(format!("log {id} is not suppressed")));
        }
        log.set_suppressed(false);
        self.changes.push(LogChange::new(LogChangeKind::Updated, id));
        self.remove_companions(id);
        Ok(())
    }

    /// Close a Warning or Critical log by hand. Stock alerts are managed by the stock
    /// check and cannot be solved.
    pub fn solve_log(&mut self, id: LogId) -> DomainResult<LogId> {
        let log = self
            .logs
            .get(&id)
            .ok_or_else(|| DomainError::rejected(format!("no log {id}")))?;
        if !log.log_type().is_solvable() {
            return Err(DomainError::rejected(format!(
                "{} logs cannot be solved",
                log.log_type().label()
            )));
        }

        let mut solved = self.remove(id)?;
        solved.set_solved();
        self.remove_companions(id);

        let message = format!("Solved {id}: {}", solved.message());
        let record = Log::new(
            self.allocator.allocate(),
            LogType::Solved,
            None,
            message,
            solved.serial().cloned(),
        )
        .with_refers_to(id);
        Ok(self.insert(record))
    }

    /// Drop every log naming `serial`. Used when the entry is deleted.
    ///
    /// Logs that only mention `serial` as a related entry (a compose consuming it, say)
    /// stay, but forget it, so the deleted serial keeps no latest stock log.
    pub fn remove_logs_for_serial(&mut self, serial: &Serial) -> usize {
        let ids = self.by_serial.get(serial).cloned().unwrap_or_default();
        let mut removed = 0;
        for id in ids {
            if self.remove(id).is_ok() {
                removed += 1;
            }
        }

        let mentioning: Vec<LogId> = self
            .logs
            .values()
            .filter(|log| log.related().contains(serial))
            .map(Log::id)
            .collect();
        for id in mentioning {
            if let Some(log) = self.logs.get_mut(&id) {
                log.forget_related(serial);
                self.changes.push(LogChange::new(LogChangeKind::Updated, id));
            }
        }
        self.latest.remove(serial);

        debug!(%serial, removed, "logs removed for entry");
        removed
    }

    /// Bulk-load persisted logs. Logs whose ID is already present are skipped; the
    /// allocator continues after the highest loaded ID.
    pub fn load_logs(&mut self, logs: impl IntoIterator<Item = Log>) -> usize {
        let mut loaded = 0;
        for log in logs {
            let id = log.id();
            if self.logs.contains_key(&id) {
                warn!(log_id = %id, "skipping duplicate log on load");
                continue;
            }
            self.allocator.seed_after(id);
            self.index(log);
            self.changes.push(LogChange::new(LogChangeKind::Created, id));
            loaded += 1;
        }
        loaded
    }

    /// Every log in creation order, for persistence.
    pub fn export_logs(&self) -> Vec<Log> {
        self.logs().cloned().collect()
    }

    pub(crate) fn remove(&mut self, id: LogId) -> DomainResult<Log> {
        let log = self.deindex(id)?;
        self.changes.push(LogChange::new(LogChangeKind::Removed, id));
        Ok(log)
    }

    pub(crate) fn replace_alert_message(&mut self, id: LogId, amount: i64, message: String) {
        if let Some(log) = self.logs.get_mut(&id) {
            if log.message() != message || log.amount() != Some(amount) {
                log.set_message(message);
                log.set_amount(Some(amount));
                self.changes.push(LogChange::new(LogChangeKind::Updated, id));
            }
        }
    }

    /// Remove the `Suppressed` companions of `target`.
    pub(crate) fn remove_companions(&mut self, target: LogId) {
        let companions: Vec<LogId> = self
            .by_severity
            .get(&Severity::Normal)
            .into_iter()
            .flatten()
            .filter_map(|id| self.logs.get(id))
            .filter(|log| log.log_type() == LogType::Suppressed && log.refers_to() == Some(target))
            .map(Log::id)
            .collect();
        for id in companions {
            // The id was just read from the index.
            let _ = self.remove(id);
        }
    }

    fn index(&mut self, log: Log) {
        let id = log.id();
        self.chronological.push(id);
        self.by_severity.entry(log.severity()).or_default().push(id);
        if let Some(serial) = log.serial() {
            self.by_serial.entry(serial.clone()).or_default().push(id);
        }
        for serial in log.stock_serials() {
            let latest = self.latest.entry(serial.clone()).or_insert(id);
            if *latest < id {
                *latest = id;
            }
        }
        self.logs.insert(id, log);
    }

    fn deindex(&mut self, id: LogId) -> DomainResult<Log> {
        let log = self
            .logs
            .remove(&id)
            .ok_or_else(|| DomainError::rejected(format!("no log {id}")))?;
        self.chronological.retain(|other| *other != id);
        if let Some(ids) = self.by_severity.get_mut(&log.severity()) {
            ids.retain(|other| *other != id);
        }
        if let Some(serial) = log.serial() {
            if let Some(ids) = self.by_serial.get_mut(serial) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    self.by_serial.remove(serial);
                }
            }
        }
        let stale: Vec<Serial> = log
            .stock_serials()
            .filter(|serial| self.latest.get(*serial) == Some(&id))
            .cloned()
            .collect();
        for serial in stale {
            self.refresh_latest(serial);
        }
        Ok(log)
    }

    fn refresh_latest(&mut self, serial: Serial) {
        let latest = self
            .logs
            .values()
            .filter(|log| log.stock_serials().any(|s| *s == serial))
            .map(Log::id)
            .max();
        match latest {
            Some(id) => {
                self.latest.insert(serial, id);
            }
            None => {
                self.latest.remove(&serial);
            }
        }
    }
}

fn describe(event: &InventoryEvent) -> (LogType, Option<i64>, String) {
    match event {
        InventoryEvent::EntryCreated(e) => (
            LogType::NewItemCreated,
            Some(e.quantity),
            format!("Created {} ({}) with {} on hand", e.name, e.serial, e.quantity),
        ),
        InventoryEvent::StockAdded(e) => (
            LogType::ItemAdded,
            Some(e.amount),
            format!("Added {} × {} (now {})", e.amount, e.serial, e.quantity_after),
        ),
        InventoryEvent::StockDecreased(e) => {
            let message = if e.applied < e.requested {
                format!(
                    "Sold {} × {} (requested {}, stock exhausted)",
                    e.applied, e.serial, e.requested
                )
            } else {
                format!("Sold {} × {} (now {})", e.applied, e.serial, e.quantity_after)
            };
            (LogType::ItemSold, Some(e.applied), message)
        }
        InventoryEvent::QuantitySet(e) => (
            LogType::QuantitySet,
            Some(e.after),
            format!("Set {} from {} to {}", e.serial, e.before, e.after),
        ),
        InventoryEvent::Composed(e) => (
            LogType::Composed,
            Some(e.amount),
            format!("Composed {} × {} using {}", e.amount, e.serial, list(&e.consumed)),
        ),
        InventoryEvent::BrokenDown(e) => {
            let used: Vec<_> = e.used.iter().map(|(s, q)| (s.clone(), *q)).collect();
            let returned: Vec<_> = e.remainder.iter().map(|(s, q)| (s.clone(), *q)).collect();
            (
                LogType::BrokenDown,
                Some(e.before - e.after),
                format!(
                    "Broke down 1 × {}; returned {}; used {}",
                    e.serial,
                    list(&returned),
                    list(&used)
                ),
            )
        }
        InventoryEvent::EntryRemoved(e) => (
            LogType::ItemRemoved,
            Some(e.quantity),
            format!("Removed {} ({}) with {} on hand", e.name, e.serial, e.quantity),
        ),
        InventoryEvent::OrderReserved(e) => (
            LogType::OrderReserved,
            Some(e.lines.iter().map(|(_, q)| q).sum()),
            format!("Reserved for order {}: {}", e.order_id, list(&e.lines)),
        ),
        InventoryEvent::OrderReleased(e) => (
            LogType::OrderReleased,
            Some(e.lines.iter().map(|(_, q)| q).sum()),
            format!("Released order {}: {}", e.order_id, list(&e.lines)),
        ),
    }
}

fn list(lines: &[(Serial, i64)]) -> String {
    if lines.is_empty() {
        return "nothing".to_string();
    }
    lines
        .iter()
        .map(|(serial, quantity)| format!("{quantity} × {serial}"))
        .collect::<Vec<_>>()
        .join(", ")
}
