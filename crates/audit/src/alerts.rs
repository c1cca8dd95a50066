//! Automatic low-stock / out-of-stock alert maintenance.

use tracing::debug;

use stockroom_core::{LogId, Serial};
use stockroom_inventory::InventoryLedger;

use crate::audit_log::AuditLog;
use crate::log::LogType;

impl AuditLog {
    /// Bring the stock alerts in line with the ledger.
    ///
    /// Per entry with a non-zero trigger: nothing on hand keeps exactly one `OutOfStock`
    /// log, `0 < quantity <= trigger` keeps exactly one `LowStock` log, anything above
    /// the trigger keeps neither. Entries with trigger 0 never carry alerts. Running it
    /// twice in a row changes nothing the second time.
    pub fn check_low_and_out_of_stock(&mut self, ledger: &InventoryLedger) {
        for (id, entry) in ledger.entries() {
            let serial = entry.serial();
            let trigger = entry.low_stock_trigger();
            let quantity = ledger.quantity(id);

            let wanted = if trigger == 0 || quantity > trigger {
                None
            } else if quantity == 0 {
                Some(LogType::OutOfStock)
            } else {
                Some(LogType::LowStock)
            };

            for kind in [LogType::LowStock, LogType::OutOfStock] {
                let existing = self.alerts_for(serial, kind);
                if wanted != Some(kind) {
                    for alert in existing {
                        debug!(%serial, log_id = %alert, ?kind, "retiring stock alert");
                        self.retire_alert(alert);
                    }
                    continue;
                }

                let message = match kind {
                    LogType::OutOfStock => format!("{} ({}) is out of stock", entry.name(), serial),
                    _ => format!(
                        "{} ({}) is low: {} left, trigger {}",
                        entry.name(),
                        serial,
                        quantity,
                        trigger
                    ),
                };
                match existing.split_first() {
                    Some((keep, extra)) => {
                        self.replace_alert_message(*keep, quantity, message);
                        for alert in extra {
                            self.retire_alert(*alert);
                        }
                    }
                    None => {
                        debug!(%serial, quantity, trigger, ?kind, "raising stock alert");
                        self.create_log(kind, Some(quantity), message, Some(serial.clone()));
                    }
                }
            }
        }
    }

    fn alerts_for(&self, serial: &Serial, kind: LogType) -> Vec<LogId> {
        self.logs_for_serial(serial)
            .into_iter()
            .filter(|log| log.log_type() == kind)
            .map(|log| log.id())
            .collect()
    }

    fn retire_alert(&mut self, id: LogId) {
        if self.remove(id).is_ok() {
            self.remove_companions(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Log;
    use stockroom_core::EntryId;
    use stockroom_inventory::NewEntry;

    fn setup(trigger: i64, quantity: i64) -> (InventoryLedger, AuditLog, EntryId) {
        let mut ledger = InventoryLedger::new();
        let (id, _) = ledger
            .create_entry(
                NewEntry::new(Serial::new("BOLT"), "Bolt")
                    .with_low_stock_trigger(trigger)
                    .with_quantity(quantity),
            )
            .unwrap();
        (ledger, AuditLog::new(), id)
    }

    fn alert_types(audit: &AuditLog) -> Vec<LogType> {
        audit
            .logs_for_serial(&Serial::new("BOLT"))
            .into_iter()
            .map(Log::log_type)
            .filter(|t| t.is_stock_alert())
            .collect()
    }

    #[test]
    fn scenario_d_alerts_follow_quantity() {
        let (mut ledger, mut audit, bolt) = setup(3, 5);
        audit.check_low_and_out_of_stock(&ledger);
        assert!(alert_types(&audit).is_empty());

        ledger.set_quantity(bolt, 2).unwrap();
        audit.check_low_and_out_of_stock(&ledger);
        assert_eq!(alert_types(&audit), vec![LogType::LowStock]);

        ledger.set_quantity(bolt, 0).unwrap();
        audit.check_low_and_out_of_stock(&ledger);
        assert_eq!(alert_types(&audit), vec![LogType::OutOfStock]);

        ledger.set_quantity(bolt, 4).unwrap();
        audit.check_low_and_out_of_stock(&ledger);
        assert!(alert_types(&audit).is_empty());
    }

    #[test]
    fn check_is_idempotent_and_updates_message_in_place() {
        let (mut ledger, mut audit, bolt) = setup(5, 4);
        audit.check_low_and_out_of_stock(&ledger);
        let alert = audit.logs().next().unwrap().id();
        audit.take_changes();

        audit.check_low_and_out_of_stock(&ledger);
        assert!(audit.take_changes().is_empty());

        ledger.set_quantity(bolt, 2).unwrap();
        audit.check_low_and_out_of_stock(&ledger);
        assert_eq!(audit.len(), 1);
        let log = audit.get(alert).unwrap();
        assert_eq!(log.amount(), Some(2));
        assert!(log.message().contains("2 left"));
    }

    #[test]
    fn zero_trigger_disables_alerts() {
        let (ledger, mut audit, _) = setup(0, 0);
        audit.check_low_and_out_of_stock(&ledger);
        assert!(audit.is_empty());
    }

    #[test]
    fn retired_alert_takes_its_suppression_with_it() {
        let (mut ledger, mut audit, bolt) = setup(3, 1);
        audit.check_low_and_out_of_stock(&ledger);
        let alert = audit.logs().next().unwrap().id();
        let companion = audit.suppress_log(alert).unwrap();

        ledger.set_quantity(bolt, 10).unwrap();
        audit.check_low_and_out_of_stock(&ledger);

        assert!(audit.get(alert).is_none());
        assert!(audit.get(companion).is_none());
    }

    #[test]
    fn duplicate_alerts_collapse_to_one() {
        let (ledger, mut audit, _) = setup(3, 1);
        audit.create_log(LogType::LowStock, Some(1), "old", Some(Serial::new("BOLT")));
        audit.create_log(LogType::LowStock, Some(1), "older", Some(Serial::new("BOLT")));

        audit.check_low_and_out_of_stock(&ledger);

        assert_eq!(alert_types(&audit), vec![LogType::LowStock]);
    }
}
