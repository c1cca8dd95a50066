//! Integration tests for the stockroom pipeline.
//!
//! Tests: operation → Ledger → AuditLog → alert check → buses
//!
//! Verifies:
//! - Mutations leave exactly one audit log and announce their changes
//! - Failed operations change nothing
//! - Subscribers can call back into the stockroom
//! - Saved state reloads into an identical stockroom

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use stockroom_audit::LogType;
    use stockroom_core::{DomainError, EntryId, LogId, OrderId, Serial};
    use stockroom_events::{EntryChangeKind, LogChangeKind};
    use stockroom_inventory::{NewEntry, SearchLimits};

    use crate::{Snapshot, Stockroom, StockroomConfig, StockroomError};

    fn kit_stockroom(config: StockroomConfig, bolts: i64, washers: i64) -> (Stockroom, EntryId, EntryId, EntryId) {
        stockroom_observability::init();
        let stockroom = Stockroom::new(config);
        let (bolt, _) = stockroom
            .create_entry(NewEntry::new(Serial::new("BOLT"), "Bolt").with_quantity(bolts))
            .unwrap();
        let (washer, _) = stockroom
            .create_entry(NewEntry::new(Serial::new("WASHER"), "Washer").with_quantity(washers))
            .unwrap();
        let (kit, _) = stockroom
            .create_entry(
                NewEntry::new(Serial::new("KIT"), "Kit")
                    .with_component(bolt, 2)
                    .with_component(washer, 1),
            )
            .unwrap();
        (stockroom, bolt, washer, kit)
    }

    fn count(stockroom: &Stockroom, log_type: LogType) -> usize {
        stockroom
            .logs()
            .unwrap()
            .iter()
            .filter(|log| log.log_type() == log_type)
            .count()
    }

    #[test]
    fn compose_records_one_log_and_announces_every_touched_entry() {
        let (stockroom, bolt, washer, kit) = kit_stockroom(StockroomConfig::default(), 4, 2);
        let entries = stockroom.subscribe_entries();
        let logs = stockroom.subscribe_logs();

        let log = stockroom.compose(kit, 1).unwrap();

        assert_eq!(stockroom.quantity(bolt).unwrap(), 2);
        assert_eq!(stockroom.quantity(washer).unwrap(), 1);
        assert_eq!(stockroom.quantity(kit).unwrap(), 1);
        assert_eq!(count(&stockroom, LogType::Composed), 1);
        assert_eq!(stockroom.log(log).unwrap().unwrap().amount(), Some(1));

        let mut touched: Vec<_> = entries
            .drain()
            .into_iter()
            .inspect(|change| assert_eq!(change.kind, EntryChangeKind::Updated))
            .map(|change| change.serial.to_string())
            .collect();
        touched.sort();
        assert_eq!(touched, vec!["BOLT", "KIT", "WASHER"]);

        let created: Vec<_> = logs.drain().into_iter().map(|c| (c.kind, c.log_id)).collect();
        assert_eq!(created, vec![(LogChangeKind::Created, log)]);
    }

    #[test]
    fn failed_operation_changes_nothing() {
        let (stockroom, bolt, _, kit) = kit_stockroom(StockroomConfig::default(), 3, 5);
        let before = stockroom.logs().unwrap().len();
        let entries = stockroom.subscribe_entries();

        let err = stockroom.compose(kit, 2).unwrap_err();

        assert!(matches!(
            err,
            StockroomError::Domain(DomainError::InsufficientStock { required: 4, available: 3, .. })
        ));
        assert!(err.is_recoverable());
        assert_eq!(stockroom.quantity(bolt).unwrap(), 3);
        assert_eq!(stockroom.logs().unwrap().len(), before);
        assert!(entries.drain().is_empty());
    }

    #[test]
    fn subscribers_can_read_back_from_their_thread() {
        let (stockroom, bolt, _, _) = kit_stockroom(StockroomConfig::default(), 0, 0);
        let stockroom = Arc::new(stockroom);
        let entries = stockroom.subscribe_entries();
        let (tx, rx) = std::sync::mpsc::channel();

        let reader = Arc::clone(&stockroom);
        let handle = std::thread::spawn(move || {
            let change = entries.recv_timeout(Duration::from_secs(5)).unwrap();
            let id = reader.find_by_serial(&change.serial).unwrap().unwrap();
            tx.send(reader.quantity(id).unwrap()).unwrap();
        });

        stockroom.add_amount(bolt, 7).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
        handle.join().unwrap();
    }

    #[test]
    fn scenario_d_alerts_are_maintained_after_each_mutation() {
        stockroom_observability::init();
        let stockroom = Stockroom::default();
        let (bolt, _) = stockroom
            .create_entry(
                NewEntry::new(Serial::new("BOLT"), "Bolt")
                    .with_low_stock_trigger(3)
                    .with_quantity(5),
            )
            .unwrap();
        assert_eq!(count(&stockroom, LogType::LowStock), 0);

        stockroom.set_quantity(bolt, 2).unwrap();
        assert_eq!(count(&stockroom, LogType::LowStock), 1);
        assert_eq!(count(&stockroom, LogType::OutOfStock), 0);

        stockroom.set_quantity(bolt, 0).unwrap();
        assert_eq!(count(&stockroom, LogType::LowStock), 0);
        assert_eq!(count(&stockroom, LogType::OutOfStock), 1);

        stockroom.set_quantity(bolt, 4).unwrap();
        assert_eq!(count(&stockroom, LogType::LowStock), 0);
        assert_eq!(count(&stockroom, LogType::OutOfStock), 0);
    }

    #[test]
    fn alert_check_can_be_disabled() {
        let config = StockroomConfig {
            check_alerts: false,
            ..StockroomConfig::default()
        };
        let stockroom = Stockroom::new(config);
        stockroom
            .create_entry(
                NewEntry::new(Serial::new("BOLT"), "Bolt")
                    .with_low_stock_trigger(3)
                    .with_quantity(0),
            )
            .unwrap();
        assert_eq!(count(&stockroom, LogType::OutOfStock), 0);

        stockroom.check_low_and_out_of_stock().unwrap();
        assert_eq!(count(&stockroom, LogType::OutOfStock), 1);
    }

    #[test]
    fn revert_is_symmetric_and_single_shot() {
        let (stockroom, bolt, _, _) = kit_stockroom(StockroomConfig::default(), 1, 0);
        let added = stockroom.add_amount(bolt, 4).unwrap();
        assert!(stockroom.can_revert_safely(added).unwrap());

        stockroom.revert_log(added).unwrap();
        assert_eq!(stockroom.quantity(bolt).unwrap(), 1);
        assert_eq!(count(&stockroom, LogType::Reverted), 1);

        let err = stockroom.revert_log(added).unwrap_err();
        assert!(matches!(err, StockroomError::Domain(DomainError::Rejected(_))));
        assert_eq!(stockroom.quantity(bolt).unwrap(), 1);
        assert_eq!(count(&stockroom, LogType::Reverted), 1);
    }

    #[test]
    fn reverting_creation_deletes_the_entry() {
        stockroom_observability::init();
        let stockroom = Stockroom::default();
        let (nut, created) = stockroom
            .create_entry(NewEntry::new(Serial::new("NUT"), "Nut").with_icon("nut.png"))
            .unwrap();
        let (set, _) = stockroom
            .create_entry(NewEntry::new(Serial::new("SET"), "Nut set").with_component(nut, 4))
            .unwrap();
        let entries = stockroom.subscribe_entries();

        stockroom.revert_log(created).unwrap();

        assert!(stockroom.entry(nut).is_err());
        assert_eq!(stockroom.find_by_serial(&Serial::new("NUT")).unwrap(), None);
        assert!(stockroom.entry(set).unwrap().composition().is_empty());

        let changes = entries.drain();
        let removed = changes
            .iter()
            .find(|c| c.kind == EntryChangeKind::Removed)
            .unwrap();
        assert_eq!(removed.serial, Serial::new("NUT"));
        assert_eq!(removed.icon.as_deref(), Some("nut.png"));
        assert!(changes
            .iter()
            .any(|c| c.kind == EntryChangeKind::Updated && c.serial == Serial::new("SET")));
    }

    #[test]
    fn compose_logs_forget_a_removed_component() {
        let (stockroom, bolt, _, kit) = kit_stockroom(StockroomConfig::default(), 4, 2);
        let composed = stockroom.compose(kit, 1).unwrap();

        stockroom.remove_entry(bolt).unwrap();

        let log = stockroom.log(composed).unwrap().unwrap();
        assert!(!log.related().contains(&Serial::new("BOLT")));
        assert!(log.related().contains(&Serial::new("WASHER")));
        assert!(stockroom.logs_for_serial(&Serial::new("KIT")).unwrap().contains(&log));
    }

    #[test]
    fn unknown_entry_has_no_stock() {
        let (stockroom, bolt, _, _) = kit_stockroom(StockroomConfig::default(), 4, 0);
        stockroom.remove_entry(bolt).unwrap();

        assert_eq!(stockroom.quantity(bolt).unwrap(), 0);
        assert_eq!(stockroom.quantity(EntryId::from_raw(42)).unwrap(), 0);
        assert!(stockroom.entry(bolt).is_err());
    }

    #[test]
    fn removing_an_entry_cascades() {
        let (stockroom, bolt, _, kit) = kit_stockroom(StockroomConfig::default(), 4, 2);
        stockroom.add_amount(bolt, 1).unwrap();
        let entries = stockroom.subscribe_entries();

        let removal = stockroom.remove_entry(bolt).unwrap();

        let bolt_logs = stockroom.logs_for_serial(&Serial::new("BOLT")).unwrap();
        assert_eq!(bolt_logs.len(), 1);
        assert_eq!(bolt_logs[0].id(), removal);
        assert_eq!(bolt_logs[0].log_type(), LogType::ItemRemoved);
        assert!(stockroom.entry(kit).unwrap().component_quantity(bolt).is_none());

        let changes = entries.drain();
        assert!(changes
            .iter()
            .any(|c| c.kind == EntryChangeKind::Removed && c.serial == Serial::new("BOLT")));
        assert!(changes
            .iter()
            .any(|c| c.kind == EntryChangeKind::Updated && c.serial == Serial::new("KIT")));
    }

    #[test]
    fn reservations_lower_availability_until_released() {
        let (stockroom, bolt, _, _) = kit_stockroom(StockroomConfig::default(), 2, 0);
        let order = OrderId::new("ORDER-1");

        stockroom.reserve_for_order(&order, &[(bolt, 3)]).unwrap();
        assert_eq!(stockroom.quantity(bolt).unwrap(), 2);
        assert_eq!(stockroom.available_quantity(bolt).unwrap(), -1);
        assert_eq!(count(&stockroom, LogType::OrderReserved), 1);

        stockroom.release_for_order(&order, &[]).unwrap();
        assert_eq!(stockroom.available_quantity(bolt).unwrap(), 2);
        assert_eq!(count(&stockroom, LogType::OrderReleased), 1);
    }

    #[test]
    fn background_poller_shares_the_reservation_book() {
        let (stockroom, bolt, _, _) = kit_stockroom(StockroomConfig::default(), 5, 0);
        let book = stockroom.reservations();

        std::thread::spawn(move || {
            book.reserve(&OrderId::new("ORDER-9"), bolt, 2).unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(stockroom.available_quantity(bolt).unwrap(), 3);
    }

    #[test]
    fn breakdown_search_honours_configured_limits() {
        let (stockroom, bolt, washer, kit) = kit_stockroom(StockroomConfig::default(), 0, 1);
        let (pair, _) = stockroom
            .create_entry(
                NewEntry::new(Serial::new("PAIR"), "Bolt pair")
                    .with_component(bolt, 2)
                    .with_quantity(1),
            )
            .unwrap();

        assert!(!stockroom.is_sufficient(kit, 1).unwrap());
        assert_eq!(stockroom.missing(kit, 1).unwrap(), BTreeMap::from([(bolt, 2)]));
        assert_eq!(
            stockroom.find_breakdown_solutions(kit, 1).unwrap(),
            vec![BTreeMap::from([(pair, 1)])]
        );
        assert_eq!(stockroom.quantity(washer).unwrap(), 1);

        let stingy = Stockroom::from_snapshot(
            StockroomConfig {
                search: SearchLimits {
                    max_combination_size: 10,
                    max_solutions: 0,
                },
                check_alerts: true,
            },
            stockroom.snapshot().unwrap(),
        )
        .unwrap();
        let kit = stingy.find_by_serial(&Serial::new("KIT")).unwrap().unwrap();
        assert!(stingy.find_breakdown_solutions(kit, 1).unwrap().is_empty());
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let (stockroom, bolt, _, kit) = kit_stockroom(StockroomConfig::default(), 4, 2);
        stockroom.set_low_stock_trigger(bolt, 10).unwrap();
        stockroom.compose(kit, 1).unwrap();
        let added = stockroom.add_amount(bolt, 3).unwrap();
        stockroom.revert_log(added).unwrap();
        let alert = stockroom
            .logs()
            .unwrap()
            .into_iter()
            .find(|log| log.log_type() == LogType::LowStock)
            .unwrap()
            .id();
        stockroom.suppress_log(alert).unwrap();

        let saved = stockroom.snapshot().unwrap();
        let json = serde_json::to_string(&saved).unwrap();
        let restored: Snapshot = serde_json::from_str(&json).unwrap();
        let reloaded = Stockroom::from_snapshot(StockroomConfig::default(), restored).unwrap();

        assert_eq!(reloaded.snapshot().unwrap(), saved);
        assert!(reloaded.log(added).unwrap().unwrap().is_reverted());
        assert!(reloaded.log(alert).unwrap().unwrap().is_suppressed());

        let last = saved.logs.iter().map(|log| log.id()).max().unwrap();
        let next = reloaded
            .create_log(LogType::UnknownSku, None, "SKU-404", None)
            .unwrap();
        assert_eq!(next, LogId::from_raw(last.raw() + 1));
    }

    #[test]
    fn reload_keeps_composition_order() {
        stockroom_observability::init();
        let stockroom = Stockroom::default();
        let (washer, _) = stockroom
            .create_entry(NewEntry::new(Serial::new("WASHER"), "Washer").with_quantity(3))
            .unwrap();
        let (bolt, _) = stockroom
            .create_entry(NewEntry::new(Serial::new("BOLT"), "Bolt").with_quantity(3))
            .unwrap();
        stockroom
            .create_entry(
                NewEntry::new(Serial::new("KIT"), "Kit")
                    .with_component(washer, 1)
                    .with_component(bolt, 2),
            )
            .unwrap();

        let saved = stockroom.snapshot().unwrap();
        let json = serde_json::to_string(&saved).unwrap();
        let restored: Snapshot = serde_json::from_str(&json).unwrap();
        let reloaded = Stockroom::from_snapshot(StockroomConfig::default(), restored).unwrap();

        let kit = reloaded.find_by_serial(&Serial::new("KIT")).unwrap().unwrap();
        let order: Vec<_> = reloaded
            .entry(kit)
            .unwrap()
            .saved_composition()
            .iter()
            .map(|(serial, quantity)| (serial.to_string(), *quantity))
            .collect();
        assert_eq!(order, vec![("WASHER".to_string(), 1), ("BOLT".to_string(), 2)]);
        assert_eq!(reloaded.snapshot().unwrap(), saved);
    }

    #[test]
    fn load_announces_entries_and_logs() {
        let (stockroom, _, _, _) = kit_stockroom(StockroomConfig::default(), 1, 1);
        let saved = stockroom.snapshot().unwrap();

        let reloaded = Stockroom::default();
        let entries = reloaded.subscribe_entries();
        let logs = reloaded.subscribe_logs();
        reloaded.load(saved.clone()).unwrap();

        let added = entries
            .drain()
            .into_iter()
            .filter(|c| c.kind == EntryChangeKind::Added)
            .count();
        assert_eq!(added, saved.entries.len());
        let created: Vec<_> = logs
            .drain()
            .into_iter()
            .filter(|c| c.kind == LogChangeKind::Created)
            .map(|c| c.log_id)
            .collect();
        let expected: Vec<_> = saved.logs.iter().map(|log| log.id()).collect();
        assert_eq!(&created[..expected.len()], &expected[..]);
    }

    #[test]
    fn load_requires_an_empty_stockroom() {
        let (stockroom, _, _, _) = kit_stockroom(StockroomConfig::default(), 1, 1);
        let saved = stockroom.snapshot().unwrap();

        let err = stockroom.load(saved).unwrap_err();
        assert!(matches!(err, StockroomError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn dangling_saved_reference_fails_the_load() {
        let stockroom = Stockroom::default();
        let snapshot: Snapshot = serde_json::from_str(
            r#"{"entries":[{"serial":"KIT","name":"Kit","composition":[["GHOST",1]],"quantity":0}]}"#,
        )
        .unwrap();

        let err = stockroom.load(snapshot).unwrap_err();
        assert!(!err.is_recoverable());
        assert!(stockroom.entries().unwrap().is_empty());
    }
}
