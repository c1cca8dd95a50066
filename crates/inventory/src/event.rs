use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{OrderId, Serial};
use stockroom_events::Event;

use crate::assembly::BreakdownSummary;

/// Event: EntryCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCreated {
    pub serial: Serial,
    pub name: String,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdded (explicit add, or a restock through `create_entry`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdded {
    pub serial: Serial,
    pub amount: i64,
    pub quantity_after: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockDecreased.
///
/// `applied` can be smaller than `requested` when the decrease was clamped at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDecreased {
    pub serial: Serial,
    pub requested: i64,
    pub applied: i64,
    pub quantity_after: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuantitySet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantitySet {
    pub serial: Serial,
    pub before: i64,
    pub after: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: Composed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Composed {
    pub serial: Serial,
    pub amount: i64,
    /// Total consumed per component, in composition order.
    pub consumed: Vec<(Serial, i64)>,
    pub quantity_after: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRemoved {
    pub serial: Serial,
    pub name: String,
    pub quantity: i64,
    /// Icon resource the owner should release.
    pub icon: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReserved {
    pub order_id: OrderId,
    pub lines: Vec<(Serial, i64)>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReleased {
    pub order_id: OrderId,
    pub lines: Vec<(Serial, i64)>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    EntryCreated(EntryCreated),
    StockAdded(StockAdded),
    StockDecreased(StockDecreased),
    QuantitySet(QuantitySet),
    Composed(Composed),
    BrokenDown(BreakdownSummary),
    EntryRemoved(EntryRemoved),
    OrderReserved(OrderReserved),
    OrderReleased(OrderReleased),
}

impl InventoryEvent {
    /// The entry this event is about, if it concerns a single entry.
    pub fn serial(&self) -> Option<&Serial> {
        match self {
            InventoryEvent::EntryCreated(e) => Some(&e.serial),
            InventoryEvent::StockAdded(e) => Some(&e.serial),
            InventoryEvent::StockDecreased(e) => Some(&e.serial),
            InventoryEvent::QuantitySet(e) => Some(&e.serial),
            InventoryEvent::Composed(e) => Some(&e.serial),
            InventoryEvent::BrokenDown(e) => Some(&e.serial),
            InventoryEvent::EntryRemoved(e) => Some(&e.serial),
            InventoryEvent::OrderReserved(_) | InventoryEvent::OrderReleased(_) => None,
        }
    }

    /// Every serial whose on-hand quantity changed.
    pub fn touched_serials(&self) -> Vec<Serial> {
        match self {
            InventoryEvent::Composed(e) => std::iter::once(e.serial.clone())
                .chain(e.consumed.iter().map(|(serial, _)| serial.clone()))
                .collect(),
            InventoryEvent::BrokenDown(e) => std::iter::once(e.serial.clone())
                .chain(e.remainder.keys().cloned())
                .collect(),
            InventoryEvent::OrderReserved(_) | InventoryEvent::OrderReleased(_) => Vec::new(),
            other => other.serial().cloned().into_iter().collect(),
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::EntryCreated(_) => "inventory.entry.created",
            InventoryEvent::StockAdded(_) => "inventory.entry.stock_added",
            InventoryEvent::StockDecreased(_) => "inventory.entry.stock_decreased",
            InventoryEvent::QuantitySet(_) => "inventory.entry.quantity_set",
            InventoryEvent::Composed(_) => "inventory.entry.composed",
            InventoryEvent::BrokenDown(_) => "inventory.entry.broken_down",
            InventoryEvent::EntryRemoved(_) => "inventory.entry.removed",
            InventoryEvent::OrderReserved(_) => "inventory.order.reserved",
            InventoryEvent::OrderReleased(_) => "inventory.order.released",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::EntryCreated(e) => e.occurred_at,
            InventoryEvent::StockAdded(e) => e.occurred_at,
            InventoryEvent::StockDecreased(e) => e.occurred_at,
            InventoryEvent::QuantitySet(e) => e.occurred_at,
            InventoryEvent::Composed(e) => e.occurred_at,
            InventoryEvent::BrokenDown(e) => e.occurred_at,
            InventoryEvent::EntryRemoved(e) => e.occurred_at,
            InventoryEvent::OrderReserved(e) => e.occurred_at,
            InventoryEvent::OrderReleased(e) => e.occurred_at,
        }
    }
}
