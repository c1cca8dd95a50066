//! Inventory domain module.
//!
//! This crate contains the business rules for a stock ledger whose entries may be
//! assembled from other entries, implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage):
//!
//! - [`item`]: catalog entries and their composition lines
//! - [`ledger`]: on-hand quantities, the serial/SKU indices, composition edges
//! - [`reservation`]: per-order reservations (shareable with background pollers)
//! - [`resolver`]: BOM flattening, sufficiency checks, breakdown search
//! - [`assembly`]: compose / break-down transitions
//! - [`snapshot`]: records for saving and rehydrating a ledger
//!
//! Every mutation returns an [`InventoryEvent`] describing what happened so the
//! caller can record it.

pub mod assembly;
pub mod event;
pub mod item;
pub mod ledger;
pub mod reservation;
pub mod resolver;
pub mod snapshot;

pub use assembly::BreakdownSummary;
pub use event::{
    Composed, EntryCreated, EntryRemoved, InventoryEvent, OrderReleased, OrderReserved,
    QuantitySet, StockAdded, StockDecreased,
};
pub use item::{CatalogEntry, ComponentLine, NewEntry, SKU_SLOTS, SavedComposition, SkuSlot};
pub use ledger::InventoryLedger;
pub use reservation::ReservationBook;
pub use resolver::{BaseParts, BreakdownSolution, SearchLimits};
pub use snapshot::EntryRecord;
