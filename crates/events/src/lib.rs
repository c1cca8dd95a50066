//! Change notification plumbing.
//!
//! Mutations on the ledger and the audit log are announced to collaborators
//! (presentation, persistence) through an `EventBus`. Notifications are published
//! after the mutation has finished, never from inside it.

pub mod bus;
pub mod change;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use change::{EntryChange, EntryChangeKind, LogChange, LogChangeKind};
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
