//! Change notifications published by the stockroom.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{LogId, Serial};

use crate::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryChangeKind {
    Added,
    Removed,
    /// Quantity or composition changed on an existing entry.
    Updated,
}

/// Fired whenever an entry is added to, removed from, or changed in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryChange {
    pub kind: EntryChangeKind,
    pub serial: Serial,
    /// Icon to release once an entry is removed.
    pub icon: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl EntryChange {
    pub fn new(kind: EntryChangeKind, serial: Serial) -> Self {
        Self {
            kind,
            serial,
            icon: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_icon(mut self, icon: Option<String>) -> Self {
        self.icon = icon;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogChangeKind {
    Created,
    Updated,
    Removed,
}

/// Fired whenever the log collection changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogChange {
    pub kind: LogChangeKind,
    pub log_id: LogId,
    pub occurred_at: DateTime<Utc>,
}

impl LogChange {
    pub fn new(kind: LogChangeKind, log_id: LogId) -> Self {
        Self {
            kind,
            log_id,
            occurred_at: Utc::now(),
        }
    }
}

impl Event for EntryChange {
    fn event_type(&self) -> &'static str {
        match self.kind {
            EntryChangeKind::Added => "stockroom.entry.added",
            EntryChangeKind::Removed => "stockroom.entry.removed",
            EntryChangeKind::Updated => "stockroom.entry.updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl Event for LogChange {
    fn event_type(&self) -> &'static str {
        match self.kind {
            LogChangeKind::Created => "stockroom.log.created",
            LogChangeKind::Updated => "stockroom.log.updated",
            LogChangeKind::Removed => "stockroom.log.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
