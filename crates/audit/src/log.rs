use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{LogId, Serial};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

/// What a log records. Severity and lifecycle rules follow from the type alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    ItemAdded,
    ItemSold,
    NewItemCreated,
    ItemRemoved,
    QuantitySet,
    Composed,
    BrokenDown,
    Reverted,
    OrderReserved,
    OrderReleased,
    Suppressed,
    Solved,
    LowStock,
    OutOfStock,
    /// A marketplace reported a sale for a SKU the catalog does not know.
    UnknownSku,
    /// A marketplace order fetch failed.
    OrderFetchFailed,
    /// Marketplace and catalog disagree about a listing.
    PlatformMismatch,
}

impl LogType {
    pub fn severity(self) -> Severity {
        match self {
            LogType::LowStock | LogType::UnknownSku | LogType::OrderFetchFailed => Severity::Warning,
            LogType::OutOfStock | LogType::PlatformMismatch => Severity::Critical,
            _ => Severity::Normal,
        }
    }

    /// Types whose quantity effect can be undone by a reciprocal log.
    pub fn is_revertible(self) -> bool {
        matches!(self, LogType::ItemAdded | LogType::ItemSold)
    }

    /// Alerts maintained by the stock check, never solved by hand.
    pub fn is_stock_alert(self) -> bool {
        matches!(self, LogType::LowStock | LogType::OutOfStock)
    }

    pub fn is_suppressible(self) -> bool {
        self.severity() != Severity::Normal && self != LogType::PlatformMismatch
    }

    pub fn is_solvable(self) -> bool {
        self.severity() != Severity::Normal && !self.is_stock_alert()
    }

    /// Types that change on-hand stock of the serials they touch.
    pub fn moves_stock(self) -> bool {
        matches!(
            self,
            LogType::ItemAdded
                | LogType::ItemSold
                | LogType::NewItemCreated
                | LogType::QuantitySet
                | LogType::Composed
                | LogType::BrokenDown
                | LogType::Reverted
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            LogType::ItemAdded => "Item added",
            LogType::ItemSold => "Item sold",
            LogType::NewItemCreated => "New item created",
            LogType::ItemRemoved => "Item removed",
            LogType::QuantitySet => "Quantity set",
            LogType::Composed => "Composed",
            LogType::BrokenDown => "Broken down",
            LogType::Reverted => "Reverted",
            LogType::OrderReserved => "Order reserved",
            LogType::OrderReleased => "Order released",
            LogType::Suppressed => "Suppressed",
            LogType::Solved => "Solved",
            LogType::LowStock => "Low stock",
            LogType::OutOfStock => "Out of stock",
            LogType::UnknownSku => "Unknown SKU",
            LogType::OrderFetchFailed => "Order fetch failed",
            LogType::PlatformMismatch => "Platform mismatch",
        }
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    id: LogId,
    log_type: LogType,
    timestamp: DateTime<Utc>,
    message: String,
    amount: Option<i64>,
    serial: Option<Serial>,
    /// Other serials whose stock this log moved (components of a compose/breakdown).
    #[serde(default)]
    related: Vec<Serial>,
    /// Target of a reciprocal log (revert, suppress, solve).
    #[serde(default)]
    refers_to: Option<LogId>,
    #[serde(default)]
    reverted: bool,
    #[serde(default)]
    reverter: bool,
    #[serde(default)]
    suppressed: bool,
    #[serde(default)]
    solved: bool,
}

impl Log {
    pub(crate) fn new(
        id: LogId,
        log_type: LogType,
        amount: Option<i64>,
        message: String,
        serial: Option<Serial>,
    ) -> Self {
        Self {
            id,
            log_type,
            timestamp: Utc::now(),
            message,
            amount,
            serial,
            related: Vec::new(),
            refers_to: None,
            reverted: false,
            reverter: false,
            suppressed: false,
            solved: false,
        }
    }

    pub fn id(&self) -> LogId {
        self.id
    }

    pub fn log_type(&self) -> LogType {
        self.log_type
    }

    pub fn severity(&self) -> Severity {
        self.log_type.severity()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn amount(&self) -> Option<i64> {
        self.amount
    }

    pub fn serial(&self) -> Option<&Serial> {
        self.serial.as_ref()
    }

    pub fn related(&self) -> &[Serial] {
        &self.related
    }

    pub fn refers_to(&self) -> Option<LogId> {
        self.refers_to
    }

    pub fn is_reverted(&self) -> bool {
        self.reverted
    }

    pub fn is_reverter(&self) -> bool {
        self.reverter
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn is_solved(&self) -> bool {
        self.solved
    }

    /// Serials whose "latest stock log" this log becomes.
    pub(crate) fn stock_serials(&self) -> impl Iterator<Item = &Serial> {
        let moves = self.log_type.moves_stock();
        self.serial
            .iter()
            .chain(self.related.iter())
            .filter(move |_| moves)
    }

    pub(crate) fn with_related(mut self, related: Vec<Serial>) -> Self {
        self.related = related;
        self
    }

    pub(crate) fn forget_related(&mut self, serial: &Serial) {
        self.related.retain(|other| other != serial);
    }

    pub(crate) fn with_refers_to(mut self, target: LogId) -> Self {
        self.refers_to = Some(target);
        self
    }

    pub(crate) fn as_reverter(mut self) -> Self {
        self.reverter = true;
        self
    }

    pub(crate) fn set_message(&mut self, message: String) {
        self.message = message;
    }

    pub(crate) fn set_amount(&mut self, amount: Option<i64>) {
        self.amount = amount;
    }

    pub(crate) fn set_reverted(&mut self) {
        self.reverted = true;
    }

    pub(crate) fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
    }

    pub(crate) fn set_solved(&mut self) {
        self.solved = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_follows_type() {
        assert_eq!(LogType::ItemAdded.severity(), Severity::Normal);
        assert_eq!(LogType::LowStock.severity(), Severity::Warning);
        assert_eq!(LogType::OutOfStock.severity(), Severity::Critical);
        assert_eq!(LogType::PlatformMismatch.severity(), Severity::Critical);
    }

    #[test]
    fn only_added_and_sold_are_revertible() {
        let revertible: Vec<_> = [
            LogType::ItemAdded,
            LogType::ItemSold,
            LogType::NewItemCreated,
            LogType::Composed,
            LogType::Reverted,
        ]
        .into_iter()
        .filter(|t| t.is_revertible())
        .collect();
        assert_eq!(revertible, vec![LogType::ItemAdded, LogType::ItemSold]);
    }

    #[test]
    fn platform_mismatch_is_solvable_but_never_suppressible() {
        assert!(!LogType::PlatformMismatch.is_suppressible());
        assert!(LogType::PlatformMismatch.is_solvable());
        assert!(LogType::LowStock.is_suppressible());
        assert!(!LogType::LowStock.is_solvable());
        assert!(!LogType::ItemSold.is_suppressible());
    }

    #[test]
    fn serde_defaults_lifecycle_flags() {
        let json = r#"{
            "id": 3,
            "log_type": "item_added",
            "timestamp": "2024-01-01T00:00:00Z",
            "message": "Added 2",
            "amount": 2,
            "serial": "BOLT"
        }"#;
        let log: Log = serde_json::from_str(json).unwrap();
        assert_eq!(log.id(), LogId::from_raw(3));
        assert!(!log.is_reverted() && !log.is_suppressed());
        assert!(log.related().is_empty());
    }
}
