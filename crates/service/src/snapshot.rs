use serde::{Deserialize, Serialize};

use stockroom_audit::Log;
use stockroom_inventory::EntryRecord;

/// Everything needed to rebuild a stockroom: entries (composition stored as serials)
/// and the audit log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entries: Vec<EntryRecord>,
    #[serde(default)]
    pub logs: Vec<Log>,
}
