use serde::{Deserialize, Serialize};

use pharmatrace_core::{Principal, Timestamp};

/// Batch custody status.
///
/// ```text
/// PRODUCED ─┬→ TRANSIT ─┬→ DELIVERED ─→ DISPENSED
///           └───────────┴──────────────────────────→ RECALLED (terminal)
/// ```
///
/// Any non-terminal state may move to TRANSIT, DELIVERED, DISPENSED or
/// RECALLED; nothing leaves RECALLED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    #[default]
    Produced,
    Transit,
    Delivered,
    Dispensed,
    Recalled,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Produced => "produced",
            Self::Transit => "transit",
            Self::Delivered => "delivered",
            Self::Dispensed => "dispensed",
            Self::Recalled => "recalled",
        }
    }

    /// Whether the batch has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Recalled)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch: a production lot of one medication. PK = id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    /// Caller-supplied primary key.
    pub id: String,

    /// Manufacturer.id, not checked unless the ledger is configured to.
    pub manufacturer_id: String,

    pub medication_name: String,
    pub dosage: String,
    pub form: String,
    pub quantity: u64,

    pub production_date: Timestamp,
    pub expiry_date: Timestamp,

    /// Identity accountable for the batch right now.
    pub current_custodian: Principal,

    #[serde(default)]
    pub status: BatchStatus,
}

/// Input for registering a new batch. The caller becomes the first custodian.
#[derive(Debug, Clone)]
pub struct RegisterBatchInput {
    pub id: String,
    pub manufacturer_id: String,
    pub medication_name: String,
    pub dosage: String,
    pub form: String,
    pub quantity: u64,
    pub production_date: Timestamp,
    pub expiry_date: Timestamp,
}
