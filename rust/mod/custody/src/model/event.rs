use serde::{Deserialize, Serialize};

use pharmatrace_core::{Principal, Timestamp};

/// What a custody event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Production,
    Transfer,
    Delivery,
    Dispensing,
    Recall,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Transfer => "transfer",
            Self::Delivery => "delivery",
            Self::Dispensing => "dispensing",
            Self::Recall => "recall",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite key of a custody event: the batch and its position in that
/// batch's log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub batch_id: String,
    pub event_id: u64,
}

impl EventKey {
    pub fn new(batch_id: impl Into<String>, event_id: u64) -> Self {
        Self {
            batch_id: batch_id.into(),
            event_id,
        }
    }

    /// Storage suffix. The event id is fixed-width so keys of one batch sort
    /// in log order and the batch id can be recovered unambiguously.
    pub fn encode(&self) -> String {
        format!("{}:{:020}", self.batch_id, self.event_id)
    }
}

/// CustodyEvent: one immutable entry of a batch's provenance log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CustodyEvent {
    pub batch_id: String,
    pub event_id: u64,
    pub from: Principal,
    pub to: Principal,
    pub timestamp: Timestamp,
    pub location: String,
    pub event_type: EventType,
    pub notes: String,
}

impl CustodyEvent {
    pub fn key(&self) -> EventKey {
        EventKey::new(self.batch_id.clone(), self.event_id)
    }
}
