use serde::{Deserialize, Serialize};

use pharmatrace_core::Timestamp;

/// Manufacturer admission status.
///
/// ```text
/// PENDING → APPROVED → REVOKED
///         → REVOKED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ManufacturerStatus {
    #[default]
    Pending,
    Approved,
    Revoked,
}

impl ManufacturerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Revoked => "revoked",
        }
    }
}

impl std::fmt::Display for ManufacturerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller-editable part of a manufacturer record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManufacturerInfo {
    pub name: String,
    pub license_number: String,
    pub location: String,
    pub contact_info: String,
}

/// Manufacturer: a producer applying for (or holding) trusted status.
/// PK = id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Manufacturer {
    /// Caller-supplied primary key.
    pub id: String,

    #[serde(flatten)]
    pub info: ManufacturerInfo,

    #[serde(default)]
    pub status: ManufacturerStatus,

    pub registration_date: Timestamp,

    /// Refreshed by every successful update, approval or revocation.
    pub last_verified_date: Timestamp,
}
