use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Callers match on these (or on
// `ErrorKind`), never on the human-readable message string.

/// Stable error code constants.
pub mod error_code {
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const INVALID_DATES: &str = "INVALID_DATES";
    pub const ALREADY_RECALLED: &str = "ALREADY_RECALLED";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

// ── ErrorKind ───────────────────────────────────────────────────────

/// The closed set of domain failures a registry or ledger call may return.
///
/// Storage and internal failures are not domain outcomes and surface only
/// through [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    Unauthorized,
    InvalidDates,
    AlreadyRecalled,
}

impl ErrorKind {
    /// Numeric code carried over from the ledger's original wire contract.
    pub fn code(self) -> u32 {
        match self {
            ErrorKind::AlreadyExists => 1001,
            ErrorKind::NotFound => 1002,
            ErrorKind::Unauthorized => 1003,
            ErrorKind::InvalidDates => 1004,
            ErrorKind::AlreadyRecalled => 1005,
        }
    }
}

// ── ServiceError ────────────────────────────────────────────────────

/// Unified error type returned by every registry and ledger operation.
///
/// The first five variants are domain outcomes (see [`ErrorKind`]); the
/// last two report collaborator or programming failures.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Duplicate id at creation.
    #[error("{0}")]
    AlreadyExists(String),

    /// Unknown batch, manufacturer or event.
    #[error("{0}")]
    NotFound(String),

    /// Caller is not the current custodian or not the administrator.
    #[error("{0}")]
    Unauthorized(String),

    /// Expiry date does not follow the production date.
    #[error("{0}")]
    InvalidDates(String),

    /// The batch has been recalled and accepts no further custody changes.
    #[error("{0}")]
    AlreadyRecalled(String),

    /// Storage backend failure.
    #[error("{0}")]
    Storage(String),

    /// Unexpected internal error (encoding, misconfiguration).
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::AlreadyExists(_) => error_code::ALREADY_EXISTS,
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Unauthorized(_) => error_code::UNAUTHORIZED,
            ServiceError::InvalidDates(_) => error_code::INVALID_DATES,
            ServiceError::AlreadyRecalled(_) => error_code::ALREADY_RECALLED,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// Domain kind of this error, or `None` for storage/internal failures.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ServiceError::AlreadyExists(_) => Some(ErrorKind::AlreadyExists),
            ServiceError::NotFound(_) => Some(ErrorKind::NotFound),
            ServiceError::Unauthorized(_) => Some(ErrorKind::Unauthorized),
            ServiceError::InvalidDates(_) => Some(ErrorKind::InvalidDates),
            ServiceError::AlreadyRecalled(_) => Some(ErrorKind::AlreadyRecalled),
            ServiceError::Storage(_) | ServiceError::Internal(_) => None,
        }
    }
}
