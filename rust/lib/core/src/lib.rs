pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use auth::{Administrator, Principal};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ServiceConfig;
pub use error::{ErrorKind, ServiceError};
pub use types::{ListParams, ListResult, Timestamp};
