pub mod ledger;
pub mod registry;

pub use ledger::{BatchLedger, PRODUCTION_LOCATION, PRODUCTION_NOTES};
pub use registry::ManufacturerRegistry;
