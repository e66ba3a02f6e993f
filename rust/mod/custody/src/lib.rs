//! Pharmaceutical chain-of-custody: manufacturer admission and the batch
//! custody ledger.

pub mod model;
pub mod service;
pub mod store;

use std::sync::Arc;

use tracing::info;

use pharmatrace_core::{Clock, ServiceConfig, ServiceError};
use pharmatrace_kv::{KVStore, RedbStore};

use service::{BatchLedger, ManufacturerRegistry};

/// Custody module: the registry and the ledger wired onto one store.
pub struct CustodyModule {
    registry: Arc<ManufacturerRegistry>,
    ledger: Arc<BatchLedger>,
}

impl CustodyModule {
    /// Build both components on an existing KV backend.
    ///
    /// Fails if `config` names no administrator.
    pub fn new(
        kv: Arc<dyn KVStore>,
        config: &ServiceConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServiceError> {
        let admin = config.administrator()?;
        let registry = Arc::new(ManufacturerRegistry::new(
            Arc::clone(&kv),
            admin.clone(),
            Arc::clone(&clock),
        ));

        let mut ledger = BatchLedger::new(kv, clock);
        if config.verify_manufacturer {
            ledger = ledger.with_manufacturer_check(Arc::clone(&registry));
        }
        if config.admin_recall {
            ledger = ledger.with_admin_recall(admin.clone());
        }

        info!(
            admin = %admin.principal(),
            verify_manufacturer = config.verify_manufacturer,
            admin_recall = config.admin_recall,
            "Custody module initialized"
        );
        Ok(Self {
            registry,
            ledger: Arc::new(ledger),
        })
    }

    /// Open the redb database named by `config` and build on it.
    pub fn open(config: &ServiceConfig, clock: Arc<dyn Clock>) -> Result<Self, ServiceError> {
        if let Some(dir) = &config.data_dir {
            std::fs::create_dir_all(dir).map_err(|e| {
                ServiceError::Storage(format!("create data dir {}: {}", dir.display(), e))
            })?;
        }
        let kv: Arc<dyn KVStore> = Arc::new(
            RedbStore::open(&config.resolve_db_path())
                .map_err(|e| ServiceError::Storage(format!("failed to open KV store: {}", e)))?,
        );
        Self::new(kv, config, clock)
    }

    pub fn registry(&self) -> &Arc<ManufacturerRegistry> {
        &self.registry
    }

    pub fn ledger(&self) -> &Arc<BatchLedger> {
        &self.ledger
    }
}
