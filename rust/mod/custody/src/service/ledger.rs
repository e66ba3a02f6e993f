use std::sync::Arc;

use tracing::{debug, info, warn};

use pharmatrace_core::{Administrator, Clock, ListParams, ListResult, Principal, ServiceError};
use pharmatrace_kv::KVStore;

use crate::model::{
    Batch, BatchStatus, CustodyEvent, EventKey, EventType, RegisterBatchInput,
};
use crate::service::registry::ManufacturerRegistry;
use crate::store::{KeyLocks, KvOps, counter_key, kv_err};

/// Location recorded on every production event.
pub const PRODUCTION_LOCATION: &str = "Production Facility";
/// Notes recorded on every production event.
pub const PRODUCTION_NOTES: &str = "Batch produced";

/// A custody change requested on an existing batch.
#[derive(Debug, Clone)]
enum Change {
    Transfer { to: Principal },
    Deliver,
    Dispense,
    Recall,
}

impl Change {
    fn event_type(&self) -> EventType {
        match self {
            Change::Transfer { .. } => EventType::Transfer,
            Change::Deliver => EventType::Delivery,
            Change::Dispense => EventType::Dispensing,
            Change::Recall => EventType::Recall,
        }
    }

    fn target_status(&self) -> BatchStatus {
        match self {
            Change::Transfer { .. } => BatchStatus::Transit,
            Change::Deliver => BatchStatus::Delivered,
            Change::Dispense => BatchStatus::Dispensed,
            Change::Recall => BatchStatus::Recalled,
        }
    }
}

/// Batch custody ledger: batch records, the custody state machine, and the
/// append-only per-batch event log.
///
/// Every mutation of a batch runs under that batch's lock and lands in the
/// store as a single batched write (batch record + new event + counter), so
/// readers never observe a custody change without its event or vice versa.
pub struct BatchLedger {
    kv: Arc<dyn KVStore>,
    batches: KvOps<Batch>,
    events: KvOps<CustodyEvent>,
    clock: Arc<dyn Clock>,
    locks: KeyLocks,
    /// When set, batch registration requires an approved manufacturer.
    registry: Option<Arc<ManufacturerRegistry>>,
    /// When set, this identity may recall batches it does not hold.
    recall_admin: Option<Administrator>,
}

impl BatchLedger {
    pub fn new(kv: Arc<dyn KVStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            batches: KvOps::new(kv.clone()),
            events: KvOps::new(kv.clone()),
            kv,
            clock,
            locks: KeyLocks::new(),
            registry: None,
            recall_admin: None,
        }
    }

    /// Require `manufacturer_id` of new batches to name an approved manufacturer.
    pub fn with_manufacturer_check(mut self, registry: Arc<ManufacturerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Allow `admin` to recall any batch, in addition to its custodian.
    pub fn with_admin_recall(mut self, admin: Administrator) -> Self {
        self.recall_admin = Some(admin);
        self
    }

    // =======================================================================
    // Mutations
    // =======================================================================

    /// Register a new batch held by `caller`, and record its production event.
    pub fn register_batch(
        &self,
        caller: &Principal,
        input: RegisterBatchInput,
    ) -> Result<Batch, ServiceError> {
        let id = input.id.clone();
        self.locks.with(&id, || {
            if self.batches.get(&id)?.is_some() {
                debug!(batch = %id, "register rejected: exists");
                return Err(ServiceError::AlreadyExists(format!("batch '{}' already exists", id)));
            }
            if input.expiry_date <= input.production_date {
                debug!(batch = %id, "register rejected: expiry not after production");
                return Err(ServiceError::InvalidDates(format!(
                    "batch '{}': expiry date {} must be after production date {}",
                    id, input.expiry_date, input.production_date
                )));
            }
            if let Some(registry) = &self.registry {
                Self::check_manufacturer(registry, &input.manufacturer_id)?;
            }

            let batch = Batch {
                id: input.id,
                manufacturer_id: input.manufacturer_id,
                medication_name: input.medication_name,
                dosage: input.dosage,
                form: input.form,
                quantity: input.quantity,
                production_date: input.production_date,
                expiry_date: input.expiry_date,
                current_custodian: caller.clone(),
                status: BatchStatus::Produced,
            };
            self.append_event(
                &batch,
                caller,
                caller,
                EventType::Production,
                PRODUCTION_LOCATION,
                PRODUCTION_NOTES,
            )?;
            Ok(batch)
        })
    }

    /// Hand the batch to `to`. Status becomes TRANSIT.
    pub fn transfer_batch(
        &self,
        caller: &Principal,
        id: &str,
        to: &Principal,
        location: &str,
        notes: &str,
    ) -> Result<Batch, ServiceError> {
        self.change(caller, id, Change::Transfer { to: to.clone() }, location, notes)
    }

    /// Mark the batch delivered at `location`. Custodian unchanged.
    pub fn deliver_batch(
        &self,
        caller: &Principal,
        id: &str,
        location: &str,
        notes: &str,
    ) -> Result<Batch, ServiceError> {
        self.change(caller, id, Change::Deliver, location, notes)
    }

    /// Mark a delivered batch dispensed at `location`. Custodian unchanged.
    /// Any other status is refused with `Unauthorized`.
    pub fn dispense_batch(
        &self,
        caller: &Principal,
        id: &str,
        location: &str,
        notes: &str,
    ) -> Result<Batch, ServiceError> {
        self.change(caller, id, Change::Dispense, location, notes)
    }

    /// Recall the batch. Terminal: no custody change succeeds afterwards.
    pub fn recall_batch(
        &self,
        caller: &Principal,
        id: &str,
        notes: &str,
    ) -> Result<Batch, ServiceError> {
        self.change(caller, id, Change::Recall, "", notes)
    }

    fn change(
        &self,
        caller: &Principal,
        id: &str,
        change: Change,
        location: &str,
        notes: &str,
    ) -> Result<Batch, ServiceError> {
        self.locks.with(id, || {
            let mut batch = self.batches.get_or_err(id)?;

            if batch.current_custodian != *caller {
                let admin_recall = matches!(change, Change::Recall)
                    && self.recall_admin.as_ref().is_some_and(|a| a.is(caller));
                if !admin_recall {
                    debug!(batch = id, caller = %caller, "{} rejected: not custodian", change.event_type());
                    return Err(ServiceError::Unauthorized(format!(
                        "{} is not the custodian of batch '{}'",
                        caller, id
                    )));
                }
                warn!(batch = id, admin = %caller, custodian = %batch.current_custodian, "administrator recall");
            }

            if batch.status.is_terminal() {
                debug!(batch = id, "{} rejected: recalled", change.event_type());
                return Err(ServiceError::AlreadyRecalled(format!(
                    "batch '{}' has been recalled",
                    id
                )));
            }

            if matches!(change, Change::Dispense) && batch.status != BatchStatus::Delivered {
                debug!(batch = id, status = %batch.status, "dispensing rejected: not delivered");
                return Err(ServiceError::Unauthorized(format!(
                    "batch '{}' is {} and may only be dispensed once delivered",
                    id, batch.status
                )));
            }

            let to = match &change {
                Change::Transfer { to } => {
                    batch.current_custodian = to.clone();
                    to.clone()
                }
                _ => caller.clone(),
            };
            batch.status = change.target_status();

            self.append_event(&batch, caller, &to, change.event_type(), location, notes)?;
            Ok(batch)
        })
    }

    fn check_manufacturer(
        registry: &ManufacturerRegistry,
        manufacturer_id: &str,
    ) -> Result<(), ServiceError> {
        if registry.get(manufacturer_id)?.is_none() {
            return Err(ServiceError::NotFound(format!(
                "manufacturer '{}' not found",
                manufacturer_id
            )));
        }
        if !registry.is_approved(manufacturer_id)? {
            return Err(ServiceError::Unauthorized(format!(
                "manufacturer '{}' is not approved",
                manufacturer_id
            )));
        }
        Ok(())
    }

    /// Persist `batch` together with the next event of its log.
    ///
    /// Reads counter `n`, writes event `n` and counter `n + 1` and the batch
    /// record in one store write. The caller must hold the batch lock.
    fn append_event(
        &self,
        batch: &Batch,
        from: &Principal,
        to: &Principal,
        event_type: EventType,
        location: &str,
        notes: &str,
    ) -> Result<CustodyEvent, ServiceError> {
        let event_id = self.get_event_count(&batch.id)?;
        let event = CustodyEvent {
            batch_id: batch.id.clone(),
            event_id,
            from: from.clone(),
            to: to.clone(),
            timestamp: self.clock.now(),
            location: location.to_string(),
            event_type,
            notes: notes.to_string(),
        };

        let (batch_key, batch_bytes) = KvOps::<Batch>::encode(batch)?;
        let (event_key, event_bytes) = KvOps::<CustodyEvent>::encode(&event)?;
        let counter_bytes = serde_json::to_vec(&(event_id + 1))
            .map_err(|e| ServiceError::Internal(format!("serialize counter: {}", e)))?;
        let counter = counter_key(&batch.id);

        self.kv
            .batch_set(&[
                (batch_key.as_str(), batch_bytes.as_slice()),
                (event_key.as_str(), event_bytes.as_slice()),
                (counter.as_str(), counter_bytes.as_slice()),
            ])
            .map_err(kv_err)?;

        info!(
            batch = %batch.id,
            event_id,
            event_type = %event_type,
            status = %batch.status,
            custodian = %batch.current_custodian,
            "custody event appended"
        );
        Ok(event)
    }

    // =======================================================================
    // Queries
    // =======================================================================

    pub fn get_batch(&self, id: &str) -> Result<Option<Batch>, ServiceError> {
        self.batches.get(id)
    }

    /// Event `event_id` of batch `id`, or None if out of range.
    pub fn get_custody_event(
        &self,
        id: &str,
        event_id: u64,
    ) -> Result<Option<CustodyEvent>, ServiceError> {
        self.events.get(&EventKey::new(id, event_id).encode())
    }

    /// Number of events recorded for batch `id`; 0 for an unknown batch.
    pub fn get_event_count(&self, id: &str) -> Result<u64, ServiceError> {
        match self.kv.get(&counter_key(id)).map_err(kv_err)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ServiceError::Internal(format!("deserialize counter: {}", e))),
            None => Ok(0),
        }
    }

    /// The whole custody history of batch `id`, oldest first.
    pub fn list_events(&self, id: &str) -> Result<Vec<CustodyEvent>, ServiceError> {
        let count = self.get_event_count(id)?;
        let mut events = Vec::new();
        for event_id in 0..count {
            let event = self.get_custody_event(id, event_id)?.ok_or_else(|| {
                ServiceError::Internal(format!("batch '{}' is missing event {}", id, event_id))
            })?;
            events.push(event);
        }
        Ok(events)
    }

    pub fn list_batches(&self, params: &ListParams) -> Result<ListResult<Batch>, ServiceError> {
        self.batches.list_paginated(params)
    }
}
