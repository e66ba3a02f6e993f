//! Typed access to the KV collaborator, plus per-key locks.
//!
//! Models impl [`Record`] to declare their key prefix; [`KvOps`] does the
//! JSON encoding and key construction. [`KeyLocks`] serializes writers of
//! the same entity without a global lock.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Serialize, de::DeserializeOwned};

use pharmatrace_core::{ListParams, ListResult, ServiceError};
use pharmatrace_kv::{KVError, KVStore};

use crate::model::{Batch, CustodyEvent, Manufacturer};

/// Trait implemented by models that live in the KV store.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Human-readable entity name for error messages.
    const KIND: &'static str;

    /// KV key prefix: "custody:{resource}:".
    fn kv_prefix() -> &'static str;

    /// This record's key, without the prefix.
    fn key_value(&self) -> String;
}

impl Record for Manufacturer {
    const KIND: &'static str = "manufacturer";
    fn kv_prefix() -> &'static str {
        "custody:manufacturer:"
    }
    fn key_value(&self) -> String {
        self.id.clone()
    }
}

impl Record for Batch {
    const KIND: &'static str = "batch";
    fn kv_prefix() -> &'static str {
        "custody:batch:"
    }
    fn key_value(&self) -> String {
        self.id.clone()
    }
}

impl Record for CustodyEvent {
    const KIND: &'static str = "custody event";
    fn kv_prefix() -> &'static str {
        "custody:event:"
    }
    fn key_value(&self) -> String {
        self.key().encode()
    }
}

/// KV key of a batch's event counter.
pub(crate) fn counter_key(batch_id: &str) -> String {
    format!("custody:counter:{}", batch_id)
}

pub(crate) fn kv_err(e: KVError) -> ServiceError {
    ServiceError::Storage(e.to_string())
}

/// Typed operations for one [`Record`] type. Holds a reference to the KV backend.
pub struct KvOps<T: Record> {
    kv: Arc<dyn KVStore>,
    _phantom: PhantomData<T>,
}

impl<T: Record> KvOps<T> {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self {
            kv,
            _phantom: PhantomData,
        }
    }

    pub fn make_key(id: &str) -> String {
        format!("{}{}", T::kv_prefix(), id)
    }

    /// Serialize a record into its (key, value) pair for a batched write.
    pub fn encode(record: &T) -> Result<(String, Vec<u8>), ServiceError> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| ServiceError::Internal(format!("serialize {}: {}", T::KIND, e)))?;
        Ok((Self::make_key(&record.key_value()), bytes))
    }

    fn decode(bytes: &[u8]) -> Result<T, ServiceError> {
        serde_json::from_slice(bytes)
            .map_err(|e| ServiceError::Internal(format!("deserialize {}: {}", T::KIND, e)))
    }

    /// Get a record by key value. Returns None if not found.
    pub fn get(&self, id: &str) -> Result<Option<T>, ServiceError> {
        match self.kv.get(&Self::make_key(id)).map_err(kv_err)? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get a record or return NotFound error.
    pub fn get_or_err(&self, id: &str) -> Result<T, ServiceError> {
        self.get(id)?
            .ok_or_else(|| ServiceError::NotFound(format!("{} '{}' not found", T::KIND, id)))
    }

    /// Create a new record. Fails with AlreadyExists if the key is taken.
    ///
    /// The caller must hold the record's key lock, otherwise two creators
    /// can both pass the existence check.
    pub fn save_new(&self, record: &T) -> Result<(), ServiceError> {
        let (key, bytes) = Self::encode(record)?;
        if self.kv.get(&key).map_err(kv_err)?.is_some() {
            return Err(ServiceError::AlreadyExists(format!(
                "{} '{}' already exists",
                T::KIND,
                record.key_value()
            )));
        }
        self.kv.set(&key, &bytes).map_err(kv_err)
    }

    /// Overwrite an existing record.
    pub fn save(&self, record: &T) -> Result<(), ServiceError> {
        let (key, bytes) = Self::encode(record)?;
        self.kv.set(&key, &bytes).map_err(kv_err)
    }

    /// List all records with this prefix, in key order.
    pub fn list(&self) -> Result<Vec<T>, ServiceError> {
        let entries = self.kv.scan(T::kv_prefix()).map_err(kv_err)?;
        entries.iter().map(|(_key, bytes)| Self::decode(bytes)).collect()
    }

    /// List records with pagination (limit/offset).
    ///
    /// Scans all entries then slices in memory. For KV stores the full scan
    /// is unavoidable; pagination just controls how much is returned to the caller.
    pub fn list_paginated(&self, params: &ListParams) -> Result<ListResult<T>, ServiceError> {
        Ok(ListResult::paginate(self.list()?, params))
    }
}

/// One mutex per entity key, created on demand and dropped when idle.
#[derive(Default)]
pub struct KeyLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`. Callers on other keys are
    /// not blocked. The slot is released even if `f` panics.
    pub fn with<R>(&self, key: &str, f: impl FnOnce() -> R) -> R {
        let release = SlotRelease {
            locks: self,
            key,
            slot: lock(&self.slots).entry(key.to_string()).or_default().clone(),
        };
        let _guard = lock(&release.slot);
        f()
    }

    /// Number of keys currently locked or waited on.
    pub fn active(&self) -> usize {
        lock(&self.slots).len()
    }
}

/// Drops a key's slot from the table once its last user is gone.
struct SlotRelease<'a> {
    locks: &'a KeyLocks,
    key: &'a str,
    slot: Arc<Mutex<()>>,
}

impl Drop for SlotRelease<'_> {
    fn drop(&mut self) {
        // Slots are only cloned under the table lock, so a count of two
        // (table + ours) means nobody else holds or waits on it.
        let mut slots = lock(&self.locks.slots);
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use pharmatrace_core::Principal;

    use crate::model::{BatchStatus, ManufacturerInfo, ManufacturerStatus};

    fn manufacturer(id: &str) -> Manufacturer {
        Manufacturer {
            id: id.into(),
            info: ManufacturerInfo {
                name: "Acme Pharma".into(),
                license_number: "LIC-1".into(),
                location: "NJ".into(),
                contact_info: "ops@acme.test".into(),
            },
            status: ManufacturerStatus::Pending,
            registration_date: 100,
            last_verified_date: 100,
        }
    }

    fn make_ops<T: Record>() -> (KvOps<T>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let kv: Arc<dyn KVStore> =
            Arc::new(pharmatrace_kv::RedbStore::open(&dir.path().join("test.redb")).unwrap());
        (KvOps::new(kv), dir)
    }

    #[test]
    fn save_new_then_get() {
        let (ops, _dir) = make_ops::<Manufacturer>();
        ops.save_new(&manufacturer("M1")).unwrap();

        let fetched = ops.get_or_err("M1").unwrap();
        assert_eq!(fetched.info.name, "Acme Pharma");
        assert!(ops.get("M2").unwrap().is_none());
    }

    #[test]
    fn duplicate_key_rejected() {
        let (ops, _dir) = make_ops::<Manufacturer>();
        ops.save_new(&manufacturer("M1")).unwrap();

        let mut second = manufacturer("M1");
        second.info.name = "Impostor".into();
        let err = ops.save_new(&second).unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(_)));
        assert_eq!(ops.get_or_err("M1").unwrap().info.name, "Acme Pharma");
    }

    #[test]
    fn get_or_err_returns_not_found() {
        let (ops, _dir) = make_ops::<Batch>();
        let err = ops.get_or_err("nope").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(err.to_string(), "batch 'nope' not found");
    }

    #[test]
    fn list_is_scoped_to_prefix() {
        let kv: Arc<dyn KVStore> = Arc::new(pharmatrace_kv::MemoryStore::new());
        let manufacturers = KvOps::<Manufacturer>::new(kv.clone());
        let batches = KvOps::<Batch>::new(kv);

        manufacturers.save_new(&manufacturer("M1")).unwrap();
        batches
            .save_new(&Batch {
                id: "B1".into(),
                manufacturer_id: "M1".into(),
                medication_name: "Ibuprofen".into(),
                dosage: "200mg".into(),
                form: "Tablet".into(),
                quantity: 10,
                production_date: 1,
                expiry_date: 2,
                current_custodian: Principal::from("A"),
                status: BatchStatus::Produced,
            })
            .unwrap();

        assert_eq!(manufacturers.list().unwrap().len(), 1);
        assert_eq!(batches.list().unwrap().len(), 1);
    }

    #[test]
    fn key_locks_serialize_same_key() {
        let locks = Arc::new(KeyLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let overlaps = overlaps.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        locks.with("batch:B1", || {
                            if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                                overlaps.fetch_add(1, Ordering::SeqCst);
                            }
                            thread::yield_now();
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn key_locks_are_independent_per_key() {
        let locks = KeyLocks::new();
        let nested = locks.with("batch:B1", || locks.with("batch:B2", || 7));
        assert_eq!(nested, 7);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn key_locks_release_slot_after_panic() {
        let locks = KeyLocks::new();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            locks.with("batch:B1", || panic!("writer failed"))
        }));
        assert!(outcome.is_err());
        assert_eq!(locks.active(), 0);

        // The key is usable again afterwards.
        assert_eq!(locks.with("batch:B1", || 3), 3);
        assert_eq!(locks.active(), 0);
    }
}
