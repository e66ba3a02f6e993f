use std::sync::Arc;

use tracing::{debug, info};

use pharmatrace_core::{Administrator, Clock, ListParams, ListResult, Principal, ServiceError};
use pharmatrace_kv::KVStore;

use crate::model::{Manufacturer, ManufacturerInfo, ManufacturerStatus};
use crate::store::{KeyLocks, KvOps};

/// Manufacturer admission workflow.
///
/// Anyone may register or update a manufacturer; only the administrator
/// may approve or revoke one. Writes to the same manufacturer id are
/// serialized by a per-id lock.
pub struct ManufacturerRegistry {
    manufacturers: KvOps<Manufacturer>,
    admin: Administrator,
    clock: Arc<dyn Clock>,
    locks: KeyLocks,
}

impl ManufacturerRegistry {
    pub fn new(kv: Arc<dyn KVStore>, admin: Administrator, clock: Arc<dyn Clock>) -> Self {
        Self {
            manufacturers: KvOps::new(kv),
            admin,
            clock,
            locks: KeyLocks::new(),
        }
    }

    /// Register a manufacturer in PENDING status.
    pub fn register(&self, id: &str, info: ManufacturerInfo) -> Result<Manufacturer, ServiceError> {
        self.locks.with(id, || {
            let now = self.clock.now();
            let record = Manufacturer {
                id: id.to_string(),
                info,
                status: ManufacturerStatus::Pending,
                registration_date: now,
                last_verified_date: now,
            };
            self.manufacturers.save_new(&record).inspect_err(|e| {
                debug!(manufacturer = id, "register rejected: {}", e);
            })?;
            info!(manufacturer = id, "manufacturer registered");
            Ok(record)
        })
    }

    /// Overwrite the descriptive fields. Status is left alone.
    ///
    /// There is no caller check here: any identity may update any
    /// manufacturer's details.
    pub fn update_info(&self, id: &str, info: ManufacturerInfo) -> Result<Manufacturer, ServiceError> {
        self.locks.with(id, || {
            let mut record = self.manufacturers.get_or_err(id)?;
            record.info = info;
            record.last_verified_date = self.clock.now();
            self.manufacturers.save(&record)?;
            info!(manufacturer = id, "manufacturer info updated");
            Ok(record)
        })
    }

    /// PENDING → APPROVED. Administrator only. A revoked manufacturer stays revoked.
    pub fn approve(&self, caller: &Principal, id: &str) -> Result<Manufacturer, ServiceError> {
        self.transition(caller, id, ManufacturerStatus::Approved)
    }

    /// Any status → REVOKED. Administrator only.
    pub fn revoke(&self, caller: &Principal, id: &str) -> Result<Manufacturer, ServiceError> {
        self.transition(caller, id, ManufacturerStatus::Revoked)
    }

    fn transition(
        &self,
        caller: &Principal,
        id: &str,
        to: ManufacturerStatus,
    ) -> Result<Manufacturer, ServiceError> {
        self.locks.with(id, || {
            // Existence is reported before authorization.
            let mut record = self.manufacturers.get_or_err(id)?;
            let action = match to {
                ManufacturerStatus::Approved => "approve manufacturer",
                _ => "revoke manufacturer",
            };
            self.admin.check(caller, action).inspect_err(|_| {
                debug!(manufacturer = id, caller = %caller, "{} rejected: not administrator", action);
            })?;

            if record.status == ManufacturerStatus::Revoked && to == ManufacturerStatus::Approved {
                debug!(manufacturer = id, "approve rejected: revoked");
                return Err(ServiceError::Unauthorized(format!(
                    "manufacturer '{}' is revoked and cannot be re-approved",
                    id
                )));
            }

            record.status = to;
            record.last_verified_date = self.clock.now();
            self.manufacturers.save(&record)?;
            info!(manufacturer = id, status = %to, "manufacturer status changed");
            Ok(record)
        })
    }

    pub fn get(&self, id: &str) -> Result<Option<Manufacturer>, ServiceError> {
        self.manufacturers.get(id)
    }

    /// True only for a known manufacturer whose status is exactly APPROVED.
    pub fn is_approved(&self, id: &str) -> Result<bool, ServiceError> {
        Ok(self
            .manufacturers
            .get(id)?
            .is_some_and(|m| m.status == ManufacturerStatus::Approved))
    }

    pub fn list(&self, params: &ListParams) -> Result<ListResult<Manufacturer>, ServiceError> {
        self.manufacturers.list_paginated(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pharmatrace_core::ManualClock;
    use pharmatrace_kv::MemoryStore;

    const T0: i64 = 1625097600;
    const ADMIN: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";
    const OTHER: &str = "SP3FGQ8Z7JY9BWYZ5WM53E0M9NK7WHJF0691NZ159";

    fn make_registry() -> (ManufacturerRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        let registry = ManufacturerRegistry::new(
            Arc::new(MemoryStore::new()),
            Administrator::new(ADMIN.into()),
            clock.clone(),
        );
        (registry, clock)
    }

    fn info(name: &str) -> ManufacturerInfo {
        ManufacturerInfo {
            name: name.into(),
            license_number: "LIC-12345".into(),
            location: "New Jersey, USA".into(),
            contact_info: "contact@acmepharma.com".into(),
        }
    }

    #[test]
    fn register_starts_pending() {
        let (registry, _clock) = make_registry();
        let m = registry.register("M1", info("Acme Pharma")).unwrap();
        assert_eq!(m.status, ManufacturerStatus::Pending);
        assert_eq!(m.registration_date, T0);
        assert_eq!(m.last_verified_date, T0);
        assert!(!registry.is_approved("M1").unwrap());
    }

    #[test]
    fn duplicate_register_keeps_first() {
        let (registry, _clock) = make_registry();
        registry.register("M1", info("Acme Pharma")).unwrap();
        let err = registry.register("M1", info("Other Pharma")).unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(_)));
        assert_eq!(registry.get("M1").unwrap().unwrap().info.name, "Acme Pharma");
    }

    #[test]
    fn update_info_refreshes_verification_not_status() {
        let (registry, clock) = make_registry();
        registry.register("M1", info("Acme Pharma")).unwrap();
        registry.approve(&ADMIN.into(), "M1").unwrap();

        clock.advance(3600);
        let m = registry.update_info("M1", info("Acme Pharma Inc")).unwrap();
        assert_eq!(m.info.name, "Acme Pharma Inc");
        assert_eq!(m.status, ManufacturerStatus::Approved);
        assert_eq!(m.registration_date, T0);
        assert_eq!(m.last_verified_date, T0 + 3600);
    }

    #[test]
    fn update_info_needs_no_privilege_but_needs_record() {
        let (registry, _clock) = make_registry();
        let err = registry.update_info("missing", info("X")).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn approve_and_revoke_by_admin() {
        let (registry, clock) = make_registry();
        registry.register("M1", info("Acme Pharma")).unwrap();

        clock.advance(10);
        let m = registry.approve(&ADMIN.into(), "M1").unwrap();
        assert_eq!(m.status, ManufacturerStatus::Approved);
        assert_eq!(m.last_verified_date, T0 + 10);
        assert!(registry.is_approved("M1").unwrap());

        let m = registry.revoke(&ADMIN.into(), "M1").unwrap();
        assert_eq!(m.status, ManufacturerStatus::Revoked);
        assert!(!registry.is_approved("M1").unwrap());
    }

    #[test]
    fn non_admin_cannot_approve_or_revoke() {
        let (registry, _clock) = make_registry();
        registry.register("M1", info("Acme Pharma")).unwrap();

        let err = registry.approve(&OTHER.into(), "M1").unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        let err = registry.revoke(&OTHER.into(), "M1").unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        assert_eq!(
            registry.get("M1").unwrap().unwrap().status,
            ManufacturerStatus::Pending
        );
    }

    #[test]
    fn missing_manufacturer_reported_before_authorization() {
        let (registry, _clock) = make_registry();
        let err = registry.approve(&OTHER.into(), "ghost").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let err = registry.revoke(&ADMIN.into(), "ghost").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn revoked_cannot_be_reapproved() {
        let (registry, _clock) = make_registry();
        registry.register("M1", info("Acme Pharma")).unwrap();
        registry.revoke(&ADMIN.into(), "M1").unwrap();

        let err = registry.approve(&ADMIN.into(), "M1").unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        assert_eq!(
            registry.get("M1").unwrap().unwrap().status,
            ManufacturerStatus::Revoked
        );
    }

    #[test]
    fn is_approved_false_for_unknown() {
        let (registry, _clock) = make_registry();
        assert!(!registry.is_approved("nobody").unwrap());
        assert!(registry.get("nobody").unwrap().is_none());
    }

    #[test]
    fn list_paginates_in_id_order() {
        let (registry, _clock) = make_registry();
        for id in ["M3", "M1", "M2"] {
            registry.register(id, info(id)).unwrap();
        }
        let page = registry.list(&ListParams { limit: 2, offset: 0 }).unwrap();
        let ids: Vec<_> = page.items.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["M1", "M2"]);
        assert_eq!(page.total, 3);
        assert!(page.has_more);
    }
}
