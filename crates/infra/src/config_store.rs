//! System controls, tenant feature flags and the tenant whitelist.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hourbridge_core::{TenantId, UserId};
use hourbridge_federation::{SystemControls, TenantFlag};

use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub tenant_id: TenantId,
    pub approved_by: UserId,
    pub approved_at: DateTime<Utc>,
    pub notes: Option<String>,
}

pub trait ConfigStore: Send + Sync {
    /// Current snapshot. Callers hold the `Arc` for the whole decision.
    fn controls(&self) -> Result<Arc<SystemControls>, StoreError>;

    /// Replace the snapshot if the stored version is still `expected_version`.
    fn replace_controls(
        &self,
        expected_version: u64,
        next: SystemControls,
    ) -> Result<Arc<SystemControls>, StoreError>;

    /// Absent flags read as disabled.
    fn tenant_flag(&self, tenant: TenantId, flag: TenantFlag) -> Result<bool, StoreError>;

    fn set_tenant_flag(&self, tenant: TenantId, flag: TenantFlag, enabled: bool) -> Result<(), StoreError>;

    fn whitelist_entry(&self, tenant: TenantId) -> Result<Option<WhitelistEntry>, StoreError>;

    fn add_to_whitelist(&self, entry: WhitelistEntry) -> Result<(), StoreError>;

    /// Returns whether an entry was removed.
    fn remove_from_whitelist(&self, tenant: TenantId) -> Result<bool, StoreError>;
}

impl<S> ConfigStore for Arc<S>
where
    S: ConfigStore + ?Sized,
{
    fn controls(&self) -> Result<Arc<SystemControls>, StoreError> {
        (**self).controls()
    }

    fn replace_controls(
        &self,
        expected_version: u64,
        next: SystemControls,
    ) -> Result<Arc<SystemControls>, StoreError> {
        (**self).replace_controls(expected_version, next)
    }

    fn tenant_flag(&self, tenant: TenantId, flag: TenantFlag) -> Result<bool, StoreError> {
        (**self).tenant_flag(tenant, flag)
    }

    fn set_tenant_flag(&self, tenant: TenantId, flag: TenantFlag, enabled: bool) -> Result<(), StoreError> {
        (**self).set_tenant_flag(tenant, flag, enabled)
    }

    fn whitelist_entry(&self, tenant: TenantId) -> Result<Option<WhitelistEntry>, StoreError> {
        (**self).whitelist_entry(tenant)
    }

    fn add_to_whitelist(&self, entry: WhitelistEntry) -> Result<(), StoreError> {
        (**self).add_to_whitelist(entry)
    }

    fn remove_from_whitelist(&self, tenant: TenantId) -> Result<bool, StoreError> {
        (**self).remove_from_whitelist(tenant)
    }
}

/// In-memory configuration store for tests/dev.
#[derive(Debug)]
pub struct InMemoryConfigStore {
    controls: RwLock<Arc<SystemControls>>,
    flags: RwLock<HashMap<(TenantId, TenantFlag), bool>>,
    whitelist: RwLock<HashMap<TenantId, WhitelistEntry>>,
    unavailable: AtomicBool,
}

impl InMemoryConfigStore {
    pub fn new(initial: SystemControls) -> Self {
        Self {
            controls: RwLock::new(Arc::new(initial)),
            flags: RwLock::new(HashMap::new()),
            whitelist: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("config store offline".into()));
        }
        Ok(())
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn controls(&self) -> Result<Arc<SystemControls>, StoreError> {
        self.ensure_available()?;
        let current = self
            .controls
            .read()
            .map_err(|_| StoreError::poisoned("system controls"))?;
        Ok(Arc::clone(&current))
    }

    fn replace_controls(
        &self,
        expected_version: u64,
        next: SystemControls,
    ) -> Result<Arc<SystemControls>, StoreError> {
        self.ensure_available()?;
        let mut current = self
            .controls
            .write()
            .map_err(|_| StoreError::poisoned("system controls"))?;
        if current.version != expected_version {
            return Err(StoreError::VersionConflict(format!(
                "system controls: expected version {expected_version}, found {}",
                current.version
            )));
        }
        let next = Arc::new(next);
        *current = Arc::clone(&next);
        Ok(next)
    }

    fn tenant_flag(&self, tenant: TenantId, flag: TenantFlag) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let flags = self.flags.read().map_err(|_| StoreError::poisoned("tenant flags"))?;
        Ok(flags.get(&(tenant, flag)).copied().unwrap_or(false))
    }

    fn set_tenant_flag(&self, tenant: TenantId, flag: TenantFlag, enabled: bool) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut flags = self.flags.write().map_err(|_| StoreError::poisoned("tenant flags"))?;
        flags.insert((tenant, flag), enabled);
        Ok(())
    }

    fn whitelist_entry(&self, tenant: TenantId) -> Result<Option<WhitelistEntry>, StoreError> {
        self.ensure_available()?;
        let list = self.whitelist.read().map_err(|_| StoreError::poisoned("whitelist"))?;
        Ok(list.get(&tenant).cloned())
    }

    fn add_to_whitelist(&self, entry: WhitelistEntry) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut list = self.whitelist.write().map_err(|_| StoreError::poisoned("whitelist"))?;
        list.insert(entry.tenant_id, entry);
        Ok(())
    }

    fn remove_from_whitelist(&self, tenant: TenantId) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let mut list = self.whitelist.write().map_err(|_| StoreError::poisoned("whitelist"))?;
        Ok(list.remove(&tenant).is_some())
    }
}

/// Read-through cache in front of a [`ConfigStore`]. Writes go to the inner
/// store and drop the matching local entry.
#[derive(Debug)]
pub struct CachedConfigStore<S> {
    inner: S,
    controls: TtlCache<(), Arc<SystemControls>>,
    flags: TtlCache<(TenantId, TenantFlag), bool>,
    whitelist: TtlCache<TenantId, Option<WhitelistEntry>>,
}

impl<S> CachedConfigStore<S>
where
    S: ConfigStore,
{
    pub fn new(inner: S, ttl: chrono::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            controls: TtlCache::new(ttl, Arc::clone(&clock)),
            flags: TtlCache::new(ttl, Arc::clone(&clock)),
            whitelist: TtlCache::new(ttl, clock),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S> ConfigStore for CachedConfigStore<S>
where
    S: ConfigStore,
{
    fn controls(&self) -> Result<Arc<SystemControls>, StoreError> {
        self.controls.get_or_try_insert(&(), || self.inner.controls())
    }

    fn replace_controls(
        &self,
        expected_version: u64,
        next: SystemControls,
    ) -> Result<Arc<SystemControls>, StoreError> {
        self.controls.invalidate(&());
        let stored = self.inner.replace_controls(expected_version, next)?;
        self.controls.insert((), Arc::clone(&stored));
        Ok(stored)
    }

    fn tenant_flag(&self, tenant: TenantId, flag: TenantFlag) -> Result<bool, StoreError> {
        self.flags
            .get_or_try_insert(&(tenant, flag), || self.inner.tenant_flag(tenant, flag))
    }

    fn set_tenant_flag(&self, tenant: TenantId, flag: TenantFlag, enabled: bool) -> Result<(), StoreError> {
        self.flags.invalidate(&(tenant, flag));
        self.inner.set_tenant_flag(tenant, flag, enabled)
    }

    fn whitelist_entry(&self, tenant: TenantId) -> Result<Option<WhitelistEntry>, StoreError> {
        self.whitelist
            .get_or_try_insert(&tenant, || self.inner.whitelist_entry(tenant))
    }

    fn add_to_whitelist(&self, entry: WhitelistEntry) -> Result<(), StoreError> {
        self.whitelist.invalidate(&entry.tenant_id);
        self.inner.add_to_whitelist(entry)
    }

    fn remove_from_whitelist(&self, tenant: TenantId) -> Result<bool, StoreError> {
        self.whitelist.invalidate(&tenant);
        self.inner.remove_from_whitelist(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;
    use hourbridge_federation::FederationFeature;

    #[test]
    fn absent_flag_reads_disabled() {
        let store = InMemoryConfigStore::new(SystemControls::initial(Utc::now()));
        let t = TenantId::new();
        assert!(!store.tenant_flag(t, TenantFlag::Federation).unwrap());
        store.set_tenant_flag(t, TenantFlag::Federation, true).unwrap();
        assert!(store.tenant_flag(t, TenantFlag::Federation).unwrap());
        assert!(
            !store
                .tenant_flag(t, TenantFlag::Feature(FederationFeature::Messaging))
                .unwrap()
        );
    }

    #[test]
    fn controls_replace_is_compare_and_swap() {
        let now = Utc::now();
        let store = InMemoryConfigStore::new(SystemControls::initial(now));
        let base = store.controls().unwrap();
        let next = base.revised(UserId::new(), now, |c| c.federation_enabled = true);

        store.replace_controls(base.version, next.clone()).unwrap();
        assert!(matches!(
            store.replace_controls(base.version, next),
            Err(StoreError::VersionConflict(_))
        ));
        // The snapshot taken earlier is untouched.
        assert!(!base.federation_enabled);
    }

    #[test]
    fn cache_serves_reads_until_ttl_and_invalidates_on_write() {
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let inner = Arc::new(InMemoryConfigStore::new(SystemControls::initial(now)));
        let cached = CachedConfigStore::new(Arc::clone(&inner), Duration::minutes(5), clock.clone());
        let t = TenantId::new();

        assert!(!cached.tenant_flag(t, TenantFlag::Federation).unwrap());
        // Written behind the cache's back: not visible until expiry.
        inner.set_tenant_flag(t, TenantFlag::Federation, true).unwrap();
        assert!(!cached.tenant_flag(t, TenantFlag::Federation).unwrap());
        clock.advance(Duration::minutes(5));
        assert!(cached.tenant_flag(t, TenantFlag::Federation).unwrap());

        // Written through the cache: visible immediately.
        cached.set_tenant_flag(t, TenantFlag::Federation, false).unwrap();
        assert!(!cached.tenant_flag(t, TenantFlag::Federation).unwrap());
    }

    #[test]
    fn cached_reads_survive_a_short_outage() {
        let now = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let inner = Arc::new(InMemoryConfigStore::new(SystemControls::initial(now)));
        let cached = CachedConfigStore::new(Arc::clone(&inner), Duration::minutes(5), clock);

        cached.controls().unwrap();
        inner.set_unavailable(true);
        assert!(cached.controls().is_ok());
        assert!(matches!(
            cached.whitelist_entry(TenantId::new()),
            Err(StoreError::Unavailable(_))
        ));
    }
}
