use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use hourbridge_core::UserId;
use hourbridge_federation::UserFederationSettings;

use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::error::StoreError;

/// Per-user federation settings.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, user: UserId) -> Result<Option<UserFederationSettings>, StoreError>;

    fn upsert(&self, settings: UserFederationSettings) -> Result<(), StoreError>;
}

impl<S> PreferenceStore for Arc<S>
where
    S: PreferenceStore + ?Sized,
{
    fn get(&self, user: UserId) -> Result<Option<UserFederationSettings>, StoreError> {
        (**self).get(user)
    }

    fn upsert(&self, settings: UserFederationSettings) -> Result<(), StoreError> {
        (**self).upsert(settings)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    rows: RwLock<HashMap<UserId, UserFederationSettings>>,
    unavailable: AtomicBool,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn get(&self, user: UserId) -> Result<Option<UserFederationSettings>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("preference store offline".into()));
        }
        let rows = self.rows.read().map_err(|_| StoreError::poisoned("preferences"))?;
        Ok(rows.get(&user).cloned())
    }

    fn upsert(&self, settings: UserFederationSettings) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("preference store offline".into()));
        }
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned("preferences"))?;
        rows.insert(settings.user_id, settings);
        Ok(())
    }
}

#[derive(Debug)]
pub struct CachedPreferenceStore<S> {
    inner: S,
    cache: TtlCache<UserId, Option<UserFederationSettings>>,
}

impl<S> CachedPreferenceStore<S>
where
    S: PreferenceStore,
{
    pub fn new(inner: S, ttl: chrono::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl, clock),
        }
    }
}

impl<S> PreferenceStore for CachedPreferenceStore<S>
where
    S: PreferenceStore,
{
    fn get(&self, user: UserId) -> Result<Option<UserFederationSettings>, StoreError> {
        self.cache.get_or_try_insert(&user, || self.inner.get(user))
    }

    fn upsert(&self, settings: UserFederationSettings) -> Result<(), StoreError> {
        let user = settings.user_id;
        self.cache.invalidate(&user);
        self.inner.upsert(settings)
    }
}
