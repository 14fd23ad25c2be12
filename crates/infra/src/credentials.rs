//! Partner credential storage, issuance and revocation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use hourbridge_auth::{
    CredentialLookup, CredentialOwner, CredentialStatus, LookupError, PartnerCredential, ScopeSet,
    generate_api_key, hash_api_key,
};
use hourbridge_core::{CredentialId, DomainError, ExpectedVersion, TenantId};

use crate::error::{FederationResult, StoreError};

/// Write side of the credential store.
pub trait CredentialStore: CredentialLookup {
    /// Fails with `Duplicate` on a reused key hash, or while a live credential
    /// of another issuing tenant holds the same platform id.
    fn insert(&self, credential: PartnerCredential) -> Result<(), StoreError>;

    /// Replace a credential if its stored version is still `expected_version`.
    fn update(&self, credential: PartnerCredential, expected_version: u64) -> Result<(), StoreError>;

    fn list_for_tenant(&self, issuing_tenant: TenantId) -> Result<Vec<PartnerCredential>, StoreError>;
}

impl<S> CredentialStore for Arc<S>
where
    S: CredentialStore + ?Sized,
{
    fn insert(&self, credential: PartnerCredential) -> Result<(), StoreError> {
        (**self).insert(credential)
    }

    fn update(&self, credential: PartnerCredential, expected_version: u64) -> Result<(), StoreError> {
        (**self).update(credential, expected_version)
    }

    fn list_for_tenant(&self, issuing_tenant: TenantId) -> Result<Vec<PartnerCredential>, StoreError> {
        (**self).list_for_tenant(issuing_tenant)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    rows: RwLock<HashMap<CredentialId, PartnerCredential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<CredentialId, PartnerCredential>>, StoreError> {
        self.rows.read().map_err(|_| StoreError::poisoned("credentials"))
    }
}

impl CredentialLookup for InMemoryCredentialStore {
    fn find_by_key_hash(&self, key_hash: &str) -> Result<Option<PartnerCredential>, LookupError> {
        let rows = self.read()?;
        Ok(rows.values().find(|c| c.api_key_hash == key_hash).cloned())
    }

    fn find_by_platform(&self, platform_id: &str) -> Result<Option<PartnerCredential>, LookupError> {
        let rows = self.read()?;
        let mut matching: Vec<&PartnerCredential> = rows
            .values()
            .filter(|c| c.platform_id() == Some(platform_id))
            .collect();
        matching.sort_by(|a, b| {
            let active = |c: &PartnerCredential| c.status == CredentialStatus::Active;
            active(b)
                .cmp(&active(a))
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(matching.first().map(|c| (*c).clone()))
    }

    fn get(&self, id: CredentialId) -> Result<Option<PartnerCredential>, LookupError> {
        let rows = self.read()?;
        Ok(rows.get(&id).cloned())
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn insert(&self, credential: PartnerCredential) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned("credentials"))?;
        if rows.values().any(|c| c.api_key_hash == credential.api_key_hash) {
            return Err(StoreError::Duplicate("api key hash already registered".into()));
        }
        if let Some(platform_id) = credential.platform_id() {
            let claimed = rows.values().any(|c| {
                c.platform_id() == Some(platform_id)
                    && c.issuing_tenant != credential.issuing_tenant
                    && holds_platform(c, credential.created_at)
            });
            if claimed {
                return Err(StoreError::Duplicate(format!(
                    "platform {platform_id} is already registered by another tenant"
                )));
            }
        }
        rows.insert(credential.id, credential);
        Ok(())
    }

    fn update(&self, credential: PartnerCredential, expected_version: u64) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned("credentials"))?;
        let current = rows
            .get(&credential.id)
            .map(|c| c.version)
            .ok_or_else(|| StoreError::VersionConflict(format!("credential {} missing", credential.id)))?;
        if current != expected_version {
            return Err(StoreError::VersionConflict(format!(
                "credential {}: expected version {expected_version}, found {current}",
                credential.id
            )));
        }
        rows.insert(credential.id, credential);
        Ok(())
    }

    fn list_for_tenant(&self, issuing_tenant: TenantId) -> Result<Vec<PartnerCredential>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned("credentials"))?;
        let mut out: Vec<_> = rows
            .values()
            .filter(|c| c.issuing_tenant == issuing_tenant)
            .cloned()
            .collect();
        out.sort_by_key(|c| c.created_at);
        Ok(out)
    }
}

/// Active and not past its expiry at `at`.
fn holds_platform(credential: &PartnerCredential, at: DateTime<Utc>) -> bool {
    credential.status == CredentialStatus::Active && credential.expires_at.is_none_or(|e| e > at)
}

/// Parameters for a new credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCredential {
    pub owner: CredentialOwner,
    pub issuing_tenant: TenantId,
    pub scopes: ScopeSet,
    pub with_signing_secret: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A freshly issued credential plus the secrets that are shown exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    pub credential: PartnerCredential,
    pub api_key: String,
    pub signing_secret: Option<String>,
}

pub fn issue_credential<S>(store: &S, request: NewCredential, now: DateTime<Utc>) -> FederationResult<IssuedCredential>
where
    S: CredentialStore + ?Sized,
{
    if let CredentialOwner::ExternalPlatform { platform_id } = &request.owner {
        if platform_id.trim().is_empty() {
            return Err(DomainError::validation("platform id is required").into());
        }
    }
    if request.scopes.is_empty() {
        return Err(DomainError::validation("a credential needs at least one scope").into());
    }
    if request.expires_at.is_some_and(|at| at <= now) {
        return Err(DomainError::validation("credential expiry must be in the future").into());
    }

    let api_key = generate_api_key();
    let signing_secret = request.with_signing_secret.then(generate_api_key);
    let credential = PartnerCredential {
        id: CredentialId::new(),
        owner: request.owner,
        issuing_tenant: request.issuing_tenant,
        api_key_hash: hash_api_key(&api_key),
        signing_secret: signing_secret.clone(),
        scopes: request.scopes,
        status: CredentialStatus::Active,
        expires_at: request.expires_at,
        created_at: now,
        revoked_at: None,
        version: 1,
    };
    store.insert(credential.clone())?;

    Ok(IssuedCredential {
        credential,
        api_key,
        signing_secret,
    })
}

/// Compare-and-swap revocation. Revoking twice is a conflict.
pub fn revoke_credential<S>(
    store: &S,
    id: CredentialId,
    expected: ExpectedVersion,
    now: DateTime<Utc>,
) -> FederationResult<PartnerCredential>
where
    S: CredentialStore + ?Sized,
{
    let current = store
        .get(id)
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
        .ok_or_else(|| DomainError::not_found(format!("credential {id}")))?;

    expected.check(Some(current.version))?;
    if current.status == CredentialStatus::Revoked {
        return Err(DomainError::conflict(format!("credential {id} is already revoked")).into());
    }

    let mut revoked = current.clone();
    revoked.status = CredentialStatus::Revoked;
    revoked.revoked_at = Some(now);
    revoked.version = current.version + 1;
    store.update(revoked.clone(), current.version)?;
    Ok(revoked)
}
