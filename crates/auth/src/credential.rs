//! Partner credentials: the records behind API keys and HMAC signing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use hourbridge_core::{CredentialId, TenantId};

use crate::error::{CredentialError, LookupError};
use crate::scope::ScopeSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialOwner {
    /// An external platform federating with the issuing tenant.
    ExternalPlatform { platform_id: String },
    /// Another tenant of this installation.
    InternalTenant { tenant_id: TenantId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Active,
    Revoked,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerCredential {
    pub id: CredentialId,
    pub owner: CredentialOwner,
    pub issuing_tenant: TenantId,
    /// Lowercase hex SHA-256 of the API key. The key itself is never stored.
    pub api_key_hash: String,
    pub signing_secret: Option<String>,
    pub scopes: ScopeSet,
    pub status: CredentialStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl PartnerCredential {
    /// Bearer-token subject: the platform id, or the owning tenant's id.
    pub fn subject(&self) -> String {
        match &self.owner {
            CredentialOwner::ExternalPlatform { platform_id } => platform_id.clone(),
            CredentialOwner::InternalTenant { tenant_id } => tenant_id.to_string(),
        }
    }

    pub fn platform_id(&self) -> Option<&str> {
        match &self.owner {
            CredentialOwner::ExternalPlatform { platform_id } => Some(platform_id),
            CredentialOwner::InternalTenant { .. } => None,
        }
    }

    /// Revoked or expired credentials fail even when the key hash matches.
    pub fn ensure_usable(&self, now: DateTime<Utc>) -> Result<(), CredentialError> {
        match self.status {
            CredentialStatus::Revoked => Err(CredentialError::Revoked),
            CredentialStatus::Expired => Err(CredentialError::Expired),
            CredentialStatus::Active => match self.expires_at {
                Some(expires_at) if expires_at <= now => Err(CredentialError::Expired),
                _ => Ok(()),
            },
        }
    }
}

pub fn hash_api_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

/// Fresh random API key. Returned once to the caller; only its hash is kept.
pub fn generate_api_key() -> String {
    format!(
        "hbk_{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// Read side of the credential store, as seen by the resolver.
pub trait CredentialLookup: Send + Sync {
    fn find_by_key_hash(&self, key_hash: &str) -> Result<Option<PartnerCredential>, LookupError>;

    /// Newest active credential for an external platform, falling back to
    /// the newest one of any status.
    fn find_by_platform(&self, platform_id: &str) -> Result<Option<PartnerCredential>, LookupError>;

    fn get(&self, id: CredentialId) -> Result<Option<PartnerCredential>, LookupError>;
}

impl<S> CredentialLookup for Arc<S>
where
    S: CredentialLookup + ?Sized,
{
    fn find_by_key_hash(&self, key_hash: &str) -> Result<Option<PartnerCredential>, LookupError> {
        (**self).find_by_key_hash(key_hash)
    }

    fn find_by_platform(&self, platform_id: &str) -> Result<Option<PartnerCredential>, LookupError> {
        (**self).find_by_platform(platform_id)
    }

    fn get(&self, id: CredentialId) -> Result<Option<PartnerCredential>, LookupError> {
        (**self).get(id)
    }
}
