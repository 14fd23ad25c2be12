use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use hourbridge_core::{CredentialId, TenantId};

use crate::error::CredentialError;
use crate::scope::ScopeSet;

/// Federation bearer token claims.
///
/// `sub` is the partner platform id (or the tenant id for internal callers),
/// `aud` and `tenant_id` name the issuing tenant. Tokens minted by the token
/// endpoint also carry `cid`, the credential they were exchanged for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
    pub tenant_id: TenantId,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<CredentialId>,
}

impl FederationClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn scopes(&self) -> Result<ScopeSet, CredentialError> {
        ScopeSet::from_strings(&self.scope)
    }
}

/// Deterministically validate the time window of decoded claims.
///
/// Signature, issuer and audience are checked by the codec; this covers
/// expiry, not-yet-valid tokens and the maximum lifetime `exp - iat`.
pub fn validate_claims(
    claims: &FederationClaims,
    now: DateTime<Utc>,
    max_lifetime: Duration,
) -> Result<(), CredentialError> {
    let (Some(issued_at), Some(expires_at)) = (claims.issued_at(), claims.expires_at()) else {
        return Err(CredentialError::InvalidTimeWindow);
    };
    if expires_at <= issued_at {
        return Err(CredentialError::InvalidTimeWindow);
    }
    let lifetime = expires_at - issued_at;
    if lifetime > max_lifetime {
        return Err(CredentialError::LifetimeExceeded {
            lifetime_minutes: lifetime.num_minutes(),
            max_minutes: max_lifetime.num_minutes(),
        });
    }
    if now < issued_at {
        return Err(CredentialError::TokenNotYetValid);
    }
    if now >= expires_at {
        return Err(CredentialError::TokenExpired);
    }
    Ok(())
}
