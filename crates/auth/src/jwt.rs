//! HS256 issuance and validation of federation bearer tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use hourbridge_core::{CredentialId, TenantId};

use crate::claims::{FederationClaims, validate_claims};
use crate::credential::PartnerCredential;
use crate::error::{AuthError, CredentialError};
use crate::scope::ScopeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub max_lifetime: Duration,
}

#[derive(Clone)]
pub struct JwtCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    max_lifetime: Duration,
}

impl core::fmt::Debug for JwtCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JwtCodec")
            .field("issuer", &self.issuer)
            .field("max_lifetime", &self.max_lifetime)
            .finish_non_exhaustive()
    }
}

impl JwtCodec {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            encoding: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding: DecodingKey::from_secret(settings.secret.as_bytes()),
            issuer: settings.issuer.clone(),
            max_lifetime: settings.max_lifetime,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    /// Sign a token for `subject` on behalf of `tenant`.
    pub fn issue(
        &self,
        subject: &str,
        tenant: TenantId,
        scopes: &ScopeSet,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        self.sign(subject, tenant, None, scopes, now, ttl)
    }

    /// Sign a token bound to `credential`; the resolver loads that credential
    /// back by id instead of by subject.
    pub fn issue_for_credential(
        &self,
        credential: &PartnerCredential,
        scopes: &ScopeSet,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        self.sign(
            &credential.subject(),
            credential.issuing_tenant,
            Some(credential.id),
            scopes,
            now,
            ttl,
        )
    }

    fn sign(
        &self,
        subject: &str,
        tenant: TenantId,
        credential: Option<CredentialId>,
        scopes: &ScopeSet,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        if ttl <= Duration::zero() || ttl > self.max_lifetime {
            return Err(AuthError::Signing(format!(
                "token ttl must be between 1s and {} minutes",
                self.max_lifetime.num_minutes()
            )));
        }
        let claims = FederationClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            aud: tenant.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            tenant_id: tenant,
            scope: scopes.to_strings(),
            cid: credential,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Verify signature and issuer, require `aud` to name the token's tenant,
    /// then check the time window against `now`.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<FederationClaims, CredentialError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub", "aud"]);
        // Time checks run against the injected clock in `validate_claims`.
        validation.validate_exp = false;
        validation.validate_aud = false;

        let data = decode::<FederationClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidIssuer => CredentialError::InvalidIssuer(e.to_string()),
                ErrorKind::ExpiredSignature => CredentialError::TokenExpired,
                _ => CredentialError::InvalidToken(e.to_string()),
            }
        })?;
        let claims = data.claims;

        if claims.aud != claims.tenant_id.to_string() {
            return Err(CredentialError::InvalidAudience(claims.aud));
        }
        validate_claims(&claims, now, self.max_lifetime)?;
        Ok(claims)
    }
}

/// Cheap structural check used to decide whether a bearer value is worth a
/// JWT validation attempt before falling back to API-key lookup.
pub fn looks_like_jwt(token: &str) -> bool {
    token.split('.').count() == 3 && !token.contains(' ')
}
