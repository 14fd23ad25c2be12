//! Resolves an inbound request to a caller identity.
//!
//! Schemes are tried in order (HMAC signature, JWT bearer, API key) and the
//! first success wins. Every rejection collapses into the same opaque
//! [`AuthError::AuthenticationFailure`]; the per-scheme reason is only logged.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use hourbridge_core::{CredentialId, TenantId};

use crate::claims::FederationClaims;
use crate::credential::{CredentialLookup, CredentialOwner, PartnerCredential, hash_api_key};
use crate::error::{AuthError, CredentialError};
use crate::jwt::{JwtCodec, looks_like_jwt};
use crate::request::{
    HEADER_API_KEY, HEADER_PLATFORM_ID, HEADER_SIGNATURE, HEADER_TIMESTAMP, InboundRequest,
    QUERY_API_KEY,
};
use crate::scope::{Scope, ScopeSet};
use crate::signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    Hmac,
    Jwt,
    ApiKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallerIdentity {
    ExternalPartner {
        partner_id: CredentialId,
        platform_id: String,
        issuing_tenant: TenantId,
    },
    InternalTenant {
        tenant_id: TenantId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedCaller {
    pub identity: CallerIdentity,
    pub scopes: ScopeSet,
    pub scheme: AuthScheme,
}

impl CallerIdentity {
    fn of(credential: &PartnerCredential) -> Self {
        match &credential.owner {
            CredentialOwner::ExternalPlatform { platform_id } => CallerIdentity::ExternalPartner {
                partner_id: credential.id,
                platform_id: platform_id.clone(),
                issuing_tenant: credential.issuing_tenant,
            },
            CredentialOwner::InternalTenant { tenant_id } => CallerIdentity::InternalTenant {
                tenant_id: *tenant_id,
            },
        }
    }
}

impl AuthenticatedCaller {
    fn from_credential(credential: &PartnerCredential, scheme: AuthScheme) -> Self {
        Self {
            identity: CallerIdentity::of(credential),
            scopes: credential.scopes.clone(),
            scheme,
        }
    }

    /// Opaque authorization check for a route's required scope.
    pub fn require_scope(&self, scope: Scope) -> Result<(), AuthError> {
        if self.scopes.contains(scope) {
            Ok(())
        } else {
            tracing::debug!(required = %scope, "caller lacks scope");
            Err(AuthError::InsufficientScope)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverSettings {
    pub hmac_max_skew: Duration,
    /// Accept `?api_key=` (test/dev only).
    pub allow_query_api_key: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            hmac_max_skew: Duration::minutes(5),
            allow_query_api_key: false,
        }
    }
}

/// One scheme attempt: `None` when the request carries nothing for it.
type Attempt = Option<Result<AuthenticatedCaller, CredentialError>>;

#[derive(Debug)]
pub struct AuthenticationResolver<L> {
    credentials: L,
    jwt: JwtCodec,
    settings: ResolverSettings,
}

impl<L> AuthenticationResolver<L>
where
    L: CredentialLookup,
{
    pub fn new(credentials: L, jwt: JwtCodec, settings: ResolverSettings) -> Self {
        Self {
            credentials,
            jwt,
            settings,
        }
    }

    pub fn resolve(
        &self,
        request: &InboundRequest,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedCaller, AuthError> {
        for scheme in [AuthScheme::Hmac, AuthScheme::Jwt, AuthScheme::ApiKey] {
            let attempt = match scheme {
                AuthScheme::Hmac => self.try_hmac(request, now)?,
                AuthScheme::Jwt => self.try_jwt(request, now)?,
                AuthScheme::ApiKey => self.try_api_key(request, now)?,
            };
            match attempt {
                Some(Ok(caller)) => {
                    tracing::debug!(?scheme, identity = ?caller.identity, "caller authenticated");
                    return Ok(caller);
                }
                Some(Err(reason)) => {
                    tracing::debug!(?scheme, %reason, "authentication scheme rejected request");
                }
                None => {}
            }
        }

        Err(AuthError::AuthenticationFailure)
    }

    fn try_hmac(&self, request: &InboundRequest, now: DateTime<Utc>) -> Result<Attempt, AuthError> {
        let Some(platform_id) = request.header(HEADER_PLATFORM_ID) else {
            return Ok(None);
        };
        let (raw_ts, presented) = match self.fresh_signature_headers(request, now) {
            Ok(headers) => headers,
            Err(e) => return Ok(Some(Err(e))),
        };
        let Some(credential) = self.credentials.find_by_platform(platform_id)? else {
            return Ok(Some(Err(CredentialError::UnknownPlatform(platform_id.to_string()))));
        };
        Ok(Some(verify_signed_request(request, &credential, raw_ts, presented, now)))
    }

    /// Timestamp and signature headers, with the timestamp inside the skew
    /// window. Runs before any store lookup.
    fn fresh_signature_headers<'r>(
        &self,
        request: &'r InboundRequest,
        now: DateTime<Utc>,
    ) -> Result<(&'r str, &'r str), CredentialError> {
        let raw_ts = request
            .header(HEADER_TIMESTAMP)
            .ok_or(CredentialError::Missing("timestamp header"))?;
        let presented = request
            .header(HEADER_SIGNATURE)
            .ok_or(CredentialError::Missing("signature header"))?;
        let ts = signature::parse_timestamp(raw_ts)?;
        signature::check_skew(ts, now, self.settings.hmac_max_skew)?;
        Ok((raw_ts, presented))
    }

    fn try_jwt(&self, request: &InboundRequest, now: DateTime<Utc>) -> Result<Attempt, AuthError> {
        let Some(token) = request.bearer_token().filter(|t| looks_like_jwt(t)) else {
            return Ok(None);
        };
        let claims = match self.jwt.validate(token, now) {
            Ok(claims) => claims,
            Err(e) => return Ok(Some(Err(e))),
        };
        let scopes = match claims.scopes() {
            Ok(scopes) => scopes,
            Err(e) => return Ok(Some(Err(e))),
        };

        if let Some(id) = claims.cid {
            let Some(credential) = self.credentials.get(id)? else {
                return Ok(Some(Err(CredentialError::UnknownCredential(id.to_string()))));
            };
            return Ok(Some(verify_bound_token(&credential, &claims, scopes, now)));
        }

        if let Some(credential) = self.credentials.find_by_platform(&claims.sub)? {
            let caller = credential.ensure_usable(now).and_then(|()| {
                if credential.issuing_tenant != claims.tenant_id {
                    return Err(CredentialError::TenantMismatch(claims.tenant_id.to_string()));
                }
                Ok(AuthenticatedCaller {
                    identity: CallerIdentity::ExternalPartner {
                        partner_id: credential.id,
                        platform_id: claims.sub.clone(),
                        issuing_tenant: claims.tenant_id,
                    },
                    scopes,
                    scheme: AuthScheme::Jwt,
                })
            });
            return Ok(Some(caller));
        }

        if claims.sub == claims.tenant_id.to_string() {
            return Ok(Some(Ok(AuthenticatedCaller {
                identity: CallerIdentity::InternalTenant {
                    tenant_id: claims.tenant_id,
                },
                scopes,
                scheme: AuthScheme::Jwt,
            })));
        }

        Ok(Some(Err(CredentialError::UnknownPlatform(claims.sub))))
    }

    fn try_api_key(&self, request: &InboundRequest, now: DateTime<Utc>) -> Result<Attempt, AuthError> {
        let mut candidates = vec![request.bearer_token(), request.header(HEADER_API_KEY)];
        if self.settings.allow_query_api_key {
            candidates.push(request.query_param(QUERY_API_KEY));
        }

        let mut last: Attempt = None;
        for key in candidates.into_iter().flatten() {
            let attempt = match self.credentials.find_by_key_hash(&hash_api_key(key))? {
                Some(credential) => credential
                    .ensure_usable(now)
                    .map(|()| AuthenticatedCaller::from_credential(&credential, AuthScheme::ApiKey)),
                None => Err(CredentialError::UnknownApiKey),
            };
            if attempt.is_ok() {
                return Ok(Some(attempt));
            }
            last = Some(attempt);
        }
        Ok(last)
    }
}

/// A token minted from `credential` must still match it: usable, same
/// issuing tenant and subject, and no scope beyond the credential's grant.
fn verify_bound_token(
    credential: &PartnerCredential,
    claims: &FederationClaims,
    scopes: ScopeSet,
    now: DateTime<Utc>,
) -> Result<AuthenticatedCaller, CredentialError> {
    credential.ensure_usable(now)?;
    if credential.issuing_tenant != claims.tenant_id {
        return Err(CredentialError::TenantMismatch(claims.tenant_id.to_string()));
    }
    if credential.subject() != claims.sub {
        return Err(CredentialError::SubjectMismatch);
    }
    if !scopes.is_subset(&credential.scopes) {
        return Err(CredentialError::InvalidToken("scope exceeds the credential's grant".to_string()));
    }
    Ok(AuthenticatedCaller {
        identity: CallerIdentity::of(credential),
        scopes,
        scheme: AuthScheme::Jwt,
    })
}

fn verify_signed_request(
    request: &InboundRequest,
    credential: &PartnerCredential,
    raw_ts: &str,
    presented: &str,
    now: DateTime<Utc>,
) -> Result<AuthenticatedCaller, CredentialError> {
    credential.ensure_usable(now)?;
    let secret = credential
        .signing_secret
        .as_deref()
        .ok_or(CredentialError::NoSigningSecret)?;
    let canonical = signature::canonical_string(&request.method, &request.path, raw_ts, &request.body);
    signature::verify(secret.as_bytes(), &canonical, presented)?;
    Ok(AuthenticatedCaller::from_credential(credential, AuthScheme::Hmac))
}
