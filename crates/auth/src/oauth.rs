//! OAuth2 client-credentials issuance for partner platforms.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use hourbridge_core::CredentialId;

use crate::credential::{CredentialLookup, hash_api_key};
use crate::error::AuthError;
use crate::jwt::JwtCodec;
use crate::scope::ScopeSet;

pub const GRANT_CLIENT_CREDENTIALS: &str = "client_credentials";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    /// The credential id.
    pub client_id: String,
    /// The credential's API key.
    pub client_secret: String,
    /// Space separated; empty or absent means every scope of the credential.
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
}

#[derive(Debug)]
pub struct TokenIssuer<L> {
    credentials: L,
    jwt: JwtCodec,
    ttl: Duration,
}

impl<L> TokenIssuer<L>
where
    L: CredentialLookup,
{
    pub fn new(credentials: L, jwt: JwtCodec, ttl: Duration) -> Self {
        Self {
            credentials,
            jwt,
            ttl,
        }
    }

    pub fn issue(&self, request: &TokenRequest, now: DateTime<Utc>) -> Result<TokenResponse, AuthError> {
        if request.grant_type != GRANT_CLIENT_CREDENTIALS {
            return Err(AuthError::UnsupportedGrantType(request.grant_type.clone()));
        }

        let id: CredentialId = request.client_id.parse().map_err(|_| AuthError::InvalidClient)?;
        let Some(credential) = self.credentials.get(id)? else {
            tracing::debug!(client_id = %request.client_id, "unknown oauth client");
            return Err(AuthError::InvalidClient);
        };

        let presented = hash_api_key(&request.client_secret);
        if !bool::from(presented.as_bytes().ct_eq(credential.api_key_hash.as_bytes())) {
            tracing::debug!(client_id = %request.client_id, "oauth client secret mismatch");
            return Err(AuthError::InvalidClient);
        }
        if let Err(reason) = credential.ensure_usable(now) {
            tracing::debug!(client_id = %request.client_id, %reason, "oauth client unusable");
            return Err(AuthError::InvalidClient);
        }

        let scopes = match request.scope.as_deref().map(str::trim) {
            None | Some("") => credential.scopes.clone(),
            Some(raw) => {
                let requested = ScopeSet::parse_space_separated(raw)
                    .map_err(|e| AuthError::InvalidScope(e.to_string()))?;
                if !requested.is_subset(&credential.scopes) {
                    return Err(AuthError::InvalidScope(
                        "requested scope exceeds the client's grant".to_string(),
                    ));
                }
                requested
            }
        };

        let ttl = self.ttl.min(self.jwt.max_lifetime());
        let access_token = self.jwt.issue_for_credential(&credential, &scopes, now, ttl)?;

        tracing::info!(
            credential_id = %credential.id,
            tenant_id = %credential.issuing_tenant,
            scope = %scopes.to_space_separated(),
            "issued federation access token"
        );

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: ttl.num_seconds(),
            scope: scopes.to_space_separated(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use hourbridge_core::TenantId;

    use crate::credential::{CredentialOwner, CredentialStatus, PartnerCredential};
    use crate::error::LookupError;
    use crate::jwt::JwtSettings;
    use crate::scope::Scope;

    struct One(Mutex<PartnerCredential>);

    impl CredentialLookup for One {
        fn find_by_key_hash(&self, h: &str) -> Result<Option<PartnerCredential>, LookupError> {
            let c = self.0.lock().unwrap();
            Ok((c.api_key_hash == h).then(|| c.clone()))
        }

        fn find_by_platform(&self, p: &str) -> Result<Option<PartnerCredential>, LookupError> {
            let c = self.0.lock().unwrap();
            Ok((c.platform_id() == Some(p)).then(|| c.clone()))
        }

        fn get(&self, id: CredentialId) -> Result<Option<PartnerCredential>, LookupError> {
            let c = self.0.lock().unwrap();
            Ok((c.id == id).then(|| c.clone()))
        }
    }

    fn setup(status: CredentialStatus) -> (TokenIssuer<One>, JwtCodec, PartnerCredential) {
        let codec = JwtCodec::new(&JwtSettings {
            secret: "oauth-secret-oauth-secret-oauth!!".into(),
            issuer: "hourbridge".into(),
            max_lifetime: Duration::minutes(1440),
        });
        let cred = PartnerCredential {
            id: CredentialId::new(),
            owner: CredentialOwner::ExternalPlatform {
                platform_id: "partner-a".into(),
            },
            issuing_tenant: TenantId::new(),
            api_key_hash: hash_api_key("client-secret"),
            signing_secret: None,
            scopes: [Scope::MembersRead, Scope::MessagesWrite].into_iter().collect(),
            status,
            expires_at: None,
            created_at: Utc::now(),
            revoked_at: None,
            version: 1,
        };
        let issuer = TokenIssuer::new(One(Mutex::new(cred.clone())), codec.clone(), Duration::minutes(60));
        (issuer, codec, cred)
    }

    fn request(cred: &PartnerCredential, secret: &str, scope: Option<&str>) -> TokenRequest {
        TokenRequest {
            grant_type: GRANT_CLIENT_CREDENTIALS.into(),
            client_id: cred.id.to_string(),
            client_secret: secret.into(),
            scope: scope.map(str::to_string),
        }
    }

    #[test]
    fn issues_token_with_all_scopes_by_default() {
        let (issuer, codec, cred) = setup(CredentialStatus::Active);
        let now = Utc::now();
        let resp = issuer.issue(&request(&cred, "client-secret", None), now).unwrap();

        assert_eq!(resp.token_type, "Bearer");
        assert_eq!(resp.expires_in, 3600);
        assert_eq!(resp.scope, "members:read messages:write");

        let claims = codec.validate(&resp.access_token, now).unwrap();
        assert_eq!(claims.sub, "partner-a");
        assert_eq!(claims.aud, cred.issuing_tenant.to_string());
        assert_eq!(claims.tenant_id, cred.issuing_tenant);
        assert_eq!(claims.cid, Some(cred.id));
    }

    #[test]
    fn internal_tenant_token_names_the_owner_as_subject() {
        let (_, codec, mut cred) = setup(CredentialStatus::Active);
        let owner = TenantId::new();
        cred.owner = CredentialOwner::InternalTenant { tenant_id: owner };
        let issuer = TokenIssuer::new(One(Mutex::new(cred.clone())), codec.clone(), Duration::minutes(60));
        let now = Utc::now();

        let resp = issuer.issue(&request(&cred, "client-secret", None), now).unwrap();
        let claims = codec.validate(&resp.access_token, now).unwrap();
        assert_eq!(claims.sub, owner.to_string());
        assert_eq!(claims.tenant_id, cred.issuing_tenant);
        assert_eq!(claims.cid, Some(cred.id));
    }

    #[test]
    fn narrower_scope_is_honoured_and_wider_is_refused() {
        let (issuer, _, cred) = setup(CredentialStatus::Active);
        let now = Utc::now();
        let resp = issuer
            .issue(&request(&cred, "client-secret", Some("members:read")), now)
            .unwrap();
        assert_eq!(resp.scope, "members:read");

        assert!(matches!(
            issuer.issue(&request(&cred, "client-secret", Some("transactions:write")), now),
            Err(AuthError::InvalidScope(_))
        ));
    }

    #[test]
    fn bad_secret_revoked_client_and_grant_type_fail() {
        let (issuer, _, cred) = setup(CredentialStatus::Active);
        let now = Utc::now();
        assert_eq!(
            issuer.issue(&request(&cred, "nope", None), now),
            Err(AuthError::InvalidClient)
        );

        let mut wrong_grant = request(&cred, "client-secret", None);
        wrong_grant.grant_type = "password".into();
        assert!(matches!(
            issuer.issue(&wrong_grant, now),
            Err(AuthError::UnsupportedGrantType(_))
        ));

        let (issuer, _, cred) = setup(CredentialStatus::Revoked);
        assert_eq!(
            issuer.issue(&request(&cred, "client-secret", None), now),
            Err(AuthError::InvalidClient)
        );
    }
}
