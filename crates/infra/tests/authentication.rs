//! Partner authentication against credentials issued through the engine.

mod common;

use chrono::Duration;

use hourbridge_auth::oauth::GRANT_CLIENT_CREDENTIALS;
use hourbridge_auth::request::{HEADER_API_KEY, HEADER_AUTHORIZATION};
use hourbridge_auth::signature::sign_request;
use hourbridge_auth::{
    AuthError, AuthScheme, CallerIdentity, CredentialOwner, FederationRoute, InboundRequest, Scope, ScopeSet,
    TokenRequest,
};
use hourbridge_core::{DomainError, ExpectedVersion, TenantId};
use hourbridge_infra::{FederationError, IssuedCredential, NewCredential};

use common::{Harness, harness};

const PLATFORM: &str = "riverside-exchange";
const PATH: &str = "/federation/messages";
const BODY: &str = r#"{"to":"member-7","text":"hello"}"#;

fn issue(h: &Harness, tenant: TenantId, scopes: &[Scope]) -> IssuedCredential {
    h.engine
        .issue_credential(
            h.admin,
            NewCredential {
                owner: CredentialOwner::ExternalPlatform {
                    platform_id: PLATFORM.to_string(),
                },
                issuing_tenant: tenant,
                scopes: scopes.iter().copied().collect(),
                with_signing_secret: true,
                expires_at: None,
            },
        )
        .unwrap()
        .into_inner()
}

fn signed(issued: &IssuedCredential, at: chrono::DateTime<chrono::Utc>) -> InboundRequest {
    let secret = issued.signing_secret.as_deref().unwrap();
    let headers = sign_request(PLATFORM, secret.as_bytes(), "POST", PATH, BODY, at);
    headers
        .as_pairs()
        .into_iter()
        .fold(InboundRequest::new("POST", PATH).with_body(BODY), |req, (name, value)| {
            req.with_header(name, value)
        })
}

#[test]
fn hmac_signature_honours_the_skew_window() {
    let h = harness();
    let tenant = TenantId::new();
    let issued = issue(&h, tenant, &[Scope::MessagesWrite]);
    let request = signed(&issued, common::start());

    h.clock.set(common::start() + Duration::minutes(4) + Duration::seconds(59));
    let caller = h.engine.authenticate(&request).unwrap();
    assert_eq!(caller.scheme, AuthScheme::Hmac);
    assert!(matches!(
        caller.identity,
        CallerIdentity::ExternalPartner { issuing_tenant, .. } if issuing_tenant == tenant
    ));
    caller.require_scope(FederationRoute::SendMessage.required_scope()).unwrap();

    h.clock.set(common::start() + Duration::minutes(5) + Duration::seconds(1));
    assert!(matches!(h.engine.authenticate(&request), Err(AuthError::AuthenticationFailure)));
}

#[test]
fn tampered_body_is_rejected() {
    let h = harness();
    let issued = issue(&h, TenantId::new(), &[Scope::MessagesWrite]);
    let request = signed(&issued, common::start()).with_body(r#"{"to":"member-7","text":"bye"}"#);

    assert!(matches!(h.engine.authenticate(&request), Err(AuthError::AuthenticationFailure)));
}

#[test]
fn revoked_api_key_stops_authenticating() {
    let h = harness();
    let issued = issue(&h, TenantId::new(), &[Scope::ListingsRead]);
    let bearer = InboundRequest::new("GET", "/federation/listings")
        .with_header(HEADER_AUTHORIZATION, format!("Bearer {}", issued.api_key));
    let header = InboundRequest::new("GET", "/federation/listings").with_header(HEADER_API_KEY, issued.api_key.clone());

    assert_eq!(h.engine.authenticate(&bearer).unwrap().scheme, AuthScheme::ApiKey);
    assert_eq!(h.engine.authenticate(&header).unwrap().scheme, AuthScheme::ApiKey);

    h.engine.revoke_credential(h.admin, issued.credential.id, ExpectedVersion::Any).unwrap();

    assert!(matches!(h.engine.authenticate(&bearer), Err(AuthError::AuthenticationFailure)));
    assert!(matches!(h.engine.authenticate(&header), Err(AuthError::AuthenticationFailure)));
}

#[test]
fn client_credentials_token_authenticates_as_partner() {
    let h = harness();
    let tenant = TenantId::new();
    let issued = issue(&h, tenant, &[Scope::ListingsRead, Scope::MembersRead]);

    let token = h
        .engine
        .issue_token(&TokenRequest {
            grant_type: GRANT_CLIENT_CREDENTIALS.to_string(),
            client_id: issued.credential.id.to_string(),
            client_secret: issued.api_key.clone(),
            scope: Some("listings:read".to_string()),
        })
        .unwrap();
    assert_eq!(token.token_type, "Bearer");
    assert_eq!(token.scope, "listings:read");

    let request = InboundRequest::new("GET", "/federation/listings")
        .with_header(HEADER_AUTHORIZATION, format!("Bearer {}", token.access_token));
    let caller = h.engine.authenticate(&request).unwrap();
    assert_eq!(caller.scheme, AuthScheme::Jwt);
    assert_eq!(caller.scopes, ScopeSet::from_strings(&["listings:read"]).unwrap());
    assert!(matches!(
        caller.require_scope(FederationRoute::ListMembers.required_scope()),
        Err(AuthError::InsufficientScope)
    ));
    assert_eq!(h.engine.visible_tenants(&caller).unwrap(), vec![tenant]);
}

#[test]
fn token_request_with_wrong_secret_is_rejected() {
    let h = harness();
    let issued = issue(&h, TenantId::new(), &[Scope::ListingsRead]);

    let err = h
        .engine
        .issue_token(&TokenRequest {
            grant_type: GRANT_CLIENT_CREDENTIALS.to_string(),
            client_id: issued.credential.id.to_string(),
            client_secret: "hb_not_the_key".to_string(),
            scope: None,
        })
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidClient));
}

#[test]
fn webhook_test_delivery_verifies_with_the_partner_secret() {
    let h = harness();
    let issued = issue(&h, TenantId::new(), &[Scope::MessagesRead]);

    let webhook = h.engine.webhook_test(issued.credential.id).unwrap();
    let request = webhook
        .headers
        .as_pairs()
        .into_iter()
        .fold(InboundRequest::new("POST", webhook.path.clone()).with_body(webhook.body.clone()), |req, (name, value)| {
            req.with_header(name, value)
        });

    let caller = h.engine.authenticate(&request).unwrap();
    assert_eq!(caller.scheme, AuthScheme::Hmac);
}

#[test]
fn token_for_an_internal_tenant_credential_authenticates_as_that_tenant() {
    let h = harness();
    let (issuing, owner) = (TenantId::new(), TenantId::new());
    let issued = h
        .engine
        .issue_credential(
            h.admin,
            NewCredential {
                owner: CredentialOwner::InternalTenant { tenant_id: owner },
                issuing_tenant: issuing,
                scopes: [Scope::MembersRead].into_iter().collect(),
                with_signing_secret: false,
                expires_at: None,
            },
        )
        .unwrap()
        .into_inner();

    let token = h
        .engine
        .issue_token(&TokenRequest {
            grant_type: GRANT_CLIENT_CREDENTIALS.to_string(),
            client_id: issued.credential.id.to_string(),
            client_secret: issued.api_key.clone(),
            scope: None,
        })
        .unwrap();
    let request = InboundRequest::new("GET", "/federation/members")
        .with_header(HEADER_AUTHORIZATION, format!("Bearer {}", token.access_token));

    let caller = h.engine.authenticate(&request).unwrap();
    assert_eq!(caller.scheme, AuthScheme::Jwt);
    assert_eq!(caller.identity, CallerIdentity::InternalTenant { tenant_id: owner });

    h.engine.revoke_credential(h.admin, issued.credential.id, ExpectedVersion::Any).unwrap();
    assert!(matches!(h.engine.authenticate(&request), Err(AuthError::AuthenticationFailure)));
}

#[test]
fn second_tenant_cannot_take_over_a_registered_platform() {
    let h = harness();
    let first = TenantId::new();
    let issued = issue(&h, first, &[Scope::MessagesWrite]);

    let err = h
        .engine
        .issue_credential(
            h.admin,
            NewCredential {
                owner: CredentialOwner::ExternalPlatform {
                    platform_id: PLATFORM.to_string(),
                },
                issuing_tenant: TenantId::new(),
                scopes: [Scope::MessagesWrite].into_iter().collect(),
                with_signing_secret: true,
                expires_at: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, FederationError::Domain(DomainError::Conflict(_))));

    let caller = h.engine.authenticate(&signed(&issued, common::start())).unwrap();
    assert!(matches!(
        caller.identity,
        CallerIdentity::ExternalPartner { issuing_tenant, .. } if issuing_tenant == first
    ));
}
