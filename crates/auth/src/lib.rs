//! `hourbridge-auth`: authentication boundary for federation callers.
//!
//! Decoupled from HTTP and storage: requests arrive as [`InboundRequest`]
//! values and credentials are read through the [`CredentialLookup`] port.

pub mod claims;
pub mod credential;
pub mod error;
pub mod jwt;
pub mod oauth;
pub mod request;
pub mod resolver;
pub mod route;
pub mod scope;
pub mod signature;
pub mod webhook;

pub use claims::{FederationClaims, validate_claims};
pub use credential::{
    CredentialLookup, CredentialOwner, CredentialStatus, PartnerCredential, generate_api_key,
    hash_api_key,
};
pub use error::{AuthError, CredentialError, LookupError};
pub use jwt::{JwtCodec, JwtSettings};
pub use oauth::{TokenIssuer, TokenRequest, TokenResponse};
pub use request::InboundRequest;
pub use resolver::{
    AuthScheme, AuthenticatedCaller, AuthenticationResolver, CallerIdentity, ResolverSettings,
};
pub use route::FederationRoute;
pub use scope::{Scope, ScopeSet};
pub use signature::SignedHeaders;
pub use webhook::{SignedWebhook, WebhookSigner};
