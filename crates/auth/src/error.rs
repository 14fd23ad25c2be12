//! Authentication error types.
//!
//! Callers only ever see [`AuthError`]. The detailed [`CredentialError`]
//! explains *why* a scheme rejected a request and is logged at debug level,
//! never returned, so responses do not reveal which check failed.

use thiserror::Error;

/// Caller-facing failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No scheme produced an identity. Deliberately uninformative.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// The caller is authenticated but lacks the scope for this route.
    #[error("insufficient scope")]
    InsufficientScope,

    /// OAuth: unknown client, wrong secret, or unusable credential.
    #[error("invalid client")]
    InvalidClient,

    #[error("unsupported grant type: {0}")]
    UnsupportedGrantType(String),

    /// OAuth: requested scope is unknown or not granted to the client.
    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// The credential store could not be reached. Not an authentication
    /// outcome; callers should surface it as a server fault.
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Internal rejection reason for a single scheme attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("timestamp outside the allowed window ({skew_seconds}s skew)")]
    ClockSkew { skew_seconds: i64 },

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("credential has no signing secret")]
    NoSigningSecret,

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    TokenExpired,

    #[error("token not yet valid")]
    TokenNotYetValid,

    #[error("invalid token time window")]
    InvalidTimeWindow,

    #[error("token lifetime {lifetime_minutes}m exceeds the maximum of {max_minutes}m")]
    LifetimeExceeded {
        lifetime_minutes: i64,
        max_minutes: i64,
    },

    #[error("invalid issuer: {0}")]
    InvalidIssuer(String),

    #[error("invalid audience: {0}")]
    InvalidAudience(String),

    #[error("unknown scope: {0}")]
    UnknownScope(String),

    #[error("unknown api key")]
    UnknownApiKey,

    #[error("credential revoked")]
    Revoked,

    #[error("credential expired")]
    Expired,

    #[error("credential does not belong to tenant {0}")]
    TenantMismatch(String),

    #[error("unknown credential: {0}")]
    UnknownCredential(String),

    #[error("token subject does not match its credential")]
    SubjectMismatch,
}

/// Failure reported by a [`crate::CredentialLookup`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

impl From<LookupError> for AuthError {
    fn from(value: LookupError) -> Self {
        match value {
            LookupError::Unavailable(msg) => AuthError::Unavailable(msg),
        }
    }
}
