//! `hourbridge-infra`: stores, caches and the services built on them.
//!
//! Every store is a trait with an in-memory implementation; production
//! backends plug in behind the same traits. The [`engine`] module wires the
//! pieces together from a [`config::FederationConfig`].

pub mod audit;
pub mod cache;
pub mod clock;
pub mod config;
pub mod config_store;
pub mod credentials;
pub mod directory;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod preferences;
pub mod registry;
pub mod transfer;
pub mod trust;

pub use audit::{
    AuditCategory, AuditEntry, AuditFilter, AuditLevel, AuditLog, AuditStatus, Committed, InMemoryAuditLog,
};
pub use cache::TtlCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigEnv, FederationConfig};
pub use config_store::{CachedConfigStore, ConfigStore, InMemoryConfigStore, WhitelistEntry};
pub use credentials::{
    CredentialStore, InMemoryCredentialStore, IssuedCredential, NewCredential, issue_credential,
    revoke_credential,
};
pub use engine::{ControlsChange, EnginePorts, FederationEngine, PartnershipEnvelope};
pub use error::{FederationError, FederationResult, StoreError};
pub use gateway::{Decision, Outcome, PartnershipLookup, PermissionGateway};
pub use preferences::{CachedPreferenceStore, InMemoryPreferenceStore, PreferenceStore};
pub use registry::{InMemoryPartnershipStore, PartnershipChange, PartnershipRegistry, PartnershipStore};
pub use transfer::{
    FederatedTransaction, FederatedTransactionService, FederationRecord, FederationRecordSink,
    InMemoryFederationRecordSink, InMemoryWalletLedger, TransferError, TransferRequest, WalletLedger,
    WalletRef,
};
pub use trust::{InMemoryTrustStats, TrustScoreCalculator, TrustStatsSource};
