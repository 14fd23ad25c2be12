//! `hourbridge-federation`: cross-tenant federation domain.
//!
//! Pure domain logic only: no IO, no stores, no transport. The infra crate
//! composes these types into the permission gateway and partnership registry.

pub mod amount;
pub mod controls;
pub mod feature;
pub mod level;
pub mod operation;
pub mod partnership;
pub mod settings;
pub mod trust;
pub mod verdict;

pub use amount::TransferAmount;
pub use controls::{EmergencyLockdown, SystemControls};
pub use feature::{FeaturePermissions, FederationFeature, TenantFlag};
pub use level::FederationLevel;
pub use operation::{AccessRequest, FederationOperation, OperationRule, UserFlag, UserSubject};
pub use partnership::{
    Actor, CounterProposal, Partnership, PartnershipCommand, PartnershipEvent, PartnershipStatus,
    TenantPair, Transition,
};
pub use settings::{ServiceReach, UserFederationSettings};
pub use trust::{TrustInputs, TrustLevel, TrustScore, calculate_trust_score};
pub use verdict::{DenialLayer, Verdict};
