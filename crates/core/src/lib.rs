//! `hourbridge-core`: domain foundation shared by every federation crate.
//!
//! Pure primitives only: identifiers, the domain error model, and the
//! aggregate contract used by the partnership state machine.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, CredentialId, PartnershipId, TenantId, UserId};
pub use value_object::ValueObject;
