//! Cross-tenant operations and the rule table the gateway evaluates them with.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hourbridge_core::{DomainError, DomainResult, TenantId, UserId};

use crate::amount::TransferAmount;
use crate::feature::FederationFeature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FederationOperation {
    ViewProfile,
    SendMessage,
    PerformTransaction,
    ViewListings,
    ViewEvents,
    JoinGroup,
}

/// Whose preferences decide the user layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSubject {
    Actor,
    Target,
}

/// Per-user switch consulted after the opt-in check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserFlag {
    ProfileVisible,
    MessagingEnabled,
    TransactionsEnabled,
    /// Opting in to federation is the only requirement.
    OptInOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationRule {
    pub feature: FederationFeature,
    pub subject: UserSubject,
    pub flag: UserFlag,
}

impl FederationOperation {
    pub const ALL: [FederationOperation; 6] = [
        FederationOperation::ViewProfile,
        FederationOperation::SendMessage,
        FederationOperation::PerformTransaction,
        FederationOperation::ViewListings,
        FederationOperation::ViewEvents,
        FederationOperation::JoinGroup,
    ];

    pub fn rule(self) -> OperationRule {
        use FederationFeature as F;
        use UserFlag as U;
        use UserSubject as S;

        let (feature, subject, flag) = match self {
            FederationOperation::ViewProfile => (F::Profiles, S::Target, U::ProfileVisible),
            FederationOperation::SendMessage => (F::Messaging, S::Target, U::MessagingEnabled),
            FederationOperation::PerformTransaction => {
                (F::Transactions, S::Target, U::TransactionsEnabled)
            }
            FederationOperation::ViewListings => (F::Listings, S::Target, U::ProfileVisible),
            FederationOperation::ViewEvents => (F::Events, S::Actor, U::OptInOnly),
            FederationOperation::JoinGroup => (F::Groups, S::Actor, U::OptInOnly),
        };
        OperationRule {
            feature,
            subject,
            flag,
        }
    }

    pub fn feature(self) -> FederationFeature {
        self.rule().feature
    }

    /// Audit action type for decisions on this operation.
    pub fn action_type(self) -> &'static str {
        match self {
            FederationOperation::ViewProfile => "federation.check.view_profile",
            FederationOperation::SendMessage => "federation.check.send_message",
            FederationOperation::PerformTransaction => "federation.check.perform_transaction",
            FederationOperation::ViewListings => "federation.check.view_listings",
            FederationOperation::ViewEvents => "federation.check.view_events",
            FederationOperation::JoinGroup => "federation.check.join_group",
        }
    }
}

impl core::fmt::Display for FederationOperation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            FederationOperation::ViewProfile => "view_profile",
            FederationOperation::SendMessage => "send_message",
            FederationOperation::PerformTransaction => "perform_transaction",
            FederationOperation::ViewListings => "view_listings",
            FederationOperation::ViewEvents => "view_events",
            FederationOperation::JoinGroup => "join_group",
        };
        f.write_str(s)
    }
}

/// Inputs of one gateway check.
///
/// `target_id` is the target user for user-facing operations, and the
/// listing, event or group id otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub operation: FederationOperation,
    pub actor: UserId,
    pub actor_tenant: TenantId,
    pub target_id: Uuid,
    pub target_tenant: TenantId,
    /// Owner of the target resource when it is not a user (listing owner).
    pub target_owner: Option<UserId>,
    pub amount: Option<TransferAmount>,
}

impl AccessRequest {
    pub fn new(
        operation: FederationOperation,
        actor: UserId,
        actor_tenant: TenantId,
        target_id: Uuid,
        target_tenant: TenantId,
    ) -> Self {
        Self {
            operation,
            actor,
            actor_tenant,
            target_id,
            target_tenant,
            target_owner: None,
            amount: None,
        }
    }

    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.target_owner = Some(owner);
        self
    }

    pub fn with_amount(mut self, amount: TransferAmount) -> Self {
        self.amount = Some(amount);
        self
    }

    /// The user whose settings decide the user layer.
    pub fn subject_user(&self) -> UserId {
        match self.operation.rule().subject {
            UserSubject::Actor => self.actor,
            UserSubject::Target => self
                .target_owner
                .unwrap_or_else(|| UserId::from_uuid(self.target_id)),
        }
    }

    pub fn subject_tenant(&self) -> TenantId {
        match self.operation.rule().subject {
            UserSubject::Actor => self.actor_tenant,
            UserSubject::Target => self.target_tenant,
        }
    }

    /// Structural checks that run before any store is consulted.
    pub fn validate(&self) -> DomainResult<()> {
        if self.actor_tenant == self.target_tenant {
            return Err(DomainError::validation(
                "actor and target belong to the same tenant; not a cross-tenant request",
            ));
        }
        match (self.operation, self.amount) {
            (FederationOperation::PerformTransaction, None) => Err(DomainError::validation(
                "transaction amount is required",
            )),
            (FederationOperation::PerformTransaction, Some(_)) | (_, None) => Ok(()),
            (op, Some(_)) => Err(DomainError::validation(format!(
                "operation {op} does not take an amount"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(op: FederationOperation) -> AccessRequest {
        AccessRequest::new(op, UserId::new(), TenantId::new(), Uuid::now_v7(), TenantId::new())
    }

    #[test]
    fn every_operation_maps_to_a_distinct_feature() {
        let mut features: Vec<_> = FederationOperation::ALL.iter().map(|o| o.feature()).collect();
        features.sort();
        features.dedup();
        assert_eq!(features.len(), 6);
    }

    #[test]
    fn events_and_groups_check_the_actor() {
        let r = request(FederationOperation::JoinGroup);
        assert_eq!(r.subject_user(), r.actor);
        assert_eq!(r.subject_tenant(), r.actor_tenant);
    }

    #[test]
    fn listings_check_the_owner_when_known() {
        let owner = UserId::new();
        let r = request(FederationOperation::ViewListings).with_owner(owner);
        assert_eq!(r.subject_user(), owner);
        assert_eq!(r.subject_tenant(), r.target_tenant);
    }

    #[test]
    fn same_tenant_is_invalid() {
        let tenant = TenantId::new();
        let r = AccessRequest::new(
            FederationOperation::ViewProfile,
            UserId::new(),
            tenant,
            Uuid::now_v7(),
            tenant,
        );
        assert!(matches!(r.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn transactions_require_an_amount() {
        let r = request(FederationOperation::PerformTransaction);
        assert!(r.validate().is_err());
        let r = r.with_amount(TransferAmount::from_hundredths(300).unwrap());
        assert!(r.validate().is_ok());
    }
}
