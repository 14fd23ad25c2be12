//! Partnership aggregate: the bilateral federation relationship between two
//! tenants and its lifecycle.
//!
//! ```text
//!            request
//!   (none) ───────────► pending ──counter_propose──┐
//!                        │  ▲ └────────────────────┘
//!        approve /       │  │
//!        accept_counter  │  └── (stays pending)
//!                        ▼
//!   suspended ◄─suspend─ active ──terminate──► terminated
//!       │  └──reactivate──▲                        ▲
//!       └──────terminate──┴────────────────────────┘
//!   pending ──reject──► terminated
//! ```
//!
//! `terminated` is absorbing. Every transition bumps the version, which the
//! registry uses as the compare-and-swap token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hourbridge_core::{
    Aggregate, AggregateRoot, DomainError, PartnershipId, TenantId, UserId, ValueObject,
};
use hourbridge_events::Event;

use crate::feature::FeaturePermissions;
use crate::level::FederationLevel;

// ─────────────────────────────────────────────────────────────────────────────
// Value types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartnershipStatus {
    Pending,
    Active,
    Suspended,
    Terminated,
}

impl PartnershipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PartnershipStatus::Pending => "pending",
            PartnershipStatus::Active => "active",
            PartnershipStatus::Suspended => "suspended",
            PartnershipStatus::Terminated => "terminated",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PartnershipStatus::Terminated)
    }
}

impl core::fmt::Display for PartnershipStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unordered tenant pair, stored with the smaller tenant id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantPair {
    low: TenantId,
    high: TenantId,
}

impl TenantPair {
    pub fn new(a: TenantId, b: TenantId) -> Result<Self, DomainError> {
        if a == b {
            return Err(DomainError::validation(
                "a tenant cannot federate with itself",
            ));
        }
        Ok(Self {
            low: a.min(b),
            high: a.max(b),
        })
    }

    pub fn low(&self) -> TenantId {
        self.low
    }

    pub fn high(&self) -> TenantId {
        self.high
    }

    pub fn contains(&self, tenant: TenantId) -> bool {
        self.low == tenant || self.high == tenant
    }

    /// The other side of the pair, if `tenant` is a member.
    pub fn other(&self, tenant: TenantId) -> Option<TenantId> {
        if tenant == self.low {
            Some(self.high)
        } else if tenant == self.high {
            Some(self.low)
        } else {
            None
        }
    }
}

/// Who performed a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

impl Actor {
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self { tenant_id, user_id }
    }
}

/// Alternative terms offered while a partnership is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterProposal {
    pub level: FederationLevel,
    pub permissions: FeaturePermissions,
    pub message: Option<String>,
    pub proposed_by: Actor,
    pub proposed_at: DateTime<Utc>,
}

impl ValueObject for CounterProposal {}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partnership {
    id: PartnershipId,
    requester: Option<TenantId>,
    recipient: Option<TenantId>,
    status: PartnershipStatus,
    level: FederationLevel,
    permissions: FeaturePermissions,
    counter_proposal: Option<CounterProposal>,
    notes: Option<String>,
    requested_by: Option<Actor>,
    requested_at: Option<DateTime<Utc>>,
    approved_by: Option<Actor>,
    approved_at: Option<DateTime<Utc>>,
    status_reason: Option<String>,
    terminated_by: Option<Actor>,
    terminated_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Partnership {
    /// Empty aggregate for rehydration / first request.
    pub fn empty(id: PartnershipId) -> Self {
        Self {
            id,
            requester: None,
            recipient: None,
            status: PartnershipStatus::Pending,
            level: FederationLevel::MIN,
            permissions: FeaturePermissions::none(),
            counter_proposal: None,
            notes: None,
            requested_by: None,
            requested_at: None,
            approved_by: None,
            approved_at: None,
            status_reason: None,
            terminated_by: None,
            terminated_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PartnershipId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn requester(&self) -> Option<TenantId> {
        self.requester
    }

    pub fn recipient(&self) -> Option<TenantId> {
        self.recipient
    }

    pub fn pair(&self) -> Option<TenantPair> {
        match (self.requester, self.recipient) {
            (Some(a), Some(b)) => TenantPair::new(a, b).ok(),
            _ => None,
        }
    }

    pub fn status(&self) -> PartnershipStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.created && self.status == PartnershipStatus::Active
    }

    pub fn level(&self) -> FederationLevel {
        self.level
    }

    pub fn permissions(&self) -> FeaturePermissions {
        self.permissions
    }

    pub fn counter_proposal(&self) -> Option<&CounterProposal> {
        self.counter_proposal.as_ref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn requested_by(&self) -> Option<Actor> {
        self.requested_by
    }

    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    pub fn approved_by(&self) -> Option<Actor> {
        self.approved_by
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn status_reason(&self) -> Option<&str> {
        self.status_reason.as_deref()
    }

    pub fn terminated_by(&self) -> Option<Actor> {
        self.terminated_by
    }

    pub fn terminated_at(&self) -> Option<DateTime<Utc>> {
        self.terminated_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// The side of the relationship opposite `tenant`.
    pub fn counterpart_of(&self, tenant: TenantId) -> Option<TenantId> {
        self.pair().and_then(|p| p.other(tenant))
    }
}

impl AggregateRoot for Partnership {
    type Id = PartnershipId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    Request {
        requester: TenantId,
        recipient: TenantId,
        level: FederationLevel,
        notes: Option<String>,
        max_level: FederationLevel,
    },
    /// `None` assigns the default grant for the requested level.
    Approve {
        permissions: Option<FeaturePermissions>,
    },
    CounterPropose {
        level: FederationLevel,
        permissions: Option<FeaturePermissions>,
        message: Option<String>,
        max_level: FederationLevel,
    },
    AcceptCounterProposal,
    Reject {
        reason: String,
    },
    Suspend {
        reason: String,
    },
    Reactivate,
    Terminate {
        reason: String,
    },
    UpdatePermissions {
        permissions: FeaturePermissions,
    },
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Request { .. } => "request",
            Transition::Approve { .. } => "approve",
            Transition::CounterPropose { .. } => "counter_propose",
            Transition::AcceptCounterProposal => "accept_counter_proposal",
            Transition::Reject { .. } => "reject",
            Transition::Suspend { .. } => "suspend",
            Transition::Reactivate => "reactivate",
            Transition::Terminate { .. } => "terminate",
            Transition::UpdatePermissions { .. } => "update_permissions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnershipCommand {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
    pub transition: Transition,
}

impl PartnershipCommand {
    pub fn new(actor: Actor, occurred_at: DateTime<Utc>, transition: Transition) -> Self {
        Self {
            actor,
            occurred_at,
            transition,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartnershipEvent {
    Requested {
        partnership_id: PartnershipId,
        requester: TenantId,
        recipient: TenantId,
        level: FederationLevel,
        notes: Option<String>,
        actor: Actor,
        occurred_at: DateTime<Utc>,
    },
    Approved {
        level: FederationLevel,
        permissions: FeaturePermissions,
        actor: Actor,
        occurred_at: DateTime<Utc>,
    },
    CounterProposed {
        proposal: CounterProposal,
    },
    CounterProposalAccepted {
        level: FederationLevel,
        permissions: FeaturePermissions,
        actor: Actor,
        occurred_at: DateTime<Utc>,
    },
    Rejected {
        reason: String,
        actor: Actor,
        occurred_at: DateTime<Utc>,
    },
    Suspended {
        reason: String,
        actor: Actor,
        occurred_at: DateTime<Utc>,
    },
    Reactivated {
        actor: Actor,
        occurred_at: DateTime<Utc>,
    },
    Terminated {
        reason: String,
        actor: Actor,
        occurred_at: DateTime<Utc>,
    },
    PermissionsUpdated {
        permissions: FeaturePermissions,
        actor: Actor,
        occurred_at: DateTime<Utc>,
    },
}

impl PartnershipEvent {
    pub fn actor(&self) -> Actor {
        match self {
            PartnershipEvent::Requested { actor, .. }
            | PartnershipEvent::Approved { actor, .. }
            | PartnershipEvent::CounterProposalAccepted { actor, .. }
            | PartnershipEvent::Rejected { actor, .. }
            | PartnershipEvent::Suspended { actor, .. }
            | PartnershipEvent::Reactivated { actor, .. }
            | PartnershipEvent::Terminated { actor, .. }
            | PartnershipEvent::PermissionsUpdated { actor, .. } => *actor,
            PartnershipEvent::CounterProposed { proposal } => proposal.proposed_by,
        }
    }
}

impl Event for PartnershipEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartnershipEvent::Requested { .. } => "federation.partnership.requested",
            PartnershipEvent::Approved { .. } => "federation.partnership.approved",
            PartnershipEvent::CounterProposed { .. } => "federation.partnership.counter_proposed",
            PartnershipEvent::CounterProposalAccepted { .. } => {
                "federation.partnership.counter_proposal_accepted"
            }
            PartnershipEvent::Rejected { .. } => "federation.partnership.rejected",
            PartnershipEvent::Suspended { .. } => "federation.partnership.suspended",
            PartnershipEvent::Reactivated { .. } => "federation.partnership.reactivated",
            PartnershipEvent::Terminated { .. } => "federation.partnership.terminated",
            PartnershipEvent::PermissionsUpdated { .. } => {
                "federation.partnership.permissions_updated"
            }
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PartnershipEvent::Requested { occurred_at, .. }
            | PartnershipEvent::Approved { occurred_at, .. }
            | PartnershipEvent::CounterProposalAccepted { occurred_at, .. }
            | PartnershipEvent::Rejected { occurred_at, .. }
            | PartnershipEvent::Suspended { occurred_at, .. }
            | PartnershipEvent::Reactivated { occurred_at, .. }
            | PartnershipEvent::Terminated { occurred_at, .. }
            | PartnershipEvent::PermissionsUpdated { occurred_at, .. } => *occurred_at,
            PartnershipEvent::CounterProposed { proposal } => proposal.proposed_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decide / apply
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for Partnership {
    type Command = PartnershipCommand;
    type Event = PartnershipEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartnershipEvent::Requested {
                partnership_id,
                requester,
                recipient,
                level,
                notes,
                actor,
                occurred_at,
            } => {
                self.id = *partnership_id;
                self.requester = Some(*requester);
                self.recipient = Some(*recipient);
                self.status = PartnershipStatus::Pending;
                self.level = *level;
                self.permissions = FeaturePermissions::none();
                self.notes = notes.clone();
                self.requested_by = Some(*actor);
                self.requested_at = Some(*occurred_at);
                self.created = true;
            }
            PartnershipEvent::Approved {
                level,
                permissions,
                actor,
                occurred_at,
            }
            | PartnershipEvent::CounterProposalAccepted {
                level,
                permissions,
                actor,
                occurred_at,
            } => {
                self.status = PartnershipStatus::Active;
                self.level = *level;
                self.permissions = *permissions;
                self.counter_proposal = None;
                self.approved_by = Some(*actor);
                self.approved_at = Some(*occurred_at);
            }
            PartnershipEvent::CounterProposed { proposal } => {
                self.counter_proposal = Some(proposal.clone());
            }
            PartnershipEvent::Rejected {
                reason,
                actor,
                occurred_at,
            }
            | PartnershipEvent::Terminated {
                reason,
                actor,
                occurred_at,
            } => {
                self.status = PartnershipStatus::Terminated;
                self.counter_proposal = None;
                self.status_reason = Some(reason.clone());
                self.terminated_by = Some(*actor);
                self.terminated_at = Some(*occurred_at);
            }
            PartnershipEvent::Suspended { reason, .. } => {
                self.status = PartnershipStatus::Suspended;
                self.status_reason = Some(reason.clone());
            }
            PartnershipEvent::Reactivated { .. } => {
                self.status = PartnershipStatus::Active;
                self.status_reason = None;
            }
            PartnershipEvent::PermissionsUpdated { permissions, .. } => {
                self.permissions = *permissions;
            }
        }

        self.updated_at = Some(event.occurred_at());
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let actor = command.actor;
        let at = command.occurred_at;

        if let Transition::Request {
            requester,
            recipient,
            level,
            notes,
            max_level,
        } = &command.transition
        {
            return self.handle_request(actor, at, *requester, *recipient, *level, notes, *max_level);
        }

        self.ensure_mutable(&command.transition)?;
        self.ensure_party(actor)?;

        let event = match &command.transition {
            Transition::Request { .. } => {
                return Err(DomainError::conflict(format!(
                    "partnership {} already exists",
                    self.id
                )));
            }
            Transition::Approve { permissions } => {
                self.ensure_status(&command.transition, &[PartnershipStatus::Pending])?;
                if self.counter_proposal.is_some() {
                    return Err(DomainError::conflict(
                        "a counter-proposal is pending; accept it or counter again",
                    ));
                }
                self.ensure_responder(actor)?;
                PartnershipEvent::Approved {
                    level: self.level,
                    permissions: permissions.unwrap_or_else(|| self.level.default_permissions()),
                    actor,
                    occurred_at: at,
                }
            }
            Transition::CounterPropose {
                level,
                permissions,
                message,
                max_level,
            } => {
                self.ensure_status(&command.transition, &[PartnershipStatus::Pending])?;
                self.ensure_responder(actor)?;
                level.ensure_within(*max_level)?;
                PartnershipEvent::CounterProposed {
                    proposal: CounterProposal {
                        level: *level,
                        permissions: permissions.unwrap_or_else(|| level.default_permissions()),
                        message: message.clone(),
                        proposed_by: actor,
                        proposed_at: at,
                    },
                }
            }
            Transition::AcceptCounterProposal => {
                self.ensure_status(&command.transition, &[PartnershipStatus::Pending])?;
                let proposal = self
                    .counter_proposal
                    .as_ref()
                    .ok_or_else(|| DomainError::conflict("no counter-proposal to accept"))?;
                self.ensure_responder(actor)?;
                PartnershipEvent::CounterProposalAccepted {
                    level: proposal.level,
                    permissions: proposal.permissions,
                    actor,
                    occurred_at: at,
                }
            }
            Transition::Reject { reason } => {
                self.ensure_status(&command.transition, &[PartnershipStatus::Pending])?;
                self.ensure_responder(actor)?;
                PartnershipEvent::Rejected {
                    reason: reason.clone(),
                    actor,
                    occurred_at: at,
                }
            }
            Transition::Suspend { reason } => {
                self.ensure_status(&command.transition, &[PartnershipStatus::Active])?;
                PartnershipEvent::Suspended {
                    reason: reason.clone(),
                    actor,
                    occurred_at: at,
                }
            }
            Transition::Reactivate => {
                self.ensure_status(&command.transition, &[PartnershipStatus::Suspended])?;
                PartnershipEvent::Reactivated {
                    actor,
                    occurred_at: at,
                }
            }
            Transition::Terminate { reason } => {
                self.ensure_status(
                    &command.transition,
                    &[PartnershipStatus::Active, PartnershipStatus::Suspended],
                )?;
                PartnershipEvent::Terminated {
                    reason: reason.clone(),
                    actor,
                    occurred_at: at,
                }
            }
            Transition::UpdatePermissions { permissions } => {
                self.ensure_status(&command.transition, &[PartnershipStatus::Active])?;
                PartnershipEvent::PermissionsUpdated {
                    permissions: *permissions,
                    actor,
                    occurred_at: at,
                }
            }
        };

        Ok(vec![event])
    }
}

impl Partnership {
    #[allow(clippy::too_many_arguments)]
    fn handle_request(
        &self,
        actor: Actor,
        at: DateTime<Utc>,
        requester: TenantId,
        recipient: TenantId,
        level: FederationLevel,
        notes: &Option<String>,
        max_level: FederationLevel,
    ) -> Result<Vec<PartnershipEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!(
                "partnership {} already exists",
                self.id
            )));
        }
        TenantPair::new(requester, recipient)?;
        if actor.tenant_id != requester {
            return Err(DomainError::unauthorized(
                "only the requesting tenant can open a partnership request",
            ));
        }
        level.ensure_within(max_level)?;

        Ok(vec![PartnershipEvent::Requested {
            partnership_id: self.id,
            requester,
            recipient,
            level,
            notes: notes.clone(),
            actor,
            occurred_at: at,
        }])
    }

    fn ensure_mutable(&self, transition: &Transition) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("partnership {}", self.id)));
        }
        if self.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "cannot {} partnership {}: it is terminated",
                transition.name(),
                self.id
            )));
        }
        Ok(())
    }

    fn ensure_status(
        &self,
        transition: &Transition,
        allowed: &[PartnershipStatus],
    ) -> Result<(), DomainError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "cannot {} partnership in status '{}'",
                transition.name(),
                self.status
            )))
        }
    }

    fn ensure_party(&self, actor: Actor) -> Result<(), DomainError> {
        match self.pair() {
            Some(pair) if pair.contains(actor.tenant_id) => Ok(()),
            _ => Err(DomainError::unauthorized(format!(
                "tenant {} is not a party to partnership {}",
                actor.tenant_id, self.id
            ))),
        }
    }

    /// The tenant expected to answer the latest proposal: the recipient of
    /// the original request, or whoever did not make the pending counter.
    fn ensure_responder(&self, actor: Actor) -> Result<(), DomainError> {
        let proposer = match &self.counter_proposal {
            Some(p) => p.proposed_by.tenant_id,
            None => self.requester.unwrap_or(actor.tenant_id),
        };
        if actor.tenant_id == proposer {
            return Err(DomainError::unauthorized(
                "the proposing tenant cannot answer its own proposal",
            ));
        }
        Ok(())
    }
}
