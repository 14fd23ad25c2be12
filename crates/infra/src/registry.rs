//! Partnership registry: storage plus the transition pipeline.
//!
//! Every transition runs the same steps:
//!
//! ```text
//! load (by id) → handle (pure) → apply → CAS update → invalidate cache
//!              → audit → publish envelope
//! ```
//!
//! The stored version is the compare-and-swap token, so two racing
//! transitions on one partnership cannot both commit. Audit and publication
//! happen after the commit and never undo it; every transition returns a
//! [`Committed`] carrying whether its audit entry was written.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::json;
use tracing::{info, warn};

use hourbridge_core::{Aggregate, AggregateRoot, DomainError, PartnershipId, TenantId};
use hourbridge_events::{Event, EventBus, EventEnvelope};
use hourbridge_federation::{
    Actor, FeaturePermissions, FederationLevel, Partnership, PartnershipCommand, PartnershipEvent,
    PartnershipStatus, TenantPair, Transition,
};

use crate::audit::{AuditCategory, AuditEntry, AuditLevel, AuditLog, AuditStatus, Committed};
use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::config_store::ConfigStore;
use crate::error::{FederationResult, StoreError};

pub const AGGREGATE_TYPE: &str = "federation.partnership";

/// A committed partnership transition and the state of its audit entry.
pub type PartnershipChange = Committed<Partnership>;

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

pub trait PartnershipStore: Send + Sync {
    fn get(&self, id: PartnershipId) -> Result<Option<Partnership>, StoreError>;

    /// Current row for the pair: the live one, or the most recent terminated.
    fn find_by_pair(&self, pair: TenantPair) -> Result<Option<Partnership>, StoreError>;

    /// Fails with `Duplicate` while the pair already has a non-terminated row.
    fn insert(&self, partnership: Partnership) -> Result<(), StoreError>;

    /// Fails with `VersionConflict` unless the stored version is `expected_version`.
    fn update(&self, partnership: Partnership, expected_version: u64) -> Result<(), StoreError>;

    fn list_for_tenant(&self, tenant: TenantId) -> Result<Vec<Partnership>, StoreError>;
}

impl<S> PartnershipStore for Arc<S>
where
    S: PartnershipStore + ?Sized,
{
    fn get(&self, id: PartnershipId) -> Result<Option<Partnership>, StoreError> {
        (**self).get(id)
    }

    fn find_by_pair(&self, pair: TenantPair) -> Result<Option<Partnership>, StoreError> {
        (**self).find_by_pair(pair)
    }

    fn insert(&self, partnership: Partnership) -> Result<(), StoreError> {
        (**self).insert(partnership)
    }

    fn update(&self, partnership: Partnership, expected_version: u64) -> Result<(), StoreError> {
        (**self).update(partnership, expected_version)
    }

    fn list_for_tenant(&self, tenant: TenantId) -> Result<Vec<Partnership>, StoreError> {
        (**self).list_for_tenant(tenant)
    }
}

#[derive(Debug, Default)]
struct Rows {
    by_id: HashMap<PartnershipId, Partnership>,
    by_pair: HashMap<TenantPair, PartnershipId>,
}

#[derive(Debug, Default)]
pub struct InMemoryPartnershipStore {
    rows: RwLock<Rows>,
}

impl InMemoryPartnershipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PartnershipStore for InMemoryPartnershipStore {
    fn get(&self, id: PartnershipId) -> Result<Option<Partnership>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned("partnerships"))?;
        Ok(rows.by_id.get(&id).cloned())
    }

    fn find_by_pair(&self, pair: TenantPair) -> Result<Option<Partnership>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned("partnerships"))?;
        Ok(rows
            .by_pair
            .get(&pair)
            .and_then(|id| rows.by_id.get(id))
            .cloned())
    }

    fn insert(&self, partnership: Partnership) -> Result<(), StoreError> {
        let pair = partnership
            .pair()
            .ok_or_else(|| StoreError::Unavailable("cannot store an unrequested partnership".into()))?;
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned("partnerships"))?;

        let live = rows
            .by_pair
            .get(&pair)
            .and_then(|id| rows.by_id.get(id))
            .is_some_and(|p| !p.status().is_terminal());
        if live {
            return Err(StoreError::Duplicate(format!(
                "a partnership already exists between {} and {}",
                pair.low(),
                pair.high()
            )));
        }
        let id = partnership.id_typed();
        if rows.by_id.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("partnership {id} already stored")));
        }

        rows.by_pair.insert(pair, id);
        rows.by_id.insert(id, partnership);
        Ok(())
    }

    fn update(&self, partnership: Partnership, expected_version: u64) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned("partnerships"))?;
        let id = partnership.id_typed();
        let current = rows
            .by_id
            .get(&id)
            .map(|p| p.version())
            .ok_or_else(|| StoreError::VersionConflict(format!("partnership {id} missing")))?;
        if current != expected_version {
            return Err(StoreError::VersionConflict(format!(
                "partnership {id}: expected version {expected_version}, found {current}"
            )));
        }
        rows.by_id.insert(id, partnership);
        Ok(())
    }

    fn list_for_tenant(&self, tenant: TenantId) -> Result<Vec<Partnership>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned("partnerships"))?;
        let mut out: Vec<_> = rows
            .by_id
            .values()
            .filter(|p| p.pair().is_some_and(|pair| pair.contains(tenant)))
            .cloned()
            .collect();
        out.sort_by_key(|p| p.requested_at());
        Ok(out)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

pub struct PartnershipRegistry<S, B> {
    store: S,
    bus: B,
    config: Arc<dyn ConfigStore>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
    by_pair: TtlCache<TenantPair, Option<Partnership>>,
}

impl<S, B> core::fmt::Debug for PartnershipRegistry<S, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PartnershipRegistry")
            .field("cache_ttl", &self.by_pair.ttl())
            .finish_non_exhaustive()
    }
}

impl<S, B> PartnershipRegistry<S, B>
where
    S: PartnershipStore,
    B: EventBus<EventEnvelope<PartnershipEvent>>,
{
    pub fn new(
        store: S,
        bus: B,
        config: Arc<dyn ConfigStore>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
        cache_ttl: chrono::Duration,
    ) -> Self {
        let by_pair = TtlCache::new(cache_ttl, clock.clone());
        Self {
            store,
            bus,
            config,
            audit,
            clock,
            by_pair,
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    // ── transitions ─────────────────────────────────────────────────────────

    pub fn request(
        &self,
        actor: Actor,
        recipient: TenantId,
        level: FederationLevel,
        notes: Option<String>,
    ) -> FederationResult<PartnershipChange> {
        let pair = TenantPair::new(actor.tenant_id, recipient)?;
        if let Some(existing) = self.store.find_by_pair(pair)? {
            if !existing.status().is_terminal() {
                return Err(DomainError::conflict(format!(
                    "partnership {} already exists between these tenants ({})",
                    existing.id_typed(),
                    existing.status()
                ))
                .into());
            }
        }

        let max_level = self.config.controls()?.max_federation_level;
        let command = PartnershipCommand::new(
            actor,
            self.clock.now(),
            Transition::Request {
                requester: actor.tenant_id,
                recipient,
                level,
                notes,
                max_level,
            },
        );

        let mut partnership = Partnership::empty(PartnershipId::new());
        let events = partnership.handle(&command)?;
        for event in &events {
            partnership.apply(event);
        }
        self.store.insert(partnership.clone())?;
        self.by_pair.invalidate(&pair);

        let audit = self.after_commit(&partnership, &command, &events);
        Ok(Committed::new(partnership, audit))
    }

    /// `None` grants the default permissions of the requested level.
    pub fn approve(
        &self,
        id: PartnershipId,
        actor: Actor,
        permissions: Option<FeaturePermissions>,
    ) -> FederationResult<PartnershipChange> {
        self.transition(id, actor, Transition::Approve { permissions })
    }

    pub fn counter_propose(
        &self,
        id: PartnershipId,
        actor: Actor,
        level: FederationLevel,
        permissions: Option<FeaturePermissions>,
        message: Option<String>,
    ) -> FederationResult<PartnershipChange> {
        let max_level = self.config.controls()?.max_federation_level;
        self.transition(
            id,
            actor,
            Transition::CounterPropose {
                level,
                permissions,
                message,
                max_level,
            },
        )
    }

    pub fn accept_counter_proposal(&self, id: PartnershipId, actor: Actor) -> FederationResult<PartnershipChange> {
        self.transition(id, actor, Transition::AcceptCounterProposal)
    }

    pub fn reject(&self, id: PartnershipId, actor: Actor, reason: impl Into<String>) -> FederationResult<PartnershipChange> {
        self.transition(id, actor, Transition::Reject { reason: reason.into() })
    }

    pub fn suspend(&self, id: PartnershipId, actor: Actor, reason: impl Into<String>) -> FederationResult<PartnershipChange> {
        self.transition(id, actor, Transition::Suspend { reason: reason.into() })
    }

    pub fn reactivate(&self, id: PartnershipId, actor: Actor) -> FederationResult<PartnershipChange> {
        self.transition(id, actor, Transition::Reactivate)
    }

    pub fn terminate(&self, id: PartnershipId, actor: Actor, reason: impl Into<String>) -> FederationResult<PartnershipChange> {
        self.transition(id, actor, Transition::Terminate { reason: reason.into() })
    }

    pub fn update_permissions(
        &self,
        id: PartnershipId,
        actor: Actor,
        permissions: FeaturePermissions,
    ) -> FederationResult<PartnershipChange> {
        self.transition(id, actor, Transition::UpdatePermissions { permissions })
    }

    fn transition(&self, id: PartnershipId, actor: Actor, transition: Transition) -> FederationResult<PartnershipChange> {
        let mut partnership = self
            .store
            .get(id)?
            .ok_or_else(|| DomainError::not_found(format!("partnership {id}")))?;
        let expected_version = partnership.version();

        let command = PartnershipCommand::new(actor, self.clock.now(), transition);
        let events = partnership.handle(&command)?;
        for event in &events {
            partnership.apply(event);
        }

        self.store.update(partnership.clone(), expected_version)?;
        if let Some(pair) = partnership.pair() {
            self.by_pair.invalidate(&pair);
        }

        let audit = self.after_commit(&partnership, &command, &events);
        Ok(Committed::new(partnership, audit))
    }

    /// Audit and publish a committed change. Neither can undo the commit; a
    /// failed audit write is reported back as [`AuditStatus::Degraded`].
    fn after_commit(
        &self,
        partnership: &Partnership,
        command: &PartnershipCommand,
        events: &[PartnershipEvent],
    ) -> AuditStatus {
        let actor = command.actor;
        let counterpart = partnership.counterpart_of(actor.tenant_id);
        let action = format!("{AGGREGATE_TYPE}.{}", command.transition.name());

        info!(
            partnership_id = %partnership.id_typed(),
            action = %action,
            status = %partnership.status(),
            version = partnership.version(),
            "partnership transition committed"
        );

        let level = match command.transition {
            Transition::Suspend { .. } | Transition::Terminate { .. } => AuditLevel::Warning,
            _ => AuditLevel::Info,
        };
        let mut entry = AuditEntry::new(action, AuditCategory::Partnership, level, command.occurred_at)
            .source(actor.tenant_id)
            .actor(actor.user_id)
            .data(json!({
                "partnership_id": partnership.id_typed(),
                "transition": command.transition,
                "status": partnership.status().as_str(),
                "level": partnership.level(),
                "permissions": partnership.permissions(),
                "version": partnership.version(),
            }));
        if let Some(other) = counterpart {
            entry = entry.target(other);
        }
        let audit = match self.audit.record(entry) {
            Ok(()) => AuditStatus::Recorded,
            Err(err) => {
                warn!(partnership_id = %partnership.id_typed(), error = %err, "audit write failed after commit; change reported as degraded");
                AuditStatus::Degraded
            }
        };

        let mut sequence = partnership.version() - events.len() as u64;
        for event in events {
            sequence += 1;
            let envelope = EventEnvelope::new(
                actor.tenant_id,
                counterpart,
                partnership.id_typed().into(),
                AGGREGATE_TYPE,
                event.event_type(),
                sequence,
                event.occurred_at(),
                event.clone(),
            );
            if let Err(err) = self.bus.publish(envelope) {
                warn!(partnership_id = %partnership.id_typed(), error = ?err, "event publication failed after commit");
            }
        }
        audit
    }

    // ── queries ─────────────────────────────────────────────────────────────

    pub fn get(&self, id: PartnershipId) -> FederationResult<Partnership> {
        self.store
            .get(id)?
            .ok_or_else(|| DomainError::not_found(format!("partnership {id}")).into())
    }

    /// Current partnership for the unordered pair, read through the cache.
    pub fn find_between(&self, a: TenantId, b: TenantId) -> FederationResult<Option<Partnership>> {
        let pair = TenantPair::new(a, b)?;
        Ok(self
            .by_pair
            .get_or_try_insert(&pair, || self.store.find_by_pair(pair))?)
    }

    pub fn list_for_tenant(
        &self,
        tenant: TenantId,
        status: Option<PartnershipStatus>,
    ) -> FederationResult<Vec<Partnership>> {
        let all = self.store.list_for_tenant(tenant)?;
        Ok(all
            .into_iter()
            .filter(|p| status.is_none_or(|s| p.status() == s))
            .collect())
    }

    pub fn active_partners_of(&self, tenant: TenantId) -> FederationResult<Vec<TenantId>> {
        let mut partners: Vec<TenantId> = self
            .list_for_tenant(tenant, Some(PartnershipStatus::Active))?
            .iter()
            .filter_map(|p| p.counterpart_of(tenant))
            .collect();
        partners.sort();
        partners.dedup();
        Ok(partners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditFilter, InMemoryAuditLog};
    use crate::clock::ManualClock;
    use crate::config_store::InMemoryConfigStore;
    use crate::error::FederationError;
    use chrono::{Duration, Utc};
    use hourbridge_core::UserId;
    use hourbridge_events::InMemoryEventBus;
    use hourbridge_federation::SystemControls;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    type Registry = PartnershipRegistry<InMemoryPartnershipStore, InMemoryEventBus<EventEnvelope<PartnershipEvent>>>;

    struct Fixture {
        registry: Registry,
        audit: Arc<InMemoryAuditLog>,
        clock: Arc<ManualClock>,
        a: Actor,
        b: Actor,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let audit = Arc::new(InMemoryAuditLog::new());
        let config = Arc::new(InMemoryConfigStore::new(SystemControls::initial(clock.now())));
        let registry = PartnershipRegistry::new(
            InMemoryPartnershipStore::new(),
            InMemoryEventBus::new(),
            config,
            audit.clone(),
            clock.clone(),
            Duration::minutes(1),
        );
        Fixture {
            registry,
            audit,
            clock,
            a: Actor::new(TenantId::new(), UserId::new()),
            b: Actor::new(TenantId::new(), UserId::new()),
        }
    }

    fn level(n: u8) -> FederationLevel {
        FederationLevel::new(n).unwrap()
    }

    #[test]
    fn request_then_approve_grants_level_defaults() {
        let f = fixture();
        let p = f.registry.request(f.a, f.b.tenant_id, level(2), None).unwrap();
        assert_eq!(p.status(), PartnershipStatus::Pending);

        let p = f.registry.approve(p.id_typed(), f.b, None).unwrap();
        assert!(p.is_active());
        assert_eq!(p.permissions(), level(2).default_permissions());
        assert_eq!(f.registry.active_partners_of(f.a.tenant_id).unwrap(), vec![f.b.tenant_id]);
    }

    #[test]
    fn duplicate_request_in_either_direction_conflicts() {
        let f = fixture();
        f.registry.request(f.a, f.b.tenant_id, level(1), None).unwrap();

        let err = f.registry.request(f.b, f.a.tenant_id, level(1), None).unwrap_err();
        assert!(matches!(err, FederationError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn terminated_pair_can_be_requested_again() {
        let f = fixture();
        let first = f.registry.request(f.a, f.b.tenant_id, level(1), None).unwrap();
        f.registry.reject(first.id_typed(), f.b, "not now").unwrap();

        let second = f.registry.request(f.b, f.a.tenant_id, level(1), None).unwrap();
        assert_ne!(second.id_typed(), first.id_typed());

        let current = f.registry.find_between(f.a.tenant_id, f.b.tenant_id).unwrap().unwrap();
        assert_eq!(current.id_typed(), second.id_typed());
        assert_eq!(
            f.registry.get(first.id_typed()).unwrap().status(),
            PartnershipStatus::Terminated
        );
    }

    #[test]
    fn approve_on_terminated_partnership_conflicts() {
        let f = fixture();
        let p = f.registry.request(f.a, f.b.tenant_id, level(1), None).unwrap();
        f.registry.approve(p.id_typed(), f.b, None).unwrap();
        f.registry.terminate(p.id_typed(), f.a, "closing").unwrap();

        let err = f.registry.approve(p.id_typed(), f.b, None).unwrap_err();
        assert!(matches!(err, FederationError::Domain(DomainError::Conflict(_))));
    }

    #[test]
    fn level_above_system_maximum_is_rejected() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let controls = SystemControls::initial(clock.now())
            .revised(UserId::new(), clock.now(), |c| c.max_federation_level = level(2));
        let registry = PartnershipRegistry::new(
            InMemoryPartnershipStore::new(),
            InMemoryEventBus::<EventEnvelope<PartnershipEvent>>::new(),
            Arc::new(InMemoryConfigStore::new(controls)),
            Arc::new(InMemoryAuditLog::new()),
            clock,
            Duration::minutes(1),
        );
        let a = Actor::new(TenantId::new(), UserId::new());

        let err = registry.request(a, TenantId::new(), level(3), None).unwrap_err();
        assert!(matches!(err, FederationError::Domain(DomainError::Validation(_))));
    }

    #[test]
    fn counter_proposal_flow_adopts_the_proposal() {
        let f = fixture();
        let p = f.registry.request(f.a, f.b.tenant_id, level(3), None).unwrap();
        f.registry
            .counter_propose(p.id_typed(), f.b, level(2), None, Some("start smaller".into()))
            .unwrap();

        // the proposer cannot accept its own proposal
        let err = f.registry.accept_counter_proposal(p.id_typed(), f.b).unwrap_err();
        assert!(matches!(err, FederationError::Domain(DomainError::Unauthorized(_))));

        let p = f.registry.accept_counter_proposal(p.id_typed(), f.a).unwrap();
        assert!(p.is_active());
        assert_eq!(p.level(), level(2));
        assert!(p.counter_proposal().is_none());
    }

    #[test]
    fn transitions_are_audited_and_published() {
        let f = fixture();
        let events = f.registry.bus().subscribe();
        let p = f.registry.request(f.a, f.b.tenant_id, level(1), None).unwrap();
        f.registry.approve(p.id_typed(), f.b, None).unwrap();
        f.clock.advance(Duration::seconds(5));
        f.registry.suspend(p.id_typed(), f.a, "review").unwrap();

        let published = events.drain();
        assert_eq!(published.len(), 3);
        assert_eq!(published[2].event_type(), "federation.partnership.suspended");
        assert_eq!(published[2].sequence_number(), 3);
        assert_eq!(published[2].counterpart_tenant_id(), Some(f.b.tenant_id));

        let entries = f
            .audit
            .query(&AuditFilter {
                tenant: Some(f.b.tenant_id),
                ..AuditFilter::default()
            })
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].action_type, "federation.partnership.suspend");
        assert_eq!(entries[0].level, AuditLevel::Warning);
    }

    #[test]
    fn stale_version_loses_compare_and_swap() {
        let store = InMemoryPartnershipStore::new();
        let a = Actor::new(TenantId::new(), UserId::new());
        let b = TenantId::new();
        let mut p = Partnership::empty(PartnershipId::new());
        let events = p
            .handle(&PartnershipCommand::new(
                a,
                Utc::now(),
                Transition::Request {
                    requester: a.tenant_id,
                    recipient: b,
                    level: level(1),
                    notes: None,
                    max_level: FederationLevel::MAX,
                },
            ))
            .unwrap();
        for e in &events {
            p.apply(e);
        }
        store.insert(p.clone()).unwrap();

        store.update(p.clone(), 1).unwrap();
        assert!(matches!(store.update(p, 0), Err(StoreError::VersionConflict(_))));
    }

    #[test]
    fn committed_transition_reports_audit_outage() {
        let f = fixture();
        let p = f.registry.request(f.a, f.b.tenant_id, level(1), None).unwrap();
        assert_eq!(p.audit, AuditStatus::Recorded);

        f.audit.set_unavailable(true);
        let approved = f.registry.approve(p.id_typed(), f.b, None).unwrap();
        assert!(approved.audit_degraded());
        assert_eq!(f.registry.get(p.id_typed()).unwrap().status(), PartnershipStatus::Active);

        f.audit.set_unavailable(false);
        let suspended = f.registry.suspend(p.id_typed(), f.a, "review").unwrap();
        assert!(!suspended.audit_degraded());
        assert_eq!(suspended.into_inner().status(), PartnershipStatus::Suspended);
    }

    /// Holds every `get` until two callers have loaded, so both work from the
    /// same version.
    struct LockstepStore {
        inner: InMemoryPartnershipStore,
        armed: AtomicBool,
        gate: Barrier,
    }

    impl PartnershipStore for LockstepStore {
        fn get(&self, id: PartnershipId) -> Result<Option<Partnership>, StoreError> {
            let found = self.inner.get(id);
            if self.armed.load(Ordering::SeqCst) {
                self.gate.wait();
            }
            found
        }

        fn find_by_pair(&self, pair: TenantPair) -> Result<Option<Partnership>, StoreError> {
            self.inner.find_by_pair(pair)
        }

        fn insert(&self, partnership: Partnership) -> Result<(), StoreError> {
            self.inner.insert(partnership)
        }

        fn update(&self, partnership: Partnership, expected_version: u64) -> Result<(), StoreError> {
            self.inner.update(partnership, expected_version)
        }

        fn list_for_tenant(&self, tenant: TenantId) -> Result<Vec<Partnership>, StoreError> {
            self.inner.list_for_tenant(tenant)
        }
    }

    #[test]
    fn racing_approvals_commit_exactly_once() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let audit = Arc::new(InMemoryAuditLog::new());
        let registry = PartnershipRegistry::new(
            Arc::new(LockstepStore {
                inner: InMemoryPartnershipStore::new(),
                armed: AtomicBool::new(false),
                gate: Barrier::new(2),
            }),
            InMemoryEventBus::<EventEnvelope<PartnershipEvent>>::new(),
            Arc::new(InMemoryConfigStore::new(SystemControls::initial(clock.now()))),
            audit.clone(),
            clock,
            Duration::minutes(1),
        );
        let a = Actor::new(TenantId::new(), UserId::new());
        let b = Actor::new(TenantId::new(), UserId::new());
        let id = registry.request(a, b.tenant_id, level(2), None).unwrap().id_typed();

        registry.store.armed.store(true, Ordering::SeqCst);
        let results: Vec<_> = thread::scope(|s| {
            let racers: Vec<_> = (0..2).map(|_| s.spawn(|| registry.approve(id, b, None))).collect();
            racers.into_iter().map(|h| h.join().unwrap()).collect()
        });
        registry.store.armed.store(false, Ordering::SeqCst);

        let won = results.iter().filter(|r| r.is_ok()).count();
        let lost: Vec<_> = results.into_iter().filter_map(Result::err).collect();
        assert_eq!(won, 1);
        assert_eq!(lost.len(), 1);
        assert!(matches!(lost[0], FederationError::Domain(DomainError::Concurrency(_))));

        let stored = registry.get(id).unwrap();
        assert!(stored.is_active());
        assert_eq!(stored.version(), 2);
        let approvals = audit
            .query(&AuditFilter {
                action_type: Some(format!("{AGGREGATE_TYPE}.approve")),
                ..AuditFilter::default()
            })
            .unwrap();
        assert_eq!(approvals.len(), 1);
    }
}
