//! Permission gateway: the single decision point for cross-tenant operations.
//!
//! Every operation runs the same cascade, parameterized by its
//! [`OperationRule`](hourbridge_federation::OperationRule):
//!
//! 1. emergency lockdown → deny `system`, even for malformed requests
//! 2. federation or the feature switched off system-wide → deny `system`
//! 3. whitelist mode and a tenant not whitelisted → deny `tenant`
//! 4. source tenant master or feature flag off → deny `tenant`
//! 5. target tenant master or feature flag off → deny `tenant`
//! 6. no active partnership, or the feature not granted → deny `partnership`
//! 7. the relevant user not opted in, or the operation flag off → deny `user`
//! 8. allow
//!
//! The controls snapshot is read once per check so one decision never mixes
//! two versions of the system switches.

use std::sync::Arc;

use serde_json::{Value as JsonValue, json};
use tracing::{debug, error, warn};
use uuid::Uuid;

use hourbridge_core::{DomainError, TenantId, UserId};
use hourbridge_federation::{
    AccessRequest, DenialLayer, FederationOperation, Partnership, PartnershipEvent, SystemControls,
    TenantFlag, TransferAmount, UserFlag, Verdict,
};
use hourbridge_events::{EventBus, EventEnvelope};

use crate::audit::{AuditCategory, AuditEntry, AuditLevel, AuditLog, AuditStatus};
use crate::clock::Clock;
use crate::config_store::ConfigStore;
use crate::error::FederationResult;
use crate::preferences::PreferenceStore;
use crate::registry::{PartnershipRegistry, PartnershipStore};

/// Read side of the partnership registry used by decisions.
pub trait PartnershipLookup: Send + Sync {
    /// Current partnership of the unordered pair.
    fn between(&self, a: TenantId, b: TenantId) -> FederationResult<Option<Partnership>>;

    fn active_partners_of(&self, tenant: TenantId) -> FederationResult<Vec<TenantId>>;
}

impl<S, B> PartnershipLookup for PartnershipRegistry<S, B>
where
    S: PartnershipStore,
    B: EventBus<EventEnvelope<PartnershipEvent>>,
{
    fn between(&self, a: TenantId, b: TenantId) -> FederationResult<Option<Partnership>> {
        self.find_between(a, b)
    }

    fn active_partners_of(&self, tenant: TenantId) -> FederationResult<Vec<TenantId>> {
        PartnershipRegistry::active_partners_of(self, tenant)
    }
}

impl<L> PartnershipLookup for Arc<L>
where
    L: PartnershipLookup + ?Sized,
{
    fn between(&self, a: TenantId, b: TenantId) -> FederationResult<Option<Partnership>> {
        (**self).between(a, b)
    }

    fn active_partners_of(&self, tenant: TenantId) -> FederationResult<Vec<TenantId>> {
        (**self).active_partners_of(tenant)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Verdict(Verdict),
    /// Malformed request, rejected once lockdown is ruled out.
    Invalid { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    pub audit: AuditStatus,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(&self.outcome, Outcome::Verdict(v) if v.allowed)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.outcome, Outcome::Invalid { .. })
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        match &self.outcome {
            Outcome::Verdict(v) => Some(v),
            Outcome::Invalid { .. } => None,
        }
    }

    pub fn audit_degraded(&self) -> bool {
        self.audit == AuditStatus::Degraded
    }
}

pub struct PermissionGateway {
    config: Arc<dyn ConfigStore>,
    partnerships: Arc<dyn PartnershipLookup>,
    preferences: Arc<dyn PreferenceStore>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl core::fmt::Debug for PermissionGateway {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PermissionGateway").finish_non_exhaustive()
    }
}

impl PermissionGateway {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        partnerships: Arc<dyn PartnershipLookup>,
        preferences: Arc<dyn PreferenceStore>,
        audit: Arc<dyn AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            partnerships,
            preferences,
            audit,
            clock,
        }
    }

    pub fn can_view_profile(
        &self,
        actor: UserId,
        actor_tenant: TenantId,
        target_user: UserId,
        target_tenant: TenantId,
    ) -> FederationResult<Decision> {
        self.check(&AccessRequest::new(
            FederationOperation::ViewProfile,
            actor,
            actor_tenant,
            target_user.into(),
            target_tenant,
        ))
    }

    pub fn can_send_message(
        &self,
        actor: UserId,
        actor_tenant: TenantId,
        target_user: UserId,
        target_tenant: TenantId,
    ) -> FederationResult<Decision> {
        self.check(&AccessRequest::new(
            FederationOperation::SendMessage,
            actor,
            actor_tenant,
            target_user.into(),
            target_tenant,
        ))
    }

    /// `amount_hours` must lie in 0.01..=100; anything else is an invalid outcome.
    pub fn can_perform_transaction(
        &self,
        actor: UserId,
        actor_tenant: TenantId,
        target_user: UserId,
        target_tenant: TenantId,
        amount_hours: f64,
    ) -> FederationResult<Decision> {
        let request = AccessRequest::new(
            FederationOperation::PerformTransaction,
            actor,
            actor_tenant,
            target_user.into(),
            target_tenant,
        );
        match TransferAmount::from_hours(amount_hours) {
            Ok(amount) => self.check(&request.with_amount(amount)),
            Err(err) => self.decide(&request, Err(err), json!({ "amount_hours": amount_hours })),
        }
    }

    pub fn can_view_listings(
        &self,
        actor: UserId,
        actor_tenant: TenantId,
        listing_id: Uuid,
        listing_owner: UserId,
        target_tenant: TenantId,
    ) -> FederationResult<Decision> {
        self.check(
            &AccessRequest::new(
                FederationOperation::ViewListings,
                actor,
                actor_tenant,
                listing_id,
                target_tenant,
            )
            .with_owner(listing_owner),
        )
    }

    pub fn can_view_events(
        &self,
        actor: UserId,
        actor_tenant: TenantId,
        event_id: Uuid,
        target_tenant: TenantId,
    ) -> FederationResult<Decision> {
        self.check(&AccessRequest::new(
            FederationOperation::ViewEvents,
            actor,
            actor_tenant,
            event_id,
            target_tenant,
        ))
    }

    pub fn can_join_group(
        &self,
        actor: UserId,
        actor_tenant: TenantId,
        group_id: Uuid,
        target_tenant: TenantId,
    ) -> FederationResult<Decision> {
        self.check(&AccessRequest::new(
            FederationOperation::JoinGroup,
            actor,
            actor_tenant,
            group_id,
            target_tenant,
        ))
    }

    /// Evaluate a prepared request. Store faults propagate as errors; every
    /// decision (allow, deny, invalid) is audited.
    pub fn check(&self, request: &AccessRequest) -> FederationResult<Decision> {
        self.decide(request, request.validate(), JsonValue::Null)
    }

    /// Lockdown outranks everything, malformed input included. Validation
    /// then runs before any layer that needs a well-formed pair.
    fn decide(
        &self,
        request: &AccessRequest,
        validity: Result<(), DomainError>,
        input: JsonValue,
    ) -> FederationResult<Decision> {
        let controls = self.config.controls()?;
        if let Some(lockdown) = &controls.lockdown {
            let verdict = Verdict::deny(
                DenialLayer::System,
                format!("emergency lockdown active: {}", lockdown.reason),
            );
            error!(operation = %request.operation, actor_tenant = %request.actor_tenant, target_tenant = %request.target_tenant, reason = %verdict.reason, "federation check denied by emergency lockdown");
            let data = json!({ "request": request, "verdict": verdict, "input": input });
            let audit = self.record(request, AuditLevel::Critical, data);
            return Ok(Decision {
                outcome: Outcome::Verdict(verdict),
                audit,
            });
        }

        if let Err(err) = validity {
            return Ok(self.reject_invalid(request, err, input));
        }

        let verdict = self.cascade(request, &controls)?;
        let level = if verdict.allowed {
            debug!(operation = %request.operation, actor_tenant = %request.actor_tenant, target_tenant = %request.target_tenant, "federation check allowed");
            AuditLevel::Info
        } else {
            warn!(operation = %request.operation, layer = %verdict.denied_at_layer, reason = %verdict.reason, "federation check denied");
            AuditLevel::Warning
        };

        let data = json!({ "request": request, "verdict": verdict });
        let audit = self.record(request, level, data);
        Ok(Decision {
            outcome: Outcome::Verdict(verdict),
            audit,
        })
    }

    fn reject_invalid(&self, request: &AccessRequest, err: DomainError, extra: JsonValue) -> Decision {
        let reason = err.to_string();
        warn!(operation = %request.operation, reason = %reason, "federation check rejected as invalid");
        let data = json!({ "request": request, "invalid": reason, "input": extra });
        let audit = self.record(request, AuditLevel::Warning, data);
        Decision {
            outcome: Outcome::Invalid { reason },
            audit,
        }
    }

    fn record(&self, request: &AccessRequest, level: AuditLevel, data: JsonValue) -> AuditStatus {
        let entry = AuditEntry::new(
            request.operation.action_type(),
            AuditCategory::Access,
            level,
            self.clock.now(),
        )
        .source(request.actor_tenant)
        .target(request.target_tenant)
        .actor(request.actor)
        .data(data);

        match self.audit.record(entry) {
            Ok(()) => AuditStatus::Recorded,
            Err(err) => {
                warn!(operation = %request.operation, error = %err, "audit write failed; returning decision as degraded");
                AuditStatus::Degraded
            }
        }
    }

    /// Steps 2 to 8, against one controls snapshot.
    fn cascade(&self, request: &AccessRequest, controls: &SystemControls) -> FederationResult<Verdict> {
        let rule = request.operation.rule();
        let feature = rule.feature;

        if !controls.federation_enabled {
            return Ok(Verdict::deny(DenialLayer::System, "federation is disabled system-wide"));
        }
        if !controls.feature_enabled(feature) {
            return Ok(Verdict::deny(
                DenialLayer::System,
                format!("{feature} federation is disabled system-wide"),
            ));
        }

        if controls.whitelist_mode_enabled {
            for tenant in [request.actor_tenant, request.target_tenant] {
                if self.config.whitelist_entry(tenant)?.is_none() {
                    return Ok(Verdict::deny(
                        DenialLayer::Tenant,
                        format!("tenant {tenant} is not whitelisted for federation"),
                    ));
                }
            }
        }

        for (side, tenant) in [("source", request.actor_tenant), ("target", request.target_tenant)] {
            if !self.config.tenant_flag(tenant, TenantFlag::Federation)? {
                return Ok(Verdict::deny(
                    DenialLayer::Tenant,
                    format!("{side} tenant has federation disabled"),
                ));
            }
            if !self.config.tenant_flag(tenant, TenantFlag::Feature(feature))? {
                return Ok(Verdict::deny(
                    DenialLayer::Tenant,
                    format!("{side} tenant has {feature} federation disabled"),
                ));
            }
        }

        match self.partnerships.between(request.actor_tenant, request.target_tenant)? {
            None => {
                return Ok(Verdict::deny(
                    DenialLayer::Partnership,
                    "no partnership between these tenants",
                ));
            }
            Some(p) if !p.is_active() => {
                return Ok(Verdict::deny(
                    DenialLayer::Partnership,
                    format!("partnership is {}", p.status()),
                ));
            }
            Some(p) if !p.permissions().allows(feature) => {
                return Ok(Verdict::deny(
                    DenialLayer::Partnership,
                    format!("partnership does not grant {feature}"),
                ));
            }
            Some(_) => {}
        }

        let subject = request.subject_user();
        let settings = self.preferences.get(subject)?;
        let verdict = match settings {
            Some(s) if s.tenant_id != request.subject_tenant() => {
                Verdict::deny(DenialLayer::User, "user does not belong to the expected tenant")
            }
            Some(s) if !s.federation_optin => {
                Verdict::deny(DenialLayer::User, "user has not opted in to federation")
            }
            None => Verdict::deny(DenialLayer::User, "user has not opted in to federation"),
            Some(s) if !s.allows(rule.flag) => {
                Verdict::deny(DenialLayer::User, format!("user has {} turned off", flag_name(rule.flag)))
            }
            Some(_) => Verdict::allow(),
        };
        Ok(verdict)
    }
}

fn flag_name(flag: UserFlag) -> &'static str {
    match flag {
        UserFlag::ProfileVisible => "profile visibility",
        UserFlag::MessagingEnabled => "federated messaging",
        UserFlag::TransactionsEnabled => "federated transactions",
        UserFlag::OptInOnly => "federation",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditFilter, InMemoryAuditLog};
    use crate::clock::ManualClock;
    use crate::config_store::{InMemoryConfigStore, WhitelistEntry};
    use crate::preferences::InMemoryPreferenceStore;
    use crate::registry::InMemoryPartnershipStore;
    use chrono::{Duration, Utc};
    use hourbridge_events::InMemoryEventBus;
    use hourbridge_federation::{Actor, FederationFeature, FederationLevel, UserFederationSettings};

    type Registry =
        PartnershipRegistry<InMemoryPartnershipStore, InMemoryEventBus<EventEnvelope<PartnershipEvent>>>;

    struct World {
        gateway: PermissionGateway,
        config: Arc<InMemoryConfigStore>,
        registry: Arc<Registry>,
        prefs: Arc<InMemoryPreferenceStore>,
        audit: Arc<InMemoryAuditLog>,
        a: Actor,
        b: Actor,
    }

    fn opted_in(user: UserId, tenant: TenantId) -> UserFederationSettings {
        let mut s = UserFederationSettings::opted_out(user, tenant, Utc::now());
        s.federation_optin = true;
        s.profile_visible = true;
        s.messaging_enabled = true;
        s.transactions_enabled = true;
        s
    }

    /// Two tenants, federation fully on, an active level-`level` partnership,
    /// both users opted in to everything.
    fn world(level: u8) -> World {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let admin = UserId::new();
        let controls = SystemControls::initial(clock.now()).revised(admin, clock.now(), |c| {
            c.federation_enabled = true;
            c.whitelist_mode_enabled = false;
        });
        let config = Arc::new(InMemoryConfigStore::new(controls));
        let audit = Arc::new(InMemoryAuditLog::new());
        let prefs = Arc::new(InMemoryPreferenceStore::new());
        let registry = Arc::new(PartnershipRegistry::new(
            InMemoryPartnershipStore::new(),
            InMemoryEventBus::new(),
            config.clone(),
            audit.clone(),
            clock.clone(),
            Duration::minutes(1),
        ));

        let a = Actor::new(TenantId::new(), UserId::new());
        let b = Actor::new(TenantId::new(), UserId::new());
        for tenant in [a.tenant_id, b.tenant_id] {
            config.set_tenant_flag(tenant, TenantFlag::Federation, true).unwrap();
            for f in FederationFeature::ALL {
                config.set_tenant_flag(tenant, TenantFlag::Feature(f), true).unwrap();
            }
        }
        let p = registry
            .request(a, b.tenant_id, FederationLevel::new(level).unwrap(), None)
            .unwrap();
        registry.approve(p.id_typed(), b, None).unwrap();
        prefs.upsert(opted_in(a.user_id, a.tenant_id)).unwrap();
        prefs.upsert(opted_in(b.user_id, b.tenant_id)).unwrap();

        let gateway = PermissionGateway::new(
            config.clone(),
            registry.clone(),
            prefs.clone(),
            audit.clone(),
            clock,
        );
        World {
            gateway,
            config,
            registry,
            prefs,
            audit,
            a,
            b,
        }
    }

    fn denied_at(decision: &Decision) -> DenialLayer {
        decision.verdict().map(|v| v.denied_at_layer).unwrap()
    }

    #[test]
    fn fully_configured_pair_is_allowed_and_audited_at_info() {
        let w = world(4);
        let d = w
            .gateway
            .can_send_message(w.a.user_id, w.a.tenant_id, w.b.user_id, w.b.tenant_id)
            .unwrap();
        assert!(d.is_allowed());
        assert_eq!(d.audit, AuditStatus::Recorded);

        let entries = w
            .audit
            .query(&AuditFilter {
                category: Some(AuditCategory::Access),
                ..AuditFilter::default()
            })
            .unwrap();
        assert_eq!(entries.len(), 1);
        let latest = &entries[0];
        assert_eq!(latest.action_type, "federation.check.send_message");
        assert_eq!(latest.level, AuditLevel::Info);
        assert_eq!(latest.data["verdict"]["allowed"], json!(true));
    }

    #[test]
    fn lockdown_denies_every_operation_at_system_layer() {
        let w = world(4);
        let current = w.config.controls().unwrap();
        let locked = current.with_lockdown("incident", UserId::new(), Utc::now()).unwrap();
        w.config.replace_controls(current.version, locked).unwrap();

        let (a, b) = (w.a, w.b);
        let decisions = [
            w.gateway.can_view_profile(a.user_id, a.tenant_id, b.user_id, b.tenant_id),
            w.gateway.can_send_message(a.user_id, a.tenant_id, b.user_id, b.tenant_id),
            w.gateway.can_perform_transaction(a.user_id, a.tenant_id, b.user_id, b.tenant_id, 1.0),
            w.gateway.can_view_listings(a.user_id, a.tenant_id, Uuid::now_v7(), b.user_id, b.tenant_id),
            w.gateway.can_view_events(a.user_id, a.tenant_id, Uuid::now_v7(), b.tenant_id),
            w.gateway.can_join_group(a.user_id, a.tenant_id, Uuid::now_v7(), b.tenant_id),
        ];
        for d in decisions {
            let d = d.unwrap();
            assert!(!d.is_allowed());
            assert_eq!(denied_at(&d), DenialLayer::System);
        }

        let critical = w
            .audit
            .query(&AuditFilter {
                min_level: Some(AuditLevel::Critical),
                ..AuditFilter::default()
            })
            .unwrap();
        assert_eq!(critical.len(), 6);
    }

    #[test]
    fn lockdown_outranks_malformed_requests() {
        let w = world(4);
        let current = w.config.controls().unwrap();
        let locked = current.with_lockdown("incident", UserId::new(), Utc::now()).unwrap();
        w.config.replace_controls(current.version, locked).unwrap();

        let (a, b) = (w.a, w.b);
        let decisions = [
            w.gateway.can_perform_transaction(a.user_id, a.tenant_id, b.user_id, b.tenant_id, 500.0),
            w.gateway.can_perform_transaction(a.user_id, a.tenant_id, b.user_id, b.tenant_id, 100.004),
            w.gateway.can_view_events(a.user_id, a.tenant_id, Uuid::now_v7(), a.tenant_id),
        ];
        for d in decisions {
            let d = d.unwrap();
            assert!(!d.is_invalid());
            assert_eq!(denied_at(&d), DenialLayer::System);
            assert!(d.verdict().unwrap().reason.starts_with("emergency lockdown"));
        }

        let critical = w
            .audit
            .query(&AuditFilter {
                min_level: Some(AuditLevel::Critical),
                ..AuditFilter::default()
            })
            .unwrap();
        assert_eq!(critical.len(), 3);
        assert!(critical.iter().any(|e| e.data["input"]["amount_hours"] == json!(500.0)));
    }

    #[test]
    fn level_two_partnership_denies_transactions_at_partnership_layer() {
        let w = world(2);
        let d = w
            .gateway
            .can_perform_transaction(w.a.user_id, w.a.tenant_id, w.b.user_id, w.b.tenant_id, 2.0)
            .unwrap();
        assert_eq!(denied_at(&d), DenialLayer::Partnership);

        let d = w
            .gateway
            .can_view_events(w.a.user_id, w.a.tenant_id, Uuid::now_v7(), w.b.tenant_id)
            .unwrap();
        assert!(d.is_allowed());
    }

    #[test]
    fn missing_partnership_denies_messaging_at_partnership_layer() {
        let w = world(4);
        let stranger = Actor::new(TenantId::new(), UserId::new());
        w.config.set_tenant_flag(stranger.tenant_id, TenantFlag::Federation, true).unwrap();
        w.config
            .set_tenant_flag(stranger.tenant_id, TenantFlag::Feature(FederationFeature::Messaging), true)
            .unwrap();

        let d = w
            .gateway
            .can_send_message(w.a.user_id, w.a.tenant_id, stranger.user_id, stranger.tenant_id)
            .unwrap();
        assert_eq!(denied_at(&d), DenialLayer::Partnership);
        assert_eq!(d.verdict().unwrap().reason, "no partnership between these tenants");
    }

    #[test]
    fn whitelist_mode_requires_both_tenants() {
        let w = world(4);
        let current = w.config.controls().unwrap();
        let next = current.revised(UserId::new(), Utc::now(), |c| c.whitelist_mode_enabled = true);
        w.config.replace_controls(current.version, next).unwrap();
        w.config
            .add_to_whitelist(WhitelistEntry {
                tenant_id: w.a.tenant_id,
                approved_by: UserId::new(),
                approved_at: Utc::now(),
                notes: None,
            })
            .unwrap();

        let d = w
            .gateway
            .can_view_profile(w.a.user_id, w.a.tenant_id, w.b.user_id, w.b.tenant_id)
            .unwrap();
        assert_eq!(denied_at(&d), DenialLayer::Tenant);
    }

    #[test]
    fn target_tenant_feature_flag_is_checked() {
        let w = world(4);
        w.config
            .set_tenant_flag(w.b.tenant_id, TenantFlag::Feature(FederationFeature::Profiles), false)
            .unwrap();

        let d = w
            .gateway
            .can_view_profile(w.a.user_id, w.a.tenant_id, w.b.user_id, w.b.tenant_id)
            .unwrap();
        assert_eq!(denied_at(&d), DenialLayer::Tenant);
        assert!(d.verdict().unwrap().reason.starts_with("target"));
    }

    #[test]
    fn user_layer_consults_target_for_messages_and_actor_for_events() {
        let w = world(4);
        let mut b = opted_in(w.b.user_id, w.b.tenant_id);
        b.messaging_enabled = false;
        w.prefs.upsert(b).unwrap();

        let d = w
            .gateway
            .can_send_message(w.a.user_id, w.a.tenant_id, w.b.user_id, w.b.tenant_id)
            .unwrap();
        assert_eq!(denied_at(&d), DenialLayer::User);

        w.prefs
            .upsert(UserFederationSettings::opted_out(w.a.user_id, w.a.tenant_id, Utc::now()))
            .unwrap();
        let d = w
            .gateway
            .can_join_group(w.a.user_id, w.a.tenant_id, Uuid::now_v7(), w.b.tenant_id)
            .unwrap();
        assert_eq!(denied_at(&d), DenialLayer::User);
    }

    #[test]
    fn suspended_partnership_denies() {
        let w = world(4);
        let p = w.registry.find_between(w.a.tenant_id, w.b.tenant_id).unwrap().unwrap();
        w.registry.suspend(p.id_typed(), w.a, "review").unwrap();

        let d = w
            .gateway
            .can_view_profile(w.a.user_id, w.a.tenant_id, w.b.user_id, w.b.tenant_id)
            .unwrap();
        assert_eq!(denied_at(&d), DenialLayer::Partnership);
        assert_eq!(d.verdict().unwrap().reason, "partnership is suspended");
    }

    #[test]
    fn invalid_amounts_and_same_tenant_are_invalid_not_denied() {
        let w = world(4);
        for amount in [0.0, 0.004, 0.005, 100.004, 100.01, f64::NAN] {
            let d = w
                .gateway
                .can_perform_transaction(w.a.user_id, w.a.tenant_id, w.b.user_id, w.b.tenant_id, amount)
                .unwrap();
            assert!(d.is_invalid(), "amount {amount} should be invalid");
        }
        let d = w
            .gateway
            .can_perform_transaction(w.a.user_id, w.a.tenant_id, w.b.user_id, w.b.tenant_id, 100.0)
            .unwrap();
        assert!(d.is_allowed());

        let d = w
            .gateway
            .can_view_profile(w.a.user_id, w.a.tenant_id, UserId::new(), w.a.tenant_id)
            .unwrap();
        assert!(d.is_invalid());
    }

    #[test]
    fn audit_outage_degrades_but_keeps_the_decision() {
        let w = world(4);
        w.audit.set_unavailable(true);
        let d = w
            .gateway
            .can_view_profile(w.a.user_id, w.a.tenant_id, w.b.user_id, w.b.tenant_id)
            .unwrap();
        assert!(d.is_allowed());
        assert!(d.audit_degraded());
    }

    #[test]
    fn config_outage_is_an_error_not_a_denial() {
        let w = world(4);
        w.config.set_unavailable(true);
        let result = w
            .gateway
            .can_view_profile(w.a.user_id, w.a.tenant_id, w.b.user_id, w.b.tenant_id);
        assert!(matches!(result, Err(crate::error::FederationError::Store(_))));
    }
}
