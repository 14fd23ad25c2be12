//! Engine facade: wires stores, caches, the registry, the gateway and the
//! authentication boundary from one [`FederationConfig`], and exposes the
//! administrative operations that change federation state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, info, warn};

use hourbridge_auth::{
    AuthError, AuthenticatedCaller, AuthenticationResolver, InboundRequest, JwtCodec, PartnerCredential,
    SignedWebhook, TokenIssuer, TokenRequest, TokenResponse, WebhookSigner,
};
use hourbridge_core::{CredentialId, DomainError, ExpectedVersion, TenantId, UserId};
use hourbridge_events::{EventBus, EventEnvelope, InMemoryEventBus};
use hourbridge_federation::{
    FederationFeature, FederationLevel, PartnershipEvent, SystemControls, TenantFlag, UserFederationSettings,
};

use crate::audit::{AuditCategory, AuditEntry, AuditLevel, AuditLog, AuditStatus, Committed, InMemoryAuditLog};
use crate::clock::Clock;
use crate::config::FederationConfig;
use crate::config_store::{CachedConfigStore, ConfigStore, InMemoryConfigStore, WhitelistEntry};
use crate::credentials::{
    CredentialStore, InMemoryCredentialStore, IssuedCredential, NewCredential, issue_credential, revoke_credential,
};
use crate::directory;
use crate::error::FederationResult;
use crate::gateway::PermissionGateway;
use crate::preferences::{CachedPreferenceStore, InMemoryPreferenceStore, PreferenceStore};
use crate::registry::{InMemoryPartnershipStore, PartnershipRegistry, PartnershipStore};
use crate::transfer::{FederatedTransactionService, FederationRecordSink, WalletLedger};

pub type PartnershipEnvelope = EventEnvelope<PartnershipEvent>;

/// A stored controls revision and the state of its audit entry.
pub type ControlsChange = Committed<Arc<SystemControls>>;

/// Backing stores handed to the engine. Caches are layered on top.
pub struct EnginePorts<B> {
    pub config: Arc<dyn ConfigStore>,
    pub partnerships: Arc<dyn PartnershipStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub audit: Arc<dyn AuditLog>,
    pub bus: B,
    pub clock: Arc<dyn Clock>,
}

impl EnginePorts<Arc<InMemoryEventBus<PartnershipEnvelope>>> {
    /// Everything in memory, with federation provisioned but switched off.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            config: Arc::new(InMemoryConfigStore::new(SystemControls::initial(now))),
            partnerships: Arc::new(InMemoryPartnershipStore::new()),
            preferences: Arc::new(InMemoryPreferenceStore::new()),
            credentials: Arc::new(InMemoryCredentialStore::new()),
            audit: Arc::new(InMemoryAuditLog::new()),
            bus: Arc::new(InMemoryEventBus::new()),
            clock,
        }
    }
}

pub type Registry<B> = PartnershipRegistry<Arc<dyn PartnershipStore>, B>;

pub struct FederationEngine<B> {
    config: FederationConfig,
    clock: Arc<dyn Clock>,
    controls: Arc<dyn ConfigStore>,
    preferences: Arc<dyn PreferenceStore>,
    credentials: Arc<dyn CredentialStore>,
    audit: Arc<dyn AuditLog>,
    registry: Arc<Registry<B>>,
    gateway: Arc<PermissionGateway>,
    resolver: AuthenticationResolver<Arc<dyn CredentialStore>>,
    tokens: TokenIssuer<Arc<dyn CredentialStore>>,
}

impl<B> core::fmt::Debug for FederationEngine<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FederationEngine")
            .field("issuer", &self.config.jwt_issuer)
            .finish_non_exhaustive()
    }
}

impl<B> FederationEngine<B>
where
    B: EventBus<PartnershipEnvelope> + 'static,
{
    pub fn new(config: FederationConfig, ports: EnginePorts<B>) -> anyhow::Result<Self> {
        config.validate()?;
        let clock = ports.clock;

        let controls: Arc<dyn ConfigStore> = Arc::new(CachedConfigStore::new(
            ports.config,
            config.config_cache_ttl,
            clock.clone(),
        ));
        let preferences: Arc<dyn PreferenceStore> = Arc::new(CachedPreferenceStore::new(
            ports.preferences,
            config.partnership_cache_ttl,
            clock.clone(),
        ));
        let registry = Arc::new(PartnershipRegistry::new(
            ports.partnerships,
            ports.bus,
            controls.clone(),
            ports.audit.clone(),
            clock.clone(),
            config.partnership_cache_ttl,
        ));
        let gateway = Arc::new(PermissionGateway::new(
            controls.clone(),
            registry.clone(),
            preferences.clone(),
            ports.audit.clone(),
            clock.clone(),
        ));

        let jwt = JwtCodec::new(&config.jwt_settings());
        let resolver = AuthenticationResolver::new(ports.credentials.clone(), jwt.clone(), config.resolver_settings());
        let tokens = TokenIssuer::new(ports.credentials.clone(), jwt, config.token_ttl);

        info!(
            issuer = %config.jwt_issuer,
            hmac_skew_seconds = config.hmac_max_skew.num_seconds(),
            "federation engine initialized"
        );

        Ok(Self {
            config,
            clock,
            controls,
            preferences,
            credentials: ports.credentials,
            audit: ports.audit,
            registry,
            gateway,
            resolver,
            tokens,
        })
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    pub fn gateway(&self) -> &PermissionGateway {
        &self.gateway
    }

    pub fn registry(&self) -> &Registry<B> {
        &self.registry
    }

    pub fn audit_log(&self) -> &dyn AuditLog {
        self.audit.as_ref()
    }

    pub fn controls(&self) -> FederationResult<Arc<SystemControls>> {
        Ok(self.controls.controls()?)
    }

    /// Transfer service bound to this engine's gateway.
    pub fn transactions<L, R>(&self, ledger: L, records: R) -> FederatedTransactionService<L, R>
    where
        L: WalletLedger,
        R: FederationRecordSink,
    {
        FederatedTransactionService::new(
            self.gateway.clone(),
            ledger,
            records,
            self.audit.clone(),
            self.clock.clone(),
        )
    }

    // ── authentication ──────────────────────────────────────────────────────

    pub fn authenticate(&self, request: &InboundRequest) -> Result<AuthenticatedCaller, AuthError> {
        self.resolver.resolve(request, self.clock.now())
    }

    /// `POST /federation/oauth/token`.
    pub fn issue_token(&self, request: &TokenRequest) -> Result<TokenResponse, AuthError> {
        self.tokens.issue(request, self.clock.now())
    }

    /// Tenants whose data the caller may read.
    pub fn visible_tenants(&self, caller: &AuthenticatedCaller) -> FederationResult<Vec<TenantId>> {
        directory::visible_tenants(&caller.identity, self.registry.as_ref())
    }

    /// `POST /federation/webhooks/test`: a signed test payload for the
    /// credential's platform.
    pub fn webhook_test(&self, credential_id: CredentialId) -> FederationResult<SignedWebhook> {
        let credential = self.credential(credential_id)?;
        let (Some(platform_id), Some(secret)) = (credential.platform_id(), credential.signing_secret.as_deref())
        else {
            return Err(DomainError::validation("credential has no platform signing secret").into());
        };
        WebhookSigner::new(platform_id, secret)
            .test_delivery(self.clock.now())
            .map_err(|e| AuthError::Signing(e.to_string()).into())
    }

    // ── system controls ─────────────────────────────────────────────────────

    pub fn set_federation_enabled(&self, actor: UserId, enabled: bool) -> FederationResult<ControlsChange> {
        self.revise_controls(actor, "federation.system.set_enabled", AuditLevel::Info, json!({ "enabled": enabled }), |c| {
            Ok(c.revised(actor, self.clock.now(), |n| n.federation_enabled = enabled))
        })
    }

    pub fn set_whitelist_mode(&self, actor: UserId, enabled: bool) -> FederationResult<ControlsChange> {
        self.revise_controls(actor, "federation.system.set_whitelist_mode", AuditLevel::Info, json!({ "enabled": enabled }), |c| {
            Ok(c.revised(actor, self.clock.now(), |n| n.whitelist_mode_enabled = enabled))
        })
    }

    pub fn set_feature_enabled(
        &self,
        actor: UserId,
        feature: FederationFeature,
        enabled: bool,
    ) -> FederationResult<ControlsChange> {
        self.revise_controls(
            actor,
            "federation.system.set_feature",
            AuditLevel::Info,
            json!({ "feature": feature, "enabled": enabled }),
            |c| Ok(c.revised(actor, self.clock.now(), |n| n.features = n.features.with(feature, enabled))),
        )
    }

    pub fn set_max_level(&self, actor: UserId, level: FederationLevel) -> FederationResult<ControlsChange> {
        self.revise_controls(actor, "federation.system.set_max_level", AuditLevel::Info, json!({ "level": level }), |c| {
            Ok(c.revised(actor, self.clock.now(), |n| n.max_federation_level = level))
        })
    }

    pub fn activate_lockdown(&self, actor: UserId, reason: &str) -> FederationResult<ControlsChange> {
        let controls = self.revise_controls(
            actor,
            "federation.system.lockdown_activated",
            AuditLevel::Critical,
            json!({ "reason": reason }),
            |c| Ok(c.with_lockdown(reason, actor, self.clock.now())?),
        )?;
        error!(actor = %actor, reason = %reason, "emergency federation lockdown activated");
        Ok(controls)
    }

    pub fn lift_lockdown(&self, actor: UserId) -> FederationResult<ControlsChange> {
        let controls = self.revise_controls(
            actor,
            "federation.system.lockdown_lifted",
            AuditLevel::Warning,
            serde_json::Value::Null,
            |c| Ok(c.without_lockdown(actor, self.clock.now())?),
        )?;
        warn!(actor = %actor, "emergency federation lockdown lifted");
        Ok(controls)
    }

    fn revise_controls(
        &self,
        actor: UserId,
        action: &str,
        level: AuditLevel,
        data: serde_json::Value,
        edit: impl FnOnce(&SystemControls) -> FederationResult<SystemControls>,
    ) -> FederationResult<ControlsChange> {
        let current = self.controls.controls()?;
        let next = edit(&current)?;
        let stored = self.controls.replace_controls(current.version, next)?;
        let audit = self.audit_admin(
            AuditEntry::new(action, AuditCategory::SystemControl, level, self.clock.now())
                .actor(actor)
                .data(json!({ "input": data, "version": stored.version })),
        );
        Ok(Committed::new(stored, audit))
    }

    // ── tenant settings ─────────────────────────────────────────────────────

    pub fn set_tenant_flag(
        &self,
        actor: UserId,
        tenant: TenantId,
        flag: TenantFlag,
        enabled: bool,
    ) -> FederationResult<Committed<()>> {
        self.controls.set_tenant_flag(tenant, flag, enabled)?;
        let audit = self.audit_admin(
            AuditEntry::new("federation.tenant.set_flag", AuditCategory::TenantSettings, AuditLevel::Info, self.clock.now())
                .source(tenant)
                .actor(actor)
                .data(json!({ "flag": flag.key(), "enabled": enabled })),
        );
        Ok(Committed::new((), audit))
    }

    /// Master switch plus every feature flag. Degraded if any flag's audit
    /// entry was lost.
    pub fn enable_tenant(&self, actor: UserId, tenant: TenantId) -> FederationResult<Committed<()>> {
        let mut audit = self.set_tenant_flag(actor, tenant, TenantFlag::Federation, true)?.audit;
        for feature in FederationFeature::ALL {
            audit = audit.and(self.set_tenant_flag(actor, tenant, TenantFlag::Feature(feature), true)?.audit);
        }
        Ok(Committed::new((), audit))
    }

    pub fn whitelist_tenant(
        &self,
        actor: UserId,
        tenant: TenantId,
        notes: Option<String>,
    ) -> FederationResult<Committed<()>> {
        let now = self.clock.now();
        self.controls.add_to_whitelist(WhitelistEntry {
            tenant_id: tenant,
            approved_by: actor,
            approved_at: now,
            notes: notes.clone(),
        })?;
        let audit = self.audit_admin(
            AuditEntry::new("federation.tenant.whitelisted", AuditCategory::TenantSettings, AuditLevel::Info, now)
                .source(tenant)
                .actor(actor)
                .data(json!({ "notes": notes })),
        );
        Ok(Committed::new((), audit))
    }

    pub fn remove_from_whitelist(&self, actor: UserId, tenant: TenantId) -> FederationResult<Committed<bool>> {
        let removed = self.controls.remove_from_whitelist(tenant)?;
        if !removed {
            return Ok(Committed::new(false, AuditStatus::Recorded));
        }
        let audit = self.audit_admin(
            AuditEntry::new(
                "federation.tenant.unwhitelisted",
                AuditCategory::TenantSettings,
                AuditLevel::Warning,
                self.clock.now(),
            )
            .source(tenant)
            .actor(actor),
        );
        Ok(Committed::new(true, audit))
    }

    // ── user settings ───────────────────────────────────────────────────────

    pub fn user_settings(&self, user: UserId) -> FederationResult<Option<UserFederationSettings>> {
        Ok(self.preferences.get(user)?)
    }

    pub fn update_user_settings(&self, mut settings: UserFederationSettings) -> FederationResult<Committed<()>> {
        settings.validate()?;
        settings.updated_at = self.clock.now();
        let (user, tenant) = (settings.user_id, settings.tenant_id);
        let data = json!({ "settings": settings });
        self.preferences.upsert(settings)?;
        let audit = self.audit_admin(
            AuditEntry::new("federation.user.settings_updated", AuditCategory::UserSettings, AuditLevel::Info, self.clock.now())
                .source(tenant)
                .actor(user)
                .data(data),
        );
        Ok(Committed::new((), audit))
    }

    // ── credentials ─────────────────────────────────────────────────────────

    pub fn credential(&self, id: CredentialId) -> FederationResult<PartnerCredential> {
        self.credentials
            .get(id)
            .map_err(AuthError::from)?
            .ok_or_else(|| DomainError::not_found(format!("credential {id}")).into())
    }

    pub fn issue_credential(
        &self,
        actor: UserId,
        request: NewCredential,
    ) -> FederationResult<Committed<IssuedCredential>> {
        let issued = issue_credential(self.credentials.as_ref(), request, self.clock.now())?;
        let credential = &issued.credential;
        info!(credential_id = %credential.id, issuing_tenant = %credential.issuing_tenant, "partner credential issued");
        let audit = self.audit_admin(
            AuditEntry::new("federation.credential.issued", AuditCategory::Credential, AuditLevel::Info, credential.created_at)
                .source(credential.issuing_tenant)
                .actor(actor)
                .data(json!({
                    "credential_id": credential.id,
                    "owner": credential.owner,
                    "scopes": credential.scopes.to_strings(),
                    "expires_at": credential.expires_at,
                })),
        );
        Ok(Committed::new(issued, audit))
    }

    pub fn revoke_credential(
        &self,
        actor: UserId,
        id: CredentialId,
        expected: ExpectedVersion,
    ) -> FederationResult<Committed<PartnerCredential>> {
        let revoked = revoke_credential(self.credentials.as_ref(), id, expected, self.clock.now())?;
        error!(credential_id = %id, actor = %actor, "partner credential revoked");
        let audit = self.audit_admin(
            AuditEntry::new("federation.credential.revoked", AuditCategory::Credential, AuditLevel::Critical, self.clock.now())
                .source(revoked.issuing_tenant)
                .actor(actor)
                .data(json!({ "credential_id": id, "version": revoked.version })),
        );
        Ok(Committed::new(revoked, audit))
    }

    // ── retention ───────────────────────────────────────────────────────────

    pub fn purge_audit(&self, now: DateTime<Utc>) -> FederationResult<usize> {
        let removed = self.audit.purge(self.config.audit_retention_days, now)?;
        info!(removed, retention_days = self.config.audit_retention_days, "audit retention purge");
        Ok(removed)
    }

    /// Administrative writes have already committed; an audit failure is
    /// logged and reported back as [`AuditStatus::Degraded`].
    fn audit_admin(&self, entry: AuditEntry) -> AuditStatus {
        let action = entry.action_type.clone();
        match self.audit.record(entry) {
            Ok(()) => AuditStatus::Recorded,
            Err(err) => {
                warn!(action = %action, error = %err, "audit write failed after administrative change; reported as degraded");
                AuditStatus::Degraded
            }
        }
    }
}
