#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use hourbridge_core::{TenantId, UserId};
use hourbridge_events::InMemoryEventBus;
use hourbridge_federation::{Actor, FederationLevel, Partnership, SystemControls, UserFederationSettings};
use hourbridge_infra::{
    EnginePorts, FederationConfig, FederationEngine, InMemoryAuditLog, InMemoryConfigStore,
    InMemoryCredentialStore, InMemoryPartnershipStore, InMemoryPreferenceStore, ManualClock,
    PartnershipEnvelope,
};

pub type Bus = Arc<InMemoryEventBus<PartnershipEnvelope>>;
pub type Engine = FederationEngine<Bus>;

/// Engine plus handles on the in-memory backends it runs on.
pub struct Harness {
    pub engine: Engine,
    pub clock: Arc<ManualClock>,
    pub audit: Arc<InMemoryAuditLog>,
    pub bus: Bus,
    pub admin: UserId,
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
}

pub fn harness() -> Harness {
    hourbridge_observability::init_for_tests();

    let clock = Arc::new(ManualClock::new(start()));
    let audit = Arc::new(InMemoryAuditLog::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let ports = EnginePorts {
        config: Arc::new(InMemoryConfigStore::new(SystemControls::initial(start()))),
        partnerships: Arc::new(InMemoryPartnershipStore::new()),
        preferences: Arc::new(InMemoryPreferenceStore::new()),
        credentials: Arc::new(InMemoryCredentialStore::new()),
        audit: audit.clone(),
        bus: bus.clone(),
        clock: clock.clone(),
    };
    let engine = FederationEngine::new(FederationConfig::default(), ports).unwrap();
    let admin = UserId::new();
    engine.set_federation_enabled(admin, true).unwrap();
    engine.set_whitelist_mode(admin, false).unwrap();

    Harness {
        engine,
        clock,
        audit,
        bus,
        admin,
    }
}

impl Harness {
    /// A tenant with every federation flag on and one opted-in member.
    pub fn member(&self) -> Actor {
        let actor = Actor::new(TenantId::new(), UserId::new());
        self.engine.enable_tenant(self.admin, actor.tenant_id).unwrap();
        let mut settings = UserFederationSettings::opted_out(actor.user_id, actor.tenant_id, start());
        settings.federation_optin = true;
        settings.profile_visible = true;
        settings.messaging_enabled = true;
        settings.transactions_enabled = true;
        self.engine.update_user_settings(settings).unwrap();
        actor
    }

    pub fn partner(&self, a: Actor, b: Actor, level: u8) -> Partnership {
        let p = self
            .engine
            .registry()
            .request(a, b.tenant_id, FederationLevel::new(level).unwrap(), None)
            .unwrap();
        self.engine.registry().approve(p.id_typed(), b, None).unwrap().into_inner()
    }
}
