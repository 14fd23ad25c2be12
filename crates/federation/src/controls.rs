//! System-wide federation controls.
//!
//! A `SystemControls` value is an immutable, versioned snapshot. Stores hand
//! out `Arc<SystemControls>` so a request sees one consistent record from its
//! first check to its last, and administrative updates produce a new snapshot
//! with the next version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hourbridge_core::{DomainError, DomainResult, UserId};

use crate::feature::{FeaturePermissions, FederationFeature};
use crate::level::FederationLevel;

/// Active emergency lockdown: forces every gateway check to deny.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyLockdown {
    pub reason: String,
    pub activated_at: DateTime<Utc>,
    pub activated_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemControls {
    pub version: u64,
    pub federation_enabled: bool,
    pub whitelist_mode_enabled: bool,
    pub max_federation_level: FederationLevel,
    /// System-level kill switch per feature.
    pub features: FeaturePermissions,
    pub lockdown: Option<EmergencyLockdown>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<UserId>,
}

impl SystemControls {
    /// Provisioning defaults: federation off, whitelist mode on, every
    /// feature switch on so enabling federation is a single toggle.
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            version: 1,
            federation_enabled: false,
            whitelist_mode_enabled: true,
            max_federation_level: FederationLevel::MAX,
            features: FeaturePermissions::all(),
            lockdown: None,
            updated_at: now,
            updated_by: None,
        }
    }

    pub fn is_locked_down(&self) -> bool {
        self.lockdown.is_some()
    }

    pub fn feature_enabled(&self, feature: FederationFeature) -> bool {
        self.features.allows(feature)
    }

    /// Produce the next snapshot with `edit` applied.
    pub fn revised(
        &self,
        actor: UserId,
        now: DateTime<Utc>,
        edit: impl FnOnce(&mut SystemControls),
    ) -> SystemControls {
        let mut next = self.clone();
        edit(&mut next);
        next.version = self.version + 1;
        next.updated_at = now;
        next.updated_by = Some(actor);
        next
    }

    pub fn with_lockdown(
        &self,
        reason: impl Into<String>,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<SystemControls> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(DomainError::validation("lockdown reason is required"));
        }
        if self.is_locked_down() {
            return Err(DomainError::conflict("emergency lockdown is already active"));
        }
        Ok(self.revised(actor, now, |c| {
            c.lockdown = Some(EmergencyLockdown {
                reason,
                activated_at: now,
                activated_by: actor,
            });
        }))
    }

    pub fn without_lockdown(&self, actor: UserId, now: DateTime<Utc>) -> DomainResult<SystemControls> {
        if !self.is_locked_down() {
            return Err(DomainError::conflict("emergency lockdown is not active"));
        }
        Ok(self.revised(actor, now, |c| c.lockdown = None))
    }
}
