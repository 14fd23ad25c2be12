use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hourbridge_core::{DomainError, DomainResult, TenantId, UserId};

use crate::operation::UserFlag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceReach {
    #[default]
    LocalOnly,
    RemoteOk,
    TravelOk,
}

/// A member's cross-tenant preferences. Every visibility switch is off until
/// the member opts in and turns it on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFederationSettings {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub federation_optin: bool,
    pub profile_visible: bool,
    pub appear_in_search: bool,
    pub show_skills: bool,
    pub show_location: bool,
    pub messaging_enabled: bool,
    pub transactions_enabled: bool,
    pub service_reach: ServiceReach,
    pub travel_radius_km: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

impl UserFederationSettings {
    pub fn opted_out(user_id: UserId, tenant_id: TenantId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            tenant_id,
            federation_optin: false,
            profile_visible: false,
            appear_in_search: false,
            show_skills: false,
            show_location: false,
            messaging_enabled: false,
            transactions_enabled: false,
            service_reach: ServiceReach::LocalOnly,
            travel_radius_km: None,
            updated_at: now,
        }
    }

    /// `travel_radius_km` is required (and positive) iff reach is `travel_ok`.
    pub fn validate(&self) -> DomainResult<()> {
        match (self.service_reach, self.travel_radius_km) {
            (ServiceReach::TravelOk, Some(r)) if r > 0 => Ok(()),
            (ServiceReach::TravelOk, _) => Err(DomainError::validation(
                "travel_radius_km must be a positive number when service_reach is travel_ok",
            )),
            (_, Some(_)) => Err(DomainError::validation(
                "travel_radius_km is only allowed when service_reach is travel_ok",
            )),
            (_, None) => Ok(()),
        }
    }

    /// Opt-in plus the operation's own switch.
    pub fn allows(&self, flag: UserFlag) -> bool {
        if !self.federation_optin {
            return false;
        }
        match flag {
            UserFlag::ProfileVisible => self.profile_visible,
            UserFlag::MessagingEnabled => self.messaging_enabled,
            UserFlag::TransactionsEnabled => self.transactions_enabled,
            UserFlag::OptInOnly => true,
        }
    }
}
