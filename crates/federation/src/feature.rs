//! Federation features and the six-column permission set.
//!
//! Feature keys form a closed taxonomy. Free-form keys coming from storage or
//! admin tooling are parsed through `FromStr` and rejected when unknown.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use hourbridge_core::{DomainError, ValueObject};

use crate::level::FederationLevel;

/// A cross-tenant capability that can be switched on or off at every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FederationFeature {
    Profiles,
    Messaging,
    Transactions,
    Listings,
    Events,
    Groups,
}

impl FederationFeature {
    pub const ALL: [FederationFeature; 6] = [
        FederationFeature::Profiles,
        FederationFeature::Messaging,
        FederationFeature::Transactions,
        FederationFeature::Listings,
        FederationFeature::Events,
        FederationFeature::Groups,
    ];

    pub fn key(self) -> &'static str {
        match self {
            FederationFeature::Profiles => "profiles",
            FederationFeature::Messaging => "messaging",
            FederationFeature::Transactions => "transactions",
            FederationFeature::Listings => "listings",
            FederationFeature::Events => "events",
            FederationFeature::Groups => "groups",
        }
    }
}

impl core::fmt::Display for FederationFeature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for FederationFeature {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FederationFeature::ALL
            .into_iter()
            .find(|f| f.key() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown federation feature '{s}'")))
    }
}

/// Per-tenant switch.
///
/// `Federation` is the tenant's master switch; each feature has its own flag.
/// Both must be on for a tenant to take part in an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "flag", content = "feature")]
pub enum TenantFlag {
    Federation,
    Feature(FederationFeature),
}

impl TenantFlag {
    pub fn key(self) -> String {
        match self {
            TenantFlag::Federation => "federation".to_string(),
            TenantFlag::Feature(f) => format!("federation.{}", f.key()),
        }
    }
}

impl FromStr for TenantFlag {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "federation" {
            return Ok(TenantFlag::Federation);
        }
        match s.strip_prefix("federation.") {
            Some(feature) => Ok(TenantFlag::Feature(feature.parse()?)),
            None => Err(DomainError::validation(format!("unknown tenant flag '{s}'"))),
        }
    }
}

/// The six per-feature booleans carried by partnerships, counter-proposals
/// and the system kill switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FeaturePermissions {
    pub profiles: bool,
    pub messaging: bool,
    pub transactions: bool,
    pub listings: bool,
    pub events: bool,
    pub groups: bool,
}

impl ValueObject for FeaturePermissions {}

impl FeaturePermissions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            profiles: true,
            messaging: true,
            transactions: true,
            listings: true,
            events: true,
            groups: true,
        }
    }

    /// Default grant for a freshly approved partnership at `level`.
    pub fn for_level(level: FederationLevel) -> Self {
        let l = level.get();
        Self {
            profiles: true,
            messaging: l >= 2,
            transactions: l >= 3,
            listings: l >= 2,
            events: l >= 2,
            groups: l >= 4,
        }
    }

    pub fn allows(&self, feature: FederationFeature) -> bool {
        match feature {
            FederationFeature::Profiles => self.profiles,
            FederationFeature::Messaging => self.messaging,
            FederationFeature::Transactions => self.transactions,
            FederationFeature::Listings => self.listings,
            FederationFeature::Events => self.events,
            FederationFeature::Groups => self.groups,
        }
    }

    pub fn with(mut self, feature: FederationFeature, enabled: bool) -> Self {
        let slot = match feature {
            FederationFeature::Profiles => &mut self.profiles,
            FederationFeature::Messaging => &mut self.messaging,
            FederationFeature::Transactions => &mut self.transactions,
            FederationFeature::Listings => &mut self.listings,
            FederationFeature::Events => &mut self.events,
            FederationFeature::Groups => &mut self.groups,
        };
        *slot = enabled;
        self
    }

    pub fn granted(&self) -> Vec<FederationFeature> {
        FederationFeature::ALL
            .into_iter()
            .filter(|f| self.allows(*f))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn level(n: u8) -> FederationLevel {
        FederationLevel::new(n).unwrap()
    }

    #[test]
    fn level_two_defaults_match_matrix() {
        let p = FeaturePermissions::for_level(level(2));
        assert_eq!(
            p,
            FeaturePermissions {
                profiles: true,
                messaging: true,
                transactions: false,
                listings: true,
                events: true,
                groups: false,
            }
        );
    }

    #[test]
    fn level_one_grants_profiles_only() {
        assert_eq!(
            FeaturePermissions::for_level(level(1)).granted(),
            vec![FederationFeature::Profiles]
        );
    }

    #[test]
    fn level_four_grants_everything() {
        assert_eq!(FeaturePermissions::for_level(level(4)), FeaturePermissions::all());
    }

    #[test]
    fn unknown_feature_key_is_rejected() {
        let err = "wallets".parse::<FederationFeature>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("wallets")));
    }

    #[test]
    fn tenant_flag_keys_parse_back() {
        for flag in [TenantFlag::Federation, TenantFlag::Feature(FederationFeature::Groups)] {
            assert_eq!(flag.key().parse::<TenantFlag>().unwrap(), flag);
        }
        assert!("federation.wallets".parse::<TenantFlag>().is_err());
        assert!("messaging".parse::<TenantFlag>().is_err());
    }

    proptest! {
        /// Raising the level never revokes a default grant.
        #[test]
        fn defaults_are_monotonic_in_level(a in 1u8..=4, b in 1u8..=4) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let low = FeaturePermissions::for_level(level(lo));
            let high = FeaturePermissions::for_level(level(hi));
            for f in FederationFeature::ALL {
                prop_assert!(!low.allows(f) || high.allows(f));
            }
        }

        #[test]
        fn with_only_touches_one_column(idx in 0usize..6, enabled in any::<bool>()) {
            let feature = FederationFeature::ALL[idx];
            let p = FeaturePermissions::none().with(feature, enabled);
            for f in FederationFeature::ALL {
                let expected = f == feature && enabled;
                prop_assert_eq!(p.allows(f), expected);
            }
        }
    }
}
