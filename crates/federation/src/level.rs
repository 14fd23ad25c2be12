use serde::{Deserialize, Serialize};

use hourbridge_core::{DomainError, DomainResult};

use crate::feature::FeaturePermissions;

/// Federation level 1..=4: an increasing default bundle of capabilities.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct FederationLevel(u8);

impl FederationLevel {
    pub const MIN: FederationLevel = FederationLevel(1);
    pub const MAX: FederationLevel = FederationLevel(4);

    pub fn new(level: u8) -> DomainResult<Self> {
        if (Self::MIN.0..=Self::MAX.0).contains(&level) {
            Ok(Self(level))
        } else {
            Err(DomainError::validation(format!(
                "federation level must be between 1 and 4 (got {level})"
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            1 => "discovery",
            2 => "social",
            3 => "economic",
            _ => "integrated",
        }
    }

    pub fn default_permissions(self) -> FeaturePermissions {
        FeaturePermissions::for_level(self)
    }

    /// Fails when `self` exceeds the system-wide ceiling.
    pub fn ensure_within(self, max: FederationLevel) -> DomainResult<()> {
        if self > max {
            return Err(DomainError::validation(format!(
                "federation level {} exceeds the system maximum of {}",
                self.0, max.0
            )));
        }
        Ok(())
    }
}

impl TryFrom<u8> for FederationLevel {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FederationLevel> for u8 {
    fn from(value: FederationLevel) -> Self {
        value.0
    }
}

impl core::fmt::Display for FederationLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}
