//! Trust scores for users, computed from statistics supplied by collaborators.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use hourbridge_core::UserId;
use hourbridge_federation::{TrustInputs, TrustScore, calculate_trust_score};

use crate::error::StoreError;

/// Review and transaction statistics for a user.
pub trait TrustStatsSource: Send + Sync {
    fn stats_for(&self, user: UserId) -> Result<Option<TrustInputs>, StoreError>;
}

impl<S> TrustStatsSource for Arc<S>
where
    S: TrustStatsSource + ?Sized,
{
    fn stats_for(&self, user: UserId) -> Result<Option<TrustInputs>, StoreError> {
        (**self).stats_for(user)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTrustStats {
    rows: RwLock<HashMap<UserId, TrustInputs>>,
}

impl InMemoryTrustStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user: UserId, inputs: TrustInputs) -> Result<(), StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::poisoned("trust stats"))?;
        rows.insert(user, inputs);
        Ok(())
    }
}

impl TrustStatsSource for InMemoryTrustStats {
    fn stats_for(&self, user: UserId) -> Result<Option<TrustInputs>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::poisoned("trust stats"))?;
        Ok(rows.get(&user).copied())
    }
}

#[derive(Debug)]
pub struct TrustScoreCalculator<S> {
    source: S,
}

impl<S> TrustScoreCalculator<S>
where
    S: TrustStatsSource,
{
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn calculate(&self, inputs: &TrustInputs) -> TrustScore {
        calculate_trust_score(inputs)
    }

    /// A user without statistics scores as a newcomer.
    pub fn score_for_user(&self, user: UserId) -> Result<TrustScore, StoreError> {
        let inputs = self.source.stats_for(user)?.unwrap_or_default();
        let score = calculate_trust_score(&inputs);
        debug!(user_id = %user, score = score.score, level = ?score.level, "trust score computed");
        Ok(score)
    }
}
