//! Append-only audit log for federation decisions and administrative actions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use hourbridge_core::{TenantId, UserId};

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    Debug,
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    /// Gateway decisions.
    Access,
    Partnership,
    SystemControl,
    TenantSettings,
    UserSettings,
    Credential,
    Transaction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub action_type: String,
    pub category: AuditCategory,
    pub level: AuditLevel,
    pub source_tenant: Option<TenantId>,
    pub target_tenant: Option<TenantId>,
    pub actor: Option<UserId>,
    pub data: JsonValue,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action_type: impl Into<String>,
        category: AuditCategory,
        level: AuditLevel,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            action_type: action_type.into(),
            category,
            level,
            source_tenant: None,
            target_tenant: None,
            actor: None,
            data: JsonValue::Null,
            recorded_at,
        }
    }

    pub fn source(mut self, tenant: TenantId) -> Self {
        self.source_tenant = Some(tenant);
        self
    }

    pub fn target(mut self, tenant: TenantId) -> Self {
        self.target_tenant = Some(tenant);
        self
    }

    pub fn actor(mut self, user: UserId) -> Self {
        self.actor = Some(user);
        self
    }

    pub fn data(mut self, data: JsonValue) -> Self {
        self.data = data;
        self
    }

    pub fn involves(&self, tenant: TenantId) -> bool {
        self.source_tenant == Some(tenant) || self.target_tenant == Some(tenant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Recorded,
    /// The change or decision stands but its audit entry could not be written.
    Degraded,
}

impl AuditStatus {
    /// Degraded if either side is.
    pub fn and(self, other: AuditStatus) -> AuditStatus {
        if self == AuditStatus::Recorded { other } else { self }
    }
}

/// Result of a committed change together with whether its audit trail was
/// written. The change is durable either way; callers that must guarantee an
/// audit record check [`Committed::audit_degraded`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    pub value: T,
    pub audit: AuditStatus,
}

impl<T> Committed<T> {
    pub fn new(value: T, audit: AuditStatus) -> Self {
        Self { value, audit }
    }

    pub fn audit_degraded(&self) -> bool {
        self.audit == AuditStatus::Degraded
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Committed<U> {
        Committed {
            value: f(self.value),
            audit: self.audit,
        }
    }
}

impl<T> core::ops::Deref for Committed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    /// Matches either the source or the target tenant.
    pub tenant: Option<TenantId>,
    pub category: Option<AuditCategory>,
    /// At or above.
    pub min_level: Option<AuditLevel>,
    pub action_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    /// Exclusive.
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.tenant.is_none_or(|t| entry.involves(t))
            && self.category.is_none_or(|c| entry.category == c)
            && self.min_level.is_none_or(|l| entry.level >= l)
            && self
                .action_type
                .as_deref()
                .is_none_or(|a| entry.action_type == a)
            && self.from.is_none_or(|from| entry.recorded_at >= from)
            && self.to.is_none_or(|to| entry.recorded_at < to)
    }
}

pub trait AuditLog: Send + Sync {
    /// Append one entry. A failure is reported, never swallowed.
    fn record(&self, entry: AuditEntry) -> Result<(), StoreError>;

    /// Matching entries, newest first.
    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError>;

    /// Remove entries older than `retention_days` before `now`; returns the count.
    fn purge(&self, retention_days: u32, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

impl<S> AuditLog for Arc<S>
where
    S: AuditLog + ?Sized,
{
    fn record(&self, entry: AuditEntry) -> Result<(), StoreError> {
        (**self).record(entry)
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        (**self).query(filter)
    }

    fn purge(&self, retention_days: u32, now: DateTime<Utc>) -> Result<usize, StoreError> {
        (**self).purge(retention_days, now)
    }
}

/// In-memory audit log for tests/dev, with a switch to simulate an outage.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
    unavailable: AtomicBool,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("audit log offline".into()));
        }
        Ok(())
    }
}

impl AuditLog for InMemoryAuditLog {
    fn record(&self, entry: AuditEntry) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::poisoned("audit log"))?;
        entries.push(entry);
        Ok(())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, StoreError> {
        self.ensure_available()?;
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::poisoned("audit log"))?;

        let mut matched: Vec<AuditEntry> =
            entries.iter().filter(|e| filter.matches(e)).cloned().collect();
        // Newest first; ids are time-ordered so they break timestamp ties.
        matched.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    fn purge(&self, retention_days: u32, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.ensure_available()?;
        // A window reaching past the earliest representable instant keeps everything.
        let Some(cutoff) = Duration::try_days(i64::from(retention_days)).and_then(|d| now.checked_sub_signed(d))
        else {
            return Ok(0);
        };
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::poisoned("audit log"))?;
        let before = entries.len();
        entries.retain(|e| e.recorded_at >= cutoff);
        Ok(before - entries.len())
    }
}
