use hourbridge_core::TenantId;

use crate::EventEnvelope;

/// Messages that belong to one or two tenants.
///
/// Notification consumers use this to route a partnership event to both
/// sides of the relationship and to ignore traffic for other tenants.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;

    fn counterpart_tenant_id(&self) -> Option<TenantId> {
        None
    }

    fn involves(&self, tenant_id: TenantId) -> bool {
        self.tenant_id() == tenant_id || self.counterpart_tenant_id() == Some(tenant_id)
    }
}

impl<E> TenantScoped for EventEnvelope<E> {
    fn tenant_id(&self) -> TenantId {
        EventEnvelope::tenant_id(self)
    }

    fn counterpart_tenant_id(&self) -> Option<TenantId> {
        EventEnvelope::counterpart_tenant_id(self)
    }
}
