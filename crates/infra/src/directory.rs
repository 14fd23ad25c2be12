//! Which tenants an authenticated caller may read from.

use hourbridge_auth::{AuthError, AuthenticatedCaller, CallerIdentity, FederationRoute};
use hourbridge_core::TenantId;

use crate::error::FederationResult;
use crate::gateway::PartnershipLookup;

/// External partners see only the tenant that issued their credential;
/// internal tenants see every tenant they hold an active partnership with.
pub fn visible_tenants(
    caller: &CallerIdentity,
    partnerships: &dyn PartnershipLookup,
) -> FederationResult<Vec<TenantId>> {
    match caller {
        CallerIdentity::ExternalPartner { issuing_tenant, .. } => Ok(vec![*issuing_tenant]),
        CallerIdentity::InternalTenant { tenant_id } => partnerships.active_partners_of(*tenant_id),
    }
}

pub fn can_see_tenant(
    caller: &CallerIdentity,
    tenant: TenantId,
    partnerships: &dyn PartnershipLookup,
) -> FederationResult<bool> {
    Ok(visible_tenants(caller, partnerships)?.contains(&tenant))
}

/// Scope check for one conceptual route. Failures are opaque.
pub fn authorize_route(caller: &AuthenticatedCaller, route: FederationRoute) -> Result<(), AuthError> {
    caller.require_scope(route.required_scope())
}
