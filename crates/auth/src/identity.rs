//! Request-local identity.

use saaskit_core::{RoleId, TenantId, UserId};

/// The verified identity attached to an in-flight request.
///
/// Produced by the authentication collaborator after token verification and
/// trusted as-is by this core. The value is immutable and request-local, so
/// it can be read from any number of concurrent tasks without
/// synchronization. Role ids are advisory: the permission loader resolves
/// the authoritative role set from storage when it needs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub is_super: bool,
    pub roles: Vec<RoleId>,
}

impl Identity {
    pub fn new(user_id: UserId, tenant_id: TenantId) -> Self {
        Self {
            user_id,
            tenant_id,
            is_super: false,
            roles: Vec::new(),
        }
    }

    /// A superuser identity: exempt from tenant isolation and permission
    /// checks.
    pub fn superuser(user_id: UserId, tenant_id: TenantId) -> Self {
        Self {
            user_id,
            tenant_id,
            is_super: true,
            roles: Vec::new(),
        }
    }

    pub fn with_roles(mut self, roles: Vec<RoleId>) -> Self {
        self.roles = roles;
        self
    }
}
