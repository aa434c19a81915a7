//! Role/permission administration.
//!
//! Writes to roles, permissions or role assignments can change the
//! effective permissions of any number of users, and the cache does not
//! track which users a role reaches. So every mutation here ends with a
//! bulk invalidation of the permission-cache prefix, mirroring the
//! after-write hook the storage layer registers on the role and permission
//! tables.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use saaskit_auth::PermissionNode;
use saaskit_cache::Cache;
use saaskit_core::{PermissionId, RoleId, UserId};

use crate::perms::{PermissionError, PermissionStore, invalidate_all, invalidate_user};
use crate::store::StoreError;

/// Mutation surface of the RBAC storage collaborator.
#[async_trait]
pub trait RbacWrite: Send + Sync {
    /// Insert or replace one permission row (flat; `children` ignored).
    async fn upsert_permission(&self, node: PermissionNode) -> Result<(), StoreError>;

    /// Remove one permission row.
    async fn remove_permission(&self, id: PermissionId) -> Result<(), StoreError>;

    /// Replace the permission set granted by a role.
    async fn set_role_permissions(
        &self,
        role: RoleId,
        permissions: Vec<PermissionId>,
    ) -> Result<(), StoreError>;

    /// Replace the roles assigned to a user.
    async fn set_user_roles(&self, user: UserId, roles: Vec<RoleId>) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> RbacWrite for std::sync::Arc<S>
where
    S: RbacWrite + ?Sized,
{
    async fn upsert_permission(&self, node: PermissionNode) -> Result<(), StoreError> {
        (**self).upsert_permission(node).await
    }

    async fn remove_permission(&self, id: PermissionId) -> Result<(), StoreError> {
        (**self).remove_permission(id).await
    }

    async fn set_role_permissions(
        &self,
        role: RoleId,
        permissions: Vec<PermissionId>,
    ) -> Result<(), StoreError> {
        (**self).set_role_permissions(role, permissions).await
    }

    async fn set_user_roles(&self, user: UserId, roles: Vec<RoleId>) -> Result<(), StoreError> {
        (**self).set_user_roles(user, roles).await
    }
}

/// In-memory RBAC tables for tests and dev.
///
/// Keeps the flat permission rows plus the role-permission and user-role
/// join tables; the reads implement [`PermissionStore`] the way the SQL
/// backend would (ordered by `sort`, distinct union across roles).
#[derive(Debug, Default)]
pub struct InMemoryRbacStore {
    permissions: RwLock<Vec<PermissionNode>>,
    role_permissions: RwLock<HashMap<RoleId, Vec<PermissionId>>>,
    user_roles: RwLock<HashMap<UserId, Vec<RoleId>>>,
}

impl InMemoryRbacStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Backend("rbac lock poisoned".into())
}

fn by_sort(rows: &mut [PermissionNode]) {
    rows.sort_by_key(|n| n.sort);
}

#[async_trait]
impl PermissionStore for InMemoryRbacStore {
    async fn load_all(&self) -> Result<Vec<PermissionNode>, StoreError> {
        let rows = self.permissions.read().map_err(poisoned)?;
        let mut out = rows.clone();
        by_sort(&mut out);
        Ok(out)
    }

    async fn roles_of(&self, user_id: UserId) -> Result<Vec<RoleId>, StoreError> {
        let assignments = self.user_roles.read().map_err(poisoned)?;
        Ok(assignments.get(&user_id).cloned().unwrap_or_default())
    }

    async fn load_for_roles(&self, roles: &[RoleId]) -> Result<Vec<PermissionNode>, StoreError> {
        let granted: std::collections::HashSet<PermissionId> = {
            let role_permissions = self.role_permissions.read().map_err(poisoned)?;
            roles
                .iter()
                .flat_map(|r| role_permissions.get(r).cloned().unwrap_or_default())
                .collect()
        };

        let rows = self.permissions.read().map_err(poisoned)?;
        let mut out: Vec<PermissionNode> = rows
            .iter()
            .filter(|n| granted.contains(&n.id))
            .cloned()
            .collect();
        by_sort(&mut out);
        Ok(out)
    }
}

#[async_trait]
impl RbacWrite for InMemoryRbacStore {
    async fn upsert_permission(&self, mut node: PermissionNode) -> Result<(), StoreError> {
        node.children.clear();
        let mut rows = self.permissions.write().map_err(poisoned)?;
        match rows.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => *existing = node,
            None => rows.push(node),
        }
        Ok(())
    }

    async fn remove_permission(&self, id: PermissionId) -> Result<(), StoreError> {
        let mut rows = self.permissions.write().map_err(poisoned)?;
        rows.retain(|n| n.id != id);
        Ok(())
    }

    async fn set_role_permissions(
        &self,
        role: RoleId,
        permissions: Vec<PermissionId>,
    ) -> Result<(), StoreError> {
        let mut role_permissions = self.role_permissions.write().map_err(poisoned)?;
        role_permissions.insert(role, permissions);
        Ok(())
    }

    async fn set_user_roles(&self, user: UserId, roles: Vec<RoleId>) -> Result<(), StoreError> {
        let mut user_roles = self.user_roles.write().map_err(poisoned)?;
        user_roles.insert(user, roles);
        Ok(())
    }
}

/// Admin writes with cache coherence.
pub struct RbacService<S, C> {
    store: S,
    cache: C,
}

impl<S, C> RbacService<S, C>
where
    S: RbacWrite,
    C: Cache,
{
    pub fn new(store: S, cache: C) -> Self {
        Self { store, cache }
    }

    pub async fn save_permission(&self, node: PermissionNode) -> Result<(), PermissionError> {
        self.store.upsert_permission(node).await?;
        invalidate_all(&self.cache).await?;
        Ok(())
    }

    pub async fn delete_permission(&self, id: PermissionId) -> Result<(), PermissionError> {
        self.store.remove_permission(id).await?;
        invalidate_all(&self.cache).await?;
        Ok(())
    }

    pub async fn grant_role(
        &self,
        role: RoleId,
        permissions: Vec<PermissionId>,
    ) -> Result<(), PermissionError> {
        self.store.set_role_permissions(role, permissions).await?;
        invalidate_all(&self.cache).await?;
        Ok(())
    }

    pub async fn assign_roles(
        &self,
        user: UserId,
        roles: Vec<RoleId>,
    ) -> Result<(), PermissionError> {
        self.store.set_user_roles(user, roles).await?;
        invalidate_all(&self.cache).await?;
        Ok(())
    }

    /// Logout drops that one user's cached tree only.
    pub async fn logout(&self, user: UserId) -> Result<(), PermissionError> {
        invalidate_user(&self.cache, user).await?;
        Ok(())
    }
}
