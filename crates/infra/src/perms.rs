//! Cached permission trees.
//!
//! Cache-aside over the pure tree builder: one entry per user under the
//! `auth:permissions:` prefix, 30-minute sliding TTL by default. Role and
//! permission writes invalidate the whole prefix (a single change can
//! affect any number of users); logout invalidates one user.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use saaskit_auth::{Identity, Method, PermissionNode, authorize, build_tree};
use saaskit_cache::{Cache, CacheError, get_or_load};
use saaskit_core::{RoleId, UserId};

use crate::store::StoreError;

/// Key prefix shared by every per-user permission entry.
pub const PERMISSION_CACHE_PREFIX: &str = "auth:permissions:";

fn cache_key(user_id: UserId) -> String {
    format!("{PERMISSION_CACHE_PREFIX}{user_id}")
}

/// Failure while producing a permission tree.
///
/// Callers treat any of these as an authorization failure (deny), never as
/// "no permissions configured".
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Storage collaborator behind the permission loader.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Every permission row, ordered by `sort` (superuser path).
    async fn load_all(&self) -> Result<Vec<PermissionNode>, StoreError>;

    /// Role ids assigned to a user. Empty for users with no roles.
    async fn roles_of(&self, user_id: UserId) -> Result<Vec<RoleId>, StoreError>;

    /// Distinct union of the roles' permissions, ordered by `sort`.
    async fn load_for_roles(&self, roles: &[RoleId]) -> Result<Vec<PermissionNode>, StoreError>;
}

#[async_trait]
impl<S> PermissionStore for std::sync::Arc<S>
where
    S: PermissionStore + ?Sized,
{
    async fn load_all(&self) -> Result<Vec<PermissionNode>, StoreError> {
        (**self).load_all().await
    }

    async fn roles_of(&self, user_id: UserId) -> Result<Vec<RoleId>, StoreError> {
        (**self).roles_of(user_id).await
    }

    async fn load_for_roles(&self, roles: &[RoleId]) -> Result<Vec<PermissionNode>, StoreError> {
        (**self).load_for_roles(roles).await
    }
}

/// Delete one user's cached tree (logout path).
pub async fn invalidate_user<C>(cache: &C, user_id: UserId) -> Result<(), CacheError>
where
    C: Cache + ?Sized,
{
    tracing::info!(user = %user_id, "invalidating cached permissions");
    cache.delete(&cache_key(user_id)).await
}

/// Delete every cached tree (role/permission mutation path).
pub async fn invalidate_all<C>(cache: &C) -> Result<u64, CacheError>
where
    C: Cache + ?Sized,
{
    let removed = cache.delete_prefix(PERMISSION_CACHE_PREFIX).await?;
    tracing::info!(removed, "invalidated all cached permissions");
    Ok(removed)
}

/// Permission trees with cache-aside loading.
///
/// Constructed once at startup and passed by handle to whatever composes
/// the request pipeline.
pub struct PermissionService<S, C> {
    store: S,
    cache: C,
    ttl: Duration,
}

impl<S, C> PermissionService<S, C>
where
    S: PermissionStore,
    C: Cache,
{
    pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

    pub fn new(store: S, cache: C) -> Self {
        Self::with_ttl(store, cache, Self::DEFAULT_TTL)
    }

    pub fn with_ttl(store: S, cache: C, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    /// The caller's permission forest, cached with sliding expiry.
    ///
    /// Errors propagate; the request handler denies on error (fail closed).
    pub async fn permission_tree(
        &self,
        identity: &Identity,
    ) -> Result<Vec<PermissionNode>, PermissionError> {
        let key = cache_key(identity.user_id);
        get_or_load(&self.cache, &key, self.ttl, || async {
            tracing::debug!(key = %key, "permission cache fill");
            self.load_forest(identity).await
        })
        .await
    }

    /// Build the forest straight from storage, no cache.
    pub async fn load_forest(
        &self,
        identity: &Identity,
    ) -> Result<Vec<PermissionNode>, PermissionError> {
        let flat = if identity.is_super {
            self.store.load_all().await?
        } else {
            let roles = self.store.roles_of(identity.user_id).await?;
            if roles.is_empty() {
                Vec::new()
            } else {
                self.store.load_for_roles(&roles).await?
            }
        };
        Ok(build_tree(flat))
    }

    /// Decide whether `method path` is allowed for the caller.
    ///
    /// Superusers are always allowed and never hit the matcher or the
    /// cache.
    pub async fn check(
        &self,
        identity: &Identity,
        method: Method,
        path: &str,
    ) -> Result<bool, PermissionError> {
        if identity.is_super {
            return Ok(true);
        }
        let forest = self.permission_tree(identity).await?;
        Ok(authorize(method, path, &forest))
    }

    pub async fn invalidate_user(&self, user_id: UserId) -> Result<(), PermissionError> {
        invalidate_user(&self.cache, user_id).await?;
        Ok(())
    }

    pub async fn invalidate_all(&self) -> Result<u64, PermissionError> {
        Ok(invalidate_all(&self.cache).await?)
    }
}
