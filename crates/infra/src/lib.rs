//! `saaskit-infra` — storage seam, tenant isolation and cached permissions.
//!
//! The storage collaborator is abstract here: [`store::EntityStore`] is a
//! generic filter/condition interface, and [`tenancy::ScopedStore`] is the
//! interceptor registered in front of it. [`perms::PermissionService`] wires
//! the pure tree builder and matcher from `saaskit-auth` to a permission
//! store and a `saaskit-cache` backend. Everything is constructed explicitly
//! at startup and passed by handle; there are no global accessors.

pub mod perms;
pub mod rbac;
pub mod store;
pub mod tenancy;


pub use perms::{PERMISSION_CACHE_PREFIX, PermissionError, PermissionService, PermissionStore};
pub use rbac::{InMemoryRbacStore, RbacService, RbacWrite};
pub use store::{Assign, Cmp, Condition, EntityStore, FilterSet, InMemoryStore, StoreError};
pub use tenancy::{
    Isolation, OpContext, ScopedStore, TENANT_COLUMN, TenantScoped, apply_tenant_scope,
    stamp_tenant_on_create,
};
