//! Tenant isolation interceptor.
//!
//! Every read, update and delete against a tenant-scoped entity gets a
//! `tenant_id = <caller tenant>` condition appended, and every create gets
//! the caller's tenant stamped onto the rows, unless the caller is a
//! superuser or the operation explicitly bypasses isolation. The bypass is
//! an explicit per-operation value in [`OpContext`], never ambient state,
//! so it is visible at each call site.
//!
//! The hooks never fail: an operation carrying no identity (system and
//! background jobs) passes through unfiltered. Jobs that require isolation
//! run under an explicit tenant identity instead.

use std::marker::PhantomData;

use saaskit_auth::Identity;
use saaskit_core::TenantId;

use crate::store::{Assign, Condition, EntityStore, FilterSet, StoreError};

/// Column carrying the tenant identifier on scoped tables.
pub const TENANT_COLUMN: &str = "tenant_id";

/// Whether the interceptor runs for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Isolation {
    #[default]
    Enforce,
    /// Skip tenant filtering/stamping for this one operation. Needed e.g.
    /// when provisioning a new tenant's first admin from another tenant.
    Bypass,
}

/// Per-operation context threaded through every storage call.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    pub identity: Option<Identity>,
    pub isolation: Isolation,
}

impl OpContext {
    /// Context for a request handled on behalf of `identity`.
    pub fn for_identity(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            isolation: Isolation::Enforce,
        }
    }

    /// Context with no identity attached; the hooks skip silently.
    pub fn system() -> Self {
        Self::default()
    }

    pub fn bypassing(mut self) -> Self {
        self.isolation = Isolation::Bypass;
        self
    }

    /// The identity to isolate by, if isolation applies to this operation.
    fn enforced(&self) -> Option<&Identity> {
        if self.isolation == Isolation::Bypass {
            return None;
        }
        self.identity.as_ref().filter(|id| !id.is_super)
    }
}

/// Capability implemented by every tenant-scoped entity.
///
/// This is a typed replacement for looking a tenant column up by name at
/// runtime: entities without the capability never reach the interceptor.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
    fn assign_tenant(&mut self, tenant: TenantId);
}

/// Read/update/delete hook: append the tenant-equality condition.
pub fn apply_tenant_scope(filter: &mut FilterSet, cx: &OpContext) {
    if let Some(identity) = cx.enforced() {
        filter.push(Condition::eq(TENANT_COLUMN, identity.tenant_id));
    }
}

/// Create hook: stamp the caller's tenant onto every row of the batch.
///
/// Overwrites any tenant already present on incoming rows; a caller that
/// really means to write another tenant's rows must pass
/// [`Isolation::Bypass`].
pub fn stamp_tenant_on_create<E: TenantScoped>(rows: &mut [E], cx: &OpContext) {
    if let Some(identity) = cx.enforced() {
        for row in rows.iter_mut() {
            row.assign_tenant(identity.tenant_id);
        }
    }
}

/// An [`EntityStore`] with the isolation hooks registered in front of all
/// four operations. CRUD handlers go through this wrapper; the raw store
/// stays reachable only for entities that are not tenant-scoped.
#[derive(Debug)]
pub struct ScopedStore<E, S> {
    inner: S,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S> ScopedStore<E, S>
where
    E: TenantScoped + Send + 'static,
    S: EntityStore<E>,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            _entity: PhantomData,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub async fn find(&self, mut filter: FilterSet, cx: &OpContext) -> Result<Vec<E>, StoreError> {
        apply_tenant_scope(&mut filter, cx);
        self.inner.find(&filter).await
    }

    pub async fn insert(&self, mut rows: Vec<E>, cx: &OpContext) -> Result<usize, StoreError> {
        stamp_tenant_on_create(&mut rows, cx);
        self.inner.insert(rows).await
    }

    pub async fn update(
        &self,
        mut filter: FilterSet,
        set: &[Assign],
        cx: &OpContext,
    ) -> Result<u64, StoreError> {
        apply_tenant_scope(&mut filter, cx);
        self.inner.update(&filter, set).await
    }

    pub async fn delete(&self, mut filter: FilterSet, cx: &OpContext) -> Result<u64, StoreError> {
        apply_tenant_scope(&mut filter, cx);
        self.inner.delete(&filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saaskit_core::UserId;
    use uuid::Uuid;

    fn tenant(n: u128) -> TenantId {
        TenantId::from_uuid(Uuid::from_u128(n))
    }

    fn member_of(n: u128) -> Identity {
        Identity::new(UserId::new(), tenant(n))
    }

    fn tenant_condition(n: u128) -> Condition {
        Condition::eq(TENANT_COLUMN, tenant(n))
    }

    #[test]
    fn filter_gains_tenant_condition_for_members() {
        let cx = OpContext::for_identity(member_of(5));
        let mut filter = FilterSet::new();
        apply_tenant_scope(&mut filter, &cx);
        assert!(filter.has_condition(&tenant_condition(5)));
    }

    #[test]
    fn superuser_filter_is_untouched() {
        let cx = OpContext::for_identity(Identity::superuser(UserId::new(), tenant(5)));
        let mut filter = FilterSet::new();
        apply_tenant_scope(&mut filter, &cx);
        assert!(filter.conditions().is_empty());
    }

    #[test]
    fn bypass_filter_is_untouched() {
        let cx = OpContext::for_identity(member_of(5)).bypassing();
        let mut filter = FilterSet::new();
        apply_tenant_scope(&mut filter, &cx);
        assert!(filter.conditions().is_empty());
    }

    #[test]
    fn missing_identity_is_a_silent_no_op() {
        let cx = OpContext::system();
        let mut filter = FilterSet::new();
        apply_tenant_scope(&mut filter, &cx);
        assert!(filter.conditions().is_empty());
    }

    struct Doc {
        tenant_id: TenantId,
    }

    impl TenantScoped for Doc {
        fn tenant_id(&self) -> TenantId {
            self.tenant_id
        }

        fn assign_tenant(&mut self, tenant: TenantId) {
            self.tenant_id = tenant;
        }
    }

    #[test]
    fn create_overwrites_tenant_on_every_batch_element() {
        let cx = OpContext::for_identity(member_of(5));
        let mut rows = vec![
            Doc {
                tenant_id: tenant(9),
            },
            Doc {
                tenant_id: TenantId::nil(),
            },
        ];
        stamp_tenant_on_create(&mut rows, &cx);
        assert!(rows.iter().all(|d| d.tenant_id() == tenant(5)));
    }

    #[test]
    fn create_leaves_rows_alone_for_superusers_and_bypass() {
        let mut rows = vec![Doc {
            tenant_id: tenant(9),
        }];

        let cx = OpContext::for_identity(Identity::superuser(UserId::new(), tenant(5)));
        stamp_tenant_on_create(&mut rows, &cx);
        assert_eq!(rows[0].tenant_id(), tenant(9));

        let cx = OpContext::for_identity(member_of(5)).bypassing();
        stamp_tenant_on_create(&mut rows, &cx);
        assert_eq!(rows[0].tenant_id(), tenant(9));
    }
}
