// ============================================================================
// Entity Contracts
// ============================================================================
//
// Capability traits an entity type may implement. Each capability is an
// independent data contract; an entity may satisfy any combination. The
// lifecycle engine and the implicit query filters are driven entirely by
// which capabilities a type declares at registration time.

pub mod macros;
pub mod registry;

use std::fmt::Debug;
use std::hash::Hash;

use chrono::{DateTime, Utc};

pub use registry::{Capabilities, EntityRegistry, EntityRegistryBuilder, FilterContext};

/// Base contract for anything persisted through a session.
///
/// Entities are plain owned values; staging an entity hands a copy to the
/// session, and reads return fresh copies. There is no common base struct:
/// a type opts into behavior by implementing capability traits on top of
/// this one.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Primary key type used for point lookups and removals.
    type Key: Eq + Hash + Clone + Debug + Send + Sync + 'static;

    /// Returns the entity's primary key.
    fn key(&self) -> Self::Key;

    /// Stable logical name, used in diagnostics and error messages.
    fn entity_name() -> &'static str;
}

/// Creation/update audit timestamps.
///
/// `created_at` is set exactly once, when the entity is first persisted.
/// `updated_at` is set on every subsequent persisted mutation.
pub trait Timestamped {
    fn created_at(&self) -> DateTime<Utc>;
    fn set_created_at(&mut self, at: DateTime<Utc>);
    fn updated_at(&self) -> Option<DateTime<Utc>>;
    fn set_updated_at(&mut self, at: Option<DateTime<Utc>>);
}

/// Multi-tenant scoping. The tenant id is stamped at first persistence and
/// every query against the type is implicitly restricted to the active
/// tenant.
pub trait TenantScoped {
    fn tenant_id(&self) -> &str;
    fn set_tenant_id(&mut self, tenant: String);
}

/// Logical deletion. Removing a soft-deletable entity through a repository
/// marks it deleted in place instead of removing the row; filtered reads
/// then skip it.
///
/// Invariant while soft delete is enabled: `is_deleted() == true` exactly
/// when `deleted_at()` is `Some`.
pub trait SoftDeletable {
    fn is_deleted(&self) -> bool;
    fn set_is_deleted(&mut self, deleted: bool);
    fn deleted_at(&self) -> Option<DateTime<Utc>>;
    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>);
}

/// Correlation tagging for tracing related writes across services. Stamped
/// on creation and on every mutation with the active correlation id.
pub trait Correlated {
    fn correlation_id(&self) -> &str;
    fn set_correlation_id(&mut self, id: String);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[derive(Clone, Default)]
    struct Invoice {
        id: u64,
        tenant_id: String,
        correlation_id: String,
        created_at: DateTime<Utc>,
        updated_at: Option<DateTime<Utc>>,
        is_deleted: bool,
        deleted_at: Option<DateTime<Utc>>,
    }

    impl Entity for Invoice {
        type Key = u64;

        fn key(&self) -> u64 {
            self.id
        }

        fn entity_name() -> &'static str {
            "Invoice"
        }
    }

    crate::impl_timestamped!(Invoice);
    crate::impl_tenant_scoped!(Invoice);
    crate::impl_soft_deletable!(Invoice);
    crate::impl_correlated!(Invoice);

    #[test]
    fn test_macro_generated_impls_delegate_to_fields() {
        let mut invoice = Invoice::default();
        let now = Utc::now();

        invoice.set_created_at(now);
        invoice.set_updated_at(Some(now));
        invoice.set_tenant_id("Acme".into());
        invoice.set_correlation_id("corr-1".into());
        invoice.set_is_deleted(true);
        invoice.set_deleted_at(Some(now));

        assert_eq!(invoice.created_at(), now);
        assert_eq!(invoice.updated_at(), Some(now));
        assert_eq!(invoice.tenant_id(), "Acme");
        assert_eq!(invoice.correlation_id(), "corr-1");
        assert!(invoice.is_deleted());
        assert_eq!(invoice.deleted_at(), Some(now));
    }
}
