// ============================================================================
// Entity Registry & Filter Composer
// ============================================================================
//
// Every entity type persisted through a session is registered here exactly
// once, at model-build time, together with the capabilities it declares.
// Registration installs statically dispatched lifecycle hooks and composes
// the type's implicit query filter: one cached predicate per type, never
// rebuilt per query.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::core::{DbError, Result};
use crate::entity::{Correlated, Entity, SoftDeletable, TenantScoped, Timestamped};
use crate::session::lifecycle::{FilterFn, HookFn, TypeHandlers};
use crate::storage::memory::{Table, TableMap};

/// Ambient values the implicit filters are evaluated against.
#[derive(Debug, Clone, Default)]
pub struct FilterContext {
    /// The effective tenant for the reading repository. `None` degrades
    /// tenant-scoped types to "no rows match" rather than failing.
    pub tenant_id: Option<String>,
}

/// Declares which capabilities an entity type carries.
///
/// Each builder method is bounded on the corresponding capability trait, so
/// declaring a capability the type does not implement is a compile error:
///
/// ```ignore
/// let registry = EntityRegistry::builder()
///     .register(Capabilities::<Order>::new().timestamps().tenancy().soft_delete())
///     .build();
/// ```
pub struct Capabilities<E: Entity> {
    on_added: Vec<HookFn<E>>,
    on_modified: Vec<HookFn<E>>,
    on_soft_deleted: Vec<HookFn<E>>,
    filters: Vec<FilterFn<E>>,
    soft_deletable: bool,
}

impl<E: Entity> Default for Capabilities<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Capabilities<E> {
    /// No capabilities: the type is tracked and stored but receives no
    /// lifecycle stamps and no implicit filter.
    pub fn new() -> Self {
        Self {
            on_added: Vec::new(),
            on_modified: Vec::new(),
            on_soft_deleted: Vec::new(),
            filters: Vec::new(),
            soft_deletable: false,
        }
    }

    /// Creation/update timestamps: `created_at` on add, `updated_at` on
    /// every subsequent mutation.
    pub fn timestamps(mut self) -> Self
    where
        E: Timestamped,
    {
        self.on_added.push(Arc::new(|entity: &mut E, ctx| {
            entity.set_created_at(ctx.now);
            Ok(())
        }));
        self.on_modified.push(Arc::new(|entity: &mut E, ctx| {
            entity.set_updated_at(Some(ctx.now));
            Ok(())
        }));
        self
    }

    /// Tenant stamping on add plus an implicit `tenant_id == active tenant`
    /// filter on every read.
    pub fn tenancy(mut self) -> Self
    where
        E: TenantScoped,
    {
        self.on_added.push(Arc::new(|entity: &mut E, ctx| match ctx.tenant_id {
            Some(tenant) if !tenant.trim().is_empty() => {
                entity.set_tenant_id(tenant.to_string());
                Ok(())
            }
            _ => Err(DbError::Configuration(format!(
                "a tenant id is required to persist '{}'",
                E::entity_name()
            ))),
        }));
        self.filters.push(Arc::new(|entity: &E, ctx| {
            ctx.tenant_id
                .as_deref()
                .is_some_and(|tenant| entity.tenant_id() == tenant)
        }));
        self
    }

    /// Logical deletion: removals become in-place updates that set
    /// `is_deleted`/`deleted_at`, and an implicit `not is_deleted` filter
    /// hides them from every read.
    pub fn soft_delete(mut self) -> Self
    where
        E: SoftDeletable,
    {
        self.soft_deletable = true;
        self.on_added.push(Arc::new(|entity: &mut E, ctx| {
            if ctx.soft_delete_enabled {
                entity.set_is_deleted(false);
                entity.set_deleted_at(None);
            }
            Ok(())
        }));
        self.on_soft_deleted.push(Arc::new(|entity: &mut E, ctx| {
            entity.set_is_deleted(true);
            entity.set_deleted_at(Some(ctx.now));
            Ok(())
        }));
        self.filters.push(Arc::new(|entity: &E, _| !entity.is_deleted()));
        self
    }

    /// Correlation stamping on add and on every mutation.
    pub fn correlation(mut self) -> Self
    where
        E: Correlated,
    {
        let stamp: HookFn<E> = Arc::new(|entity: &mut E, ctx| match ctx.correlation_id {
            Some(id) if !id.trim().is_empty() => {
                entity.set_correlation_id(id.to_string());
                Ok(())
            }
            _ => Err(DbError::Configuration(format!(
                "a correlation id is required to persist '{}'",
                E::entity_name()
            ))),
        });
        self.on_added.push(Arc::clone(&stamp));
        self.on_modified.push(stamp);
        self
    }

    fn into_handlers(self) -> TypeHandlers<E> {
        let Self {
            on_added,
            on_modified,
            on_soft_deleted,
            filters,
            soft_deletable,
        } = self;

        // Conjoin the per-capability predicates once; the composed filter is
        // cached for the lifetime of the registry.
        let filter: Option<FilterFn<E>> = if filters.is_empty() {
            None
        } else {
            Some(Arc::new(move |entity: &E, ctx: &FilterContext| {
                filters.iter().all(|filter| filter(entity, ctx))
            }))
        };

        TypeHandlers {
            on_added,
            on_modified,
            on_soft_deleted,
            filter,
            soft_deletable,
        }
    }
}

struct RegistryEntry {
    entity_name: &'static str,
    // Holds an `Arc<TypeHandlers<E>>`; recovered by downcast keyed on the
    // entity's TypeId.
    handlers: Box<dyn Any + Send + Sync>,
    create_table: Box<dyn Fn(&mut TableMap) + Send + Sync>,
}

/// Immutable registry of every known entity type, built once at startup.
pub struct EntityRegistry {
    entries: HashMap<TypeId, RegistryEntry>,
}

impl EntityRegistry {
    pub fn builder() -> EntityRegistryBuilder {
        EntityRegistryBuilder {
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Logical names of all registered types, for diagnostics.
    pub fn entity_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.values().map(|e| e.entity_name).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn handlers<E: Entity>(&self) -> Result<Arc<TypeHandlers<E>>> {
        self.entries
            .get(&TypeId::of::<E>())
            .and_then(|entry| entry.handlers.downcast_ref::<Arc<TypeHandlers<E>>>())
            .cloned()
            .ok_or(DbError::NotRegistered(E::entity_name()))
    }

    pub(crate) fn create_tables(&self, tables: &mut TableMap) {
        for entry in self.entries.values() {
            (entry.create_table)(tables);
        }
    }
}

pub struct EntityRegistryBuilder {
    entries: HashMap<TypeId, RegistryEntry>,
}

impl EntityRegistryBuilder {
    /// Registers an entity type with its declared capabilities. Registering
    /// the same type twice replaces the earlier entry.
    pub fn register<E: Entity>(mut self, capabilities: Capabilities<E>) -> Self {
        let handlers = Arc::new(capabilities.into_handlers());
        debug!(entity = E::entity_name(), "registered entity type");
        self.entries.insert(
            TypeId::of::<E>(),
            RegistryEntry {
                entity_name: E::entity_name(),
                handlers: Box::new(handlers),
                create_table: Box::new(|tables| Table::<E>::ensure(tables)),
            },
        );
        self
    }

    pub fn build(self) -> EntityRegistry {
        EntityRegistry {
            entries: self.entries,
        }
    }
}
