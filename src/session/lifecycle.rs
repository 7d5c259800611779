// ============================================================================
// Lifecycle Rules
// ============================================================================
//
// Capability-specific mutation rules applied to staged entities at flush
// time. Every rule mutates a disjoint set of fields, so the order in which
// the hooks of one entity run is irrelevant. Rules are installed per entity
// type when the type is registered (see `entity::registry`) and dispatched
// statically through typed closures; no runtime probing of entities.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::Result;
use crate::entity::registry::FilterContext;
use crate::entity::Entity;

/// How a staged change will be applied at flush time.
///
/// The repository chooses between `SoftDeleted` and `HardDeleted` up front,
/// when the removal is staged. A soft delete is an explicit operation, not
/// a delete rewritten mid-flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    SoftDeleted,
    HardDeleted,
}

impl ChangeKind {
    pub fn is_removal(&self) -> bool {
        matches!(self, Self::SoftDeleted | Self::HardDeleted)
    }
}

/// Ambient values a lifecycle hook may stamp onto an entity.
pub(crate) struct StampContext<'a> {
    pub(crate) now: DateTime<Utc>,
    pub(crate) tenant_id: Option<&'a str>,
    pub(crate) correlation_id: Option<&'a str>,
    pub(crate) soft_delete_enabled: bool,
}

pub(crate) type HookFn<E> = Arc<dyn Fn(&mut E, &StampContext<'_>) -> Result<()> + Send + Sync>;
pub(crate) type FilterFn<E> = Arc<dyn Fn(&E, &FilterContext) -> bool + Send + Sync>;

/// The per-type handler bundle built once at registration: lifecycle hooks
/// keyed by transition kind plus the composed implicit query filter.
pub(crate) struct TypeHandlers<E: Entity> {
    pub(crate) on_added: Vec<HookFn<E>>,
    pub(crate) on_modified: Vec<HookFn<E>>,
    pub(crate) on_soft_deleted: Vec<HookFn<E>>,
    pub(crate) filter: Option<FilterFn<E>>,
    pub(crate) soft_deletable: bool,
}

impl<E: Entity> TypeHandlers<E> {
    pub(crate) fn apply(
        &self,
        kind: ChangeKind,
        entity: &mut E,
        ctx: &StampContext<'_>,
    ) -> Result<()> {
        let hooks = match kind {
            ChangeKind::Added => &self.on_added,
            ChangeKind::Modified => &self.on_modified,
            ChangeKind::SoftDeleted => &self.on_soft_deleted,
            // A hard delete carries no stamps; the row is simply removed.
            ChangeKind::HardDeleted => return Ok(()),
        };
        for hook in hooks {
            hook(entity, ctx)?;
        }
        Ok(())
    }

    /// Evaluates the composed implicit filter. Types registered without
    /// capabilities have no filter and pass everything through.
    pub(crate) fn passes(&self, entity: &E, ctx: &FilterContext) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(entity, ctx))
    }
}
