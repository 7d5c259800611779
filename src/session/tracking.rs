// ============================================================================
// Staged Change Tracking
// ============================================================================
//
// One ordered change set per session, shared by every entity type, so
// mutations flush in exactly the order they were issued. Each entry carries
// the scope override of the repository that staged it; lifecycle stamping
// happens lazily at flush time against that scope.

use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::Result;
use crate::entity::Entity;
use crate::session::config::{non_blank, DatabaseOptions, ScopeOverride};
use crate::session::lifecycle::{ChangeKind, StampContext, TypeHandlers};
use crate::storage::memory::{RowUndo, Table, TableMap, UndoOp};

/// Type-erased staged mutation. The concrete type behind this is always
/// `Staged<E>`, recovered by downcast for identity-map lookups.
pub(crate) trait StagedOp: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    /// Applies the lifecycle rules for this entry with its effective scope.
    fn finalize(&mut self, defaults: &DatabaseOptions, now: DateTime<Utc>) -> Result<()>;
    /// Writes into the staged table snapshot. Returns whether a row was
    /// written or removed, plus the undo record that reverts the write.
    fn write(&self, tables: &mut TableMap) -> Result<(bool, Box<dyn UndoOp>)>;
}

pub(crate) struct Staged<E: Entity> {
    pub(crate) kind: ChangeKind,
    pub(crate) entity: E,
    scope: ScopeOverride,
    handlers: Arc<TypeHandlers<E>>,
}

impl<E: Entity> Staged<E> {
    pub(crate) fn new(
        kind: ChangeKind,
        entity: E,
        scope: ScopeOverride,
        handlers: Arc<TypeHandlers<E>>,
    ) -> Self {
        Self {
            kind,
            entity,
            scope,
            handlers,
        }
    }
}

impl<E: Entity> StagedOp for Staged<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn finalize(&mut self, defaults: &DatabaseOptions, now: DateTime<Utc>) -> Result<()> {
        let ctx = StampContext {
            now,
            tenant_id: self
                .scope
                .tenant_id
                .as_deref()
                .or_else(|| non_blank(&defaults.tenant_id)),
            correlation_id: self
                .scope
                .correlation_id
                .as_deref()
                .or_else(|| non_blank(&defaults.correlation_id)),
            soft_delete_enabled: defaults.soft_delete_enabled,
        };
        self.handlers.apply(self.kind, &mut self.entity, &ctx)
    }

    fn write(&self, tables: &mut TableMap) -> Result<(bool, Box<dyn UndoOp>)> {
        let table = Table::<E>::of_mut(tables);
        let key = self.entity.key();
        match self.kind {
            // A soft delete persists as an in-place update of the row.
            ChangeKind::Added | ChangeKind::Modified | ChangeKind::SoftDeleted => {
                let prior = table.rows.insert(key.clone(), self.entity.clone());
                Ok((true, Box::new(RowUndo::<E> { key, prior })))
            }
            ChangeKind::HardDeleted => {
                let prior = table.rows.remove(&key);
                let removed = prior.is_some();
                Ok((removed, Box::new(RowUndo::<E> { key, prior })))
            }
        }
    }
}

/// The session's staged-mutation set: an ordered log plus identity-map
/// lookup over it.
#[derive(Default)]
pub(crate) struct ChangeSet {
    ops: Vec<Box<dyn StagedOp>>,
}

impl ChangeSet {
    pub(crate) fn push(&mut self, op: Box<dyn StagedOp>) {
        self.ops.push(op);
    }

    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }

    pub(crate) fn take(&mut self) -> Vec<Box<dyn StagedOp>> {
        std::mem::take(&mut self.ops)
    }

    /// Puts a failed flush back, ahead of anything staged since, so a
    /// failed `save_changes` leaves the set exactly as it was.
    pub(crate) fn restore(&mut self, ops: Vec<Box<dyn StagedOp>>) {
        let tail = std::mem::take(&mut self.ops);
        self.ops = ops;
        self.ops.extend(tail);
    }

    /// Most recent staged `Added`/`Modified` instance for the key, if any.
    /// This is what gives `get_by_key` its identity-map semantics.
    pub(crate) fn staged_instance<E: Entity>(&self, key: &E::Key) -> Option<E> {
        self.ops.iter().rev().find_map(|op| {
            op.as_any().downcast_ref::<Staged<E>>().and_then(|staged| {
                let relevant = matches!(staged.kind, ChangeKind::Added | ChangeKind::Modified)
                    && staged.entity.key() == *key;
                relevant.then(|| staged.entity.clone())
            })
        })
    }
}
