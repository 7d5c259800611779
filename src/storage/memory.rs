// ============================================================================
// In-Memory Storage Engine
// ============================================================================
//
// Tables are persistent `im::HashMap`s keyed by the entity's primary key,
// held in a type-erased map keyed by `TypeId`. Structural sharing makes a
// whole-store copy O(1) per table, which is what keeps batch application
// atomic. Transaction rollback works on a per-row undo log, so sessions
// sharing one store never clobber each other's commits.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::core::Result;
use crate::entity::registry::EntityRegistry;
use crate::entity::Entity;
use crate::session::tracking::StagedOp;
use crate::storage::transaction::UndoLog;

pub(crate) struct Table<E: Entity> {
    pub(crate) rows: im::HashMap<E::Key, E>,
}

impl<E: Entity> Table<E> {
    fn new() -> Self {
        Self {
            rows: im::HashMap::new(),
        }
    }

    pub(crate) fn ensure(tables: &mut TableMap) {
        tables
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Self::new()));
    }

    pub(crate) fn of(tables: &TableMap) -> Option<&Self> {
        tables
            .get(&TypeId::of::<E>())
            .and_then(|table| table.as_any().downcast_ref())
    }

    pub(crate) fn of_mut(tables: &mut TableMap) -> &mut Self {
        let slot = tables
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Self::new()));
        // Keyed by TypeId, so the downcast cannot mismatch.
        slot.as_any_mut()
            .downcast_mut()
            .expect("table slot holds a different entity type")
    }
}

/// Reverts one row to its pre-write state. Collected per flush while a
/// transaction is active, so rollback can undo exactly the rows this
/// session wrote and nothing else.
pub(crate) trait UndoOp: Send + Sync {
    fn revert(&self, tables: &mut TableMap);
}

pub(crate) struct RowUndo<E: Entity> {
    pub(crate) key: E::Key,
    pub(crate) prior: Option<E>,
}

impl<E: Entity> UndoOp for RowUndo<E> {
    fn revert(&self, tables: &mut TableMap) {
        let table = Table::<E>::of_mut(tables);
        match &self.prior {
            Some(row) => {
                table.rows.insert(self.key.clone(), row.clone());
            }
            None => {
                table.rows.remove(&self.key);
            }
        }
    }
}

pub(crate) trait AnyTable: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_box(&self) -> Box<dyn AnyTable>;
}

impl<E: Entity> AnyTable for Table<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn AnyTable> {
        Box::new(Self {
            rows: self.rows.clone(),
        })
    }
}

pub(crate) type TableMap = HashMap<TypeId, Box<dyn AnyTable>>;

pub(crate) fn clone_tables(tables: &TableMap) -> TableMap {
    tables
        .iter()
        .map(|(type_id, table)| (*type_id, table.clone_box()))
        .collect()
}

/// The in-memory persistence engine sessions flush into. May be shared by
/// any number of sessions; all access goes through one async read/write
/// lock.
pub struct MemoryStorage {
    tables: RwLock<TableMap>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(TableMap::new()),
        }
    }

    pub(crate) async fn get<E: Entity>(&self, key: &E::Key) -> Option<E> {
        let tables = self.tables.read().await;
        Table::<E>::of(&tables).and_then(|table| table.rows.get(key).cloned())
    }

    pub(crate) async fn scan<E: Entity>(&self) -> Vec<E> {
        let tables = self.tables.read().await;
        Table::<E>::of(&tables)
            .map(|table| table.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) async fn ensure_tables(&self, registry: &EntityRegistry) {
        let mut tables = self.tables.write().await;
        registry.create_tables(&mut tables);
    }

    /// Applies one flush batch atomically: every op writes into a snapshot
    /// of the live tables, and the snapshot replaces them only when the
    /// whole batch succeeded. When an undo log is supplied, the pre-write
    /// state of every touched row is recorded there. Returns the number of
    /// rows actually written or removed.
    pub(crate) async fn apply(
        &self,
        ops: &[Box<dyn StagedOp>],
        undo: Option<&UndoLog>,
    ) -> Result<usize> {
        let mut guard = self.tables.write().await;
        let mut staged = clone_tables(&guard);
        let mut written = 0;
        let mut reverts = Vec::with_capacity(ops.len());
        for op in ops {
            let (changed, revert) = op.write(&mut staged)?;
            if changed {
                written += 1;
            }
            reverts.push(revert);
        }
        if let Some(undo) = undo {
            undo.record(reverts)?;
        }
        *guard = staged;
        Ok(written)
    }

    /// Undoes a set of recorded row writes, newest first. Rows written by
    /// other sessions in the meantime are left alone.
    pub(crate) async fn revert(&self, reverts: Vec<Box<dyn UndoOp>>) {
        let mut guard = self.tables.write().await;
        let mut tables = clone_tables(&guard);
        for op in reverts.iter().rev() {
            op.revert(&mut tables);
        }
        *guard = tables;
    }
}
