use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::core::{DbError, Result};
use crate::storage::memory::{MemoryStorage, UndoOp};

/// Per-session undo journal. Every flush applied while the owning
/// transaction is open records the pre-write state of the rows it touched;
/// rollback replays those records newest first.
pub(crate) struct UndoLog {
    ops: Mutex<Vec<Box<dyn UndoOp>>>,
}

impl UndoLog {
    pub(crate) fn new() -> Self {
        Self {
            ops: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn record(&self, mut reverts: Vec<Box<dyn UndoOp>>) -> Result<()> {
        self.ops.lock()?.append(&mut reverts);
        Ok(())
    }

    fn drain(&self) -> Result<Vec<Box<dyn UndoOp>>> {
        Ok(std::mem::take(&mut *self.ops.lock()?))
    }
}

/// Undo-log transaction over the in-memory engine.
///
/// `begin` opens an empty journal; every flush by the owning session is
/// recorded into it. `rollback` undoes exactly those recorded writes,
/// leaving rows committed by sibling sessions sharing the store intact.
/// `commit` discards the journal and keeps the flushed state. Completion is
/// one-shot: committing or rolling back twice is a `Transaction` error.
/// Dropping an unfinished transaction keeps whatever was flushed, which is
/// the same outcome as a commit; callers who want their changes gone must
/// roll back explicitly.
pub struct Transaction {
    storage: Arc<MemoryStorage>,
    undo: Arc<UndoLog>,
    completed: AtomicBool,
}

impl Transaction {
    pub(crate) fn new(storage: Arc<MemoryStorage>, undo: Arc<UndoLog>) -> Self {
        Self {
            storage,
            undo,
            completed: AtomicBool::new(false),
        }
    }

    pub async fn commit(&self) -> Result<()> {
        self.finish()?;
        self.undo.drain()?;
        debug!("transaction committed");
        Ok(())
    }

    pub async fn rollback(&self) -> Result<()> {
        self.finish()?;
        let reverts = self.undo.drain()?;
        self.storage.revert(reverts).await;
        debug!("transaction rolled back");
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    fn finish(&self) -> Result<()> {
        if self.completed.swap(true, Ordering::AcqRel) {
            return Err(DbError::Transaction("transaction already completed".into()));
        }
        Ok(())
    }
}
