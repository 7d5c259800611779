// ============================================================================
// Session
// ============================================================================
//
// A session is the unit-of-work-scoped context over the storage engine: it
// owns the configuration snapshot, the entity registry, and the staged
// change set, and it translates staged mutations into one atomic flush.
// One session serves one logical flow; it is reusable across any number of
// save/transaction cycles.

pub mod config;
pub mod lifecycle;
pub(crate) mod tracking;

use std::sync::{Arc, Mutex, RwLock, Weak};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::{DbError, Result};
use crate::entity::registry::EntityRegistry;
use crate::entity::Entity;
use crate::session::config::{non_blank, DatabaseConfigurator, DatabaseOptions};
use crate::session::tracking::{ChangeSet, StagedOp};
use crate::storage::memory::MemoryStorage;
use crate::storage::transaction::{Transaction, UndoLog};

pub struct Session {
    options: RwLock<DatabaseOptions>,
    registry: Arc<EntityRegistry>,
    storage: Arc<MemoryStorage>,
    changes: Mutex<ChangeSet>,
    // Undo journal of the currently open transaction, if any. Weak so that
    // a dropped transaction handle stops recording.
    active_undo: Mutex<Weak<UndoLog>>,
}

impl Session {
    /// Opens a session over a fresh in-memory store.
    pub async fn connect(options: DatabaseOptions, registry: EntityRegistry) -> Result<Arc<Self>> {
        Self::attach(options, Arc::new(registry), Arc::new(MemoryStorage::new())).await
    }

    /// Opens a session with options computed by a configurator strategy.
    pub async fn connect_with<C: DatabaseConfigurator>(
        configurator: &C,
        registry: EntityRegistry,
    ) -> Result<Arc<Self>> {
        let options = configurator.configure(DatabaseOptions::default());
        Self::connect(options, registry).await
    }

    /// Opens a session over an existing store. Multiple sessions (for
    /// example, differently configured tenants) may share one store and one
    /// registry.
    pub async fn attach(
        options: DatabaseOptions,
        registry: Arc<EntityRegistry>,
        storage: Arc<MemoryStorage>,
    ) -> Result<Arc<Self>> {
        options.validate()?;
        let ensure_created = options.ensure_created;
        let session = Arc::new(Self {
            options: RwLock::new(options),
            registry,
            storage,
            changes: Mutex::new(ChangeSet::default()),
            active_undo: Mutex::new(Weak::new()),
        });
        if ensure_created {
            session.storage.ensure_tables(&session.registry).await;
            debug!(entities = ?session.registry.entity_names(), "created backing tables");
        }
        Ok(session)
    }

    /// Current configuration snapshot.
    pub fn options(&self) -> Result<DatabaseOptions> {
        Ok(self.options.read()?.clone())
    }

    /// Reassigns the session's default tenant. Validated non-empty on each
    /// set.
    pub fn set_tenant_id(&self, tenant_id: &str) -> Result<()> {
        let tenant = non_blank(tenant_id)
            .ok_or_else(|| DbError::Configuration("tenant id must not be blank".into()))?;
        self.options.write()?.tenant_id = tenant.to_string();
        Ok(())
    }

    /// Reassigns the session's default correlation id. Validated non-empty
    /// on each set.
    pub fn set_correlation_id(&self, correlation_id: &str) -> Result<()> {
        let correlation = non_blank(correlation_id)
            .ok_or_else(|| DbError::Configuration("correlation id must not be blank".into()))?;
        self.options.write()?.correlation_id = correlation.to_string();
        Ok(())
    }

    pub(crate) fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    pub(crate) fn storage(&self) -> &Arc<MemoryStorage> {
        &self.storage
    }

    /// Number of staged, not-yet-flushed mutations.
    pub fn staged_count(&self) -> Result<usize> {
        Ok(self.changes.lock()?.len())
    }

    pub(crate) fn stage(&self, op: Box<dyn StagedOp>) -> Result<()> {
        self.changes.lock()?.push(op);
        Ok(())
    }

    pub(crate) fn staged_instance<E: Entity>(&self, key: &E::Key) -> Result<Option<E>> {
        Ok(self.changes.lock()?.staged_instance::<E>(key))
    }

    /// Opens an undo-log transaction over the backing store. Flushes made
    /// by this session while it is open are recorded so rollback can undo
    /// them without touching sibling sessions' writes. Beginning a new
    /// transaction detaches any previous one from the session.
    pub async fn begin_transaction(&self) -> Result<Transaction> {
        let undo = Arc::new(UndoLog::new());
        *self.active_undo.lock()? = Arc::downgrade(&undo);
        Ok(Transaction::new(Arc::clone(&self.storage), undo))
    }

    /// Flushes all staged mutations: applies the lifecycle rules for each
    /// entry, then lands the whole batch atomically. On any failure
    /// (configuration validation, storage, cancellation) the staged set is
    /// restored untouched so the caller can fix the problem and retry, or
    /// discard the session. Returns the number of rows written.
    pub async fn save_changes(&self, token: &CancellationToken) -> Result<usize> {
        if token.is_cancelled() {
            return Err(DbError::Cancelled);
        }

        let mut ops = self.changes.lock()?.take();
        if ops.is_empty() {
            return Ok(0);
        }

        let defaults = self.options()?;
        let now = Utc::now();

        for index in 0..ops.len() {
            if let Err(err) = ops[index].finalize(&defaults, now) {
                self.changes.lock()?.restore(ops);
                return Err(err);
            }
        }

        // Last cancellation point: past here the flush is all-or-nothing.
        if token.is_cancelled() {
            self.changes.lock()?.restore(ops);
            return Err(DbError::Cancelled);
        }

        let undo = self.active_undo.lock()?.upgrade();
        match self.storage.apply(&ops, undo.as_deref()).await {
            Ok(written) => {
                debug!(staged = ops.len(), written, "flushed staged changes");
                Ok(written)
            }
            Err(err) => {
                self.changes.lock()?.restore(ops);
                Err(err)
            }
        }
    }
}
