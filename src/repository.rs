// ============================================================================
// Repository
// ============================================================================
//
// Per-entity-type façade over the session. Repositories are stateless and
// cheap: create and discard them freely; everything they stage lands in
// the session's shared change set and persists only when the unit of work
// saves. Every read transparently applies the entity type's implicit
// filters (tenant match, not-deleted).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::{DbError, Result};
use crate::entity::registry::FilterContext;
use crate::entity::Entity;
use crate::session::config::{non_blank, ScopeOverride};
use crate::session::lifecycle::{ChangeKind, TypeHandlers};
use crate::session::tracking::Staged;
use crate::session::Session;

pub struct Repository<E: Entity> {
    session: Arc<Session>,
    handlers: Arc<TypeHandlers<E>>,
    scope: ScopeOverride,
    token: CancellationToken,
}

impl<E: Entity> std::fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &E::entity_name())
            .finish_non_exhaustive()
    }
}

impl<E: Entity> Repository<E> {
    pub(crate) fn new(
        session: Arc<Session>,
        handlers: Arc<TypeHandlers<E>>,
        scope: ScopeOverride,
        token: CancellationToken,
    ) -> Self {
        Self {
            session,
            handlers,
            scope,
            token,
        }
    }

    /// Point lookup by primary key. Absent is `None`, not an error.
    ///
    /// An instance staged as added or modified in this session wins over
    /// the stored row, so a just-added entity is visible before the flush.
    pub async fn get_by_key(&self, key: &E::Key) -> Result<Option<E>> {
        self.guard()?;
        if let Some(staged) = self.session.staged_instance::<E>(key)? {
            return Ok(Some(staged));
        }
        let ctx = self.filter_context()?;
        Ok(self
            .session
            .storage()
            .get::<E>(key)
            .await
            .filter(|entity| self.handlers.passes(entity, &ctx)))
    }

    /// First entity matching the predicate, after the implicit filters.
    pub async fn get_one(
        &self,
        predicate: impl Fn(&E) -> bool + Send + Sync + 'static,
    ) -> Result<Option<E>> {
        self.query().filter(predicate).first().await
    }

    /// All entities passing the implicit filters.
    pub async fn get_all(&self) -> Result<Vec<E>> {
        self.query().all().await
    }

    /// Escape hatch for composed querying. The same implicit filters apply
    /// unless the query opts out with [`Query::ignore_filters`].
    pub fn query(&self) -> Query<E> {
        Query {
            session: Arc::clone(&self.session),
            handlers: Arc::clone(&self.handlers),
            scope: self.scope.clone(),
            token: self.token.clone(),
            apply_filters: true,
            predicates: Vec::new(),
            skip: 0,
            take: None,
        }
    }

    /// Stages an entity for insertion. Lifecycle stamps (timestamps,
    /// tenant, correlation) are applied at save time.
    pub async fn add(&self, entity: E) -> Result<()> {
        self.guard()?;
        self.stage(ChangeKind::Added, entity)
    }

    pub async fn add_many(&self, entities: impl IntoIterator<Item = E>) -> Result<()> {
        self.guard()?;
        for entity in entities {
            self.stage(ChangeKind::Added, entity)?;
        }
        Ok(())
    }

    /// Stages an entity for update.
    pub async fn update(&self, entity: E) -> Result<()> {
        self.guard()?;
        self.stage(ChangeKind::Modified, entity)
    }

    /// Stages a removal. Soft-deletable entities under a soft-delete
    /// session are logically deleted; everything else is removed outright.
    pub async fn remove(&self, entity: E) -> Result<()> {
        self.guard()?;
        self.stage(self.removal_kind()?, entity)
    }

    pub async fn remove_many(&self, entities: impl IntoIterator<Item = E>) -> Result<()> {
        self.guard()?;
        let kind = self.removal_kind()?;
        for entity in entities {
            self.stage(kind, entity)?;
        }
        Ok(())
    }

    /// Looks the entity up by key and stages its removal. A missing key is
    /// a hard `NotFound` failure that leaves the staged set untouched;
    /// silently ignoring it would hide caller bugs.
    pub async fn remove_by_key(&self, key: &E::Key) -> Result<()> {
        let entity = self
            .get_by_key(key)
            .await?
            .ok_or_else(|| DbError::not_found(E::entity_name(), key))?;
        self.stage(self.removal_kind()?, entity)
    }

    fn removal_kind(&self) -> Result<ChangeKind> {
        let defaults = self.session.options()?;
        Ok(
            if self.handlers.soft_deletable && defaults.soft_delete_enabled {
                ChangeKind::SoftDeleted
            } else {
                ChangeKind::HardDeleted
            },
        )
    }

    fn stage(&self, kind: ChangeKind, entity: E) -> Result<()> {
        self.session.stage(Box::new(Staged::new(
            kind,
            entity,
            self.scope.clone(),
            Arc::clone(&self.handlers),
        )))
    }

    fn filter_context(&self) -> Result<FilterContext> {
        effective_filter_context(&self.session, &self.scope)
    }

    fn guard(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(DbError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn effective_filter_context(session: &Session, scope: &ScopeOverride) -> Result<FilterContext> {
    let defaults = session.options()?;
    Ok(FilterContext {
        tenant_id: scope
            .tenant_id
            .clone()
            .or_else(|| non_blank(&defaults.tenant_id).map(str::to_string)),
    })
}

/// Lazily evaluated query over one entity type. Combinators narrow the
/// result; the store is read once, when the query is consumed with
/// [`all`](Query::all), [`first`](Query::first) or [`count`](Query::count).
pub struct Query<E: Entity> {
    session: Arc<Session>,
    handlers: Arc<TypeHandlers<E>>,
    scope: ScopeOverride,
    token: CancellationToken,
    apply_filters: bool,
    predicates: Vec<Box<dyn Fn(&E) -> bool + Send + Sync>>,
    skip: usize,
    take: Option<usize>,
}

impl<E: Entity> Query<E> {
    /// Reads through the implicit filters: deleted rows and foreign
    /// tenants become visible. For diagnostics and administrative reads.
    pub fn ignore_filters(mut self) -> Self {
        self.apply_filters = false;
        self
    }

    pub fn filter(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    pub fn skip(mut self, count: usize) -> Self {
        self.skip = count;
        self
    }

    pub fn take(mut self, count: usize) -> Self {
        self.take = Some(count);
        self
    }

    pub async fn all(self) -> Result<Vec<E>> {
        let Self {
            session,
            handlers,
            scope,
            token,
            apply_filters,
            predicates,
            skip,
            take,
        } = self;

        if token.is_cancelled() {
            return Err(DbError::Cancelled);
        }

        let ctx = effective_filter_context(&session, &scope)?;
        let rows = session.storage().scan::<E>().await;
        let matches = rows
            .into_iter()
            .filter(|entity| !apply_filters || handlers.passes(entity, &ctx))
            .filter(|entity| predicates.iter().all(|predicate| predicate(entity)))
            .skip(skip);

        Ok(match take {
            Some(count) => matches.take(count).collect(),
            None => matches.collect(),
        })
    }

    pub async fn first(mut self) -> Result<Option<E>> {
        self.take = Some(1);
        Ok(self.all().await?.pop())
    }

    pub async fn count(self) -> Result<usize> {
        Ok(self.all().await?.len())
    }
}
