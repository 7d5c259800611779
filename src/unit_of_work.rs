// ============================================================================
// Unit of Work
// ============================================================================
//
// The top-level coordination surface: mints repositories, owns the retry
// policy and the cancellation token, and drives saves and transactions on
// its session. A unit of work is a thin handle over the shared session, so
// handing one to each request or task is the expected usage.

use std::future::Future;
use std::sync::Arc;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::core::{DbError, Result};
use crate::entity::Entity;
use crate::repository::Repository;
use crate::retry::RetryPolicy;
use crate::session::config::{RepositoryConfigurator, RepositoryOptions, ScopeOverride};
use crate::session::Session;
use crate::storage::transaction::Transaction;

pub struct UnitOfWork {
    session: Arc<Session>,
    policy: RetryPolicy,
    token: CancellationToken,
}

impl UnitOfWork {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            policy: RetryPolicy::default(),
            token: CancellationToken::new(),
        }
    }

    /// Binds a cancellation token. Once cancelled, every operation on this
    /// unit of work and its repositories fails fast with
    /// [`DbError::Cancelled`].
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Replaces the retry policy used by [`execution_strategy`].
    ///
    /// [`execution_strategy`]: UnitOfWork::execution_strategy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// A repository for `E` under the session's default scope.
    pub fn repository<E: Entity>(&self) -> Result<Repository<E>> {
        self.build_repository(ScopeOverride::default())
    }

    /// A repository for `E` with its own tenant/correlation scope. The
    /// override travels with everything this repository stages and reads;
    /// the session's defaults and sibling repositories are unaffected.
    pub fn repository_with<E: Entity>(
        &self,
        configure: impl FnOnce(&mut RepositoryOptions),
    ) -> Result<Repository<E>> {
        let mut options = RepositoryOptions::default();
        configure(&mut options);
        self.build_repository(options.into())
    }

    /// Like [`repository_with`](UnitOfWork::repository_with), but the scope
    /// comes from a configurator strategy type.
    pub fn repository_configured<E, C>(&self) -> Result<Repository<E>>
    where
        E: Entity,
        C: RepositoryConfigurator + Default,
    {
        let options = C::default().configure(RepositoryOptions::default());
        self.build_repository(options.into())
    }

    fn build_repository<E: Entity>(&self, scope: ScopeOverride) -> Result<Repository<E>> {
        let handlers = self.session.registry().handlers::<E>()?;
        Ok(Repository::new(
            Arc::clone(&self.session),
            handlers,
            scope,
            self.token.clone(),
        ))
    }

    /// Flushes every staged mutation atomically. Returns the number of rows
    /// written.
    pub async fn save_changes(&self) -> Result<usize> {
        self.session.save_changes(&self.token).await
    }

    pub async fn begin_transaction(&self) -> Result<Transaction> {
        if self.token.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        self.session.begin_transaction().await
    }

    /// Runs a transactional operation under the retry policy.
    ///
    /// Each attempt gets a fresh transaction; the closure does its work,
    /// saves, and commits (or rolls back and returns an error). A retryable
    /// failure rolls back anything the attempt left uncommitted, backs off
    /// exponentially, and re-runs the whole closure, so the operation must
    /// be written to be re-runnable from scratch. Non-retryable errors and
    /// cancellation propagate immediately, and a cancelled operation is
    /// never retried.
    pub async fn execution_strategy<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn(Arc<Transaction>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            if self.token.is_cancelled() {
                return Err(DbError::Cancelled);
            }

            let tx = Arc::new(self.session.begin_transaction().await?);
            match operation(Arc::clone(&tx)).await {
                Ok(value) => return Ok(value),
                Err(err)
                    if self.policy.is_retryable(&err)
                        && attempt < self.policy.max_attempts
                        && !self.token.is_cancelled() =>
                {
                    if !tx.is_completed() {
                        tx.rollback().await?;
                    }
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::select! {
                        _ = self.token.cancelled() => return Err(DbError::Cancelled),
                        _ = sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
