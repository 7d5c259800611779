// ============================================================================
// UnitDB Library
// ============================================================================
//
// An async unit-of-work persistence layer over an in-memory, transactional
// storage engine. Entities declare capabilities (timestamps, tenancy, soft
// delete, correlation) in a registry built once at startup; repositories
// stage mutations against a shared session, and `save_changes` applies the
// lifecycle rules and lands the batch atomically. Reads pass through the
// registered implicit filters, and a retrying execution strategy wraps
// transactional operations against transient failures.

pub mod context;
pub mod core;
pub mod entity;
pub mod prelude;
pub mod repository;
pub mod retry;
pub mod session;
pub mod storage;
pub mod unit_of_work;

// Re-export main types for convenience
pub use core::{DbError, Result};
pub use entity::{Capabilities, EntityRegistry, FilterContext};
pub use repository::{Query, Repository};
pub use retry::RetryPolicy;
pub use session::config::{DatabaseConfigurator, DatabaseOptions, RepositoryOptions};
pub use session::Session;
pub use storage::{MemoryStorage, Transaction};
pub use unit_of_work::UnitOfWork;

// Cancellation is part of the public API surface.
pub use tokio_util::sync::CancellationToken;
