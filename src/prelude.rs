//! One-stop import for applications:
//!
//! ```ignore
//! use unitdb::prelude::*;
//! ```

pub use crate::context::{FlowScope, ScopeConfigurator, ScopeProvider, StaticScope};
pub use crate::core::{DbError, Result};
pub use crate::entity::{
    Capabilities, Correlated, Entity, EntityRegistry, SoftDeletable, TenantScoped, Timestamped,
};
pub use crate::repository::{Query, Repository};
pub use crate::retry::RetryPolicy;
pub use crate::session::config::{
    DatabaseConfigurator, DatabaseOptions, RepositoryConfigurator, RepositoryOptions,
};
pub use crate::session::lifecycle::ChangeKind;
pub use crate::session::Session;
pub use crate::storage::{MemoryStorage, Transaction};
pub use crate::unit_of_work::UnitOfWork;
pub use crate::{impl_correlated, impl_soft_deletable, impl_tenant_scoped, impl_timestamped};
pub use tokio_util::sync::CancellationToken;
