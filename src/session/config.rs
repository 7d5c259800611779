// ============================================================================
// Session Configuration
// ============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{DbError, Result};

/// Immutable snapshot of session-level settings, validated once at session
/// construction. The tenant and correlation ids may later be reassigned
/// through the session's explicit setters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseOptions {
    /// Where the underlying engine connects to. Required.
    pub connection_target: String,
    /// Default tenant stamped onto tenant-scoped entities. Empty means
    /// tenancy is not configured for this session.
    pub tenant_id: String,
    /// Default correlation id stamped onto correlated entities. Empty means
    /// correlation is not configured for this session.
    pub correlation_id: String,
    /// When enabled, removals of soft-deletable entities become logical
    /// deletes.
    pub soft_delete_enabled: bool,
    /// When enabled, backing tables for all registered types are created at
    /// session construction.
    pub ensure_created: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            connection_target: String::new(),
            tenant_id: String::new(),
            correlation_id: String::new(),
            soft_delete_enabled: false,
            ensure_created: false,
        }
    }
}

impl DatabaseOptions {
    pub fn new(connection_target: impl Into<String>) -> Self {
        Self {
            connection_target: connection_target.into(),
            ..Self::default()
        }
    }

    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    pub fn correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn soft_delete(mut self, enabled: bool) -> Self {
        self.soft_delete_enabled = enabled;
        self
    }

    pub fn ensure_created(mut self, enabled: bool) -> Self {
        self.ensure_created = enabled;
        self
    }

    /// Loads options from a JSON document. Absent fields keep their
    /// defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| DbError::Configuration(format!("invalid options document: {e}")))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if non_blank(&self.connection_target).is_none() {
            return Err(DbError::Configuration(
                "a connection target is required".into(),
            ));
        }
        Ok(())
    }
}

/// Strategy object that computes the session options at registration time.
pub trait DatabaseConfigurator {
    fn configure(&self, options: DatabaseOptions) -> DatabaseOptions;
}

/// Tenant/correlation overrides for one repository instance.
///
/// The correlation id defaults to a fresh UUID, so every configured
/// repository carries a usable correlation tag even when the caller only
/// sets the tenant.
#[derive(Debug, Clone)]
pub struct RepositoryOptions {
    pub tenant_id: String,
    pub correlation_id: String,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            correlation_id: Uuid::new_v4().to_string(),
        }
    }
}

/// Strategy object that computes repository options before a repository is
/// handed out.
pub trait RepositoryConfigurator {
    fn configure(&self, options: RepositoryOptions) -> RepositoryOptions;
}

/// Scope captured by a repository at construction and recorded on every
/// change it stages. Overrides the session defaults without ever mutating
/// them, so differently scoped repositories from one unit of work cannot
/// interfere.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScopeOverride {
    pub(crate) tenant_id: Option<String>,
    pub(crate) correlation_id: Option<String>,
}

impl From<RepositoryOptions> for ScopeOverride {
    fn from(options: RepositoryOptions) -> Self {
        Self {
            tenant_id: owned_non_blank(options.tenant_id),
            correlation_id: owned_non_blank(options.correlation_id),
        }
    }
}

pub(crate) fn non_blank(value: &str) -> Option<&str> {
    if value.trim().is_empty() { None } else { Some(value) }
}

fn owned_non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}
