// ============================================================================
// Ambient Scope
// ============================================================================
//
// Where the tenant and correlation for a repository come from: either a
// value carried explicitly ([`StaticScope`]) or the ambient task-local flow
// ([`FlowScope`]), installed once at the edge of a request and picked up by
// every repository minted underneath it.

use crate::session::config::{RepositoryConfigurator, RepositoryOptions};

/// A source of tenant/correlation values for repository scoping.
pub trait ScopeProvider {
    fn tenant_id(&self) -> Option<String>;
    fn correlation_id(&self) -> Option<String>;
}

/// A fixed scope carried by value.
#[derive(Debug, Clone, Default)]
pub struct StaticScope {
    pub tenant_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl StaticScope {
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            correlation_id: None,
        }
    }

    pub fn new(
        tenant_id: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            correlation_id: Some(correlation_id.into()),
        }
    }
}

impl ScopeProvider for StaticScope {
    fn tenant_id(&self) -> Option<String> {
        self.tenant_id.clone()
    }

    fn correlation_id(&self) -> Option<String> {
        self.correlation_id.clone()
    }
}

tokio::task_local! {
    static FLOW_SCOPE: StaticScope;
}

/// The ambient scope of the current task.
///
/// Install a scope around a future with [`FlowScope::with`]; within it,
/// `FlowScope` resolves to the installed values. Scopes nest (the innermost
/// installation wins) and each task sees only its own.
///
/// ```ignore
/// FlowScope::with(StaticScope::tenant("Acme"), async {
///     let orders = uow.repository_configured::<Order, ScopeConfigurator<FlowScope>>()?;
///     // everything staged here is scoped to Acme
/// }).await;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowScope;

impl FlowScope {
    /// Runs `future` with `scope` installed as the task's ambient scope.
    pub async fn with<F: std::future::Future>(scope: StaticScope, future: F) -> F::Output {
        FLOW_SCOPE.scope(scope, future).await
    }

    /// The ambient scope, if one is installed on the current task.
    pub fn current() -> Option<StaticScope> {
        FLOW_SCOPE.try_with(Clone::clone).ok()
    }
}

impl ScopeProvider for FlowScope {
    fn tenant_id(&self) -> Option<String> {
        Self::current().and_then(|scope| scope.tenant_id)
    }

    fn correlation_id(&self) -> Option<String> {
        Self::current().and_then(|scope| scope.correlation_id)
    }
}

/// Adapts any [`ScopeProvider`] into a repository configurator. Fields the
/// provider does not supply keep their defaults.
#[derive(Debug, Clone, Default)]
pub struct ScopeConfigurator<P: ScopeProvider>(pub P);

impl<P: ScopeProvider> RepositoryConfigurator for ScopeConfigurator<P> {
    fn configure(&self, mut options: RepositoryOptions) -> RepositoryOptions {
        if let Some(tenant) = self.0.tenant_id() {
            options.tenant_id = tenant;
        }
        if let Some(correlation) = self.0.correlation_id() {
            options.correlation_id = correlation;
        }
        options
    }
}
