#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use unitdb::prelude::*;

/// Fully capable fixture entity: timestamps, tenancy, soft delete and
/// correlation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    pub id: u32,
    pub customer: String,
    pub total_cents: i64,
    pub tenant_id: String,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Order {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }

    fn entity_name() -> &'static str {
        "Order"
    }
}

impl_timestamped!(Order);
impl_tenant_scoped!(Order);
impl_soft_deletable!(Order);
impl_correlated!(Order);

/// Capability-free fixture entity: stored and tracked, never stamped or
/// filtered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditNote {
    pub id: u32,
    pub text: String,
}

impl Entity for AuditNote {
    type Key = u32;

    fn key(&self) -> u32 {
        self.id
    }

    fn entity_name() -> &'static str {
        "AuditNote"
    }
}

pub fn order(id: u32, customer: &str, total_cents: i64) -> Order {
    Order {
        id,
        customer: customer.to_string(),
        total_cents,
        ..Default::default()
    }
}

pub fn registry() -> EntityRegistry {
    EntityRegistry::builder()
        .register(
            Capabilities::<Order>::new()
                .timestamps()
                .tenancy()
                .soft_delete()
                .correlation(),
        )
        .register(Capabilities::<AuditNote>::new())
        .build()
}

/// A session over a fresh store with soft delete enabled and the given
/// tenant.
pub async fn session_for(tenant: &str) -> Arc<Session> {
    Session::connect(
        DatabaseOptions::new("memory://orders")
            .tenant(tenant)
            .correlation("corr-1")
            .soft_delete(true)
            .ensure_created(true),
        registry(),
    )
    .await
    .unwrap()
}
