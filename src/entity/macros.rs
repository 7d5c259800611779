//! Declarative capability implementations for structs with the conventional
//! field names. Each macro implements one capability trait by delegating to
//! the fields the trait mirrors, so entity definitions stay plain data:
//!
//! ```
//! use chrono::{DateTime, Utc};
//! use unitdb::{impl_soft_deletable, impl_timestamped};
//!
//! #[derive(Clone, Default)]
//! struct Order {
//!     id: u32,
//!     created_at: DateTime<Utc>,
//!     updated_at: Option<DateTime<Utc>>,
//!     is_deleted: bool,
//!     deleted_at: Option<DateTime<Utc>>,
//! }
//!
//! impl_timestamped!(Order);
//! impl_soft_deletable!(Order);
//! ```
//!
//! The expansions reference `::chrono`, so `chrono` must be a direct
//! dependency of the calling crate.

/// Implements [`Timestamped`](crate::entity::Timestamped) for a struct with
/// `created_at: DateTime<Utc>` and `updated_at: Option<DateTime<Utc>>`.
#[macro_export]
macro_rules! impl_timestamped {
    ($ty:ty) => {
        impl $crate::entity::Timestamped for $ty {
            fn created_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.created_at
            }

            fn set_created_at(&mut self, at: ::chrono::DateTime<::chrono::Utc>) {
                self.created_at = at;
            }

            fn updated_at(&self) -> Option<::chrono::DateTime<::chrono::Utc>> {
                self.updated_at
            }

            fn set_updated_at(&mut self, at: Option<::chrono::DateTime<::chrono::Utc>>) {
                self.updated_at = at;
            }
        }
    };
}

/// Implements [`TenantScoped`](crate::entity::TenantScoped) for a struct
/// with `tenant_id: String`.
#[macro_export]
macro_rules! impl_tenant_scoped {
    ($ty:ty) => {
        impl $crate::entity::TenantScoped for $ty {
            fn tenant_id(&self) -> &str {
                &self.tenant_id
            }

            fn set_tenant_id(&mut self, tenant: String) {
                self.tenant_id = tenant;
            }
        }
    };
}

/// Implements [`SoftDeletable`](crate::entity::SoftDeletable) for a struct
/// with `is_deleted: bool` and `deleted_at: Option<DateTime<Utc>>`.
#[macro_export]
macro_rules! impl_soft_deletable {
    ($ty:ty) => {
        impl $crate::entity::SoftDeletable for $ty {
            fn is_deleted(&self) -> bool {
                self.is_deleted
            }

            fn set_is_deleted(&mut self, deleted: bool) {
                self.is_deleted = deleted;
            }

            fn deleted_at(&self) -> Option<::chrono::DateTime<::chrono::Utc>> {
                self.deleted_at
            }

            fn set_deleted_at(&mut self, at: Option<::chrono::DateTime<::chrono::Utc>>) {
                self.deleted_at = at;
            }
        }
    };
}

/// Implements [`Correlated`](crate::entity::Correlated) for a struct with
/// `correlation_id: String`.
#[macro_export]
macro_rules! impl_correlated {
    ($ty:ty) => {
        impl $crate::entity::Correlated for $ty {
            fn correlation_id(&self) -> &str {
                &self.correlation_id
            }

            fn set_correlation_id(&mut self, id: String) {
                self.correlation_id = id;
            }
        }
    };
}
