use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Entity '{entity}' with key {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("Entity type '{0}' is not registered")]
    NotRegistered(&'static str),

    #[error("Transient storage error: {0}")]
    Transient(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Whether this failure is storage-transient and safe to retry as a
    /// whole unit of work. Backs the default retry predicate.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub(crate) fn not_found<K: std::fmt::Debug>(entity: &'static str, key: &K) -> Self {
        Self::NotFound {
            entity,
            key: format!("{key:?}"),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
