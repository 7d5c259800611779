pub(crate) mod memory;
pub mod transaction;

pub use memory::MemoryStorage;
pub use transaction::Transaction;
