pub mod change;
pub mod engine;
pub mod memory;
pub mod row;

pub use change::Change;
pub use engine::{RowPredicate, Storage, StorageStats};
pub use memory::InMemoryStorage;
pub use row::StoredRow;
