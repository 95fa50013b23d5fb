//! Contact models, store seam and store implementations

pub mod init;
pub mod memory;
pub mod models;
pub mod sqlite;
pub mod store;

pub use init::*;
pub use memory::{MemoryContactStore, MemoryContactTx};
pub use models::*;
pub use sqlite::{SqliteContactStore, SqliteContactTx};
pub use store::{ContactStore, ContactTx};
