//! Storage traits and implementations
//!
//! The local reading cache is the one source guaranteed to work offline. The
//! trait-based design allows swapping between in-memory and SQLite backends.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryReadingStore;
pub use sqlite::SqliteReadingStore;
pub use traits::ReadingStore;
