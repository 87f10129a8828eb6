mod api;
mod codec;
mod error;
mod maintenance;
mod memory_store;
mod record_key;
mod redb_store;

pub use api::*;
pub use error::*;
pub use memory_store::MemoryHouseholdStore;
pub use redb_store::RedbHouseholdStore;
