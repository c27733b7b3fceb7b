pub mod db;
pub mod delivery;
pub mod memory;
pub mod repositories;
pub mod sqlite;
pub mod store;

pub use delivery::DeliveryTracker;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{ClaimOutcome, ClaimTarget, DocumentStore, StoreError};
