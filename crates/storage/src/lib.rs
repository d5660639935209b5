pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use error::{Result, StorageError};
pub use memory::{InMemoryPartnershipStore, InMemoryTransaction};
pub use postgres::{PostgresPartnershipStore, PostgresTransaction};
pub use record::PartnershipRecord;
pub use store::{PartnershipStore, StorageOperation, StoreTransaction};
