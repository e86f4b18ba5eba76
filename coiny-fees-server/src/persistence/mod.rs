//! Persistence layer for the cache record

mod record_store;
mod store;

pub use record_store::{
    RecordStore, FEES_KEY, FEES_RAW_KEY, FEES_TIME_KEY, LAST_PUBLISHED_KEY,
};
pub use store::{FileStore, KeyValueStore, MemoryStore, PersistenceError, StoreBackend};
