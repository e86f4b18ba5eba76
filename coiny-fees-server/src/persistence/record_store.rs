use coiny_fees::{CacheRecord, CanonicalFeeTable, PublishedTable, RawEstimate};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{KeyValueStore, PersistenceError, StoreBackend};

/// Key holding the last canonical fee table
pub const FEES_KEY: &str = "fees";
/// Key holding the raw source estimates behind the last canonical table
pub const FEES_RAW_KEY: &str = "fees:raw";
/// Key holding the Unix time in milliseconds of the last aggregation
pub const FEES_TIME_KEY: &str = "fees:time";
/// Key holding the last published table or error marker
pub const LAST_PUBLISHED_KEY: &str = "lastPublishedTable";

/// Loads and saves the [`CacheRecord`] on top of a key/value store
pub struct RecordStore {
    store: StoreBackend,
}

impl RecordStore {
    pub fn new(store: StoreBackend) -> Self {
        Self { store }
    }

    /// Reads the full cache record.
    ///
    /// A missing key reads as empty. A failure to read the timestamp is logged
    /// and treated as "never computed", which makes the cache gate stale.
    pub fn load_record(&self) -> Result<CacheRecord, PersistenceError> {
        let last_computed_at_millis = match self.load_time() {
            Ok(time) => time,
            Err(err) => {
                warn!("Failed to read {}, treating cache as stale: {}", FEES_TIME_KEY, err);
                None
            }
        };

        let last_canonical_table: Option<CanonicalFeeTable> = self.load_json(FEES_KEY)?;
        let last_raw_estimates: Vec<RawEstimate> =
            self.load_json(FEES_RAW_KEY)?.unwrap_or_default();
        let last_published_table: Option<PublishedTable> = self.load_json(LAST_PUBLISHED_KEY)?;

        Ok(CacheRecord {
            last_computed_at_millis,
            last_raw_estimates,
            last_canonical_table,
            last_published_table,
        })
    }

    /// Replaces the whole record in one batch write
    pub fn save_record(&self, record: &CacheRecord) -> Result<(), PersistenceError> {
        let mut entries: Vec<(&str, Vec<u8>)> = vec![(
            FEES_RAW_KEY,
            serde_json::to_vec(&record.last_raw_estimates)?,
        )];

        if let Some(table) = &record.last_canonical_table {
            entries.push((FEES_KEY, serde_json::to_vec(table)?));
        }
        if let Some(millis) = record.last_computed_at_millis {
            entries.push((FEES_TIME_KEY, millis.to_string().into_bytes()));
        }
        if let Some(published) = &record.last_published_table {
            entries.push((LAST_PUBLISHED_KEY, serde_json::to_vec(published)?));
        }

        self.store.set_many(&entries)?;
        debug!("Saved cache record ({} keys)", entries.len());
        Ok(())
    }

    fn load_time(&self) -> Result<Option<i64>, PersistenceError> {
        let Some(bytes) = self.store.get(FEES_TIME_KEY)? else {
            return Ok(None);
        };

        let text = String::from_utf8_lossy(&bytes);
        text.trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|err| PersistenceError::InvalidValue {
                key: FEES_TIME_KEY.to_string(),
                reason: err.to_string(),
            })
    }

    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PersistenceError> {
        match self.store.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
