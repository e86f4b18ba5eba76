use async_trait::async_trait;
use chrono::Utc;
use coiny_fees::{FeeTable, RawEstimate, SourceId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{FeeSource, SourceError};

/// Mock fee source for testing and `--test-mode`
#[derive(Clone)]
pub struct MockFeeSource {
    id: SourceId,
    rates: Option<FeeTable>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockFeeSource {
    /// A source that always answers with the given table
    pub fn new(id: &str, rates: FeeTable) -> Self {
        Self {
            id: SourceId::new(id),
            rates: Some(rates),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source that always fails
    pub fn failing(id: &str) -> Self {
        Self {
            rates: None,
            ..Self::new(id, FeeTable::new())
        }
    }

    /// A plausible mainnet-like table
    pub fn with_sample_data(id: &str) -> Self {
        Self::new(
            id,
            FeeTable::from_iter([
                (1, 32.0),
                (2, 28.0),
                (3, 25.0),
                (6, 18.0),
                (12, 12.0),
                (25, 8.0),
                (144, 3.0),
                (504, 2.0),
                (1008, 1.0),
            ]),
        )
    }

    /// Delay every answer, e.g. to exercise fetch timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `fetch` has been called, across clones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeeSource for MockFeeSource {
    fn id(&self) -> SourceId {
        self.id.clone()
    }

    async fn fetch(&self) -> Result<RawEstimate, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.rates {
            Some(rates) => Ok(RawEstimate::new(self.id.clone(), rates.clone(), Utc::now())),
            None => Err(SourceError::Unavailable(format!("mock source {} is down", self.id))),
        }
    }
}
