use async_trait::async_trait;
use coiny_fees::{RawEstimate, SourceId};

use super::{BitGoClient, BitcoinRpcClient, EsploraClient, MockFeeSource, SourceError};

/// A provider of raw fee estimates
#[async_trait]
pub trait FeeSource: Send + Sync {
    /// Identifier recorded alongside every estimate
    fn id(&self) -> SourceId;

    /// Fetch the provider's current estimates, normalized to sat/vB
    async fn fetch(&self) -> Result<RawEstimate, SourceError>;
}

/// Wrapper enum over the supported providers
pub enum SourceClient {
    BitGo(BitGoClient),
    Esplora(EsploraClient),
    BitcoinCore(BitcoinRpcClient),
    Mock(MockFeeSource),
}

#[async_trait]
impl FeeSource for SourceClient {
    fn id(&self) -> SourceId {
        match self {
            SourceClient::BitGo(client) => client.id(),
            SourceClient::Esplora(client) => client.id(),
            SourceClient::BitcoinCore(client) => client.id(),
            SourceClient::Mock(client) => client.id(),
        }
    }

    async fn fetch(&self) -> Result<RawEstimate, SourceError> {
        match self {
            SourceClient::BitGo(client) => client.fetch().await,
            SourceClient::Esplora(client) => client.fetch().await,
            SourceClient::BitcoinCore(client) => client.fetch().await,
            SourceClient::Mock(client) => client.fetch().await,
        }
    }
}
