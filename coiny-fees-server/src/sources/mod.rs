//! Fee provider clients
//!
//! Every client fetches one provider's estimates and normalizes them to sat/vB.

mod bitgo;
mod error;
mod esplora;
mod mock_source;
mod rpc_client;
mod traits;

pub use bitgo::{BitGoClient, BITGO_DEFAULT_URL};
pub use error::SourceError;
pub use esplora::{EsploraClient, ESPLORA_DEFAULT_URL};
pub use mock_source::MockFeeSource;
pub use rpc_client::{BitcoinRpcClient, BitcoinRpcConfig};
pub use traits::{FeeSource, SourceClient};
