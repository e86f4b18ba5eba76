use coiny_fees::{CacheGate, FeeError};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::persistence::{FileStore, MemoryStore, PersistenceError, RecordStore, StoreBackend};
use crate::price::{HttpPriceSource, PriceClient, COINGECKO_DEFAULT_URL};
use crate::publisher::{LogPublisher, PublisherClient, WebhookPublisher};
use crate::service::{FeeService, ServiceError};
use crate::sources::{
    BitGoClient, BitcoinRpcClient, BitcoinRpcConfig, EsploraClient, MockFeeSource, SourceClient,
    BITGO_DEFAULT_URL, ESPLORA_DEFAULT_URL,
};

/// Application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sources: SourcesConfig,
    pub cache: CacheConfig,
    pub persistence: PersistenceConfig,
    pub price: PriceConfig,
    pub publisher: PublisherConfig,
    pub scheduler: SchedulerConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Port to listen on (default: 8080)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Supported fee providers
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Bitgo,
    Esplora,
    Bitcoind,
    Mock,
}

/// One fee provider
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Base URL; empty means the provider's public default
    pub url: String,
    /// RPC username (bitcoind only)
    pub username: String,
    /// RPC password (bitcoind only)
    pub password: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::of_kind(SourceKind::Mock)
    }
}

impl SourceConfig {
    pub fn of_kind(kind: SourceKind) -> Self {
        Self {
            kind,
            url: String::new(),
            username: String::new(),
            password: String::new(),
        }
    }

    fn url_or(&self, default: &str) -> String {
        if self.url.is_empty() {
            default.to_string()
        } else {
            self.url.clone()
        }
    }

    /// Builds the client for this provider
    pub fn to_client(&self) -> SourceClient {
        match self.kind {
            SourceKind::Bitgo => SourceClient::BitGo(BitGoClient::new(self.url_or(BITGO_DEFAULT_URL))),
            SourceKind::Esplora => {
                SourceClient::Esplora(EsploraClient::new(self.url_or(ESPLORA_DEFAULT_URL)))
            }
            SourceKind::Bitcoind => SourceClient::BitcoinCore(BitcoinRpcClient::new(BitcoinRpcConfig {
                url: self.url_or("http://localhost:8332"),
                username: self.username.clone(),
                password: self.password.clone(),
            })),
            SourceKind::Mock => SourceClient::Mock(MockFeeSource::with_sample_data("mock")),
        }
    }
}

/// The two blended providers
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SourcesConfig {
    pub primary: SourceConfig,
    pub secondary: SourceConfig,
    /// Per-source fetch timeout in milliseconds (default: 10000)
    pub timeout_ms: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            primary: SourceConfig::of_kind(SourceKind::Bitgo),
            secondary: SourceConfig::of_kind(SourceKind::Esplora),
            timeout_ms: 10_000,
        }
    }
}

/// Cache gate configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Minimum seconds between two recomputations (default: 600)
    pub refresh_interval_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: CacheGate::DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

/// Supported store backends
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    File,
    Memory,
}

/// Persistence configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PersistenceConfig {
    pub backend: StoreKind,
    /// Directory for the file store
    pub data_directory: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: StoreKind::File,
            data_directory: default_data_dir().to_string_lossy().into_owned(),
        }
    }
}

impl PersistenceConfig {
    pub fn to_store(&self) -> Result<StoreBackend, PersistenceError> {
        Ok(match self.backend {
            StoreKind::File => StoreBackend::File(FileStore::new(&self.data_directory)?),
            StoreKind::Memory => StoreBackend::Memory(MemoryStore::new()),
        })
    }
}

/// BTC price feed used for the USD column of the summary
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PriceConfig {
    pub url: String,
    /// Fixed price in USD; skips the feed when set
    pub fixed_usd: Option<f64>,
    /// Bound on one price lookup in milliseconds (default: 5000)
    pub timeout_ms: u64,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            url: COINGECKO_DEFAULT_URL.to_string(),
            fixed_usd: None,
            timeout_ms: 5_000,
        }
    }
}

impl PriceConfig {
    pub fn to_client(&self) -> PriceClient {
        match self.fixed_usd {
            Some(price) => PriceClient::Fixed(price),
            None => PriceClient::Http(
                HttpPriceSource::new(self.url.clone())
                    .with_timeout(Duration::from_millis(self.timeout_ms)),
            ),
        }
    }
}

/// Supported publishers
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PublisherKind {
    Log,
    Webhook,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PublisherConfig {
    pub kind: PublisherKind,
    pub webhook_url: Option<String>,
    /// Bound on one publication in milliseconds (default: 10000)
    pub timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            kind: PublisherKind::Log,
            webhook_url: None,
            timeout_ms: 10_000,
        }
    }
}

impl PublisherConfig {
    pub fn to_client(&self) -> Result<PublisherClient, FeeError> {
        match (self.kind, &self.webhook_url) {
            (PublisherKind::Log, _) => Ok(PublisherClient::Log(LogPublisher)),
            (PublisherKind::Webhook, Some(url)) if !url.is_empty() => {
                Ok(PublisherClient::Webhook(
                    WebhookPublisher::new(url.clone())
                        .with_timeout(Duration::from_millis(self.timeout_ms)),
                ))
            }
            (PublisherKind::Webhook, _) => Err(FeeError::invalid_config(
                "publisher.webhook_url is required for the webhook publisher",
            )),
        }
    }
}

/// Background publish loop
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between scheduled runs; 0 disables the scheduler (default: 600)
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_secs: 600 }
    }
}

/// `<local data dir>/coiny-fees`, or `./coiny_data` when the platform has none
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("coiny-fees"))
        .unwrap_or_else(|| PathBuf::from("coiny_data"))
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        // Load from config file if specified via environment variable
        if let Ok(config_file) = std::env::var("COINY_CONFIG_FILE") {
            builder = builder.add_source(File::from(Path::new(&config_file)));
        } else {
            // Try to load default config files
            builder = builder
                .add_source(File::with_name("config/default").required(false))
                .add_source(File::with_name("config").required(false));
        }

        builder.add_source(env_source()).build()?.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::from(path.as_ref()))
            // Still allow environment overrides
            .add_source(env_source())
            .build()?
            .try_deserialize()
    }

    /// Switches to mock sources, an in-memory store and the log publisher
    pub fn apply_test_mode(&mut self) {
        self.sources.primary = SourceConfig::of_kind(SourceKind::Mock);
        self.sources.secondary = SourceConfig::of_kind(SourceKind::Mock);
        self.persistence.backend = StoreKind::Memory;
        self.price.fixed_usd = Some(self.price.fixed_usd.unwrap_or(60_000.0));
        self.publisher = PublisherConfig::default();
    }

    /// Wires up a fee service from this configuration
    pub fn build_service(&self) -> Result<FeeService, ServiceError> {
        let gate = CacheGate::with_interval(chrono::Duration::seconds(
            self.cache.refresh_interval_secs,
        ))?;
        let records = RecordStore::new(self.persistence.to_store()?);

        Ok(FeeService::new(
            self.sources.primary.to_client(),
            self.sources.secondary.to_client(),
            records,
            self.price.to_client(),
            self.publisher.to_client()?,
        )
        .with_gate(gate)
        .with_source_timeout(Duration::from_millis(self.sources.timeout_ms))
        .with_price_timeout(Duration::from_millis(self.price.timeout_ms))
        .with_publish_timeout(Duration::from_millis(self.publisher.timeout_ms)))
    }
}

/// `COINY_` environment variables, `__` between nested keys
/// (e.g. `COINY_SOURCES__PRIMARY__KIND=esplora`)
fn env_source() -> Environment {
    Environment::with_prefix("COINY")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
