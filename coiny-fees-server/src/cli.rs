//! Command-line interface configuration

use clap::Parser;

use crate::config::AppConfig;

/// Default log filter when neither `RUST_LOG` nor `--log-filter` is set
pub const DEFAULT_LOG_FILTER: &str = "coiny_fees_server=info,coiny_fees=info";

/// Coiny Fees Server CLI
///
/// Every option overrides the loaded configuration.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // Server options
    /// Host to bind the server to
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    // Data persistence
    /// Directory for the file store
    #[arg(short, long)]
    pub data_dir: Option<String>,

    /// Path to configuration file (overridden by CLI args)
    #[arg(short, long)]
    pub config: Option<String>,

    // Test mode
    /// Use mock fee sources, an in-memory store and a fixed BTC price
    #[arg(long)]
    pub test_mode: bool,

    // Logging
    /// Log filter (e.g., "coiny_fees_server=debug,coiny_fees=info")
    #[arg(long, default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
}

impl Cli {
    /// Applies the command-line overrides on top of a loaded configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(data_dir) = &self.data_dir {
            config.persistence.data_directory = data_dir.clone();
        }
        if self.test_mode {
            config.apply_test_mode();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SourceKind, StoreKind};

    #[test]
    fn test_defaults_leave_config_alone() {
        let cli = Cli::parse_from(["coiny-fees-server"]);
        assert_eq!(cli.log_filter, DEFAULT_LOG_FILTER);

        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.sources.primary.kind, SourceKind::Bitgo);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "coiny-fees-server",
            "-H",
            "127.0.0.1",
            "--port",
            "3000",
            "--data-dir",
            "/tmp/coiny",
            "--test-mode",
        ]);

        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.persistence.data_directory, "/tmp/coiny");
        assert_eq!(config.persistence.backend, StoreKind::Memory);
        assert_eq!(config.sources.secondary.kind, SourceKind::Mock);
    }
}
