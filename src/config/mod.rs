// Configuration module entry point
// Layers defaults, an optional config file, environment variables and CLI flags

mod cli;
mod state;
mod types;

use std::net::SocketAddr;

use crate::error::ServerError;

// Re-export public types
pub use cli::Cli;
pub use state::AppState;
pub use types::{Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig};

/// Config file looked up (any supported extension) when `--config` is absent
pub const DEFAULT_CONFIG_NAME: &str = "isoserve";
/// Environment variable prefix, e.g. `ISOSERVE_SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "ISOSERVE";
pub const DEFAULT_PORT: u16 = 6502;

impl Config {
    /// Load configuration for the given command line.
    ///
    /// Precedence: defaults < config file < environment < CLI flags.
    /// The default config file is optional, an explicit `--config` is not.
    pub fn load(cli: &Cli) -> Result<Self, ServerError> {
        let (config_path, required) = cli
            .config
            .as_deref()
            .map_or((DEFAULT_CONFIG_NAME, false), |path| (path, true));

        let builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", i64::from(DEFAULT_PORT))?
            .set_default("server.root", ".")?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.show_headers", false)?
            .set_default("logging.access_log_format", "common")?
            .set_default("http.server_name", "isoserve")?
            .set_default("http.index_files", vec!["index.html", "index.htm"])?
            .set_default("http.directory_listing", true)?
            .set_default("performance.keep_alive", true)?
            .set_default("performance.connection_timeout", 0)?
            .set_default("performance.shutdown_timeout", 5)?
            .add_source(config::File::with_name(config_path).required(required))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("server.port", cli.port.map(i64::from))?
            .set_override_option("server.host", cli.host.clone())?
            .set_override_option(
                "server.root",
                cli.root
                    .as_ref()
                    .map(|root| root.to_string_lossy().into_owned()),
            )?;

        let builder = if cli.no_listing {
            builder.set_override("http.directory_listing", false)?
        } else {
            builder
        };

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check values that deserialize fine but cannot be used
    pub fn validate(&self) -> Result<(), ServerError> {
        self.socket_addr()?;
        if self.server.workers == Some(0) {
            return Err(ServerError::Invalid {
                field: "server.workers",
                message: "must be greater than 0".to_string(),
            });
        }
        if self.http.index_files.iter().any(|f| f.is_empty() || f.contains('/')) {
            return Err(ServerError::Invalid {
                field: "http.index_files",
                message: "entries must be plain file names".to_string(),
            });
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let host = self.server.host.trim_start_matches('[').trim_end_matches(']');
        let addr = if host.contains(':') {
            format!("[{host}]:{}", self.server.port)
        } else {
            format!("{host}:{}", self.server.port)
        };
        addr.parse().map_err(|e| ServerError::Invalid {
            field: "server.host",
            message: format!("'{addr}' is not a socket address: {e}"),
        })
    }
}
