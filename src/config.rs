use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ADMIN_KEY: &str = "dev-key-change-me";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";
const DEFAULT_DATABASE: &str = "ethNodesDB";
const DEFAULT_SIMULATED_PAYMENT_DELAY_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Process configuration, read once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub mongodb_uri: String,
    pub database: String,
    pub admin_key: String,
    pub simulate_payment: bool,
    pub simulated_payment_delay: Duration,
    pub seed_nodes_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            mongodb_uri: DEFAULT_MONGODB_URI.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            admin_key: DEFAULT_ADMIN_KEY.to_string(),
            simulate_payment: false,
            simulated_payment_delay: Duration::from_secs(DEFAULT_SIMULATED_PAYMENT_DELAY_SECS),
            seed_nodes_path: None,
        }
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    let parsed = value.trim().parse();
    parsed.map_err(|_| ConfigError::Invalid { name, value })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let ip: IpAddr = match lookup("BIND_ADDR") {
            Some(v) => parse("BIND_ADDR", v)?,
            None => defaults.listen_addr.ip(),
        };
        let port: u16 = match lookup("PORT") {
            Some(v) => parse("PORT", v)?,
            None => DEFAULT_PORT,
        };
        let delay_secs: u64 = match lookup("SIMULATED_PAYMENT_DELAY_SECS") {
            Some(v) => parse("SIMULATED_PAYMENT_DELAY_SECS", v)?,
            None => DEFAULT_SIMULATED_PAYMENT_DELAY_SECS,
        };

        Ok(Self {
            listen_addr: SocketAddr::new(ip, port),
            mongodb_uri: lookup("MONGODB_URI").unwrap_or(defaults.mongodb_uri),
            database: lookup("MONGODB_DB").unwrap_or(defaults.database),
            admin_key: lookup("ADMIN_KEY")
                .filter(|k| !k.is_empty())
                .unwrap_or(defaults.admin_key),
            simulate_payment: lookup("SIMULATE_PAYMENT")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
            simulated_payment_delay: Duration::from_secs(delay_secs),
            seed_nodes_path: lookup("SEED_NODES_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn uses_default_admin_key(&self) -> bool {
        self.admin_key == DEFAULT_ADMIN_KEY
    }
}
