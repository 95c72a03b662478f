//! Collector-owned configuration: TOML file + environment overlay,
//! translated into `wrtmon_core::RouterIdentity` at a single boundary.
//!
//! Core never sees these types -- it receives pre-built identities.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use wrtmon_core::{BackendKind, MacAddress, RouterIdentity};

pub mod error;

pub use error::ConfigError;

// ── TOML config structs ──────────────────────────────────────────────

/// Collector configuration as written in `wrtmon.toml`.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Exporter settings.
    #[serde(default)]
    pub exporter: Exporter,

    /// Routers to poll, keyed by the name that becomes the `router`
    /// metric label.
    #[serde(default)]
    pub routers: BTreeMap<String, RouterProfile>,

    /// Optional friendly names for client hardware addresses; the
    /// exporter substitutes them into the `mac` label.
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
}

impl Config {
    /// The mapping table with its keys normalized to canonical MAC form,
    /// so lookups match what the backends report.
    pub fn client_names(&self) -> BTreeMap<MacAddress, String> {
        self.mapping
            .iter()
            .map(|(mac, name)| (MacAddress::new(mac), name.clone()))
            .collect()
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Exporter {
    /// Bind address for the `/metrics` listener.
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for Exporter {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".into()
}

/// One router as configured. Passwords stay wrapped in `SecretString`
/// from the moment they are deserialized.
#[derive(Debug, Deserialize, Serialize)]
pub struct RouterProfile {
    /// Hostname or IP address.
    pub address: String,

    /// SSH port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Firmware family: `wl`, `iw`, `ate`, or `ubus`.
    pub backend: BackendKind,

    #[serde(default = "default_username")]
    pub username: String,

    /// Plaintext password -- prefer `use_keys` with an SSH agent.
    #[serde(default, skip_serializing)]
    pub password: Option<SecretString>,

    /// Authenticate through the local SSH agent.
    #[serde(default)]
    pub use_keys: bool,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

fn default_port() -> u16 {
    22
}
fn default_username() -> String {
    "root".into()
}
fn default_connect_timeout() -> u64 {
    30
}

// ── Config file path ─────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "wrtmon", "wrtmon")
        .map(|dirs| dirs.config_dir().join("wrtmon.toml"))
        .unwrap_or_else(|| {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("wrtmon");
            p.push("wrtmon.toml");
            p
        })
}

// ── Config loading ───────────────────────────────────────────────────

/// Load configuration from one file plus `WRTMON_*` environment
/// overrides (e.g. `WRTMON_EXPORTER__LISTEN=127.0.0.1:9000`).
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("WRTMON_").split("__"));

    let config: Config = figment.extract()?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    for (name, profile) in &config.routers {
        if profile.address.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: format!("routers.{name}.address"),
                reason: "must not be empty".into(),
            });
        }
        if profile.password.is_none() && !profile.use_keys {
            return Err(ConfigError::Validation {
                field: format!("routers.{name}"),
                reason: "needs either a password or use_keys = true".into(),
            });
        }
    }
    Ok(())
}

/// Translate the routers table into core identities. This is the single
/// boundary where config types cross into core types.
pub fn router_identities(config: &Config) -> Vec<RouterIdentity> {
    config
        .routers
        .iter()
        .map(|(name, profile)| RouterIdentity {
            name: name.clone(),
            host: profile.address.clone(),
            port: profile.port,
            backend: profile.backend,
            username: profile.username.clone(),
            password: profile.password.clone(),
            use_keys: profile.use_keys,
            connect_timeout: Duration::from_secs(profile.connect_timeout),
        })
        .collect()
}

// ── Example config ───────────────────────────────────────────────────

/// Starter `wrtmon.toml` written by `wrtmon init-config`. Parses back
/// into a valid [`Config`].
pub const EXAMPLE_CONFIG: &str = r#"[exporter]
listen = "0.0.0.0:8000"

# One table per router. The table name becomes the `router` metric label.
# backend: "wl" (DD-WRT), "iw" (generic Linux), "ate" (DSL-AC55U),
#          "ubus" (OpenWrt)

[routers.attic]
address = "192.168.1.1"
backend = "iw"
username = "root"
use_keys = true

[routers.cellar]
address = "192.168.1.2"
port = 2222
backend = "wl"
username = "admin"
password = "changeme"

# Optional friendly names for clients, shown in the `mac` metric label.
[mapping]
"AA:BB:CC:DD:EE:FF" = "laptop"
"#;

/// Write the example config, refusing to clobber an existing file.
pub fn write_example_config(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, EXAMPLE_CONFIG)?;
    Ok(())
}
