// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! Raw structs mirror the file, then every value is checked and converted to
//! its typed form. Any invalid field results in a HardValidationError that
//! prevents startup.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AsmError, AsmResult, HardValidationError};
use crate::store::{StoreConfig, DEFAULT_STORE_NAME};
use crate::types::{InstanceSelection, MaxClients, Port, SlotCapacity, DEFAULT_PORT, MAX_INSTANCES};

/// File name looked up along the search path.
pub const CONFIG_FILE_NAME: &str = "asmon.yaml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStoreConfig {
    #[serde(default = "default_store_name")]
    name: String,
    #[serde(default = "default_capacity")]
    capacity: usize,
}

fn default_store_name() -> String {
    DEFAULT_STORE_NAME.to_string()
}

fn default_capacity() -> usize {
    MAX_INSTANCES
}

impl Default for RawStoreConfig {
    fn default() -> Self {
        Self {
            name: default_store_name(),
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawServerConfig {
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_max_clients")]
    max_clients: usize,
    #[serde(default)]
    pid_file: Option<String>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_clients() -> usize {
    1
}

impl Default for RawServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_clients: default_max_clients(),
            pid_file: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClientConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    /// Window index 0..=3; absent means every slot.
    #[serde(default)]
    instance_set: Option<u8>,
    #[serde(default)]
    log_file: Option<String>,
    #[serde(default = "default_interval_secs")]
    interval_secs: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_interval_secs() -> u64 {
    1
}

impl Default for RawClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            instance_set: None,
            log_file: None,
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProducerConfig {
    #[serde(default = "default_prefix_selection")]
    profile_prefix_slot_selection: bool,
    #[serde(default = "default_object_count_intervals")]
    object_count_intervals: [u32; 3],
    #[serde(default = "default_object_count_commands")]
    object_count_commands: [String; 3],
}

fn default_prefix_selection() -> bool {
    true
}

fn default_object_count_intervals() -> [u32; 3] {
    [30, 60, 0]
}

fn default_object_count_commands() -> [String; 3] {
    [
        r#"count entities ""All"";"#.to_string(),
        "count vehicles;".to_string(),
        r#"count allMissionObjects ""All"";"#.to_string(),
    ]
}

impl Default for RawProducerConfig {
    fn default() -> Self {
        Self {
            profile_prefix_slot_selection: default_prefix_selection(),
            object_count_intervals: default_object_count_intervals(),
            object_count_commands: default_object_count_commands(),
        }
    }
}

/// Raw root configuration file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    store: RawStoreConfig,
    #[serde(default)]
    server: RawServerConfig,
    #[serde(default)]
    client: RawClientConfig,
    #[serde(default)]
    producer: RawProducerConfig,
}

/// Validated broadcast server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: Port,
    pub max_clients: MaxClients,
    pub pid_file: Option<PathBuf>,
}

/// Validated polling client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: Port,
    pub selection: InstanceSelection,
    pub log_file: Option<PathBuf>,
    pub interval: Duration,
}

/// Validated producer configuration.
///
/// The object-count intervals and commands are handed back to the game
/// process at init; the monitor never interprets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    pub profile_prefix_slot_selection: bool,
    pub object_count_intervals: [u32; 3],
    pub object_count_commands: [String; 3],
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            profile_prefix_slot_selection: default_prefix_selection(),
            object_count_intervals: default_object_count_intervals(),
            object_count_commands: default_object_count_commands(),
        }
    }
}

/// Complete validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store: StoreConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub producer: ProducerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            server: ServerConfig {
                bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                port: Port::default(),
                max_clients: MaxClients::default(),
                pid_file: None,
            },
            client: ClientConfig {
                host: default_host(),
                port: Port::default(),
                selection: InstanceSelection::All,
                log_file: None,
                interval: Duration::from_secs(default_interval_secs()),
            },
            producer: ProducerConfig::default(),
        }
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    /// Returns HardValidationError for any invalid fields.
    pub fn load_file(path: impl AsRef<Path>) -> AsmResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(AsmError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| AsmError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> AsmResult<Config> {
        if content.trim().is_empty() {
            return Self::validate(RawConfig::default());
        }

        let raw: RawConfig = serde_yaml::from_str(content).map_err(|e| AsmError::ConfigParse {
            message: format!("YAML parse error: {}", e),
        })?;

        Self::validate(raw)
    }

    /// Candidate locations, most specific first.
    ///
    /// A home directory of `/` is skipped so a service account does not pick
    /// up the system file twice under different names.
    pub fn search_paths(home: Option<&Path>) -> Vec<PathBuf> {
        let mut paths = vec![Path::new(".").join(CONFIG_FILE_NAME)];

        if let Some(home) = home.filter(|h| *h != Path::new("/")) {
            paths.push(home.join("etc").join(CONFIG_FILE_NAME));
            paths.push(home.join(format!(".{}", CONFIG_FILE_NAME)));
        }

        paths.push(Path::new("/etc").join(CONFIG_FILE_NAME));
        paths.push(Path::new("/usr/local/etc").join(CONFIG_FILE_NAME));
        paths
    }

    /// First existing file along the search path.
    pub fn discover(home: Option<&Path>) -> Option<PathBuf> {
        Self::search_paths(home).into_iter().find(|p| p.is_file())
    }

    /// Load `explicit` if given, else the first file on the search path,
    /// else built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> AsmResult<Config> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        let home = std::env::var_os("HOME").map(PathBuf::from);
        match Self::discover(home.as_deref()) {
            Some(path) => {
                tracing::info!(path = %path.display(), "Reading settings");
                Self::load_file(path)
            }
            None => {
                tracing::warn!("No {} found, using defaults", CONFIG_FILE_NAME);
                Ok(Config::default())
            }
        }
    }

    /// Validate raw configuration and convert to validated types.
    fn validate(raw: RawConfig) -> AsmResult<Config> {
        Ok(Config {
            store: Self::validate_store(raw.store)?,
            server: Self::validate_server(raw.server)?,
            client: Self::validate_client(raw.client)?,
            producer: Self::validate_producer(raw.producer)?,
        })
    }

    fn validate_store(raw: RawStoreConfig) -> AsmResult<StoreConfig> {
        let name = raw.name.trim_start_matches('/');
        if name.is_empty() || name.contains('/') {
            return Err(HardValidationError::InvalidFieldValue {
                field: "store.name",
                value: raw.name.clone(),
                reason: "Must be a single non-empty path component".to_string(),
            }
            .into());
        }

        Ok(StoreConfig {
            name: name.to_string(),
            capacity: SlotCapacity::new(raw.capacity)?,
        })
    }

    fn validate_server(raw: RawServerConfig) -> AsmResult<ServerConfig> {
        let bind = raw
            .bind
            .parse::<IpAddr>()
            .map_err(|e| HardValidationError::InvalidFieldValue {
                field: "server.bind",
                value: raw.bind.clone(),
                reason: e.to_string(),
            })?;

        Ok(ServerConfig {
            bind,
            port: Port::new(raw.port)?,
            max_clients: MaxClients::new(raw.max_clients)?,
            pid_file: raw.pid_file.map(PathBuf::from),
        })
    }

    fn validate_client(raw: RawClientConfig) -> AsmResult<ClientConfig> {
        if raw.host.trim().is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "client.host",
                value: raw.host,
                reason: "Host cannot be empty".to_string(),
            }
            .into());
        }

        if raw.interval_secs == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "client.interval_secs",
                value: "0".to_string(),
                reason: "Interval must be greater than 0".to_string(),
            }
            .into());
        }

        let selection = match raw.instance_set {
            Some(index) => InstanceSelection::window(index)?,
            None => InstanceSelection::All,
        };

        Ok(ClientConfig {
            host: raw.host,
            port: Port::new(raw.port)?,
            selection,
            log_file: raw.log_file.map(PathBuf::from),
            interval: Duration::from_secs(raw.interval_secs),
        })
    }

    fn validate_producer(raw: RawProducerConfig) -> AsmResult<ProducerConfig> {
        Ok(ProducerConfig {
            profile_prefix_slot_selection: raw.profile_prefix_slot_selection,
            object_count_intervals: raw.object_count_intervals,
            object_count_commands: raw.object_count_commands,
        })
    }
}
