//! The config for a matching engine node.
//!
//! A node is configured from the environment, optionally backed by a toml
//! file. The fields are:
//!
//! - `engine_id` - the id this node registers with the directory under
//! - `bind_address` - the address the gRPC server binds to
//! - `directory_address` - the address of the exchange directory
//! - `authentication_key` - the password clients must present to `RegisterClient`
//! - `directory_credentials` - the password this engine presents to `RegisterME`/`DiscoverME`
//! - `channel_capacity` - the mpsc channel capacity for the engine actor
//! - `peer_rpc_timeout_ms` - bound on every peer-to-peer RPC; elapsing it is
//!   treated the same as the peer reporting no book / failing the request
//!

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const ENGINE_ID: &str = "ENGINE_ID";

pub fn engine_id() -> String {
    std::env::var(ENGINE_ID).unwrap_or_else(|_| "me-0".to_owned())
}

pub const BIND_ADDRESS: &str = "BIND_ADDRESS";

pub const BIND_ADDRESS_DEFAULT_PORT: u16 = 50051;

pub const BIND_ADDRESS_DEFAULT: SocketAddr = SocketAddr::V4(SocketAddrV4::new(
    Ipv4Addr::UNSPECIFIED,
    BIND_ADDRESS_DEFAULT_PORT,
));

fn bind_address() -> SocketAddr {
    std::env::var(BIND_ADDRESS)
        .ok()
        .and_then(|st| {
            st.parse()
                .map_err(|err| {
                    tracing::warn!(?err, "Failed to parse BIND_ADDRESS env var");
                    err
                })
                .ok()
        })
        .unwrap_or(BIND_ADDRESS_DEFAULT)
}

pub const DIRECTORY_ADDRESS: &str = "DIRECTORY_ADDRESS";

#[track_caller]
pub fn directory_address() -> String {
    std::env::var(DIRECTORY_ADDRESS).unwrap_or_else(|_| {
        panic!("DIRECTORY_ADDRESS env var not set");
    })
}

pub const CONFIG_FILE_PATH: &str = "CONFIG_FILE_PATH";

pub fn config_file_path() -> Option<PathBuf> {
    std::env::var(CONFIG_FILE_PATH).ok().map(PathBuf::from)
}

pub const fn default_channel_capacity() -> usize {
    1024
}

fn default_authentication_key() -> String {
    "password".to_owned()
}

fn default_directory_credentials() -> String {
    "password".to_owned()
}

pub const PEER_RPC_TIMEOUT_MS: &str = "PEER_RPC_TIMEOUT_MS";

pub fn peer_rpc_timeout_ms() -> u64 {
    std::env::var(PEER_RPC_TIMEOUT_MS)
        .ok()
        .and_then(|st| {
            st.parse()
                .map_err(|err| {
                    tracing::warn!(?err, "Failed to parse PEER_RPC_TIMEOUT_MS env var");
                    err
                })
                .ok()
        })
        .unwrap_or(500)
}

/// The config for a single matching engine node.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "engine_id")]
    engine_id: String,
    #[serde(default = "bind_address")]
    bind_address: SocketAddr,
    #[serde(default = "directory_address")]
    directory_address: String,
    #[serde(default = "default_channel_capacity")]
    channel_capacity: usize,
    #[serde(default = "default_authentication_key")]
    authentication_key: String,
    #[serde(default = "default_directory_credentials")]
    directory_credentials: String,
    #[serde(default = "peer_rpc_timeout_ms")]
    peer_rpc_timeout_ms: u64,
}

impl Config {
    /// Load the config from the given toml string. Intended for tests.
    #[track_caller]
    pub fn load_from_toml(st: &str) -> Self {
        toml::from_str(st).expect("Failed to parse config file")
    }

    /// Load the config from the environment, optionally overlaid with a toml
    /// file named by `CONFIG_FILE_PATH`.
    #[track_caller]
    pub fn load_from_env() -> Self {
        match config_file_path() {
            Some(path) => {
                let path = path
                    .canonicalize()
                    .expect("Failed to canonicalize config file path");
                let st = std::fs::read_to_string(path).expect("Failed to read config file");
                toml::from_str(&st).expect("Failed to parse config file")
            }
            None => Self {
                engine_id: engine_id(),
                bind_address: bind_address(),
                directory_address: directory_address(),
                channel_capacity: default_channel_capacity(),
                authentication_key: default_authentication_key(),
                directory_credentials: default_directory_credentials(),
                peer_rpc_timeout_ms: peer_rpc_timeout_ms(),
            },
        }
    }

    /// Applies CLI overrides on top of an already-loaded config. `None`
    /// leaves the existing value in place.
    pub fn with_overrides(
        mut self,
        engine_id: Option<String>,
        bind_address: Option<SocketAddr>,
        directory_address: Option<String>,
    ) -> Self {
        if let Some(engine_id) = engine_id {
            self.engine_id = engine_id;
        }
        if let Some(bind_address) = bind_address {
            self.bind_address = bind_address;
        }
        if let Some(directory_address) = directory_address {
            self.directory_address = directory_address;
        }
        self
    }

    pub fn engine_id(&self) -> &str {
        &self.engine_id
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    pub fn directory_address(&self) -> &str {
        &self.directory_address
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    pub fn authentication_key(&self) -> &str {
        &self.authentication_key
    }

    pub fn directory_credentials(&self) -> &str {
        &self.directory_credentials
    }

    pub fn peer_rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_rpc_timeout_ms)
    }
}
