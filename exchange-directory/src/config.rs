//! The config for the exchange directory.
//!
//! - `bind_address` - the address the directory's gRPC server binds to
//! - `client_authentication_key` - the password clients present to `RegisterClient`
//! - `engine_credentials` - the password matching engines present to `RegisterME`/`DiscoverME`
//!

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const BIND_ADDRESS: &str = "BIND_ADDRESS";

pub const BIND_ADDRESS_DEFAULT_PORT: u16 = 50050;

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

pub const CONFIG_FILE_PATH: &str = "CONFIG_FILE_PATH";

pub fn config_file_path() -> Option<PathBuf> {
    std::env::var(CONFIG_FILE_PATH).ok().map(PathBuf::from)
}

fn default_client_authentication_key() -> String {
    "password".to_owned()
}

fn default_engine_credentials() -> String {
    "password".to_owned()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "bind_address")]
    bind_address: SocketAddr,
    #[serde(default = "default_client_authentication_key")]
    client_authentication_key: String,
    #[serde(default = "default_engine_credentials")]
    engine_credentials: String,
}

impl Config {
    #[track_caller]
    pub fn load_from_toml(st: &str) -> Self {
        toml::from_str(st).expect("Failed to parse config file")
    }

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
                bind_address: bind_address(),
                client_authentication_key: default_client_authentication_key(),
                engine_credentials: default_engine_credentials(),
            },
        }
    }

    pub fn with_overrides(mut self, bind_address: Option<SocketAddr>) -> Self {
        if let Some(bind_address) = bind_address {
            self.bind_address = bind_address;
        }
        self
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    pub fn client_authentication_key(&self) -> &str {
        &self.client_authentication_key
    }

    pub fn engine_credentials(&self) -> &str {
        &self.engine_credentials
    }
}
