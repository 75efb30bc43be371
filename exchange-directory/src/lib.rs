//! The exchange directory: the one process every matching engine registers
//! with on startup and every client's first stop before it knows which
//! engine to talk to.
//!
//! Unlike a matching engine, the directory has no order book to serialize
//! access around — registration and discovery are single, non-blocking
//! operations — so its state sits behind a plain mutex rather than an actor
//! task.

pub mod config;
pub mod grpc_server;

pub use config::Config;
pub use grpc_server::DirectoryServicer;

use std::sync::Mutex;

use ahash::AHashMap;
use matching_core::EngineAddr;
use rand::seq::IteratorRandom;

#[derive(Debug, Clone)]
struct EngineRecord {
    addr: EngineAddr,
}

/// Registered matching engines and the credentials clients and engines
/// authenticate against. `client_authentication_key` gates `RegisterClient`;
/// `engine_credentials` gates `RegisterME`/`DiscoverME`.
pub struct Directory {
    engines: Mutex<AHashMap<String, EngineRecord>>,
    client_authentication_key: String,
    engine_credentials: String,
}

impl Directory {
    pub fn new(client_authentication_key: String, engine_credentials: String) -> Self {
        Self {
            engines: Mutex::new(AHashMap::new()),
            client_authentication_key,
            engine_credentials,
        }
    }

    pub fn authenticate_client(&self, client_id: &str, credential: &str) -> bool {
        let ok = credential == self.client_authentication_key;
        if ok {
            tracing::info!(%client_id, "authenticated client");
        } else {
            tracing::warn!(%client_id, "client failed authentication");
        }
        ok
    }

    pub fn authenticate_engine(&self, engine_id: &str, credential: &str) -> bool {
        let ok = credential == self.engine_credentials;
        if ok {
            tracing::info!(%engine_id, "authenticated matching engine");
        } else {
            tracing::warn!(%engine_id, "matching engine failed authentication");
        }
        ok
    }

    pub fn register_engine(&self, engine_id: String, addr: EngineAddr) {
        let mut engines = self.engines.lock().expect("directory mutex poisoned");
        tracing::info!(%engine_id, %addr, "registered matching engine");
        engines.insert(engine_id, EngineRecord { addr });
    }

    pub fn engine_addresses(&self) -> Vec<String> {
        let engines = self.engines.lock().expect("directory mutex poisoned");
        engines.values().map(|r| r.addr.as_str().to_owned()).collect()
    }

    /// Assigns an incoming client to one of the registered engines.
    ///
    /// The original picked uniformly at random rather than by the client's
    /// advertised `(x, y)` position against each engine's location, despite
    /// storing that position — the distance-based assignment was never
    /// implemented. This keeps the random assignment rather than inventing
    /// a distance metric with no spec behind it; see the design notes.
    pub fn assign_client(&self, _client_x: f64, _client_y: f64) -> Option<EngineAddr> {
        let engines = self.engines.lock().expect("directory mutex poisoned");
        if engines.is_empty() {
            tracing::error!("no matching engines registered");
            return None;
        }

        let mut rng = rand::thread_rng();
        engines.values().choose(&mut rng).map(|r| r.addr.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_client_fails_with_no_engines_registered() {
        let directory = Directory::new("client-key".to_owned(), "engine-key".to_owned());
        assert!(directory.assign_client(0.0, 0.0).is_none());
    }

    #[test]
    fn assign_client_returns_a_registered_engine() {
        let directory = Directory::new("client-key".to_owned(), "engine-key".to_owned());
        directory.register_engine("me-1".to_owned(), EngineAddr::new("127.0.0.1:50051"));
        directory.register_engine("me-2".to_owned(), EngineAddr::new("127.0.0.1:50052"));

        let assigned = directory.assign_client(1.0, 2.0).expect("an engine is registered");
        assert!(
            assigned.as_str() == "127.0.0.1:50051" || assigned.as_str() == "127.0.0.1:50052"
        );
    }

    #[test]
    fn authenticate_client_checks_the_configured_key() {
        let directory = Directory::new("client-key".to_owned(), "engine-key".to_owned());
        assert!(directory.authenticate_client("c1", "client-key"));
        assert!(!directory.authenticate_client("c1", "wrong"));
    }

    #[test]
    fn authenticate_engine_checks_the_configured_key() {
        let directory = Directory::new("client-key".to_owned(), "engine-key".to_owned());
        assert!(directory.authenticate_engine("me-1", "engine-key"));
        assert!(!directory.authenticate_engine("me-1", "wrong"));
    }

    #[test]
    fn engine_addresses_lists_every_registered_engine() {
        let directory = Directory::new("client-key".to_owned(), "engine-key".to_owned());
        directory.register_engine("me-1".to_owned(), EngineAddr::new("127.0.0.1:50051"));
        directory.register_engine("me-2".to_owned(), EngineAddr::new("127.0.0.1:50052"));

        let mut addrs = directory.engine_addresses();
        addrs.sort();
        assert_eq!(addrs, vec!["127.0.0.1:50051", "127.0.0.1:50052"]);
    }
}
