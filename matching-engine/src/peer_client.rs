//! Persistent gRPC connections to peer matching engines.
//!
//! Each peer address gets one lazily-established [`tonic::transport::Channel`]
//! that is reused for every RPC the engine makes to that peer, mirroring the
//! one-stub-per-peer-address bookkeeping `CancelFairy`/`OrderBookSynchronizer`
//! did on construction.

use std::time::Duration;

use ahash::AHashMap;
use matching_core::EngineAddr;
use matching_proto::MatchingServiceClient;
use tonic::transport::Channel;

#[derive(Debug, Clone, Default)]
pub struct PeerClients {
    stubs: AHashMap<EngineAddr, MatchingServiceClient<Channel>>,
}

impl PeerClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects to every address not already known. Addresses that fail to
    /// connect, or don't answer within `timeout`, are logged and skipped
    /// rather than aborting the whole batch, same as the peer-connect loops
    /// in the original engine.
    pub async fn connect_to_peers(&mut self, addresses: &[EngineAddr], timeout: Duration) {
        for addr in addresses {
            if self.stubs.contains_key(addr) {
                continue;
            }

            match Channel::from_shared(format!("http://{}", addr.as_str())) {
                Ok(endpoint) => match tokio::time::timeout(timeout, endpoint.connect()).await {
                    Ok(Ok(channel)) => {
                        self.stubs
                            .insert(addr.clone(), MatchingServiceClient::new(channel));
                        tracing::info!(peer = %addr, "connected to peer matching engine");
                    }
                    Ok(Err(err)) => {
                        tracing::error!(peer = %addr, %err, "failed to connect to peer");
                    }
                    Err(_elapsed) => {
                        tracing::error!(peer = %addr, "timed out connecting to peer");
                    }
                },
                Err(err) => {
                    tracing::error!(peer = %addr, %err, "invalid peer address");
                }
            }
        }
    }

    pub fn get(&self, addr: &EngineAddr) -> Option<MatchingServiceClient<Channel>> {
        self.stubs.get(addr).cloned()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &EngineAddr> {
        self.stubs.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }
}
