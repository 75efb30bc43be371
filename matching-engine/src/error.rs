//! Errors that cross the actor boundary back to a gRPC handler.
//!
//! Everything here is a normal, expected outcome from the caller's point of
//! view (a peer was unreachable, a peer timed out, a peer rejected the
//! request) rather than a bug — `grpc_server.rs` turns these into the
//! wire-contract's own `status`/`error_message` fields, never into a
//! `tonic::Status` the way an actor-gone condition is.

use matching_core::EngineAddr;
use thiserror::Error;

/// A peer RPC made while routing an order or a fill did not succeed.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no connection to {destination}")]
    NoConnection { destination: EngineAddr },
    #[error("request to {destination} timed out")]
    Timeout { destination: EngineAddr },
    #[error("request to {destination} failed: {source}")]
    Rpc {
        destination: EngineAddr,
        #[source]
        source: tonic::Status,
    },
}

/// Why `submit_order` could not be completed.
#[derive(Debug, Error)]
pub enum SubmitOrderError {
    #[error("failed to route order to the engine quoting the better price: {0}")]
    Routing(#[from] RoutingError),
}

/// Why `cancel_order` could not be completed.
#[derive(Debug, Error)]
pub enum CancelOrderError {
    #[error("failed to forward cancel request to owning engine: {0}")]
    Routing(#[from] RoutingError),
}
