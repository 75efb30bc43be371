//! A single matching engine node.
//!
//! Owns zero or more per-symbol order books behind one actor task
//! ([`engine::spawn`]), exposes them over gRPC ([`grpc_server::MatchingServicer`]),
//! and talks to peer engines ([`peer_client::PeerClients`]) to find the best
//! price for an order ([`synchronizer`]) and to cancel an order that has
//! been routed elsewhere ([`cancellation`]).

pub mod cancellation;
pub mod config;
pub mod engine;
pub mod error;
pub mod grpc_server;
pub mod peer_client;
pub mod synchronizer;
pub mod wire;

pub use config::Config;
pub use engine::{EngineHandle, MatchEngineState};
pub use error::{CancelOrderError, RoutingError, SubmitOrderError};
pub use grpc_server::MatchingServicer;
