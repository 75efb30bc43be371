//! Cancellation: find the order, cancel it locally or forward the request
//! to whichever engine actually owns it.
//!
//! This used to be its own actor (`CancelFairy`) guarding `active_orders`
//! with a per-call `asyncio.Lock()` that never actually excluded concurrent
//! callers. Here the table lives inside the engine actor's exclusively-owned
//! state, so these are plain functions taking `&mut` — the actor task itself
//! is the only exclusion mechanism needed.

use std::time::Duration;

use ahash::AHashMap;
use matching_core::{ActiveOrderTable, ClientId, Fill, OrderBook, OrderId};
use matching_proto as pb;
use tonic::transport::Channel;

use crate::error::{CancelOrderError, RoutingError};
use crate::peer_client::PeerClients;

/// Outcome of a cancel attempt: whether it succeeded, and how much
/// remaining quantity was pulled off the book.
pub type CancelOutcome = (bool, u64);

/// Cancels `order_id` if this engine owns it; otherwise forwards the
/// request to the engine recorded as its owner in `active_orders`.
pub async fn cancel(
    order_id: &OrderId,
    client_id: &ClientId,
    order_record: &pb::OrderRequest,
    local_engine_addr: &matching_core::EngineAddr,
    active_orders: &mut ActiveOrderTable,
    orderbooks: &mut AHashMap<matching_core::Symbol, OrderBook>,
    peers: &PeerClients,
    timeout: Duration,
) -> Result<CancelOutcome, CancelOrderError> {
    let Some(entry) = active_orders.get(order_id) else {
        tracing::warn!(%order_id, "cancel request for an order with no active-order entry");
        return Ok((false, 0));
    };

    if &entry.owning_engine_addr != local_engine_addr {
        let owner = entry.owning_engine_addr.clone();
        tracing::info!(%order_id, owner = %owner, "routing cancel request to owning engine");

        let Some(mut stub) = peers.get(&owner) else {
            return Err(CancelOrderError::Routing(RoutingError::NoConnection {
                destination: owner,
            }));
        };

        return route_cancel(&mut stub, order_id, client_id, order_record, &owner, timeout)
            .await
            .map_err(CancelOrderError::Routing);
    }

    tracing::debug!(%order_id, "cancel handled locally");
    let entry = active_orders.get(order_id).expect("checked above");
    let symbol = entry.order_record.symbol.clone();
    let side = entry.order_record.side;
    let price = entry.order_record.price;

    let Some(book) = orderbooks.get_mut(&symbol) else {
        tracing::warn!(%symbol, "no local orderbook for symbol on cancel");
        return Ok((false, 0));
    };

    let (cancelled, qty) = book.cancel_order(order_id, side, price, active_orders);
    if cancelled {
        active_orders.remove(order_id);
    }
    Ok((cancelled, qty))
}

async fn route_cancel(
    stub: &mut pb::MatchingServiceClient<Channel>,
    order_id: &OrderId,
    client_id: &ClientId,
    order_record: &pb::OrderRequest,
    destination: &matching_core::EngineAddr,
    timeout: Duration,
) -> Result<CancelOutcome, RoutingError> {
    let request = pb::CancelOrderRequest {
        order_id: order_id.as_str().to_owned(),
        client_id: client_id.as_str().to_owned(),
        order_record: Some(order_record.clone()),
    };

    let resp = tokio::time::timeout(timeout, stub.cancel_order(request))
        .await
        .map_err(|_| RoutingError::Timeout {
            destination: destination.clone(),
        })?
        .map_err(|source| RoutingError::Rpc {
            destination: destination.clone(),
            source,
        })?
        .into_inner();
    Ok((resp.status == "SUCCESSFUL", resp.quantity_cancelled))
}

/// Applies each fill's remaining-quantity to the active-order table,
/// dropping entries that reach zero. Run once per batch of fills produced
/// by a single `add_order` call, after matching has already completed.
pub fn update_active_orders_after_fills<'a>(
    active_orders: &mut ActiveOrderTable,
    fills: impl Iterator<Item = &'a (ClientId, Fill)>,
) {
    for (_, fill) in fills {
        if !active_orders.apply_fill_remaining(&fill.order_id, fill.remaining_quantity) {
            tracing::debug!(
                order_id = %fill.order_id,
                "fill referenced an order with no active-order entry (already cancelled or filled)"
            );
        }
    }
}
