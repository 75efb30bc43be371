//! Cross-engine best-bid/best-offer discovery and order/fill routing.
//!
//! The original synchronizer kept a locally-cached "global best prices" map
//! fed by a best-effort, unordered broadcast queue with a sequence number
//! that was compared but never actually used to reject stale or
//! out-of-order updates. That cache is not trustworthy enough to route
//! orders on, so `lookup_bbo_engine` here never reads it: every routing
//! decision is backed by a live `GetOrderBook` probe of every peer. The
//! broadcast-hint path (`publish_update`) survives only as a fire-and-forget
//! notification peers may use for their own observability; nothing in this
//! crate depends on a peer having received or applied it.
//!
//! Every peer call is bounded by a caller-supplied timeout. A peer that
//! doesn't answer in time is treated exactly like one that answered with an
//! empty book or a transport error: logged and skipped, never awaited
//! indefinitely.

use std::time::Duration;

use ahash::AHashMap;
use rust_decimal::Decimal;

use matching_core::{EngineAddr, Order, OrderBook, Side, Symbol};
use matching_proto as pb;

use crate::error::RoutingError;
use crate::peer_client::PeerClients;
use crate::wire;

/// Best price and the engine quoting it, local engine included. `None` means
/// no engine (including this one) currently has a resting order on that
/// side for the symbol.
pub type BestPrice = Option<(Decimal, EngineAddr)>;

/// Decides which engine should actually execute `order`: this one, or
/// whichever peer currently quotes a better price on the contra side.
/// Returns the local address if no peer beats the order's own limit price,
/// or if the order already originated from a route (never re-route twice).
pub async fn lookup_bbo_engine(
    local_addr: &EngineAddr,
    orderbooks: &mut AHashMap<Symbol, OrderBook>,
    peers: &PeerClients,
    order: &Order,
    timeout: Duration,
) -> EngineAddr {
    let (best_bid, best_ask) =
        global_best_bid_ask(local_addr, orderbooks, peers, &order.symbol, timeout).await;

    match order.side {
        Side::Buy => match best_ask {
            Some((price, addr)) if price < order.price => addr,
            _ => local_addr.clone(),
        },
        Side::Sell => match best_bid {
            Some((price, addr)) if price > order.price => addr,
            _ => local_addr.clone(),
        },
    }
}

/// Probes every peer's order book for `symbol`, folding in the local book,
/// and returns the best bid and best ask across the whole cluster. A peer
/// that times out is treated as if it reported no book at all.
pub async fn global_best_bid_ask(
    local_addr: &EngineAddr,
    orderbooks: &mut AHashMap<Symbol, OrderBook>,
    peers: &PeerClients,
    symbol: &Symbol,
    timeout: Duration,
) -> (BestPrice, BestPrice) {
    let local_snapshot = orderbooks
        .entry(symbol.clone())
        .or_insert_with(|| OrderBook::new(symbol.clone()))
        .snapshot();

    let mut best_bid: BestPrice = local_snapshot.best_bid().map(|p| (p, local_addr.clone()));
    let mut best_ask: BestPrice = local_snapshot.best_ask().map(|p| (p, local_addr.clone()));

    for addr in peers.addresses() {
        let Some(mut stub) = peers.get(addr) else {
            continue;
        };

        let request = pb::GetOrderbookRequest {
            symbol: symbol.as_str().to_owned(),
        };

        match tokio::time::timeout(timeout, stub.get_order_book(request)).await {
            Ok(Ok(resp)) => {
                let resp = resp.into_inner();

                if let Some(level) = resp.bids.first() {
                    if let Ok(price) = wire::decimal_from_wire(&level.price) {
                        let better = match &best_bid {
                            Some((current, _)) => price > *current,
                            None => true,
                        };
                        if better {
                            best_bid = Some((price, addr.clone()));
                        }
                    }
                }

                if let Some(level) = resp.asks.first() {
                    if let Ok(price) = wire::decimal_from_wire(&level.price) {
                        let better = match &best_ask {
                            Some((current, _)) => price < *current,
                            None => true,
                        };
                        if better {
                            best_ask = Some((price, addr.clone()));
                        }
                    }
                }
            }
            Ok(Err(err)) => {
                tracing::error!(peer = %addr, %err, "failed to fetch order book from peer");
            }
            Err(_elapsed) => {
                tracing::warn!(peer = %addr, "get_order_book timed out, treating peer as having no book");
            }
        }
    }

    (best_bid, best_ask)
}

/// Forwards an order to the engine that should actually execute it.
pub async fn route_order(
    peers: &PeerClients,
    order: &Order,
    destination: &EngineAddr,
    timeout: Duration,
) -> Result<(), RoutingError> {
    let Some(mut stub) = peers.get(destination) else {
        return Err(RoutingError::NoConnection {
            destination: destination.clone(),
        });
    };

    let request = wire::order_to_request(order);
    let resp = tokio::time::timeout(timeout, stub.submit_order(request))
        .await
        .map_err(|_| RoutingError::Timeout {
            destination: destination.clone(),
        })?
        .map_err(|source| RoutingError::Rpc {
            destination: destination.clone(),
            source,
        })?
        .into_inner();
    tracing::debug!(order_id = %order.order_id, status = %resp.status, "routed order");
    Ok(())
}

/// Forwards a fill to the engine whose client is actually waiting on it.
pub async fn route_fill(
    peers: &PeerClients,
    fill: &matching_core::Fill,
    client_id: &matching_core::ClientId,
    destination: &EngineAddr,
    timeout: Duration,
) -> Result<(), RoutingError> {
    let Some(mut stub) = peers.get(destination) else {
        return Err(RoutingError::NoConnection {
            destination: destination.clone(),
        });
    };

    let request = pb::PutFillRequest {
        client_id: client_id.as_str().to_owned(),
        fill: Some(wire::fill_to_wire(fill)),
    };
    let resp = tokio::time::timeout(timeout, stub.put_fill(request))
        .await
        .map_err(|_| RoutingError::Timeout {
            destination: destination.clone(),
        })?
        .map_err(|source| RoutingError::Rpc {
            destination: destination.clone(),
            source,
        })?
        .into_inner();
    tracing::debug!(%client_id, destination = %destination, status = %resp.status, "routed fill");
    Ok(())
}

/// Best-effort broadcast of a book update to every known peer. Fire and
/// forget: failures (including timeouts) are logged, not retried, and
/// nothing downstream ever waits on or trusts that a peer applied it.
pub fn publish_update(
    peers: &PeerClients,
    local_addr: &EngineAddr,
    symbol: &Symbol,
    snapshot: &matching_core::BookSnapshot,
    timeout: Duration,
) {
    let request = pb::BroadcastOrderbookRequest {
        symbol: symbol.as_str().to_owned(),
        originating_engine_addr: local_addr.as_str().to_owned(),
        bids: wire::price_levels_to_wire(&snapshot.bids),
        asks: wire::price_levels_to_wire(&snapshot.asks),
    };

    for addr in peers.addresses() {
        let Some(mut stub) = peers.get(addr) else {
            continue;
        };
        let request = request.clone();
        let addr = addr.clone();

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, stub.broadcast_orderbook(request)).await {
                Ok(Err(err)) => {
                    tracing::debug!(peer = %addr, %err, "broadcast orderbook hint failed");
                }
                Err(_elapsed) => {
                    tracing::debug!(peer = %addr, "broadcast orderbook hint timed out");
                }
                Ok(Ok(_)) => {}
            }
        });
    }
}
