//! The matching engine actor.
//!
//! One [`MatchEngineState`] is owned exclusively by one tokio task, driven
//! by an mpsc command channel with a oneshot response channel per request.
//! This is the async generalization of the blocking-thread
//! `trading_engine_loop` pattern: because routing a submitted order or a
//! fill across the network requires awaiting a peer RPC mid-request, the
//! actor has to be an async task rather than a thread parked on
//! `blocking_recv`, but the ownership discipline — exactly one task ever
//! touches the order books, the active-order table, and the fill queues —
//! is the same one that pattern provides.

use std::collections::VecDeque;
use std::time::Duration;

use ahash::{AHashMap, AHashSet};
use matching_core::{
    ActiveOrderEntry, ActiveOrderTable, BookSnapshot, ClientId, EngineAddr, Fill, Order, OrderBook,
    OrderId, Symbol,
};
use tokio::sync::{mpsc, oneshot};

use crate::cancellation;
use crate::error::{CancelOrderError, SubmitOrderError};
use crate::peer_client::PeerClients;
use crate::synchronizer;

/// State touched by every command. Lives entirely inside the actor task;
/// nothing outside this module ever sees a `&mut` to it.
pub struct MatchEngineState {
    pub engine_id: String,
    pub addr: EngineAddr,
    pub authentication_key: String,
    orderbooks: AHashMap<Symbol, OrderBook>,
    active_orders: ActiveOrderTable,
    clients: AHashSet<ClientId>,
    fill_queues: AHashMap<ClientId, VecDeque<Fill>>,
    fill_routing_table: AHashMap<ClientId, EngineAddr>,
    peers: PeerClients,
    peer_rpc_timeout: Duration,
    next_seq: u64,
    num_orders: u64,
    num_fills: u64,
}

impl MatchEngineState {
    pub fn new(
        engine_id: String,
        addr: EngineAddr,
        authentication_key: String,
        peer_rpc_timeout: Duration,
    ) -> Self {
        Self {
            engine_id,
            addr,
            authentication_key,
            orderbooks: AHashMap::new(),
            active_orders: ActiveOrderTable::new(),
            clients: AHashSet::new(),
            fill_queues: AHashMap::new(),
            fill_routing_table: AHashMap::new(),
            peers: PeerClients::new(),
            peer_rpc_timeout,
            next_seq: 0,
            num_orders: 0,
            num_fills: 0,
        }
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn authenticate(&self, credential: &str) -> bool {
        credential == self.authentication_key
    }

    async fn submit_order(
        &mut self,
        mut order: Order,
    ) -> Result<matching_core::Fills, SubmitOrderError> {
        // Single-hop routing invariant: only the engine a client originally
        // submitted to ever probes BBO and routes. An order that arrives
        // here because some other engine already routed it (its
        // `engine_origin_addr` names that other engine, not us) is matched
        // against whatever this book holds right now — it is never routed
        // a second time, and the probe itself is skipped rather than just
        // its result discarded.
        if order.engine_origin_addr == self.addr {
            let best_addr = synchronizer::lookup_bbo_engine(
                &self.addr,
                &mut self.orderbooks,
                &self.peers,
                &order,
                self.peer_rpc_timeout,
            )
            .await;

            if best_addr != self.addr {
                tracing::info!(
                    order_id = %order.order_id,
                    from = %self.addr,
                    to = %best_addr,
                    "routing order to engine with better price"
                );

                // Record the order as living on the peer, then hand it off.
                // This happens unconditionally, before the RPC result is
                // known: if routing fails the order still remains in the
                // active table rather than silently falling back to local
                // matching, per the routing-failure contract.
                self.active_orders.insert(
                    order.order_id.clone(),
                    ActiveOrderEntry {
                        remaining_quantity: order.remaining_quantity,
                        owning_engine_addr: best_addr.clone(),
                        order_record: order.clone(),
                    },
                );

                return synchronizer::route_order(
                    &self.peers,
                    &order,
                    &best_addr,
                    self.peer_rpc_timeout,
                )
                .await
                .map(|()| matching_core::Fills::default())
                .map_err(SubmitOrderError::Routing);
            }
        }

        if order.remaining_quantity != order.original_quantity.get() {
            tracing::warn!(
                order_id = %order.order_id,
                original = order.original_quantity.get(),
                remaining = order.remaining_quantity,
                "order arrived with remaining_quantity != quantity, repairing"
            );
            order.remaining_quantity = order.original_quantity.get();
        }

        self.active_orders.insert(
            order.order_id.clone(),
            ActiveOrderEntry {
                remaining_quantity: order.remaining_quantity,
                owning_engine_addr: self.addr.clone(),
                order_record: order.clone(),
            },
        );
        self.fill_routing_table
            .insert(order.client_id.clone(), order.engine_origin_addr.clone());

        order.seq = self.take_seq();
        let symbol = order.symbol.clone();
        let order_id = order.order_id.clone();

        let fills = if self.active_orders.contains(&order_id) {
            let book = self
                .orderbooks
                .entry(symbol.clone())
                .or_insert_with(|| OrderBook::new(symbol.clone()));
            book.add_order(order, &mut self.active_orders)
        } else {
            matching_core::Fills::default()
        };

        self.num_orders += 1;

        if !fills.is_empty() {
            cancellation::update_active_orders_after_fills(&mut self.active_orders, fills.all());

            for (client_id, fill) in fills.all() {
                if self.clients.contains(client_id) {
                    self.fill_queues
                        .entry(client_id.clone())
                        .or_default()
                        .push_back(fill.clone());
                    self.num_fills += 1;
                } else if let Some(dest) = self.fill_routing_table.get(client_id).cloned() {
                    tracing::debug!(%client_id, destination = %dest, "routing fill for non-local client");
                    if let Err(err) = synchronizer::route_fill(
                        &self.peers,
                        fill,
                        client_id,
                        &dest,
                        self.peer_rpc_timeout,
                    )
                    .await
                    {
                        tracing::error!(%err, "failed to route fill");
                    }
                } else {
                    tracing::error!(
                        %client_id,
                        "client is not registered locally and has no fill routing entry"
                    );
                }
            }

            if let Some(book) = self.orderbooks.get(&symbol) {
                synchronizer::publish_update(
                    &self.peers,
                    &self.addr,
                    &symbol,
                    &book.snapshot(),
                    self.peer_rpc_timeout,
                );
            }
        }

        Ok(fills)
    }

    fn register_client(&mut self, client_id: ClientId) {
        if self.clients.insert(client_id.clone()) {
            self.fill_queues.entry(client_id.clone()).or_default();
            tracing::info!(%client_id, "registered client");
        } else {
            tracing::warn!(%client_id, "attempted duplicate registration of client");
        }
    }

    async fn cancel_order(
        &mut self,
        order_id: OrderId,
        client_id: ClientId,
        order_record: matching_proto::OrderRequest,
    ) -> Result<(bool, u64), CancelOrderError> {
        cancellation::cancel(
            &order_id,
            &client_id,
            &order_record,
            &self.addr,
            &mut self.active_orders,
            &mut self.orderbooks,
            &self.peers,
            self.peer_rpc_timeout,
        )
        .await
    }

    fn order_book_snapshot(&mut self, symbol: &Symbol) -> BookSnapshot {
        self.orderbooks
            .entry(symbol.clone())
            .or_insert_with(|| OrderBook::new(symbol.clone()))
            .snapshot()
    }

    fn drain_fills(&mut self, client_id: &ClientId) -> Vec<Fill> {
        self.fill_queues
            .get_mut(client_id)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }

    fn put_fill(&mut self, client_id: ClientId, fill: Fill) {
        self.fill_queues.entry(client_id).or_default().push_back(fill);
    }

    async fn set_peers(&mut self, peers: Vec<EngineAddr>) {
        self.peers.connect_to_peers(&peers, self.peer_rpc_timeout).await;
    }

    fn apply_broadcast_hint(&mut self, _symbol: Symbol, _origin: EngineAddr) {
        // Deliberately a no-op: the broadcast channel carries no reorder or
        // gap-detection guarantee, so routing decisions never depend on
        // having received one. Kept as a distinct entry point so the RPC
        // handler has something principled to call instead of discarding
        // the update on the floor.
    }
}

pub enum EngineCmd {
    SubmitOrder {
        order: Order,
        response: oneshot::Sender<Result<matching_core::Fills, SubmitOrderError>>,
    },
    RegisterClient {
        client_id: ClientId,
        credential: String,
        response: oneshot::Sender<bool>,
    },
    CancelOrder {
        order_id: OrderId,
        client_id: ClientId,
        order_record: matching_proto::OrderRequest,
        response: oneshot::Sender<Result<(bool, u64), CancelOrderError>>,
    },
    GetOrderBook {
        symbol: Symbol,
        response: oneshot::Sender<BookSnapshot>,
    },
    GetFills {
        client_id: ClientId,
        response: oneshot::Sender<Vec<Fill>>,
    },
    PutFill {
        client_id: ClientId,
        fill: Fill,
        response: oneshot::Sender<()>,
    },
    BroadcastHint {
        symbol: Symbol,
        origin: EngineAddr,
        response: oneshot::Sender<()>,
    },
    SetPeers {
        peers: Vec<EngineAddr>,
        response: oneshot::Sender<()>,
    },
}

#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCmd>,
}

#[derive(Debug, thiserror::Error)]
#[error("matching engine actor is no longer running")]
pub struct EngineGone;

impl EngineHandle {
    pub async fn submit_order(
        &self,
        order: Order,
    ) -> Result<Result<matching_core::Fills, SubmitOrderError>, EngineGone> {
        let (response, rx) = oneshot::channel();
        self.tx
            .send(EngineCmd::SubmitOrder { order, response })
            .await
            .map_err(|_| EngineGone)?;
        rx.await.map_err(|_| EngineGone)
    }

    pub async fn register_client(
        &self,
        client_id: ClientId,
        credential: String,
    ) -> Result<bool, EngineGone> {
        let (response, rx) = oneshot::channel();
        self.tx
            .send(EngineCmd::RegisterClient {
                client_id,
                credential,
                response,
            })
            .await
            .map_err(|_| EngineGone)?;
        rx.await.map_err(|_| EngineGone)
    }

    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        client_id: ClientId,
        order_record: matching_proto::OrderRequest,
    ) -> Result<Result<(bool, u64), CancelOrderError>, EngineGone> {
        let (response, rx) = oneshot::channel();
        self.tx
            .send(EngineCmd::CancelOrder {
                order_id,
                client_id,
                order_record,
                response,
            })
            .await
            .map_err(|_| EngineGone)?;
        rx.await.map_err(|_| EngineGone)
    }

    pub async fn get_order_book(&self, symbol: Symbol) -> Result<BookSnapshot, EngineGone> {
        let (response, rx) = oneshot::channel();
        self.tx
            .send(EngineCmd::GetOrderBook { symbol, response })
            .await
            .map_err(|_| EngineGone)?;
        rx.await.map_err(|_| EngineGone)
    }

    pub async fn get_fills(&self, client_id: ClientId) -> Result<Vec<Fill>, EngineGone> {
        let (response, rx) = oneshot::channel();
        self.tx
            .send(EngineCmd::GetFills { client_id, response })
            .await
            .map_err(|_| EngineGone)?;
        rx.await.map_err(|_| EngineGone)
    }

    pub async fn put_fill(&self, client_id: ClientId, fill: Fill) -> Result<(), EngineGone> {
        let (response, rx) = oneshot::channel();
        self.tx
            .send(EngineCmd::PutFill {
                client_id,
                fill,
                response,
            })
            .await
            .map_err(|_| EngineGone)?;
        rx.await.map_err(|_| EngineGone)
    }

    pub async fn broadcast_hint(
        &self,
        symbol: Symbol,
        origin: EngineAddr,
    ) -> Result<(), EngineGone> {
        let (response, rx) = oneshot::channel();
        self.tx
            .send(EngineCmd::BroadcastHint {
                symbol,
                origin,
                response,
            })
            .await
            .map_err(|_| EngineGone)?;
        rx.await.map_err(|_| EngineGone)
    }

    pub async fn set_peers(&self, peers: Vec<EngineAddr>) -> Result<(), EngineGone> {
        let (response, rx) = oneshot::channel();
        self.tx
            .send(EngineCmd::SetPeers { peers, response })
            .await
            .map_err(|_| EngineGone)?;
        rx.await.map_err(|_| EngineGone)
    }
}

/// Spawns the engine actor task and returns a handle to it, plus the
/// task's join handle so a binary can await clean shutdown.
pub fn spawn(
    state: MatchEngineState,
    channel_capacity: usize,
) -> (EngineHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(channel_capacity);
    let join = tokio::spawn(engine_loop(rx, state));
    (EngineHandle { tx }, join)
}

async fn engine_loop(mut rx: mpsc::Receiver<EngineCmd>, mut state: MatchEngineState) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            EngineCmd::SubmitOrder { order, response } => {
                let result = state.submit_order(order).await;
                let _ = response.send(result);
            }
            EngineCmd::RegisterClient {
                client_id,
                credential,
                response,
            } => {
                let ok = state.authenticate(&credential);
                if ok {
                    state.register_client(client_id);
                }
                let _ = response.send(ok);
            }
            EngineCmd::CancelOrder {
                order_id,
                client_id,
                order_record,
                response,
            } => {
                let result = state.cancel_order(order_id, client_id, order_record).await;
                let _ = response.send(result);
            }
            EngineCmd::GetOrderBook { symbol, response } => {
                let snapshot = state.order_book_snapshot(&symbol);
                let _ = response.send(snapshot);
            }
            EngineCmd::GetFills { client_id, response } => {
                let fills = state.drain_fills(&client_id);
                let _ = response.send(fills);
            }
            EngineCmd::PutFill {
                client_id,
                fill,
                response,
            } => {
                state.put_fill(client_id, fill);
                let _ = response.send(());
            }
            EngineCmd::BroadcastHint {
                symbol,
                origin,
                response,
            } => {
                state.apply_broadcast_hint(symbol, origin);
                let _ = response.send(());
            }
            EngineCmd::SetPeers { peers, response } => {
                state.set_peers(peers).await;
                let _ = response.send(());
            }
        }
    }

    tracing::warn!("matching engine actor loop finished");
}
