//! End-to-end scenarios from spec.md §8, driven entirely over real gRPC
//! connections against live `MatchEngine` nodes bound to ephemeral ports —
//! no mocking of the wire layer, same spirit as the teacher's
//! `spawn_trading_engine` actor tests but exercised through the tonic
//! client rather than the in-process channel directly.

use std::time::Duration;

use matching_core::EngineAddr;
use matching_engine::engine::{self, MatchEngineState};
use matching_engine::grpc_server::MatchingServicer;
use matching_proto as pb;
use pb::{MatchingServiceClient, MatchingServiceServer};
use tonic::transport::{Channel, Server};

const AUTH_KEY: &str = "password";

struct TestEngine {
    addr: EngineAddr,
    handle: engine::EngineHandle,
    client: MatchingServiceClient<Channel>,
}

/// Spawns a real `MatchEngine` actor plus a tonic server for it, bound to
/// an OS-assigned port, and returns a connected client. The listener is
/// handed straight to the server rather than rebinding the same address a
/// second time, so there's no bind-race between "find a free port" and
/// "use it".
async fn spawn_engine(engine_id: &str) -> TestEngine {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let local_addr = listener.local_addr().expect("listener has a local addr");
    let addr = EngineAddr::new(local_addr.to_string());

    let state = MatchEngineState::new(
        engine_id.to_owned(),
        addr.clone(),
        AUTH_KEY.to_owned(),
        Duration::from_millis(500),
    );
    let (handle, _join) = engine::spawn(state, 128);
    let servicer = MatchingServicer::new(handle.clone());

    let incoming = futures::stream::unfold(listener, |listener| async move {
        let conn = listener.accept().await.ok()?;
        Some((Ok::<_, std::io::Error>(conn.0), listener))
    });

    tokio::spawn(async move {
        Server::builder()
            .add_service(MatchingServiceServer::new(servicer))
            .serve_with_incoming(incoming)
            .await
            .expect("test matching engine server crashed");
    });

    let client = connect_with_retry(&addr).await;
    TestEngine { addr, handle, client }
}

async fn connect_with_retry(addr: &EngineAddr) -> MatchingServiceClient<Channel> {
    let uri = format!("http://{}", addr.as_str());
    for _ in 0..100 {
        if let Ok(endpoint) = Channel::from_shared(uri.clone()) {
            if let Ok(channel) = endpoint.connect().await {
                return MatchingServiceClient::new(channel);
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out connecting to test engine at {addr}");
}

fn order_request(
    order_id: &str,
    symbol: &str,
    side: &str,
    price: &str,
    qty: u64,
    client_id: &str,
    origin: &EngineAddr,
) -> pb::OrderRequest {
    pb::OrderRequest {
        order_id: order_id.to_owned(),
        symbol: symbol.to_owned(),
        side: side.to_owned(),
        price: price.to_owned(),
        quantity: qty,
        remaining_quantity: qty,
        client_id: client_id.to_owned(),
        engine_origin_addr: origin.as_str().to_owned(),
        timestamp: 0,
    }
}

async fn register_client(client: &mut MatchingServiceClient<Channel>, client_id: &str) {
    let resp = client
        .register_client(pb::RegisterClientRequest {
            client_id: client_id.to_owned(),
            client_authentication: AUTH_KEY.to_owned(),
            client_x: 0.0,
            client_y: 0.0,
        })
        .await
        .expect("register_client rpc")
        .into_inner();
    assert_eq!(resp.status, "SUCCESSFUL_AT_ME");
}

async fn submit(client: &mut MatchingServiceClient<Channel>, req: pb::OrderRequest) -> pb::SubmitOrderResponse {
    client.submit_order(req).await.expect("submit_order rpc").into_inner()
}

async fn drain_fills(client: &mut MatchingServiceClient<Channel>, client_id: &str) -> Vec<pb::Fill> {
    let stream = client
        .get_fills(pb::FillRequest {
            client_id: client_id.to_owned(),
        })
        .await
        .expect("get_fills rpc")
        .into_inner();
    futures::StreamExt::collect::<Vec<_>>(stream)
        .await
        .into_iter()
        .map(|r| r.expect("fill stream item"))
        .collect()
}

async fn book(client: &mut MatchingServiceClient<Channel>, symbol: &str) -> pb::GetOrderbookResponse {
    client
        .get_order_book(pb::GetOrderbookRequest {
            symbol: symbol.to_owned(),
        })
        .await
        .expect("get_order_book rpc")
        .into_inner()
}

#[tokio::test]
async fn scenario_1_single_engine_cross() {
    let mut me = spawn_engine("me-1").await;
    register_client(&mut me.client, "c1").await;

    let a = order_request("A", "AAPL", "BUY", "100.00", 10, "c1", &me.addr);
    assert_eq!(submit(&mut me.client, a).await.status, "SUCCESS");

    let b = order_request("B", "AAPL", "SELL", "100.00", 10, "c1", &me.addr);
    assert_eq!(submit(&mut me.client, b).await.status, "SUCCESS");

    let snap = book(&mut me.client, "AAPL").await;
    assert!(snap.bids.is_empty());
    assert!(snap.asks.is_empty());

    let fills = drain_fills(&mut me.client, "c1").await;
    assert_eq!(fills.len(), 2, "one fill leg reported per side of the trade");
    for fill in &fills {
        assert_eq!(fill.quantity, 10);
        assert_eq!(fill.price, "100.00");
        assert_eq!(fill.remaining_quantity, 0);
    }
}

#[tokio::test]
async fn scenario_2_partial_fill_leaves_remainder_resting() {
    let mut me = spawn_engine("me-1").await;
    register_client(&mut me.client, "c1").await;

    let a = order_request("A", "AAPL", "BUY", "100.00", 10, "c1", &me.addr);
    submit(&mut me.client, a).await;

    let b = order_request("B", "AAPL", "SELL", "100.00", 3, "c1", &me.addr);
    submit(&mut me.client, b).await;

    let snap = book(&mut me.client, "AAPL").await;
    assert_eq!(snap.asks.len(), 0);
    assert_eq!(snap.bids.len(), 1);
    assert_eq!(snap.bids[0].price, "100.00");
    assert_eq!(snap.bids[0].aggregate_quantity, 7);

    let fills = drain_fills(&mut me.client, "c1").await;
    assert!(fills.iter().any(|f| f.order_id == "B" && f.quantity == 3 && f.remaining_quantity == 0));
    assert!(fills.iter().any(|f| f.order_id == "A" && f.quantity == 3 && f.remaining_quantity == 7));
}

#[tokio::test]
async fn scenario_3_price_time_priority() {
    let mut me = spawn_engine("me-1").await;
    register_client(&mut me.client, "ca").await;
    register_client(&mut me.client, "cb").await;
    register_client(&mut me.client, "cc").await;

    let a = order_request("A", "AAPL", "BUY", "100.00", 5, "ca", &me.addr);
    submit(&mut me.client, a).await;
    let b = order_request("B", "AAPL", "BUY", "100.00", 5, "cb", &me.addr);
    submit(&mut me.client, b).await;
    let c = order_request("C", "AAPL", "SELL", "100.00", 5, "cc", &me.addr);
    submit(&mut me.client, c).await;

    // Only A should have matched; B is still fully resting behind it.
    let snap = book(&mut me.client, "AAPL").await;
    assert_eq!(snap.bids.len(), 1);
    assert_eq!(snap.bids[0].aggregate_quantity, 5);

    let fills_a = drain_fills(&mut me.client, "ca").await;
    assert_eq!(fills_a.len(), 1);
    assert_eq!(fills_a[0].order_id, "A");

    let fills_b = drain_fills(&mut me.client, "cb").await;
    assert!(fills_b.is_empty(), "B should not have matched yet");
}

#[tokio::test]
async fn scenario_4_no_cross_posts_both_sides() {
    let mut me = spawn_engine("me-1").await;
    register_client(&mut me.client, "c1").await;

    let a = order_request("A", "AAPL", "BUY", "99.00", 5, "c1", &me.addr);
    submit(&mut me.client, a).await;
    let b = order_request("B", "AAPL", "SELL", "101.00", 5, "c1", &me.addr);
    submit(&mut me.client, b).await;

    let snap = book(&mut me.client, "AAPL").await;
    assert_eq!(snap.bids[0].price, "99.00");
    assert_eq!(snap.bids[0].aggregate_quantity, 5);
    assert_eq!(snap.asks[0].price, "101.00");
    assert_eq!(snap.asks[0].aggregate_quantity, 5);

    let fills = drain_fills(&mut me.client, "c1").await;
    assert!(fills.is_empty());
}

#[tokio::test]
async fn scenario_5_cancel_before_match() {
    let mut me = spawn_engine("me-1").await;
    register_client(&mut me.client, "c1").await;

    let a = order_request("A", "AAPL", "BUY", "100.00", 10, "c1", &me.addr);
    submit(&mut me.client, a.clone()).await;

    let cancel_resp = me
        .client
        .cancel_order(pb::CancelOrderRequest {
            order_id: "A".to_owned(),
            client_id: "c1".to_owned(),
            order_record: Some(a.clone()),
        })
        .await
        .expect("cancel_order rpc")
        .into_inner();
    assert_eq!(cancel_resp.status, "SUCCESSFUL");
    assert_eq!(cancel_resp.quantity_cancelled, 10);

    // A second cancel for the same id is a no-op failure, not an error — the
    // client still carries its own order record, exactly as it did the
    // first time.
    let second = me
        .client
        .cancel_order(pb::CancelOrderRequest {
            order_id: "A".to_owned(),
            client_id: "c1".to_owned(),
            order_record: Some(a),
        })
        .await
        .expect("cancel_order rpc")
        .into_inner();
    assert_eq!(second.status, "FAILED");
    assert_eq!(second.quantity_cancelled, 0);

    let b = order_request("B", "AAPL", "SELL", "100.00", 10, "c1", &me.addr);
    submit(&mut me.client, b).await;

    let snap = book(&mut me.client, "AAPL").await;
    assert!(snap.bids.is_empty());
    assert_eq!(snap.asks[0].price, "100.00");
    assert_eq!(snap.asks[0].aggregate_quantity, 10);
}

#[tokio::test]
async fn scenario_6_cross_engine_routing() {
    let mut e1 = spawn_engine("me-1").await;
    let mut e2 = spawn_engine("me-2").await;

    e1.handle.set_peers(vec![e2.addr.clone()]).await.unwrap();
    e2.handle.set_peers(vec![e1.addr.clone()]).await.unwrap();

    register_client(&mut e1.client, "c1").await;
    register_client(&mut e2.client, "c2").await;

    // Pre-seed a resting SELL on E2 for C2, originating on E2.
    let seed = order_request("B", "AAPL", "SELL", "100.00", 10, "c2", &e2.addr);
    assert_eq!(submit(&mut e2.client, seed).await.status, "SUCCESS");

    // C1 submits a crossing BUY on E1; BBO lookup should find E2's better
    // (lower) ask and route the order there for execution.
    let taker = order_request("A", "AAPL", "BUY", "101.00", 10, "c1", &e1.addr);
    assert_eq!(submit(&mut e1.client, taker).await.status, "SUCCESS");

    // The order matched on E2, not E1: E1's book never saw it rest or fill.
    let e1_book = book(&mut e1.client, "AAPL").await;
    assert!(e1_book.bids.is_empty());
    assert!(e1_book.asks.is_empty());

    let e2_book = book(&mut e2.client, "AAPL").await;
    assert!(e2_book.asks.is_empty(), "B was fully consumed on E2");

    // C1's fill was produced on E2 and routed back to E1 via PutFill.
    let c1_fills = drain_fills(&mut e1.client, "c1").await;
    assert_eq!(c1_fills.len(), 1);
    assert_eq!(c1_fills[0].order_id, "A");
    assert_eq!(c1_fills[0].quantity, 10);
    assert_eq!(c1_fills[0].price, "100.00");
    assert_eq!(c1_fills[0].buyer_id, "c1");
    assert_eq!(c1_fills[0].seller_id, "c2");

    // C2's own fill was produced and enqueued locally on E2.
    let c2_fills = drain_fills(&mut e2.client, "c2").await;
    assert_eq!(c2_fills.len(), 1);
    assert_eq!(c2_fills[0].order_id, "B");
    assert_eq!(c2_fills[0].quantity, 10);
}
