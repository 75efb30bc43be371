//! The gRPC surface a matching engine exposes: client-facing RPCs
//! (`RegisterClient`, `SubmitOrder`, `GetFills`, `CancelOrder`) and
//! ME-to-ME RPCs (`GetOrderBook`, `PutFill`, `BroadcastOrderbook`). Every
//! handler does the minimum wire <-> domain translation and then asks the
//! engine actor to do the actual work.

use matching_core::{ClientId, OrderId, Symbol};
use matching_proto as pb;
use tonic::{Request, Response, Status};

use crate::engine::EngineHandle;
use crate::wire;

pub struct MatchingServicer {
    engine: EngineHandle,
}

impl MatchingServicer {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }
}

fn engine_gone() -> Status {
    Status::unavailable("matching engine actor is not running")
}

#[tonic::async_trait]
impl pb::MatchingService for MatchingServicer {
    async fn register_client(
        &self,
        request: Request<pb::RegisterClientRequest>,
    ) -> Result<Response<pb::ClientRegistrationResponse>, Status> {
        let req = request.into_inner();
        let client_id = ClientId::new(req.client_id);

        let ok = self
            .engine
            .register_client(client_id, req.client_authentication)
            .await
            .map_err(|_| engine_gone())?;

        let status = if ok {
            "SUCCESSFUL_AT_ME"
        } else {
            "ME_AUTHENTICATION_FAILED"
        };

        Ok(Response::new(pb::ClientRegistrationResponse {
            status: status.to_owned(),
            match_engine_address: String::new(),
        }))
    }

    async fn submit_order(
        &self,
        request: Request<pb::OrderRequest>,
    ) -> Result<Response<pb::SubmitOrderResponse>, Status> {
        let req = request.into_inner();
        let order_id = req.order_id.clone();

        let order = match wire::order_from_request(&req) {
            Ok(order) => order,
            Err(err) => {
                return Ok(Response::new(pb::SubmitOrderResponse {
                    order_id,
                    status: "ERROR".to_owned(),
                    error_message: err.to_string(),
                }))
            }
        };

        match self.engine.submit_order(order).await {
            Ok(Ok(_fills)) => Ok(Response::new(pb::SubmitOrderResponse {
                order_id,
                status: "SUCCESS".to_owned(),
                error_message: String::new(),
            })),
            Ok(Err(err)) => Ok(Response::new(pb::SubmitOrderResponse {
                order_id,
                status: "ERROR".to_owned(),
                error_message: err.to_string(),
            })),
            Err(_) => Ok(Response::new(pb::SubmitOrderResponse {
                order_id,
                status: "ERROR".to_owned(),
                error_message: "matching engine actor is not running".to_owned(),
            })),
        }
    }

    type GetFillsStream =
        std::pin::Pin<Box<dyn futures::Stream<Item = Result<pb::Fill, Status>> + Send + 'static>>;

    async fn get_fills(
        &self,
        request: Request<pb::FillRequest>,
    ) -> Result<Response<Self::GetFillsStream>, Status> {
        let req = request.into_inner();
        let client_id = ClientId::new(req.client_id);

        let fills = self
            .engine
            .get_fills(client_id)
            .await
            .map_err(|_| engine_gone())?;

        let stream = futures::stream::iter(fills.into_iter().map(|fill| Ok(wire::fill_to_wire(&fill))));
        Ok(Response::new(Box::pin(stream)))
    }

    async fn cancel_order(
        &self,
        request: Request<pb::CancelOrderRequest>,
    ) -> Result<Response<pb::CancelOrderResponse>, Status> {
        let req = request.into_inner();
        let order_id = OrderId::new(req.order_id.clone());
        let client_id = ClientId::new(req.client_id);
        let order_record = req
            .order_record
            .ok_or_else(|| Status::invalid_argument("cancel request missing order_record"))?;

        let (cancelled, quantity_cancelled) = match self
            .engine
            .cancel_order(order_id, client_id, order_record)
            .await
            .map_err(|_| engine_gone())?
        {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(%err, "cancel routing failed");
                (false, 0)
            }
        };

        Ok(Response::new(pb::CancelOrderResponse {
            order_id: req.order_id,
            status: if cancelled { "SUCCESSFUL" } else { "FAILED" }.to_owned(),
            quantity_cancelled,
        }))
    }

    async fn get_order_book(
        &self,
        request: Request<pb::GetOrderbookRequest>,
    ) -> Result<Response<pb::GetOrderbookResponse>, Status> {
        let req = request.into_inner();
        let symbol = Symbol::new(req.symbol.clone());

        let snapshot = self
            .engine
            .get_order_book(symbol)
            .await
            .map_err(|_| engine_gone())?;

        Ok(Response::new(pb::GetOrderbookResponse {
            symbol: req.symbol,
            bids: wire::price_levels_to_wire(&snapshot.bids),
            asks: wire::price_levels_to_wire(&snapshot.asks),
            engine_addr: String::new(),
        }))
    }

    async fn put_fill(
        &self,
        request: Request<pb::PutFillRequest>,
    ) -> Result<Response<pb::PutFillResponse>, Status> {
        let req = request.into_inner();
        let client_id = ClientId::new(req.client_id);

        let Some(fill) = req.fill else {
            return Ok(Response::new(pb::PutFillResponse {
                status: "FAILED: missing fill".to_owned(),
            }));
        };

        let fill = match wire::fill_from_wire(&fill) {
            Ok(fill) => fill,
            Err(err) => {
                return Ok(Response::new(pb::PutFillResponse {
                    status: format!("FAILED: {err}"),
                }))
            }
        };

        self.engine
            .put_fill(client_id, fill)
            .await
            .map_err(|_| engine_gone())?;

        Ok(Response::new(pb::PutFillResponse {
            status: "ACCEPTED".to_owned(),
        }))
    }

    async fn broadcast_orderbook(
        &self,
        request: Request<pb::BroadcastOrderbookRequest>,
    ) -> Result<Response<pb::BroadcastOrderbookResponse>, Status> {
        let req = request.into_inner();
        let symbol = Symbol::new(req.symbol);
        let origin = matching_core::EngineAddr::new(req.originating_engine_addr);

        self.engine
            .broadcast_hint(symbol, origin)
            .await
            .map_err(|_| engine_gone())?;

        Ok(Response::new(pb::BroadcastOrderbookResponse {
            status: "ACKNOWLEDGED".to_owned(),
        }))
    }

    async fn register_me(
        &self,
        _request: Request<pb::RegisterMeRequest>,
    ) -> Result<Response<pb::RegisterMeResponse>, Status> {
        // A matching engine never receives RegisterME — only the directory
        // does. Engines answer it here only because both sides of the
        // cluster share one service definition.
        Err(Status::unimplemented(
            "RegisterME is served by the exchange directory, not a matching engine",
        ))
    }

    async fn discover_me(
        &self,
        _request: Request<pb::DiscoverMeRequest>,
    ) -> Result<Response<pb::DiscoverMeResponse>, Status> {
        Err(Status::unimplemented(
            "DiscoverME is served by the exchange directory, not a matching engine",
        ))
    }
}
