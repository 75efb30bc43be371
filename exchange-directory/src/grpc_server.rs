//! The gRPC surface the directory exposes: `RegisterClient` (assigns a
//! client to an engine), `RegisterME` (a new engine joins the cluster), and
//! `DiscoverME` (an engine asks who else is in the cluster). The remaining
//! `MatchingService` RPCs are engine-to-engine or engine-to-client only —
//! the directory never needs to serve them.

use std::sync::Arc;

use matching_proto as pb;
use tonic::{Request, Response, Status};

use crate::Directory;

pub struct DirectoryServicer {
    directory: Arc<Directory>,
}

impl DirectoryServicer {
    pub fn new(directory: Arc<Directory>) -> Self {
        Self { directory }
    }
}

fn unserved(rpc: &str) -> Status {
    Status::unimplemented(format!("{rpc} is served by a matching engine, not the directory"))
}

#[tonic::async_trait]
impl pb::MatchingService for DirectoryServicer {
    async fn register_client(
        &self,
        request: Request<pb::RegisterClientRequest>,
    ) -> Result<Response<pb::ClientRegistrationResponse>, Status> {
        let req = request.into_inner();

        if !self
            .directory
            .authenticate_client(&req.client_id, &req.client_authentication)
        {
            return Ok(Response::new(pb::ClientRegistrationResponse {
                status: "EXCHANGE_AUTHENTICATION_FAILED".to_owned(),
                match_engine_address: String::new(),
            }));
        }

        match self.directory.assign_client(req.client_x, req.client_y) {
            Some(addr) => Ok(Response::new(pb::ClientRegistrationResponse {
                status: "SUCCESSFUL_AT_EXCHANGE".to_owned(),
                match_engine_address: addr.as_str().to_owned(),
            })),
            None => Ok(Response::new(pb::ClientRegistrationResponse {
                status: "ASSIGNMENT_FAILED".to_owned(),
                match_engine_address: String::new(),
            })),
        }
    }

    async fn submit_order(
        &self,
        _request: Request<pb::OrderRequest>,
    ) -> Result<Response<pb::SubmitOrderResponse>, Status> {
        Err(unserved("SubmitOrder"))
    }

    type GetFillsStream =
        std::pin::Pin<Box<dyn futures::Stream<Item = Result<pb::Fill, Status>> + Send + 'static>>;

    async fn get_fills(
        &self,
        _request: Request<pb::FillRequest>,
    ) -> Result<Response<Self::GetFillsStream>, Status> {
        Err(unserved("GetFills"))
    }

    async fn cancel_order(
        &self,
        _request: Request<pb::CancelOrderRequest>,
    ) -> Result<Response<pb::CancelOrderResponse>, Status> {
        Err(unserved("CancelOrder"))
    }

    async fn get_order_book(
        &self,
        _request: Request<pb::GetOrderbookRequest>,
    ) -> Result<Response<pb::GetOrderbookResponse>, Status> {
        Err(unserved("GetOrderBook"))
    }

    async fn put_fill(
        &self,
        _request: Request<pb::PutFillRequest>,
    ) -> Result<Response<pb::PutFillResponse>, Status> {
        Err(unserved("PutFill"))
    }

    async fn broadcast_orderbook(
        &self,
        _request: Request<pb::BroadcastOrderbookRequest>,
    ) -> Result<Response<pb::BroadcastOrderbookResponse>, Status> {
        Err(unserved("BroadcastOrderbook"))
    }

    async fn register_me(
        &self,
        request: Request<pb::RegisterMeRequest>,
    ) -> Result<Response<pb::RegisterMeResponse>, Status> {
        let req = request.into_inner();

        if !self
            .directory
            .authenticate_engine(&req.engine_id, &req.engine_credentials)
        {
            return Ok(Response::new(pb::RegisterMeResponse {
                status: "FAILURE".to_owned(),
            }));
        }

        self.directory.register_engine(
            req.engine_id,
            matching_core::EngineAddr::new(req.engine_addr),
        );

        Ok(Response::new(pb::RegisterMeResponse {
            status: "SUCCESSFUL".to_owned(),
        }))
    }

    async fn discover_me(
        &self,
        request: Request<pb::DiscoverMeRequest>,
    ) -> Result<Response<pb::DiscoverMeResponse>, Status> {
        let req = request.into_inner();

        if !self
            .directory
            .authenticate_engine(&req.engine_id, &req.engine_credentials)
        {
            return Ok(Response::new(pb::DiscoverMeResponse {
                status: "FAILURE".to_owned(),
                engine_addresses: Vec::new(),
            }));
        }

        Ok(Response::new(pb::DiscoverMeResponse {
            status: "SUCCESSFUL".to_owned(),
            engine_addresses: self.directory.engine_addresses(),
        }))
    }
}
