//! Generated tonic/prost client and server stubs for the matching wire
//! protocol, plus the file descriptor set used for reflection.

pub mod matching {
    tonic::include_proto!("matching");

    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("matching_descriptor");
}

pub use matching::{
    matching_service_client::MatchingServiceClient,
    matching_service_server::{MatchingService, MatchingServiceServer},
    BroadcastOrderbookRequest, BroadcastOrderbookResponse, CancelOrderRequest,
    CancelOrderResponse, ClientRegistrationResponse, DiscoverMeRequest, DiscoverMeResponse, Fill,
    FillRequest, GetOrderbookRequest, GetOrderbookResponse, OrderRequest, PriceLevel,
    PutFillRequest, PutFillResponse, RegisterClientRequest, RegisterMeRequest, RegisterMeResponse,
    SubmitOrderResponse,
};
