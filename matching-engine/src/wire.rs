//! Conversions between the wire protocol types ([`matching_proto`]) and the
//! in-process domain types ([`matching_core`]).
//!
//! Price crosses the wire as a decimal string rather than a float so it
//! round-trips exactly; everything else is a direct field mapping.

use std::num::NonZeroU64;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use matching_core::{ClientId, EngineAddr, Fill, Order, OrderId, OrderStatus, Side, Symbol};
use matching_proto::{self as pb};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed price {0:?}")]
    MalformedPrice(String),
    #[error("malformed side {0:?}")]
    MalformedSide(String),
    #[error("order quantity must be positive")]
    NonPositiveQuantity,
}

pub fn decimal_from_wire(price: &str) -> Result<Decimal, WireError> {
    Decimal::from_str(price).map_err(|_| WireError::MalformedPrice(price.to_owned()))
}

pub fn decimal_to_wire(price: Decimal) -> String {
    price.to_string()
}

/// Builds a fresh [`Order`] from a client's wire request. `seq` is assigned
/// later, at the point the order is actually posted to a book, so it always
/// reflects arrival order at the book that holds it rather than arrival
/// order at whichever engine first received the request over the wire.
pub fn order_from_request(req: &pb::OrderRequest) -> Result<Order, WireError> {
    let side = Side::from_str(&req.side).map_err(|_| WireError::MalformedSide(req.side.clone()))?;
    let price = decimal_from_wire(&req.price)?;
    let original_quantity =
        NonZeroU64::new(req.quantity).ok_or(WireError::NonPositiveQuantity)?;

    Ok(Order {
        order_id: OrderId::new(req.order_id.clone()),
        symbol: Symbol::new(req.symbol.clone()),
        side,
        price,
        original_quantity,
        remaining_quantity: req.quantity,
        status: OrderStatus::New,
        seq: 0,
        timestamp_ns: req.timestamp.max(0) as u64,
        client_id: ClientId::new(req.client_id.clone()),
        engine_origin_addr: EngineAddr::new(req.engine_origin_addr.clone()),
    })
}

pub fn order_to_request(order: &Order) -> pb::OrderRequest {
    pb::OrderRequest {
        order_id: order.order_id.as_str().to_owned(),
        symbol: order.symbol.as_str().to_owned(),
        side: order.side.to_string(),
        price: decimal_to_wire(order.price),
        quantity: order.original_quantity.get(),
        remaining_quantity: order.remaining_quantity,
        client_id: order.client_id.as_str().to_owned(),
        engine_origin_addr: order.engine_origin_addr.as_str().to_owned(),
        timestamp: order.timestamp_ns as i64,
    }
}

pub fn fill_to_wire(fill: &Fill) -> pb::Fill {
    pb::Fill {
        fill_id: fill.fill_id.clone(),
        order_id: fill.order_id.as_str().to_owned(),
        symbol: fill.symbol.as_str().to_owned(),
        side: fill.side.to_string(),
        price: decimal_to_wire(fill.price),
        quantity: fill.quantity,
        remaining_quantity: fill.remaining_quantity,
        timestamp: fill.timestamp_ns as i64,
        buyer_id: fill.buyer_id.as_str().to_owned(),
        seller_id: fill.seller_id.as_str().to_owned(),
        engine_destination_addr: fill.engine_destination_addr.as_str().to_owned(),
    }
}

pub fn fill_from_wire(fill: &pb::Fill) -> Result<Fill, WireError> {
    let side = Side::from_str(&fill.side).map_err(|_| WireError::MalformedSide(fill.side.clone()))?;
    let price = decimal_from_wire(&fill.price)?;

    Ok(Fill {
        fill_id: fill.fill_id.clone(),
        order_id: OrderId::new(fill.order_id.clone()),
        symbol: Symbol::new(fill.symbol.clone()),
        side,
        price,
        quantity: fill.quantity,
        remaining_quantity: fill.remaining_quantity,
        timestamp_ns: fill.timestamp.max(0) as u64,
        buyer_id: ClientId::new(fill.buyer_id.clone()),
        seller_id: ClientId::new(fill.seller_id.clone()),
        engine_destination_addr: EngineAddr::new(fill.engine_destination_addr.clone()),
    })
}

pub fn price_levels_to_wire(levels: &[matching_core::PriceLevelView]) -> Vec<pb::PriceLevel> {
    levels
        .iter()
        .map(|level| pb::PriceLevel {
            price: decimal_to_wire(level.price),
            aggregate_quantity: level.aggregate_quantity,
            order_count: level.order_count as u32,
        })
        .collect()
}
