use rust_decimal::Decimal;

use crate::ids::{ClientId, EngineAddr, OrderId, Symbol};

/// A single leg of a match. Two `Fill`s are produced per trade — one
/// attributed to the incoming (taker) order, one to the resting (maker)
/// order — both carrying the same `fill_id`, `price`, and `quantity`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub fill_id: String,
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub side: crate::order::Side,
    /// The resting order's price — price improvement accrues to the
    /// aggressor, so this is always the maker's price, never the taker's.
    pub price: Decimal,
    pub quantity: u64,
    /// `order_id`'s remaining quantity after this fill was applied.
    pub remaining_quantity: u64,
    pub timestamp_ns: u64,
    pub buyer_id: ClientId,
    pub seller_id: ClientId,
    /// Where the client that should receive this fill record is
    /// registered; set from the *incoming* order's `engine_origin_addr`
    /// for both legs of a trade.
    pub engine_destination_addr: EngineAddr,
}

impl Fill {
    pub fn fill_id(incoming: &OrderId, resting: &OrderId) -> String {
        format!("FILL;incoming:{incoming};resting:{resting}")
    }
}
