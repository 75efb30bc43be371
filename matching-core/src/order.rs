use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::ids::{ClientId, EngineAddr, OrderId, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized order side {0:?}, expected \"BUY\" or \"SELL\"")]
pub struct ParseSideError(String);

impl FromStr for Side {
    type Err = ParseSideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(ParseSideError(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
        })
    }
}

/// A resting or in-flight limit order.
///
/// `original_quantity` never changes after construction; `remaining_quantity`
/// monotonically decreases. `seq` is the order's position in this engine's
/// arrival order (assigned once, at the ME's serialization point) and is
/// what time-priority within a price level actually compares — it is
/// unrelated to `timestamp_ns`, which is wall-clock and carried only for
/// the wire contract / observability.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub price: Decimal,
    pub original_quantity: NonZeroU64,
    pub remaining_quantity: u64,
    pub status: OrderStatus,
    pub seq: u64,
    pub timestamp_ns: u64,
    pub client_id: ClientId,
    pub engine_origin_addr: EngineAddr,
}

impl Order {
    /// Applies a fill of `qty` against this order, updating remaining
    /// quantity and status. `qty` must not exceed `remaining_quantity`.
    pub fn apply_fill(&mut self, qty: u64) {
        debug_assert!(qty <= self.remaining_quantity);
        self.remaining_quantity = self.remaining_quantity.saturating_sub(qty);
        self.status = if self.remaining_quantity == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
    }

    pub fn mark_cancelled(&mut self) {
        self.status = OrderStatus::Cancelled;
    }

    pub fn is_resting(&self) -> bool {
        self.remaining_quantity > 0
            && !matches!(self.status, OrderStatus::Filled | OrderStatus::Cancelled)
    }
}
