//! Order, Fill, and order-book primitives shared by the matching engine and
//! the cancellation coordinator. Pure data structures — no RPC, no async, no
//! locking: every operation here reports failure via its return value and
//! assumes its caller (the matching-engine actor) is the only thing
//! mutating it at a time.

pub mod active_order_table;
pub mod error;
pub mod fill;
pub mod ids;
pub mod order;
pub mod orderbook;

pub use active_order_table::{ActiveOrderEntry, ActiveOrderTable};
pub use error::CoreError;
pub use fill::Fill;
pub use ids::{ClientId, EngineAddr, OrderId, Symbol};
pub use order::{Order, OrderStatus, Side};
pub use orderbook::{BookSnapshot, Fills, OrderBook, PriceLevelView};
