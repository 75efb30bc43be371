use std::collections::{BTreeMap, VecDeque};

use rust_decimal::Decimal;

use crate::active_order_table::ActiveOrderTable;
use crate::fill::Fill;
use crate::ids::{ClientId, OrderId, Symbol};
use crate::order::{Order, Side};

/// Both legs of a match: one fill attributed to the incoming (taker) order,
/// one to the resting (maker) order it traded against. Each fill is paired
/// with the id of the client that should receive it.
#[derive(Debug, Default)]
pub struct Fills {
    pub incoming_fills: Vec<(ClientId, Fill)>,
    pub resting_fills: Vec<(ClientId, Fill)>,
}

impl Fills {
    pub fn is_empty(&self) -> bool {
        self.incoming_fills.is_empty() && self.resting_fills.is_empty()
    }

    pub fn all(&self) -> impl Iterator<Item = &(ClientId, Fill)> {
        self.incoming_fills.iter().chain(self.resting_fills.iter())
    }
}

/// Aggregate view of one price level, as reported over `GetOrderBook`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLevelView {
    pub price: Decimal,
    pub aggregate_quantity: u64,
    pub order_count: usize,
}

/// Snapshot of both sides of a book, best price first on each side.
#[derive(Debug, Clone, Default)]
pub struct BookSnapshot {
    /// Highest price first.
    pub bids: Vec<PriceLevelView>,
    /// Lowest price first.
    pub asks: Vec<PriceLevelView>,
}

impl BookSnapshot {
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }
}

/// A single-symbol price-time priority order book.
///
/// Resting orders are kept in price-indexed `VecDeque`s (FIFO within a
/// level); cancelled orders are *lazily* deleted — they're left in place
/// until matching or cancellation actually walks past them, at which point
/// membership in the caller's [`ActiveOrderTable`] decides whether they're
/// still live. This avoids a linear scan of every price level on every
/// cancel.
pub struct OrderBook {
    pub symbol: Symbol,
    bids: BTreeMap<Decimal, VecDeque<Order>>,
    asks: BTreeMap<Decimal, VecDeque<Order>>,
}

impl OrderBook {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    pub fn snapshot(&self) -> BookSnapshot {
        let bids = self
            .bids
            .iter()
            .rev()
            .map(|(price, orders)| PriceLevelView {
                price: *price,
                aggregate_quantity: orders.iter().map(|o| o.remaining_quantity).sum(),
                order_count: orders.len(),
            })
            .filter(|level| level.aggregate_quantity > 0)
            .collect();

        let asks = self
            .asks
            .iter()
            .map(|(price, orders)| PriceLevelView {
                price: *price,
                aggregate_quantity: orders.iter().map(|o| o.remaining_quantity).sum(),
                order_count: orders.len(),
            })
            .filter(|level| level.aggregate_quantity > 0)
            .collect();

        BookSnapshot { bids, asks }
    }

    fn side_levels(&mut self, side: Side) -> &mut BTreeMap<Decimal, VecDeque<Order>> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Walks the opposite side in price-improving order, matching the
    /// incoming order against resting orders in time priority at each
    /// crossing price, then posts any remainder to the book. Returns the
    /// fill records produced, if any.
    pub fn add_order(&mut self, mut incoming: Order, active_orders: &mut ActiveOrderTable) -> Fills {
        let mut fills = Fills::default();
        let incoming_side = incoming.side;

        let contra_prices: Vec<Decimal> = match incoming_side {
            Side::Buy => self.asks.keys().copied().collect(),
            Side::Sell => self.bids.keys().copied().rev().collect(),
        };

        for price in contra_prices {
            if incoming.remaining_quantity == 0 {
                break;
            }
            let crosses = match incoming_side {
                Side::Buy => price <= incoming.price,
                Side::Sell => price >= incoming.price,
            };
            if !crosses {
                break;
            }

            self.match_at_price(&mut incoming, incoming_side, price, active_orders, &mut fills);
        }

        if incoming.remaining_quantity > 0 {
            let side = incoming.side;
            let price = incoming.price;
            self.side_levels(side).entry(price).or_default().push_back(incoming);
        }

        fills
    }

    fn match_at_price(
        &mut self,
        incoming: &mut Order,
        incoming_side: Side,
        price: Decimal,
        active_orders: &mut ActiveOrderTable,
        fills: &mut Fills,
    ) {
        let contra_side = incoming_side.opposite();
        let levels = self.side_levels(contra_side);
        let Some(level) = levels.get_mut(&price) else {
            return;
        };

        // Walk the level front-to-back (time priority), lazily dropping
        // any resting order no longer present in the active-order table.
        while let Some(resting) = level.front() {
            if !active_orders.contains(&resting.order_id) {
                level.pop_front();
                continue;
            }

            if incoming.remaining_quantity == 0 {
                break;
            }

            let mut resting = level.pop_front().expect("checked front above");
            let fill_qty = incoming.remaining_quantity.min(resting.remaining_quantity);

            incoming.apply_fill(fill_qty);
            resting.apply_fill(fill_qty);

            let fill_id = Fill::fill_id(&incoming.order_id, &resting.order_id);
            let (buyer_id, seller_id) = match incoming_side {
                Side::Buy => (incoming.client_id.clone(), resting.client_id.clone()),
                Side::Sell => (resting.client_id.clone(), incoming.client_id.clone()),
            };

            fills.incoming_fills.push((
                incoming.client_id.clone(),
                Fill {
                    fill_id: fill_id.clone(),
                    order_id: incoming.order_id.clone(),
                    symbol: self.symbol.clone(),
                    side: incoming.side,
                    price,
                    quantity: fill_qty,
                    remaining_quantity: incoming.remaining_quantity,
                    timestamp_ns: incoming.timestamp_ns,
                    buyer_id: buyer_id.clone(),
                    seller_id: seller_id.clone(),
                    engine_destination_addr: incoming.engine_origin_addr.clone(),
                },
            ));

            fills.resting_fills.push((
                resting.client_id.clone(),
                Fill {
                    fill_id,
                    order_id: resting.order_id.clone(),
                    symbol: self.symbol.clone(),
                    side: resting.side,
                    price,
                    quantity: fill_qty,
                    remaining_quantity: resting.remaining_quantity,
                    timestamp_ns: resting.timestamp_ns,
                    buyer_id,
                    seller_id,
                    engine_destination_addr: incoming.engine_origin_addr.clone(),
                },
            ));

            if resting.remaining_quantity == 0 {
                active_orders.remove(&resting.order_id);
                // already popped from the level above.
            } else {
                level.push_front(resting);
                break;
            }

            if incoming.remaining_quantity == 0 {
                active_orders.remove(&incoming.order_id);
                break;
            }
        }

        if level.is_empty() {
            levels.remove(&price);
        }
    }

    /// Locates the resting order at `(price, side)` by id and removes it.
    /// Returns `(false, 0)` if the id is unknown to `active_orders`, or if
    /// it's known but not actually resting in the book (already filled, or
    /// not yet posted).
    pub fn cancel_order(
        &mut self,
        order_id: &OrderId,
        side: Side,
        price: Decimal,
        active_orders: &ActiveOrderTable,
    ) -> (bool, u64) {
        if !active_orders.contains(order_id) {
            return (false, 0);
        }

        let levels = self.side_levels(side);
        let Some(level) = levels.get_mut(&price) else {
            return (false, 0);
        };

        let Some(index) = level.iter().position(|o| &o.order_id == order_id) else {
            return (false, 0);
        };

        let removed = level.remove(index).expect("checked index");
        if level.is_empty() {
            levels.remove(&price);
        }

        (true, removed.remaining_quantity)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::active_order_table::ActiveOrderEntry;

    fn order(id: &str, side: Side, price: rust_decimal::Decimal, qty: u64, seq: u64) -> Order {
        Order {
            order_id: OrderId::new(id),
            symbol: Symbol::new("AAPL"),
            side,
            price,
            original_quantity: std::num::NonZeroU64::new(qty).unwrap(),
            remaining_quantity: qty,
            status: crate::order::OrderStatus::New,
            seq,
            timestamp_ns: seq,
            client_id: ClientId::new(format!("client-of-{id}")),
            engine_origin_addr: crate::ids::EngineAddr::new("me-1:50051"),
        }
    }

    fn live(table: &mut ActiveOrderTable, o: &Order) {
        table.insert(
            o.order_id.clone(),
            ActiveOrderEntry {
                remaining_quantity: o.remaining_quantity,
                owning_engine_addr: o.engine_origin_addr.clone(),
                order_record: o.clone(),
            },
        );
    }

    #[test]
    fn single_engine_cross_fills_exactly() {
        let mut book = OrderBook::new(Symbol::new("AAPL"));
        let mut table = ActiveOrderTable::new();

        let a = order("A", Side::Buy, dec!(100), 10, 0);
        live(&mut table, &a);
        let fills = book.add_order(a, &mut table);
        assert!(fills.is_empty());

        let b = order("B", Side::Sell, dec!(100), 10, 1);
        live(&mut table, &b);
        let fills = book.add_order(b, &mut table);

        assert_eq!(fills.incoming_fills.len(), 1);
        assert_eq!(fills.resting_fills.len(), 1);
        let (_, incoming_fill) = &fills.incoming_fills[0];
        assert_eq!(incoming_fill.quantity, 10);
        assert_eq!(incoming_fill.price, dec!(100));
        assert_eq!(incoming_fill.buyer_id, ClientId::new("client-of-A"));
        assert_eq!(incoming_fill.seller_id, ClientId::new("client-of-B"));
        assert_ne!(incoming_fill.buyer_id, incoming_fill.seller_id);

        // Both orders fully filled and removed by the book itself.
        assert!(!table.contains(&OrderId::new("A")));
        assert!(!table.contains(&OrderId::new("B")));
        let snap = book.snapshot();
        assert!(snap.bids.is_empty());
        assert!(snap.asks.is_empty());
    }

    #[test]
    fn partial_fill_leaves_remainder_resting() {
        let mut book = OrderBook::new(Symbol::new("AAPL"));
        let mut table = ActiveOrderTable::new();

        let a = order("A", Side::Buy, dec!(100), 10, 0);
        live(&mut table, &a);
        book.add_order(a, &mut table);

        let b = order("B", Side::Sell, dec!(100), 3, 1);
        live(&mut table, &b);
        let fills = book.add_order(b, &mut table);

        let (_, resting_fill) = &fills.incoming_fills[0];
        assert_eq!(resting_fill.quantity, 3);

        // B is fully filled and gone; A still rests with 7 remaining.
        assert!(!table.contains(&OrderId::new("B")));
        table.apply_fill_remaining(&OrderId::new("A"), 7);

        let snap = book.snapshot();
        assert_eq!(snap.bids.len(), 1);
        assert_eq!(snap.bids[0].aggregate_quantity, 7);
        assert_eq!(snap.asks.len(), 0);
    }

    #[test]
    fn time_priority_fills_earlier_order_first() {
        let mut book = OrderBook::new(Symbol::new("AAPL"));
        let mut table = ActiveOrderTable::new();

        let a = order("A", Side::Buy, dec!(100), 5, 0);
        live(&mut table, &a);
        book.add_order(a, &mut table);

        let b = order("B", Side::Buy, dec!(100), 5, 1);
        live(&mut table, &b);
        book.add_order(b, &mut table);

        let c = order("C", Side::Sell, dec!(100), 5, 2);
        live(&mut table, &c);
        let fills = book.add_order(c, &mut table);

        // The sole resting-side fill should be against A (the earlier bid),
        // leaving B still fully resting.
        let resting_order_ids: Vec<_> = fills
            .resting_fills
            .iter()
            .map(|(_, f)| f.order_id.clone())
            .collect();
        assert_eq!(resting_order_ids, vec![OrderId::new("A")]);
        assert!(!table.contains(&OrderId::new("A")));
        assert!(table.contains(&OrderId::new("B")));

        let snap = book.snapshot();
        assert_eq!(snap.bids[0].aggregate_quantity, 5); // B still resting
    }

    #[test]
    fn no_cross_posts_both_sides() {
        let mut book = OrderBook::new(Symbol::new("AAPL"));
        let mut table = ActiveOrderTable::new();

        let a = order("A", Side::Buy, dec!(99), 5, 0);
        live(&mut table, &a);
        let fills = book.add_order(a, &mut table);
        assert!(fills.is_empty());

        let b = order("B", Side::Sell, dec!(101), 5, 1);
        live(&mut table, &b);
        let fills = book.add_order(b, &mut table);
        assert!(fills.is_empty());

        let snap = book.snapshot();
        assert_eq!(snap.best_bid(), Some(dec!(99)));
        assert_eq!(snap.best_ask(), Some(dec!(101)));
    }

    #[test]
    fn cancel_before_match_then_no_fill_on_cross() {
        let mut book = OrderBook::new(Symbol::new("AAPL"));
        let mut table = ActiveOrderTable::new();

        let a = order("A", Side::Buy, dec!(100), 10, 0);
        live(&mut table, &a);
        book.add_order(a, &mut table);

        let (cancelled, qty) =
            book.cancel_order(&OrderId::new("A"), Side::Buy, dec!(100), &table);
        assert!(cancelled);
        assert_eq!(qty, 10);
        table.remove(&OrderId::new("A"));

        let b = order("B", Side::Sell, dec!(100), 10, 1);
        live(&mut table, &b);
        let fills = book.add_order(b, &mut table);
        assert!(fills.is_empty());

        let snap = book.snapshot();
        assert_eq!(snap.best_ask(), Some(dec!(100)));
    }

    #[test]
    fn idempotent_cancel_second_attempt_fails_without_mutation() {
        let mut book = OrderBook::new(Symbol::new("AAPL"));
        let mut table = ActiveOrderTable::new();

        let a = order("A", Side::Buy, dec!(100), 10, 0);
        live(&mut table, &a);
        book.add_order(a, &mut table);

        let (first, qty) = book.cancel_order(&OrderId::new("A"), Side::Buy, dec!(100), &table);
        assert!(first);
        assert_eq!(qty, 10);
        table.remove(&OrderId::new("A"));

        let (second, qty2) = book.cancel_order(&OrderId::new("A"), Side::Buy, dec!(100), &table);
        assert!(!second);
        assert_eq!(qty2, 0);
    }

    #[test]
    fn lazily_deleted_resting_order_is_skipped_not_matched() {
        let mut book = OrderBook::new(Symbol::new("AAPL"));
        let mut table = ActiveOrderTable::new();

        let a = order("A", Side::Buy, dec!(100), 10, 0);
        live(&mut table, &a);
        book.add_order(a, &mut table);

        // Cancel A via the table only (simulating the coordinator racing
        // ahead of the book, which is how lazy deletion is meant to work).
        table.remove(&OrderId::new("A"));

        let b = order("B", Side::Sell, dec!(100), 10, 1);
        live(&mut table, &b);
        let fills = book.add_order(b, &mut table);

        assert!(fills.is_empty());
        // B posted to the book untouched; A was dropped, not matched.
        let snap = book.snapshot();
        assert_eq!(snap.best_ask(), Some(dec!(100)));
        assert_eq!(snap.bids.len(), 0);
    }

    #[test]
    fn no_self_match_buyer_never_equals_seller() {
        let mut book = OrderBook::new(Symbol::new("AAPL"));
        let mut table = ActiveOrderTable::new();

        let mut a = order("A", Side::Buy, dec!(100), 10, 0);
        a.client_id = ClientId::new("same-client");
        live(&mut table, &a);
        book.add_order(a, &mut table);

        let mut b = order("B", Side::Sell, dec!(100), 10, 1);
        b.client_id = ClientId::new("same-client");
        live(&mut table, &b);
        let fills = book.add_order(b, &mut table);

        // The book itself has no self-trade-prevention — it matches
        // whatever is resting. The invariant this test protects is that
        // buyer/seller attribution always reflects side, not that the
        // system forbids self-trading (out of scope per the spec).
        let (_, f) = &fills.incoming_fills[0];
        assert_eq!(f.buyer_id, ClientId::new("same-client"));
        assert_eq!(f.seller_id, ClientId::new("same-client"));
    }
}
