use crate::error::ExecutorError;
use chrono::{DateTime, Utc};
use core_types::{CoreError, Order, OrderRecord, OrderRequestRecord, OrderSide, OrderStatus, OrderSubmission, PendingOrder};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use storage::{Bucket, BucketStore, BucketStoreExt};

const SIDES: [OrderSide; 2] = [OrderSide::Buy, OrderSide::Sell];

/// The two side collections, keyed by order id.
///
/// Ids are unique across both sides combined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBook {
    buys: HashMap<String, Order>,
    sells: HashMap<String, Order>,
}

impl OrderBook {
    /// The collection holding `side`'s orders.
    pub fn side(&self, side: OrderSide) -> &HashMap<String, Order> {
        match side {
            OrderSide::Buy => &self.buys,
            OrderSide::Sell => &self.sells,
        }
    }

    fn side_mut(&mut self, side: OrderSide) -> &mut HashMap<String, Order> {
        match side {
            OrderSide::Buy => &mut self.buys,
            OrderSide::Sell => &mut self.sells,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Order> {
        self.buys.get(id).or_else(|| self.sells.get(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.buys.len() + self.sells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.buys.values().chain(self.sells.values())
    }

    /// Inserts a new order into its side collection.
    pub fn insert(&mut self, order: Order) -> Result<(), ExecutorError> {
        if self.contains(order.id()) {
            return Err(ExecutorError::DuplicateOrder(order.id().to_string()));
        }
        self.side_mut(order.side()).insert(order.id().to_string(), order);
        Ok(())
    }

    /// Replaces an order, moving it between sides if the side changed.
    fn replace(&mut self, order: Order) {
        let id = order.id().to_string();
        self.side_mut(order.side().opposite()).remove(&id);
        self.side_mut(order.side()).insert(id, order);
    }
}

/// What one [`OrderStore::persist`] call wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub pending: usize,
    pub active: usize,
    pub take_profit_added: usize,
    pub stop_loss_added: usize,
}

/// The authoritative order collections and their persisted buckets.
pub struct OrderStore {
    store: Arc<dyn BucketStore>,
    book: OrderBook,
}

impl OrderStore {
    /// An empty store. Nothing is read until [`OrderStore::load`] or
    /// [`OrderStore::sync_requests`] is called.
    pub fn new(store: Arc<dyn BucketStore>) -> Self {
        Self {
            store,
            book: OrderBook::default(),
        }
    }

    /// Rebuilds the order book at startup.
    ///
    /// Request buckets seed PENDING orders (side from the bucket, quantity 1
    /// and `now` as creation time when absent). The live and terminal buckets
    /// are then laid over them by id, so an order keeps the furthest state it
    /// reached before the restart. Records missing state fields are defaulted,
    /// never dropped.
    pub async fn load(store: Arc<dyn BucketStore>, now: DateTime<Utc>) -> Result<Self, ExecutorError> {
        let mut this = Self::new(store);

        for side in SIDES {
            let requests: Vec<OrderRequestRecord> = this.store.read(&Bucket::Requests(side)).await?;
            for request in requests {
                let order: Order = PendingOrder::new(request.into_terms(side, now)).into();
                if let Err(e) = this.book.insert(order) {
                    tracing::warn!(bucket = %Bucket::Requests(side), error = %e, "Skipping duplicate request.");
                }
            }
        }
        let seeded = this.book.len();

        let mut restored = 0;
        for bucket in Bucket::order_buckets() {
            let records: Vec<OrderRecord> = this.store.read(&bucket).await?;
            for record in records {
                let missing = record.missing_fields();
                if !missing.is_empty() {
                    tracing::warn!(%bucket, order_id = %record.id, ?missing, "Defaulting incomplete order record.");
                }
                let id = record.id.clone();
                let order = Order::from(record);
                let newer = this
                    .book
                    .get(&id)
                    .is_none_or(|existing| order.status().stage() >= existing.status().stage());
                if newer {
                    this.book.replace(order);
                    restored += 1;
                }
            }
        }

        tracing::info!(seeded, restored, total = this.book.len(), "Order store loaded.");
        Ok(this)
    }

    /// Adds a submitted order as PENDING, created at `now`, and persists.
    /// Returns the new order's id.
    ///
    /// Once the order is in the book the submission has succeeded: a failed
    /// save is logged and left to the next tick's persist.
    pub async fn add(&mut self, submission: OrderSubmission, now: DateTime<Utc>) -> Result<String, ExecutorError> {
        submission.validate()?;
        let order: Order = PendingOrder::new(submission.into_terms(now)).into();
        let id = order.id().to_string();
        tracing::info!(order_id = %id, ticker = %order.ticker(), side = ?order.side(), "Order added.");
        self.book.insert(order)?;
        if let Err(e) = self.persist().await {
            tracing::error!(order_id = %id, error = %e, "Order added but not saved yet.");
        }
        Ok(id)
    }

    /// Adds every request-bucket entry whose id is not yet known as a new
    /// PENDING order. Known ids are left alone. Returns how many were added.
    pub async fn sync_requests(&mut self, now: DateTime<Utc>) -> Result<usize, ExecutorError> {
        let mut added = 0;
        for side in SIDES {
            let requests: Vec<OrderRequestRecord> = self.store.read(&Bucket::Requests(side)).await?;
            for request in requests {
                if self.book.contains(&request.order_id(side)) {
                    continue;
                }
                let order: Order = PendingOrder::new(request.into_terms(side, now)).into();
                tracing::info!(order_id = %order.id(), ticker = %order.ticker(), ?side, "New request picked up.");
                self.book.insert(order)?;
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn get(&self, id: &str) -> Option<&Order> {
        self.book.get(id)
    }

    /// All orders currently in `status`, oldest first.
    pub fn snapshot(&self, status: OrderStatus) -> Vec<Order> {
        let mut orders: Vec<Order> = self.book.iter().filter(|o| o.status() == status).cloned().collect();
        sort_by_creation(&mut orders);
        orders
    }

    /// PENDING and FILLED orders, oldest first.
    pub fn live_orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.book.iter().filter(|o| o.status().is_live()).cloned().collect();
        sort_by_creation(&mut orders);
        orders
    }

    /// Distinct tickers of the live orders.
    pub fn live_tickers(&self) -> BTreeSet<String> {
        self.book
            .iter()
            .filter(|o| o.status().is_live())
            .map(|o| o.ticker().to_string())
            .collect()
    }

    /// Stores the next state of an existing order. Backward moves are refused,
    /// and so is rewriting an order without moving it forward.
    pub fn apply(&mut self, order: Order) -> Result<(), ExecutorError> {
        let current = self
            .book
            .get(order.id())
            .ok_or_else(|| ExecutorError::OrderNotFound(order.id().to_string()))?;

        if current.status() == order.status() {
            if *current != order {
                return Err(ExecutorError::ConflictingUpdate(order.id().to_string()));
            }
            return Ok(());
        }
        if !current.status().can_become(order.status()) {
            return Err(CoreError::InvalidTransition {
                id: order.id().to_string(),
                from: current.status(),
                to: order.status(),
            }
            .into());
        }
        self.book.replace(order);
        Ok(())
    }

    /// Writes the book out.
    ///
    /// The live buckets are overwritten with exactly the current PENDING and
    /// FILLED orders. The terminal buckets only ever grow: closed orders whose
    /// id is not recorded yet are appended, everything already there is kept.
    pub async fn persist(&self) -> Result<PersistReport, ExecutorError> {
        let records = |status| -> Vec<OrderRecord> { self.snapshot(status).iter().map(OrderRecord::from).collect() };

        let pending = records(OrderStatus::Pending);
        self.store.overwrite(&Bucket::Orders(OrderStatus::Pending), &pending).await?;
        let active = records(OrderStatus::Filled);
        self.store.overwrite(&Bucket::Orders(OrderStatus::Filled), &active).await?;

        let mut report = PersistReport {
            pending: pending.len(),
            active: active.len(),
            ..PersistReport::default()
        };
        for status in [OrderStatus::TpClosed, OrderStatus::SlClosed] {
            let closed = records(status);
            let added = self
                .store
                .append_merge(&Bucket::Orders(status), &closed, |r: &OrderRecord| r.id.clone())
                .await?;
            match status {
                OrderStatus::TpClosed => report.take_profit_added = added,
                _ => report.stop_loss_added = added,
            }
        }

        tracing::debug!(?report, "Orders persisted.");
        Ok(report)
    }
}

fn sort_by_creation(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        a.terms()
            .created_at
            .cmp(&b.terms().created_at)
            .then_with(|| a.id().cmp(b.id()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fill::advance;
    use chrono::TimeZone;
    use core_types::Bar;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use async_trait::async_trait;
    use core_types::FilledOrder;
    use serde_json::{Value, json};
    use storage::{MemoryStore, StorageError};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn bar(secs: i64, low: Decimal, high: Decimal) -> Bar {
        Bar::new(at(secs), high, low, low)
    }

    fn buy(ticker: &str) -> OrderSubmission {
        OrderSubmission {
            side: OrderSide::Buy,
            ticker: ticker.to_string(),
            limit_price: dec!(100),
            take_profit_price: dec!(102),
            stop_loss_price: dec!(99.5),
            quantity: 1,
        }
    }

    fn memory() -> Arc<dyn BucketStore> {
        Arc::new(MemoryStore::new())
    }

    fn settle(store: &mut OrderStore, id: &str, bars: &[Bar]) {
        let order = store.get(id).unwrap().clone();
        store.apply(advance(order, bars).order).unwrap();
    }

    #[tokio::test]
    async fn add_persists_a_pending_order() {
        let backing = memory();
        let mut store = OrderStore::new(backing.clone());
        let id = store.add(buy("SBER"), at(0)).await.unwrap();

        assert_eq!(store.snapshot(OrderStatus::Pending).len(), 1);
        let pending: Vec<OrderRecord> = backing.read(&Bucket::Orders(OrderStatus::Pending)).await.unwrap();
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].created_at, at(0));
    }

    #[tokio::test]
    async fn invalid_submission_is_rejected() {
        let mut store = OrderStore::new(memory());
        let mut bad = buy("SBER");
        bad.take_profit_price = dec!(99);
        assert!(matches!(store.add(bad, at(0)).await, Err(ExecutorError::Core(_))));
        assert!(store.book().is_empty());
    }

    #[tokio::test]
    async fn load_seeds_from_legacy_request_buckets() {
        let backing = memory();
        backing
            .overwrite_raw(
                &Bucket::Requests(OrderSide::Buy),
                json!([
                    {"id": "b1", "ticker": "APTK", "priceBuy": 8.3, "takeProfit": 8.47, "stopLoss": 8.25},
                    {"ticker": "APTK", "priceBuy": "oops"}
                ]),
            )
            .await
            .unwrap();
        backing
            .overwrite_raw(
                &Bucket::Requests(OrderSide::Sell),
                json!([{"ticker": "GAZP", "priceSell": 150, "takeProfit": 147, "stopLoss": 150.75, "qty": 3}]),
            )
            .await
            .unwrap();

        let store = OrderStore::load(backing, at(500)).await.unwrap();
        assert_eq!(store.book().len(), 2);

        let b1 = store.get("b1").unwrap();
        assert_eq!(b1.side(), OrderSide::Buy);
        assert_eq!(b1.status(), OrderStatus::Pending);
        assert_eq!(b1.terms().quantity, 1);
        assert_eq!(b1.terms().created_at, at(500));

        assert_eq!(store.book().side(OrderSide::Sell).len(), 1);
        let sell = store.get("SELL-GAZP-150").unwrap();
        assert_eq!(sell.side(), OrderSide::Sell);
        assert_eq!(sell.terms().quantity, 3);
    }

    #[tokio::test]
    async fn duplicate_request_ids_keep_the_first() {
        let backing = memory();
        backing
            .overwrite_raw(
                &Bucket::Requests(OrderSide::Buy),
                json!([{"id": "x", "ticker": "SBER", "limitPrice": 100, "takeProfitPrice": 102, "stopLossPrice": 99.5}]),
            )
            .await
            .unwrap();
        backing
            .overwrite_raw(
                &Bucket::Requests(OrderSide::Sell),
                json!([{"id": "x", "ticker": "SBER", "limitPrice": 100, "takeProfitPrice": 98, "stopLossPrice": 100.5}]),
            )
            .await
            .unwrap();

        let store = OrderStore::load(backing, at(0)).await.unwrap();
        assert_eq!(store.book().len(), 1);
        assert_eq!(store.get("x").unwrap().side(), OrderSide::Buy);
    }

    #[tokio::test]
    async fn restart_keeps_the_furthest_state() {
        let backing = memory();
        backing
            .overwrite_raw(
                &Bucket::Requests(OrderSide::Buy),
                json!([{"id": "a", "ticker": "SBER", "limitPrice": 100, "takeProfitPrice": 102, "stopLossPrice": 99.5}]),
            )
            .await
            .unwrap();

        let mut store = OrderStore::load(backing.clone(), at(0)).await.unwrap();
        let manual = store.add(buy("GAZP"), at(0)).await.unwrap();
        settle(&mut store, "a", &[bar(60, dec!(99.8), dec!(100.2))]);
        store.persist().await.unwrap();

        let reloaded = OrderStore::load(backing, at(9_999)).await.unwrap();
        let a = reloaded.get("a").unwrap();
        assert_eq!(a.status(), OrderStatus::Filled);
        assert_eq!(a.entry_price(), Some(dec!(100)));
        let restored = reloaded.get(&manual).unwrap();
        assert_eq!(restored.status(), OrderStatus::Pending);
        assert_eq!(restored.terms().created_at, at(0));
    }

    #[tokio::test]
    async fn terminal_buckets_only_grow() {
        let backing = memory();
        backing
            .overwrite_raw(
                &Bucket::Orders(OrderStatus::SlClosed),
                json!([{
                    "id": "old", "ticker": "SBER", "side": "BUY", "priceBuy": 100, "takeProfit": 102,
                    "stopLoss": 99.5, "status": "SL_CLOSED", "entryPrice": 100, "exitPrice": 99.5,
                    "pnl": -0.5, "createdAt": 0, "filledAt": 1000, "closedAt": 2000
                }]),
            )
            .await
            .unwrap();

        let mut store = OrderStore::new(backing.clone());
        let id = store.add(buy("SBER"), at(0)).await.unwrap();
        settle(&mut store, &id, &[bar(60, dec!(99), dec!(101))]);

        let first = store.persist().await.unwrap();
        assert_eq!(first.stop_loss_added, 1);
        assert_eq!(first.pending, 0);
        let again = store.persist().await.unwrap();
        assert_eq!(again.stop_loss_added, 0);

        let closed: Vec<OrderRecord> = backing.read(&Bucket::Orders(OrderStatus::SlClosed)).await.unwrap();
        let ids: Vec<&str> = closed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["old", id.as_str()]);
        let pending: Vec<OrderRecord> = backing.read(&Bucket::Orders(OrderStatus::Pending)).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn apply_refuses_to_move_backward() {
        let mut store = OrderStore::new(memory());
        let id = store.add(buy("SBER"), at(0)).await.unwrap();
        let pending = store.get(&id).unwrap().clone();
        settle(&mut store, &id, &[bar(60, dec!(99.8), dec!(100.2))]);

        let err = store.apply(pending).unwrap_err();
        assert!(matches!(err, ExecutorError::Core(CoreError::InvalidTransition { .. })));
        assert_eq!(store.get(&id).unwrap().status(), OrderStatus::Filled);

        let stranger: Order = PendingOrder::new(buy("GAZP").into_terms(at(0))).into();
        assert!(matches!(store.apply(stranger), Err(ExecutorError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn sync_requests_adds_only_unknown_ids() {
        let backing = memory();
        let mut store = OrderStore::load(backing.clone(), at(0)).await.unwrap();
        assert_eq!(store.sync_requests(at(10)).await.unwrap(), 0);

        backing
            .append_merge(&Bucket::Requests(OrderSide::Buy), &[buy("SBER").into_request(at(15))], |r: &OrderRequestRecord| {
                r.ticker.clone()
            })
            .await
            .unwrap();
        assert_eq!(store.sync_requests(at(20)).await.unwrap(), 1);
        assert_eq!(store.sync_requests(at(30)).await.unwrap(), 0);

        let live = store.live_orders();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].terms().created_at, at(15));
        assert_eq!(store.live_tickers().into_iter().collect::<Vec<_>>(), vec!["SBER".to_string()]);
    }

    struct ReadOnlyStore;

    #[async_trait]
    impl BucketStore for ReadOnlyStore {
        async fn read_raw(&self, _bucket: &Bucket) -> Result<Option<Value>, StorageError> {
            Ok(None)
        }

        async fn overwrite_raw(&self, bucket: &Bucket, _value: Value) -> Result<(), StorageError> {
            Err(StorageError::Io {
                path: bucket.path(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }
    }

    #[tokio::test]
    async fn unsaved_add_still_succeeds_once() {
        let mut store = OrderStore::new(Arc::new(ReadOnlyStore));
        let id = store.add(buy("SBER"), at(0)).await.unwrap();

        assert!(store.persist().await.is_err());
        let pending = store.snapshot(OrderStatus::Pending);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id(), id);
    }

    #[tokio::test]
    async fn incomplete_filled_record_stays_filled_after_restart() {
        let backing = memory();
        backing
            .overwrite_raw(
                &Bucket::Requests(OrderSide::Buy),
                json!([{"id": "f", "ticker": "SBER", "limitPrice": 100, "takeProfitPrice": 102, "stopLossPrice": 99.5}]),
            )
            .await
            .unwrap();
        backing
            .overwrite_raw(
                &Bucket::Orders(OrderStatus::Filled),
                json!([{
                    "id": "f", "ticker": "SBER", "side": "BUY", "limitPrice": 100, "takeProfitPrice": 102,
                    "stopLossPrice": 99.5, "status": "FILLED", "createdAt": 1000
                }]),
            )
            .await
            .unwrap();

        let store = OrderStore::load(backing, at(9_999)).await.unwrap();
        let order = store.get("f").unwrap();
        assert_eq!(order.status(), OrderStatus::Filled);
        assert_eq!(order.entry_price(), Some(dec!(100)));
        assert_eq!(store.live_orders().len(), 1);
    }

    #[tokio::test]
    async fn apply_refuses_to_rewrite_a_fill() {
        let mut store = OrderStore::new(memory());
        let id = store.add(buy("SBER"), at(0)).await.unwrap();
        settle(&mut store, &id, &[bar(60, dec!(99.8), dec!(100.2))]);
        let filled = store.get(&id).unwrap().clone();

        let Order::Filled(current) = filled.clone() else { panic!("expected a filled order") };
        let moved: Order = FilledOrder::restore(current.terms().clone(), dec!(100.1), at(120)).into();
        assert!(matches!(store.apply(moved), Err(ExecutorError::ConflictingUpdate(_))));
        assert_eq!(store.get(&id), Some(&filled));

        store.apply(filled.clone()).unwrap();
        assert_eq!(store.get(&id), Some(&filled));
    }
}
