use api_client::error::ApiError;
use api_client::{BarSource, StaticBarSource};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use configuration::SchedulerSettings;
use core_types::{Bar, Order, OrderRecord, OrderRequestRecord, OrderSide, OrderStatus, OrderSubmission};
use engine::{Clock, ManualClock, OrderDesk, Scheduler};
use executor::OrderStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use storage::{Bucket, BucketStore, BucketStoreExt, MemoryStore};
use tokio::sync::Notify;

const T0: i64 = 1_700_000_040;

fn at(offset: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(T0 + offset, 0).unwrap()
}

fn bar(offset: i64, low: Decimal, high: Decimal) -> Bar {
    Bar::new(at(offset), high, low, low)
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

struct Harness {
    clock: Arc<ManualClock>,
    source: Arc<StaticBarSource>,
    backing: Arc<dyn BucketStore>,
    scheduler: Scheduler,
}

async fn harness_with(backing: Arc<dyn BucketStore>) -> Harness {
    let clock = Arc::new(ManualClock::new(at(0)));
    let source = Arc::new(StaticBarSource::new());
    let store = OrderStore::load(backing.clone(), clock.now()).await.unwrap();
    let scheduler = Scheduler::new(store, source.clone(), clock.clone(), &SchedulerSettings::default());
    Harness {
        clock,
        source,
        backing,
        scheduler,
    }
}

async fn harness() -> Harness {
    harness_with(Arc::new(MemoryStore::new())).await
}

async fn records(backing: &Arc<dyn BucketStore>, status: OrderStatus) -> Vec<OrderRecord> {
    backing.read(&Bucket::Orders(status)).await.unwrap()
}

async fn find(desk: &OrderDesk, id: &str) -> Option<Order> {
    for status in OrderStatus::ALL {
        if let Some(order) = desk.snapshot(status).await.into_iter().find(|o| o.id() == id) {
            return Some(order);
        }
    }
    None
}

#[tokio::test]
async fn fill_and_stop_loss_can_happen_in_one_tick() {
    let mut h = harness().await;
    let id = h.scheduler.desk().submit(buy("SBER")).await.unwrap();
    h.source.set_bars(
        "SBER",
        vec![
            bar(0, dec!(99), dec!(101)),
            bar(20, dec!(99.4), dec!(100.5)),
            bar(40, dec!(99.3), dec!(100.2)),
        ],
    );

    h.clock.set(at(60));
    let report = h.scheduler.tick().await.unwrap();
    assert_eq!(report.filled, 1);
    assert_eq!(report.stop_loss, 1);
    assert!(report.persisted);

    let closed = records(&h.backing, OrderStatus::SlClosed).await;
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].id, id);
    assert_eq!(closed[0].entry_price, Some(dec!(100)));
    assert_eq!(closed[0].exit_price, Some(dec!(99.5)));
    assert_eq!(closed[0].pnl_percent, Some(dec!(-0.5)));
    assert_eq!(closed[0].closed_at, Some(at(0)));
    assert!(records(&h.backing, OrderStatus::Pending).await.is_empty());
}

#[tokio::test]
async fn orders_progress_across_consecutive_windows() {
    let mut h = harness().await;
    let desk = h.scheduler.desk();
    let id = desk.submit(buy("SBER")).await.unwrap();
    h.source.set_bars(
        "SBER",
        vec![
            bar(0, dec!(99.8), dec!(100.4)),
            bar(60, dec!(99.6), dec!(100.5)),
            bar(120, dec!(99.3), dec!(100.2)),
        ],
    );

    let mut statuses = Vec::new();
    for step in 1..=3 {
        h.clock.set(at(60 * step));
        h.scheduler.tick().await.unwrap();
        assert_eq!(h.scheduler.checkpoint(), Some(at(60 * step)));

        let order = find(&desk, &id).await.unwrap();
        if let Some(entry) = order.entry_price() {
            assert_eq!(entry, dec!(100));
        }
        statuses.push(order.status());
    }
    assert_eq!(statuses, vec![OrderStatus::Filled, OrderStatus::Filled, OrderStatus::SlClosed]);

    let windows: Vec<(DateTime<Utc>, DateTime<Utc>)> = h.source.requests().iter().map(|r| (r.from, r.to)).collect();
    assert_eq!(windows, vec![(at(0), at(60)), (at(60), at(120)), (at(120), at(180))]);
}

#[tokio::test]
async fn ticker_without_bars_is_left_alone() {
    let mut h = harness().await;
    let desk = h.scheduler.desk();
    let id = desk.submit(buy("GAZP")).await.unwrap();

    for step in 1..=2 {
        h.clock.set(at(60 * step));
        let report = h.scheduler.tick().await.unwrap();
        assert_eq!(report.tickers, 1);
        assert_eq!(report.tickers_with_data, 0);
        assert_eq!(report.orders_skipped, 1);
    }
    let order = find(&desk, &id).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Pending);
    assert_eq!(order.entry_price(), None);
    assert_eq!(records(&h.backing, OrderStatus::Pending).await.len(), 1);
}

#[tokio::test]
async fn requests_written_while_running_are_picked_up() {
    let mut h = harness().await;
    let request = OrderRequestRecord {
        id: Some("det-1".to_string()),
        ticker: "LKOH".to_string(),
        limit_price: dec!(100),
        take_profit_price: dec!(98),
        stop_loss_price: dec!(100.5),
        quantity: None,
        created_at: None,
    };
    h.backing
        .overwrite(&Bucket::Requests(OrderSide::Sell), &[request])
        .await
        .unwrap();
    // A bar before the request is seen must not fill it.
    h.source.set_bars(
        "LKOH",
        vec![bar(0, dec!(99.9), dec!(100.1)), bar(90, dec!(97.5), dec!(100.2))],
    );

    h.clock.set(at(60));
    let first = h.scheduler.tick().await.unwrap();
    assert_eq!(first.requests_added, 1);
    assert_eq!(first.filled, 0);

    h.clock.set(at(120));
    let second = h.scheduler.tick().await.unwrap();
    assert_eq!(second.requests_added, 0);
    assert_eq!(second.filled, 1);
    assert_eq!(second.take_profit, 1);

    let closed = records(&h.backing, OrderStatus::TpClosed).await;
    assert_eq!(closed[0].id, "det-1");
    assert_eq!(closed[0].pnl_percent, Some(dec!(2)));
}

struct DownSource;

#[async_trait]
impl BarSource for DownSource {
    async fn fetch(
        &self,
        _tickers: &[String],
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<Bar>>, ApiError> {
        Err(ApiError::InvalidData("exchange closed".to_string()))
    }
}

#[tokio::test]
async fn failed_fetch_still_moves_the_checkpoint() {
    let clock = Arc::new(ManualClock::new(at(0)));
    let backing: Arc<dyn BucketStore> = Arc::new(MemoryStore::new());
    let store = OrderStore::load(backing, clock.now()).await.unwrap();
    let mut scheduler = Scheduler::new(store, Arc::new(DownSource), clock.clone(), &SchedulerSettings::default());
    let id = scheduler.desk().submit(buy("SBER")).await.unwrap();

    clock.set(at(60));
    assert!(scheduler.tick().await.is_err());
    assert_eq!(scheduler.checkpoint(), Some(at(60)));
    assert_eq!(
        find(&scheduler.desk(), &id).await.unwrap().status(),
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn closed_orders_survive_a_restart() {
    let mut h = harness().await;
    h.scheduler.desk().submit(buy("SBER")).await.unwrap();
    h.source.set_bars("SBER", vec![bar(0, dec!(99.9), dec!(102.5))]);
    h.clock.set(at(60));
    let report = h.scheduler.tick().await.unwrap();
    assert_eq!(report.take_profit, 1);

    let mut restarted = harness_with(h.backing.clone()).await;
    let desk = restarted.scheduler.desk();
    assert_eq!(desk.snapshot(OrderStatus::TpClosed).await.len(), 1);
    assert!(desk.snapshot(OrderStatus::Pending).await.is_empty());

    restarted.clock.set(at(120));
    let report = restarted.scheduler.tick().await.unwrap();
    assert_eq!(report.tickers, 0);
    assert_eq!(records(&restarted.backing, OrderStatus::TpClosed).await.len(), 1);
}

#[tokio::test]
async fn run_loop_ticks_and_saves_on_shutdown() {
    let mut h = harness().await;
    h.scheduler.desk().submit(buy("SBER")).await.unwrap();

    h.scheduler
        .run_until(tokio::time::sleep(std::time::Duration::from_millis(50)))
        .await
        .unwrap();

    assert_eq!(h.source.requests().len(), 1);
    assert_eq!(records(&h.backing, OrderStatus::Pending).await.len(), 1);
}

#[tokio::test]
async fn submitted_request_is_watched_from_submission_time() {
    let mut h = harness().await;
    let request = buy("SBER").into_request(at(10));
    let id = request.id.clone().unwrap();
    h.backing
        .append_merge(&Bucket::Requests(OrderSide::Buy), &[request], |r: &OrderRequestRecord| {
            r.order_id(OrderSide::Buy)
        })
        .await
        .unwrap();
    // Published after submission but before the scheduler first reads the bucket.
    h.source.set_bars("SBER", vec![bar(30, dec!(99.8), dec!(100.4))]);

    h.clock.set(at(60));
    let report = h.scheduler.tick().await.unwrap();
    assert_eq!(report.requests_added, 1);
    assert_eq!(report.filled, 1);

    let active = records(&h.backing, OrderStatus::Filled).await;
    assert_eq!(active[0].id, id);
    assert_eq!(active[0].created_at, at(10));
    assert_eq!(active[0].filled_at, Some(at(30)));
}

/// Holds every fetch until released, so a tick can be paused mid-flight.
struct GatedSource {
    entered: Notify,
    release: Notify,
    bars: HashMap<String, Vec<Bar>>,
}

#[async_trait]
impl BarSource for GatedSource {
    async fn fetch(
        &self,
        tickers: &[String],
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<HashMap<String, Vec<Bar>>, ApiError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(tickers
            .iter()
            .filter_map(|t| self.bars.get(t).map(|bars| (t.clone(), bars.clone())))
            .collect())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn submission_during_a_tick_is_not_lost() {
    let clock = Arc::new(ManualClock::new(at(0)));
    let backing: Arc<dyn BucketStore> = Arc::new(MemoryStore::new());
    let source = Arc::new(GatedSource {
        entered: Notify::new(),
        release: Notify::new(),
        bars: HashMap::from([("SBER".to_string(), vec![bar(0, dec!(99), dec!(101))])]),
    });
    let store = OrderStore::load(backing.clone(), clock.now()).await.unwrap();
    let mut scheduler = Scheduler::new(store, source.clone(), clock.clone(), &SchedulerSettings::default());
    let desk = scheduler.desk();
    let first = desk.submit(buy("SBER")).await.unwrap();

    clock.set(at(60));
    let tick = tokio::spawn(async move { scheduler.tick().await.map(|r| r.stop_loss) });
    source.entered.notified().await;

    let late_desk = desk.clone();
    let submit = tokio::spawn(async move { late_desk.submit(buy("GAZP")).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!submit.is_finished(), "submission must wait for the running tick");

    source.release.notify_one();
    assert_eq!(tick.await.unwrap().unwrap(), 1);
    let second = submit.await.unwrap().unwrap();

    let closed = records(&backing, OrderStatus::SlClosed).await;
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].id, first);
    let pending = records(&backing, OrderStatus::Pending).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second);
    assert_eq!(desk.snapshot(OrderStatus::Pending).await.len(), 1);
}
