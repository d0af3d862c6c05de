use crate::clock::Clock;
use crate::desk::OrderDesk;
use crate::error::EngineError;
use api_client::BarSource;
use chrono::{DateTime, Duration, Utc};
use configuration::SchedulerSettings;
use core_types::OrderStatus;
use executor::{OrderStore, advance};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub requests_added: usize,
    pub tickers: usize,
    pub tickers_with_data: usize,
    pub orders_evaluated: usize,
    pub orders_skipped: usize,
    pub filled: usize,
    pub take_profit: usize,
    pub stop_loss: usize,
    pub persisted: bool,
}

impl TickReport {
    pub fn closed(&self) -> usize {
        self.take_profit + self.stop_loss
    }
}

/// Periodically advances the live orders over the bars published since the
/// previous tick.
pub struct Scheduler {
    store: Arc<Mutex<OrderStore>>,
    source: Arc<dyn BarSource>,
    clock: Arc<dyn Clock>,
    interval: std::time::Duration,
    fallback_lookback: Duration,
    ingest_requests: bool,
    checkpoint: Option<DateTime<Utc>>,
}

impl Scheduler {
    pub fn new(
        store: OrderStore,
        source: Arc<dyn BarSource>,
        clock: Arc<dyn Clock>,
        settings: &SchedulerSettings,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            source,
            clock,
            interval: settings.interval(),
            fallback_lookback: Duration::seconds(settings.fallback_lookback_secs),
            ingest_requests: settings.ingest_requests_each_tick,
            checkpoint: None,
        }
    }

    /// A submission handle that shares this scheduler's order store.
    pub fn desk(&self) -> OrderDesk {
        OrderDesk::new(Arc::clone(&self.store), Arc::clone(&self.clock))
    }

    /// End of the last evaluated window. `None` before the first tick.
    pub fn checkpoint(&self) -> Option<DateTime<Utc>> {
        self.checkpoint
    }

    /// Runs one evaluation cycle.
    ///
    /// Bars are requested for `[checkpoint, now)`, or for the fallback lookback
    /// on the first tick. The checkpoint moves to `now` once the fetch returns,
    /// whatever it returned. Tickers missing from the result are skipped until
    /// the next tick. Only a failure of the whole fetch is returned as an error.
    pub async fn tick(&mut self) -> Result<TickReport, EngineError> {
        let now = self.clock.now();
        let mut report = TickReport::default();
        let mut store = self.store.lock().await;

        if self.ingest_requests {
            match store.sync_requests(now).await {
                Ok(added) => report.requests_added = added,
                Err(e) => tracing::warn!(error = %e, "Could not read the request buckets."),
            }
        }

        let tickers: Vec<String> = store.live_tickers().into_iter().collect();
        report.tickers = tickers.len();
        let from = self.checkpoint.unwrap_or(now - self.fallback_lookback);
        report.from = Some(from);
        report.to = Some(now);

        if tickers.is_empty() {
            self.checkpoint = Some(now);
            report.persisted = persist(&store).await;
            return Ok(report);
        }

        let fetched = self.source.fetch(&tickers, from, now).await;
        self.checkpoint = Some(now);
        let bars = match fetched {
            Ok(bars) => bars,
            Err(e) => {
                tracing::error!(error = %e, %from, to = %now, "Bar fetch failed; orders wait for the next tick.");
                return Err(e.into());
            }
        };
        report.tickers_with_data = bars.len();

        for order in store.live_orders() {
            let Some(ticker_bars) = bars.get(order.ticker()) else {
                tracing::debug!(order_id = %order.id(), ticker = %order.ticker(), "No bars this tick.");
                report.orders_skipped += 1;
                continue;
            };
            report.orders_evaluated += 1;

            let step = advance(order, ticker_bars);
            if !step.changed() {
                continue;
            }
            for event in &step.events {
                tracing::info!(
                    order_id = %event.order_id,
                    ticker = %event.ticker,
                    status = %event.status,
                    price = %event.price,
                    at = %event.at,
                    "Order {}.",
                    event.status
                );
                match event.status {
                    OrderStatus::Filled => report.filled += 1,
                    OrderStatus::TpClosed => report.take_profit += 1,
                    OrderStatus::SlClosed => report.stop_loss += 1,
                    OrderStatus::Pending => {}
                }
            }
            if let Err(e) = store.apply(step.order) {
                tracing::warn!(error = %e, "Order update rejected.");
            }
        }

        report.persisted = persist(&store).await;
        Ok(report)
    }

    /// Ticks every interval until ctrl-c.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Could not listen for ctrl-c; stopping.");
            }
        })
        .await
    }

    /// Ticks every interval until `shutdown` completes, then saves the book once more.
    ///
    /// A tick that overruns the interval delays the next one instead of
    /// triggering a burst. Tick errors are logged and never end the loop.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), EngineError>
    where
        F: Future<Output = ()>,
    {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(interval = ?self.interval, "Scheduler started.");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested.");
                    break;
                }
                _ = timer.tick() => {
                    match self.tick().await {
                        Ok(report) => tracing::info!(
                            tickers = report.tickers,
                            with_data = report.tickers_with_data,
                            evaluated = report.orders_evaluated,
                            filled = report.filled,
                            closed = report.closed(),
                            "Tick complete."
                        ),
                        Err(e) => tracing::error!(error = %e, "Tick failed."),
                    }
                }
            }
        }

        let store = self.store.lock().await;
        store.persist().await?;
        tracing::info!("Scheduler stopped.");
        Ok(())
    }
}

/// Saves the book, logging instead of failing. In-memory state is kept either
/// way and the next tick saves again.
async fn persist(store: &OrderStore) -> bool {
    match store.persist().await {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(error = %e, "Failed to persist orders.");
            false
        }
    }
}
