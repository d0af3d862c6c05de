use analytics::{PerformanceReport, TradeStatistics, load_closed_trades};
use anyhow::Context;
use api_client::{AlorClient, BarSource, HistoryReplaySource, HistorySource, MoexClient};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{Table, presets::UTF8_FULL};
use configuration::{Config, init_tracing, load_config};
use core_types::{Order, OrderRequestRecord, OrderSide, OrderStatus, OrderSubmission};
use detector::{Detector, Pipeline};
use engine::{Scheduler, SystemClock};
use executor::OrderStore;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use storage::{Bucket, BucketStore, BucketStoreExt, JsonFileStore};

/// The main entry point for the retest application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional overrides from a .env file.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let _log_guard = init_tracing(&config.logging).context("Failed to initialise logging")?;

    let store: Arc<dyn BucketStore> = Arc::new(JsonFileStore::new(config.storage.data_dir.clone()));

    match cli.command {
        Commands::Run => handle_run(&config, store).await,
        Commands::Detect(args) => handle_detect(args, &config, store).await,
        Commands::Submit(args) => handle_submit(args, store).await,
        Commands::Stats(args) => handle_stats(args, store).await,
        Commands::Report => handle_report(store).await,
        Commands::Orders(args) => handle_orders(args, store).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Breakout-retest signal detection and simulated order execution.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path of the TOML configuration file.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the order scheduler until ctrl-c.
    Run,
    /// Refresh history, detect retests and append new order requests.
    Detect(DetectArgs),
    /// Queue a limit order request for the running scheduler.
    ///
    /// The request bucket is read, extended and rewritten without a file lock;
    /// do not run this while `detect` is writing requests, or one side's
    /// append can be lost.
    Submit(SubmitArgs),
    /// Show total and today's closed-trade statistics.
    Stats(StatsArgs),
    /// Show the performance report of the closed trades.
    Report,
    /// List orders, optionally only those in one status.
    Orders(OrdersArgs),
}

#[derive(Parser)]
struct DetectArgs {
    /// Tickers to process (defaults to `detector.tickers`).
    #[arg(long = "ticker")]
    tickers: Vec<String>,

    /// Keep running, repeating every `detector.refresh_secs`.
    #[arg(long)]
    watch: bool,

    /// Use the stored history only; do not download.
    #[arg(long)]
    offline: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for OrderSide {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Buy => OrderSide::Buy,
            SideArg::Sell => OrderSide::Sell,
        }
    }
}

#[derive(Parser)]
struct SubmitArgs {
    #[arg(long, value_enum)]
    side: SideArg,

    #[arg(long)]
    ticker: String,

    #[arg(long)]
    limit: Decimal,

    #[arg(long)]
    take_profit: Decimal,

    #[arg(long)]
    stop_loss: Decimal,

    #[arg(long, default_value_t = 1)]
    quantity: u32,
}

#[derive(Parser)]
struct StatsArgs {
    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct OrdersArgs {
    /// PENDING, FILLED, TP_CLOSED or SL_CLOSED.
    #[arg(long)]
    status: Option<OrderStatus>,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_run(config: &Config, store: Arc<dyn BucketStore>) -> anyhow::Result<()> {
    let source: Arc<dyn BarSource> = if config.bar_source.mock_mode {
        tracing::info!("Mock mode: replaying stored history.");
        Arc::new(HistoryReplaySource::new(Arc::clone(&store)))
    } else {
        Arc::new(MoexClient::new(&config.bar_source).context("Failed to build the MOEX client")?)
    };

    let orders = OrderStore::load(store, Utc::now())
        .await
        .context("Failed to load the order book")?;
    let mut scheduler = Scheduler::new(orders, source, Arc::new(SystemClock), &config.scheduler);
    scheduler.run().await?;
    Ok(())
}

async fn handle_detect(args: DetectArgs, config: &Config, store: Arc<dyn BucketStore>) -> anyhow::Result<()> {
    let tickers = if args.tickers.is_empty() {
        config.detector.tickers.clone()
    } else {
        args.tickers
    };
    if tickers.is_empty() {
        anyhow::bail!("No tickers given; pass --ticker or set detector.tickers");
    }

    let history: Option<Arc<dyn HistorySource>> = if args.offline {
        None
    } else {
        Some(Arc::new(AlorClient::new(&config.history).context("Failed to build the history client")?))
    };
    let detector = Detector::new(&config.detector)?;
    let pipeline = Pipeline::new(detector, store, history, config.history.max_days);

    loop {
        detect_once(&pipeline, &tickers).await?;
        if !args.watch {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(config.detector.refresh_interval()) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested.");
                return Ok(());
            }
        }
    }
}

async fn detect_once(pipeline: &Pipeline, tickers: &[String]) -> anyhow::Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Detecting retests for {} tickers", tickers.len()));

    let summary = pipeline.run_all(tickers, Utc::now()).await;
    spinner.finish_with_message(format!(
        "{} new requests from {} tickers",
        summary.orders_added(),
        summary.runs.len()
    ));

    if !summary.failed.is_empty() {
        eprintln!("Failed tickers: {}", summary.failed.join(", "));
    }
    Ok(())
}

async fn handle_submit(args: SubmitArgs, store: Arc<dyn BucketStore>) -> anyhow::Result<()> {
    let submission = OrderSubmission {
        side: args.side.into(),
        ticker: args.ticker.to_uppercase(),
        limit_price: args.limit,
        take_profit_price: args.take_profit,
        stop_loss_price: args.stop_loss,
        quantity: args.quantity,
    };
    submission.validate()?;

    let side = submission.side;
    let request = submission.into_request(Utc::now());
    let id = request.order_id(side);
    store
        .append_merge(&Bucket::Requests(side), &[request], |r: &OrderRequestRecord| r.order_id(side))
        .await
        .context("Failed to write the request bucket")?;

    println!("{id}");
    Ok(())
}

async fn handle_stats(args: StatsArgs, store: Arc<dyn BucketStore>) -> anyhow::Result<()> {
    let stats = TradeStatistics::load(store.as_ref(), Utc::now()).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Period", "Trades", "PnL %"]);
    table.add_row(vec!["Total".to_string(), stats.total.trades.to_string(), stats.total.pnl_percent.round_dp(2).to_string()]);
    table.add_row(vec!["Today".to_string(), stats.daily.trades.to_string(), stats.daily.pnl_percent.round_dp(2).to_string()]);
    println!("{table}");
    Ok(())
}

fn pct(value: Option<Decimal>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.round_dp(2).to_string())
}

async fn handle_report(store: Arc<dyn BucketStore>) -> anyhow::Result<()> {
    let trades = load_closed_trades(store.as_ref()).await?;
    let report = PerformanceReport::calculate(&trades);

    let mut summary = Table::new();
    summary.load_preset(UTF8_FULL).set_header(vec!["Metric", "Value"]);
    summary.add_row(vec!["Trades".to_string(), report.total_trades.to_string()]);
    summary.add_row(vec!["Wins".to_string(), report.winning_trades.to_string()]);
    summary.add_row(vec!["Losses".to_string(), report.losing_trades.to_string()]);
    summary.add_row(vec!["Win rate %".to_string(), pct(report.win_rate_pct)]);
    summary.add_row(vec!["Total PnL %".to_string(), pct(Some(report.total_pnl_pct))]);
    summary.add_row(vec!["Average PnL %".to_string(), pct(report.average_pnl_pct)]);
    summary.add_row(vec!["Best trade %".to_string(), pct(report.best_trade_pct)]);
    summary.add_row(vec!["Worst trade %".to_string(), pct(report.worst_trade_pct)]);
    summary.add_row(vec!["Max drawdown %".to_string(), pct(Some(report.max_drawdown_pct))]);
    println!("{summary}");

    if !report.monthly.is_empty() {
        let mut monthly = Table::new();
        monthly.load_preset(UTF8_FULL).set_header(vec!["Month", "Trades", "Wins", "PnL %"]);
        for month in &report.monthly {
            monthly.add_row(vec![
                month.month.clone(),
                month.trades.to_string(),
                month.wins.to_string(),
                pct(Some(month.pnl_pct)),
            ]);
        }
        println!("{monthly}");
    }
    Ok(())
}

async fn handle_orders(args: OrdersArgs, store: Arc<dyn BucketStore>) -> anyhow::Result<()> {
    let orders = OrderStore::load(store, Utc::now()).await?;
    let statuses: Vec<OrderStatus> = match args.status {
        Some(status) => vec![status],
        None => OrderStatus::ALL.to_vec(),
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Id", "Ticker", "Side", "Status", "Limit", "TP", "SL", "Entry", "Exit", "PnL %", "Created",
    ]);
    let mut count = 0;
    for status in statuses {
        for order in orders.snapshot(status) {
            table.add_row(order_row(&order));
            count += 1;
        }
    }
    println!("{table}");
    println!("{count} orders");
    Ok(())
}

fn order_row(order: &Order) -> Vec<String> {
    let terms = order.terms();
    vec![
        terms.id.clone(),
        terms.ticker.clone(),
        format!("{:?}", terms.side).to_uppercase(),
        order.status().to_string(),
        terms.limit_price.to_string(),
        terms.take_profit_price.to_string(),
        terms.stop_loss_price.to_string(),
        pct(order.entry_price()),
        pct(order.exit_price()),
        pct(order.pnl_percent()),
        terms.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    ]
}
