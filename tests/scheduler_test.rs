use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use multichain_portfolio::providers::mock::{StaticBalanceProvider, StaticBitcoinProvider, StaticPriceProvider};
use multichain_portfolio::{
    AggregationInput, AssetKey, PortfolioAggregator, PortfolioDiff, PortfolioError, PortfolioEventHandler, PortfolioSnapshot,
    RefreshScheduler, SchedulerConfig, TokenRegistry,
};
use tokio::sync::Notify;

const ALICE: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
const BOB: &str = "0x8617E340B3D01FA5F11F306F4090FD50E238070D";

#[derive(Default)]
struct RecordingHandler {
    generations: Mutex<Vec<u64>>,
    errors: Mutex<Vec<PortfolioError>>,
}

#[async_trait]
impl PortfolioEventHandler for RecordingHandler {
    async fn handle_snapshot(&self, snapshot: &PortfolioSnapshot, _diff: &PortfolioDiff) {
        self.generations.lock().unwrap().push(snapshot.generation);
    }

    async fn handle_error(&self, error: &PortfolioError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}

fn input(wallet: &str) -> AggregationInput {
    AggregationInput::new(1, vec![wallet.to_string()], &TokenRegistry::new())
}

fn scheduler(
    balances: Arc<StaticBalanceProvider>,
    prices: Arc<StaticPriceProvider>,
    handler: Arc<RecordingHandler>,
    config: SchedulerConfig,
) -> RefreshScheduler {
    let aggregator = PortfolioAggregator::new(balances, prices, Arc::new(StaticBitcoinProvider::new()));
    RefreshScheduler::new(Arc::new(aggregator), input(ALICE), handler, config)
}

async fn wait_for(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn manual_refresh_while_in_flight_is_a_no_op() {
    let gate = Arc::new(Notify::new());
    let balances = Arc::new(StaticBalanceProvider::new());
    let prices = Arc::new(StaticPriceProvider::new().gated(gate.clone()));
    let handler = Arc::new(RecordingHandler::default());
    let scheduler = scheduler(balances.clone(), prices.clone(), handler.clone(), SchedulerConfig::default());
    let mut rx = scheduler.subscribe();

    assert!(scheduler.request_refresh());
    assert!(scheduler.is_refreshing());
    assert!(!scheduler.request_refresh());
    assert!(scheduler.refresh_now().await.is_none());

    gate.notify_one();
    rx.changed().await.unwrap();
    wait_for(|| !scheduler.is_refreshing()).await;

    assert_eq!(prices.call_count(), 1);
    assert_eq!(balances.batch_call_count(), 1);
    assert_eq!(*handler.generations.lock().unwrap(), vec![0]);
}

#[tokio::test]
async fn stale_result_is_never_published() {
    let gate = Arc::new(Notify::new());
    let balances = Arc::new(StaticBalanceProvider::new().with_native_balance(1, BOB, 1_000_000_000_000_000_000u128));
    let prices = Arc::new(
        StaticPriceProvider::new()
            .with_price("ethereum", BigDecimal::from_str("2500").unwrap())
            .gated(gate.clone()),
    );
    let handler = Arc::new(RecordingHandler::default());
    let scheduler = scheduler(balances.clone(), prices.clone(), handler.clone(), SchedulerConfig::default());
    let mut rx = scheduler.subscribe();

    assert!(scheduler.request_refresh());
    wait_for(|| prices.call_count() == 1).await;

    // input changes while the first cycle is waiting on prices
    assert!(!scheduler.set_input(input(BOB)));
    gate.notify_one();

    wait_for(|| prices.call_count() == 2).await;
    assert!(scheduler.latest().is_none());
    gate.notify_one();

    rx.changed().await.unwrap();
    let snapshot = rx.borrow().clone().unwrap();
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.total_usd, BigDecimal::from_str("2500").unwrap());
    assert!(snapshot.holding(ALICE, &AssetKey::Native { chain_id: 1 }).is_none());

    wait_for(|| !scheduler.is_refreshing()).await;
    assert_eq!(*handler.generations.lock().unwrap(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn price_and_balance_ticks_are_independent() {
    let balances = Arc::new(StaticBalanceProvider::new());
    let prices = Arc::new(StaticPriceProvider::new());
    let handler = Arc::new(RecordingHandler::default());
    let config = SchedulerConfig {
        price_interval: Duration::from_secs(100),
        balance_interval: Duration::from_secs(30),
    };
    let scheduler = scheduler(balances.clone(), prices.clone(), handler.clone(), config);

    scheduler.start();
    tokio::time::sleep(Duration::from_secs(110)).await;

    // initial full refresh, balance ticks at 30/60/90 and one price tick at 100
    assert_eq!(prices.call_count(), 2);
    assert_eq!(balances.batch_call_count(), 4);
    assert_eq!(handler.generations.lock().unwrap().len(), 5);

    scheduler.shutdown().await;
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(prices.call_count(), 2);
    assert_eq!(balances.batch_call_count(), 4);
}

#[tokio::test]
async fn unreachable_prices_are_reported_to_handlers() {
    let handler = Arc::new(RecordingHandler::default());
    let scheduler = scheduler(
        Arc::new(StaticBalanceProvider::new()),
        Arc::new(StaticPriceProvider::new().unreachable()),
        handler.clone(),
        SchedulerConfig::default(),
    );

    let snapshot = scheduler.refresh_now().await.unwrap();

    assert!(snapshot.partial);
    let errors = handler.errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], PortfolioError::RemoteUnavailable { .. }));
}

#[tokio::test]
async fn dropping_the_scheduler_stops_its_tasks() {
    let prices = Arc::new(StaticPriceProvider::new());
    let config = SchedulerConfig {
        price_interval: Duration::from_millis(10),
        balance_interval: Duration::from_millis(10),
    };
    let scheduler = scheduler(
        Arc::new(StaticBalanceProvider::new()),
        prices.clone(),
        Arc::new(RecordingHandler::default()),
        config,
    );

    scheduler.start();
    wait_for(|| prices.call_count() >= 1).await;
    drop(scheduler);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let after_drop = prices.call_count();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(prices.call_count(), after_drop);
}
