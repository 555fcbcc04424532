use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::PortfolioError;
use crate::models::balance::BalanceSheet;
use crate::models::portfolio::{PortfolioDiff, PortfolioSnapshot};
use crate::models::price::PriceSnapshot;
use crate::traits::PortfolioEventHandler;
use crate::tracker::aggregator::{AggregationInput, PortfolioAggregator};

/// What a refresh cycle refetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Prices only; cached balances are revalued
    Prices,
    /// Balances only; valued with cached prices
    Balances,
    /// Both, concurrently
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub price_interval: Duration,
    pub balance_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            price_interval: Duration::from_secs(120),
            balance_interval: Duration::from_secs(30),
        }
    }
}

struct SchedulerInner {
    aggregator: Arc<PortfolioAggregator>,
    handler: Arc<dyn PortfolioEventHandler>,
    input_tx: watch::Sender<Arc<AggregationInput>>,
    snapshot_tx: watch::Sender<Option<Arc<PortfolioSnapshot>>>,
    in_flight: AtomicBool,
    generation: AtomicU64,
    // (generation, data) of the last fetch on each side
    prices: Mutex<Option<(u64, PriceSnapshot)>>,
    balances: Mutex<Option<(u64, BalanceSheet)>>,
}

/// Clears the in-flight flag when dropped, even if the cycle panics
struct InFlightGuard {
    inner: Arc<SchedulerInner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.store(false, Ordering::SeqCst);
    }
}

impl SchedulerInner {
    fn try_begin(self: &Arc<Self>) -> Option<InFlightGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlightGuard { inner: self.clone() })
    }

    /// Run cycles until the published snapshot matches the current input
    async fn run_guarded(self: Arc<Self>, guard: InFlightGuard, kind: RefreshKind) -> Arc<PortfolioSnapshot> {
        let mut guard = guard;
        let mut kind = kind;
        loop {
            let snapshot = self.run_until_current(kind).await;
            drop(guard);

            // input may have changed after the stale check but before release
            if self.generation.load(Ordering::SeqCst) == snapshot.generation {
                return snapshot;
            }
            match self.try_begin() {
                Some(next) => {
                    guard = next;
                    kind = RefreshKind::Full;
                }
                None => return snapshot,
            }
        }
    }

    async fn run_until_current(&self, kind: RefreshKind) -> Arc<PortfolioSnapshot> {
        let mut kind = kind;
        loop {
            // generation before input: a stale input always comes with a stale generation
            let generation = self.generation.load(Ordering::SeqCst);
            let input = self.input_tx.borrow().clone();

            debug!("Starting {:?} refresh for generation {}", kind, generation);
            let snapshot = self.compute(kind, &input, generation).await;

            match self.publish(snapshot).await {
                Some(published) => return published,
                None => {
                    debug!("Discarding stale result of generation {}", generation);
                    kind = RefreshKind::Full;
                }
            }
        }
    }

    async fn compute(&self, kind: RefreshKind, input: &AggregationInput, generation: u64) -> PortfolioSnapshot {
        let cached_prices = self.cached(&self.prices, generation).await;
        let cached_balances = self.cached(&self.balances, generation).await;

        let (prices, balances) = match (kind, cached_prices, cached_balances) {
            (RefreshKind::Prices, _, Some(balances)) => {
                let prices = self.aggregator.fetch_prices(input).await;
                (prices, balances)
            }
            (RefreshKind::Balances, Some(prices), _) => {
                let balances = self.aggregator.fetch_balances(input).await;
                (prices, balances)
            }
            (kind, _, _) => {
                if kind != RefreshKind::Full {
                    debug!("Cache cold, escalating {:?} refresh to full", kind);
                }
                tokio::join!(self.aggregator.fetch_prices(input), self.aggregator.fetch_balances(input))
            }
        };

        let snapshot = PortfolioAggregator::value(input, &balances, &prices, generation);
        *self.prices.lock().await = Some((generation, prices));
        *self.balances.lock().await = Some((generation, balances));
        snapshot
    }

    async fn cached<T: Clone>(&self, slot: &Mutex<Option<(u64, T)>>, generation: u64) -> Option<T> {
        match &*slot.lock().await {
            Some((cached_generation, value)) if *cached_generation == generation => Some(value.clone()),
            _ => None,
        }
    }

    /// Publish a snapshot unless its generation is no longer current.
    ///
    /// The check runs under the snapshot channel's lock, which `bump_generation`
    /// also takes, so an input change lands either before or after the publish.
    async fn publish(&self, snapshot: PortfolioSnapshot) -> Option<Arc<PortfolioSnapshot>> {
        let snapshot = Arc::new(snapshot);
        let mut previous = None;
        let published = self.snapshot_tx.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != snapshot.generation {
                return false;
            }
            previous = current.replace(snapshot.clone());
            true
        });
        if !published {
            return None;
        }

        let diff = match previous {
            Some(previous) => PortfolioDiff::between(&previous, &snapshot),
            None => PortfolioDiff::initial(&snapshot),
        };

        for issue in &snapshot.issues {
            if matches!(issue, PortfolioError::RemoteUnavailable { .. }) {
                self.handler.handle_error(issue).await;
            }
        }
        self.handler.handle_snapshot(&snapshot, &diff).await;
        Some(snapshot)
    }

    fn bump_generation(&self) -> u64 {
        let mut generation = 0;
        self.snapshot_tx.send_if_modified(|_| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            false
        });
        generation
    }
}

/// Periodically revalues the selected wallets.
///
/// At most one refresh cycle runs at a time. Prices and balances tick on
/// independent intervals; a manual refresh does both.
pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
    config: SchedulerConfig,
    started: AtomicBool,
    shutdown: Arc<Notify>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(
        aggregator: Arc<PortfolioAggregator>,
        input: AggregationInput,
        handler: Arc<dyn PortfolioEventHandler>,
        config: SchedulerConfig,
    ) -> Self {
        let (input_tx, _) = watch::channel(Arc::new(input));
        let (snapshot_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(SchedulerInner {
                aggregator,
                handler,
                input_tx,
                snapshot_tx,
                in_flight: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                prices: Mutex::new(None),
                balances: Mutex::new(None),
            }),
            config,
            started: AtomicBool::new(false),
            shutdown: Arc::new(Notify::new()),
            tasks: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Spawn the price and balance tickers and kick off a first full refresh
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Refresh scheduler already started");
            return;
        }
        info!(
            "Starting refresh scheduler (prices every {:?}, balances every {:?})",
            self.config.price_interval, self.config.balance_interval
        );

        self.spawn(run_ticker(
            self.inner.clone(),
            RefreshKind::Prices,
            self.config.price_interval,
            self.shutdown.clone(),
        ));
        self.spawn(run_ticker(
            self.inner.clone(),
            RefreshKind::Balances,
            self.config.balance_interval,
            self.shutdown.clone(),
        ));
        self.request_refresh();
    }

    /// Start a full refresh in the background. Returns false if one is
    /// already in flight.
    pub fn request_refresh(&self) -> bool {
        match self.inner.try_begin() {
            Some(guard) => {
                let inner = self.inner.clone();
                self.spawn(async move {
                    inner.run_guarded(guard, RefreshKind::Full).await;
                });
                true
            }
            None => {
                debug!("Refresh already in flight, ignoring request");
                false
            }
        }
    }

    /// Run a full refresh inline. Returns `None` if one is already in flight.
    pub async fn refresh_now(&self) -> Option<Arc<PortfolioSnapshot>> {
        self.refresh(RefreshKind::Full).await
    }

    /// Run a refresh of the given kind inline. Returns `None` if one is
    /// already in flight.
    pub async fn refresh(&self, kind: RefreshKind) -> Option<Arc<PortfolioSnapshot>> {
        let guard = self.inner.try_begin()?;
        Some(self.inner.clone().run_guarded(guard, kind).await)
    }

    /// Replace the aggregation input. Results computed for the previous input
    /// are never published. Triggers a refresh once started.
    pub fn set_input(&self, input: AggregationInput) -> bool {
        self.inner.input_tx.send_replace(Arc::new(input));
        let generation = self.inner.bump_generation();
        debug!("Aggregation input changed, generation {}", generation);

        if self.started.load(Ordering::SeqCst) {
            self.request_refresh()
        } else {
            false
        }
    }

    pub fn input(&self) -> Arc<AggregationInput> {
        self.inner.input_tx.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PortfolioSnapshot>>> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn latest(&self) -> Option<Arc<PortfolioSnapshot>> {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Stop the tickers and abort any refresh in flight
    pub async fn shutdown(&self) {
        info!("Stopping refresh scheduler");
        self.shutdown.notify_waiters();

        let handles: Vec<JoinHandle<()>> = self.lock_tasks().drain(..).collect();
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }
        self.started.store(false, Ordering::SeqCst);
    }

    fn spawn<F>(&self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        let mut tasks = self.lock_tasks();
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        for handle in self.lock_tasks().drain(..) {
            handle.abort();
        }
    }
}

async fn run_ticker(inner: Arc<SchedulerInner>, kind: RefreshKind, period: Duration, shutdown: Arc<Notify>) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                debug!("{:?} ticker stopped", kind);
                break;
            }
            _ = ticker.tick() => {
                match inner.try_begin() {
                    Some(guard) => {
                        inner.clone().run_guarded(guard, kind).await;
                    }
                    None => debug!("{:?} tick skipped, refresh in flight", kind),
                }
            }
        }
    }
}
