// Control loop: drives the grid engine at a fixed polling interval

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::{ActivationPolicy, Config};
use crate::core::grid::{Grid, GridEngine, GridSnapshot};
use crate::core::risk::RiskState;
use crate::error::{EngineError, EngineResult};
use crate::gateway::{DeadlineFeed, DeadlineGateway, OrderGateway, PriceFeed};

/// Status log cadence, in polling ticks
const STATUS_EVERY: u64 = 12;

/// Dashboard view: one consistent snapshot, never a partial update
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub triggered: bool,
    pub last_price: f64,
    pub grid: GridSnapshot,
}

/// Owns the grid engine and risk state for one trading pair.
///
/// The loop is the sole owner of engine and risk state: each tick polls
/// the price feed, runs the stop-loss check, drains gateway fills in
/// report order and retries unplaced levels. Observers read consistent
/// snapshots published through a watch channel after every tick; no lock
/// is ever held across gateway I/O. Every gateway and feed call carries
/// the polling interval as its deadline.
pub struct TradingBot {
    pair: String,
    poll_interval: Duration,
    max_retries: u32,
    activation_policy: ActivationPolicy,
    feed: Arc<dyn PriceFeed>,
    gateway: Arc<dyn OrderGateway>,
    engine: GridEngine,
    risk: RiskState,
    status_tx: watch::Sender<StatusSnapshot>,
    last_price: f64,
}

impl TradingBot {
    /// Fetch the reference price and build the grid around it.
    ///
    /// The grid is created once here and never resized; a restart builds
    /// a fresh grid at the then-current price.
    pub async fn new(
        config: &Config,
        gateway: Arc<dyn OrderGateway>,
        feed: Arc<dyn PriceFeed>,
    ) -> EngineResult<Self> {
        let pair = config.trading.pair.clone();
        let poll_interval = Duration::from_secs_f64(config.trading.poll_interval_secs);

        let gateway: Arc<dyn OrderGateway> =
            Arc::new(DeadlineGateway::new(gateway, poll_interval));
        let feed: Arc<dyn PriceFeed> = Arc::new(DeadlineFeed::new(feed, poll_interval));

        let reference_price = feed.get_price(&pair).await?;
        info!(pair, reference_price, "reference price acquired");

        let grid = Grid::build(
            &pair,
            reference_price,
            config.trading.investment,
            config.trading.grid_count,
            config.trading.range_percent,
        )?;
        let engine = GridEngine::new(
            grid,
            Arc::clone(&gateway),
            config.trading.max_order_retries,
            config.risk.sell_inventory_on_liquidate,
        );
        let risk = RiskState::new(reference_price, config.risk.stop_loss_percent);
        info!(
            stop_loss_threshold = risk.threshold(),
            "risk manager initialized"
        );

        let (status_tx, _) = watch::channel(StatusSnapshot {
            triggered: false,
            last_price: reference_price,
            grid: engine.snapshot(reference_price),
        });

        Ok(Self {
            pair,
            poll_interval,
            max_retries: config.trading.max_order_retries,
            activation_policy: config.trading.on_activation_failure,
            feed,
            gateway,
            engine,
            risk,
            status_tx,
            last_price: reference_price,
        })
    }

    /// Latest published snapshot
    pub fn status(&self) -> StatusSnapshot {
        self.status_tx.borrow().clone()
    }

    /// Live status stream for dashboards; updated after every tick
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_tx.subscribe()
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(StatusSnapshot {
            triggered: self.risk.triggered(),
            last_price: self.last_price,
            grid: self.engine.snapshot(self.last_price),
        });
    }

    /// Run until stop-loss breach, feed exhaustion or shutdown signal
    pub async fn run(&mut self) -> EngineResult<()> {
        self.activate_initial().await?;
        self.publish_status();

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first interval tick completes immediately
        interval.tick().await;

        let mut feed_failures: u32 = 0;
        let mut ticks: u64 = 0;
        let mut liquidated = false;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown signal received");
                    break;
                }
            }
            ticks += 1;

            let price = match self.feed.get_price(&self.pair).await {
                Ok(price) => {
                    feed_failures = 0;
                    price
                }
                Err(e) if e.is_retryable() => {
                    feed_failures += 1;
                    warn!(error = %e, consecutive = feed_failures, "price feed unavailable");
                    if feed_failures > self.max_retries {
                        error!("price feed failed too many consecutive ticks, stopping");
                        break;
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.last_price = price;
            debug!(price, tick = ticks, "price tick");

            // Risk first: a breach halts the grid before any rebalancing
            // could place fresh orders into a crash
            if let Some(signal) = self.risk.check(price) {
                warn!(
                    price = signal.price,
                    threshold = signal.threshold,
                    "panic signal received, liquidating grid"
                );
                // Halt before draining: fills from the breach tick are
                // recorded (and counted toward the liquidation sell) but
                // place no replacements
                self.engine.halt();
                self.drain_fills().await?;
                self.engine.liquidate(price).await?;
                liquidated = true;
                self.publish_status();
                break;
            }

            self.drain_fills().await?;
            let outcome = self.engine.activate().await?;
            if outcome.failed > 0 {
                debug!(failed = outcome.failed, "levels still unplaced after retry pass");
            }

            self.publish_status();
            if ticks % STATUS_EVERY == 0 {
                let status = self.status();
                info!(
                    price,
                    open_orders = status.grid.open_orders(),
                    inventory = status.grid.inventory,
                    realized_pnl = status.grid.realized_pnl,
                    pnl_estimate = status.grid.pnl_estimate,
                    "status"
                );
            }
        }

        if !liquidated {
            info!("shutting down, cancelling open orders");
            self.engine.halt();
            self.drain_fills().await?;
            self.engine.liquidate(self.last_price).await?;
            self.publish_status();
        }

        Ok(())
    }

    /// Apply every fill the gateway has queued since the last poll.
    ///
    /// Transient poll failures are logged and retried on the next tick.
    async fn drain_fills(&mut self) -> EngineResult<()> {
        let fills = match self.gateway.poll_fills().await {
            Ok(fills) => fills,
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "fill poll failed, retrying next tick");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        for fill in &fills {
            self.engine.on_fill(fill).await?;
        }
        Ok(())
    }

    /// Place the full ladder, applying the configured partial-failure policy
    async fn activate_initial(&mut self) -> EngineResult<()> {
        let outcome = self.engine.activate().await?;
        info!(
            placed = outcome.placed,
            failed = outcome.failed,
            "initial grid activation"
        );

        if outcome.failed > 0 && self.activation_policy == ActivationPolicy::Abort {
            error!(
                failed = outcome.failed,
                "activation incomplete, aborting per configuration"
            );
            self.engine.liquidate(self.last_price).await?;
            self.publish_status();
            return Err(EngineError::Gateway(format!(
                "{} grid levels failed to activate",
                outcome.failed
            )));
        }

        Ok(())
    }
}
