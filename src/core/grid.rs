// Grid construction and order lifecycle management

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::core::types::{Fill, LevelState, OrderId, OrderSide};
use crate::error::{EngineError, EngineResult};
use crate::gateway::OrderGateway;

/// One rung of the ladder, holding at most one outstanding order
#[derive(Debug, Clone, Serialize)]
pub struct GridLevel {
    /// Position in the ladder, 0 = lowest price
    pub index: usize,
    pub price: f64,
    pub side: OrderSide,
    pub state: LevelState,
    /// Set iff state == Open
    pub order_id: Option<OrderId>,
    /// Base-currency amount for this level
    pub quantity: f64,
    /// Consecutive failed placement attempts
    pub attempts: u32,
}

/// The full ladder for one trading pair.
///
/// Created once at startup from configuration and the current price,
/// never resized, destroyed on shutdown or stop-loss liquidation.
#[derive(Debug, Clone)]
pub struct Grid {
    pub pair: String,
    pub reference_price: f64,
    pub range_percent: f64,
    pub total_investment: f64,
    pub levels: Vec<GridLevel>,
}

impl Grid {
    /// Build the ladder around `reference_price`.
    ///
    /// The range `[ref*(1-r/200), ref*(1+r/200)]` is split arithmetically
    /// into `grid_count` points, endpoints included. Levels below the
    /// reference are buys, levels above are sells. A level landing exactly
    /// on the reference is assigned the sell side: a buy there would fill
    /// immediately without capturing any spread.
    pub fn build(
        pair: &str,
        reference_price: f64,
        investment: f64,
        grid_count: usize,
        range_percent: f64,
    ) -> EngineResult<Self> {
        if !reference_price.is_finite() || reference_price <= 0.0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "reference price must be positive, got {}",
                reference_price
            )));
        }
        if investment <= 0.0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "investment must be positive, got {}",
                investment
            )));
        }
        if grid_count < 2 {
            return Err(EngineError::InvalidConfiguration(format!(
                "grid_count must be at least 2, got {}",
                grid_count
            )));
        }
        if range_percent <= 0.0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "range_percent must be positive, got {}",
                range_percent
            )));
        }

        let lower = reference_price * (1.0 - range_percent / 200.0);
        let upper = reference_price * (1.0 + range_percent / 200.0);
        let step = (upper - lower) / (grid_count - 1) as f64;
        let order_value = investment / grid_count as f64;

        let mut levels = Vec::with_capacity(grid_count);
        for index in 0..grid_count {
            let price = lower + index as f64 * step;
            let side = if price < reference_price {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            };
            levels.push(GridLevel {
                index,
                price,
                side,
                state: LevelState::Empty,
                order_id: None,
                quantity: order_value / price,
                attempts: 0,
            });
        }

        let buys = levels.iter().filter(|l| l.side == OrderSide::Buy).count();
        let sells = levels.len() - buys;
        if buys == 0 || sells == 0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "grid does not straddle the reference price ({} buys, {} sells); \
                 widen range_percent or adjust grid_count",
                buys, sells
            )));
        }

        info!(
            pair,
            reference_price,
            lower,
            upper,
            step,
            buys,
            sells,
            "grid built"
        );

        Ok(Self {
            pair: pair.to_string(),
            reference_price,
            range_percent,
            total_investment: investment,
            levels,
        })
    }

    /// Price distance between adjacent levels
    pub fn step(&self) -> f64 {
        self.levels[1].price - self.levels[0].price
    }
}

/// Outcome of one activation pass over the ladder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationOutcome {
    pub placed: usize,
    pub failed: usize,
}

/// Consistent point-in-time view of the engine for dashboards and logs
#[derive(Debug, Clone, Serialize)]
pub struct GridSnapshot {
    pub pair: String,
    pub reference_price: f64,
    pub range_percent: f64,
    pub total_investment: f64,
    pub closed: bool,
    pub levels: Vec<GridLevel>,
    pub inventory: f64,
    pub average_entry: f64,
    pub realized_pnl: f64,
    pub pnl_estimate: f64,
}

impl GridSnapshot {
    pub fn open_orders(&self) -> usize {
        self.levels
            .iter()
            .filter(|l| l.state == LevelState::Open)
            .count()
    }
}

/// Owns the ladder and drives each level through its lifecycle.
///
/// The engine is the sole mutator of grid state; observers get clones via
/// `snapshot`. All gateway access goes through the `OrderGateway` contract,
/// so the same code path runs in simulation and live modes.
pub struct GridEngine {
    grid: Grid,
    gateway: Arc<dyn OrderGateway>,
    closed: bool,
    liquidated: bool,
    inventory: f64,
    average_entry: f64,
    realized_pnl: f64,
    max_order_retries: u32,
    sell_inventory_on_liquidate: bool,
}

impl GridEngine {
    pub fn new(
        grid: Grid,
        gateway: Arc<dyn OrderGateway>,
        max_order_retries: u32,
        sell_inventory_on_liquidate: bool,
    ) -> Self {
        Self {
            grid,
            gateway,
            closed: false,
            liquidated: false,
            inventory: 0.0,
            average_entry: 0.0,
            realized_pnl: 0.0,
            max_order_retries,
            sell_inventory_on_liquidate,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the grid without touching the gateway.
    ///
    /// Fills delivered after this point are still recorded against their
    /// levels but place no replacement orders. Called before draining
    /// outstanding fills on the way into `liquidate`, so base bought on
    /// the breach tick counts toward the liquidation inventory sell.
    pub fn halt(&mut self) {
        self.closed = true;
    }

    pub fn inventory(&self) -> f64 {
        self.inventory
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Place an order for every Empty level.
    ///
    /// Idempotent over Open levels, so the control loop calls this each
    /// tick to retry earlier failures. A level that keeps failing is
    /// alerted once it exhausts `max_order_retries` and then left dormant;
    /// it is never silently dropped.
    pub async fn activate(&mut self) -> EngineResult<ActivationOutcome> {
        if self.closed {
            return Err(EngineError::GridClosed);
        }

        let pair = self.grid.pair.clone();
        let mut outcome = ActivationOutcome::default();

        for i in 0..self.grid.levels.len() {
            let (state, attempts, side, price, quantity) = {
                let l = &self.grid.levels[i];
                (l.state, l.attempts, l.side, l.price, l.quantity)
            };
            if state != LevelState::Empty || attempts >= self.max_order_retries {
                continue;
            }

            match self.gateway.place_order(&pair, side, price, quantity).await {
                Ok(order_id) => {
                    debug!(index = i, %side, price, quantity, %order_id, "order placed");
                    let level = &mut self.grid.levels[i];
                    level.state = LevelState::Open;
                    level.order_id = Some(order_id);
                    level.attempts = 0;
                    outcome.placed += 1;
                }
                Err(e) => {
                    let level = &mut self.grid.levels[i];
                    level.attempts += 1;
                    outcome.failed += 1;
                    if level.attempts >= self.max_order_retries {
                        error!(
                            index = i, %side, price, attempts = level.attempts, error = %e,
                            "giving up on level after repeated placement failures; operator attention required"
                        );
                    } else {
                        warn!(
                            index = i, %side, price, attempts = level.attempts, error = %e,
                            "order placement failed, will retry next tick"
                        );
                    }
                }
            }
        }

        Ok(outcome)
    }

    /// Apply a fill reported by the gateway.
    ///
    /// Locates the owning level by order id, marks it Filled and places
    /// the opposite-side replacement one grid step away. Fills referencing
    /// unknown or already-settled orders are logged and ignored, which
    /// makes duplicate fill notifications a no-op. After liquidation a
    /// late fill is still recorded but triggers no rebalancing.
    pub async fn on_fill(&mut self, fill: &Fill) -> EngineResult<()> {
        let Some(index) = self
            .grid
            .levels
            .iter()
            .position(|l| l.order_id.as_deref() == Some(fill.order_id.as_str()))
        else {
            debug!(order_id = %fill.order_id, "fill for unknown or settled order ignored");
            return Ok(());
        };

        let side = {
            let level = &mut self.grid.levels[index];
            level.state = LevelState::Filled;
            level.order_id = None;
            level.side
        };

        self.record_fill(side, fill);
        info!(
            index, %side, price = fill.price, quantity = fill.quantity,
            inventory = self.inventory, realized_pnl = self.realized_pnl,
            "level filled"
        );

        if self.closed {
            debug!(index, "grid closed, fill recorded without rebalancing");
            return Ok(());
        }

        self.place_replacement(index, side.opposite(), fill).await
    }

    /// Update inventory, average entry and realized P&L for a fill
    fn record_fill(&mut self, side: OrderSide, fill: &Fill) {
        match side {
            OrderSide::Buy => {
                let total = self.inventory * self.average_entry + fill.quantity * fill.price;
                self.inventory += fill.quantity;
                self.average_entry = total / self.inventory;
            }
            OrderSide::Sell => {
                if self.inventory > 0.0 {
                    self.realized_pnl += fill.quantity * (fill.price - self.average_entry);
                }
                self.inventory = (self.inventory - fill.quantity).max(0.0);
                if self.inventory == 0.0 {
                    self.average_entry = 0.0;
                }
            }
        }
    }

    /// Place the opposite-side order one grid step away from a fill.
    ///
    /// The replacement targets the adjacent level and walks outward past
    /// slots that already hold an open order. Replacement sells carry the
    /// filled base quantity; replacement buys are re-sized from the fixed
    /// per-level order value.
    async fn place_replacement(
        &mut self,
        from: usize,
        side: OrderSide,
        fill: &Fill,
    ) -> EngineResult<()> {
        let target = match side {
            OrderSide::Sell => (from + 1..self.grid.levels.len())
                .find(|&i| self.grid.levels[i].state != LevelState::Open),
            OrderSide::Buy => (0..from)
                .rev()
                .find(|&i| self.grid.levels[i].state != LevelState::Open),
        };

        let Some(target) = target else {
            info!(
                from, %side,
                "no free slot for replacement order; fill stays unhedged until a slot opens"
            );
            return Ok(());
        };

        let price = self.grid.levels[target].price;
        let quantity = match side {
            OrderSide::Sell => fill.quantity,
            OrderSide::Buy => {
                self.grid.total_investment / self.grid.levels.len() as f64 / price
            }
        };
        let pair = self.grid.pair.clone();

        {
            let level = &mut self.grid.levels[target];
            level.side = side;
            level.quantity = quantity;
        }

        match self.gateway.place_order(&pair, side, price, quantity).await {
            Ok(order_id) => {
                info!(
                    from, target, %side, price, quantity, %order_id,
                    "replacement order placed"
                );
                let level = &mut self.grid.levels[target];
                level.state = LevelState::Open;
                level.order_id = Some(order_id);
                level.attempts = 0;
            }
            Err(e) => {
                // Left Empty so the next activation pass retries it
                warn!(target, %side, price, error = %e, "replacement placement failed");
                let level = &mut self.grid.levels[target];
                level.state = LevelState::Empty;
                level.order_id = None;
                level.attempts += 1;
            }
        }

        Ok(())
    }

    /// Cancel every open order and close the grid.
    ///
    /// Called by the scheduler on stop-loss breach or graceful shutdown.
    /// Idempotent; once closed the grid accepts late fills but places no
    /// further orders. With `sell_inventory_on_liquidate` set, remaining
    /// base inventory is offered slightly below the last price.
    pub async fn liquidate(&mut self, last_price: f64) -> EngineResult<()> {
        if self.liquidated {
            return Ok(());
        }
        self.liquidated = true;
        self.closed = true;

        let mut cancelled = 0usize;
        for i in 0..self.grid.levels.len() {
            let order_id = {
                let l = &self.grid.levels[i];
                if l.state == LevelState::Open {
                    l.order_id.clone()
                } else {
                    None
                }
            };

            if let Some(order_id) = order_id {
                match self.gateway.cancel_order(&order_id).await {
                    Ok(()) => {
                        cancelled += 1;
                        self.grid.levels[i].order_id = None;
                    }
                    Err(EngineError::OrderNotFound(_)) => {
                        // A fill may be in flight; the id is kept so the
                        // late fill can still be attributed to this level
                        debug!(index = i, %order_id, "order already terminal at gateway");
                    }
                    Err(e) => {
                        warn!(index = i, %order_id, error = %e, "failed to cancel order");
                    }
                }
            }

            let level = &mut self.grid.levels[i];
            if matches!(level.state, LevelState::Empty | LevelState::Open) {
                level.state = LevelState::Cancelled;
            }
        }

        info!(cancelled, "grid liquidated");

        if self.sell_inventory_on_liquidate && self.inventory > 0.0 && last_price > 0.0 {
            let price = last_price * 0.995;
            match self
                .gateway
                .place_order(&self.grid.pair, OrderSide::Sell, price, self.inventory)
                .await
            {
                Ok(order_id) => {
                    warn!(
                        %order_id, quantity = self.inventory, price,
                        "liquidation sell placed for remaining inventory"
                    );
                }
                Err(e) => {
                    error!(error = %e, "failed to place liquidation sell for remaining inventory");
                }
            }
        }

        Ok(())
    }

    /// Read-only view of the whole engine, priced at `last_price`
    pub fn snapshot(&self, last_price: f64) -> GridSnapshot {
        let unrealized = if self.inventory > 0.0 {
            self.inventory * (last_price - self.average_entry)
        } else {
            0.0
        };

        GridSnapshot {
            pair: self.grid.pair.clone(),
            reference_price: self.grid.reference_price,
            range_percent: self.grid.range_percent,
            total_investment: self.grid.total_investment,
            closed: self.closed,
            levels: self.grid.levels.clone(),
            inventory: self.inventory,
            average_entry: self.average_entry,
            realized_pnl: self.realized_pnl,
            pnl_estimate: self.realized_pnl + unrealized,
        }
    }
}
