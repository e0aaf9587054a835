// Simulated matching engine for paper trading
//
// Stands in for a live venue behind the same OrderGateway contract the
// engine uses in live mode. Fills assume perfect limit-order execution:
// an order fills at its own limit price when the synthetic price crosses
// it, never at the crossing tick price. No balance checks.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::types::{Fill, OrderId, OrderSide};
use crate::error::{EngineError, EngineResult};
use crate::gateway::{OrderGateway, PriceFeed};

/// Synthetic price source for standalone paper trading
pub enum PricePath {
    /// Multiplicative random walk with a bounded per-tick step
    RandomWalk { step_pct: f64, rng: StdRng },
    /// Fixed tick sequence, for deterministic runs and historical replay
    Replay { ticks: VecDeque<f64> },
}

impl PricePath {
    pub fn random_walk(step_pct: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::RandomWalk { step_pct, rng }
    }

    pub fn replay(ticks: Vec<f64>) -> Self {
        Self::Replay {
            ticks: ticks.into(),
        }
    }

    fn next_price(&mut self, current: f64) -> Option<f64> {
        match self {
            PricePath::RandomWalk { step_pct, rng } => {
                let pct = rng.gen_range(-*step_pct..=*step_pct);
                Some(current * (1.0 + pct / 100.0))
            }
            PricePath::Replay { ticks } => ticks.pop_front(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimOrderStatus {
    Pending,
    Filled,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SimOrder {
    pub id: OrderId,
    pub pair: String,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
    pub status: SimOrderStatus,
    pub created_at: DateTime<Utc>,
    /// Placement sequence, used to report same-tick fills in order
    seq: u64,
}

#[derive(Debug, Clone)]
struct TradeRecord {
    side: OrderSide,
    price: f64,
    quantity: f64,
    #[allow(dead_code)]
    timestamp: DateTime<Utc>,
}

struct SimState {
    price: f64,
    next_seq: u64,
    orders: HashMap<OrderId, SimOrder>,
    pending_fills: VecDeque<Fill>,
    trades: Vec<TradeRecord>,
    path: PricePath,
}

impl SimState {
    /// Advance the synthetic price and fill every pending order it crossed
    fn apply_tick(&mut self, new_price: f64) {
        self.price = new_price;

        let mut crossed: Vec<(u64, OrderId)> = self
            .orders
            .values()
            .filter(|o| {
                o.status == SimOrderStatus::Pending
                    && match o.side {
                        OrderSide::Buy => o.price >= new_price,
                        OrderSide::Sell => o.price <= new_price,
                    }
            })
            .map(|o| (o.seq, o.id.clone()))
            .collect();
        crossed.sort_unstable_by_key(|(seq, _)| *seq);

        for (_, order_id) in crossed {
            let order = self
                .orders
                .get_mut(&order_id)
                .expect("crossed order exists");
            order.status = SimOrderStatus::Filled;

            let timestamp = Utc::now();
            debug!(
                %order_id, side = %order.side, limit = order.price, tick = new_price,
                quantity = order.quantity, "simulated fill"
            );
            self.pending_fills.push_back(Fill {
                order_id: order_id.clone(),
                price: order.price,
                quantity: order.quantity,
                timestamp,
            });
            self.trades.push(TradeRecord {
                side: order.side,
                price: order.price,
                quantity: order.quantity,
                timestamp,
            });
        }
    }
}

/// In-memory exchange implementing both the gateway and price feed
/// contracts, so simulation mode exercises the exact poll loop a live
/// venue would.
pub struct SimulatedExchange {
    inner: Mutex<SimState>,
}

impl SimulatedExchange {
    pub fn new(start_price: f64, path: PricePath) -> Self {
        info!(start_price, "simulation mode, no real trades will be executed");
        Self {
            inner: Mutex::new(SimState {
                price: start_price,
                next_seq: 0,
                orders: HashMap::new(),
                pending_fills: VecDeque::new(),
                trades: Vec::new(),
                path,
            }),
        }
    }

    /// Advance the synthetic price directly, bypassing the price path
    pub async fn tick(&self, new_price: f64) {
        let mut state = self.inner.lock().await;
        state.apply_tick(new_price);
    }

    pub async fn price(&self) -> f64 {
        self.inner.lock().await.price
    }

    pub async fn order_status(&self, order_id: &str) -> Option<SimOrderStatus> {
        self.inner
            .lock()
            .await
            .orders
            .get(order_id)
            .map(|o| o.status)
    }

    pub async fn pending_order_count(&self) -> usize {
        self.inner
            .lock()
            .await
            .orders
            .values()
            .filter(|o| o.status == SimOrderStatus::Pending)
            .count()
    }

    /// One-line run summary for the operator at shutdown
    pub async fn summary(&self) -> String {
        let state = self.inner.lock().await;
        let buys = state
            .trades
            .iter()
            .filter(|t| t.side == OrderSide::Buy)
            .count();
        let sells = state.trades.len() - buys;
        let volume: f64 = state.trades.iter().map(|t| t.price * t.quantity).sum();
        format!(
            "trades: {} ({} buys / {} sells) | volume: {:.2} | last price: {:.4}",
            state.trades.len(),
            buys,
            sells,
            volume,
            state.price
        )
    }
}

#[async_trait]
impl OrderGateway for SimulatedExchange {
    async fn place_order(
        &self,
        pair: &str,
        side: OrderSide,
        price: f64,
        quantity: f64,
    ) -> EngineResult<OrderId> {
        if !price.is_finite() || price <= 0.0 {
            return Err(EngineError::InvalidOrder(format!(
                "price must be positive, got {}",
                price
            )));
        }
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(EngineError::InvalidOrder(format!(
                "quantity must be positive, got {}",
                quantity
            )));
        }

        let mut state = self.inner.lock().await;
        let id = format!("sim-{}", Uuid::new_v4().simple());
        let seq = state.next_seq;
        state.next_seq += 1;
        state.orders.insert(
            id.clone(),
            SimOrder {
                id: id.clone(),
                pair: pair.to_string(),
                side,
                price,
                quantity,
                status: SimOrderStatus::Pending,
                created_at: Utc::now(),
                seq,
            },
        );
        debug!(order_id = %id, pair, %side, price, quantity, "simulated order accepted");
        Ok(id)
    }

    async fn cancel_order(&self, order_id: &str) -> EngineResult<()> {
        let mut state = self.inner.lock().await;
        match state.orders.get_mut(order_id) {
            Some(order) if order.status == SimOrderStatus::Pending => {
                order.status = SimOrderStatus::Cancelled;
                debug!(%order_id, "simulated order cancelled");
                Ok(())
            }
            Some(order) => Err(EngineError::OrderNotFound(format!(
                "order {} already {:?}",
                order_id, order.status
            ))),
            None => Err(EngineError::OrderNotFound(order_id.to_string())),
        }
    }

    async fn poll_fills(&self) -> EngineResult<Vec<Fill>> {
        let mut state = self.inner.lock().await;
        Ok(state.pending_fills.drain(..).collect())
    }
}

#[async_trait]
impl PriceFeed for SimulatedExchange {
    async fn get_price(&self, _pair: &str) -> EngineResult<f64> {
        let mut state = self.inner.lock().await;
        let current = state.price;
        let Some(next) = state.path.next_price(current) else {
            return Err(EngineError::Gateway("price path exhausted".to_string()));
        };
        state.apply_tick(next);
        Ok(next)
    }
}
