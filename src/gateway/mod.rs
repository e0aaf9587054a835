// Order gateway and price feed contracts
//
// The grid engine is written once against these traits and is unaware
// whether it is talking to a live venue or the simulated matching engine.

pub mod simulated;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::core::types::{Fill, OrderId, OrderSide};
use crate::error::{EngineError, EngineResult};

/// Order placement and fill reporting.
///
/// Implemented by the simulated matching engine for paper trading; a live
/// exchange adapter implements the same contract. Implementations own
/// their I/O timeouts so a hung venue never stalls the control loop past
/// one polling interval.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Place a limit order, returning the gateway-assigned order id
    async fn place_order(
        &self,
        pair: &str,
        side: OrderSide,
        price: f64,
        quantity: f64,
    ) -> EngineResult<OrderId>;

    /// Cancel an outstanding order
    async fn cancel_order(&self, order_id: &str) -> EngineResult<()>;

    /// Drain fills that occurred since the last poll, in occurrence order.
    /// Each fill is reported exactly once.
    async fn poll_fills(&self) -> EngineResult<Vec<Fill>>;
}

/// Current market price on demand, live or synthetic
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn get_price(&self, pair: &str) -> EngineResult<f64>;
}

/// Decorator applying a per-call deadline to an order gateway.
///
/// A call that outlives the deadline surfaces as the retryable
/// `GatewayTimeout`, so a hung venue costs the control loop at most one
/// deadline, not an unbounded stall. The control loop wraps its gateway
/// with the polling interval as the deadline.
pub struct DeadlineGateway {
    inner: Arc<dyn OrderGateway>,
    limit: Duration,
}

impl DeadlineGateway {
    pub fn new(inner: Arc<dyn OrderGateway>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    fn elapsed(&self, call: &str) -> EngineError {
        EngineError::GatewayTimeout(format!("{} exceeded {:?}", call, self.limit))
    }
}

#[async_trait]
impl OrderGateway for DeadlineGateway {
    async fn place_order(
        &self,
        pair: &str,
        side: OrderSide,
        price: f64,
        quantity: f64,
    ) -> EngineResult<OrderId> {
        timeout(self.limit, self.inner.place_order(pair, side, price, quantity))
            .await
            .map_err(|_| self.elapsed("place_order"))?
    }

    async fn cancel_order(&self, order_id: &str) -> EngineResult<()> {
        timeout(self.limit, self.inner.cancel_order(order_id))
            .await
            .map_err(|_| self.elapsed("cancel_order"))?
    }

    async fn poll_fills(&self) -> EngineResult<Vec<Fill>> {
        timeout(self.limit, self.inner.poll_fills())
            .await
            .map_err(|_| self.elapsed("poll_fills"))?
    }
}

/// Per-call deadline for a price feed, same contract as `DeadlineGateway`
pub struct DeadlineFeed {
    inner: Arc<dyn PriceFeed>,
    limit: Duration,
}

impl DeadlineFeed {
    pub fn new(inner: Arc<dyn PriceFeed>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl PriceFeed for DeadlineFeed {
    async fn get_price(&self, pair: &str) -> EngineResult<f64> {
        timeout(self.limit, self.inner.get_price(pair))
            .await
            .map_err(|_| {
                EngineError::GatewayTimeout(format!("get_price exceeded {:?}", self.limit))
            })?
    }
}
