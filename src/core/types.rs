// Common types shared by the engine, gateways and control loop

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Gateway-assigned order identifier
pub type OrderId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Lifecycle of one grid level.
///
/// Empty -> Open -> Filled -> Open (opposite-side replacement) -> ...
/// Liquidation forces any non-terminal level to Cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelState {
    Empty,
    Open,
    Filled,
    Cancelled,
}

/// Fill notification as reported by a gateway
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub order_id: OrderId,
    pub price: f64,
    pub quantity: f64,
    pub timestamp: DateTime<Utc>,
}

/// Emitted by the risk manager exactly once when the stop-loss breaches.
/// A control signal, not an error: the scheduler reacts by liquidating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanicSignal {
    pub price: f64,
    pub threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }
}
