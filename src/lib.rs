// Spot Grid Trading Bot Library
//
// A grid trading engine for one spot crypto pair: a ladder of buy and
// sell limit orders around the current price, rebalanced on fills, with
// a one-way stop-loss latch and a simulated matching engine for paper
// trading behind the same gateway contract as a live venue.

pub mod bot;
pub mod config;
pub mod core;
pub mod error;
pub mod gateway;

// Re-export core trading types
pub use core::{
    ActivationOutcome, Fill, Grid, GridEngine, GridLevel, GridSnapshot, LevelState, OrderId,
    OrderSide, PanicSignal, RiskState,
};

// Re-export error types
pub use error::{EngineError, EngineResult};

// Re-export configuration
pub use config::{ActivationPolicy, Config, ConfigError, TradingMode};

// Re-export gateway contracts and the simulated exchange
pub use gateway::simulated::{PricePath, SimOrderStatus, SimulatedExchange};
pub use gateway::{DeadlineFeed, DeadlineGateway, OrderGateway, PriceFeed};

// Re-export the control loop
pub use bot::{StatusSnapshot, TradingBot};
