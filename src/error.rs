// Unified error handling for the grid trading engine

use crate::config::ConfigError;

/// Main error type shared by the engine, gateways and control loop
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("order not found: {0}")]
    OrderNotFound(String),

    #[error("gateway timeout: {0}")]
    GatewayTimeout(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("grid is closed")]
    GridClosed,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Transient errors are retried on the next polling tick;
    /// everything else is surfaced to the caller immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::GatewayTimeout(_) | EngineError::Gateway(_))
    }

    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::InvalidConfiguration(_) | EngineError::Config(_) => "config",
            EngineError::InvalidOrder(_) | EngineError::OrderNotFound(_) => "order",
            EngineError::GatewayTimeout(_) | EngineError::Gateway(_) => "gateway",
            EngineError::GridClosed => "engine",
        }
    }
}

/// Result type alias using EngineError
pub type EngineResult<T> = Result<T, EngineError>;
