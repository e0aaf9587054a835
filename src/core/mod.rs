// Core trading logic modules

pub mod grid;
pub mod risk;
pub mod types;

// Re-export commonly used types
pub use grid::{ActivationOutcome, Grid, GridEngine, GridLevel, GridSnapshot};
pub use risk::RiskState;
pub use types::{Fill, LevelState, OrderId, OrderSide, PanicSignal};
