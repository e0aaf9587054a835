// Stop-loss risk monitoring

use tracing::warn;

use crate::core::types::PanicSignal;

/// One-way stop-loss latch.
///
/// Evaluated on every price tick against a threshold fixed at grid
/// creation. Only the downside is monitored: the primary risk in grid
/// trading is a sustained crash that leaves all capital locked in buy
/// fills, while an upward breakout simply leaves the grid idle.
///
/// Detection is decoupled from execution: the owning scheduler calls
/// `GridEngine::liquidate` when it receives the signal.
#[derive(Debug, Clone)]
pub struct RiskState {
    reference_price: f64,
    stop_loss_percent: f64,
    threshold: f64,
    triggered: bool,
}

impl RiskState {
    pub fn new(reference_price: f64, stop_loss_percent: f64) -> Self {
        let threshold = reference_price * (1.0 - stop_loss_percent / 100.0);
        Self {
            reference_price,
            stop_loss_percent,
            threshold,
            triggered: false,
        }
    }

    /// Compare the current price against the stop-loss threshold.
    ///
    /// Returns the panic signal exactly once; the latch never resets for
    /// the life of this grid instance.
    pub fn check(&mut self, current_price: f64) -> Option<PanicSignal> {
        if self.triggered || current_price > self.threshold {
            return None;
        }

        self.triggered = true;
        warn!(
            price = current_price,
            threshold = self.threshold,
            reference = self.reference_price,
            stop_loss_percent = self.stop_loss_percent,
            "stop-loss breached, signalling liquidation"
        );
        Some(PanicSignal {
            price: current_price,
            threshold: self.threshold,
        })
    }

    pub fn triggered(&self) -> bool {
        self.triggered
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}
