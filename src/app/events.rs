//! Outbound application events and the status snapshot.
//!
//! The [`FlagService`](super::service::FlagService) emits events through
//! the [`EventSink`](super::ports::EventSink) port at the end of a tick,
//! and only for values that actually changed since the previous tick.

use crate::drivers::led_patterns::LedFunction;
use crate::fsm::CalibrationState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagEvent {
    /// The service has started (carries initial state).
    Started(CalibrationState),

    /// The calibration / positioning state machine moved.
    CalibrationChanged {
        from: CalibrationState,
        to: CalibrationState,
    },

    /// Rounded percentages of the measured and requested position.
    PositionChanged { current: u8, next: u8 },

    TopFunctionChanged(LedFunction),

    BottomFunctionChanged(LedFunction),
}

/// What `getStatus` reports.  Percentages are `None` until the flag has
/// been calibrated; a controller stuck homing keeps reporting `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub current_percent: Option<u8>,
    pub next_percent: Option<u8>,
    pub top_function: LedFunction,
    pub bottom_function: LedFunction,
    pub calibration: CalibrationState,
}

impl StatusSnapshot {
    /// Status at power-on, before the first tick.
    pub const INITIAL: Self = Self {
        current_percent: None,
        next_percent: None,
        top_function: LedFunction::Off,
        bottom_function: LedFunction::Off,
        calibration: CalibrationState::UncalibratedBottom,
    };

    /// Both percentages, when available.
    pub fn position(&self) -> Option<(u8, u8)> {
        self.current_percent.zip(self.next_percent)
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::INITIAL
    }
}
