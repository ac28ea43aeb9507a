//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns both end stops, the stepper link and the LED strip, exposing them
//! through [`LimitSensorPort`], [`StepperPort`] and [`LedStripPort`].
//! The service takes one `&mut` to this adapter per tick.

use core::task::Poll;

use embedded_hal::digital::InputPin;

use crate::app::ports::{LedStripPort, LimitSensorPort, StepperPort};
use crate::drivers::led_patterns::Color;
use crate::drivers::led_strip::LedStrip;
use crate::drivers::limit_switch::LimitSwitch;
use crate::error::HardwareError;
use crate::fsm::context::Direction;

/// Concrete adapter that combines all hardware behind port traits.
pub struct FlagHardware<B, T, S, L> {
    bottom: LimitSwitch<B>,
    top: LimitSwitch<T>,
    stepper: S,
    strip: L,
}

impl<B, T, S, L> FlagHardware<B, T, S, L> {
    pub fn new(bottom: LimitSwitch<B>, top: LimitSwitch<T>, stepper: S, strip: L) -> Self {
        Self {
            bottom,
            top,
            stepper,
            strip,
        }
    }
}

// ── LimitSensorPort implementation ────────────────────────────

impl<B: InputPin, T: InputPin, S, L> LimitSensorPort for FlagHardware<B, T, S, L> {
    fn read_bottom(&mut self) -> Result<bool, HardwareError> {
        self.bottom.is_reached()
    }

    fn read_top(&mut self) -> Result<bool, HardwareError> {
        self.top.is_reached()
    }
}

// ── StepperPort implementation ────────────────────────────────

impl<B, T, S: StepperPort, L> StepperPort for FlagHardware<B, T, S, L> {
    fn begin_step(&mut self, direction: Direction, steps: u32) -> Result<(), HardwareError> {
        self.stepper.begin_step(direction, steps)
    }

    fn poll_step(&mut self) -> Poll<Result<(), HardwareError>> {
        self.stepper.poll_step()
    }
}

// ── LedStripPort implementation ───────────────────────────────

impl<B, T, S, L: LedStripPort> LedStripPort for FlagHardware<B, T, S, L> {
    fn render(&mut self, frame: &[Color]) -> Result<(), HardwareError> {
        self.strip.render(frame)
    }
}

impl LedStripPort for LedStrip {
    fn render(&mut self, frame: &[Color]) -> Result<(), HardwareError> {
        self.write(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::stepper::{StepperHandle, StepperLink};
    use crate::error::Limit;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use std::sync::{Arc, Mutex};

    struct Level(bool);
    impl ErrorType for Level {
        type Error = Infallible;
    }
    impl InputPin for Level {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.0)
        }
        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.0)
        }
    }

    #[test]
    fn composes_all_ports() {
        let strip = Arc::new(Mutex::new(LedStrip::new(4)));
        let mut hw = FlagHardware::new(
            LimitSwitch::new(Level(true), Limit::Bottom, true),
            LimitSwitch::new(Level(true), Limit::Top, false),
            StepperHandle::new(Arc::new(StepperLink::new())),
            strip.clone(),
        );

        assert_eq!(hw.read_bottom(), Ok(true));
        assert_eq!(hw.read_top(), Ok(false));
        hw.begin_step(Direction::Forward, 5).unwrap();
        assert_eq!(hw.poll_step(), Poll::Pending);

        hw.render(&[Color::BLUE; 4]).unwrap();
        assert_eq!(strip.lock().unwrap().last_frame(), &[Color::BLUE; 4]);
    }
}
