//! End stop driver.
//!
//! ## Hardware
//!
//! Two micro switches (or optical interrupters) sit at the ends of the
//! flag's travel.  Each is wired to a GPIO with a pull-down; the pin reads
//! HIGH while the flag touches the stop.  Boards with inverted sensors set
//! `limit_active_high = false` in the config.
//!
//! Reads are a single register access, fast enough to run inside the
//! tick without blocking.

use embedded_hal::digital::InputPin;

use crate::error::{HardwareError, Limit};

pub struct LimitSwitch<P> {
    pin: P,
    limit: Limit,
    active_high: bool,
}

impl<P: InputPin> LimitSwitch<P> {
    pub fn new(pin: P, limit: Limit, active_high: bool) -> Self {
        Self {
            pin,
            limit,
            active_high,
        }
    }

    /// `true` while the flag is at this stop.
    pub fn is_reached(&mut self) -> Result<bool, HardwareError> {
        let high = self
            .pin
            .is_high()
            .map_err(|_| HardwareError::LimitSensor(self.limit))?;
        Ok(high == self.active_high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::digital::{ErrorKind, ErrorType};

    struct FakePin(Result<bool, ErrorKind>);

    impl ErrorType for FakePin {
        type Error = ErrorKind;
    }

    impl InputPin for FakePin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            self.0
        }
        fn is_low(&mut self) -> Result<bool, Self::Error> {
            self.0.map(|h| !h)
        }
    }

    #[test]
    fn active_high_switch() {
        let mut sw = LimitSwitch::new(FakePin(Ok(true)), Limit::Bottom, true);
        assert_eq!(sw.is_reached(), Ok(true));
        let mut sw = LimitSwitch::new(FakePin(Ok(false)), Limit::Bottom, true);
        assert_eq!(sw.is_reached(), Ok(false));
    }

    #[test]
    fn active_low_switch_inverts() {
        let mut sw = LimitSwitch::new(FakePin(Ok(false)), Limit::Top, false);
        assert_eq!(sw.is_reached(), Ok(true));
    }

    #[test]
    fn pin_error_names_the_stop() {
        let mut sw = LimitSwitch::new(FakePin(Err(ErrorKind::Other)), Limit::Top, true);
        assert_eq!(sw.is_reached(), Err(HardwareError::LimitSensor(Limit::Top)));
    }
}
