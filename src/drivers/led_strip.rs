//! WS2812 strip driver.
//!
//! ## Hardware
//!
//! One data line carries both zones: the bottom ring of 16 pixels first,
//! then the 3 pixels of the top cluster.  Pixels latch 24 bits each in
//! G-R-B order, MSB first, with NRZ timing generated by the RMT
//! peripheral:
//!
//! | Bit | High    | Low     |
//! |-----|---------|---------|
//! | 0   | 350 ns  | 800 ns  |
//! | 1   | 700 ns  | 600 ns  |
//!
//! On the host the driver keeps the last frame in memory instead.

#[cfg(target_os = "espidf")]
use core::time::Duration;

#[cfg(target_os = "espidf")]
use esp_idf_hal::gpio::OutputPin;
#[cfg(target_os = "espidf")]
use esp_idf_hal::peripheral::Peripheral;
#[cfg(target_os = "espidf")]
use esp_idf_hal::rmt::config::TransmitConfig;
#[cfg(target_os = "espidf")]
use esp_idf_hal::rmt::{PinState, Pulse, RmtChannel, TxRmtDriver, VariableLengthSignal};
#[cfg(target_os = "espidf")]
use esp_idf_sys::EspError;

use crate::error::HardwareError;

use super::led_patterns::{Color, Frame};

/// Wire order of one pixel.
pub fn grb_word(color: Color) -> u32 {
    (u32::from(color.g()) << 16) | (u32::from(color.r()) << 8) | u32::from(color.b())
}

pub struct LedStrip {
    len: usize,
    #[cfg(target_os = "espidf")]
    tx: TxRmtDriver<'static>,
    /// Pulses for a 0 bit and a 1 bit.
    #[cfg(target_os = "espidf")]
    bits: [[Pulse; 2]; 2],
    #[cfg(not(target_os = "espidf"))]
    last: Frame,
    #[cfg(not(target_os = "espidf"))]
    writes: usize,
}

#[cfg(target_os = "espidf")]
impl LedStrip {
    pub fn new<C: RmtChannel>(
        channel: impl Peripheral<P = C> + 'static,
        pin: impl Peripheral<P = impl OutputPin> + 'static,
        len: usize,
    ) -> Result<Self, EspError> {
        let config = TransmitConfig::new().clock_divider(1);
        let tx = TxRmtDriver::new(channel, pin, &config)?;
        let hz = tx.counter_clock()?;
        let pulse = |state, ns| Pulse::new_with_duration(hz, state, &Duration::from_nanos(ns));
        let bits = [
            [pulse(PinState::High, 350)?, pulse(PinState::Low, 800)?],
            [pulse(PinState::High, 700)?, pulse(PinState::Low, 600)?],
        ];
        log::info!("LED strip ready ({} pixels)", len);
        Ok(Self { len, tx, bits })
    }

    pub fn write(&mut self, frame: &[Color]) -> Result<(), HardwareError> {
        let mut signal = VariableLengthSignal::with_capacity(frame.len() * 24 * 2);
        for &color in frame {
            let word = grb_word(color);
            for bit in (0..24).rev() {
                let pulses = &self.bits[usize::from(word & (1 << bit) != 0)];
                signal
                    .push(pulses.iter())
                    .map_err(|_| HardwareError::LedStrip)?;
            }
        }
        self.tx
            .start_blocking(&signal)
            .map_err(|_| HardwareError::LedStrip)
    }
}

#[cfg(not(target_os = "espidf"))]
impl LedStrip {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            last: Frame::new(),
            writes: 0,
        }
    }

    pub fn write(&mut self, frame: &[Color]) -> Result<(), HardwareError> {
        self.last = Frame::from_slice(frame).map_err(|()| HardwareError::LedStrip)?;
        self.writes += 1;
        Ok(())
    }

    /// Frame most recently written.
    pub fn last_frame(&self) -> &[Color] {
        &self.last
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl LedStrip {
    /// Number of pixels on the strip.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All pixels off.
    pub fn clear(&mut self) -> Result<(), HardwareError> {
        let mut black = Frame::new();
        black
            .resize(self.len, Color::BLACK)
            .map_err(|()| HardwareError::LedStrip)?;
        self.write(&black)
    }
}
