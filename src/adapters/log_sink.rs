//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).  The WebSocket
//! adapter implements the same trait; the binary pairs the two.

use log::info;

use crate::app::events::FlagEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`FlagEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &FlagEvent) {
        match event {
            FlagEvent::Started(state) => {
                info!("START | initial_state={}", state.as_str());
            }
            FlagEvent::CalibrationChanged { from, to } => {
                info!("STATE | {} -> {}", from.as_str(), to.as_str());
            }
            FlagEvent::PositionChanged { current, next } => {
                info!("FLAG  | current={}% next={}%", current, next);
            }
            FlagEvent::TopFunctionChanged(function) => {
                info!("LED   | top={}", function);
            }
            FlagEvent::BottomFunctionChanged(function) => {
                info!("LED   | bottom={}", function);
            }
        }
    }
}
