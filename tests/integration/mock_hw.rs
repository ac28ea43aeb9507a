//! Simulated flag rig for integration tests.
//!
//! Models the physical mast: a carriage somewhere between the bottom
//! stop (step 0) and the top stop (`travel`).  The limit sensors are
//! derived from the carriage position, accepted chunks move it, and the
//! completion is handed back on the next `poll_step`, the way the real
//! stepper worker behaves.  Every actuator call is recorded.

use core::task::Poll;

use buildflag::app::events::FlagEvent;
use buildflag::app::ports::{EventSink, LedStripPort, LimitSensorPort, StepperPort};
use buildflag::drivers::led_patterns::Color;
use buildflag::error::{HardwareError, Limit};
use buildflag::fsm::context::{Direction, StepRequest};

// ── MockRig ───────────────────────────────────────────────────

pub struct MockRig {
    /// Steps between the two stops.
    pub travel: u32,
    /// Carriage position, steps above the bottom stop.
    pub carriage: u32,
    /// Every chunk the stepper accepted.
    pub chunks: Vec<StepRequest>,
    /// Every frame pushed to the strip.
    pub frames: Vec<Vec<Color>>,
    /// Sensor reads that will fail before reads succeed again.
    pub failing_reads: u32,
    /// Refuse every `begin_step`.
    pub refuse_steps: bool,
    /// Report the next completed chunk as failed.
    pub fail_next_chunk: bool,
    /// Force the top sensor on regardless of the carriage.
    pub top_stuck: bool,
    /// Strip writes that will fail before writes succeed again.
    pub failing_renders: u32,
    pending: Option<StepRequest>,
}

#[allow(dead_code)]
impl MockRig {
    pub fn new(travel: u32, carriage: u32) -> Self {
        Self {
            travel,
            carriage: carriage.min(travel),
            chunks: Vec::new(),
            frames: Vec::new(),
            failing_reads: 0,
            refuse_steps: false,
            fail_next_chunk: false,
            top_stuck: false,
            failing_renders: 0,
            pending: None,
        }
    }

    pub fn last_frame(&self) -> &[Color] {
        self.frames.last().map_or(&[], Vec::as_slice)
    }

    pub fn step_busy(&self) -> bool {
        self.pending.is_some()
    }
}

impl LimitSensorPort for MockRig {
    fn read_bottom(&mut self) -> Result<bool, HardwareError> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(HardwareError::LimitSensor(Limit::Bottom));
        }
        Ok(self.carriage == 0)
    }

    fn read_top(&mut self) -> Result<bool, HardwareError> {
        Ok(self.top_stuck || self.carriage >= self.travel)
    }
}

impl StepperPort for MockRig {
    fn begin_step(&mut self, direction: Direction, steps: u32) -> Result<(), HardwareError> {
        if self.refuse_steps || self.pending.is_some() {
            return Err(HardwareError::StepperBusy);
        }
        self.carriage = match direction {
            Direction::Forward => self.carriage.saturating_sub(steps),
            Direction::Backward => (self.carriage + steps).min(self.travel),
        };
        let request = StepRequest { direction, steps };
        self.chunks.push(request);
        self.pending = Some(request);
        Ok(())
    }

    fn poll_step(&mut self) -> Poll<Result<(), HardwareError>> {
        match self.pending.take() {
            Some(_) if self.fail_next_chunk => {
                self.fail_next_chunk = false;
                Poll::Ready(Err(HardwareError::StepperIo))
            }
            Some(_) => Poll::Ready(Ok(())),
            None => Poll::Ready(Err(HardwareError::StepperOffline)),
        }
    }
}

impl LedStripPort for MockRig {
    fn render(&mut self, frame: &[Color]) -> Result<(), HardwareError> {
        if self.failing_renders > 0 {
            self.failing_renders -= 1;
            return Err(HardwareError::LedStrip);
        }
        self.frames.push(frame.to_vec());
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<FlagEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positions(&self) -> Vec<(u8, u8)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                FlagEvent::PositionChanged { current, next } => Some((*current, *next)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &FlagEvent) {
        self.events.push(*event);
    }
}
