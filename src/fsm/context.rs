//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the "blackboard" the calibration and positioning
//! handlers read from and write to: the flag position, the latest limit
//! switch snapshot and the bookkeeping for the single stepper chunk that
//! may be in flight.

use log::debug;

// ---------------------------------------------------------------------------
// Limit switch snapshot (written by the service before each FSM tick)
// ---------------------------------------------------------------------------

/// A point-in-time reading of both end stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimitSnapshot {
    /// Flag is resting on the bottom stop.
    pub bottom: bool,
    /// Flag is pressed against the top stop.
    pub top: bool,
}

// ---------------------------------------------------------------------------
// Stepper chunks
// ---------------------------------------------------------------------------

/// Motor direction.  Forward lowers the flag, backward raises it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// One bounded stepper move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRequest {
    pub direction: Direction,
    pub steps: u32,
}

// ---------------------------------------------------------------------------
// Flag position
// ---------------------------------------------------------------------------

/// Position of the flag in motor steps above the bottom stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagPosition {
    /// Steps above the bottom stop, as last measured.
    pub current: u32,
    /// Requested target in steps.
    pub next: u32,
    /// Step count of the top stop.  `None` until top calibration finishes.
    pub top: Option<u32>,
}

impl FlagPosition {
    /// Steps per percent (`top / 100`).  Unavailable before calibration.
    pub fn step_factor(&self) -> Option<f32> {
        self.top.map(|top| top as f32 / 100.0)
    }

    /// Convert a step count to a rounded percentage of the calibrated travel.
    pub fn percent_of(&self, steps: u32) -> Option<u8> {
        let top = u64::from(self.top.filter(|t| *t > 0)?);
        let pct = (u64::from(steps) * 100 + top / 2) / top;
        Some(pct.min(u64::from(u8::MAX)) as u8)
    }

    /// Convert a percentage (0–100) to a rounded step target.
    pub fn steps_for(&self, percent: u8) -> Option<u32> {
        let top = u64::from(self.top?);
        Some(((u64::from(percent) * top + 50) / 100) as u32)
    }

    pub fn current_percent(&self) -> Option<u8> {
        self.percent_of(self.current)
    }

    pub fn next_percent(&self) -> Option<u8> {
        self.percent_of(self.next)
    }
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,

    // -- Position --
    pub position: FlagPosition,
    /// Latest end stop readings.  Updated before each FSM tick.
    pub limits: LimitSnapshot,
    /// Maximum steps per chunk.
    pub step_range: u32,

    // -- Stepper bookkeeping --
    /// Chunk currently executing on the stepper.
    pub in_flight: Option<StepRequest>,
    /// Chunk that finished since the last update; consumed by the handler.
    pub completed: Option<StepRequest>,
    /// Chunk a handler wants issued after this update.
    pub outbox: Option<StepRequest>,
}

impl FsmContext {
    pub fn new(step_range: u32) -> Self {
        Self {
            ticks_in_state: 0,
            position: FlagPosition::default(),
            limits: LimitSnapshot::default(),
            step_range,
            in_flight: None,
            completed: None,
            outbox: None,
        }
    }

    /// `true` while a chunk is executing and its result has not arrived.
    pub fn awaiting_step(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Queue a chunk for the service to hand to the stepper.
    pub fn request_chunk(&mut self, direction: Direction, steps: u32) {
        debug!("chunk queued: {:?} x{}", direction, steps);
        self.outbox = Some(StepRequest { direction, steps });
    }

    /// Next bounded chunk toward `position.next`, or `None` when there.
    pub fn chunk_toward_target(&self) -> Option<StepRequest> {
        let FlagPosition { current, next, .. } = self.position;
        if next > current {
            Some(StepRequest {
                direction: Direction::Backward,
                steps: (next - current).min(self.step_range),
            })
        } else if current > next {
            Some(StepRequest {
                direction: Direction::Forward,
                steps: (current - next).min(self.step_range),
            })
        } else {
            None
        }
    }
}
