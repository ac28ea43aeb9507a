//! Application service: the hexagonal core.
//!
//! [`FlagService`] owns the calibration FSM, its context and the LED
//! pattern engine.  It exposes a hardware-agnostic API; all I/O flows
//! through port traits injected at call sites, so the whole service runs
//! against mock adapters on the host.
//!
//! ```text
//!  LimitSensorPort ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                      │      FlagService        │
//!      StepperPort ◀──▶│  FSM · LED engine       │
//!     LedStripPort ◀── └────────────────────────┘
//! ```

use core::task::Poll;

use log::{debug, info, warn};

use crate::config::FlagConfig;
use crate::drivers::led_patterns::{Color, LedFunction, LedPatternEngine, Zone};
use crate::error::{CommandError, HardwareError};
use crate::fsm::context::{FlagPosition, FsmContext, LimitSnapshot};
use crate::fsm::states::build_state_table;
use crate::fsm::{CalibrationState, Fsm};

use super::commands::FlagCommand;
use super::events::{FlagEvent, StatusSnapshot};
use super::ports::{EventSink, LedStripPort, LimitSensorPort, StepperPort};

/// Result of a position request that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// New target stored; the flag starts moving on the next tick.
    Accepted,
    /// Already heading for that target.
    Unchanged,
    /// Ignored because the travel is not known yet.
    NotCalibrated,
}

// ───────────────────────────────────────────────────────────────
// FlagService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct FlagService {
    fsm: Fsm,
    ctx: FsmContext,
    leds: LedPatternEngine,
    /// Status as of the end of the previous tick; the event baseline.
    reported: StatusSnapshot,
    tick_count: u64,
}

impl FlagService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the FSM: call [`start`](Self::start) next.
    pub fn new(config: &FlagConfig) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), CalibrationState::UncalibratedBottom),
            ctx: FsmContext::new(config.step_range),
            leds: LedPatternEngine::new(config.leds),
            reported: StatusSnapshot::INITIAL,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);
        self.reported = self.status();
        sink.emit(&FlagEvent::Started(self.fsm.current_state()));
        info!("FlagService started in {:?}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full cycle: collect stepper result → read limits → FSM →
    /// issue chunk → render LEDs → emit changes.
    ///
    /// `hw` satisfies all three hardware ports; this avoids a double
    /// mutable borrow while keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        hw: &mut (impl LimitSensorPort + StepperPort + LedStripPort),
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        self.advance_position(hw);
        self.render_leds(hw);
        self.emit_changes(sink);
    }

    /// Turn the whole strip off.  Used at boot and on shutdown.
    pub fn lights_off(&mut self, strip: &mut impl LedStripPort) -> Result<(), HardwareError> {
        strip.render(self.leds.blank())
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply one command from the Command Surface.  Called between ticks.
    pub fn handle_command(&mut self, command: FlagCommand) -> Result<(), CommandError> {
        match command {
            FlagCommand::SetFlagPosition(percent) => self.request_move(percent).map(|_| ()),
            FlagCommand::SetZoneFunction(zone, function) => {
                self.set_zone_function(zone, function);
                Ok(())
            }
            FlagCommand::SetZoneColors(zone, palette) => self.set_zone_palette(zone, &palette),
        }
    }

    /// Set a new target as a percentage of the calibrated travel.
    pub fn request_move(&mut self, percent: u8) -> Result<MoveOutcome, CommandError> {
        if percent > 100 {
            return Err(CommandError::InvalidPercent);
        }
        let state = self.fsm.current_state();
        let target = match self.ctx.position.steps_for(percent) {
            Some(steps) if state.is_calibrated() => steps,
            _ => {
                warn!("Move to {}% ignored: flag not calibrated ({})", percent, state.as_str());
                return Ok(MoveOutcome::NotCalibrated);
            }
        };
        if target == self.ctx.position.next {
            debug!("Move to {}% ignored: already the target", percent);
            return Ok(MoveOutcome::Unchanged);
        }
        self.ctx.position.next = target;
        info!("Move requested: {}% ({} steps)", percent, target);
        Ok(MoveOutcome::Accepted)
    }

    pub fn set_zone_function(&mut self, zone: Zone, function: LedFunction) {
        info!("{} zone function -> {}", zone, function);
        self.leds.set_zone_function(zone, function);
    }

    pub fn set_zone_palette(&mut self, zone: Zone, colors: &[Color]) -> Result<(), CommandError> {
        self.leds.set_zone_palette(zone, colors)?;
        info!("{} zone palette replaced ({} colors)", zone, colors.len());
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// What `getStatus` reports right now.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            current_percent: self.current_percent(),
            next_percent: self.next_percent(),
            top_function: self.leds.function(Zone::Top),
            bottom_function: self.leds.function(Zone::Bottom),
            calibration: self.fsm.current_state(),
        }
    }

    /// `None` until the top stop has been found.
    pub fn current_percent(&self) -> Option<u8> {
        self.ctx.position.current_percent()
    }

    pub fn next_percent(&self) -> Option<u8> {
        self.ctx.position.next_percent()
    }

    pub fn state(&self) -> CalibrationState {
        self.fsm.current_state()
    }

    pub fn position(&self) -> FlagPosition {
        self.ctx.position
    }

    /// `true` while a chunk is running on the stepper.
    pub fn is_stepping(&self) -> bool {
        self.ctx.awaiting_step()
    }

    pub fn leds(&self) -> &LedPatternEngine {
        &self.leds
    }

    /// Total ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    fn advance_position(&mut self, hw: &mut (impl LimitSensorPort + StepperPort)) {
        if let Some(chunk) = self.ctx.in_flight {
            match hw.poll_step() {
                Poll::Pending => {}
                Poll::Ready(Ok(())) => {
                    debug!("chunk done: {:?} x{}", chunk.direction, chunk.steps);
                    self.ctx.completed = self.ctx.in_flight.take();
                }
                Poll::Ready(Err(e)) => {
                    warn!("Stepper chunk {:?} x{} failed: {}", chunk.direction, chunk.steps, e);
                    self.ctx.in_flight = None;
                }
            }
        }

        match read_limits(hw) {
            Ok(limits) => self.ctx.limits = limits,
            Err(e) => {
                warn!("Skipping tick {}: {}", self.tick_count, e);
                return;
            }
        }

        let checkpoint = self.fsm.checkpoint();
        let position = self.ctx.position;
        let completed = self.ctx.completed;

        self.fsm.tick(&mut self.ctx);

        let Some(chunk) = self.ctx.outbox.take() else {
            return;
        };
        match hw.begin_step(chunk.direction, chunk.steps) {
            Ok(()) => {
                debug!("chunk issued: {:?} x{}", chunk.direction, chunk.steps);
                self.ctx.in_flight = Some(chunk);
            }
            Err(e) => {
                warn!("Stepper refused chunk, rolling back tick {}: {}", self.tick_count, e);
                self.fsm.restore(checkpoint);
                self.ctx.position = position;
                self.ctx.completed = completed;
                self.ctx.ticks_in_state = self.fsm.ticks_in_current_state();
            }
        }
    }

    fn render_leds(&mut self, strip: &mut impl LedStripPort) {
        let homing = self.fsm.current_state().is_homing();
        let frame = self.leds.render_frame(homing);
        if let Err(e) = strip.render(frame) {
            warn!("LED render failed: {}", e);
        }
    }

    fn emit_changes(&mut self, sink: &mut impl EventSink) {
        let now = self.status();
        let before = core::mem::replace(&mut self.reported, now);

        if now.calibration != before.calibration {
            sink.emit(&FlagEvent::CalibrationChanged {
                from: before.calibration,
                to: now.calibration,
            });
        }
        if now.position() != before.position() {
            if let Some((current, next)) = now.position() {
                sink.emit(&FlagEvent::PositionChanged { current, next });
            }
        }
        if now.top_function != before.top_function {
            sink.emit(&FlagEvent::TopFunctionChanged(now.top_function));
        }
        if now.bottom_function != before.bottom_function {
            sink.emit(&FlagEvent::BottomFunctionChanged(now.bottom_function));
        }
    }
}

fn read_limits(sensors: &mut impl LimitSensorPort) -> Result<LimitSnapshot, HardwareError> {
    Ok(LimitSnapshot {
        bottom: sensors.read_bottom()?,
        top: sensors.read_top()?,
    })
}
