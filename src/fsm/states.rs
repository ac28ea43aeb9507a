//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no
//! dynamic dispatch, no heap.
//!
//! ```text
//!  UNCAL_BOTTOM ──[chunk fwd]──▶ CAL_BOTTOM ──┐ (repeat until bottom stop)
//!       │                            │        │
//!  [bottom pressed]           [bottom pressed]◀┘
//!       ▼                            ▼
//!  UNCAL_TOP ────[chunk back]──▶ CAL_TOP ─────┐ (repeat, current += chunk)
//!                                    │        │
//!                              [top pressed]◀─┘
//!                                    ▼
//!                                  IDLE ◀──[target reached / stop hit]── MOVING
//!                                    └──────────[current != next]──────────▶
//! ```
//!
//! Handlers never touch hardware.  They queue at most one chunk in
//! `ctx.outbox`; the service hands it to the stepper and reports the
//! result back through `ctx.completed` on a later tick.

use super::CalibrationState;
use super::StateDescriptor;
use super::context::{Direction, FsmContext};
use log::{debug, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; CalibrationState::COUNT] {
    [
        StateDescriptor {
            id: CalibrationState::UncalibratedBottom,
            name: "UncalibratedBottom",
            on_enter: Some(uncalibrated_bottom_enter),
            on_exit: None,
            on_update: uncalibrated_bottom_update,
        },
        StateDescriptor {
            id: CalibrationState::CalibratingBottom,
            name: "CalibratingBottom",
            on_enter: Some(calibrating_enter),
            on_exit: None,
            on_update: calibrating_bottom_update,
        },
        StateDescriptor {
            id: CalibrationState::UncalibratedTop,
            name: "UncalibratedTop",
            on_enter: Some(uncalibrated_top_enter),
            on_exit: None,
            on_update: uncalibrated_top_update,
        },
        StateDescriptor {
            id: CalibrationState::CalibratingTop,
            name: "CalibratingTop",
            on_enter: Some(calibrating_enter),
            on_exit: Some(calibrating_top_exit),
            on_update: calibrating_top_update,
        },
        StateDescriptor {
            id: CalibrationState::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: CalibrationState::Moving,
            name: "Moving",
            on_enter: None,
            on_exit: None,
            on_update: moving_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Bottom homing
// ═══════════════════════════════════════════════════════════════════════════

fn uncalibrated_bottom_enter(_ctx: &mut FsmContext) {
    info!("HOMING: searching for bottom stop");
}

fn uncalibrated_bottom_update(ctx: &mut FsmContext) -> Option<CalibrationState> {
    if ctx.limits.bottom {
        return Some(reached_bottom(ctx));
    }
    ctx.request_chunk(Direction::Forward, ctx.step_range);
    Some(CalibrationState::CalibratingBottom)
}

fn calibrating_enter(ctx: &mut FsmContext) {
    debug!("HOMING: chunked search, {} steps per chunk", ctx.step_range);
}

fn calibrating_bottom_update(ctx: &mut FsmContext) -> Option<CalibrationState> {
    if ctx.awaiting_step() {
        return None;
    }
    // Position is unknown until the stop is found, so the chunk only
    // matters as a signal that the sensor reading is fresh.
    ctx.completed = None;

    if ctx.limits.bottom {
        return Some(reached_bottom(ctx));
    }
    ctx.request_chunk(Direction::Forward, ctx.step_range);
    None
}

fn reached_bottom(ctx: &mut FsmContext) -> CalibrationState {
    ctx.position.current = 0;
    info!("HOMING: bottom stop reached, position zeroed");
    CalibrationState::UncalibratedTop
}

// ═══════════════════════════════════════════════════════════════════════════
//  Top homing
// ═══════════════════════════════════════════════════════════════════════════

fn uncalibrated_top_enter(_ctx: &mut FsmContext) {
    info!("HOMING: searching for top stop");
}

fn uncalibrated_top_update(ctx: &mut FsmContext) -> Option<CalibrationState> {
    if ctx.limits.top {
        if ctx.position.current == 0 {
            report_stall(ctx);
            return None;
        }
        return Some(CalibrationState::CalibratingTop);
    }
    ctx.request_chunk(Direction::Backward, ctx.step_range);
    Some(CalibrationState::CalibratingTop)
}

fn calibrating_top_update(ctx: &mut FsmContext) -> Option<CalibrationState> {
    if ctx.awaiting_step() {
        return None;
    }
    if let Some(done) = ctx.completed.take() {
        ctx.position.current = ctx.position.current.saturating_add(done.steps);
    }

    if ctx.limits.top {
        if ctx.position.current == 0 {
            report_stall(ctx);
            return None;
        }
        return Some(CalibrationState::Idle);
    }
    ctx.request_chunk(Direction::Backward, ctx.step_range);
    None
}

fn calibrating_top_exit(ctx: &mut FsmContext) {
    ctx.position.top = Some(ctx.position.current);
    info!(
        "HOMING: top stop at {} steps ({:.2} steps/%)",
        ctx.position.current,
        ctx.position.current as f32 / 100.0
    );
}

/// Both stops read as pressed with no travel between them.
fn report_stall(ctx: &FsmContext) {
    if ctx.ticks_in_state <= 1 {
        warn!("HOMING: top stop pressed at bottom position; calibration stalled");
    } else {
        debug!("HOMING: still stalled after {} ticks", ctx.ticks_in_state);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Positioning
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext) {
    info!(
        "IDLE: flag at {} steps ({:?}%)",
        ctx.position.current,
        ctx.position.current_percent()
    );
}

fn idle_update(ctx: &mut FsmContext) -> Option<CalibrationState> {
    ctx.completed = None;
    let chunk = ctx.chunk_toward_target()?;
    ctx.outbox = Some(chunk);
    Some(CalibrationState::Moving)
}

fn moving_update(ctx: &mut FsmContext) -> Option<CalibrationState> {
    if ctx.awaiting_step() {
        return None;
    }

    if let Some(done) = ctx.completed.take() {
        match done.direction {
            Direction::Backward => {
                ctx.position.current = ctx.position.current.saturating_add(done.steps);
                if ctx.limits.top {
                    let top = ctx.position.top.unwrap_or(ctx.position.current);
                    if ctx.position.current != top {
                        info!("MOVE: top stop hit at {} steps, snapping to {}", ctx.position.current, top);
                    }
                    ctx.position.current = top;
                    return Some(CalibrationState::Idle);
                }
            }
            Direction::Forward => {
                ctx.position.current = ctx.position.current.saturating_sub(done.steps);
                if ctx.limits.bottom {
                    if ctx.position.current != 0 {
                        info!("MOVE: bottom stop hit at {} steps, snapping to 0", ctx.position.current);
                    }
                    ctx.position.current = 0;
                    return Some(CalibrationState::Idle);
                }
            }
        }
    }

    match ctx.chunk_toward_target() {
        Some(chunk) => {
            ctx.outbox = Some(chunk);
            None
        }
        None => Some(CalibrationState::Idle),
    }
}
