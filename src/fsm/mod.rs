//! Function-pointer finite state machine engine.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                        │
//! │  ┌────────────────────┬──────────┬──────────┬───────────────────┐  │
//! │  │ CalibrationState   │ on_enter │ on_exit  │ on_update         │  │
//! │  ├────────────────────┼──────────┼──────────┼───────────────────┤  │
//! │  │ UncalibratedBottom │ fn(ctx)  │    -     │ fn(ctx)->Option<> │  │
//! │  │ CalibratingBottom  │ fn(ctx)  │    -     │ fn(ctx)->Option<> │  │
//! │  │ UncalibratedTop    │ fn(ctx)  │    -     │ fn(ctx)->Option<> │  │
//! │  │ CalibratingTop     │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  │ Idle               │ fn(ctx)  │    -     │ fn(ctx)->Option<> │  │
//! │  │ Moving             │    -     │    -     │ fn(ctx)->Option<> │  │
//! │  └────────────────────┴──────────┴──────────┴───────────────────┘  │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  All functions receive `&mut FsmContext`.
//!
//! The service takes a [`Checkpoint`] before each tick so a tick whose
//! stepper chunk could not be issued can be undone with [`Fsm::restore`].

pub mod context;
pub mod states;

use context::FsmContext;
use log::info;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Calibration and positioning states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CalibrationState {
    UncalibratedBottom = 0,
    CalibratingBottom = 1,
    UncalibratedTop = 2,
    CalibratingTop = 3,
    Idle = 4,
    Moving = 5,
}

impl CalibrationState {
    /// Total number of states: used to size the table array.
    pub const COUNT: usize = 6;

    /// Convert an index back to a state.  Panics on out-of-range in
    /// debug builds; returns `UncalibratedBottom` in release (re-home).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::UncalibratedBottom,
            1 => Self::CalibratingBottom,
            2 => Self::UncalibratedTop,
            3 => Self::CalibratingTop,
            4 => Self::Idle,
            5 => Self::Moving,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::UncalibratedBottom
            }
        }
    }

    /// `true` once both stops have been found.
    pub fn is_calibrated(self) -> bool {
        matches!(self, Self::Idle | Self::Moving)
    }

    /// `true` while either stop is still being searched for.
    pub fn is_homing(self) -> bool {
        !self.is_calibrated()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UncalibratedBottom => "UncalibratedBottom",
            Self::CalibratingBottom => "CalibratingBottom",
            Self::UncalibratedTop => "UncalibratedTop",
            Self::CalibratingTop => "CalibratingTop",
            Self::Idle => "Idle",
            Self::Moving => "Moving",
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<CalibrationState>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: CalibrationState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

/// Engine position captured before a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    current: usize,
    tick_count: u64,
    state_entry_tick: u64,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
pub struct Fsm {
    /// Fixed-size table indexed by `CalibrationState as usize`.
    table: [StateDescriptor; CalibrationState::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Monotonically increasing tick counter.
    tick_count: u64,
    /// Tick at which the current state was entered.
    state_entry_tick: u64,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; CalibrationState::COUNT], initial: CalibrationState) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    pub fn tick(&mut self, ctx: &mut FsmContext) {
        self.tick_count += 1;
        ctx.ticks_in_state = self.tick_count - self.state_entry_tick;

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Force an immediate transition, running exit and enter hooks.
    #[cfg(test)]
    pub(crate) fn force_transition(&mut self, next: CalibrationState, ctx: &mut FsmContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// Snapshot the engine position.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            current: self.current,
            tick_count: self.tick_count,
            state_entry_tick: self.state_entry_tick,
        }
    }

    /// Return to a snapshot without running any hooks.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        if checkpoint.current != self.current {
            info!(
                "FSM rollback: {} -> {}",
                self.table[self.current].name, self.table[checkpoint.current].name
            );
        }
        self.current = checkpoint.current;
        self.tick_count = checkpoint.tick_count;
        self.state_entry_tick = checkpoint.state_entry_tick;
    }

    /// The current state's identity.
    pub fn current_state(&self) -> CalibrationState {
        CalibrationState::from_index(self.current)
    }

    /// How many ticks the FSM has been in the current state.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: CalibrationState, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}


#[cfg(all(test, not(target_os = "espidf")))]
mod proptests {
    use super::context::FsmContext;
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn calibration_never_regresses(
            readings in proptest::collection::vec((any::<bool>(), any::<bool>(), any::<bool>()), 1..200)
        ) {
            let mut fsm = Fsm::new(states::build_state_table(), CalibrationState::UncalibratedBottom);
            let mut ctx = FsmContext::new(200);
            fsm.start(&mut ctx);
            let mut was_calibrated = false;

            for (bottom, top, finish) in readings {
                if finish {
                    ctx.completed = ctx.outbox.take();
                }
                ctx.limits.bottom = bottom;
                ctx.limits.top = top;
                fsm.tick(&mut ctx);

                let state = fsm.current_state();
                if was_calibrated {
                    prop_assert!(state.is_calibrated(), "fell back to {:?}", state);
                    prop_assert!(ctx.position.top.is_some());
                }
                was_calibrated |= state.is_calibrated();
            }
        }
    }
}
