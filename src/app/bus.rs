//! Command bus between the HTTP task and the control loop.
//!
//! Uses an `embassy-sync` bounded channel for inbound commands and a
//! blocking-mutex cell for the status the control loop republishes after
//! every tick.
//!
//! ```text
//! ┌──────────────┐  FlagCommand    ┌──────────────┐
//! │  HTTP task   │───────────────▶│ Control loop │
//! │              │◀───────────────│   (ticks)    │
//! └──────────────┘ StatusSnapshot  └──────────────┘
//! ```
//!
//! Commands are drained at the start of a tick, so each one is applied
//! whole before the tick reads any state.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::error::CommandError;

use super::commands::FlagCommand;
use super::events::StatusSnapshot;

/// Channel depth for inbound commands.
pub const COMMAND_DEPTH: usize = 8;

pub struct CommandBus {
    commands: Channel<CriticalSectionRawMutex, FlagCommand, COMMAND_DEPTH>,
    status: Mutex<CriticalSectionRawMutex, Cell<StatusSnapshot>>,
}

impl CommandBus {
    pub const fn new() -> Self {
        Self {
            commands: Channel::new(),
            status: Mutex::new(Cell::new(StatusSnapshot::INITIAL)),
        }
    }

    /// Queue a command without blocking.
    pub fn submit(&self, command: FlagCommand) -> Result<(), CommandError> {
        self.commands
            .try_send(command)
            .map_err(|_| CommandError::QueueFull)
    }

    /// Hand every queued command to `apply`, oldest first.
    /// Returns how many were drained.
    pub fn drain(&self, mut apply: impl FnMut(FlagCommand)) -> usize {
        let mut drained = 0;
        while let Ok(command) = self.commands.try_receive() {
            apply(command);
            drained += 1;
        }
        drained
    }

    pub fn publish(&self, status: StatusSnapshot) {
        self.status.lock(|cell| cell.set(status));
    }

    /// Status as of the last completed tick.
    pub fn status(&self) -> StatusSnapshot {
        self.status.lock(Cell::get)
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}
