//! Inbound commands to the application service.
//!
//! The HTTP adapter parses requests into these, validates them and
//! queues them on the [`CommandBus`](super::bus::CommandBus).  The control
//! loop applies each one between ticks.

use crate::drivers::led_patterns::{LedFunction, Palette, Zone};

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagCommand {
    /// Move the flag to a percentage of its travel (0–100).
    SetFlagPosition(u8),

    /// Select the animation a zone renders.
    SetZoneFunction(Zone, LedFunction),

    /// Replace a zone's palette.  Colors are already in strip channel order.
    SetZoneColors(Zone, Palette),
}
