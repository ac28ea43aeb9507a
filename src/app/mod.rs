//! Application core: pure domain logic, zero I/O.
//!
//! This module holds the rules of the build flag: calibration and
//! positioning through the FSM, the LED zones, and the command and event
//! types crossing the boundary.  All interaction with hardware happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod bus;
pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
