//! GPIO / peripheral pin assignments for the flag controller board.
//!
//! Single source of truth: `main.rs` builds every pin driver from these
//! numbers rather than hard-coding them at the call site.

// ---------------------------------------------------------------------------
// Limit switches (normally-open microswitches to 3V3, pulled down)
// ---------------------------------------------------------------------------

/// Digital input: HIGH = flag resting on the bottom stop.
pub const BOTTOM_LIMIT_GPIO: i32 = 4;
/// Digital input: HIGH = flag pressed against the top stop.
pub const TOP_LIMIT_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// Stepper driver (A4988 / DRV8825 step-dir interface)
// ---------------------------------------------------------------------------

/// Digital output: one rising edge per motor step.
pub const STEPPER_STEP_GPIO: i32 = 15;
/// Digital output: LOW = forward (lowering), HIGH = backward (raising).
pub const STEPPER_DIR_GPIO: i32 = 16;
/// Digital output: driver enable, active LOW.
pub const STEPPER_ENABLE_GPIO: i32 = 17;

// ---------------------------------------------------------------------------
// WS2812 strip (single data line, bottom zone first)
// ---------------------------------------------------------------------------

/// RMT-driven data line for the addressable strip.
pub const LED_DATA_GPIO: i32 = 18;
