//! Error types for the flag controller firmware.
//!
//! Three families, matching how each is recovered:
//!
//! - [`HardwareError`]: transient sensor / stepper / strip failures.  The
//!   controller logs them and retries on the next tick; they never reach
//!   an HTTP client.
//! - [`CommandError`]: malformed or out-of-range inbound requests, rejected
//!   at the command surface before touching controller state.
//! - [`ConfigError`] / [`AnnounceError`]: boot-time storage and the
//!   periodic directory announce.
//!
//! All variants are `Copy` so they can be passed through the tick path
//! and the stepper completion signal without allocation.

use core::fmt;

use crate::drivers::led_patterns::Zone;

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

/// Which physical end stop a sensor error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Bottom,
    Top,
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bottom => write!(f, "bottom"),
            Self::Top => write!(f, "top"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareError {
    /// GPIO read of a limit switch failed.
    LimitSensor(Limit),
    /// Writing a step or direction pin failed mid-chunk.
    StepperIo,
    /// A chunk was requested while another one is still running.
    StepperBusy,
    /// The stepper worker thread is gone.
    StepperOffline,
    /// The LED strip refused the frame.
    LedStrip,
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LimitSensor(limit) => write!(f, "{limit} limit sensor read failed"),
            Self::StepperIo => write!(f, "stepper pin write failed"),
            Self::StepperBusy => write!(f, "stepper busy"),
            Self::StepperOffline => write!(f, "stepper worker offline"),
            Self::LedStrip => write!(f, "LED strip write failed"),
        }
    }
}

impl std::error::Error for HardwareError {}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Flag position is not an integer in `0..=100`.
    InvalidPercent,
    /// LED function name is not one of Off, On, Rotate, Blink.
    UnknownFunction,
    /// Color list length does not match the zone's LED count.
    ColorCount {
        zone: Zone,
        expected: usize,
        got: usize,
    },
    /// A color entry is not a 24-bit unsigned integer.
    InvalidColor,
    /// No route matches the request path.
    UnknownRoute,
    /// The control loop has not drained earlier commands yet.
    QueueFull,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPercent => write!(f, "position must be an integer between 0 and 100"),
            Self::UnknownFunction => write!(f, "function must be one of Off, On, Rotate, Blink"),
            Self::ColorCount {
                zone,
                expected,
                got,
            } => write!(f, "{zone} zone takes {expected} colors, got {got}"),
            Self::InvalidColor => write!(f, "colors must be integers between 0 and 16777215"),
            Self::UnknownRoute => write!(f, "unknown route"),
            Self::QueueFull => write!(f, "command queue full, retry shortly"),
        }
    }
}

impl std::error::Error for CommandError {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from [`ConfigPort`](crate::app::ports::ConfigPort) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored blob failed to deserialize.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` names the field and the rule.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Announce errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceError {
    /// No IP address yet.
    Offline,
    /// Connection, TLS or request write failed.
    Transport,
    /// The directory answered with a non-2xx status.
    Status(u16),
}

impl fmt::Display for AnnounceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline => write!(f, "no network address"),
            Self::Transport => write!(f, "transport failure"),
            Self::Status(code) => write!(f, "directory replied HTTP {code}"),
        }
    }
}

impl std::error::Error for AnnounceError {}
