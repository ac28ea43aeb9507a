//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ FlagService (domain)
//! ```
//!
//! Driven adapters (limit switches, stepper, LED strip, event sinks,
//! storage, directory announce) implement these traits.  The
//! [`FlagService`](super::service::FlagService) consumes them via
//! generics, so the domain core never touches hardware directly.

use core::task::Poll;
use std::sync::{Arc, Mutex};

use crate::config::FlagConfig;
use crate::drivers::led_patterns::Color;
use crate::error::{AnnounceError, ConfigError, HardwareError};
use crate::fsm::context::Direction;

use super::events::FlagEvent;

// ───────────────────────────────────────────────────────────────
// Limit sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for the two end stops.  Reads must be fast and
/// non-blocking; they run inside the tick.
pub trait LimitSensorPort {
    /// `true` when the flag rests on the bottom stop.
    fn read_bottom(&mut self) -> Result<bool, HardwareError>;

    /// `true` when the flag presses the top stop.
    fn read_top(&mut self) -> Result<bool, HardwareError>;
}

// ───────────────────────────────────────────────────────────────
// Stepper port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Asynchronous stepper.  At most one chunk runs at a time.
///
/// `begin_step` hands the chunk off and returns immediately; the result
/// is collected with `poll_step` on a later tick.
pub trait StepperPort {
    /// Start moving `steps` steps in `direction`.  Fails with
    /// [`HardwareError::StepperBusy`] if a chunk is already running.
    fn begin_step(&mut self, direction: Direction, steps: u32) -> Result<(), HardwareError>;

    /// `Ready` exactly once per accepted chunk.
    fn poll_step(&mut self) -> Poll<Result<(), HardwareError>>;
}

// ───────────────────────────────────────────────────────────────
// LED strip port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Full-strip render.  `frame` is bottom zone first.
pub trait LedStripPort {
    fn render(&mut self, frame: &[Color]) -> Result<(), HardwareError>;
}

/// Lets the control loop and the shutdown hook share one strip.
impl<L: LedStripPort> LedStripPort for Arc<Mutex<L>> {
    fn render(&mut self, frame: &[Color]) -> Result<(), HardwareError> {
        self.lock()
            .map_err(|_| HardwareError::LedStrip)?
            .render(frame)
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / WebSocket)
// ───────────────────────────────────────────────────────────────

/// The domain emits [`FlagEvent`]s through this port.  Adapters decide
/// where they go (serial log, WebSocket clients, ...).
pub trait EventSink {
    fn emit(&mut self, event: &FlagEvent);
}

/// Fan one event out to two sinks.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &FlagEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`FlagConfig`].
///
/// Implementations MUST validate before persisting and reject invalid
/// values with [`ConfigError::ValidationFailed`] rather than clamping.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`ConfigError::NotFound`] if nothing was ever saved.
    fn load(&self) -> Result<FlagConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&mut self, config: &FlagConfig) -> Result<(), ConfigError>;
}

/// Load the stored config.  When nothing usable is stored, the defaults
/// are written back so the next boot finds a valid blob.
pub fn load_or_provision(store: &mut impl ConfigPort) -> FlagConfig {
    match store.load().and_then(|c| c.validate().map(|()| c)) {
        Ok(config) => {
            log::info!("Config loaded from storage");
            return config;
        }
        Err(ConfigError::NotFound) => log::info!("No stored config, provisioning defaults"),
        Err(e) => log::warn!("Stored config unusable ({}), provisioning defaults", e),
    }

    let config = FlagConfig::default();
    if let Err(e) = store.save(&config) {
        log::warn!("Could not persist default config: {}", e);
    }
    config
}

// ───────────────────────────────────────────────────────────────
// Announce port (driven adapter: domain → directory service)
// ───────────────────────────────────────────────────────────────

/// Fire-and-forget registration with the flag directory.
pub trait AnnouncePort {
    /// POST to `url`.  Returns the HTTP status on success.
    fn announce(&mut self, url: &str) -> Result<u16, AnnounceError>;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the jobs it triggers)
// ───────────────────────────────────────────────────────────────

/// Callback trait that the scheduler invokes when a schedule fires.
pub trait SchedulerDelegate {
    /// * `label`: the label of the schedule that fired.
    /// * `kind` : whether it was a periodic or one-shot fire.
    fn on_schedule_fired(&mut self, label: &str, kind: ScheduleFiredKind);
}

/// Discriminant passed to [`SchedulerDelegate::on_schedule_fired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleFiredKind {
    /// A recurring periodic schedule fired.
    Periodic,
    /// A one-shot schedule fired (auto-disables after).
    OneShot,
}
