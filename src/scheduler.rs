//! Tick scheduler.
//!
//! Drives the flag service at a fixed cadence and fires secondary jobs
//! (the directory announce) on tick multiples.  Jobs are reported to a
//! [`SchedulerDelegate`]; the scheduler itself never does network I/O.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        run_tick()                            │
//! │                                                              │
//! │  CommandBus ──drain──▶ FlagService.handle_command()          │
//! │                              │                               │
//! │                              ▼                               │
//! │                     FlagService.tick()                       │
//! │        (limits → FSM → stepper → LED frame → events)         │
//! │                              │                               │
//! │                              ▼                               │
//! │  CommandBus ◀──publish── StatusSnapshot                      │
//! │                              │                               │
//! │                              ▼                               │
//! │  ┌───────────┐  ┌───────────┐                                │
//! │  │ Periodic  │  │ One-Shot  │ ──▶ SchedulerDelegate          │
//! │  └───────────┘  └───────────┘                                │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use core::time::Duration;

use log::{debug, info, warn};

use crate::app::bus::CommandBus;
use crate::app::ports::{
    EventSink, LedStripPort, LimitSensorPort, ScheduleFiredKind, SchedulerDelegate, StepperPort,
};
use crate::app::service::FlagService;

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// A single schedule entry.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Label handed to the delegate (e.g. "announce").
    pub label: &'static str,
    pub kind: ScheduleKind,
    pub enabled: bool,
}

/// When a schedule fires, counted in scheduler ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    /// Fire every `interval_ticks` ticks.
    Periodic { interval_ticks: u64 },
    /// Fire once after `delay_ticks` ticks, then auto-disable.
    /// A delay of 0 fires on the first tick.
    OneShot { delay_ticks: u64 },
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of concurrent schedules (stack-allocated).
const MAX_SCHEDULES: usize = 4;

/// Internal bookkeeping for a live schedule.
#[derive(Debug, Clone)]
struct ScheduleEntry {
    schedule: Schedule,
    elapsed_ticks: u64,
}

pub struct TickScheduler {
    interval: Duration,
    schedules: [Option<ScheduleEntry>; MAX_SCHEDULES],
    ticks: u64,
}

impl TickScheduler {
    pub fn new(tick_interval_ms: u32) -> Self {
        Self {
            interval: Duration::from_millis(u64::from(tick_interval_ms)),
            schedules: [None, None, None, None],
            ticks: 0,
        }
    }

    /// Tick period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// How long to sleep after a tick that took `elapsed` to stay on cadence.
    /// An overrunning tick is followed immediately by the next one.
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        if elapsed > self.interval {
            warn!(
                "Tick overran its {} ms period by {} ms",
                self.interval.as_millis(),
                (elapsed - self.interval).as_millis()
            );
        }
        self.interval.saturating_sub(elapsed)
    }

    /// Add a schedule.  Returns the slot index, or `None` if full.
    pub fn add(&mut self, schedule: Schedule) -> Option<usize> {
        let (i, slot) = self
            .schedules
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())?;
        info!("Scheduler: added '{}' at slot {}", schedule.label, i);
        *slot = Some(ScheduleEntry {
            schedule,
            elapsed_ticks: 0,
        });
        Some(i)
    }

    /// Number of active (enabled) schedules.
    pub fn active_count(&self) -> usize {
        self.schedules
            .iter()
            .filter(|s| s.as_ref().is_some_and(|e| e.schedule.enabled))
            .count()
    }

    /// Run one complete tick.
    ///
    /// Queued commands are applied first, so a command is either fully
    /// visible to this tick or not at all.  Rejected commands are logged
    /// and dropped; they never stop the tick.
    pub fn run_tick(
        &mut self,
        service: &mut FlagService,
        bus: &CommandBus,
        hw: &mut (impl LimitSensorPort + StepperPort + LedStripPort),
        sink: &mut impl EventSink,
        delegate: &mut dyn SchedulerDelegate,
    ) {
        self.ticks += 1;

        let applied = bus.drain(|command| {
            if let Err(e) = service.handle_command(command) {
                warn!("Command rejected: {}", e);
            }
        });
        if applied > 0 {
            debug!("Tick {}: applied {} command(s)", self.ticks, applied);
        }

        service.tick(hw, sink);
        bus.publish(service.status());

        self.fire_due(delegate);
    }

    fn fire_due(&mut self, delegate: &mut dyn SchedulerDelegate) {
        for entry in self.schedules.iter_mut().flatten() {
            if !entry.schedule.enabled {
                continue;
            }
            entry.elapsed_ticks += 1;

            match entry.schedule.kind {
                ScheduleKind::Periodic { interval_ticks } => {
                    if entry.elapsed_ticks >= interval_ticks {
                        debug!("Scheduler: '{}' periodic fire", entry.schedule.label);
                        delegate.on_schedule_fired(entry.schedule.label, ScheduleFiredKind::Periodic);
                        entry.elapsed_ticks = 0;
                    }
                }
                ScheduleKind::OneShot { delay_ticks } => {
                    if entry.elapsed_ticks >= delay_ticks {
                        debug!("Scheduler: '{}' one-shot fire", entry.schedule.label);
                        delegate.on_schedule_fired(entry.schedule.label, ScheduleFiredKind::OneShot);
                        entry.schedule.enabled = false;
                    }
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
