//! Stepper motor driver and its worker thread.
//!
//! ## Hardware
//!
//! A STEP/DIR driver board (A4988 / DRV8825 class) moves the flag's
//! winding drum.  Each rising edge on STEP advances one step; DIR selects
//! the direction.  The driver's ENABLE input is active LOW and is held
//! low by the binary for the lifetime of the firmware.
//!
//! ## Threading
//!
//! Pulsing a 200-step chunk at 200 rpm takes ~300 ms, which must not
//! block the tick.  The control loop hands a [`StepRequest`] to a worker
//! thread over a one-slot channel and picks up the result from a signal
//! on a later tick:
//!
//! ```text
//!  control loop ──StepRequest──▶ [Channel<1>] ──▶ stepper worker
//!       ▲                                              │
//!       └────────── poll_step ◀── [Signal] ◀── result ─┘
//! ```

use core::task::Poll;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::debug;

use crate::app::ports::StepperPort;
use crate::error::HardwareError;
use crate::fsm::context::{Direction, StepRequest};

use super::task_pin::{Core, spawn_on_core};

// ═══════════════════════════════════════════════════════════════
//  Pulse driver
// ═══════════════════════════════════════════════════════════════

pub struct StepperDriver<S, D, W> {
    step: S,
    dir: D,
    delay: W,
    half_period_us: u32,
}

impl<S: OutputPin, D: OutputPin, W: DelayNs> StepperDriver<S, D, W> {
    pub fn new(step: S, dir: D, delay: W, steps_per_revolution: u32, rpm: u32) -> Self {
        Self {
            step,
            dir,
            delay,
            half_period_us: half_period_us(steps_per_revolution, rpm),
        }
    }

    /// Pulse out one chunk.  Blocks for the duration of the move.
    pub fn run(&mut self, request: StepRequest) -> Result<(), HardwareError> {
        let dir = match request.direction {
            Direction::Forward => self.dir.set_low(),
            Direction::Backward => self.dir.set_high(),
        };
        dir.map_err(|_| HardwareError::StepperIo)?;

        for _ in 0..request.steps {
            self.step.set_high().map_err(|_| HardwareError::StepperIo)?;
            self.delay.delay_us(self.half_period_us);
            self.step.set_low().map_err(|_| HardwareError::StepperIo)?;
            self.delay.delay_us(self.half_period_us);
        }
        Ok(())
    }
}

/// Half of one step period at the given speed.
pub fn half_period_us(steps_per_revolution: u32, rpm: u32) -> u32 {
    let steps_per_minute = u64::from(steps_per_revolution.max(1)) * u64::from(rpm.max(1));
    (60_000_000 / steps_per_minute / 2).max(1) as u32
}

// ═══════════════════════════════════════════════════════════════
//  Worker link
// ═══════════════════════════════════════════════════════════════

/// Shared between the control loop's [`StepperHandle`] and the worker.
pub struct StepperLink {
    requests: Channel<CriticalSectionRawMutex, StepRequest, 1>,
    done: Signal<CriticalSectionRawMutex, Result<(), HardwareError>>,
}

impl StepperLink {
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            done: Signal::new(),
        }
    }
}

impl Default for StepperLink {
    fn default() -> Self {
        Self::new()
    }
}

/// Control-loop side of the worker link.
pub struct StepperHandle {
    link: Arc<StepperLink>,
    busy: bool,
}

impl StepperHandle {
    pub fn new(link: Arc<StepperLink>) -> Self {
        Self { link, busy: false }
    }
}

impl StepperPort for StepperHandle {
    fn begin_step(&mut self, direction: Direction, steps: u32) -> Result<(), HardwareError> {
        if self.busy {
            return Err(HardwareError::StepperBusy);
        }
        self.link
            .requests
            .try_send(StepRequest { direction, steps })
            .map_err(|_| HardwareError::StepperBusy)?;
        self.busy = true;
        Ok(())
    }

    fn poll_step(&mut self) -> Poll<Result<(), HardwareError>> {
        if !self.busy {
            return Poll::Ready(Err(HardwareError::StepperOffline));
        }
        match self.link.done.try_take() {
            Some(result) => {
                self.busy = false;
                Poll::Ready(result)
            }
            None => Poll::Pending,
        }
    }
}

/// Start the worker that executes chunks for `link`.
pub fn spawn_stepper_worker<S, D, W>(
    mut driver: StepperDriver<S, D, W>,
    link: Arc<StepperLink>,
) -> io::Result<JoinHandle<()>>
where
    S: OutputPin + Send + 'static,
    D: OutputPin + Send + 'static,
    W: DelayNs + Send + 'static,
{
    spawn_on_core(Core::App, 5, 4, "stepper\0", move || {
        loop {
            let request = futures_lite::future::block_on(link.requests.receive());
            debug!("stepper: {:?} x{}", request.direction, request.steps);
            let result = driver.run(request);
            link.done.signal(result);
        }
    })
}
