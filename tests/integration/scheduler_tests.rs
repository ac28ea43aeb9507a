//! Scheduler wiring: command draining, status publication and the
//! directory announce job, through `TickScheduler::run_tick`.

use std::cell::RefCell;
use std::net::Ipv4Addr;
use std::rc::Rc;

use buildflag::announce::{ANNOUNCE_LABEL, AnnounceJob};
use buildflag::app::bus::{COMMAND_DEPTH, CommandBus};
use buildflag::app::commands::FlagCommand;
use buildflag::app::events::FlagEvent;
use buildflag::app::ports::AnnouncePort;
use buildflag::app::service::FlagService;
use buildflag::config::FlagConfig;
use buildflag::drivers::led_patterns::{Color, LedFunction, Palette, Zone};
use buildflag::error::{AnnounceError, CommandError};
use buildflag::fsm::CalibrationState;
use buildflag::scheduler::{Schedule, ScheduleKind, TickScheduler};

use crate::mock_hw::{MockRig, RecordingSink};

/// Shares what it posted with the test body.
#[derive(Clone, Default)]
struct RecordingAnnouncer {
    urls: Rc<RefCell<Vec<String>>>,
}

impl AnnouncePort for RecordingAnnouncer {
    fn announce(&mut self, url: &str) -> Result<u16, AnnounceError> {
        self.urls.borrow_mut().push(url.to_string());
        Ok(200)
    }
}

struct Loop {
    scheduler: TickScheduler,
    service: FlagService,
    bus: CommandBus,
    rig: MockRig,
    sink: RecordingSink,
    job: AnnounceJob<RecordingAnnouncer>,
    posted: Rc<RefCell<Vec<String>>>,
}

impl Loop {
    fn new(config: &FlagConfig) -> Self {
        let mut sink = RecordingSink::new();
        let mut service = FlagService::new(config);
        service.start(&mut sink);
        let announcer = RecordingAnnouncer::default();
        Self {
            posted: announcer.urls.clone(),
            scheduler: TickScheduler::new(config.tick_interval_ms),
            service,
            bus: CommandBus::new(),
            rig: MockRig::new(1_000, 0),
            sink,
            job: AnnounceJob::new(announcer, config),
        }
    }

    fn job_urls(&self) -> Vec<String> {
        self.posted.borrow().clone()
    }

    fn tick(&mut self) {
        self.scheduler.run_tick(
            &mut self.service,
            &self.bus,
            &mut self.rig,
            &mut self.sink,
            &mut self.job,
        );
    }
}

fn with_announce_schedules(config: &FlagConfig) -> Loop {
    let mut lp = Loop::new(config);
    lp.scheduler.add(Schedule {
        label: ANNOUNCE_LABEL,
        kind: ScheduleKind::OneShot { delay_ticks: 0 },
        enabled: true,
    });
    lp.scheduler.add(Schedule {
        label: ANNOUNCE_LABEL,
        kind: ScheduleKind::Periodic {
            interval_ticks: config.announce_interval_ticks(),
        },
        enabled: true,
    });
    lp
}

#[test]
fn announces_at_boot_and_every_period() {
    let config = FlagConfig::default();
    let mut lp = with_announce_schedules(&config);
    lp.job.set_ip(Some(Ipv4Addr::new(192, 168, 1, 42)));

    lp.tick();
    assert_eq!(lp.job_urls().len(), 1);

    for _ in 1..480 {
        lp.tick();
    }
    // Boot announce plus the first 240 s period.
    assert_eq!(lp.job_urls().len(), 2);
    assert!(lp.job_urls()[1].ends_with("?name=buildflag&link=http://192.168.1.42:3000"));
}

#[test]
fn offline_announce_does_not_disturb_the_tick() {
    let config = FlagConfig::default();
    let mut lp = with_announce_schedules(&config);
    lp.tick();
    assert!(lp.job_urls().is_empty());
    assert_eq!(lp.scheduler.ticks(), 1);
    assert_eq!(lp.bus.status().calibration, CalibrationState::UncalibratedTop);
}

#[test]
fn queued_commands_apply_before_the_tick() {
    let mut lp = Loop::new(&FlagConfig::default());
    lp.bus
        .submit(FlagCommand::SetZoneFunction(Zone::Bottom, LedFunction::Rotate))
        .unwrap();
    assert_eq!(lp.bus.status().bottom_function, LedFunction::Off);

    lp.tick();

    assert_eq!(lp.bus.status().bottom_function, LedFunction::Rotate);
    assert!(
        lp.sink
            .events
            .contains(&FlagEvent::BottomFunctionChanged(LedFunction::Rotate))
    );
}

#[test]
fn rejected_command_is_dropped_and_tick_still_runs() {
    let mut lp = Loop::new(&FlagConfig::default());
    let short = Palette::from_slice(&[Color::RED]).unwrap();
    lp.bus.submit(FlagCommand::SetZoneColors(Zone::Top, short)).unwrap();
    lp.bus
        .submit(FlagCommand::SetZoneFunction(Zone::Top, LedFunction::On))
        .unwrap();

    lp.tick();

    assert_eq!(lp.service.leds().palette(Zone::Top).len(), 3);
    assert_eq!(lp.bus.status().top_function, LedFunction::On);
    assert_eq!(lp.rig.frames.len(), 1);
}

#[test]
fn full_queue_reports_back_pressure() {
    let lp = Loop::new(&FlagConfig::default());
    for _ in 0..COMMAND_DEPTH {
        lp.bus.submit(FlagCommand::SetFlagPosition(10)).unwrap();
    }
    assert_eq!(
        lp.bus.submit(FlagCommand::SetFlagPosition(10)),
        Err(CommandError::QueueFull)
    );
}
