//! End-to-end controller tests: homing, positioning, LED functions and
//! fault handling, all driven through the tick scheduler against the
//! simulated rig.

use buildflag::api::respond;
use buildflag::app::bus::CommandBus;
use buildflag::app::events::FlagEvent;
use buildflag::app::ports::{ScheduleFiredKind, SchedulerDelegate};
use buildflag::app::service::{FlagService, MoveOutcome};
use buildflag::config::FlagConfig;
use buildflag::drivers::led_patterns::{Color, LedFunction, Zone};
use buildflag::fsm::CalibrationState;
use buildflag::fsm::context::Direction;
use buildflag::scheduler::TickScheduler;

use crate::mock_hw::{MockRig, RecordingSink};

/// Reference mast: 81 chunks of 200 steps between the stops.
const TRAVEL: u32 = 16_200;

struct NoJobs;

impl SchedulerDelegate for NoJobs {
    fn on_schedule_fired(&mut self, _label: &str, _kind: ScheduleFiredKind) {}
}

struct Bench {
    config: FlagConfig,
    service: FlagService,
    scheduler: TickScheduler,
    bus: CommandBus,
    rig: MockRig,
    sink: RecordingSink,
}

impl Bench {
    fn new(travel: u32, carriage: u32) -> Self {
        let config = FlagConfig::default();
        let mut sink = RecordingSink::new();
        let mut service = FlagService::new(&config);
        service.start(&mut sink);
        Self {
            scheduler: TickScheduler::new(config.tick_interval_ms),
            config,
            service,
            bus: CommandBus::new(),
            rig: MockRig::new(travel, carriage),
            sink,
        }
    }

    fn tick(&mut self) {
        self.scheduler.run_tick(
            &mut self.service,
            &self.bus,
            &mut self.rig,
            &mut self.sink,
            &mut NoJobs,
        );
    }

    /// Tick until `done` holds; returns the number of ticks taken.
    fn tick_until(&mut self, max: usize, done: impl Fn(&FlagService) -> bool) -> usize {
        for n in 1..=max {
            self.tick();
            if done(&self.service) {
                return n;
            }
        }
        panic!(
            "condition not reached within {max} ticks (state {:?}, position {:?})",
            self.service.state(),
            self.service.position()
        );
    }

    /// Home and wait until the flag has settled back on its target.
    fn settle(&mut self) {
        self.tick_until(1_000, at_rest);
    }

    fn request(&self, path: &str) -> (u16, String) {
        let response = respond(path, &self.bus, &self.config.hostname, &self.config.leds);
        (response.status, response.body)
    }
}

fn at_rest(svc: &FlagService) -> bool {
    let p = svc.position();
    svc.state() == CalibrationState::Idle && !svc.is_stepping() && p.current == p.next
}

fn top_zone(frame: &[Color]) -> &[Color] {
    &frame[16..19]
}

fn bottom_zone(frame: &[Color]) -> &[Color] {
    &frame[..16]
}

// ── Homing ────────────────────────────────────────────────────

#[test]
fn first_status_is_unavailable_while_homing_bottom() {
    let mut bench = Bench::new(TRAVEL, 3_000);
    bench.tick();

    let status = bench.bus.status();
    assert_eq!(status.calibration, CalibrationState::CalibratingBottom);
    assert_eq!(status.current_percent, None);
    assert_eq!(status.next_percent, None);

    let (code, body) = bench.request("/getStatus");
    assert_eq!(code, 200);
    assert!(body.contains(r#""flagPosition":{"current":null,"next":null}"#), "{body}");
    assert!(body.contains(r#""calibration":"CalibratingBottom""#), "{body}");
}

#[test]
fn homing_measures_travel_and_returns_to_bottom() {
    let mut bench = Bench::new(TRAVEL, 1_000);
    bench.tick_until(500, |svc| svc.state().is_calibrated());

    assert_eq!(bench.service.position().top, Some(TRAVEL));
    assert_eq!(bench.service.current_percent(), Some(100));
    // Target was never moved off the bottom.
    assert_eq!(bench.service.next_percent(), Some(0));

    bench.settle();
    assert_eq!(bench.rig.carriage, 0);
    assert_eq!(bench.service.current_percent(), Some(0));
}

#[test]
fn leds_forced_on_while_homing() {
    let mut bench = Bench::new(TRAVEL, 1_000);
    bench.tick();
    let frame = bench.rig.last_frame().to_vec();
    assert_eq!(top_zone(&frame), bench.service.leds().palette(Zone::Top));
    assert_eq!(bottom_zone(&frame), bench.service.leds().palette(Zone::Bottom));
    // The stored functions are still Off.
    assert_eq!(bench.bus.status().top_function, LedFunction::Off);
}

#[test]
fn stuck_top_sensor_stalls_calibration() {
    let mut bench = Bench::new(TRAVEL, 0);
    bench.rig.top_stuck = true;
    for _ in 0..10 {
        bench.tick();
    }
    assert_eq!(bench.service.state(), CalibrationState::UncalibratedTop);
    assert!(bench.rig.chunks.is_empty());
    let (_, body) = bench.request("/getStatus");
    assert!(body.contains(r#""current":null"#), "{body}");
}

#[test]
fn failed_chunk_during_homing_is_retried() {
    let mut bench = Bench::new(TRAVEL, 600);
    bench.tick();
    bench.rig.fail_next_chunk = true;
    bench.tick_until(500, |svc| svc.state().is_calibrated());
    assert_eq!(bench.service.position().top, Some(TRAVEL));
}

// ── Positioning ───────────────────────────────────────────────

#[test]
fn half_mast_on_reference_travel() {
    let mut bench = Bench::new(TRAVEL, 1_000);
    bench.settle();

    let (code, body) = bench.request("/setflag/50");
    assert_eq!((code, body.as_str()), (200, "\"OK\""));

    bench.tick();
    assert_eq!(bench.service.position().next, 8_100);
    bench.settle();

    assert_eq!(bench.service.position().current, 8_100);
    assert_eq!(bench.service.current_percent(), Some(50));
    assert_eq!(bench.rig.carriage, 8_100);
}

#[test]
fn move_converges_within_chunk_bound() {
    let mut bench = Bench::new(TRAVEL, 0);
    bench.settle();
    assert_eq!(bench.service.request_move(50), Ok(MoveOutcome::Accepted));

    let ticks = bench.tick_until(1_000, at_rest);
    // ⌈8100 / 200⌉ chunks, plus the tick that collects the last one.
    assert_eq!(ticks, 8_100_usize.div_ceil(200) + 1);
    assert!(
        bench.rig.chunks.iter().rev().take(41).all(|c| c.direction == Direction::Backward)
    );
}

#[test]
fn repeated_target_while_moving_changes_nothing() {
    let mut bench = Bench::new(TRAVEL, 0);
    bench.settle();
    bench.sink.clear();

    assert_eq!(bench.service.request_move(50), Ok(MoveOutcome::Accepted));
    bench.tick();
    assert_eq!(bench.service.state(), CalibrationState::Moving);
    let events = bench.sink.events.len();

    assert_eq!(bench.service.request_move(50), Ok(MoveOutcome::Unchanged));
    assert_eq!(bench.service.position().next, 8_100);
    assert_eq!(bench.sink.events.len(), events);

    // The same request over the wire is acknowledged and leaves the move alone.
    assert_eq!(bench.request("/setflag/50"), (200, "\"OK\"".to_string()));
    let rest = bench.tick_until(1_000, at_rest);
    assert_eq!(1 + rest, 8_100_usize.div_ceil(200) + 1);

    let positions = bench.sink.positions();
    assert!(positions.iter().all(|&(_, next)| next == 50), "{positions:?}");
    assert!(positions.windows(2).all(|w| w[0] != w[1]), "{positions:?}");
}

#[test]
fn move_before_calibration_is_acknowledged_but_ignored() {
    let mut bench = Bench::new(TRAVEL, 1_000);
    bench.tick();
    let (code, _) = bench.request("/setflag/75");
    assert_eq!(code, 200);
    bench.tick_until(500, |svc| svc.state().is_calibrated());
    assert_eq!(bench.service.next_percent(), Some(0));
}

#[test]
fn out_of_range_percent_is_rejected() {
    let bench = Bench::new(TRAVEL, 0);
    let (code, body) = bench.request("/setflag/101");
    assert_eq!(code, 400);
    assert!(body.contains("error"));
}

#[test]
fn position_events_report_rounded_percentages() {
    let mut bench = Bench::new(TRAVEL, 0);
    bench.settle();
    bench.sink.clear();

    bench.service.request_move(10).unwrap();
    bench.settle();

    let positions = bench.sink.positions();
    // Target moves first, then the measured position follows chunk by chunk.
    assert_eq!(positions.first(), Some(&(0, 10)));
    assert_eq!(positions.get(1), Some(&(1, 10)));
    assert_eq!(positions.last(), Some(&(10, 10)));
}

#[test]
fn settled_flag_is_idle_on_further_ticks() {
    let mut bench = Bench::new(TRAVEL, 0);
    bench.settle();
    let chunks = bench.rig.chunks.len();
    bench.sink.clear();

    for _ in 0..10 {
        bench.tick();
    }

    assert_eq!(bench.rig.chunks.len(), chunks);
    assert!(bench.sink.positions().is_empty());
    assert_eq!(bench.service.state(), CalibrationState::Idle);
}

// ── Faults ────────────────────────────────────────────────────

#[test]
fn sensor_failure_leaves_position_and_state_unchanged() {
    let mut bench = Bench::new(TRAVEL, 0);
    bench.settle();
    bench.service.request_move(80).unwrap();
    bench.tick_until(100, |svc| svc.state() == CalibrationState::Moving);
    bench.tick();

    let position = bench.service.position();
    let state = bench.service.state();
    bench.rig.failing_reads = 1;
    bench.tick();

    assert_eq!(bench.service.position(), position);
    assert_eq!(bench.service.state(), state);

    bench.settle();
    assert_eq!(bench.service.current_percent(), Some(80));
}

#[test]
fn bottom_stop_during_move_snaps_position_and_resumes() {
    let mut bench = Bench::new(TRAVEL, 0);
    bench.settle();
    bench.service.request_move(50).unwrap();
    bench.settle();
    let issued = bench.rig.chunks.len();

    // The flag slipped: physically 300 steps up, logically still at 8100.
    bench.rig.carriage = 300;
    bench.sink.clear();
    bench.service.request_move(10).unwrap();

    bench.tick_until(10, |svc| svc.position().current == 0);
    assert_eq!(bench.rig.carriage, 0);
    assert_eq!(bench.service.state(), CalibrationState::Idle);
    assert_eq!(bench.service.position().next, 1_620);
    assert!(!bench.service.is_stepping());
    // Two downward chunks reached the stop long before the model expected.
    assert_eq!(bench.rig.chunks.len(), issued + 2);
    assert!(bench.rig.chunks[issued..].iter().all(|c| c.direction == Direction::Forward));
    assert_eq!(bench.sink.positions().last(), Some(&(0, 10)));

    bench.settle();
    assert_eq!(bench.service.position().current, 1_620);
    assert_eq!(bench.rig.carriage, 1_620);
    assert_eq!(bench.service.current_percent(), Some(10));
}

#[test]
fn refused_chunk_rolls_the_tick_back() {
    let mut bench = Bench::new(TRAVEL, 0);
    bench.settle();
    bench.service.request_move(30).unwrap();

    bench.rig.refuse_steps = true;
    bench.tick();
    assert_eq!(bench.service.state(), CalibrationState::Idle);
    assert!(!bench.service.is_stepping());

    bench.rig.refuse_steps = false;
    bench.tick();
    assert_eq!(bench.service.state(), CalibrationState::Moving);
    assert!(bench.rig.step_busy());
}

#[test]
fn strip_failure_does_not_stop_positioning_or_events() {
    let mut bench = Bench::new(TRAVEL, 0);
    bench.settle();
    let frames = bench.rig.frames.len();
    bench.sink.clear();

    bench.rig.failing_renders = u32::MAX;
    bench.service.request_move(50).unwrap();
    assert_eq!(bench.request("/setrgbled/function/Blink").0, 200);
    bench.settle();

    assert_eq!(bench.rig.frames.len(), frames);
    assert_eq!(bench.rig.carriage, 8_100);
    assert_eq!(bench.service.current_percent(), Some(50));
    assert_eq!(bench.sink.positions().last(), Some(&(50, 50)));
    assert!(bench.sink.events.contains(&FlagEvent::TopFunctionChanged(LedFunction::Blink)));

    bench.rig.failing_renders = 0;
    bench.tick();
    assert_eq!(bench.rig.frames.len(), frames + 1);
}

// ── LED functions ─────────────────────────────────────────────

#[test]
fn top_blink_alternates_while_bottom_stays_dark() {
    let mut bench = Bench::new(400, 0);
    bench.settle();

    assert_eq!(bench.request("/setrgbled/function/Blink").0, 200);
    assert_eq!(bench.request("/setneopixel/function/Off").0, 200);

    bench.tick();
    let first = bench.rig.last_frame().to_vec();
    bench.tick();
    let second = bench.rig.last_frame().to_vec();

    let palette = bench.service.leds().palette(Zone::Top).to_vec();
    assert_eq!(top_zone(&first), palette.as_slice());
    assert!(top_zone(&second).iter().all(|c| *c == Color::BLACK));
    assert!(bottom_zone(&first).iter().all(|c| *c == Color::BLACK));
    assert!(bottom_zone(&second).iter().all(|c| *c == Color::BLACK));

    assert!(bench.sink.events.contains(&FlagEvent::TopFunctionChanged(LedFunction::Blink)));
}

#[test]
fn top_colors_arrive_in_strip_channel_order() {
    let mut bench = Bench::new(400, 0);
    bench.settle();

    // Red, green and blue as 0xRRGGBB.
    assert_eq!(bench.request("/setrgbled/colors/16711680,65280,255").0, 200);
    assert_eq!(bench.request("/setrgbled/function/On").0, 200);
    bench.tick();

    assert_eq!(
        top_zone(bench.rig.last_frame()),
        &[Color::GREEN, Color::RED, Color::BLUE]
    );
}

#[test]
fn wrong_color_count_never_reaches_the_controller() {
    let mut bench = Bench::new(400, 0);
    bench.settle();
    let before = bench.service.leds().palette(Zone::Bottom).to_vec();

    let (code, body) = bench.request("/setneopixel/colors/1,2,3");
    assert_eq!(code, 400);
    assert!(body.contains("16"), "{body}");
    bench.tick();
    assert_eq!(bench.service.leds().palette(Zone::Bottom), before.as_slice());
}

#[test]
fn unknown_function_name_is_rejected() {
    let bench = Bench::new(400, 0);
    assert_eq!(bench.request("/setrgbled/function/Strobe").0, 400);
    assert_eq!(bench.request("/setrgbled/colour/1,2,3").0, 404);
}
