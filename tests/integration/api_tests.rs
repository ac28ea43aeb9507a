//! Command Surface across threads: requests answered on a "server"
//! thread while the control loop owns the service.

use std::sync::Arc;
use std::thread;

use buildflag::api::{event_json, respond};
use buildflag::app::bus::CommandBus;
use buildflag::app::ports::{ScheduleFiredKind, SchedulerDelegate};
use buildflag::app::service::FlagService;
use buildflag::config::FlagConfig;
use buildflag::drivers::led_patterns::LedFunction;
use buildflag::scheduler::TickScheduler;

use crate::mock_hw::{MockRig, RecordingSink};

struct NoJobs;

impl SchedulerDelegate for NoJobs {
    fn on_schedule_fired(&mut self, _label: &str, _kind: ScheduleFiredKind) {}
}

#[test]
fn commands_from_server_thread_reach_the_controller() {
    let config = FlagConfig::default();
    let bus = Arc::new(CommandBus::new());

    let server = {
        let bus = bus.clone();
        let config = config.clone();
        thread::spawn(move || {
            let replies: Vec<u16> = ["/setrgbled/function/Rotate", "/setneopixel/function/On"]
                .iter()
                .map(|path| respond(path, &bus, &config.hostname, &config.leds).status)
                .collect();
            replies
        })
    };
    assert_eq!(server.join().unwrap(), vec![200, 200]);

    let mut sink = RecordingSink::new();
    let mut service = FlagService::new(&config);
    service.start(&mut sink);
    let mut rig = MockRig::new(1_000, 0);
    let mut scheduler = TickScheduler::new(config.tick_interval_ms);
    scheduler.run_tick(&mut service, &bus, &mut rig, &mut sink, &mut NoJobs);

    let status = respond("/getStatus", &bus, &config.hostname, &config.leds);
    let value: serde_json::Value = serde_json::from_str(&status.body).unwrap();
    assert_eq!(value["hostName"], "buildflag");
    assert_eq!(value["rgbLedFunction"], "Rotate");
    assert_eq!(value["neoPixelFunction"], "On");
    assert_eq!(value["calibration"], "UncalibratedTop");
}

#[test]
fn tick_events_render_as_websocket_frames() {
    let config = FlagConfig::default();
    let bus = CommandBus::new();
    let mut sink = RecordingSink::new();
    let mut service = FlagService::new(&config);
    service.start(&mut sink);
    let mut rig = MockRig::new(1_000, 0);
    let mut scheduler = TickScheduler::new(config.tick_interval_ms);

    respond("/setrgbled/function/Blink", &bus, &config.hostname, &config.leds);
    scheduler.run_tick(&mut service, &bus, &mut rig, &mut sink, &mut NoJobs);

    let frames: Vec<String> = sink.events.iter().filter_map(event_json).collect();
    assert_eq!(frames, vec![r#"{"event":"topLed","data":{"topLed":"Blink"}}"#.to_string()]);
    assert_eq!(service.status().top_function, LedFunction::Blink);
}

#[test]
fn status_is_served_without_touching_the_service() {
    let config = FlagConfig::default();
    let bus = CommandBus::new();
    let body = respond("/getStatus?cache=0", &bus, &config.hostname, &config.leds).body;
    assert!(body.starts_with(r#"{"hostName":"buildflag""#), "{body}");
}
