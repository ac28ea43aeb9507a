//! Fuzz target: `api::parse_request`
//!
//! Drives arbitrary request paths through the command parser and asserts
//! that it never panics and that every accepted command is in range.
//!
//! cargo fuzz run fuzz_api_request

#![no_main]

use buildflag::api::{parse_request, ApiRequest};
use buildflag::app::commands::FlagCommand;
use buildflag::config::LedLayout;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(path) = core::str::from_utf8(data) else {
        return;
    };
    let layout = LedLayout::default();

    match parse_request(path, &layout) {
        Ok(ApiRequest::Command(FlagCommand::SetFlagPosition(percent))) => {
            assert!(percent <= 100, "accepted out-of-range percent {percent}");
        }
        Ok(ApiRequest::Command(FlagCommand::SetZoneColors(zone, palette))) => {
            assert_eq!(palette.len(), layout.zone_len(zone));
        }
        _ => {}
    }
});
