//! Command Surface: request parsing and JSON rendering.
//!
//! **Transport-decoupled**: nothing here knows about sockets.  The HTTP
//! adapter hands in a request path and writes back the [`ApiResponse`];
//! the WebSocket adapter forwards whatever [`event_json`] renders.
//!
//! Every request passes through two gates:
//!
//! 1. **Parse**: route and arguments are validated into an
//!    [`ApiRequest`].  Bad input stops here with a [`CommandError`] and
//!    never reaches the control loop.
//! 2. **Queue**: commands are submitted to the [`CommandBus`] and
//!    applied at the start of the next tick.

use serde::Serialize;

use crate::adapters::utils::decode_path_segment;
use crate::app::bus::CommandBus;
use crate::app::commands::FlagCommand;
use crate::app::events::{FlagEvent, StatusSnapshot};
use crate::config::LedLayout;
use crate::drivers::led_patterns::{Color, LedFunction, Palette, Zone};
use crate::error::CommandError;

/// A validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    GetStatus,
    Command(FlagCommand),
}

/// HTTP status plus JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    fn ok(body: String) -> Self {
        Self { status: 200, body }
    }

    fn error(err: CommandError) -> Self {
        let status = match err {
            CommandError::UnknownRoute => 404,
            CommandError::QueueFull => 503,
            _ => 400,
        };
        let body = serde_json::to_string(&ErrorBody {
            error: &err.to_string(),
        })
        .unwrap_or_default();
        Self { status, body }
    }
}

// ───────────────────────────────────────────────────────────────
// Parsing
// ───────────────────────────────────────────────────────────────

/// Parse a request path such as `/setflag/40` or
/// `/setneopixel/colors/255,65280`.  Any query string is ignored.
pub fn parse_request(path: &str, layout: &LedLayout) -> Result<ApiRequest, CommandError> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    let route = (segments.next(), segments.next(), segments.next(), segments.next());

    let command = match route {
        (Some("getStatus"), None, None, None) => return Ok(ApiRequest::GetStatus),
        (Some("setflag"), Some(percent), None, None) => {
            FlagCommand::SetFlagPosition(parse_percent(percent)?)
        }
        (Some(prefix), Some("function"), Some(name), None) => {
            FlagCommand::SetZoneFunction(zone_for(prefix)?, parse_function(name)?)
        }
        (Some(prefix), Some("colors"), Some(list), None) => {
            let zone = zone_for(prefix)?;
            FlagCommand::SetZoneColors(zone, parse_colors(list, zone, layout)?)
        }
        _ => return Err(CommandError::UnknownRoute),
    };
    Ok(ApiRequest::Command(command))
}

/// `setrgbled` addresses the top zone, `setneopixel` the bottom zone.
fn zone_for(prefix: &str) -> Result<Zone, CommandError> {
    match prefix {
        "setrgbled" => Ok(Zone::Top),
        "setneopixel" => Ok(Zone::Bottom),
        _ => Err(CommandError::UnknownRoute),
    }
}

fn parse_percent(raw: &str) -> Result<u8, CommandError> {
    match raw.parse::<u8>() {
        Ok(p) if p <= 100 => Ok(p),
        _ => Err(CommandError::InvalidPercent),
    }
}

fn parse_function(raw: &str) -> Result<LedFunction, CommandError> {
    decode_path_segment(raw)
        .ok_or(CommandError::UnknownFunction)?
        .parse()
}

/// Decimal packed RGB values, comma separated.  The list must cover the
/// zone exactly.  Top zone colors are reordered to the strip's GRB order.
fn parse_colors(raw: &str, zone: Zone, layout: &LedLayout) -> Result<Palette, CommandError> {
    let decoded = decode_path_segment(raw).ok_or(CommandError::InvalidColor)?;
    let expected = layout.zone_len(zone);

    let mut palette = Palette::new();
    let mut got = 0;
    for item in decoded.split(',') {
        let color = item
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(Color::from_packed)
            .ok_or(CommandError::InvalidColor)?;
        let color = match zone {
            Zone::Top => color.swap_red_green(),
            Zone::Bottom => color,
        };
        got += 1;
        if got <= expected {
            // Overflow is reported as a count mismatch below.
            let _ = palette.push(color);
        }
    }

    if got != expected {
        return Err(CommandError::ColorCount {
            zone,
            expected,
            got,
        });
    }
    Ok(palette)
}

// ───────────────────────────────────────────────────────────────
// JSON rendering
// ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Serialize)]
struct PositionBody {
    current: Option<u8>,
    next: Option<u8>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody<'a> {
    host_name: &'a str,
    flag_position: PositionBody,
    rgb_led_function: &'static str,
    neo_pixel_function: &'static str,
    calibration: &'static str,
}

#[derive(Serialize)]
struct EventBody<T> {
    event: &'static str,
    data: T,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TopLedBody {
    top_led: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BottomLedBody {
    bottom_led: &'static str,
}

/// `getStatus` body.  Percentages are `null` until calibrated.
pub fn status_json(hostname: &str, status: &StatusSnapshot) -> String {
    let body = StatusBody {
        host_name: hostname,
        flag_position: PositionBody {
            current: status.current_percent,
            next: status.next_percent,
        },
        rgb_led_function: status.top_function.as_str(),
        neo_pixel_function: status.bottom_function.as_str(),
        calibration: status.calibration.as_str(),
    };
    serde_json::to_string(&body).unwrap_or_default()
}

/// WebSocket push message for an event, or `None` for events that stay
/// on the device log.
pub fn event_json(event: &FlagEvent) -> Option<String> {
    let rendered = match *event {
        FlagEvent::PositionChanged { current, next } => serde_json::to_string(&EventBody {
            event: "flagPosition",
            data: PositionBody {
                current: Some(current),
                next: Some(next),
            },
        }),
        FlagEvent::TopFunctionChanged(function) => serde_json::to_string(&EventBody {
            event: "topLed",
            data: TopLedBody {
                top_led: function.as_str(),
            },
        }),
        FlagEvent::BottomFunctionChanged(function) => serde_json::to_string(&EventBody {
            event: "bottomLed",
            data: BottomLedBody {
                bottom_led: function.as_str(),
            },
        }),
        FlagEvent::Started(_) | FlagEvent::CalibrationChanged { .. } => return None,
    };
    rendered.ok()
}

// ───────────────────────────────────────────────────────────────
// Request handling
// ───────────────────────────────────────────────────────────────

/// Handle one request end to end.
pub fn respond(path: &str, bus: &CommandBus, hostname: &str, layout: &LedLayout) -> ApiResponse {
    match parse_request(path, layout) {
        Ok(ApiRequest::GetStatus) => ApiResponse::ok(status_json(hostname, &bus.status())),
        Ok(ApiRequest::Command(command)) => match bus.submit(command) {
            Ok(()) => ApiResponse::ok("\"OK\"".into()),
            Err(e) => {
                log::warn!("{}: {}", path, e);
                ApiResponse::error(e)
            }
        },
        Err(e) => {
            log::warn!("Rejected {}: {}", path, e);
            ApiResponse::error(e)
        }
    }
}
