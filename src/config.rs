//! System configuration parameters
//!
//! All tunable parameters for the flag controller.
//! Values can be overridden by a blob persisted in NVS.

use serde::{Deserialize, Serialize};

use crate::adapters::utils::is_printable_ascii;
use crate::drivers::led_patterns::{MAX_ZONE_LEDS, Zone};
use crate::error::ConfigError;

/// Longest hostname accepted (DNS label limit).
pub const MAX_HOSTNAME_LEN: usize = 63;

/// Physical split of the single WS2812 strip into two zones.
///
/// The bottom zone occupies the first `bottom_leds` pixels, the top zone
/// the `top_leds` pixels that follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedLayout {
    pub bottom_leds: usize,
    pub top_leds: usize,
}

impl LedLayout {
    /// Number of pixels in `zone`.
    pub fn zone_len(&self, zone: Zone) -> usize {
        match zone {
            Zone::Bottom => self.bottom_leds,
            Zone::Top => self.top_leds,
        }
    }

    /// Strip indices covered by `zone`.
    pub fn zone_range(&self, zone: Zone) -> core::ops::Range<usize> {
        match zone {
            Zone::Bottom => 0..self.bottom_leds,
            Zone::Top => self.bottom_leds..self.bottom_leds + self.top_leds,
        }
    }

    /// Total pixels on the strip.
    pub fn strip_len(&self) -> usize {
        self.bottom_leds + self.top_leds
    }
}

impl Default for LedLayout {
    fn default() -> Self {
        Self {
            bottom_leds: 16,
            top_leds: 3,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagConfig {
    // --- Motion ---
    /// Maximum steps issued per stepper chunk.
    pub step_range: u32,
    /// Full steps per motor revolution.
    pub steps_per_revolution: u32,
    /// Motor speed while a chunk runs.
    pub motor_rpm: u32,
    /// `true` when a limit switch reads HIGH at its stop.
    pub limit_active_high: bool,

    // --- LEDs ---
    pub leds: LedLayout,

    // --- Timing ---
    /// Tick scheduler period (milliseconds)
    pub tick_interval_ms: u32,
    /// Directory announce period (seconds)
    pub announce_interval_secs: u32,
    /// Task watchdog timeout (milliseconds)
    pub watchdog_timeout_ms: u32,

    // --- Network ---
    pub hostname: String,
    /// Port the HTTP/WebSocket API listens on.
    pub http_port: u16,
    /// Port advertised to the directory (a reverse proxy may sit in front).
    pub advertised_port: u16,
    /// Directory endpoint receiving `name` / `link` query parameters.
    pub announce_url: String,
}

impl Default for FlagConfig {
    fn default() -> Self {
        Self {
            // Motion
            step_range: 200,
            steps_per_revolution: 200,
            motor_rpm: 200,
            limit_active_high: true,

            // LEDs
            leds: LedLayout::default(),

            // Timing
            tick_interval_ms: 500,
            announce_interval_secs: 240,
            watchdog_timeout_ms: 10_000,

            // Network
            hostname: "buildflag".into(),
            http_port: 3002,
            advertised_port: 3000,
            announce_url: "https://buildflag-hub.herokuapp.com/api/updateTarget".into(),
        }
    }
}

impl FlagConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step_range == 0 {
            return Err(ConfigError::ValidationFailed("step_range must be > 0"));
        }
        if self.steps_per_revolution == 0 || self.motor_rpm == 0 {
            return Err(ConfigError::ValidationFailed(
                "steps_per_revolution and motor_rpm must be > 0",
            ));
        }
        for zone in [Zone::Bottom, Zone::Top] {
            if !(1..=MAX_ZONE_LEDS).contains(&self.leds.zone_len(zone)) {
                return Err(ConfigError::ValidationFailed(
                    "each LED zone needs 1..=MAX_ZONE_LEDS pixels",
                ));
            }
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("tick_interval_ms must be > 0"));
        }
        if self.announce_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "announce_interval_secs must be > 0",
            ));
        }
        if self.watchdog_timeout_ms <= self.tick_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "watchdog_timeout_ms must exceed tick_interval_ms",
            ));
        }
        if self.hostname.is_empty()
            || self.hostname.len() > MAX_HOSTNAME_LEN
            || !is_printable_ascii(&self.hostname)
            || self.hostname.contains(' ')
        {
            return Err(ConfigError::ValidationFailed(
                "hostname must be 1-63 printable ASCII bytes without spaces",
            ));
        }
        if !self.announce_url.starts_with("http://") && !self.announce_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationFailed(
                "announce_url must be an http(s) URL",
            ));
        }
        Ok(())
    }

    /// Announce period expressed in scheduler ticks, rounded up.
    pub fn announce_interval_ticks(&self) -> u64 {
        let ms = self.announce_interval_secs as u64 * 1000;
        ms.div_ceil(self.tick_interval_ms as u64)
    }
}
