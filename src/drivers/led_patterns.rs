//! Two-zone LED pattern engine.
//!
//! The strip is split into a bottom zone and a top zone (see
//! [`LedLayout`]).  Each zone carries its own function, palette and
//! animation state.  The tick scheduler calls [`LedPatternEngine::render_frame`]
//! once per tick and pushes the returned buffer to the strip.
//!
//! ## Functions
//!
//! | Function | Frame output                                     |
//! |----------|--------------------------------------------------|
//! | Off      | all black                                        |
//! | On       | palette as stored                                |
//! | Rotate   | palette shifted one pixel further every frame    |
//! | Blink    | palette and all-black on alternate frames        |
//!
//! While the flag is homing the caller passes `force_on = true` and both
//! zones render as `On`; the stored functions and animation state are
//! left untouched.

use core::fmt;
use core::str::FromStr;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::config::LedLayout;
use crate::error::CommandError;

/// Largest zone the fixed-capacity buffers can hold.
pub const MAX_ZONE_LEDS: usize = 32;
/// Largest strip (both zones at capacity).
pub const MAX_STRIP_LEDS: usize = 2 * MAX_ZONE_LEDS;

/// Colors for a single zone, in strip order.
pub type Palette = heapless::Vec<Color, MAX_ZONE_LEDS>;
/// Colors for the whole strip, bottom zone first.
pub type Frame = heapless::Vec<Color, MAX_STRIP_LEDS>;

// ── Color ─────────────────────────────────────────────────────

/// 24-bit packed color, `0xRRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color(u32);

impl Color {
    pub const BLACK: Self = Self(0);
    pub const RED: Self = Self::from_rgb(255, 0, 0);
    pub const GREEN: Self = Self::from_rgb(0, 255, 0);
    pub const BLUE: Self = Self::from_rgb(0, 0, 255);

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Accepts only values that fit in 24 bits.
    pub const fn from_packed(value: u32) -> Option<Self> {
        if value <= 0x00FF_FFFF {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn packed(self) -> u32 {
        self.0
    }

    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn b(self) -> u8 {
        self.0 as u8
    }

    /// Exchange the first two channels.  Maps an `0xRRGGBB` value onto
    /// the `0xGGRRBB` order the top-zone pixels expect, and back.
    pub const fn swap_red_green(self) -> Self {
        Self::from_rgb(self.g(), self.r(), self.b())
    }
}

/// Factory palette: red, green, blue repeating along the strip.
fn default_color(strip_index: usize) -> Color {
    [Color::RED, Color::GREEN, Color::BLUE][strip_index % 3]
}

// ── Zone / function identity ──────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Bottom,
    Top,
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bottom => write!(f, "bottom"),
            Self::Top => write!(f, "top"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LedFunction {
    #[default]
    Off,
    On,
    Rotate,
    Blink,
}

impl LedFunction {
    pub const ALL: [Self; 4] = [Self::Off, Self::On, Self::Rotate, Self::Blink];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::On => "On",
            Self::Rotate => "Rotate",
            Self::Blink => "Blink",
        }
    }
}

impl FromStr for LedFunction {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or(CommandError::UnknownFunction)
    }
}

impl fmt::Display for LedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Per-zone animation state ──────────────────────────────────

struct ZoneState {
    function: LedFunction,
    /// Survives function changes; only Blink frames flip it.
    blink_on: bool,
    rotate_offset: usize,
    palette: Palette,
}

impl ZoneState {
    fn new(palette: Palette) -> Self {
        Self {
            function: LedFunction::Off,
            blink_on: false,
            rotate_offset: 0,
            palette,
        }
    }

    fn paint(&mut self, function: LedFunction, out: &mut [Color]) {
        let n = out.len().min(self.palette.len());
        if n == 0 {
            return;
        }
        match function {
            LedFunction::Off => out.fill(Color::BLACK),
            LedFunction::On => out[..n].copy_from_slice(&self.palette[..n]),
            LedFunction::Rotate => {
                self.rotate_offset = (self.rotate_offset + 1) % n;
                for (i, px) in out[..n].iter_mut().enumerate() {
                    *px = self.palette[(self.rotate_offset + i) % n];
                }
            }
            LedFunction::Blink => {
                self.blink_on = !self.blink_on;
                if self.blink_on {
                    out[..n].copy_from_slice(&self.palette[..n]);
                } else {
                    out.fill(Color::BLACK);
                }
            }
        }
    }
}

// ── Engine ────────────────────────────────────────────────────

/// LED pattern engine. Fixed-capacity buffers, no heap.
pub struct LedPatternEngine {
    layout: LedLayout,
    bottom: ZoneState,
    top: ZoneState,
    frame: Frame,
}

impl LedPatternEngine {
    /// Build an engine for `layout` with the factory palette and both
    /// zones `Off`.  Zones larger than [`MAX_ZONE_LEDS`] are truncated.
    pub fn new(layout: LedLayout) -> Self {
        let layout = LedLayout {
            bottom_leds: layout.bottom_leds.min(MAX_ZONE_LEDS),
            top_leds: layout.top_leds.min(MAX_ZONE_LEDS),
        };
        let palette_for =
            |zone: Zone| -> Palette { layout.zone_range(zone).map(default_color).collect() };
        let frame = core::iter::repeat_n(Color::BLACK, layout.strip_len()).collect();

        Self {
            bottom: ZoneState::new(palette_for(Zone::Bottom)),
            top: ZoneState::new(palette_for(Zone::Top)),
            layout,
            frame,
        }
    }

    pub fn layout(&self) -> LedLayout {
        self.layout
    }

    pub fn function(&self, zone: Zone) -> LedFunction {
        self.zone(zone).function
    }

    pub fn palette(&self, zone: Zone) -> &[Color] {
        &self.zone(zone).palette
    }

    /// Select the function `zone` renders from the next frame on.
    /// Animation phase and offset are kept.
    pub fn set_zone_function(&mut self, zone: Zone, function: LedFunction) {
        self.zone_mut(zone).function = function;
    }

    /// Replace the palette of `zone`.  The list must cover the zone exactly.
    pub fn set_zone_palette(&mut self, zone: Zone, colors: &[Color]) -> Result<(), CommandError> {
        let expected = self.layout.zone_len(zone);
        if colors.len() != expected {
            return Err(CommandError::ColorCount {
                zone,
                expected,
                got: colors.len(),
            });
        }
        let palette = Palette::from_slice(colors).map_err(|()| CommandError::ColorCount {
            zone,
            expected,
            got: colors.len(),
        })?;
        self.zone_mut(zone).palette = palette;
        Ok(())
    }

    /// Advance both zones by one frame and return the full-strip buffer.
    ///
    /// `force_on` renders both zones as `On` without touching their
    /// stored function or animation state.
    pub fn render_frame(&mut self, force_on: bool) -> &[Color] {
        let Self {
            layout,
            bottom,
            top,
            frame,
        } = &mut *self;

        for (zone, state) in [(Zone::Bottom, bottom), (Zone::Top, top)] {
            let function = if force_on { LedFunction::On } else { state.function };
            state.paint(function, &mut frame[layout.zone_range(zone)]);
        }
        trace!("LED frame rendered (force_on={})", force_on);
        &self.frame
    }

    /// Slice of the most recent buffer belonging to `zone`.
    pub fn zone_frame(&self, zone: Zone) -> &[Color] {
        &self.frame[self.layout.zone_range(zone)]
    }

    /// All-black buffer for the full strip.  Does not advance animations.
    pub fn blank(&mut self) -> &[Color] {
        self.frame.fill(Color::BLACK);
        &self.frame
    }

    fn zone(&self, zone: Zone) -> &ZoneState {
        match zone {
            Zone::Bottom => &self.bottom,
            Zone::Top => &self.top,
        }
    }

    fn zone_mut(&mut self, zone: Zone) -> &mut ZoneState {
        match zone {
            Zone::Bottom => &mut self.bottom,
            Zone::Top => &mut self.top,
        }
    }
}
