// SPDX-License-Identifier: Apache-2.0

//! Seven-segment glyphs and the encoding of a [`CapacitanceReading`] into a four-digit frame.
//!
//! Segment codes are the raw byte shifted into the display driver: active low, bit order
//! `DP g f e d c b a`. Position 0 is the leftmost (most significant) digit.

use crate::capacitance::CapacitanceReading;

/// Number of digits on the display.
pub const DIGITS: usize = 4;

/// One digit as sent to the display: active-low segments, bit 7 is the decimal point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DigitCode(u8);

impl DigitCode {
    /// All segments off.
    pub const BLANK: Self = Self(0xff);
    /// Middle segment only.
    pub const DASH: Self = Self(0xbf);
    /// Decimal point segment (active low).
    const POINT: u8 = 0x80;

    /// Wrap a raw segment byte.
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    /// Raw segment byte.
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Same digit with the decimal point lit.
    pub const fn with_point(self) -> Self {
        Self(self.0 & !Self::POINT)
    }

    /// Whether the decimal point is lit.
    pub const fn has_point(self) -> bool {
        self.0 & Self::POINT == 0
    }
}

/// Glyph table for the digits and letters the meter shows.
pub struct DigitGlyphs;

impl DigitGlyphs {
    /// Decimal digits 0 to 9
    pub const NUMERALS: [DigitCode; 10] = [
        DigitCode(0xc0),
        DigitCode(0xf9),
        DigitCode(0xa4),
        DigitCode(0xb0),
        DigitCode(0x99),
        DigitCode(0x92),
        DigitCode(0x82),
        DigitCode(0xf8),
        DigitCode(0x80),
        DigitCode(0x90),
    ];
    /// Microfarad unit
    pub const MICRO: DigitCode = DigitCode(0xe3);
    /// Nanofarad unit
    pub const NANO: DigitCode = DigitCode(0xab);
    /// Letter L
    pub const L: DigitCode = DigitCode(0xc7);
    /// Letter H, also marks a timed-out phase
    pub const H: DigitCode = DigitCode(0x89);
    /// Left half of a W
    pub const W_LEFT: DigitCode = DigitCode(0xc3);
    /// Right half of a W
    pub const W_RIGHT: DigitCode = DigitCode(0xe1);

    /// Glyph for the last decimal digit of `value`.
    pub const fn numeral(value: u32) -> DigitCode {
        Self::NUMERALS[(value % 10) as usize]
    }
}

/// Physical unit shown in the last position of a valid reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Unit {
    /// Microfarads
    Micro,
    /// Nanofarads
    Nano,
}

impl Unit {
    /// Glyph of the unit.
    pub const fn glyph(self) -> DigitCode {
        match self {
            Unit::Micro => DigitGlyphs::MICRO,
            Unit::Nano => DigitGlyphs::NANO,
        }
    }
}

/// Four digit codes, most significant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayFrame(pub [DigitCode; DIGITS]);

impl DisplayFrame {
    /// Nothing lit.
    pub const BLANK: Self = Self([DigitCode::BLANK; DIGITS]);
    /// "LOW": capacitance below the timer resolution.
    pub const LOW: Self = Self([
        DigitGlyphs::L,
        DigitGlyphs::NUMERALS[0],
        DigitGlyphs::W_LEFT,
        DigitGlyphs::W_RIGHT,
    ]);
    /// "HIGH": both phases timed out.
    pub const HIGH: Self = Self([
        DigitGlyphs::H,
        DigitGlyphs::NUMERALS[1],
        DigitGlyphs::NUMERALS[6],
        DigitGlyphs::H,
    ]);
    /// "----": a valid reading no band can show.
    pub const OUT_OF_RANGE: Self = Self([DigitCode::DASH; DIGITS]);

    /// Digit codes, most significant first.
    pub fn digits(&self) -> &[DigitCode; DIGITS] {
        &self.0
    }
}

/// One decade band of a valid reading.
///
/// The reading in microfarads is multiplied by `scale`. The band matches when the scaled value
/// is at least 1. Three digits are shown, truncated, then the unit glyph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    /// Multiplier applied to the reading in microfarads
    pub scale: f32,
    /// Index of the digit carrying the decimal point, if any
    pub point: Option<usize>,
    /// Unit glyph in the last position
    pub unit: Unit,
}

/// Bands in evaluation order. The first match wins.
pub static BANDS: [Band; 4] = [
    // D.DDu
    Band {
        scale: 1.0,
        point: Some(0),
        unit: Unit::Micro,
    },
    // DDDn
    Band {
        scale: 10.0,
        point: None,
        unit: Unit::Nano,
    },
    // DD.Dn
    Band {
        scale: 100.0,
        point: Some(1),
        unit: Unit::Nano,
    },
    // D.DDn
    Band {
        scale: 1000.0,
        point: Some(0),
        unit: Unit::Nano,
    },
];

impl Band {
    /// First band whose scaled value reaches 1, or `None` below the last band.
    ///
    /// Readings that would need more than one leading digit, or are not finite, have no band.
    pub fn select(microfarads: f32) -> Option<&'static Band> {
        if !microfarads.is_finite() || microfarads >= 10.0 {
            return None;
        }
        BANDS.iter().find(|band| microfarads * band.scale >= 1.0)
    }

    /// Render `microfarads` in this band.
    pub fn render(&self, microfarads: f32) -> DisplayFrame {
        let scaled = microfarads * self.scale;
        let values = [scaled, scaled * 10.0, scaled * 100.0];

        let mut frame = [self.unit.glyph(); DIGITS];
        for (idx, value) in values.into_iter().enumerate() {
            let glyph = DigitGlyphs::numeral(value as u32);
            frame[idx] = if self.point == Some(idx) {
                glyph.with_point()
            } else {
                glyph
            };
        }
        DisplayFrame(frame)
    }
}

/// Encode a reading into a display frame.
pub fn encode(reading: CapacitanceReading) -> DisplayFrame {
    match reading {
        CapacitanceReading::TooLow => DisplayFrame::LOW,
        CapacitanceReading::TooHigh => DisplayFrame::HIGH,
        CapacitanceReading::Valid(microfarads) => match Band::select(microfarads) {
            Some(band) => band.render(microfarads),
            None => {
                warn!("no display band for reading {=f32} uF", microfarads);
                DisplayFrame::OUT_OF_RANGE
            }
        },
    }
}

/// Per-phase indicator: "0" when the phase crossed its target, "H" when it timed out.
pub fn phase_indicator(saturated: bool) -> DigitCode {
    if saturated {
        DigitGlyphs::H
    } else {
        DigitGlyphs::NUMERALS[0]
    }
}
