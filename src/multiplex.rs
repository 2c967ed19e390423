// SPDX-License-Identifier: Apache-2.0

//! Display buffer and the periodic multiplexer that shows one digit per tick.

use core::sync::atomic::{AtomicU8, Ordering};

use embedded_hal::{delay::DelayNs, digital::OutputPin};

use crate::config::SHIFT_BIT_DELAY_US;
use crate::display::{DigitCode, DisplayFrame, DIGITS};

/// One of the four digit positions, 0 being the leftmost.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Position(u8);

impl Position {
    /// One-hot select codes, active high, upper nibble driven high.
    const SELECT_CODES: [u8; DIGITS] = [0xf1, 0xf2, 0xf4, 0xf8];

    /// Leftmost digit
    pub const FIRST: Self = Self(0);
    /// Second digit from the left
    pub const SECOND: Self = Self(1);

    /// Position at `index`, or `None` past the last digit.
    pub const fn new(index: usize) -> Option<Self> {
        if index < DIGITS {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Digit index, 0 to 3.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Next position, wrapping from the last digit back to the first.
    pub const fn next(self) -> Self {
        Self((self.0 + 1) % DIGITS as u8)
    }

    /// Byte that selects this position on the display.
    pub const fn select_code(self) -> u8 {
        Self::SELECT_CODES[self.0 as usize]
    }
}

/// Digits currently shown. Written by the sequencer, read by the multiplexer tick.
///
/// Each digit is a single atomic byte; there is no lock and no multi-digit transaction.
pub struct DisplayBuffer {
    /// Raw digit codes, most significant first
    digits: [AtomicU8; DIGITS],
}

impl DisplayBuffer {
    /// Buffer with every segment off, suitable for a `static`.
    pub const fn new() -> Self {
        const OFF: AtomicU8 = AtomicU8::new(DigitCode::BLANK.raw());
        Self {
            digits: [OFF; DIGITS],
        }
    }

    /// Code shown at `position`.
    pub fn digit(&self, position: Position) -> DigitCode {
        DigitCode::from_raw(self.digits[position.index()].load(Ordering::Relaxed))
    }

    /// Replace the code at `position`.
    pub fn set_digit(&self, position: Position, code: DigitCode) {
        self.digits[position.index()].store(code.raw(), Ordering::Relaxed);
    }

    /// Replace every digit, one store each.
    pub fn show(&self, frame: &DisplayFrame) {
        for (slot, code) in self.digits.iter().zip(frame.digits()) {
            slot.store(code.raw(), Ordering::Relaxed);
        }
    }

    /// Copy of all four digits.
    pub fn snapshot(&self) -> DisplayFrame {
        let mut frame = DisplayFrame::BLANK;
        for (code, slot) in frame.0.iter_mut().zip(&self.digits) {
            *code = DigitCode::from_raw(slot.load(Ordering::Relaxed));
        }
        frame
    }
}

impl Default for DisplayBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Display peripheral that lights one digit at a time.
pub trait DigitSink {
    /// Transmission error
    type Error;

    /// Light `code` at `position` and nothing else. Fire and forget.
    fn show(&mut self, code: DigitCode, position: Position) -> Result<(), Self::Error>;
}

/// Rotates over the positions, one digit per tick.
pub struct Multiplexer<S> {
    /// Display peripheral
    sink: S,
    /// Position sent on the next tick
    cursor: Position,
}

impl<S: DigitSink> Multiplexer<S> {
    /// Start at position 0.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            cursor: Position::default(),
        }
    }

    /// Position the next tick will send.
    pub fn cursor(&self) -> Position {
        self.cursor
    }

    /// Periodic tick: send the digit under the cursor, then advance it.
    ///
    /// The cursor advances even when the transmission fails, so one bad digit never stalls the
    /// rotation. Returns the position that was sent.
    pub fn tick(&mut self, buffer: &DisplayBuffer) -> Result<Position, S::Error> {
        let position = self.cursor;
        self.cursor = position.next();
        self.sink.show(buffer.digit(position), position)?;
        Ok(position)
    }

    /// Give back the display peripheral.
    pub fn release(self) -> S {
        self.sink
    }
}

/// Two cascaded 74HC595 shift registers driven by three pins.
///
/// Each refresh shifts the digit byte then the position byte, MSB first, and pulses the latch.
pub struct ShiftRegisterDisplay<DATA, CLK, LATCH, D> {
    /// Serial data input
    data: DATA,
    /// Shift clock
    clock: CLK,
    /// Storage register clock
    latch: LATCH,
    /// Bit timing
    delay: D,
}

impl<DATA, CLK, LATCH, D, E> ShiftRegisterDisplay<DATA, CLK, LATCH, D>
where
    DATA: OutputPin<Error = E>,
    CLK: OutputPin<Error = E>,
    LATCH: OutputPin<Error = E>,
    D: DelayNs,
{
    /// Take the pins. Call [`ShiftRegisterDisplay::init`] before the first refresh.
    pub fn new(data: DATA, clock: CLK, latch: LATCH, delay: D) -> Self {
        Self {
            data,
            clock,
            latch,
            delay,
        }
    }

    /// Drive all three lines low.
    pub fn init(&mut self) -> Result<(), E> {
        self.data.set_low()?;
        self.clock.set_low()?;
        self.latch.set_low()
    }

    /// Shift one byte, MSB first.
    fn shift_byte(&mut self, byte: u8) -> Result<(), E> {
        for bit in (0..8).rev() {
            if byte & (1 << bit) != 0 {
                self.data.set_high()?;
            } else {
                self.data.set_low()?;
            }
            self.delay.delay_us(SHIFT_BIT_DELAY_US);
            self.clock.set_high()?;
            self.delay.delay_us(SHIFT_BIT_DELAY_US);
            self.clock.set_low()?;
            self.delay.delay_us(SHIFT_BIT_DELAY_US);
        }
        Ok(())
    }

    /// Give back the pins and delay.
    pub fn release(self) -> (DATA, CLK, LATCH, D) {
        (self.data, self.clock, self.latch, self.delay)
    }
}

impl<DATA, CLK, LATCH, D, E> DigitSink for ShiftRegisterDisplay<DATA, CLK, LATCH, D>
where
    DATA: OutputPin<Error = E>,
    CLK: OutputPin<Error = E>,
    LATCH: OutputPin<Error = E>,
    D: DelayNs,
{
    type Error = E;

    fn show(&mut self, code: DigitCode, position: Position) -> Result<(), E> {
        self.shift_byte(code.raw())?;
        self.shift_byte(position.select_code())?;
        self.latch.set_high()?;
        self.delay.delay_us(SHIFT_BIT_DELAY_US);
        self.latch.set_low()
    }
}
