// SPDX-License-Identifier: Apache-2.0

//! Compiled-in constants for the measurement and the display.
//!
//! There is no runtime configuration: every value below is fixed when the firmware is built.

/// Largest value produced by the 12-bit ADC.
pub const ADC_FULL_SCALE: u16 = 4095;

/// ADC level at `permille`/1000 of full scale, truncated.
pub const fn full_scale_level(permille: u32) -> u16 {
    (ADC_FULL_SCALE as u32 * permille / 1000) as u16
}

/// Charging stops at one time constant: 1 - 1/e ≈ 63.2% of the supply.
pub const CHARGE_THRESHOLD: u16 = full_scale_level(632);
/// Discharging stops at one time constant: 1/e ≈ 36.8% of the supply.
pub const DISCHARGE_THRESHOLD: u16 = full_scale_level(368);

/// ADC clock divider. With the 48 MHz ADC clock this gives roughly 9.6 ksamples/s.
pub const ADC_CLOCK_DIVIDER: u16 = 4999;

/// Microseconds per elapsed-time tick. 1 MHz / 64 = 15 625 ticks/s nominal.
pub const TICK_PERIOD_US: u32 = 64;
/// Ticks until the 16-bit elapsed-time counter wraps.
pub const TICKS_PER_WRAP: u32 = u16::MAX as u32 + 1;
/// Microseconds from a counter reset to its overflow notification.
pub const OVERFLOW_AFTER_US: u32 = TICKS_PER_WRAP * TICK_PERIOD_US;

/// Measured tick rate of the elapsed-time counter, in ticks per second.
pub const TICKS_PER_SECOND: f32 = 15624.76158;
/// Effective series resistance of the high-resistance path, in megaohms.
///
/// Seconds divided by megaohms gives microfarads directly.
pub const SERIES_RESISTANCE_MOHM: f32 = 3.5;
/// Combined tick counts below this are under the timer's resolution.
pub const MIN_COMBINED_TICKS: u32 = 109;

/// Time spent on each settling phase through the low-resistance path.
pub const SETTLE_MS: u32 = 1000;
/// Sleep between checks while a timed phase is waiting for its result.
pub const POLL_INTERVAL_MS: u32 = 5;

/// Period of the display multiplexer tick. All four digits refresh at ~62 Hz.
pub const DISPLAY_REFRESH_US: u32 = 4000;
/// Half-period of the shift register clock and width of the latch pulse.
pub const SHIFT_BIT_DELAY_US: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_bracket_half_scale() {
        assert_eq!(CHARGE_THRESHOLD, 2588);
        assert_eq!(DISCHARGE_THRESHOLD, 1506);
        assert!(DISCHARGE_THRESHOLD < ADC_FULL_SCALE / 2);
        assert!(CHARGE_THRESHOLD > ADC_FULL_SCALE / 2);
    }

    #[test]
    fn test_overflow_timeout() {
        // 65 536 ticks at 64 us each
        assert_eq!(OVERFLOW_AFTER_US, 4_194_304);
    }
}
