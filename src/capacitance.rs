// SPDX-License-Identifier: Apache-2.0

//! Conversion from combined tick counts to a capacitance.

use crate::config::{MIN_COMBINED_TICKS, SERIES_RESISTANCE_MOHM, TICKS_PER_SECOND};
use crate::measurement::TimingResult;

/// Combined ticks when both the charge and the discharge phase saturated.
pub const SATURATED_COMBINED_TICKS: u32 = 2 * TimingResult::SATURATED_TICKS as u32;

/// Classified result of a measurement run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CapacitanceReading {
    /// Shorter than the timer can resolve
    TooLow,
    /// Both phases timed out
    TooHigh,
    /// Capacitance in microfarads
    Valid(f32),
}

/// Sum of the charge and the discharge tick counts, saturated sentinels included.
pub fn combine(charge: TimingResult, discharge: TimingResult) -> u32 {
    charge.ticks as u32 + discharge.ticks as u32
}

/// Classify a combined tick count.
///
/// Each phase lasts about one time constant, so the sum is close to two of them:
/// `C = t / TICKS_PER_SECOND / (2 * R)`.
pub fn classify(combined_ticks: u32) -> CapacitanceReading {
    if combined_ticks == SATURATED_COMBINED_TICKS {
        CapacitanceReading::TooHigh
    } else if combined_ticks < MIN_COMBINED_TICKS {
        CapacitanceReading::TooLow
    } else {
        CapacitanceReading::Valid(
            combined_ticks as f32 / TICKS_PER_SECOND / (2.0 * SERIES_RESISTANCE_MOHM),
        )
    }
}
