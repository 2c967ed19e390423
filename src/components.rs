// SPDX-License-Identifier: Apache-2.0

//! Basic component traits and the charge/discharge resistor network.

use crate::config::TICK_PERIOD_US;

/// A pin that can drive high, drive low, or float.
pub trait TriStatePin {
    /// Pin error
    type Error;

    /// Drive the pin: high charges the capacitor, low discharges it.
    fn drive(&mut self, high: bool) -> Result<(), Self::Error>;

    /// Stop driving the pin, leaving it high impedance.
    fn release(&mut self) -> Result<(), Self::Error>;
}

/// Selects the path the capacitor charges or discharges through.
///
/// At most one path is connected at a time.
pub trait PathSelector {
    /// Selection error
    type Error;

    /// Connect only the low-resistance path, charging or discharging.
    fn select_low_resistance_path(&mut self, charging: bool) -> Result<(), Self::Error>;

    /// Connect only the high-resistance path, charging or discharging.
    fn select_high_resistance_path(&mut self, charging: bool) -> Result<(), Self::Error>;

    /// Disconnect both paths.
    fn disconnect_all(&mut self) -> Result<(), Self::Error>;
}

/// Free-running elapsed-time counter for the timed phases.
///
/// Overflow is reported separately, by the interrupt that calls
/// [`MeasurementState::on_overflow`](crate::measurement::MeasurementState::on_overflow).
pub trait TickCounter {
    /// Restart counting from zero and re-arm the overflow notification.
    fn reset(&mut self);

    /// Ticks since the last reset. Holds at 65 535 once the full range has elapsed, so a
    /// crossing seen while the overflow interrupt is pending never reads as a short phase.
    fn current_ticks(&self) -> u16;
}

/// Convert microseconds since a counter reset to ticks, holding at `u16::MAX`.
pub const fn ticks_from_micros(elapsed_us: u64) -> u16 {
    let ticks = elapsed_us / TICK_PERIOD_US as u64;
    if ticks > u16::MAX as u64 {
        u16::MAX
    } else {
        ticks as u16
    }
}

/// Resistor network: a low-resistance pin for settling and a high-resistance pin for timing.
///
/// The pin being switched off is always released before the other one drives, so both are
/// never driven together.
pub struct RcNetwork<FAST, SLOW> {
    /// Pin behind the low-resistance path
    fast: FAST,
    /// Pin behind the high-resistance path
    slow: SLOW,
}

impl<FAST, SLOW, E> RcNetwork<FAST, SLOW>
where
    FAST: TriStatePin<Error = E>,
    SLOW: TriStatePin<Error = E>,
{
    /// Take both pins and float them.
    pub fn new(mut fast: FAST, mut slow: SLOW) -> Result<Self, E> {
        fast.release()?;
        slow.release()?;
        Ok(Self { fast, slow })
    }
}

impl<FAST, SLOW, E> PathSelector for RcNetwork<FAST, SLOW>
where
    FAST: TriStatePin<Error = E>,
    SLOW: TriStatePin<Error = E>,
{
    type Error = E;

    fn select_low_resistance_path(&mut self, charging: bool) -> Result<(), E> {
        self.slow.release()?;
        self.fast.drive(charging)
    }

    fn select_high_resistance_path(&mut self, charging: bool) -> Result<(), E> {
        self.fast.release()?;
        self.slow.drive(charging)
    }

    fn disconnect_all(&mut self) -> Result<(), E> {
        self.fast.release()?;
        self.slow.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ADC_FULL_SCALE, OVERFLOW_AFTER_US};
    use crate::measurement::{MeasurementState, ThresholdTarget};
    use core::convert::Infallible;

    /// Pin state as seen from the capacitor
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Level {
        High,
        Low,
        Floating,
    }

    /// Tri-state pin that tracks its level and flags overlapping drives
    struct FakePin {
        level: Level,
    }

    impl TriStatePin for FakePin {
        type Error = Infallible;

        fn drive(&mut self, high: bool) -> Result<(), Infallible> {
            self.level = if high { Level::High } else { Level::Low };
            Ok(())
        }

        fn release(&mut self) -> Result<(), Infallible> {
            self.level = Level::Floating;
            Ok(())
        }
    }

    fn network() -> RcNetwork<FakePin, FakePin> {
        let pin = || FakePin { level: Level::High };
        RcNetwork::new(pin(), pin()).unwrap()
    }

    fn levels(network: &RcNetwork<FakePin, FakePin>) -> (Level, Level) {
        (network.fast.level, network.slow.level)
    }

    #[test]
    fn test_new_floats_both_paths() {
        assert_eq!(levels(&network()), (Level::Floating, Level::Floating));
    }

    #[test]
    fn test_paths_are_exclusive() {
        let mut net = network();
        net.select_low_resistance_path(false).unwrap();
        assert_eq!(levels(&net), (Level::Low, Level::Floating));
        net.select_high_resistance_path(true).unwrap();
        assert_eq!(levels(&net), (Level::Floating, Level::High));
        net.select_low_resistance_path(true).unwrap();
        assert_eq!(levels(&net), (Level::High, Level::Floating));
        net.select_high_resistance_path(false).unwrap();
        assert_eq!(levels(&net), (Level::Floating, Level::Low));
        net.disconnect_all().unwrap();
        assert_eq!(levels(&net), (Level::Floating, Level::Floating));
    }

    #[test]
    fn test_ticks_from_micros() {
        assert_eq!(ticks_from_micros(0), 0);
        assert_eq!(ticks_from_micros(63), 0);
        assert_eq!(ticks_from_micros(64_000), 1000);
        assert_eq!(ticks_from_micros(OVERFLOW_AFTER_US as u64 - 1), u16::MAX);
    }

    #[test]
    fn test_ticks_hold_past_full_range() {
        assert_eq!(ticks_from_micros(OVERFLOW_AFTER_US as u64), u16::MAX);
        assert_eq!(ticks_from_micros(OVERFLOW_AFTER_US as u64 + 640), u16::MAX);
        assert_eq!(ticks_from_micros(u64::MAX), u16::MAX);
    }

    #[test]
    fn test_crossing_before_overflow_interrupt_is_not_short() {
        // Sample drained after the full range but before the alarm interrupt runs
        let state = MeasurementState::new();
        state.arm(ThresholdTarget::CHARGE);
        assert!(state.on_sample(ADC_FULL_SCALE, || {
            ticks_from_micros(OVERFLOW_AFTER_US as u64 + 300)
        }));
        assert!(!state.on_overflow());
        assert_eq!(state.finish().ticks, u16::MAX);
    }
}
