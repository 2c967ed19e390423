// SPDX-License-Identifier: Apache-2.0

//! RP2040 implementations of the component traits, and the peripherals owned by interrupts.
//!
//! Pin assignment:
//!
//! | Signal                     | Pin    |
//! |----------------------------|--------|
//! | Shift register data        | GPIO2  |
//! | Shift register clock       | GPIO3  |
//! | Shift register latch       | GPIO4  |
//! | High-resistance path       | GPIO5  |
//! | Low-resistance path        | GPIO6  |
//! | Capacitor voltage (ADC0)   | GPIO26 |

use core::{cell::RefCell, convert::Infallible};

use critical_section::Mutex;
use embedded_hal::digital::{OutputPin, PinState};
use rp2040_hal::{
    adc::AdcFifo,
    fugit::MicrosDurationU64,
    gpio::{
        bank0::{Gpio2, Gpio3, Gpio4},
        FunctionSio, OutputEnableOverride, Pin, PinId, PullDown, PullType, SioOutput,
    },
    timer::{Alarm, Alarm0, Instant},
    Timer,
};

use crate::{
    components::{ticks_from_micros, TickCounter, TriStatePin},
    config::OVERFLOW_AFTER_US,
    multiplex::{Multiplexer, ShiftRegisterDisplay},
};

/// Push-pull output used for the display lines
pub type DisplayPin<I> = Pin<I, FunctionSio<SioOutput>, PullDown>;

/// Display driver on GPIO2-4, timed by the system timer
pub type Display = ShiftRegisterDisplay<DisplayPin<Gpio2>, DisplayPin<Gpio3>, DisplayPin<Gpio4>, Timer>;

/// Multiplexer refreshed by SysTick
pub static MULTIPLEXER: Mutex<RefCell<Option<Multiplexer<Display>>>> =
    Mutex::new(RefCell::new(None));

/// Free-running ADC FIFO feeding the threshold monitor
pub static ADC_FIFO: Mutex<RefCell<Option<AdcFifo<'static, u16>>>> =
    Mutex::new(RefCell::new(None));

/// Elapsed-time counter, shared by the sequencer and both measurement interrupts
pub static ELAPSED_TICKS: Mutex<RefCell<Option<ElapsedTicks>>> = Mutex::new(RefCell::new(None));

/// Path pins float by disabling the output driver instead of switching to an input.
impl<I: PinId, P: PullType> TriStatePin for Pin<I, FunctionSio<SioOutput>, P> {
    type Error = Infallible;

    fn drive(&mut self, high: bool) -> Result<(), Infallible> {
        self.set_state(PinState::from(high))?;
        self.set_output_enable_override(OutputEnableOverride::DontInvert);
        Ok(())
    }

    fn release(&mut self) -> Result<(), Infallible> {
        self.set_output_enable_override(OutputEnableOverride::Disable);
        self.set_low()
    }
}

/// 16-bit tick counter derived from the 1 MHz system timer, with alarm 0 as its overflow.
pub struct ElapsedTicks {
    /// Microsecond time base
    timer: Timer,
    /// Fires [`OVERFLOW_AFTER_US`] after each reset
    alarm: Alarm0,
    /// Time of the last reset
    start: Instant,
}

impl ElapsedTicks {
    /// Take the timer and its first alarm. The alarm interrupt is enabled but not scheduled.
    pub fn new(timer: Timer, mut alarm: Alarm0) -> Self {
        alarm.enable_interrupt();
        Self {
            timer,
            alarm,
            start: timer.get_counter(),
        }
    }

    /// Move the zero point to now and schedule the overflow from that same instant.
    fn reset(&mut self) {
        self.start = self.timer.get_counter();
        self.alarm.clear_interrupt();
        let overflow_at = self.start + MicrosDurationU64::micros(OVERFLOW_AFTER_US as u64);
        if self.alarm.schedule_at(overflow_at).is_err() {
            warn!("Unable to schedule elapsed-time overflow alarm");
        }
    }

    /// Ticks since the last reset, held at `u16::MAX` until the alarm ends the phase.
    fn ticks(&self) -> u16 {
        let elapsed_us = self
            .timer
            .get_counter()
            .ticks()
            .saturating_sub(self.start.ticks());
        ticks_from_micros(elapsed_us)
    }

    /// Clear the alarm interrupt flag after an overflow.
    pub fn acknowledge_overflow(&mut self) {
        self.alarm.clear_interrupt();
    }
}

/// Handle to [`ELAPSED_TICKS`] usable from thread mode and interrupts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedTicks;

impl TickCounter for SharedTicks {
    fn reset(&mut self) {
        critical_section::with(|cs| match ELAPSED_TICKS.borrow_ref_mut(cs).as_mut() {
            Some(ticks) => ticks.reset(),
            None => warn!("Elapsed-time counter reset before initialization"),
        });
    }

    fn current_ticks(&self) -> u16 {
        critical_section::with(|cs| {
            ELAPSED_TICKS
                .borrow_ref(cs)
                .as_ref()
                .map_or(0, ElapsedTicks::ticks)
        })
    }
}
