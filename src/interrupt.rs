// SPDX-License-Identifier: Apache-2.0

//! Interrupt and exception handlers, plus the state they share with the sequencer.

use crate::{measurement::MeasurementState, multiplex::DisplayBuffer};

/// Phase state written by the sample and overflow interrupts
pub static MEASUREMENT: MeasurementState = MeasurementState::new();

/// Digits shown by the display multiplexer
pub static DISPLAY: DisplayBuffer = DisplayBuffer::new();

#[cfg(feature = "rp2040")]
mod handlers {
    use cortex_m_rt::exception;
    use rp2040_hal::pac::interrupt;

    use super::{DISPLAY, MEASUREMENT};
    use crate::{
        board::{SharedTicks, ADC_FIFO, ELAPSED_TICKS, MULTIPLEXER},
        components::TickCounter,
    };

    /// Threshold monitor: check every queued sample against the active target.
    #[interrupt]
    fn ADC_IRQ_FIFO() {
        critical_section::with(|cs| {
            let mut fifo = ADC_FIFO.borrow_ref_mut(cs);
            let Some(fifo) = fifo.as_mut() else {
                return;
            };
            while fifo.len() > 0 {
                let sample = fifo.read();
                if MEASUREMENT.on_sample(sample, || SharedTicks.current_ticks()) {
                    debug!("threshold crossed at sample {=u16}", sample);
                }
            }
        });
    }

    /// Elapsed-time counter overflow.
    #[interrupt]
    fn TIMER_IRQ_0() {
        critical_section::with(|cs| {
            if let Some(ticks) = ELAPSED_TICKS.borrow_ref_mut(cs).as_mut() {
                ticks.acknowledge_overflow();
            }
        });
        if MEASUREMENT.on_overflow() {
            debug!("elapsed-time counter overflowed");
        }
    }

    /// Display multiplexer tick.
    #[exception]
    fn SysTick() {
        critical_section::with(|cs| {
            if let Some(mux) = MULTIPLEXER.borrow_ref_mut(cs).as_mut() {
                if mux.tick(&DISPLAY).is_err() {
                    warn!("display refresh failed");
                }
            }
        });
    }
}
