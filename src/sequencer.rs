// SPDX-License-Identifier: Apache-2.0

//! The five-phase charge/discharge sequence that produces one capacitance reading.
//!
//! ```text
//! InitialDischarge -> ChargeMeasure -> QuickCharge -> DischargeMeasure -> FinalDischarge
//! ```
//!
//! Settling phases hold the low-resistance path for [`SETTLE_MS`]. Measured phases switch to the
//! high-resistance path, reset the tick counter and poll [`MeasurementState`] until an interrupt
//! claims the phase.

use embedded_hal::delay::DelayNs;

use crate::capacitance::{classify, combine, CapacitanceReading};
use crate::components::{PathSelector, TickCounter};
use crate::config::{OVERFLOW_AFTER_US, POLL_INTERVAL_MS, SETTLE_MS};
use crate::display::{encode, phase_indicator, DisplayFrame};
use crate::measurement::{MeasurementState, ThresholdTarget, TimingResult};
use crate::multiplex::{DisplayBuffer, Position};

/// Polls before a measured phase gives up on its overflow interrupt. Twice the overflow time.
const MAX_POLLS: u32 = 2 * OVERFLOW_AFTER_US / (POLL_INTERVAL_MS * 1000) + 1;

/// Phases of a measurement run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Empty the capacitor through the low-resistance path
    InitialDischarge,
    /// Time the charge through the high-resistance path
    ChargeMeasure,
    /// Fill the capacitor through the low-resistance path
    QuickCharge,
    /// Time the discharge through the high-resistance path
    DischargeMeasure,
    /// Leave the capacitor discharged
    FinalDischarge,
}

impl Phase {
    /// Whether the capacitor is being charged in this phase.
    pub const fn charging(self) -> bool {
        matches!(self, Phase::ChargeMeasure | Phase::QuickCharge)
    }
}

/// A phase timed through the high-resistance path, with the target that ends it and the digit
/// that shows whether it timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimedPhase {
    /// [`Phase::ChargeMeasure`]
    Charge,
    /// [`Phase::DischargeMeasure`]
    Discharge,
}

impl TimedPhase {
    /// Position in the phase sequence.
    pub const fn phase(self) -> Phase {
        match self {
            TimedPhase::Charge => Phase::ChargeMeasure,
            TimedPhase::Discharge => Phase::DischargeMeasure,
        }
    }

    /// Threshold that ends the phase.
    pub const fn target(self) -> ThresholdTarget {
        match self {
            TimedPhase::Charge => ThresholdTarget::CHARGE,
            TimedPhase::Discharge => ThresholdTarget::DISCHARGE,
        }
    }

    /// Digit that shows the phase's timeout indicator.
    pub const fn indicator(self) -> Position {
        match self {
            TimedPhase::Charge => Position::FIRST,
            TimedPhase::Discharge => Position::SECOND,
        }
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MeasurementOutcome {
    /// Charge phase timing
    pub charge: TimingResult,
    /// Discharge phase timing
    pub discharge: TimingResult,
    /// Sum of both tick counts
    pub combined_ticks: u32,
    /// Classified capacitance
    pub reading: CapacitanceReading,
    /// Frame left on the display
    pub frame: DisplayFrame,
}

/// Runs the measurement sequence once and writes the result to the display buffer.
pub struct Sequencer<'a, P, T, D> {
    /// Charge/discharge path control
    path: P,
    /// Elapsed-time counter
    counter: T,
    /// Settling and polling delays
    delay: D,
    /// State shared with the sample and overflow interrupts
    state: &'a MeasurementState,
    /// Buffer read by the display multiplexer
    display: &'a DisplayBuffer,
}

impl<'a, P, T, D> Sequencer<'a, P, T, D>
where
    P: PathSelector,
    T: TickCounter,
    D: DelayNs,
{
    /// Create a sequencer over its peripherals and the shared state.
    pub fn new(
        path: P,
        counter: T,
        delay: D,
        state: &'a MeasurementState,
        display: &'a DisplayBuffer,
    ) -> Self {
        Self {
            path,
            counter,
            delay,
            state,
            display,
        }
    }

    /// Run all five phases, classify the result and show it.
    ///
    /// Blocks for the duration of the run. There is no way to cancel a phase: each one ends on
    /// its threshold crossing or its counter overflow.
    pub fn run(&mut self) -> Result<MeasurementOutcome, P::Error> {
        self.path.disconnect_all()?;
        self.settle(Phase::InitialDischarge)?;
        let charge = self.measure(TimedPhase::Charge)?;
        self.settle(Phase::QuickCharge)?;
        let discharge = self.measure(TimedPhase::Discharge)?;
        self.settle(Phase::FinalDischarge)?;

        let combined_ticks = combine(charge, discharge);
        let reading = classify(combined_ticks);
        match reading {
            CapacitanceReading::TooLow => error!("capacitance below measurable range"),
            CapacitanceReading::TooHigh => error!("capacitance above measurable range"),
            CapacitanceReading::Valid(uf) => info!("measured {=f32} uF", uf),
        }
        let frame = encode(reading);
        self.display.show(&frame);

        Ok(MeasurementOutcome {
            charge,
            discharge,
            combined_ticks,
            reading,
            frame,
        })
    }

    /// Hold the low-resistance path for the settling time.
    fn settle(&mut self, phase: Phase) -> Result<(), P::Error> {
        info!("{}: settling for {=u32} ms", phase, SETTLE_MS);
        self.path.select_low_resistance_path(phase.charging())?;
        self.delay.delay_ms(SETTLE_MS);
        Ok(())
    }

    /// Time one phase through the high-resistance path and show its indicator.
    fn measure(&mut self, timed: TimedPhase) -> Result<TimingResult, P::Error> {
        let phase = timed.phase();
        let target = timed.target();
        info!("{}: waiting for {}", phase, target);
        self.path.select_high_resistance_path(phase.charging())?;
        self.counter.reset();
        self.state.arm(target);

        let mut polls = 0;
        while self.state.is_waiting() {
            if polls == MAX_POLLS {
                warn!("{}: no overflow interrupt after {=u32} polls", phase, polls);
                break;
            }
            self.delay.delay_ms(POLL_INTERVAL_MS);
            polls += 1;
        }
        let result = self.state.finish();
        let late_events = self.state.late_events();
        if late_events > 0 {
            debug!("{}: {=u8} events after the phase was claimed", phase, late_events);
        }

        if result.saturated {
            warn!("{}: timed out before crossing the threshold", phase);
        } else {
            debug!("{}: crossed after {=u16} ticks", phase, result.ticks);
        }
        self.display
            .set_digit(timed.indicator(), phase_indicator(result.saturated));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ADC_FULL_SCALE, TICKS_PER_WRAP, TICK_PERIOD_US};
    use crate::display::{DigitCode, DigitGlyphs};
    use core::cell::RefCell;
    use core::convert::Infallible;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::vec::Vec;

    /// Connected path, as recorded by the bench
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Path {
        Low(bool),
        High(bool),
        None,
    }

    /// Simulated circuit and interrupt sources
    struct Bench {
        /// Currently connected path
        path: Path,
        /// Every path selection in order
        selections: Vec<Path>,
        /// Ticks since the last counter reset
        elapsed: u32,
        /// Crossing tick of each remaining measured phase, `None` never crosses
        crossings: VecDeque<Option<u16>>,
        /// Crossing tick of the running phase
        crossing: Option<u16>,
        /// Whether the overflow interrupt fires
        overflow_irq: bool,
        /// Total settling time
        settled_ms: u32,
        /// Display contents at the start of every settling delay
        frames: Vec<DisplayFrame>,
    }

    type Shared = Rc<RefCell<Bench>>;

    fn bench(crossings: &[Option<u16>]) -> Shared {
        Rc::new(RefCell::new(Bench {
            path: Path::None,
            selections: Vec::new(),
            elapsed: 0,
            crossings: crossings.iter().copied().collect(),
            crossing: None,
            overflow_irq: true,
            settled_ms: 0,
            frames: Vec::new(),
        }))
    }

    struct FakePath(Shared);

    impl FakePath {
        fn select(&mut self, path: Path) -> Result<(), Infallible> {
            let mut bench = self.0.borrow_mut();
            bench.path = path;
            bench.selections.push(path);
            Ok(())
        }
    }

    impl PathSelector for FakePath {
        type Error = Infallible;

        fn select_low_resistance_path(&mut self, charging: bool) -> Result<(), Infallible> {
            self.select(Path::Low(charging))
        }

        fn select_high_resistance_path(&mut self, charging: bool) -> Result<(), Infallible> {
            self.select(Path::High(charging))
        }

        fn disconnect_all(&mut self) -> Result<(), Infallible> {
            self.select(Path::None)
        }
    }

    struct FakeCounter(Shared);

    impl TickCounter for FakeCounter {
        fn reset(&mut self) {
            let mut bench = self.0.borrow_mut();
            bench.elapsed = 0;
            bench.crossing = bench.crossings.pop_front().flatten();
        }

        fn current_ticks(&self) -> u16 {
            self.0.borrow().elapsed as u16
        }
    }

    /// Delay that lets simulated time pass and raises the interrupts that would fire meanwhile
    struct FakeDelay<'a> {
        bench: Shared,
        state: &'a MeasurementState,
        display: &'a DisplayBuffer,
    }

    impl DelayNs for FakeDelay<'_> {
        fn delay_ns(&mut self, _ns: u32) {}

        fn delay_ms(&mut self, ms: u32) {
            let mut bench = self.bench.borrow_mut();
            let Path::High(charging) = bench.path else {
                bench.settled_ms += ms;
                bench.frames.push(self.display.snapshot());
                return;
            };

            bench.elapsed += ms * 1000 / TICK_PERIOD_US;
            if let Some(crossing) = bench.crossing {
                if bench.elapsed >= crossing as u32 {
                    let sample = if charging { ADC_FULL_SCALE } else { 0 };
                    self.state.on_sample(sample, || crossing);
                }
            } else {
                // Still between the thresholds
                self.state.on_sample(ADC_FULL_SCALE / 2, || 0);
            }
            if bench.overflow_irq && bench.elapsed >= TICKS_PER_WRAP {
                self.state.on_overflow();
            }
        }
    }

    fn run(bench: &Shared) -> MeasurementOutcome {
        let state = MeasurementState::new();
        let display = DisplayBuffer::new();
        let delay = FakeDelay {
            bench: bench.clone(),
            state: &state,
            display: &display,
        };
        let mut sequencer = Sequencer::new(
            FakePath(bench.clone()),
            FakeCounter(bench.clone()),
            delay,
            &state,
            &display,
        );
        let outcome = sequencer.run().unwrap();
        assert_eq!(display.snapshot(), outcome.frame);
        outcome
    }

    #[test]
    fn test_phase_order() {
        let bench = bench(&[Some(500), Some(500)]);
        run(&bench);
        let bench = bench.borrow();
        assert_eq!(
            bench.selections,
            [
                Path::None,
                Path::Low(false),
                Path::High(true),
                Path::Low(true),
                Path::High(false),
                Path::Low(false),
            ]
        );
        assert_eq!(bench.settled_ms, 3 * SETTLE_MS);
    }

    #[test]
    fn test_timed_phases() {
        assert_eq!(TimedPhase::Charge.phase(), Phase::ChargeMeasure);
        assert_eq!(TimedPhase::Charge.target(), ThresholdTarget::CHARGE);
        assert_eq!(TimedPhase::Charge.indicator().index(), 0);
        assert!(TimedPhase::Charge.phase().charging());

        assert_eq!(TimedPhase::Discharge.phase(), Phase::DischargeMeasure);
        assert_eq!(TimedPhase::Discharge.target(), ThresholdTarget::DISCHARGE);
        assert_eq!(TimedPhase::Discharge.indicator().index(), 1);
        assert!(!TimedPhase::Discharge.phase().charging());
    }

    #[test]
    fn test_end_to_end_nanofarads() {
        let bench = bench(&[Some(500), Some(500)]);
        let outcome = run(&bench);
        assert_eq!(outcome.charge, TimingResult::crossed(500));
        assert_eq!(outcome.discharge, TimingResult::crossed(500));
        assert_eq!(outcome.combined_ticks, 1000);
        assert_eq!(outcome.reading, classify(1000));

        // 9.14 nF, truncated
        let digits = outcome.frame.digits();
        assert_eq!(digits[0], DigitGlyphs::NUMERALS[9].with_point());
        assert_eq!(digits[1], DigitGlyphs::NUMERALS[1]);
        assert_eq!(digits[2], DigitGlyphs::NUMERALS[4]);
        assert_eq!(digits[3], DigitGlyphs::NANO);
    }

    #[test]
    fn test_indicators_shown_between_phases() {
        let bench = bench(&[Some(500), None]);
        run(&bench);
        let bench = bench.borrow();
        let frames = &bench.frames;
        assert_eq!(frames[0], DisplayFrame::BLANK);
        // Charge crossed: "0" in the first digit during the quick charge
        assert_eq!(frames[1].digits()[0], DigitGlyphs::NUMERALS[0]);
        assert_eq!(frames[1].digits()[1], DigitCode::BLANK);
        // Discharge timed out: "H" in the second digit during the final discharge
        assert_eq!(frames[2].digits()[0], DigitGlyphs::NUMERALS[0]);
        assert_eq!(frames[2].digits()[1], DigitGlyphs::H);
    }

    #[test]
    fn test_both_phases_saturated() {
        let bench = bench(&[None, None]);
        let outcome = run(&bench);
        assert!(outcome.charge.saturated && outcome.discharge.saturated);
        assert_eq!(outcome.reading, CapacitanceReading::TooHigh);
        assert_eq!(outcome.frame, DisplayFrame::HIGH);
    }

    #[test]
    fn test_single_timeout_still_classified() {
        let bench = bench(&[None, Some(500)]);
        let outcome = run(&bench);
        assert_eq!(outcome.combined_ticks, 65_535 + 500);
        assert!(matches!(outcome.reading, CapacitanceReading::Valid(_)));
    }

    #[test]
    fn test_fast_capacitor_too_low() {
        let bench = bench(&[Some(10), Some(20)]);
        let outcome = run(&bench);
        assert_eq!(outcome.combined_ticks, 30);
        assert_eq!(outcome.reading, CapacitanceReading::TooLow);
        assert_eq!(outcome.frame, DisplayFrame::LOW);
    }

    #[test]
    fn test_lost_overflow_interrupt_is_bounded() {
        let bench = bench(&[None, None]);
        bench.borrow_mut().overflow_irq = false;
        let outcome = run(&bench);
        assert_eq!(outcome.charge, TimingResult::saturated());
        assert_eq!(outcome.discharge, TimingResult::saturated());
        assert_eq!(outcome.reading, CapacitanceReading::TooHigh);
    }
}
