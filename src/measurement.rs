// SPDX-License-Identifier: Apache-2.0

//! Shared state between the timed phases and the two interrupt sources that end them.
//!
//! A phase is [armed](MeasurementState::arm) by the sequencer, then claimed exactly once by
//! whichever arrives first: the analog sample that crosses the target
//! ([`MeasurementState::on_sample`]) or the overflow of the elapsed-time counter
//! ([`MeasurementState::on_overflow`]). Claims are made inside a [`critical_section`], so the
//! late source always observes `waiting == false` and leaves `duration` alone.

use core::cell::Cell;

use critical_section::Mutex;

use crate::config::{CHARGE_THRESHOLD, DISCHARGE_THRESHOLD};

/// Level and direction that ends a timed phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThresholdTarget {
    /// Crossed once a sample is at or above the level
    RisingTo(u16),
    /// Crossed once a sample is at or below the level
    FallingTo(u16),
}

impl ThresholdTarget {
    /// Target for the high-resistance charge phase.
    pub const CHARGE: Self = Self::RisingTo(CHARGE_THRESHOLD);
    /// Target for the high-resistance discharge phase.
    pub const DISCHARGE: Self = Self::FallingTo(DISCHARGE_THRESHOLD);

    /// Whether `sample` has reached the target.
    pub fn is_crossed(&self, sample: u16) -> bool {
        match *self {
            Self::RisingTo(level) => sample >= level,
            Self::FallingTo(level) => sample <= level,
        }
    }
}

/// Elapsed ticks of one timed phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingResult {
    /// Ticks from the counter reset to the crossing, or [`TimingResult::SATURATED_TICKS`]
    pub ticks: u16,
    /// The counter overflowed before the target was crossed
    pub saturated: bool,
}

impl TimingResult {
    /// Sentinel tick count of a saturated phase.
    pub const SATURATED_TICKS: u16 = u16::MAX;

    /// Result of a phase that crossed its target after `ticks`.
    pub const fn crossed(ticks: u16) -> Self {
        Self {
            ticks,
            saturated: false,
        }
    }

    /// Result of a phase that timed out.
    pub const fn saturated() -> Self {
        Self {
            ticks: Self::SATURATED_TICKS,
            saturated: true,
        }
    }
}

/// Fields guarded by the [`MeasurementState`] mutex
#[derive(Debug, Clone, Copy)]
struct Slot {
    /// The phase is armed and nothing has claimed it yet
    waiting: bool,
    /// Captured tick count, written once per phase
    duration: u16,
    /// Set together with `duration` when the overflow made the claim
    saturated: bool,
    /// Active target. `None` between phases, when samples are ignored
    target: Option<ThresholdTarget>,
    /// Events that arrived after the phase was already claimed
    late_events: u8,
}

impl Slot {
    /// Idle state: nothing armed
    const IDLE: Self = Self {
        waiting: false,
        duration: 0,
        saturated: false,
        target: None,
        late_events: 0,
    };
}

/// Measurement state shared between the sequencer and the interrupt handlers.
pub struct MeasurementState {
    /// Current phase, only touched inside a critical section
    phase: Mutex<Cell<Slot>>,
}

impl MeasurementState {
    /// Create an idle state, suitable for a `static`.
    pub const fn new() -> Self {
        Self {
            phase: Mutex::new(Cell::new(Slot::IDLE)),
        }
    }

    /// Start a new phase: clear the previous result and wait for `target`.
    pub fn arm(&self, target: ThresholdTarget) {
        critical_section::with(|cs| {
            debug!("critical_section: arm measurement phase");
            self.phase.borrow(cs).set(Slot {
                waiting: true,
                target: Some(target),
                ..Slot::IDLE
            });
        });
    }

    /// End the phase: stop reacting to samples and return its result.
    ///
    /// A phase that was never claimed is reported as saturated.
    pub fn finish(&self) -> TimingResult {
        critical_section::with(|cs| {
            let cell = self.phase.borrow(cs);
            let mut phase = cell.get();
            if phase.waiting {
                Self::claim(&mut phase, TimingResult::SATURATED_TICKS, true);
            }
            phase.target = None;
            cell.set(phase);
            TimingResult {
                ticks: phase.duration,
                saturated: phase.saturated,
            }
        })
    }

    /// Threshold monitor. Called for every new analog sample.
    ///
    /// When `sample` crosses the active target and the phase is still waiting, `ticks` is read
    /// and stored as the phase duration. Returns `true` if this call claimed the phase.
    pub fn on_sample(&self, sample: u16, ticks: impl FnOnce() -> u16) -> bool {
        critical_section::with(|cs| {
            let cell = self.phase.borrow(cs);
            let mut phase = cell.get();
            let Some(target) = phase.target else {
                return false;
            };
            #[cfg(feature = "trace_samples")]
            trace!("sample {=u16} against {}", sample, target);
            if !target.is_crossed(sample) {
                return false;
            }

            let claimed = Self::claim(&mut phase, ticks(), false);
            cell.set(phase);
            claimed
        })
    }

    /// Elapsed-time counter overflow. Stores the saturation sentinel if the phase is still
    /// waiting. Returns `true` if this call claimed the phase.
    pub fn on_overflow(&self) -> bool {
        critical_section::with(|cs| {
            let cell = self.phase.borrow(cs);
            let mut phase = cell.get();
            if phase.target.is_none() {
                return false;
            }

            let claimed = Self::claim(&mut phase, TimingResult::SATURATED_TICKS, true);
            cell.set(phase);
            claimed
        })
    }

    /// Whether the armed phase is still waiting for a crossing or an overflow.
    pub fn is_waiting(&self) -> bool {
        critical_section::with(|cs| self.phase.borrow(cs).get().waiting)
    }

    /// Result of the current phase, or `None` while it is still waiting.
    pub fn result(&self) -> Option<TimingResult> {
        critical_section::with(|cs| {
            let phase = self.phase.borrow(cs).get();
            (!phase.waiting).then_some(TimingResult {
                ticks: phase.duration,
                saturated: phase.saturated,
            })
        })
    }

    /// Crossings or overflows discarded since the phase was armed because it was already claimed.
    pub fn late_events(&self) -> u8 {
        critical_section::with(|cs| self.phase.borrow(cs).get().late_events)
    }

    /// Single-writer rule: only the first event after [`MeasurementState::arm`] writes `duration`.
    fn claim(phase: &mut Slot, duration: u16, saturated: bool) -> bool {
        if phase.waiting {
            phase.duration = duration;
            phase.saturated = saturated;
            phase.waiting = false;
            true
        } else {
            phase.late_events = phase.late_events.saturating_add(1);
            false
        }
    }
}

impl Default for MeasurementState {
    fn default() -> Self {
        Self::new()
    }
}
