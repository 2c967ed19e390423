//! This [RP2040](https://docs.rs/rp2040-hal) project measures the capacitance of a capacitor by
//! timing how long it takes to charge to 63.2% and discharge to 36.8% of the supply through a
//! known resistance. The result is shown on a four-digit, multiplexed seven-segment display
//! driven by two 74HC595 shift registers.
//!
//! One measurement is made per power cycle:
//!
//! 1. [`sequencer`] runs the five charge/discharge phases. The two timed phases end when the
//!    [`measurement`] state is claimed by a threshold crossing (ADC interrupt) or a counter
//!    overflow (timer interrupt).
//! 2. [`capacitance::classify`] turns the summed tick counts into a reading.
//! 3. [`display::encode`] renders the reading as four digit codes.
//! 4. [`multiplex::Multiplexer`] lights one digit per SysTick, from power-on until power-off.
//!
//! ## Crate features
//!
//! - `defmt`: Logs through [defmt](https://docs.rs/defmt) and derives `defmt::Format` on the
//!   public data types. Without it, log statements compile to nothing, which is how the unit tests
//!   run on the host.
//! - `rp2040`: Enables [`board`], the interrupt handlers in [`interrupt`], and the firmware binary.
//!   Implies `defmt`.
//! - `trace_samples`: Logs every analog sample checked during a timed phase. Very noisy! See
//!   [`measurement::MeasurementState::on_sample`].
//!
//! ## Measuring range
//!
//! | Display | Range                 |
//! |---------|-----------------------|
//! | `D.DDu` | 1 µF and above        |
//! | `DDDn`  | 100 nF to 1 µF        |
//! | `DD.Dn` | 10 nF to 100 nF       |
//! | `D.DDn` | 1 nF to 10 nF         |
//! | `L0W`   | too fast to time      |
//! | `HI6H`  | both phases timed out |
//! | `----`  | no band fits          |
//!
//! ## Demo
//!
//! Classification and encoding are plain functions:
//!
//! ```
//! use rc_capmeter::{
//!     capacitance::{classify, CapacitanceReading},
//!     display::{encode, DisplayFrame},
//! };
//!
//! assert_eq!(classify(131_070), CapacitanceReading::TooHigh);
//! assert_eq!(encode(classify(40)), DisplayFrame::LOW);
//! ```

// Copyright 2024 rc_capmeter contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_auto_cfg), feature(doc_cfg_hide))]

#[macro_use]
mod fmt;

#[cfg(feature = "rp2040")]
pub mod board;
pub mod capacitance;
pub mod components;
pub mod config;
pub mod display;
pub mod interrupt;
pub mod measurement;
pub mod multiplex;
pub mod sequencer;
