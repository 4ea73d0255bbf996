//! Factory for stimulation commands, functions and atoms.
//!
//! Typical usage:
//! 1. Create an empty command.
//! 2. Create an empty function and set its repetitions and electrodes.
//! 3. Create atoms and append them to the function.
//! 4. Append the function to the command.
//! 5. Repeat 2-4 until all functions are added.

use crate::atom::{AtomKind, StimulationAtom};
use crate::limits::{COUNTER_AMPLITUDE_DIVISOR, COUNTER_DURATION_FACTOR};
use crate::{Error, Result, StimulationCommand, StimulationFunction};
use serde::{Deserialize, Serialize};

/// Parameters of a biphasic pulse; the counter pulse is derived
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PulseShape {
    /// Main pulse amplitude in µA
    pub amplitude: i32,
    /// Main pulse duration in µs
    pub duration: u32,
    /// Dead zone between main and counter pulse in µs
    pub dead_zone_0: u32,
    /// Pause after the pulse in µs
    pub dead_zone_1: u32,
}

/// Creates empty commands and functions, and atoms to fill them
#[derive(Clone, Copy, Debug, Default)]
pub struct StimulationFactory;

impl StimulationFactory {
    pub fn new() -> Self {
        Self
    }

    /// Empty command: no functions, one repetition, tracing id 0
    pub fn create_command(&self) -> StimulationCommand {
        StimulationCommand::new()
    }

    /// Empty function: no atoms, one repetition, no electrodes
    pub fn create_function(&self) -> StimulationFunction {
        StimulationFunction::new()
    }

    pub fn create_main_pulse_atom(&self, amplitude: i32, duration: u32) -> StimulationAtom {
        StimulationAtom::new(AtomKind::MainPulse, amplitude, duration)
    }

    pub fn create_dead_zone_atom(&self, amplitude: i32, duration: u32) -> StimulationAtom {
        StimulationAtom::new(AtomKind::DeadZone, amplitude, duration)
    }

    pub fn create_counter_pulse_atom(&self, amplitude: i32, duration: u32) -> StimulationAtom {
        StimulationAtom::new(AtomKind::CounterPulse, amplitude, duration)
    }

    pub fn create_pause_atom(&self, duration: u32) -> StimulationAtom {
        StimulationAtom::new(AtomKind::Pause, 0, duration)
    }

    /// Atom of an arbitrary kind, e.g. when reading a protocol file
    pub fn create_atom(&self, kind: AtomKind, amplitude: i32, duration: u32) -> StimulationAtom {
        StimulationAtom::new(kind, amplitude, duration)
    }

    /// Complete five-atom pulse function for `shape`
    ///
    /// Every atom goes through [`StimulationFunction::append`], so the shape
    /// is subject to the same limits as hand-built pulses.
    pub fn create_pulse_function(&self, shape: &PulseShape) -> Result<StimulationFunction> {
        let counter_duration = shape
            .duration
            .checked_mul(COUNTER_DURATION_FACTOR)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "main pulse duration {} us is too long",
                    shape.duration
                ))
            })?;

        let mut function = self.create_function();
        function.append(self.create_main_pulse_atom(shape.amplitude, shape.duration))?;
        function.append(self.create_dead_zone_atom(0, shape.dead_zone_0))?;
        function.append(self.create_counter_pulse_atom(
            -shape.amplitude / COUNTER_AMPLITUDE_DIVISOR,
            counter_duration,
        ))?;
        function.append(self.create_dead_zone_atom(0, shape.dead_zone_0))?;
        function.append(self.create_dead_zone_atom(0, shape.dead_zone_1))?;
        Ok(function)
    }

    /// Complete single-atom pause function
    pub fn create_pause_function(&self, duration: u32) -> Result<StimulationFunction> {
        let mut function = self.create_function();
        function.append(self.create_pause_atom(duration))?;
        Ok(function)
    }
}
