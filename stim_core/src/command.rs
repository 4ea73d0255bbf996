//! Stimulation commands: the unit handed to the implant for execution.
//!
//! A command owns an ordered sequence of complete stimulation functions. The
//! whole sequence can be repeated, independently of each function's own
//! repetitions, and carries a tracing id that correlates its execution with
//! external logs.

use crate::function::StimulationFunction;
use crate::traversal::{CommandRepetitions, FunctionRepetitions, Functions};
use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StimulationCommand {
    functions: Vec<StimulationFunction>,
    repetitions: u16,
    tracing_id: u16,
    name: String,
}

impl StimulationCommand {
    pub(crate) fn new() -> Self {
        Self {
            functions: Vec::new(),
            repetitions: 1,
            tracing_id: 0,
            name: String::new(),
        }
    }

    /// Append a function; append order is execution order
    ///
    /// The function must have a complete signal form. A function with zero
    /// duration or an unfinished pulse is rejected with
    /// [`Error::InvalidArgument`] and dropped.
    pub fn append(&mut self, function: StimulationFunction) -> Result<()> {
        if function.duration() == 0 {
            tracing::warn!(
                "Rejected function '{}' for command '{}': zero duration",
                function.name(),
                self.name
            );
            return Err(Error::InvalidArgument(format!(
                "function '{}' has zero duration",
                function.name()
            )));
        }
        if !function.is_complete() {
            tracing::warn!(
                "Rejected function '{}' for command '{}': incomplete signal form",
                function.name(),
                self.name
            );
            return Err(Error::InvalidArgument(format!(
                "function '{}' has an incomplete signal form ({} atoms)",
                function.name(),
                function.len()
            )));
        }

        tracing::debug!(
            "Appended function '{}' ({} us) to command '{}'",
            function.name(),
            function.duration(),
            self.name
        );
        self.functions.push(function);
        Ok(())
    }

    /// Functions in append order, unaware of any repetitions
    pub fn functions(&self) -> Functions<'_> {
        Functions::new(&self.functions)
    }

    /// Functions in append order, repeated per command repetition
    pub fn command_repetition_aware_functions(&self) -> CommandRepetitions<'_> {
        CommandRepetitions::new(&self.functions, self.repetitions)
    }

    /// Each function repeated per its own repetitions, in a single pass
    pub fn repetition_aware_functions(&self) -> FunctionRepetitions<'_> {
        FunctionRepetitions::new(&self.functions)
    }

    /// Total duration in µs including function and command repetitions
    pub fn duration(&self) -> u64 {
        let single_pass: u64 = self.functions.iter().map(StimulationFunction::duration).sum();
        single_pass * u64::from(self.repetitions)
    }

    /// Number of appended functions
    pub fn size(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Command name; empty if never set
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_tracing_id(&mut self, id: u16) {
        self.tracing_id = id;
    }

    pub fn tracing_id(&self) -> u16 {
        self.tracing_id
    }

    /// Set how often the whole function sequence is executed
    pub fn set_repetitions(&mut self, repetitions: u16) -> Result<()> {
        if repetitions < 1 {
            tracing::warn!("Rejected repetitions {} for command '{}'", repetitions, self.name);
            return Err(Error::InvalidArgument(
                "command repetitions must be at least 1".into(),
            ));
        }
        self.repetitions = repetitions;
        Ok(())
    }

    pub fn repetitions(&self) -> u16 {
        self.repetitions
    }
}
