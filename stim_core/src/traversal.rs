//! Lazy producers over the functions of a stimulation command.
//!
//! All producers borrow the command, so it cannot be mutated while one of
//! them is alive. They yield references in append order, never visit atoms,
//! and are not restartable.
//!
//! For a command with functions A (2 repetitions) and B (1 repetition) and
//! 3 command repetitions:
//!
//! | Producer                   | Sequence          |
//! |----------------------------|-------------------|
//! | [`Functions`]              | A B               |
//! | [`CommandRepetitions`]     | A B A B A B       |
//! | [`FunctionRepetitions`]    | A A B             |
//!
//! No producer expands both levels at once; executing `A A B A A B A A B`
//! is left to the hardware-facing side.

use crate::function::StimulationFunction;
use std::iter::FusedIterator;
use std::slice;

/// Each function exactly once; ignores both repetition levels
#[derive(Clone, Debug)]
pub struct Functions<'a> {
    inner: slice::Iter<'a, StimulationFunction>,
}

impl<'a> Functions<'a> {
    pub(crate) fn new(functions: &'a [StimulationFunction]) -> Self {
        Self {
            inner: functions.iter(),
        }
    }
}

impl<'a> Iterator for Functions<'a> {
    type Item = &'a StimulationFunction;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Functions<'_> {}
impl FusedIterator for Functions<'_> {}

/// The whole function sequence, repeated once per command repetition
///
/// Function repetitions are ignored.
#[derive(Clone, Debug)]
pub struct CommandRepetitions<'a> {
    functions: &'a [StimulationFunction],
    passes: usize,
    pass: usize,
    position: usize,
}

impl<'a> CommandRepetitions<'a> {
    pub(crate) fn new(functions: &'a [StimulationFunction], repetitions: u16) -> Self {
        Self {
            functions,
            passes: usize::from(repetitions),
            pass: 0,
            position: 0,
        }
    }

    /// Zero-based command pass of the next item
    pub fn pass(&self) -> usize {
        self.pass
    }

    fn remaining(&self) -> usize {
        if self.functions.is_empty() || self.pass >= self.passes {
            return 0;
        }
        (self.passes - self.pass) * self.functions.len() - self.position
    }
}

impl<'a> Iterator for CommandRepetitions<'a> {
    type Item = &'a StimulationFunction;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pass >= self.passes {
            return None;
        }
        let function = self.functions.get(self.position)?;
        self.position += 1;
        if self.position == self.functions.len() {
            self.position = 0;
            self.pass += 1;
        }
        Some(function)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CommandRepetitions<'_> {}
impl FusedIterator for CommandRepetitions<'_> {}

/// Each function yielded once per function repetition, in a single pass
///
/// Command repetitions are ignored.
#[derive(Clone, Debug)]
pub struct FunctionRepetitions<'a> {
    inner: slice::Iter<'a, StimulationFunction>,
    current: Option<&'a StimulationFunction>,
    remaining_current: u32,
}

impl<'a> FunctionRepetitions<'a> {
    pub(crate) fn new(functions: &'a [StimulationFunction]) -> Self {
        Self {
            inner: functions.iter(),
            current: None,
            remaining_current: 0,
        }
    }
}

impl<'a> Iterator for FunctionRepetitions<'a> {
    type Item = &'a StimulationFunction;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining_current == 0 {
            let function = self.inner.next()?;
            self.current = Some(function);
            self.remaining_current = function.repetitions();
        }
        self.remaining_current -= 1;
        self.current
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest: usize = self
            .inner
            .as_slice()
            .iter()
            .map(|function| function.repetitions() as usize)
            .sum();
        let remaining = self.remaining_current as usize + rest;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FunctionRepetitions<'_> {}
impl FusedIterator for FunctionRepetitions<'_> {}
