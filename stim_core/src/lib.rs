#![forbid(unsafe_code)]

//! Stimulation command model for implanted neurostimulators.
//!
//! This crate provides:
//! - Atoms, functions and commands with validation on every mutation
//! - Repetition-aware traversal of a command's functions
//! - A factory for creating validated building blocks
//! - Protocol files (TOML/JSON) and execution schedule export
//! - The hand-off seam towards the stimulating device

pub mod error;
pub mod limits;
pub mod atom;
pub mod function;
pub mod command;
pub mod traversal;
pub mod factory;
pub mod protocol;
pub mod schedule;
pub mod handoff;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
pub use atom::{AtomKind, SignalFamily, StimulationAtom};
pub use function::StimulationFunction;
pub use command::StimulationCommand;
pub use traversal::{CommandRepetitions, FunctionRepetitions, Functions};
pub use factory::{PulseShape, StimulationFactory};
pub use protocol::{Format, ProtocolFile};
pub use handoff::{check_for_handoff, JsonlRecorder, Stimulator};
pub use config::Config;
