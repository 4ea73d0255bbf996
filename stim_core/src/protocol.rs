//! Protocol files describing one stimulation command.
//!
//! Protocols are stored as TOML (`.toml`) or JSON (`.json`). Loading a file
//! only yields a description; [`ProtocolFile::build`] turns it into a
//! command through the factory, so every waveform rule applies.
//!
//! ```toml
//! [command]
//! name = "burst"
//! tracing_id = 7
//! repetitions = 2
//!
//! [[command.functions]]
//! name = "pulse"
//! repetitions = 10
//! source = [7]
//! use_ground = true
//!
//! [command.functions.signal]
//! type = "pulse"
//! amplitude = -1200
//! duration = 200
//! dead_zone_0 = 50
//! dead_zone_1 = 800
//! ```

use crate::atom::{AtomKind, SignalFamily};
use crate::factory::{PulseShape, StimulationFactory};
use crate::{Error, Result, StimulationCommand, StimulationFunction};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;

static EXAMPLE_PROTOCOL: Lazy<ProtocolFile> = Lazy::new(build_example);

/// Root of a protocol file
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolFile {
    pub command: CommandSpec,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandSpec {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub tracing_id: u16,

    #[serde(default = "default_command_repetitions")]
    pub repetitions: u16,

    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionSpec {
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_function_repetitions")]
    pub repetitions: u32,

    #[serde(default)]
    pub source: Vec<u32>,

    #[serde(default)]
    pub destination: Vec<u32>,

    #[serde(default)]
    pub use_ground: bool,

    pub signal: SignalSpec,
}

/// Signal form of a function
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalSpec {
    /// Biphasic pulse; the counter pulse is derived from the main pulse
    Pulse(PulseShape),
    /// Single pause atom
    Pause { duration: u32 },
    /// Explicit atom list, appended one by one
    Atoms { atoms: Vec<AtomSpec> },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AtomSpec {
    pub kind: AtomKind,
    #[serde(default)]
    pub amplitude: i32,
    pub duration: u32,
}

fn default_command_repetitions() -> u16 {
    1
}

fn default_function_repetitions() -> u32 {
    1
}

/// Serialization format, chosen by file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Format::Toml),
            Some("json") => Ok(Format::Json),
            _ => Err(Error::Protocol(format!(
                "{:?}: expected a .toml or .json protocol file",
                path
            ))),
        }
    }
}

impl ProtocolFile {
    /// Load a protocol description from a `.toml` or `.json` file
    pub fn load(path: &Path) -> Result<Self> {
        let format = Format::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;
        let protocol = Self::parse(&contents, format)?;
        tracing::info!(
            "Loaded protocol '{}' with {} functions from {:?}",
            protocol.command.name,
            protocol.command.functions.len(),
            path
        );
        Ok(protocol)
    }

    pub fn parse(contents: &str, format: Format) -> Result<Self> {
        let protocol = match format {
            Format::Toml => toml::from_str(contents)?,
            Format::Json => serde_json::from_str(contents)?,
        };
        Ok(protocol)
    }

    pub fn to_text(&self, format: Format) -> Result<String> {
        match format {
            Format::Toml => toml::to_string_pretty(self)
                .map_err(|e| Error::Protocol(format!("Failed to serialize protocol: {}", e))),
            Format::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }

    /// Save to a `.toml` or `.json` file
    pub fn save(&self, path: &Path) -> Result<()> {
        let format = Format::from_path(path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_text(format)?)?;
        tracing::info!("Saved protocol '{}' to {:?}", self.command.name, path);
        Ok(())
    }

    /// Build the described command
    ///
    /// Validation errors keep their kind and name the offending function.
    pub fn build(&self) -> Result<StimulationCommand> {
        let factory = StimulationFactory::new();
        let spec = &self.command;

        let mut command = factory.create_command();
        command.set_name(spec.name.clone());
        command.set_tracing_id(spec.tracing_id);
        command.set_repetitions(spec.repetitions)?;

        for (index, function_spec) in spec.functions.iter().enumerate() {
            let context = if function_spec.name.is_empty() {
                format!("function {}", index + 1)
            } else {
                format!("function {} '{}'", index + 1, function_spec.name)
            };
            let function = function_spec
                .build(&factory)
                .map_err(|e| with_context(e, &context))?;
            command
                .append(function)
                .map_err(|e| with_context(e, &context))?;
        }

        tracing::debug!(
            "Built command '{}' ({} functions, {} us)",
            command.name(),
            command.size(),
            command.duration()
        );
        Ok(command)
    }

    /// Describe an already built command
    pub fn from_command(command: &StimulationCommand) -> Self {
        ProtocolFile {
            command: CommandSpec {
                name: command.name().to_string(),
                tracing_id: command.tracing_id(),
                repetitions: command.repetitions(),
                functions: command.functions().map(FunctionSpec::from_function).collect(),
            },
        }
    }

    /// Example protocol shipped with the CLI
    pub fn example() -> &'static ProtocolFile {
        &EXAMPLE_PROTOCOL
    }
}

impl FunctionSpec {
    fn build(&self, factory: &StimulationFactory) -> Result<StimulationFunction> {
        let mut function = match &self.signal {
            SignalSpec::Pulse(shape) => factory.create_pulse_function(shape)?,
            SignalSpec::Pause { duration } => factory.create_pause_function(*duration)?,
            SignalSpec::Atoms { atoms } => {
                let mut function = factory.create_function();
                for atom in atoms {
                    function.append(factory.create_atom(atom.kind, atom.amplitude, atom.duration))?;
                }
                function
            }
        };

        function.set_name(self.name.clone());
        function.set_repetitions(self.repetitions)?;
        if !self.source.is_empty() || !self.destination.is_empty() || self.use_ground {
            function.set_virtual_stimulation_electrodes(
                self.source.iter().copied(),
                self.destination.iter().copied(),
                self.use_ground,
            )?;
        }
        Ok(function)
    }

    fn from_function(function: &StimulationFunction) -> Self {
        let (source, destination) = function.virtual_stimulation_electrodes();
        FunctionSpec {
            name: function.name().to_string(),
            repetitions: function.repetitions(),
            source: source.iter().copied().collect(),
            destination: destination.iter().copied().collect(),
            use_ground: function.uses_ground_electrode(),
            signal: SignalSpec::from_function(function),
        }
    }
}

impl SignalSpec {
    fn from_function(function: &StimulationFunction) -> Self {
        let atoms: Vec<_> = function.atoms().collect();
        match (function.family(), atoms.as_slice()) {
            (Some(SignalFamily::Pause), [pause]) => SignalSpec::Pause {
                duration: pause.duration(),
            },
            (Some(SignalFamily::Pulse), [main, dead_zone_0, _, _, dead_zone_1]) => {
                SignalSpec::Pulse(PulseShape {
                    amplitude: main.amplitude(),
                    duration: main.duration(),
                    dead_zone_0: dead_zone_0.duration(),
                    dead_zone_1: dead_zone_1.duration(),
                })
            }
            _ => SignalSpec::Atoms {
                atoms: atoms
                    .iter()
                    .map(|atom| AtomSpec {
                        kind: atom.kind(),
                        amplitude: atom.amplitude(),
                        duration: atom.duration(),
                    })
                    .collect(),
            },
        }
    }
}

fn with_context(error: Error, context: &str) -> Error {
    match error {
        Error::InvalidArgument(msg) => Error::InvalidArgument(format!("{}: {}", context, msg)),
        Error::IllegalState(msg) => Error::IllegalState(format!("{}: {}", context, msg)),
        other => other,
    }
}

fn build_example() -> ProtocolFile {
    let pulse = |name: &str, amplitude: i32, repetitions: u32| FunctionSpec {
        name: name.into(),
        repetitions,
        source: vec![7],
        destination: vec![],
        use_ground: true,
        signal: SignalSpec::Pulse(PulseShape {
            amplitude,
            duration: 200,
            dead_zone_0: 50,
            dead_zone_1: 800,
        }),
    };

    ProtocolFile {
        command: CommandSpec {
            name: "example_burst".into(),
            tracing_id: 1,
            repetitions: 3,
            functions: vec![
                pulse("low", -600, 10),
                FunctionSpec {
                    name: "rest".into(),
                    repetitions: 20,
                    source: vec![7],
                    destination: vec![],
                    use_ground: true,
                    signal: SignalSpec::Pause { duration: 2500 },
                },
                pulse("high", -1200, 5),
            ],
        },
    }
}
