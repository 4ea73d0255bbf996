//! Stimulation atoms: the smallest segments of a stimulation signal.
//!
//! Atoms carry no validity of their own. Whether an atom is acceptable
//! depends on where it is appended inside a stimulation function.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of waveform segment an atom describes
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AtomKind {
    MainPulse,
    DeadZone,
    CounterPulse,
    Pause,
    NoType,
}

/// Signal family a function belongs to, fixed by its first atom
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SignalFamily {
    /// Five atoms: main pulse, dead zone 0, counter pulse, dead zone 0, dead zone 1
    Pulse,
    /// A single pause atom
    Pause,
}

impl AtomKind {
    /// Family this kind of atom belongs to; `None` for `NoType`
    pub fn family(self) -> Option<SignalFamily> {
        match self {
            AtomKind::MainPulse | AtomKind::DeadZone | AtomKind::CounterPulse => {
                Some(SignalFamily::Pulse)
            }
            AtomKind::Pause => Some(SignalFamily::Pause),
            AtomKind::NoType => None,
        }
    }
}

impl fmt::Display for AtomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AtomKind::MainPulse => "main pulse",
            AtomKind::DeadZone => "dead zone",
            AtomKind::CounterPulse => "counter pulse",
            AtomKind::Pause => "pause",
            AtomKind::NoType => "no type",
        };
        f.write_str(name)
    }
}

/// One waveform segment: kind, amplitude in µA and duration in µs
///
/// Atoms are immutable values. Equality compares kind, amplitude and
/// duration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct StimulationAtom {
    kind: AtomKind,
    amplitude: i32,
    duration: u32,
}

impl StimulationAtom {
    /// Construct an atom of any kind. Validation happens on append.
    pub(crate) fn new(kind: AtomKind, amplitude: i32, duration: u32) -> Self {
        Self {
            kind,
            amplitude,
            duration,
        }
    }

    pub fn kind(&self) -> AtomKind {
        self.kind
    }

    /// Amplitude in µA
    pub fn amplitude(&self) -> i32 {
        self.amplitude
    }

    /// Duration in µs
    pub fn duration(&self) -> u32 {
        self.duration
    }
}

impl fmt::Display for StimulationAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} uA, {} us)", self.kind, self.amplitude, self.duration)
    }
}
