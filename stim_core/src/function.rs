//! Stimulation functions: repeatable atom sequences bound to virtual electrodes.
//!
//! A function holds either one pause atom or the five atoms of a biphasic
//! pulse, appended in this order:
//!
//! ```text
//!                    ____
//!  Pulse       _   _|    |_ _____
//!               | |
//!               |_|
//!
//!  Atom          1 2   3  4   5
//! ```
//!
//! 1. main pulse, 2. dead zone 0, 3. counter pulse, 4. dead zone 0 (repeat),
//! 5. dead zone 1. See [`crate::limits`] for the accepted grids.
//!
//! Every mutation validates its input and leaves the function untouched when
//! it fails.

use crate::atom::{AtomKind, SignalFamily, StimulationAtom};
use crate::limits::{self, COUNTER_AMPLITUDE_DIVISOR, COUNTER_DURATION_FACTOR};
use crate::{Error, Result};
use std::collections::BTreeSet;

/// An ordered, repeatable sequence of atoms plus its electrode assignment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StimulationFunction {
    atoms: Vec<StimulationAtom>,
    repetitions: u32,
    name: String,
    source_electrodes: BTreeSet<u32>,
    destination_electrodes: BTreeSet<u32>,
    use_ground_electrode: bool,
}

impl StimulationFunction {
    /// Empty function with one repetition and no electrodes
    pub(crate) fn new() -> Self {
        Self {
            atoms: Vec::new(),
            repetitions: 1,
            name: String::new(),
            source_electrodes: BTreeSet::new(),
            destination_electrodes: BTreeSet::new(),
            use_ground_electrode: false,
        }
    }

    /// Append an atom to the end of the signal form
    ///
    /// Fails with [`Error::InvalidArgument`] if the atom has no type or breaks
    /// the positional rule of its family, and with [`Error::IllegalState`] if
    /// the signal form is already complete or belongs to another family.
    pub fn append(&mut self, atom: StimulationAtom) -> Result<()> {
        if let Err(e) = self.check_append(&atom) {
            tracing::warn!(
                "Rejected {} for function '{}' at position {}: {}",
                atom,
                self.name,
                self.atoms.len() + 1,
                e
            );
            return Err(e);
        }

        self.atoms.push(atom);
        tracing::debug!(
            "Appended {} to function '{}' ({} atoms)",
            atom,
            self.name,
            self.atoms.len()
        );
        Ok(())
    }

    fn check_append(&self, atom: &StimulationAtom) -> Result<()> {
        let atom_family = atom.kind().family().ok_or_else(|| {
            Error::InvalidArgument("atoms without a type cannot be appended".into())
        })?;

        if let Some(family) = self.family() {
            if self.is_complete() {
                return Err(Error::IllegalState(format!(
                    "{:?} signal form is already complete with {} atoms",
                    family,
                    self.atoms.len()
                )));
            }
            if family != atom_family {
                return Err(Error::IllegalState(format!(
                    "cannot append a {} atom to a {:?} function",
                    atom.kind(),
                    family
                )));
            }
        }

        match atom_family {
            SignalFamily::Pause => check_pause_atom(atom),
            SignalFamily::Pulse => self.check_pulse_atom(atom),
        }
    }

    fn check_pulse_atom(&self, atom: &StimulationAtom) -> Result<()> {
        let position = self.atoms.len();
        let expected = match position {
            0 => AtomKind::MainPulse,
            2 => AtomKind::CounterPulse,
            _ => AtomKind::DeadZone,
        };
        if atom.kind() != expected {
            return Err(Error::InvalidArgument(format!(
                "pulse atom {} must be a {}, got a {}",
                position + 1,
                expected,
                atom.kind()
            )));
        }

        match position {
            0 => {
                if !limits::is_valid_main_amplitude(atom.amplitude()) {
                    return Err(Error::InvalidArgument(format!(
                        "main pulse amplitude {} uA is outside [-6120, 0] or off its step grid",
                        atom.amplitude()
                    )));
                }
                check_short_duration(atom)
            }
            1 => {
                check_zero_amplitude(atom)?;
                check_short_duration(atom)
            }
            2 => {
                let main = &self.atoms[0];
                let expected_amplitude = -main.amplitude() / COUNTER_AMPLITUDE_DIVISOR;
                if atom.amplitude() != expected_amplitude {
                    return Err(Error::InvalidArgument(format!(
                        "counter pulse amplitude must be {} uA (-1/4 of the main pulse), got {}",
                        expected_amplitude,
                        atom.amplitude()
                    )));
                }
                let expected_duration = u64::from(main.duration()) * u64::from(COUNTER_DURATION_FACTOR);
                if u64::from(atom.duration()) != expected_duration {
                    return Err(Error::InvalidArgument(format!(
                        "counter pulse duration must be {} us (4x the main pulse), got {}",
                        expected_duration,
                        atom.duration()
                    )));
                }
                Ok(())
            }
            3 => {
                check_zero_amplitude(atom)?;
                let first_dead_zone = &self.atoms[1];
                if atom.duration() != first_dead_zone.duration() {
                    return Err(Error::InvalidArgument(format!(
                        "second dead zone 0 must last {} us like the first, got {}",
                        first_dead_zone.duration(),
                        atom.duration()
                    )));
                }
                Ok(())
            }
            _ => {
                check_zero_amplitude(atom)?;
                if !limits::is_valid_dead_zone_1_duration(atom.duration()) {
                    return Err(Error::InvalidArgument(format!(
                        "dead zone 1 duration {} us must be 10 or a multiple of 80 up to 20400",
                        atom.duration()
                    )));
                }
                Ok(())
            }
        }
    }

    /// Iterate over the atoms in append order
    pub fn atoms(&self) -> std::slice::Iter<'_, StimulationAtom> {
        self.atoms.iter()
    }

    /// Number of atoms in one period
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Family fixed by the first atom, if any
    pub fn family(&self) -> Option<SignalFamily> {
        self.atoms.first().and_then(|atom| atom.kind().family())
    }

    /// True once the signal form holds every atom its family requires
    pub fn is_complete(&self) -> bool {
        match self.family() {
            Some(SignalFamily::Pulse) => self.atoms.len() == limits::PULSE_ATOM_COUNT,
            Some(SignalFamily::Pause) => self.atoms.len() == limits::PAUSE_ATOM_COUNT,
            None => false,
        }
    }

    /// Set how often the atom sequence is repeated
    pub fn set_repetitions(&mut self, repetitions: u32) -> Result<()> {
        if repetitions < 1 {
            tracing::warn!("Rejected repetitions {} for function '{}'", repetitions, self.name);
            return Err(Error::InvalidArgument(
                "function repetitions must be at least 1".into(),
            ));
        }
        self.repetitions = repetitions;
        tracing::debug!("Function '{}' repetitions set to {}", self.name, repetitions);
        Ok(())
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Function name; empty if never set
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total duration in µs including all repetitions
    pub fn duration(&self) -> u64 {
        self.period() * u64::from(self.repetitions)
    }

    /// Duration of one repetition in µs
    pub fn period(&self) -> u64 {
        self.atoms.iter().map(|atom| u64::from(atom.duration())).sum()
    }

    /// Assign the source and destination virtual electrodes
    ///
    /// The two sets must be disjoint and the destination (explicit channels
    /// or the ground electrode) must not be empty.
    pub fn set_virtual_stimulation_electrodes(
        &mut self,
        source: impl IntoIterator<Item = u32>,
        destination: impl IntoIterator<Item = u32>,
        use_ground_electrode: bool,
    ) -> Result<()> {
        let source: BTreeSet<u32> = source.into_iter().collect();
        let destination: BTreeSet<u32> = destination.into_iter().collect();

        let shared: Vec<u32> = source.intersection(&destination).copied().collect();
        if !shared.is_empty() {
            tracing::warn!(
                "Rejected electrodes for function '{}': {:?} in both sets",
                self.name,
                shared
            );
            return Err(Error::InvalidArgument(format!(
                "electrodes {:?} are both source and destination",
                shared
            )));
        }
        if destination.is_empty() && !use_ground_electrode {
            tracing::warn!("Rejected electrodes for function '{}': no destination", self.name);
            return Err(Error::InvalidArgument(
                "destination electrodes are empty and the ground electrode is not used".into(),
            ));
        }

        tracing::debug!(
            "Function '{}' electrodes set: source {:?}, destination {:?}, ground {}",
            self.name,
            source,
            destination,
            use_ground_electrode
        );
        self.source_electrodes = source;
        self.destination_electrodes = destination;
        self.use_ground_electrode = use_ground_electrode;
        Ok(())
    }

    /// (source, destination) electrode sets as configured
    pub fn virtual_stimulation_electrodes(&self) -> (&BTreeSet<u32>, &BTreeSet<u32>) {
        (&self.source_electrodes, &self.destination_electrodes)
    }

    pub fn uses_ground_electrode(&self) -> bool {
        self.use_ground_electrode
    }

    /// True once a destination (explicit or ground) has been assigned
    pub fn has_virtual_electrodes(&self) -> bool {
        !self.destination_electrodes.is_empty() || self.use_ground_electrode
    }

    /// Same atoms in the same order; repetitions, name and electrodes ignored
    pub fn has_equal_signal_form(&self, other: &StimulationFunction) -> bool {
        self.atoms == other.atoms
    }

    /// Same source set, destination set and ground flag
    pub fn has_equal_virtual_stimulation_electrodes(&self, other: &StimulationFunction) -> bool {
        self.source_electrodes == other.source_electrodes
            && self.destination_electrodes == other.destination_electrodes
            && self.use_ground_electrode == other.use_ground_electrode
    }
}

fn check_pause_atom(atom: &StimulationAtom) -> Result<()> {
    check_zero_amplitude(atom)?;
    check_short_duration(atom)
}

fn check_zero_amplitude(atom: &StimulationAtom) -> Result<()> {
    if atom.amplitude() != 0 {
        return Err(Error::InvalidArgument(format!(
            "{} amplitude must be 0, got {} uA",
            atom.kind(),
            atom.amplitude()
        )));
    }
    Ok(())
}

fn check_short_duration(atom: &StimulationAtom) -> Result<()> {
    if !limits::is_valid_short_duration(atom.duration()) {
        return Err(Error::InvalidArgument(format!(
            "{} duration {} us must be a multiple of 10 in [10, 2550]",
            atom.kind(),
            atom.duration()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(kind: AtomKind, amplitude: i32, duration: u32) -> StimulationAtom {
        StimulationAtom::new(kind, amplitude, duration)
    }

    /// Appends a complete pulse with the given main pulse and dead zones
    fn pulse(amplitude: i32, duration: u32, dead_zone_0: u32, dead_zone_1: u32) -> StimulationFunction {
        let mut function = StimulationFunction::new();
        function.append(atom(AtomKind::MainPulse, amplitude, duration)).unwrap();
        function.append(atom(AtomKind::DeadZone, 0, dead_zone_0)).unwrap();
        function
            .append(atom(AtomKind::CounterPulse, -amplitude / 4, duration * 4))
            .unwrap();
        function.append(atom(AtomKind::DeadZone, 0, dead_zone_0)).unwrap();
        function.append(atom(AtomKind::DeadZone, 0, dead_zone_1)).unwrap();
        function
    }

    fn assert_invalid(result: Result<()>) {
        assert!(
            matches!(result, Err(Error::InvalidArgument(_))),
            "expected InvalidArgument, got {:?}",
            result
        );
    }

    fn assert_illegal(result: Result<()>) {
        assert!(
            matches!(result, Err(Error::IllegalState(_))),
            "expected IllegalState, got {:?}",
            result
        );
    }

    #[test]
    fn test_new_function_defaults() {
        let function = StimulationFunction::new();
        assert!(function.is_empty());
        assert_eq!(function.repetitions(), 1);
        assert_eq!(function.name(), "");
        assert_eq!(function.duration(), 0);
        assert_eq!(function.family(), None);
        assert!(!function.is_complete());
        assert!(!function.has_virtual_electrodes());
    }

    #[test]
    fn test_complete_pulse_function() {
        crate::logging::init_test();
        let function = pulse(-120, 100, 30, 80);

        assert!(function.is_complete());
        assert_eq!(function.family(), Some(SignalFamily::Pulse));
        assert_eq!(function.len(), 5);
        assert_eq!(function.period(), 100 + 30 + 400 + 30 + 80);

        let counter = function.atoms().nth(2).unwrap();
        assert_eq!(counter.amplitude(), 30);
        assert_eq!(counter.duration(), 400);
    }

    #[test]
    fn test_counter_pulse_relation_holds_across_amplitude_grid() {
        for amplitude in (-6120..=0).filter(|a| limits::is_valid_main_amplitude(*a)) {
            let function = pulse(amplitude, 50, 10, 10);
            let atoms: Vec<_> = function.atoms().collect();
            assert_eq!(atoms[2].amplitude(), -atoms[0].amplitude() / 4);
            assert_eq!(atoms[2].amplitude() * 4, -atoms[0].amplitude());
            assert_eq!(atoms[2].duration(), 4 * atoms[0].duration());
        }
    }

    #[test]
    fn test_pause_function() {
        let mut function = StimulationFunction::new();
        function.append(atom(AtomKind::Pause, 0, 2550)).unwrap();
        assert!(function.is_complete());
        assert_eq!(function.family(), Some(SignalFamily::Pause));
        assert_eq!(function.period(), 2550);
    }

    #[test]
    fn test_pause_atom_rules() {
        let mut function = StimulationFunction::new();
        assert_invalid(function.append(atom(AtomKind::Pause, 12, 100)));
        assert_invalid(function.append(atom(AtomKind::Pause, 0, 0)));
        assert_invalid(function.append(atom(AtomKind::Pause, 0, 105)));
        assert_invalid(function.append(atom(AtomKind::Pause, 0, 2560)));
        assert!(function.is_empty());
    }

    #[test]
    fn test_no_type_rejected() {
        let mut function = StimulationFunction::new();
        assert_invalid(function.append(atom(AtomKind::NoType, 0, 10)));

        let mut function = pulse(-120, 100, 30, 80);
        let before = function.clone();
        assert!(function.append(atom(AtomKind::NoType, 0, 10)).is_err());
        assert_eq!(function, before);
    }

    #[test]
    fn test_pulse_must_start_with_main_pulse() {
        let mut function = StimulationFunction::new();
        assert_invalid(function.append(atom(AtomKind::DeadZone, 0, 10)));
        assert_invalid(function.append(atom(AtomKind::CounterPulse, 30, 400)));
        assert!(function.is_empty());
    }

    #[test]
    fn test_main_pulse_limits() {
        let mut function = StimulationFunction::new();
        assert_invalid(function.append(atom(AtomKind::MainPulse, 12, 100)));
        assert_invalid(function.append(atom(AtomKind::MainPulse, -6144, 100)));
        assert_invalid(function.append(atom(AtomKind::MainPulse, -3084, 100)));
        assert_invalid(function.append(atom(AtomKind::MainPulse, -18, 100)));
        assert_invalid(function.append(atom(AtomKind::MainPulse, -120, 0)));
        assert_invalid(function.append(atom(AtomKind::MainPulse, -120, 2560)));
        assert_invalid(function.append(atom(AtomKind::MainPulse, -120, 95)));
        assert!(function.is_empty());

        function.append(atom(AtomKind::MainPulse, -3072, 10)).unwrap();
        assert_eq!(function.len(), 1);
    }

    #[test]
    fn test_wrong_kind_at_position() {
        let mut function = StimulationFunction::new();
        function.append(atom(AtomKind::MainPulse, -120, 100)).unwrap();
        assert_invalid(function.append(atom(AtomKind::CounterPulse, 30, 400)));
        assert_invalid(function.append(atom(AtomKind::MainPulse, -120, 100)));
        function.append(atom(AtomKind::DeadZone, 0, 30)).unwrap();
        assert_invalid(function.append(atom(AtomKind::DeadZone, 0, 30)));
        assert_eq!(function.len(), 2);
    }

    #[test]
    fn test_dead_zone_amplitude_must_be_zero() {
        let mut function = StimulationFunction::new();
        function.append(atom(AtomKind::MainPulse, -120, 100)).unwrap();
        assert_invalid(function.append(atom(AtomKind::DeadZone, -12, 30)));
        assert_eq!(function.len(), 1);
    }

    #[test]
    fn test_counter_pulse_relation_violations() {
        let mut function = StimulationFunction::new();
        function.append(atom(AtomKind::MainPulse, -120, 100)).unwrap();
        function.append(atom(AtomKind::DeadZone, 0, 30)).unwrap();

        assert_invalid(function.append(atom(AtomKind::CounterPulse, -30, 400)));
        assert_invalid(function.append(atom(AtomKind::CounterPulse, 31, 400)));
        assert_invalid(function.append(atom(AtomKind::CounterPulse, 30, 399)));
        assert_invalid(function.append(atom(AtomKind::CounterPulse, 30, 100)));
        assert_eq!(function.len(), 2);

        function.append(atom(AtomKind::CounterPulse, 30, 400)).unwrap();
        assert_eq!(function.len(), 3);
    }

    #[test]
    fn test_repeated_dead_zone_must_match() {
        let mut function = StimulationFunction::new();
        function.append(atom(AtomKind::MainPulse, -120, 100)).unwrap();
        function.append(atom(AtomKind::DeadZone, 0, 30)).unwrap();
        function.append(atom(AtomKind::CounterPulse, 30, 400)).unwrap();

        let period = function.period();
        assert_invalid(function.append(atom(AtomKind::DeadZone, 0, 40)));
        assert_eq!(function.len(), 3);
        assert_eq!(function.period(), period);
        assert!(function.atoms().all(|a| a.duration() != 40));
    }

    #[test]
    fn test_out_of_range_pulse_sequence_leaves_function_unchanged() {
        let mut function = StimulationFunction::new();
        let sequence = [
            atom(AtomKind::MainPulse, -6120, 20000),
            atom(AtomKind::DeadZone, 0, 30000),
            atom(AtomKind::CounterPulse, 1530, 80000),
            atom(AtomKind::DeadZone, 0, 30000),
            atom(AtomKind::DeadZone, 0, 10),
        ];

        for candidate in sequence {
            assert_invalid(function.append(candidate));
        }
        assert!(function.is_empty());
        assert_eq!(function.duration(), 0);
        assert_eq!(function.period(), 0);
    }

    #[test]
    fn test_dead_zone_1_limits() {
        let mut function = StimulationFunction::new();
        function.append(atom(AtomKind::MainPulse, -120, 100)).unwrap();
        function.append(atom(AtomKind::DeadZone, 0, 30)).unwrap();
        function.append(atom(AtomKind::CounterPulse, 30, 400)).unwrap();
        function.append(atom(AtomKind::DeadZone, 0, 30)).unwrap();

        assert_invalid(function.append(atom(AtomKind::DeadZone, 0, 0)));
        assert_invalid(function.append(atom(AtomKind::DeadZone, 0, 20)));
        assert_invalid(function.append(atom(AtomKind::DeadZone, 0, 20480)));
        assert_invalid(function.append(atom(AtomKind::DeadZone, 12, 80)));
        assert_eq!(function.len(), 4);

        function.append(atom(AtomKind::DeadZone, 0, 20400)).unwrap();
        assert!(function.is_complete());
    }

    #[test]
    fn test_complete_function_rejects_more_atoms() {
        let mut function = pulse(-120, 100, 30, 80);
        let before = function.clone();
        assert_illegal(function.append(atom(AtomKind::DeadZone, 0, 80)));
        assert_eq!(function, before);

        let mut pause = StimulationFunction::new();
        pause.append(atom(AtomKind::Pause, 0, 100)).unwrap();
        assert_illegal(pause.append(atom(AtomKind::Pause, 0, 100)));
        assert_eq!(pause.len(), 1);
    }

    #[test]
    fn test_mixing_families_rejected() {
        let mut function = StimulationFunction::new();
        function.append(atom(AtomKind::MainPulse, -120, 100)).unwrap();
        assert_illegal(function.append(atom(AtomKind::Pause, 0, 100)));
        assert_eq!(function.len(), 1);
    }

    #[test]
    fn test_repetitions() {
        let mut function = pulse(-120, 100, 30, 80);
        assert_invalid(function.set_repetitions(0));
        assert_eq!(function.repetitions(), 1);

        function.set_repetitions(7).unwrap();
        assert_eq!(function.repetitions(), 7);
        assert_eq!(function.duration(), function.period() * 7);
    }

    #[test]
    fn test_duration_equals_period_times_repetitions() {
        for repetitions in [1, 2, 3, 10, 1000] {
            let mut function = pulse(-240, 200, 10, 160);
            function.set_repetitions(repetitions).unwrap();
            assert_eq!(
                function.duration(),
                function.period() * u64::from(repetitions)
            );
        }
    }

    #[test]
    fn test_electrodes_overlap_rejected() {
        let mut function = StimulationFunction::new();
        assert_invalid(function.set_virtual_stimulation_electrodes([0, 1], [1, 2], false));
        assert!(!function.has_virtual_electrodes());
        let (source, destination) = function.virtual_stimulation_electrodes();
        assert!(source.is_empty());
        assert!(destination.is_empty());
    }

    #[test]
    fn test_electrodes_empty_destination() {
        let mut function = StimulationFunction::new();
        assert_invalid(function.set_virtual_stimulation_electrodes([0], [], false));

        function
            .set_virtual_stimulation_electrodes([0], [], true)
            .unwrap();
        assert!(function.uses_ground_electrode());
        assert!(function.has_virtual_electrodes());
    }

    #[test]
    fn test_electrodes_round_trip() {
        let mut function = StimulationFunction::new();
        function
            .set_virtual_stimulation_electrodes([3, 1], [4, 5], false)
            .unwrap();
        let (source, destination) = function.virtual_stimulation_electrodes();
        assert_eq!(source.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(destination.iter().copied().collect::<Vec<_>>(), vec![4, 5]);
        assert!(!function.uses_ground_electrode());
    }

    #[test]
    fn test_equal_signal_form_ignores_repetitions_and_electrodes() {
        let mut a = pulse(-120, 100, 30, 80);
        let mut b = pulse(-120, 100, 30, 80);
        a.set_repetitions(3).unwrap();
        a.set_name("a");
        b.set_virtual_stimulation_electrodes([0], [1], false).unwrap();
        assert!(a.has_equal_signal_form(&b));

        let c = pulse(-132, 100, 30, 80);
        assert!(!a.has_equal_signal_form(&c));

        let mut partial = StimulationFunction::new();
        partial.append(atom(AtomKind::MainPulse, -120, 100)).unwrap();
        assert!(!a.has_equal_signal_form(&partial));
    }

    #[test]
    fn test_equal_virtual_electrodes() {
        let mut a = StimulationFunction::new();
        let mut b = StimulationFunction::new();
        a.set_virtual_stimulation_electrodes([0, 1], [2], false).unwrap();
        b.set_virtual_stimulation_electrodes([1, 0], [2], false).unwrap();
        assert!(a.has_equal_virtual_stimulation_electrodes(&b));

        b.set_virtual_stimulation_electrodes([1, 0], [2], true).unwrap();
        assert!(!a.has_equal_virtual_stimulation_electrodes(&b));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = pulse(-120, 100, 30, 80);
        original.set_name("original");
        original
            .set_virtual_stimulation_electrodes([0], [1], false)
            .unwrap();

        let mut copy = original.clone();
        assert!(copy.has_equal_signal_form(&original));
        assert!(copy.has_equal_virtual_stimulation_electrodes(&original));
        assert_eq!(copy.name(), "original");

        copy.set_repetitions(5).unwrap();
        copy.set_name("copy");
        copy.set_virtual_stimulation_electrodes([2], [3], true).unwrap();

        assert_eq!(original.repetitions(), 1);
        assert_eq!(original.name(), "original");
        assert!(!original.uses_ground_electrode());
        assert!(copy.has_equal_signal_form(&original));
    }
}
