//! Execution schedule export.
//!
//! Walks a command with its command-repetition-aware producer and lists
//! every function occurrence with its offset from the start of the command.
//! Function repetitions stay folded into a single row per occurrence.

use crate::{Result, StimulationCommand};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// One function occurrence within the command's execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    /// Zero-based command pass
    pub pass: usize,
    /// Zero-based position of the function within the pass
    pub position: usize,
    pub name: String,
    pub repetitions: u32,
    pub period_us: u64,
    /// `period_us * repetitions`
    pub duration_us: u64,
    /// Offset from the start of the command
    pub start_us: u64,
}

/// List every function occurrence in execution order
pub fn build(command: &StimulationCommand) -> Vec<ScheduleEntry> {
    let functions_per_pass = command.size();
    let mut start_us = 0;

    command
        .command_repetition_aware_functions()
        .enumerate()
        .map(|(index, function)| {
            let entry = ScheduleEntry {
                pass: index / functions_per_pass,
                position: index % functions_per_pass,
                name: function.name().to_string(),
                repetitions: function.repetitions(),
                period_us: function.period(),
                duration_us: function.duration(),
                start_us,
            };
            start_us += entry.duration_us;
            entry
        })
        .collect()
}

/// Write the schedule as CSV with a header row
///
/// Returns the number of rows written.
pub fn write_csv<W: Write>(command: &StimulationCommand, writer: W) -> Result<usize> {
    let entries = build(command);
    let mut writer = csv::Writer::from_writer(writer);
    for entry in &entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    tracing::debug!(
        "Wrote {} schedule rows for command '{}'",
        entries.len(),
        command.name()
    );
    Ok(entries.len())
}

/// Write the schedule CSV to `path`, replacing any existing file
pub fn write_csv_file(command: &StimulationCommand, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let count = write_csv(command, &file)?;
    file.sync_all()?;
    tracing::info!("Wrote schedule with {} rows to {:?}", count, path);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{PulseShape, StimulationFactory};

    fn command() -> StimulationCommand {
        let factory = StimulationFactory::new();
        let mut a = factory
            .create_pulse_function(&PulseShape {
                amplitude: -120,
                duration: 100,
                dead_zone_0: 30,
                dead_zone_1: 80,
            })
            .unwrap();
        a.set_name("A");
        a.set_repetitions(2).unwrap();
        let mut b = factory.create_pause_function(500).unwrap();
        b.set_name("B");

        let mut command = factory.create_command();
        command.set_name("scenario");
        command.append(a).unwrap();
        command.append(b).unwrap();
        command.set_repetitions(3).unwrap();
        command
    }

    #[test]
    fn test_schedule_follows_command_repetitions() {
        let command = command();
        let entries = build(&command);

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "A", "B", "A", "B"]);
        assert_eq!(entries[3].pass, 1);
        assert_eq!(entries[3].position, 1);

        assert_eq!(entries[0].start_us, 0);
        assert_eq!(entries[0].duration_us, 2 * 640);
        assert_eq!(entries[1].start_us, 1280);
        assert_eq!(entries[2].start_us, 1780);

        let last = entries.last().unwrap();
        assert_eq!(last.start_us + last.duration_us, command.duration());
    }

    #[test]
    fn test_empty_command_has_empty_schedule() {
        let command = StimulationFactory::new().create_command();
        assert!(build(&command).is_empty());
    }

    #[test]
    fn test_csv_output() {
        let mut buffer = Vec::new();
        let rows = write_csv(&command(), &mut buffer).unwrap();
        assert_eq!(rows, 6);

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("pass,position,name,repetitions,period_us,duration_us,start_us")
        );
        assert_eq!(lines.next(), Some("0,0,A,2,640,1280,0"));
        assert_eq!(lines.count(), 5);
    }

    #[test]
    fn test_csv_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out").join("schedule.csv");
        let rows = write_csv_file(&command(), &path).unwrap();
        assert_eq!(rows, 6);
        assert!(std::fs::read_to_string(&path).unwrap().contains("B,1,500,500"));
    }
}
