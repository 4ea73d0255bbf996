//! Hand-off of finished commands to the stimulation collaborator.
//!
//! The model ends at [`Stimulator::start_stimulation`], which takes a
//! validated command by value. [`JsonlRecorder`] implements that seam
//! without hardware: each accepted command is appended as one JSON line to
//! a log file under an exclusive file lock.

use crate::protocol::ProtocolFile;
use crate::{Error, Result, StimulationCommand};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Receiver of finished stimulation commands
pub trait Stimulator {
    fn start_stimulation(&mut self, command: StimulationCommand) -> Result<()>;
}

/// Checks made before a command may leave the model
///
/// The command must contain functions, every function needs a destination
/// (explicit electrodes or ground), and every electrode index must be below
/// `channel_count`.
pub fn check_for_handoff(command: &StimulationCommand, channel_count: u32) -> Result<()> {
    if command.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "command '{}' has no functions",
            command.name()
        )));
    }

    for (index, function) in command.functions().enumerate() {
        if !function.has_virtual_electrodes() {
            return Err(Error::InvalidArgument(format!(
                "function {} '{}' has no destination electrodes",
                index + 1,
                function.name()
            )));
        }

        let (source, destination) = function.virtual_stimulation_electrodes();
        if let Some(channel) = source
            .iter()
            .chain(destination.iter())
            .find(|&&channel| channel >= channel_count)
        {
            return Err(Error::InvalidArgument(format!(
                "function {} '{}' uses electrode {} but the implant has {} channels",
                index + 1,
                function.name(),
                channel,
                channel_count
            )));
        }
    }
    Ok(())
}

/// One accepted command as written by [`JsonlRecorder`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandoffRecord {
    pub recorded_at: DateTime<Utc>,
    pub tracing_id: u16,
    pub name: String,
    pub duration_us: u64,
    pub function_count: usize,
    pub protocol: ProtocolFile,
}

impl HandoffRecord {
    fn new(command: &StimulationCommand) -> Self {
        Self {
            recorded_at: Utc::now(),
            tracing_id: command.tracing_id(),
            name: command.name().to_string(),
            duration_us: command.duration(),
            function_count: command.size(),
            protocol: ProtocolFile::from_command(command),
        }
    }
}

/// JSONL-based stimulator with file locking
pub struct JsonlRecorder {
    path: PathBuf,
    channel_count: u32,
}

impl JsonlRecorder {
    /// Create a recorder writing to `path` for an implant with `channel_count` channels
    pub fn new(path: impl Into<PathBuf>, channel_count: u32) -> Self {
        Self {
            path: path.into(),
            channel_count,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl Stimulator for JsonlRecorder {
    fn start_stimulation(&mut self, command: StimulationCommand) -> Result<()> {
        check_for_handoff(&command, self.channel_count)?;
        self.ensure_parent_dir()?;

        let record = HandoffRecord::new(&command);
        let line = serde_json::to_string(&record)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::info!(
            "Recorded command '{}' (tracing id {}, {} us) to {:?}",
            record.name,
            record.tracing_id,
            record.duration_us,
            self.path
        );
        Ok(())
    }
}

/// Read all hand-off records from a log file
pub fn read_records(path: &Path) -> Result<Vec<HandoffRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<HandoffRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse record at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} hand-off records", records.len());
    Ok(records)
}
