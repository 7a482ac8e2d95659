//! Per-activation state tracking
//!
//! The scheduler reports one `ActivationRecord` per turn. Trackers only see
//! records; durability and append semantics are theirs to choose.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::compression::MoveOutcome;
use crate::core::error::{Result, SimError};
use crate::core::types::{ClockValue, ParticleId, Tick};
use crate::lattice::Coord;
use crate::particle::ParticleSnapshot;

pub const TRACKS_FILE: &str = "tracks.jsonl";
pub const INITIAL_FILE: &str = "init0.json";

/// State of one particle after one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub turn: Tick,
    pub particle: ParticleId,
    pub head: Coord,
    pub tail: Coord,
    pub clock: ClockValue,
    pub outcome: MoveOutcome,
}

impl ActivationRecord {
    pub fn new(turn: Tick, snapshot: ParticleSnapshot, outcome: MoveOutcome) -> Self {
        Self {
            turn,
            particle: snapshot.particle,
            head: snapshot.head,
            tail: snapshot.tail,
            clock: snapshot.clock,
            outcome,
        }
    }
}

/// Messages on the scheduler's output queue
#[derive(Debug, Clone)]
pub enum TrackerMessage {
    Record(ActivationRecord),
    /// Sent once every worker has been joined
    Stop,
}

pub trait StateTracker: Send {
    fn record(&mut self, record: &ActivationRecord) -> Result<()>;

    /// Flush whatever is buffered; called once at the end of a run
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Drops every record
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTracker;

impl StateTracker for NullTracker {
    fn record(&mut self, _record: &ActivationRecord) -> Result<()> {
        Ok(())
    }
}

/// Keeps every record in memory
#[derive(Debug, Default)]
pub struct MemoryTracker {
    records: Vec<ActivationRecord>,
    finished: bool,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ActivationRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ActivationRecord> {
        self.records
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Records of one particle in the order they were received
    pub fn history(&self, particle: ParticleId) -> Vec<ActivationRecord> {
        self.records.iter().filter(|r| r.particle == particle).copied().collect()
    }
}

impl StateTracker for MemoryTracker {
    fn record(&mut self, record: &ActivationRecord) -> Result<()> {
        self.records.push(*record);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Appends JSON lines to `<root>/run-<uuid>/tracks.jsonl`
pub struct JsonTracker {
    run_dir: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl JsonTracker {
    /// Create a fresh run directory and write the initial configuration
    pub fn create(root: &Path, initial: &[ParticleSnapshot]) -> Result<Self> {
        let run_dir = root.join(format!("run-{}", Uuid::new_v4()));
        fs::create_dir_all(&run_dir)?;
        fs::write(run_dir.join(INITIAL_FILE), serde_json::to_string_pretty(initial)?)?;

        let writer = BufWriter::new(File::create(run_dir.join(TRACKS_FILE))?);
        info!(dir = %run_dir.display(), particles = initial.len(), "Tracking run");
        Ok(Self { run_dir, writer, written: 0 })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl StateTracker for JsonTracker {
    fn record(&mut self, record: &ActivationRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        debug!(records = self.written, "Track file flushed");
        Ok(())
    }
}

impl<T: StateTracker + ?Sized> StateTracker for Box<T> {
    fn record(&mut self, record: &ActivationRecord) -> Result<()> {
        (**self).record(record)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Read back a track file written by `JsonTracker`
pub fn read_tracks(path: &Path) -> Result<Vec<ActivationRecord>> {
    let contents = fs::read_to_string(path)?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str::<ActivationRecord>(line).map_err(SimError::from))
        .collect()
}
