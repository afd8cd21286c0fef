//! JSON-lines event log.
//!
//! One line per published event, tagged with the tick it was drained on.
//! Readable back with [`read_log`] for offline inspection.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use arena_sim::events::SimEvent;

/// Errors that can occur while recording.
#[derive(Debug, Error)]
pub enum RecordError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error on line {line}: {message}")]
    Deserialization {
        /// 1-based line number
        line: usize,
        /// Parser message
        message: String,
    },
}

impl From<std::io::Error> for RecordError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// One logged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Tick the event was drained after
    pub tick: u64,
    /// The event
    pub event: SimEvent,
}

/// Appends events to a file.
pub struct EventRecorder {
    writer: BufWriter<File>,
    written: u64,
}

impl EventRecorder {
    /// Creates (or truncates) the log file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            written: 0,
        })
    }

    /// Writes one line per event.
    pub fn record(&mut self, tick: u64, events: &[SimEvent]) -> Result<(), RecordError> {
        for event in events {
            let record = LogRecord {
                tick,
                event: event.clone(),
            };
            serde_json::to_writer(&mut self.writer, &record).map_err(|e| RecordError::Serialization(e.to_string()))?;
            self.writer.write_all(b"\n")?;
            self.written += 1;
        }
        Ok(())
    }

    /// Flushes buffered lines.
    pub fn flush(&mut self) -> Result<(), RecordError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Events written so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

/// Reads a log written by [`EventRecorder`].
pub fn read_log(path: impl AsRef<Path>) -> Result<Vec<LogRecord>, RecordError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| RecordError::Deserialization {
            line: index + 1,
            message: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}
