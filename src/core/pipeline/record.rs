//! Detection records and the sinks that store them

use crate::core::bill::BillCandidate;
use crate::core::legislator::LegislatorRef;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Mutex;
use thiserror::Error;

/// Width of the zero-padded screenshot ordinal (`00042`).
pub const DEFAULT_ORDINAL_WIDTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionKind {
    Bill,
    Legislator,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResolvedValue {
    Bill(BillCandidate),
    Legislator(LegislatorRef),
}

impl ResolvedValue {
    pub fn kind(&self) -> DetectionKind {
        match self {
            ResolvedValue::Bill(_) => DetectionKind::Bill,
            ResolvedValue::Legislator(_) => DetectionKind::Legislator,
        }
    }

    /// `HB1234` for bills, the display name for legislators.
    pub fn label(&self) -> String {
        match self {
            ResolvedValue::Bill(bill) => bill.canonical(),
            ResolvedValue::Legislator(legislator) => legislator.name.clone(),
        }
    }
}

/// Screenshots are taken at 1 Hz and numbered from 1.
pub fn screenshot_ordinal(elapsed_seconds: u64, width: usize) -> String {
    format!("{:0width$}", elapsed_seconds.saturating_add(1), width = width)
}

/// `HH:MM:SS` for an elapsed offset.
pub fn timecode(elapsed_seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        elapsed_seconds / 3600,
        (elapsed_seconds % 3600) / 60,
        elapsed_seconds % 60
    )
}

/// One accepted entity seen in one screenshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRecord {
    pub file_id: u64,
    pub elapsed_seconds: u64,
    pub screenshot_ordinal: String,
    pub raw_text: String,
    pub resolved_value: ResolvedValue,
    pub kind: DetectionKind,
    pub confidence: f64,
}

impl DetectionRecord {
    pub fn new(
        file_id: u64,
        elapsed_seconds: u64,
        ordinal_width: usize,
        raw_text: impl Into<String>,
        resolved_value: ResolvedValue,
        confidence: f64,
    ) -> Self {
        Self {
            file_id,
            elapsed_seconds,
            screenshot_ordinal: screenshot_ordinal(elapsed_seconds, ordinal_width),
            raw_text: raw_text.into(),
            kind: resolved_value.kind(),
            resolved_value,
            confidence,
        }
    }

    pub fn timecode(&self) -> String {
        timecode(self.elapsed_seconds)
    }

    pub fn legislator_id(&self) -> Option<u64> {
        match &self.resolved_value {
            ResolvedValue::Legislator(legislator) => Some(legislator.id),
            ResolvedValue::Bill(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sink lock poisoned")]
    Poisoned,
}

/// Append-only record storage. Duplicate ordinals are expected.
pub trait RecordSink: Send + Sync {
    fn append(&self, record: &DetectionRecord) -> Result<(), SinkError>;

    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// One JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer.into_inner().map_err(|_| SinkError::Poisoned)
    }
}

impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    fn append(&self, record: &DetectionRecord) -> Result<(), SinkError> {
        let line = serde_json::to_string(record)?;
        let mut writer = self.writer.lock().map_err(|_| SinkError::Poisoned)?;
        writeln!(writer, "{}", line)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        let mut writer = self.writer.lock().map_err(|_| SinkError::Poisoned)?;
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<DetectionRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DetectionRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    fn append(&self, record: &DetectionRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .map_err(|_| SinkError::Poisoned)?
            .push(record.clone());
        Ok(())
    }
}
