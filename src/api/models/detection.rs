use crate::core::pipeline::ocr::TesseractConfig;
use crate::core::pipeline::crop::CropUnits;
use crate::core::pipeline::{DetectionConfig, JobOutcome, ResolvedValue, SpeakerSegment};
use crate::core::region::DetectionType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Detector settings, usually read from a JSON5 file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub detection: DetectionConfig,
    pub tesseract: TesseractConfig,
    pub crop_units: CropUnits,
}

/// One video to scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectRequest {
    pub file_id: u64,
    pub chamber: String,
    pub event_type: String,
    pub date: NaiveDate,
    pub detection_type: DetectionType,
    /// Local path or `file://` URL of the screenshot manifest.
    pub manifest: String,
    #[serde(default)]
    pub agenda: Vec<String>,
    #[serde(default)]
    pub speaker_ids: Vec<u64>,
}

/// Job summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectSummary {
    pub file_id: u64,
    pub frames: usize,
    pub records: usize,
    pub discarded_frames: usize,
    pub skips: BTreeMap<String, usize>,
    pub segments: Vec<SpeakerSegment>,
    pub cancelled: bool,
}

impl DetectSummary {
    pub fn from_outcome(outcome: &JobOutcome, min_segment_secs: u64) -> Self {
        Self {
            file_id: outcome.file_id,
            frames: outcome.stats.frames,
            records: outcome.stats.records,
            discarded_frames: outcome.stats.discarded_frames,
            skips: outcome
                .stats
                .skips
                .iter()
                .map(|(reason, count)| (reason.to_string(), *count))
                .collect(),
            segments: outcome.speaker_segments(min_segment_secs),
            cancelled: outcome.cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMatch {
    pub value: ResolvedValue,
    pub label: String,
    pub confidence: f64,
    /// At or above the mode's record threshold.
    pub accepted: bool,
    pub detail: String,
}

/// Offline resolution of one raw OCR string
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolveResponse {
    pub mode: DetectionType,
    pub raw_text: String,
    pub matches: Vec<ResolvedMatch>,
    pub misses: Vec<String>,
}
