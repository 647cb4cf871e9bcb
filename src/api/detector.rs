//! Chyron detector - loads the batch inputs once and runs detection jobs

use crate::api::models::detection::{DetectRequest, DetectSummary, DetectorSettings, ResolveResponse};
use crate::api::resolve::resolve_text;
use crate::core::batch::BatchRunner;
use crate::core::bill::Agenda;
use crate::core::legislator::{Roster, RosterError};
use crate::core::pipeline::{
    DetectionJob, DetectionObserver, DetectionPipeline, ManifestError, OcrEngine, RecordSink, ScreenshotManifest,
    SinkError,
};
use crate::core::region::{DetectionType, RegionCatalog, RegionConfigError};
use log::info;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("region catalog: {0}")]
    Region(#[from] RegionConfigError),
    #[error("roster: {0}")]
    Roster(#[from] RosterError),
    #[error("manifest: {0}")]
    Manifest(#[from] ManifestError),
    #[error("record sink: {0}")]
    Sink(#[from] SinkError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings: {0}")]
    Settings(String),
}

impl DetectorSettings {
    pub fn from_json5_str(text: &str) -> Result<Self, DetectorError> {
        json5::from_str(text).map_err(|e| DetectorError::Settings(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DetectorError> {
        Self::from_json5_str(&std::fs::read_to_string(path)?)
    }
}

/// Chyron detector - region catalog, roster and pipeline for one batch
///
/// ```ignore
/// let detector = ChyronDetector::create("regions.json5", Some("roster.json"), DetectorSettings::default())?;
/// let summary = detector.detect(&request, &ocr, &sink, &LogObserver)?;
/// ```
pub struct ChyronDetector {
    pipeline: Arc<DetectionPipeline>,
    settings: DetectorSettings,
}

impl ChyronDetector {
    pub fn create(
        regions_path: impl AsRef<Path>,
        roster_path: Option<&Path>,
        settings: DetectorSettings,
    ) -> Result<Self, DetectorError> {
        crate::init_logging();

        let catalog = RegionCatalog::from_path(regions_path)?;
        let roster = match roster_path {
            Some(path) => Roster::from_path(path)?,
            None => Roster::default(),
        };

        Ok(Self::from_parts(catalog, roster, settings))
    }

    pub fn from_parts(catalog: RegionCatalog, roster: Roster, settings: DetectorSettings) -> Self {
        info!("🎬 ChyronDetector: created ({} legislators)", roster.len());
        let pipeline = DetectionPipeline::new(Arc::new(catalog), Arc::new(roster), settings.detection.clone());
        Self {
            pipeline: Arc::new(pipeline),
            settings,
        }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    pub fn pipeline(&self) -> &DetectionPipeline {
        &self.pipeline
    }

    pub fn build_job(&self, request: &DetectRequest) -> Result<DetectionJob, DetectorError> {
        let manifest = ScreenshotManifest::load(&request.manifest)?;
        Ok(DetectionJob::new(
            request.file_id,
            request.chamber.as_str(),
            request.event_type.as_str(),
            request.date,
            request.detection_type,
            manifest,
        )
        .with_agenda(Agenda::from_identifiers(&request.agenda))
        .with_speakers(request.speaker_ids.iter().copied()))
    }

    /// Scans one video and appends its records to `sink`.
    pub fn detect(
        &self,
        request: &DetectRequest,
        ocr: &dyn OcrEngine,
        sink: &dyn RecordSink,
        observer: &dyn DetectionObserver,
    ) -> Result<DetectSummary, DetectorError> {
        let job = self.build_job(request)?;
        let outcome = self.pipeline.process_job(&job, ocr, observer, None);
        for record in &outcome.records {
            sink.append(record)?;
        }
        sink.flush()?;
        Ok(DetectSummary::from_outcome(&outcome, self.settings.detection.min_segment_secs))
    }

    /// Scans several videos in parallel. Manifests are loaded up front.
    pub fn detect_batch(
        &self,
        requests: &[DetectRequest],
        ocr: &dyn OcrEngine,
        sink: &dyn RecordSink,
        observer: &dyn DetectionObserver,
    ) -> Result<Vec<DetectSummary>, DetectorError> {
        let jobs = requests
            .iter()
            .map(|request| self.build_job(request))
            .collect::<Result<Vec<_>, _>>()?;

        let runner = BatchRunner::new(Arc::clone(&self.pipeline));
        let mut summaries = Vec::with_capacity(jobs.len());
        for report in runner.run(&jobs, ocr, sink, observer) {
            if let Some(e) = report.sink_error {
                return Err(e.into());
            }
            summaries.push(DetectSummary::from_outcome(
                &report.outcome,
                self.settings.detection.min_segment_secs,
            ));
        }
        Ok(summaries)
    }

    pub fn resolve(&self, mode: DetectionType, raw_text: &str) -> ResolveResponse {
        let roster = Arc::new(self.pipeline.roster().clone());
        resolve_text(mode, raw_text, roster, &self.settings.detection)
    }
}

impl Drop for ChyronDetector {
    fn drop(&mut self) {
        info!("🗑️ ChyronDetector: released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::{MemorySink, MockOcrEngine, NoopObserver};
    use chrono::NaiveDate;
    use std::path::PathBuf;

    const CATALOG: &str = r#"{
        bill_detection: { default: { regions: { house_floor: [0, 0.8, 1, 0.2] } } },
        speaker_detection: { default: { regions: { house_committee: [0, 0.7, 0.5, 0.1] } } },
    }"#;

    fn detector() -> ChyronDetector {
        let roster = Roster::from_json_str(
            r#"[{"id": 1, "first_name": "Vivian", "last_name": "Watts"}, {"id": 2, "first_name": "Amanda", "last_name": "Batten"}]"#,
        )
        .unwrap();
        ChyronDetector::from_parts(
            RegionCatalog::from_json5_str(CATALOG).unwrap(),
            roster,
            DetectorSettings::default(),
        )
    }

    fn write_manifest(dir: &Path, seconds: u64) -> PathBuf {
        let entries: Vec<String> = (0..seconds)
            .map(|t| format!(r#"{{"timestamp": {}, "full": "{:05}.jpg"}}"#, t, t + 1))
            .collect();
        let path = dir.join("manifest.json");
        std::fs::write(&path, format!("[{}]", entries.join(","))).unwrap();
        path
    }

    fn request(manifest: &Path, event_type: &str, detection_type: DetectionType) -> DetectRequest {
        DetectRequest {
            file_id: 99,
            chamber: "house".to_string(),
            event_type: event_type.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            detection_type,
            manifest: manifest.display().to_string(),
            agenda: vec![],
            speaker_ids: vec![],
        }
    }

    #[test]
    fn test_settings_from_json5() {
        let settings = DetectorSettings::from_json5_str(
            "{ detection: { bill_threshold: 95 }, tesseract: { binary: '/usr/local/bin/tesseract' }, crop_units: 'pixels' }",
        )
        .unwrap();
        assert_eq!(settings.detection.bill_threshold, 95.0);
        assert_eq!(settings.detection.speaker_threshold, 75.0);
        assert_eq!(settings.tesseract.binary, "/usr/local/bin/tesseract");
        assert_eq!(settings.tesseract.speaker_psm, 7);
        assert!(DetectorSettings::from_json5_str("[").is_err());
    }

    #[test]
    fn test_detect_speakers() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_manifest(dir.path(), 5);
        let ocr = MockOcrEngine::with_pattern(|t| Some(if t < 3 { "Delegate Amanda Batten" } else { "" }.to_string()));
        let sink = MemorySink::new();

        let summary = detector()
            .detect(
                &request(&manifest, "subcommittee", DetectionType::SpeakerDetection),
                &ocr,
                &sink,
                &NoopObserver,
            )
            .unwrap();

        assert_eq!(summary.records, 3);
        assert_eq!(summary.frames, 5);
        assert_eq!(summary.skips.get("ocr_empty"), Some(&2));
        assert_eq!(summary.segments.len(), 1);
        assert_eq!(summary.segments[0].legislator.id, 2);
        assert_eq!(sink.records()[2].screenshot_ordinal, "00003");
    }

    #[test]
    fn test_detect_batch() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_manifest(dir.path(), 2);
        let ocr = MockOcrEngine::with_pattern(|_| Some("HB 1500".to_string()));
        let sink = MemorySink::new();
        let requests = vec![
            request(&manifest, "floor", DetectionType::BillDetection),
            request(&manifest, "floor", DetectionType::SpeakerDetection),
        ];

        let summaries = detector().detect_batch(&requests, &ocr, &sink, &NoopObserver).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].records, 2);
        // house floor falls back to the committee speaker region; bill text is not a name
        assert_eq!(summaries[1].records, 0);
        assert_eq!(summaries[1].skips.get("no_grammar_match"), Some(&2));
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_missing_manifest() {
        let missing = Path::new("/nonexistent/chyron/manifest.json");
        let err = detector()
            .detect(
                &request(missing, "floor", DetectionType::BillDetection),
                &MockOcrEngine::new(),
                &MemorySink::new(),
                &NoopObserver,
            )
            .unwrap_err();
        assert!(matches!(err, DetectorError::Manifest(ManifestError::Io(_))));
    }

    #[test]
    fn test_resolve() {
        let response = detector().resolve(DetectionType::SpeakerDetection, "Del. Watts");
        assert_eq!(response.matches[0].label, "Vivian Watts");
    }
}
