//! Detection pipeline - screenshots of one video in, detection records out
//!
//! Each screenshot walks the [`FrameState`] machine: region lookup, OCR of the
//! cropped chyron, then bill or name resolution. Every skip is recoverable; a
//! video never fails because one of its screenshots did.

pub mod crop;
pub mod manifest;
pub mod observer;
pub mod ocr;
pub mod record;
pub mod segments;
pub mod state_machine;

pub use manifest::{ManifestEntry, ManifestError, ScreenshotManifest};
pub use observer::{DetectionObserver, LogObserver, NoopObserver};
pub use ocr::{MockOcrEngine, OcrEngine, OcrError, OcrRequest};
pub use record::{DetectionKind, DetectionRecord, JsonLinesSink, MemorySink, RecordSink, ResolvedValue, SinkError};
pub use segments::{speaker_segments, SpeakerSegment};
pub use state_machine::{FrameEvent, FrameState, SkipReason};

use crate::core::bill::{Agenda, BillIdentifierResolver};
use crate::core::legislator::{LegislatorNameResolver, NameContext, NameMiss, NameScorer, Roster};
use crate::core::noise::NoiseModel;
use crate::core::region::{DetectionType, Rectangle, RegionCatalog, RegionLookupError};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum confidence for a bill record.
    pub bill_threshold: f64,
    /// Minimum confidence for a legislator record.
    pub speaker_threshold: f64,
    pub ordinal_width: usize,
    pub min_name_letters: usize,
    pub name_variation_limit: usize,
    /// How far back records feed the temporal boost.
    pub temporal_window_secs: u64,
    pub min_segment_secs: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            bill_threshold: 90.0,
            speaker_threshold: 75.0,
            ordinal_width: record::DEFAULT_ORDINAL_WIDTH,
            min_name_letters: crate::core::legislator::DEFAULT_MIN_NAME_LETTERS,
            name_variation_limit: crate::core::noise::DEFAULT_NAME_VARIATION_LIMIT,
            temporal_window_secs: 5,
            min_segment_secs: segments::DEFAULT_MIN_SEGMENT_SECS,
        }
    }
}

impl DetectionConfig {
    pub fn threshold(&self, detection_type: DetectionType) -> f64 {
        match detection_type {
            DetectionType::BillDetection => self.bill_threshold,
            DetectionType::SpeakerDetection => self.speaker_threshold,
        }
    }
}

/// One video to scan in one detection mode.
#[derive(Debug, Clone)]
pub struct DetectionJob {
    pub file_id: u64,
    pub chamber: String,
    pub event_type: String,
    pub date: NaiveDate,
    pub detection_type: DetectionType,
    pub manifest: ScreenshotManifest,
    /// Bills scheduled for the meeting; empty disables the agenda check.
    pub agenda: Agenda,
    /// Legislators listed as speakers for the meeting.
    pub speaker_ids: BTreeSet<u64>,
}

impl DetectionJob {
    pub fn new(
        file_id: u64,
        chamber: impl Into<String>,
        event_type: impl Into<String>,
        date: NaiveDate,
        detection_type: DetectionType,
        manifest: ScreenshotManifest,
    ) -> Self {
        Self {
            file_id,
            chamber: chamber.into(),
            event_type: event_type.into(),
            date,
            detection_type,
            manifest,
            agenda: Agenda::new(),
            speaker_ids: BTreeSet::new(),
        }
    }

    pub fn with_agenda(mut self, agenda: Agenda) -> Self {
        self.agenda = agenda;
        self
    }

    pub fn with_speakers(mut self, speaker_ids: impl IntoIterator<Item = u64>) -> Self {
        self.speaker_ids = speaker_ids.into_iter().collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobStats {
    pub frames: usize,
    pub recorded_frames: usize,
    pub records: usize,
    pub discarded_frames: usize,
    pub skips: BTreeMap<SkipReason, usize>,
}

impl JobStats {
    fn count(&mut self, state: &FrameState) {
        self.frames += 1;
        match state {
            FrameState::Recorded(count) => {
                self.recorded_frames += 1;
                self.records += count;
            }
            FrameState::Discarded(reason) => {
                self.discarded_frames += 1;
                *self.skips.entry(*reason).or_default() += 1;
            }
            _ => {}
        }
    }

    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.skips.get(&reason).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    pub file_id: u64,
    pub records: Vec<DetectionRecord>,
    pub stats: JobStats,
    pub cancelled: bool,
}

impl JobOutcome {
    pub fn speaker_segments(&self, min_seconds: u64) -> Vec<SpeakerSegment> {
        speaker_segments(&self.records, min_seconds)
    }
}

fn lookup_skip(error: &RegionLookupError) -> SkipReason {
    match error {
        RegionLookupError::ConfigurationMissing { .. } => SkipReason::ConfigurationMissing,
        RegionLookupError::MalformedRegion { .. } => SkipReason::MalformedRegion,
    }
}

/// Runs detection jobs against a shared catalog and roster.
///
/// ```ignore
/// let pipeline = DetectionPipeline::new(Arc::new(catalog), Arc::new(roster), DetectionConfig::default());
/// let outcome = pipeline.process_job(&job, &ocr, &LogObserver, None);
/// for record in &outcome.records {
///     sink.append(record)?;
/// }
/// ```
pub struct DetectionPipeline {
    catalog: Arc<RegionCatalog>,
    config: DetectionConfig,
    bills: BillIdentifierResolver,
    names: LegislatorNameResolver,
}

impl DetectionPipeline {
    pub fn new(catalog: Arc<RegionCatalog>, roster: Arc<Roster>, config: DetectionConfig) -> Self {
        let scorer = NameScorer::new(NoiseModel::ocr(), config.name_variation_limit);
        Self {
            catalog,
            bills: BillIdentifierResolver::default(),
            names: LegislatorNameResolver::with_scorer(roster, scorer, config.min_name_letters),
            config,
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }

    pub fn roster(&self) -> &Roster {
        self.names.roster()
    }

    /// Scans every screenshot of `job` in timestamp order.
    ///
    /// `cancel` is checked between screenshots; records produced before it was
    /// raised are returned as usual.
    pub fn process_job(
        &self,
        job: &DetectionJob,
        ocr: &dyn OcrEngine,
        observer: &dyn DetectionObserver,
        cancel: Option<&AtomicBool>,
    ) -> JobOutcome {
        let mut outcome = JobOutcome {
            file_id: job.file_id,
            ..JobOutcome::default()
        };

        let region = self
            .catalog
            .lookup(job.detection_type, &job.chamber, &job.event_type, job.date);
        if let Err(e) = &region {
            warn!("⚠️ file {}: no {} region ({})", job.file_id, job.detection_type, e);
        }

        info!(
            "🎬 file {}: scanning {} screenshots for {}",
            job.file_id,
            job.manifest.len(),
            job.detection_type
        );

        for entry in job.manifest.entries() {
            if cancel.map(|c| c.load(Ordering::SeqCst)).unwrap_or(false) {
                info!("🛑 file {}: cancelled at {}s", job.file_id, entry.timestamp);
                outcome.cancelled = true;
                break;
            }

            observer.on_frame(job.file_id, entry.timestamp);
            let (state, records) = self.process_frame(job, entry, &region, ocr, observer, &outcome.records);
            let state = state.settle();
            if !state.is_terminal() {
                warn!("⚠️ file {}: frame at {}s stopped in {:?}", job.file_id, entry.timestamp, state);
            }

            if let Some(reason) = state.skip_reason() {
                observer.on_skip(job.file_id, entry.timestamp, reason);
            }
            for record in &records {
                observer.on_record(record);
            }

            outcome.stats.count(&state);
            outcome.records.extend(records);
        }

        info!(
            "✅ file {}: {} records from {} screenshots ({} discarded)",
            job.file_id, outcome.stats.records, outcome.stats.frames, outcome.stats.discarded_frames
        );
        outcome
    }

    fn process_frame(
        &self,
        job: &DetectionJob,
        entry: &ManifestEntry,
        region: &Result<Rectangle, RegionLookupError>,
        ocr: &dyn OcrEngine,
        observer: &dyn DetectionObserver,
        previous: &[DetectionRecord],
    ) -> (FrameState, Vec<DetectionRecord>) {
        let mut state = FrameState::new();

        let region = match region {
            Ok(rect) => {
                state = state.transition(FrameEvent::RegionFound);
                *rect
            }
            Err(e) => return (state.transition(FrameEvent::RegionUnavailable(lookup_skip(e))), Vec::new()),
        };

        let Some(image) = job.manifest.image_path(entry) else {
            return (state.transition(FrameEvent::TextEmpty), Vec::new());
        };

        let request = OcrRequest {
            image: &image,
            region,
            detection_type: job.detection_type,
            timestamp: entry.timestamp,
        };
        let raw_text = match ocr.extract_text(&request) {
            Ok(text) if text.trim().is_empty() => return (state.transition(FrameEvent::TextEmpty), Vec::new()),
            Ok(text) => {
                state = state.transition(FrameEvent::TextExtracted);
                text
            }
            Err(e) => {
                observer.on_ocr_error(job.file_id, entry.timestamp, &e);
                return (state.transition(FrameEvent::OcrFailed), Vec::new());
            }
        };

        let accepted = match job.detection_type {
            DetectionType::BillDetection => self.accept_bills(job, &raw_text),
            DetectionType::SpeakerDetection => self.accept_names(job, entry.timestamp, &raw_text, previous),
        };

        match accepted {
            Ok(values) => {
                let records: Vec<DetectionRecord> = values
                    .into_iter()
                    .map(|(value, confidence)| {
                        DetectionRecord::new(
                            job.file_id,
                            entry.timestamp,
                            self.config.ordinal_width,
                            raw_text.as_str(),
                            value,
                            confidence,
                        )
                    })
                    .collect();
                (state.transition(FrameEvent::Accepted(records.len())), records)
            }
            Err(reason) => (state.transition(FrameEvent::Rejected(reason)), Vec::new()),
        }
    }

    /// Bill candidates at or above the threshold, one per distinct bill.
    fn accept_bills(&self, job: &DetectionJob, raw_text: &str) -> Result<Vec<(ResolvedValue, f64)>, SkipReason> {
        let candidates = self.bills.resolve_lines(raw_text);
        if candidates.is_empty() {
            return Err(SkipReason::NoGrammarMatch);
        }

        let threshold = self.config.bill_threshold;
        let accepted: Vec<(ResolvedValue, f64)> = candidates
            .into_iter()
            .map(|scored| scored.checked_against(&job.agenda))
            .filter(|scored| {
                let keep = scored.confidence >= threshold;
                if !keep {
                    debug!("file {}: {} below threshold ({:.1})", job.file_id, scored.candidate, scored.confidence);
                }
                keep
            })
            .map(|scored| (ResolvedValue::Bill(scored.candidate), scored.confidence))
            .collect();

        if accepted.is_empty() {
            Err(SkipReason::BelowThreshold)
        } else {
            Ok(accepted)
        }
    }

    /// Legislators at or above the threshold, one per text block.
    fn accept_names(
        &self,
        job: &DetectionJob,
        timestamp: u64,
        raw_text: &str,
        previous: &[DetectionRecord],
    ) -> Result<Vec<(ResolvedValue, f64)>, SkipReason> {
        let window_start = timestamp.saturating_sub(self.config.temporal_window_secs);
        let context = NameContext {
            speaker_ids: job.speaker_ids.clone(),
            recent_ids: previous
                .iter()
                .filter(|r| r.elapsed_seconds >= window_start && r.elapsed_seconds < timestamp)
                .filter_map(DetectionRecord::legislator_id)
                .collect(),
        };

        let threshold = self.config.speaker_threshold;
        let mut accepted: Vec<(ResolvedValue, f64)> = Vec::new();
        let mut below = false;
        let mut ambiguous = false;

        for (candidate, result) in self.names.resolve_blocks(raw_text, &context) {
            match result {
                Ok(scored) if scored.confidence >= threshold => {
                    let duplicate = accepted
                        .iter()
                        .any(|(v, _)| matches!(v, ResolvedValue::Legislator(l) if l.id == scored.legislator.id));
                    if !duplicate {
                        accepted.push((ResolvedValue::Legislator(scored.legislator), scored.confidence));
                    }
                }
                Ok(scored) => {
                    debug!(
                        "file {}: '{}' best {} below threshold ({:.1})",
                        job.file_id, candidate.cleaned, scored.legislator.name, scored.confidence
                    );
                    below = true;
                }
                Err(NameMiss::Ambiguous { confidence, ids }) => {
                    debug!("file {}: '{}' ambiguous between {:?}", job.file_id, candidate.cleaned, ids);
                    if confidence >= threshold {
                        ambiguous = true;
                    } else {
                        below = true;
                    }
                }
                Err(miss) => debug!("file {}: '{}' {}", job.file_id, candidate.cleaned, miss),
            }
        }

        match accepted.is_empty() {
            false => Ok(accepted),
            true if ambiguous => Err(SkipReason::Ambiguous),
            true if below => Err(SkipReason::BelowThreshold),
            true => Err(SkipReason::NoGrammarMatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bill::BillCandidate;
    use std::sync::Mutex;

    const CATALOG: &str = r#"{
        bill_detection: {
            current: { min_date: "2020-01-01", regions: { house_floor: [0.0, 0.8, 1.0, 0.2], senate_floor: [0, 0, 2] } },
        },
        speaker_detection: {
            current: { min_date: "2020-01-01", regions: { house_floor: [0.0, 0.7, 0.6, 0.1] } },
        },
    }"#;

    const ROSTER: &str = r#"[
        {"id": 1, "first_name": "Vivian", "last_name": "Watts", "party": "D", "district": "39"},
        {"id": 2, "first_name": "Robert", "last_name": "Smith", "nickname": "Bob", "party": "R", "district": "12"},
        {"id": 3, "first_name": "Jane", "last_name": "Smith", "party": "D", "district": "40"}
    ]"#;

    fn pipeline() -> DetectionPipeline {
        DetectionPipeline::new(
            Arc::new(RegionCatalog::from_json5_str(CATALOG).unwrap()),
            Arc::new(Roster::from_json_str(ROSTER).unwrap()),
            DetectionConfig::default(),
        )
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
    }

    fn job(chamber: &str, detection_type: DetectionType, seconds: u64) -> DetectionJob {
        let entries = (0..seconds)
            .map(|t| ManifestEntry::new(t, format!("{:05}.jpg", t + 1)))
            .collect();
        DetectionJob::new(7, chamber, "floor", date(), detection_type, ScreenshotManifest::from_entries(entries))
    }

    #[derive(Default)]
    struct RecordingObserver {
        skips: Mutex<Vec<(u64, SkipReason)>>,
        ocr_errors: Mutex<usize>,
    }

    impl DetectionObserver for RecordingObserver {
        fn on_skip(&self, _file_id: u64, timestamp: u64, reason: SkipReason) {
            self.skips.lock().unwrap().push((timestamp, reason));
        }

        fn on_ocr_error(&self, _file_id: u64, _timestamp: u64, _error: &OcrError) {
            *self.ocr_errors.lock().unwrap() += 1;
        }
    }

    fn bill_value(record: &DetectionRecord) -> BillCandidate {
        match &record.resolved_value {
            ResolvedValue::Bill(bill) => *bill,
            other => panic!("expected a bill, got {:?}", other),
        }
    }

    #[test]
    fn test_bill_job() {
        let ocr = MockOcrEngine::with_texts(vec![
            (0, "H.B. 1234"),
            (1, ""),
            (2, "H8 2067"),
            (3, "Committee on Finance"),
        ]);
        let observer = RecordingObserver::default();
        let outcome = pipeline().process_job(&job("house", DetectionType::BillDetection, 4), &ocr, &observer, None);

        assert_eq!(ocr.calls(), 4);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].screenshot_ordinal, "00001");
        assert_eq!(bill_value(&outcome.records[0]).canonical(), "HB1234");
        assert_eq!(outcome.records[0].confidence, 100.0);
        assert_eq!(outcome.records[1].screenshot_ordinal, "00003");
        assert_eq!(bill_value(&outcome.records[1]).canonical(), "HB2067");
        assert_eq!(outcome.records[1].raw_text, "H8 2067");

        assert_eq!(outcome.stats.frames, 4);
        assert_eq!(outcome.stats.recorded_frames, 2);
        assert_eq!(outcome.stats.skipped(SkipReason::OcrEmpty), 1);
        assert_eq!(outcome.stats.skipped(SkipReason::NoGrammarMatch), 1);
        assert_eq!(
            *observer.skips.lock().unwrap(),
            vec![(1, SkipReason::OcrEmpty), (3, SkipReason::NoGrammarMatch)]
        );
    }

    #[test]
    fn test_multiple_bills_in_one_frame() {
        let ocr = MockOcrEngine::with_texts(vec![(0, "HB 1234\nSB 56\nHB 1234")]);
        let outcome = pipeline().process_job(&job("house", DetectionType::BillDetection, 1), &ocr, &NoopObserver, None);

        let bills: Vec<String> = outcome.records.iter().map(|r| bill_value(r).canonical()).collect();
        assert_eq!(bills, vec!["HB1234", "SB56"]);
        assert!(outcome.records.iter().all(|r| r.screenshot_ordinal == "00001"));
        assert_eq!(outcome.stats.records, 2);
    }

    #[test]
    fn test_agenda_demotes_repaired_bill() {
        let ocr = MockOcrEngine::with_texts(vec![(0, "H8 2067"), (1, "HB 9")]);
        let job = job("house", DetectionType::BillDetection, 2).with_agenda(Agenda::from_identifiers(["HB1"]));
        let outcome = pipeline().process_job(&job, &ocr, &NoopObserver, None);

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(bill_value(&outcome.records[0]).canonical(), "HB9");
        assert_eq!(outcome.stats.skipped(SkipReason::BelowThreshold), 1);
    }

    #[test]
    fn test_missing_region_skips_ocr() {
        let ocr = MockOcrEngine::with_texts(vec![(0, "HB 1")]);
        let outcome = pipeline().process_job(&job("senate", DetectionType::SpeakerDetection, 3), &ocr, &NoopObserver, None);

        assert_eq!(ocr.calls(), 0);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stats.skipped(SkipReason::ConfigurationMissing), 3);
    }

    #[test]
    fn test_malformed_region() {
        let ocr = MockOcrEngine::with_texts(vec![(0, "HB 1")]);
        let outcome = pipeline().process_job(&job("senate", DetectionType::BillDetection, 1), &ocr, &NoopObserver, None);
        assert_eq!(ocr.calls(), 0);
        assert_eq!(outcome.stats.skipped(SkipReason::MalformedRegion), 1);
    }

    #[test]
    fn test_ocr_failure_is_skipped() {
        let ocr = MockOcrEngine::with_responder(|request| match request.timestamp {
            1 => Err(OcrError::Engine("tesseract crashed".to_string())),
            _ => Ok("HB 5".to_string()),
        });
        let observer = RecordingObserver::default();
        let outcome = pipeline().process_job(&job("house", DetectionType::BillDetection, 3), &ocr, &observer, None);

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.stats.skipped(SkipReason::OcrFailed), 1);
        assert_eq!(*observer.ocr_errors.lock().unwrap(), 1);
    }

    #[test]
    fn test_speaker_job_with_temporal_context() {
        let ocr = MockOcrEngine::with_texts(vec![
            (0, "Del. Vivian Watts (D-39)"),
            (1, "Del. Jane Smith"),
            (2, "Smith"),
            (3, "x"),
        ]);
        let outcome = pipeline().process_job(&job("house", DetectionType::SpeakerDetection, 4), &ocr, &NoopObserver, None);

        let ids: Vec<u64> = outcome.records.iter().filter_map(DetectionRecord::legislator_id).collect();
        assert_eq!(ids, vec![1, 3, 3]);
        assert!(outcome.records.iter().all(|r| r.kind == DetectionKind::Legislator));
        assert_eq!(outcome.stats.skipped(SkipReason::NoGrammarMatch), 1);
    }

    #[test]
    fn test_shared_surname_without_context_is_ambiguous() {
        let ocr = MockOcrEngine::with_texts(vec![(0, "Smith")]);
        let outcome = pipeline().process_job(&job("house", DetectionType::SpeakerDetection, 1), &ocr, &NoopObserver, None);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.stats.skipped(SkipReason::Ambiguous), 1);

        let job = job("house", DetectionType::SpeakerDetection, 1).with_speakers([2]);
        let outcome = pipeline().process_job(&job, &ocr, &NoopObserver, None);
        assert_eq!(outcome.records[0].legislator_id(), Some(2));
    }

    #[test]
    fn test_speaker_segments_from_outcome() {
        let ocr = MockOcrEngine::with_pattern(|t| Some(if t < 4 { "Del. Watts" } else { "Del. Jane Smith" }.to_string()));
        let outcome = pipeline().process_job(&job("house", DetectionType::SpeakerDetection, 6), &ocr, &NoopObserver, None);

        let segments = outcome.speaker_segments(3);
        assert_eq!(segments.len(), 1);
        assert_eq!((segments[0].start, segments[0].end, segments[0].legislator.id), (0, 3, 1));
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = AtomicBool::new(true);
        let ocr = MockOcrEngine::with_texts(vec![(0, "HB 1")]);
        let outcome = pipeline().process_job(&job("house", DetectionType::BillDetection, 2), &ocr, &NoopObserver, Some(&cancel));

        assert!(outcome.cancelled);
        assert_eq!(outcome.stats.frames, 0);
        assert_eq!(ocr.calls(), 0);
    }

    #[test]
    fn test_empty_manifest_entry_is_skipped() {
        let manifest = ScreenshotManifest::from_entries(vec![ManifestEntry::new(0, "")]);
        let job = DetectionJob::new(7, "house", "floor", date(), DetectionType::BillDetection, manifest);
        let ocr = MockOcrEngine::with_texts(vec![(0, "HB 1")]);
        let outcome = pipeline().process_job(&job, &ocr, &NoopObserver, None);

        assert_eq!(ocr.calls(), 0);
        assert_eq!(outcome.stats.skipped(SkipReason::OcrEmpty), 1);
    }

    #[test]
    fn test_out_of_range_timestamp_saturates() {
        let manifest = ScreenshotManifest::from_json_str(r#"[{"timestamp": 1e30, "full": "a.jpg"}]"#).unwrap();
        assert_eq!(manifest.entries()[0].timestamp, u64::MAX);

        let job = DetectionJob::new(7, "house", "floor", date(), DetectionType::BillDetection, manifest);
        let ocr = MockOcrEngine::with_pattern(|_| Some("HB 1".to_string()));
        let outcome = pipeline().process_job(&job, &ocr, &NoopObserver, None);

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].elapsed_seconds, u64::MAX);
        assert_eq!(outcome.records[0].screenshot_ordinal, u64::MAX.to_string());
    }
}
