//! Pipeline observer hooks

use super::record::DetectionRecord;
use super::state_machine::SkipReason;
use super::ocr::OcrError;
use log::{debug, info, warn};

/// Optional hooks into a running job. Every method defaults to a no-op.
pub trait DetectionObserver: Send + Sync {
    fn on_frame(&self, _file_id: u64, _timestamp: u64) {}

    fn on_record(&self, _record: &DetectionRecord) {}

    fn on_skip(&self, _file_id: u64, _timestamp: u64, _reason: SkipReason) {}

    fn on_ocr_error(&self, _file_id: u64, _timestamp: u64, _error: &OcrError) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DetectionObserver for NoopObserver {}

/// Forwards pipeline events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl DetectionObserver for LogObserver {
    fn on_record(&self, record: &DetectionRecord) {
        info!(
            "📌 file {} @{} [{}]: {} ({:.1})",
            record.file_id,
            record.timecode(),
            record.screenshot_ordinal,
            record.resolved_value.label(),
            record.confidence
        );
    }

    fn on_skip(&self, file_id: u64, timestamp: u64, reason: SkipReason) {
        debug!("file {} @{}s skipped: {}", file_id, timestamp, reason);
    }

    fn on_ocr_error(&self, file_id: u64, timestamp: u64, error: &OcrError) {
        warn!("⚠️ file {} @{}s OCR failed: {}", file_id, timestamp, error);
    }
}
