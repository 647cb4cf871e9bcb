use super::record::{DetectionRecord, ResolvedValue};
use crate::core::legislator::LegislatorRef;
use serde::Serialize;

pub const DEFAULT_MIN_SEGMENT_SECS: u64 = 3;

/// A run of screenshots attributed to one speaker. `end` is inclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakerSegment {
    pub start: u64,
    pub end: u64,
    pub legislator: LegislatorRef,
}

impl SpeakerSegment {
    pub fn duration(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }
}

/// Collapses consecutive legislator records of one video into segments.
///
/// Bill records are ignored. A different legislator closes the open segment;
/// segments shorter than `min_seconds` are dropped.
pub fn speaker_segments(records: &[DetectionRecord], min_seconds: u64) -> Vec<SpeakerSegment> {
    let mut segments = Vec::new();
    let mut current: Option<SpeakerSegment> = None;

    let commit = |segment: Option<SpeakerSegment>, segments: &mut Vec<SpeakerSegment>| {
        if let Some(segment) = segment {
            if segment.duration() >= min_seconds {
                segments.push(segment);
            }
        }
    };

    for record in records {
        let ResolvedValue::Legislator(legislator) = &record.resolved_value else {
            continue;
        };

        match current.as_mut() {
            Some(open) if open.legislator.id == legislator.id => {
                open.end = open.end.max(record.elapsed_seconds);
            }
            _ => {
                commit(current.take(), &mut segments);
                current = Some(SpeakerSegment {
                    start: record.elapsed_seconds,
                    end: record.elapsed_seconds,
                    legislator: legislator.clone(),
                });
            }
        }
    }
    commit(current, &mut segments);

    segments
}
