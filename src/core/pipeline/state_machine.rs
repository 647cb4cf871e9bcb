use serde::Serialize;

/// Why a screenshot produced no record. None of these abort a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ConfigurationMissing,
    MalformedRegion,
    OcrEmpty,
    OcrFailed,
    NoGrammarMatch,
    BelowThreshold,
    Ambiguous,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::ConfigurationMissing => "configuration_missing",
            SkipReason::MalformedRegion => "malformed_region",
            SkipReason::OcrEmpty => "ocr_empty",
            SkipReason::OcrFailed => "ocr_failed",
            SkipReason::NoGrammarMatch => "no_grammar_match",
            SkipReason::BelowThreshold => "below_threshold",
            SkipReason::Ambiguous => "ambiguous",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one screenshot.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameState {
    Pending,
    RegionResolved,
    RegionMissing(SkipReason),
    OcrExtracted,
    OcrEmpty(SkipReason),
    /// Number of accepted candidates.
    Resolved(usize),
    Unresolved(SkipReason),
    Recorded(usize),
    Discarded(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    RegionFound,
    RegionUnavailable(SkipReason),
    TextExtracted,
    TextEmpty,
    OcrFailed,
    Accepted(usize),
    Rejected(SkipReason),
}

impl FrameState {
    pub fn new() -> Self {
        FrameState::Pending
    }

    /// Next state for `event`; events that do not apply leave the state unchanged.
    pub fn transition(&self, event: FrameEvent) -> FrameState {
        match (self, event) {
            (FrameState::Pending, FrameEvent::RegionFound) => FrameState::RegionResolved,
            (FrameState::Pending, FrameEvent::RegionUnavailable(reason)) => FrameState::RegionMissing(reason),

            (FrameState::RegionResolved, FrameEvent::TextExtracted) => FrameState::OcrExtracted,
            (FrameState::RegionResolved, FrameEvent::TextEmpty) => FrameState::OcrEmpty(SkipReason::OcrEmpty),
            (FrameState::RegionResolved, FrameEvent::OcrFailed) => FrameState::OcrEmpty(SkipReason::OcrFailed),

            (FrameState::OcrExtracted, FrameEvent::Accepted(0)) => {
                FrameState::Unresolved(SkipReason::NoGrammarMatch)
            }
            (FrameState::OcrExtracted, FrameEvent::Accepted(count)) => FrameState::Resolved(count),
            (FrameState::OcrExtracted, FrameEvent::Rejected(reason)) => FrameState::Unresolved(reason),

            (state, _) => state.clone(),
        }
    }

    /// Final state: resolved frames are recorded, every skip is discarded.
    pub fn settle(&self) -> FrameState {
        match self {
            FrameState::Resolved(count) => FrameState::Recorded(*count),
            FrameState::RegionMissing(reason) | FrameState::OcrEmpty(reason) | FrameState::Unresolved(reason) => {
                FrameState::Discarded(*reason)
            }
            other => other.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FrameState::Recorded(_) | FrameState::Discarded(_))
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            FrameState::RegionMissing(reason)
            | FrameState::OcrEmpty(reason)
            | FrameState::Unresolved(reason)
            | FrameState::Discarded(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl Default for FrameState {
    fn default() -> Self {
        Self::new()
    }
}
