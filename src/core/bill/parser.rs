use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

use super::{BillCandidate, BillKind, Chamber};

// Applied to upper-cased text. The leading class keeps "THIS BILL 12" from reading as "S BILL 12".
static BILL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:^|[^A-Z])(?P<chamber>HOUSE|SENATE|H|S)[\s.]*(?P<kind>JOINT\s+RESOLUTION|RESOLUTION|BILL|J[\s.]*R|J|B|R)[\s.]*(?:NO[\s.]*)?(?P<number>[0-9]{1,4})(?:[^0-9A-Z]|$)",
    )
    .expect("valid bill regex")
});

// Runs on the raw text so that OCR case survives (`l` vs `I`). The prefix is matched
// case-insensitively, allowing `8` where the kind letter `B` belongs; the number run keeps
// digits and the letters OCR confuses with them.
static NOISY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:^|[^A-Za-z])(?i:HOUSE|SENATE|H|S)[\s.]*(?P<kind>(?i:JOINT\s+RESOLUTION|RESOLUTION|BILL|J[\s.]*R|J|B|R)|8)[\s.]*(?i:NO[\s.]*)?(?P<number>[0-9OoIlSsBZG]{1,4})(?:[^0-9A-Za-z]|$)",
    )
    .expect("valid noisy bill regex")
});

/// A chamber+kind prefix followed by a number run that did not parse literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct NoisyBill {
    /// Byte range of a kind token read as `8`.
    pub kind_digit: Option<Range<usize>>,
    /// Byte range of the number run.
    pub number: Range<usize>,
}

/// Bill-shaped spans of `raw_text` in order of appearance.
pub(super) fn noisy_bills(raw_text: &str) -> impl Iterator<Item = NoisyBill> + '_ {
    NOISY_PATTERN.captures_iter(raw_text).filter_map(|caps| {
        let kind = caps.name("kind")?;
        let number = caps.name("number")?;
        Some(NoisyBill {
            kind_digit: (kind.as_str() == "8").then(|| kind.range()),
            number: number.range(),
        })
    })
}

/// First bill identifier in `raw_text`, if any.
pub fn parse(raw_text: &str) -> Option<BillCandidate> {
    let upper = raw_text.to_uppercase();
    let caps = BILL_PATTERN.captures(&upper)?;

    let chamber = if caps.name("chamber")?.as_str().starts_with('H') {
        Chamber::House
    } else {
        Chamber::Senate
    };

    let kind = match caps.name("kind")?.as_str().chars().next()? {
        'B' => BillKind::Bill,
        'J' => BillKind::JointResolution,
        _ => BillKind::Resolution,
    };

    // at most four digits, so leading zeros are the only thing parse() strips
    let number = caps.name("number")?.as_str().parse::<u32>().ok()?;

    Some(BillCandidate {
        chamber,
        kind,
        number,
    })
}
