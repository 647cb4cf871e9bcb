//! Bill identifier resolver - raw chyron text to canonical bill numbers

mod parser;

pub use parser::parse;

use crate::core::noise::NoiseModel;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Confidence of a bill read straight from the OCR text.
pub const LITERAL_MATCH_SCORE: f64 = 100.0;
/// Confidence of a bill recovered through one OCR confusion.
pub const REPAIRED_MATCH_SCORE: f64 = 92.0;
/// Repaired bills that the meeting agenda does not list drop to this score.
pub const AGENDA_MISS_SCORE: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chamber {
    House,
    Senate,
}

impl Chamber {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chamber::House => "house",
            Chamber::Senate => "senate",
        }
    }

    fn letter(&self) -> &'static str {
        match self {
            Chamber::House => "H",
            Chamber::Senate => "S",
        }
    }
}

impl std::str::FromStr for Chamber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "house" | "h" => Ok(Chamber::House),
            "senate" | "s" => Ok(Chamber::Senate),
            other => Err(format!("unknown chamber: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillKind {
    Bill,
    JointResolution,
    Resolution,
}

impl BillKind {
    pub fn letters(&self) -> &'static str {
        match self {
            BillKind::Bill => "B",
            BillKind::JointResolution => "JR",
            BillKind::Resolution => "R",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillCandidate {
    pub chamber: Chamber,
    pub kind: BillKind,
    pub number: u32,
}

impl BillCandidate {
    pub fn canonical(&self) -> String {
        format(self.chamber, self.kind, self.number)
    }
}

impl fmt::Display for BillCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Tightest canonical form: `HB1234`, `SJR42`, `SR99`.
pub fn format(chamber: Chamber, kind: BillKind, number: u32) -> String {
    format!("{}{}{}", chamber.letter(), kind.letters(), number)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MatchSource {
    Literal,
    Repaired { variant: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredBill {
    pub candidate: BillCandidate,
    pub source: MatchSource,
    pub confidence: f64,
}

impl ScoredBill {
    pub fn is_repaired(&self) -> bool {
        matches!(self.source, MatchSource::Repaired { .. })
    }

    /// Repaired reads must be confirmed by the agenda when one is known.
    pub fn checked_against(mut self, agenda: &Agenda) -> Self {
        if self.is_repaired() && !agenda.is_empty() && !agenda.contains(&self.candidate) {
            debug!("BillResolver: repaired {} is not on the agenda", self.candidate);
            self.confidence = self.confidence.min(AGENDA_MISS_SCORE);
        }
        self
    }
}

/// Bills listed on the meeting agenda.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agenda {
    bills: BTreeSet<BillCandidate>,
}

impl Agenda {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agenda from free-form identifiers; entries that do not parse are ignored.
    pub fn from_identifiers<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            bills: identifiers.into_iter().filter_map(|s| parse(s.as_ref())).collect(),
        }
    }

    pub fn insert(&mut self, bill: BillCandidate) {
        self.bills.insert(bill);
    }

    pub fn contains(&self, bill: &BillCandidate) -> bool {
        self.bills.contains(bill)
    }

    pub fn is_empty(&self) -> bool {
        self.bills.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bills.len()
    }
}

/// Grammar parse plus single-confusion repair.
///
/// ```ignore
/// let resolver = BillIdentifierResolver::default();
/// let bill = resolver.resolve("H8 2067").unwrap();
/// assert_eq!(bill.candidate.canonical(), "HB2067");
/// ```
#[derive(Debug, Clone, Default)]
pub struct BillIdentifierResolver {
    noise: NoiseModel,
}

impl BillIdentifierResolver {
    pub fn new(noise: NoiseModel) -> Self {
        Self { noise }
    }

    pub fn parse(&self, raw_text: &str) -> Option<BillCandidate> {
        parse(raw_text)
    }

    /// Literal parse first, then a single-confusion repair of a bill-shaped span.
    ///
    /// Only the kind letter (`8` for `B`) or the number run is ever rewritten, never the
    /// surrounding text, so a line needs a literal chamber token to be repaired at all.
    pub fn resolve(&self, raw_text: &str) -> Option<ScoredBill> {
        if let Some(candidate) = parse(raw_text) {
            return Some(ScoredBill {
                candidate,
                source: MatchSource::Literal,
                confidence: LITERAL_MATCH_SCORE,
            });
        }

        parser::noisy_bills(raw_text).find_map(|span| {
            let variant = self.repair(raw_text, &span)?;
            let candidate = parse(&variant)?;
            debug!("BillResolver: repaired '{}' -> {}", raw_text.trim(), candidate);
            Some(ScoredBill {
                candidate,
                source: MatchSource::Repaired { variant },
                confidence: REPAIRED_MATCH_SCORE,
            })
        })
    }

    fn repair(&self, raw_text: &str, span: &parser::NoisyBill) -> Option<String> {
        let number = &raw_text[span.number.clone()];
        let digits_only = number.chars().all(|c| c.is_ascii_digit());

        let (range, replacement) = match (&span.kind_digit, digits_only) {
            (Some(kind), true) => (kind.clone(), "B".to_string()),
            (None, false) => {
                let digits = self
                    .noise
                    .variations(number)
                    .into_iter()
                    .find(|v| v.chars().all(|c| c.is_ascii_digit()))?;
                (span.number.clone(), digits)
            }
            // nothing to repair, or more than one confusion
            _ => return None,
        };

        let mut variant = raw_text.to_string();
        variant.replace_range(range, &replacement);
        Some(variant)
    }

    /// One candidate per line, deduplicated, keeping the best confidence per bill.
    pub fn resolve_lines(&self, raw_text: &str) -> Vec<ScoredBill> {
        let mut out: Vec<ScoredBill> = Vec::new();

        for line in raw_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some(scored) = self.resolve(line) else {
                continue;
            };
            match out.iter_mut().find(|s| s.candidate == scored.candidate) {
                Some(existing) if existing.confidence < scored.confidence => *existing = scored,
                Some(_) => {}
                None => out.push(scored),
            }
        }

        out
    }
}
