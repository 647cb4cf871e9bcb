//! Legislator name resolver - chyron text to a roster entry

mod name;
mod score;
mod similarity;

pub use name::{extract, pivot_comma_name, NameCandidate};
pub use score::{
    score, NameScorer, EXACT_MATCH_SCORE, INNER_RUN_SCORE, LAST_NAME_SCORE, SURNAME_MISMATCH_CEILING,
    TRAILING_RUN_SCORE, VARIATION_MATCH_SCORE,
};
pub use similarity::{combined, jaro_winkler, levenshtein, soundex, token_set_ratio};

use log::{debug, info};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Names with fewer letters than this are OCR garbage.
pub const DEFAULT_MIN_NAME_LETTERS: usize = 3;

const TEMPORAL_BOOST_PER_HIT: f64 = 0.05;
const TEMPORAL_BOOST_CAP: f64 = 0.20;
const SPEAKER_LIST_BOOST: f64 = 1.10;
const PARTY_BOOST: f64 = 1.05;
const SCORE_EPSILON: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("roster JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("legislator id {0} appears twice")]
    DuplicateId(u64),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legislator {
    pub id: u64,
    #[serde(alias = "firstName")]
    pub first_name: String,
    #[serde(alias = "lastName")]
    pub last_name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub nickname: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub suffix: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub party: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub district: Option<String>,
}

impl Legislator {
    pub fn display_name(&self) -> String {
        let first = self.nickname.as_deref().unwrap_or(&self.first_name);
        match &self.suffix {
            Some(suffix) => format!("{} {} {}", first, self.last_name, suffix),
            None => format!("{} {}", first, self.last_name),
        }
    }

    /// Every printed form the chyron may use for this legislator.
    pub fn name_forms(&self) -> Vec<String> {
        let mut forms = vec![
            format!("{} {}", self.first_name, self.last_name),
            format!("{}, {}", self.last_name, self.first_name),
        ];
        if let Some(suffix) = &self.suffix {
            forms.push(format!("{} {} {}", self.first_name, self.last_name, suffix));
        }
        if let Some(nickname) = &self.nickname {
            forms.push(format!("{} {}", nickname, self.last_name));
        }
        forms
    }

    fn party_letter(&self) -> Option<char> {
        self.party
            .as_deref()
            .and_then(|p| p.trim().chars().next())
            .map(|c| c.to_ascii_uppercase())
    }

    fn agreement(&self, candidate: &NameCandidate) -> usize {
        let party = matches!((candidate.party, self.party_letter()), (Some(a), Some(b)) if a == b);
        let district = matches!(
            (candidate.district.as_deref(), self.district.as_deref()),
            (Some(a), Some(b)) if a.trim_start_matches('0') == b.trim_start_matches('0')
        );
        usize::from(party) + usize::from(district)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RosterDocument {
    List(Vec<Legislator>),
    Wrapped { legislators: Vec<Legislator> },
}

/// Read-only legislator snapshot for one batch.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    legislators: Vec<Legislator>,
}

impl Roster {
    pub fn new(legislators: Vec<Legislator>) -> Result<Self, RosterError> {
        let mut seen = HashSet::new();
        for legislator in &legislators {
            if !seen.insert(legislator.id) {
                return Err(RosterError::DuplicateId(legislator.id));
            }
        }
        Ok(Self { legislators })
    }

    pub fn from_json_str(text: &str) -> Result<Self, RosterError> {
        let legislators = match serde_json::from_str::<RosterDocument>(text)? {
            RosterDocument::List(list) => list,
            RosterDocument::Wrapped { legislators } => legislators,
        };
        Self::new(legislators)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RosterError> {
        let path = path.as_ref();
        let roster = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        info!("👥 Roster: loaded {} legislators from {:?}", roster.len(), path);
        Ok(roster)
    }

    pub fn get(&self, id: u64) -> Option<&Legislator> {
        self.legislators.iter().find(|l| l.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Legislator> {
        self.legislators.iter()
    }

    pub fn len(&self) -> usize {
        self.legislators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legislators.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegislatorRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredLegislator {
    pub legislator: LegislatorRef,
    pub confidence: f64,
    pub matched_form: String,
}

/// What the resolver knows about the surroundings of a frame.
#[derive(Debug, Clone, Default)]
pub struct NameContext {
    /// Legislators listed as speakers for the meeting.
    pub speaker_ids: BTreeSet<u64>,
    /// Legislators recorded in the preceding frames of the same video, one entry per record.
    pub recent_ids: Vec<u64>,
}

impl NameContext {
    fn boost(&self, legislator: &Legislator, candidate: &NameCandidate, score: f64) -> f64 {
        let mut score = score;

        let hits = self.recent_ids.iter().filter(|&&id| id == legislator.id).count();
        if hits > 0 {
            score *= 1.0 + (hits as f64 * TEMPORAL_BOOST_PER_HIT).min(TEMPORAL_BOOST_CAP);
        }
        if self.speaker_ids.contains(&legislator.id) {
            score *= SPEAKER_LIST_BOOST;
        }
        if let (Some(a), Some(b)) = (candidate.party, legislator.party_letter()) {
            if a == b {
                score *= PARTY_BOOST;
            }
        }

        score.min(100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NameMiss {
    #[error("text does not look like a name")]
    Unreadable,
    #[error("roster is empty")]
    EmptyRoster,
    #[error("{} legislators tie at {confidence:.1}", .ids.len())]
    Ambiguous { confidence: f64, ids: Vec<u64> },
}

/// Scores a cleaned chyron name against every roster entry and picks the best one.
///
/// ```ignore
/// let resolver = LegislatorNameResolver::new(Arc::new(roster));
/// let best = resolver.resolve("Del. Watts (D-39)", &NameContext::default())?;
/// ```
#[derive(Debug, Clone)]
pub struct LegislatorNameResolver {
    roster: Arc<Roster>,
    scorer: NameScorer,
    min_letters: usize,
}

impl LegislatorNameResolver {
    pub fn new(roster: Arc<Roster>) -> Self {
        Self::with_scorer(roster, NameScorer::default(), DEFAULT_MIN_NAME_LETTERS)
    }

    pub fn with_scorer(roster: Arc<Roster>, scorer: NameScorer, min_letters: usize) -> Self {
        Self {
            roster,
            scorer,
            min_letters,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn resolve(&self, raw_text: &str, context: &NameContext) -> Result<ScoredLegislator, NameMiss> {
        self.resolve_candidate(&extract(raw_text), context)
    }

    pub fn resolve_candidate(
        &self,
        candidate: &NameCandidate,
        context: &NameContext,
    ) -> Result<ScoredLegislator, NameMiss> {
        if candidate.is_empty() || candidate.letter_count() < self.min_letters {
            return Err(NameMiss::Unreadable);
        }
        if self.roster.is_empty() {
            return Err(NameMiss::EmptyRoster);
        }

        let scored: Vec<(&Legislator, f64, String)> = self
            .roster
            .iter()
            .map(|legislator| {
                let (raw, form) = legislator
                    .name_forms()
                    .into_iter()
                    .map(|form| (self.scorer.score(&candidate.cleaned, &form, &candidate.tokens), form))
                    .fold((0.0f64, String::new()), |best, next| if next.0 > best.0 { next } else { best });
                (legislator, context.boost(legislator, candidate, raw), form)
            })
            .collect();

        let best = scored.iter().map(|(_, s, _)| *s).fold(0.0f64, f64::max);
        let mut top: Vec<&(&Legislator, f64, String)> =
            scored.iter().filter(|(_, s, _)| (best - *s).abs() < SCORE_EPSILON).collect();

        if top.len() > 1 {
            let agreement = top.iter().map(|(l, _, _)| l.agreement(candidate)).max().unwrap_or(0);
            top.retain(|(l, _, _)| l.agreement(candidate) == agreement);
        }

        match top.as_slice() {
            [(legislator, confidence, form)] => {
                debug!(
                    "LegislatorResolver: '{}' -> {} ({:.1})",
                    candidate.cleaned,
                    legislator.display_name(),
                    confidence
                );
                Ok(ScoredLegislator {
                    legislator: LegislatorRef {
                        id: legislator.id,
                        name: legislator.display_name(),
                    },
                    confidence: *confidence,
                    matched_form: form.clone(),
                })
            }
            tied => Err(NameMiss::Ambiguous {
                confidence: best,
                ids: tied.iter().map(|(l, _, _)| l.id).collect(),
            }),
        }
    }

    /// One resolution per blank-line separated block of the frame text.
    pub fn resolve_blocks(
        &self,
        raw_text: &str,
        context: &NameContext,
    ) -> Vec<(NameCandidate, Result<ScoredLegislator, NameMiss>)> {
        split_blocks(raw_text)
            .into_iter()
            .map(|block| {
                let candidate = extract(&block);
                let result = self.resolve_candidate(&candidate, context);
                (candidate, result)
            })
            .collect()
    }
}

fn split_blocks(raw_text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in raw_text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }

    blocks
}
