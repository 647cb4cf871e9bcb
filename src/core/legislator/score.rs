//! Name score - how well a cleaned chyron name matches one roster name, 0 to 100
//!
//! Scores are bimodal: structural matches land at 90 and above, and a candidate
//! that shares no surname token with the roster name never reaches 50.

use super::name::pivot_comma_name;
use super::similarity;
use crate::core::noise::{fold as normalize, NoiseModel, DEFAULT_NAME_VARIATION_LIMIT};

pub const EXACT_MATCH_SCORE: f64 = 100.0;
pub const VARIATION_MATCH_SCORE: f64 = 95.0;
pub const TRAILING_RUN_SCORE: f64 = 95.0;
pub const INNER_RUN_SCORE: f64 = 92.0;
pub const LAST_NAME_SCORE: f64 = 90.0;
/// Ceiling for fuzzy scores when the surname is absent from the candidate.
pub const SURNAME_MISMATCH_CEILING: f64 = 49.0;

const SOUNDEX_BONUS: f64 = 1.1;
const SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "v"];

fn is_suffix(token: &str) -> bool {
    SUFFIXES.contains(&normalize(token).as_str())
}

/// Surname tokens of a roster name: the part before the comma in `"Last, First"` form,
/// otherwise the last token that is not a generational suffix.
fn surname_tokens(roster_name: &str) -> Vec<String> {
    if let Some((last, first)) = roster_name.split_once(',') {
        if !last.trim().is_empty() && !first.trim().is_empty() {
            return last.split_whitespace().filter(|t| !is_suffix(t)).map(normalize).collect();
        }
    }

    roster_name
        .split_whitespace()
        .rev()
        .find(|t| !is_suffix(t))
        .map(|t| vec![normalize(t)])
        .unwrap_or_default()
}

/// Scores cleaned candidate names against roster names with the given noise model.
#[derive(Debug, Clone)]
pub struct NameScorer {
    noise: NoiseModel,
    variation_limit: usize,
}

impl Default for NameScorer {
    fn default() -> Self {
        Self::new(NoiseModel::ocr(), DEFAULT_NAME_VARIATION_LIMIT)
    }
}

impl NameScorer {
    pub fn new(noise: NoiseModel, variation_limit: usize) -> Self {
        Self {
            noise,
            variation_limit,
        }
    }

    /// `a` is the text as read; it is varied before folding.
    fn one_confusion_apart(&self, a: &str, b: &str) -> bool {
        self.noise.matches_with_one_substitution(a, b, self.variation_limit)
    }

    pub fn score(&self, candidate: &str, roster_full_name: &str, tokens: &[String]) -> f64 {
        let roster = pivot_comma_name(roster_full_name);
        let norm_candidate = normalize(candidate);
        if norm_candidate.is_empty() {
            return 0.0;
        }

        if norm_candidate == normalize(&roster) {
            return EXACT_MATCH_SCORE;
        }

        if self.one_confusion_apart(candidate, &roster) || self.one_confusion_apart(&roster, candidate) {
            return VARIATION_MATCH_SCORE;
        }

        let roster_tokens: Vec<String> = roster.split_whitespace().map(normalize).collect();
        // (as read, folded)
        let read: Vec<(&str, String)> = tokens
            .iter()
            .map(|t| (t.as_str(), normalize(t)))
            .filter(|(_, t)| !t.is_empty())
            .collect();
        let tokens: Vec<String> = read.iter().map(|(_, t)| t.clone()).collect();

        if !tokens.is_empty() && tokens.len() < roster_tokens.len() {
            let run = roster_tokens
                .windows(tokens.len())
                .position(|window| window == tokens.as_slice());
            if let Some(start) = run {
                let trailing = roster_tokens[start + tokens.len()..].iter().all(|t| is_suffix(t));
                return if trailing {
                    TRAILING_RUN_SCORE
                } else {
                    INNER_RUN_SCORE
                };
            }
        }

        let surname = surname_tokens(roster_full_name);

        if tokens.len() == 1 && roster_tokens.len() > 1 {
            if let Some(last) = surname.last() {
                let (as_read, folded) = &read[0];
                if folded == last || self.one_confusion_apart(as_read, last) {
                    return LAST_NAME_SCORE;
                }
            }
        }

        let combined = similarity::combined(candidate, &roster);
        let token_ratio = similarity::token_set_ratio(&tokens, &roster_tokens);
        let mut score = (combined * 0.7 + token_ratio * 0.3) * 100.0;
        if similarity::soundex_match(candidate, &roster) {
            score *= SOUNDEX_BONUS;
        }
        score = score.clamp(0.0, 100.0);

        let surname_present = surname
            .iter()
            .any(|s| read.iter().any(|(as_read, folded)| folded == s || self.one_confusion_apart(as_read, s)));
        if !surname_present {
            score = score.min(SURNAME_MISMATCH_CEILING);
        }

        score
    }
}

/// [`NameScorer::score`] with the built-in OCR noise model.
pub fn score(candidate: &str, roster_full_name: &str, tokens: &[String]) -> f64 {
    NameScorer::default().score(candidate, roster_full_name, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(score("Vivian Watts", "Vivian Watts", &toks(&["Vivian", "Watts"])), 100.0);
        assert_eq!(score("bob smith", "Smith, Bob", &toks(&["bob", "smith"])), 100.0);
        assert_eq!(score("Vivian E Watts", "Vivian E. Watts", &toks(&["Vivian", "E", "Watts"])), 100.0);
    }

    #[test]
    fn test_variation_match() {
        let s = score("Vivian Watt5", "Vivian Watts", &toks(&["Vivian", "Watt5"]));
        assert_eq!(s, VARIATION_MATCH_SCORE);
        assert!(s > 90.0);
    }

    #[test]
    fn test_last_name_only() {
        assert!(score("Watts", "Vivian Watts", &toks(&["Watts"])) >= 90.0);
        assert_eq!(score("Watts", "Watts, Vivian E.", &toks(&["Watts"])), TRAILING_RUN_SCORE);
        assert_eq!(score("Wat5", "Vivian Wats", &toks(&["Wat5"])), LAST_NAME_SCORE);
        assert_eq!(score("Reid", "Reid Jr., David", &toks(&["Reid"])), TRAILING_RUN_SCORE);
    }

    #[test]
    fn test_last_name_case_confusion() {
        assert_eq!(score("BeIl", "Bob Bell", &toks(&["BeIl"])), LAST_NAME_SCORE);
        assert_eq!(score("Be1l", "Bob Bell", &toks(&["Be1l"])), LAST_NAME_SCORE);
        // two confusions are too many
        assert!(score("BeII", "Bob Bell", &toks(&["BeII"])) < 50.0);
    }

    #[test]
    fn test_contiguous_run() {
        let s = score("Mundon King", "Candice P. Mundon King", &toks(&["Mundon", "King"]));
        assert_eq!(s, TRAILING_RUN_SCORE);
        let s = score("Candice P.", "Candice P. Mundon King", &toks(&["Candice", "P."]));
        assert_eq!(s, INNER_RUN_SCORE);
    }

    #[test]
    fn test_wrong_person_stays_low() {
        assert!(score("John Doe", "Smith, Bob", &toks(&["John", "Doe"])) < 50.0);
        assert!(score("Vivian Jones", "Vivian Watts", &toks(&["Vivian", "Jones"])) < 50.0);
        assert!(score("Delegate Committee", "Watts, Vivian", &toks(&["Delegate", "Committee"])) < 50.0);
    }

    #[test]
    fn test_fuzzy_with_surname_present() {
        let s = score("Viviane Watts", "Vivian Watts", &toks(&["Viviane", "Watts"]));
        assert!(s > 50.0 && s < 100.0);
    }

    #[test]
    fn test_empty_candidate() {
        assert_eq!(score("", "Vivian Watts", &[]), 0.0);
    }

    #[test]
    fn test_surname_tokens() {
        assert_eq!(surname_tokens("Mundon King, Candice"), vec!["mundon", "king"]);
        assert_eq!(surname_tokens("David Reid Jr."), vec!["reid"]);
        assert_eq!(surname_tokens("Vivian Watts"), vec!["watts"]);
    }
}
