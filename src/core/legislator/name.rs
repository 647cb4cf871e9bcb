//! Name extraction - chyron text to cleaned name tokens
//!
//! A speaker chyron looks like `Del. Vivian E. Watts (D-39)` or, over two lines,
//! `Delegate Pogge` / `James City (96)`. Titles, party/district markers and places are stripped
//! and kept aside; what remains is the name as printed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(vice\s+chair(?:man|woman)?|chair(?:man|woman)?|senator|sen\.?|delegate|del\.?|representative|rep\.?)\s+",
    )
    .expect("valid prefix regex")
});
static NICKNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([A-Za-z][A-Za-z\s\-]+)\)\s*(.*)$").expect("valid nickname regex"));
static PARTY_ONLY_NICKNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[RDI](-\d+)?$").expect("valid party marker regex"));
static PARTY_DISTRICT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(\s*([RDI])\s*-?\s*(\d+)\s*\)").expect("valid party district regex"));
static PARTY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\(\s*([RDI])\s*\)").expect("valid party regex"));
static DISTRICT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bdistrict\s+(\d+)").expect("valid district regex"));
static LOCATION_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\s*\(\s*\d+\s*\)").expect("valid location regex"));
static CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(\s*\d+\s*\)").expect("valid code regex"));
static OF_PLACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+of\s+[a-z][a-z.'\s-]*$").expect("valid place regex"));
static DASH_PLACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+-\s*[A-Za-z][A-Za-z.'\s]*$").expect("valid dash place regex"));
static METADATA_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\(\s*\d+\s*\)|\bdistrict\b|\(\s*[RDI]\s*-?\s*\d*\s*\)").expect("valid metadata regex")
});
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,()\[\]]+").expect("valid separator regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameCandidate {
    pub cleaned: String,
    pub tokens: Vec<String>,
    pub prefix: Option<String>,
    pub party: Option<char>,
    pub district: Option<String>,
}

impl NameCandidate {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn letter_count(&self) -> usize {
        self.cleaned.chars().filter(|c| c.is_alphabetic()).count()
    }
}

#[derive(Default)]
struct Markers {
    party: Option<char>,
    district: Option<String>,
}

impl Markers {
    /// Records party/district found in `text` and returns the text without them.
    fn take(&mut self, text: &str) -> String {
        let mut text = text.to_string();

        if let Some(caps) = PARTY_DISTRICT.captures(&text) {
            self.set_party(&caps[1]);
            self.district.get_or_insert_with(|| caps[2].to_string());
            text = PARTY_DISTRICT.replace_all(&text, " ").into_owned();
        } else if let Some(caps) = PARTY.captures(&text) {
            self.set_party(&caps[1]);
            text = PARTY.replace_all(&text, " ").into_owned();
        }

        if let Some(caps) = DISTRICT.captures(&text) {
            self.district.get_or_insert_with(|| caps[1].to_string());
            text = DISTRICT.replace_all(&text, " ").into_owned();
        }

        text
    }

    fn set_party(&mut self, letter: &str) {
        if self.party.is_none() {
            self.party = letter.chars().next().map(|c| c.to_ascii_uppercase());
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn trim_token(token: &str) -> &str {
    token
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .trim_end_matches(|c: char| !c.is_alphanumeric() && c != '.')
}

/// Cleans raw chyron text into a [`NameCandidate`]. Never fails; unreadable input is empty.
pub fn extract(raw_text: &str) -> NameCandidate {
    let mut markers = Markers::default();

    // first line is the name, later lines may only carry place/party/district
    let mut lines = raw_text.lines().map(str::trim).filter(|l| !l.is_empty());
    let mut text = lines.next().unwrap_or_default().to_string();
    for line in lines {
        if METADATA_LINE.is_match(line) {
            markers.take(line);
        } else {
            text.push(' ');
            text.push_str(line);
        }
    }
    let mut text = collapse_whitespace(&text);

    let mut prefix = None;
    if let Some(caps) = PREFIX.captures(&text) {
        prefix = Some(collapse_whitespace(&caps[1]));
        text = text[caps[0].len()..].to_string();
    }

    if let Some(caps) = NICKNAME.captures(&text) {
        let nickname = caps[1].trim();
        if !PARTY_ONLY_NICKNAME.is_match(nickname) {
            let rest = caps[2].trim();
            text = if rest.is_empty() {
                nickname.to_string()
            } else {
                format!("{} {}", nickname, rest)
            };
        }
    }

    text = markers.take(&text);

    let without_place = LOCATION_CODE.replace_all(&text, "");
    if !without_place.trim().is_empty() {
        text = without_place.into_owned();
    }
    text = CODE.replace_all(&text, "").into_owned();
    text = OF_PLACE.replace(&text, "").into_owned();
    text = DASH_PLACE.replace(&text, "").into_owned();
    text = SEPARATORS.replace_all(&text, " ").into_owned();

    let tokens: Vec<String> = text
        .split_whitespace()
        .map(trim_token)
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(str::to_string)
        .collect();

    NameCandidate {
        cleaned: tokens.join(" "),
        tokens,
        prefix,
        party: markers.party,
        district: markers.district,
    }
}

/// `"Last, First"` becomes `"First Last"`; anything else is returned as is.
pub fn pivot_comma_name(name: &str) -> String {
    match name.split_once(',') {
        Some((last, first)) if !last.trim().is_empty() && !first.trim().is_empty() => {
            format!("{} {}", first.trim(), last.trim())
        }
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_and_party() {
        let name = extract("Del. Vivian E. Watts (D-39)");
        assert_eq!(name.cleaned, "Vivian E. Watts");
        assert_eq!(name.tokens, vec!["Vivian", "E.", "Watts"]);
        assert_eq!(name.prefix.as_deref(), Some("Del."));
        assert_eq!(name.party, Some('D'));
        assert_eq!(name.district.as_deref(), Some("39"));
    }

    #[test]
    fn test_prefix_variants() {
        assert_eq!(extract("Senator Surovell").prefix.as_deref(), Some("Senator"));
        assert_eq!(extract("Sen Surovell").prefix.as_deref(), Some("Sen"));
        assert_eq!(extract("DELEGATE Watts").cleaned, "Watts");
        assert_eq!(extract("Vice Chair Deeds").prefix.as_deref(), Some("Vice Chair"));
        assert_eq!(extract("Vivian Watts").prefix, None);
    }

    #[test]
    fn test_party_without_district() {
        let name = extract("Sen. Bryce Reeves (R)");
        assert_eq!(name.cleaned, "Bryce Reeves");
        assert_eq!(name.party, Some('R'));
        assert_eq!(name.district, None);

        let name = extract("Delegate Scott Wyatt (R97)");
        assert_eq!(name.party, Some('R'));
        assert_eq!(name.district.as_deref(), Some("97"));
    }

    #[test]
    fn test_nickname_preferred() {
        assert_eq!(extract("Thomas A. (Tom) Garrett").cleaned, "Tom Garrett");
        assert_eq!(extract("C. E. (Cliff) Hayes (D-77)").cleaned, "Cliff Hayes");
    }

    #[test]
    fn test_places_removed() {
        assert_eq!(extract("Delegate Watts of Fairfax").cleaned, "Watts");
        assert_eq!(extract("Smith - Richmond").cleaned, "Smith");
        assert_eq!(extract("Keys-Gamarra").cleaned, "Keys-Gamarra");
        assert_eq!(extract("Del. Pogge James City (996)").cleaned, "Pogge");
        assert_eq!(extract("Jones, District 42").cleaned, "Jones");
        assert_eq!(extract("Jones, District 42").district.as_deref(), Some("42"));
    }

    #[test]
    fn test_multi_line() {
        let name = extract("Delegate Amanda Batten\nJames City (96)");
        assert_eq!(name.cleaned, "Amanda Batten");

        let name = extract("Senator\nMamie Locke\n(D-2)");
        assert_eq!(name.cleaned, "Mamie Locke");
        assert_eq!(name.party, Some('D'));
        assert_eq!(name.district.as_deref(), Some("2"));
    }

    #[test]
    fn test_noise_trimmed() {
        assert_eq!(extract("  |Watts. ").cleaned, "Watts.");
        assert_eq!(extract("-- Watts --").tokens, vec!["Watts"]);
        assert_eq!(extract("..."), NameCandidate::default());
    }

    #[test]
    fn test_empty_input() {
        let name = extract("");
        assert!(name.is_empty());
        assert_eq!(name.cleaned, "");
        assert_eq!(name.letter_count(), 0);
    }

    #[test]
    fn test_pivot_comma_name() {
        assert_eq!(pivot_comma_name("Smith, Bob"), "Bob Smith");
        assert_eq!(pivot_comma_name("Bob Smith"), "Bob Smith");
        assert_eq!(pivot_comma_name("Smith,"), "Smith,");
        assert_eq!(pivot_comma_name("Mundon King, Candice P."), "Candice P. Mundon King");
    }
}
