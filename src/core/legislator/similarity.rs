//! String similarity measures used by the fuzzy name score. All of them are case-insensitive
//! and return values in `[0, 1]`. Edit and Jaro-Winkler distances come from `strsim`.

use std::collections::BTreeSet;

const LEVENSHTEIN_WEIGHT: f64 = 0.3;
const JARO_WINKLER_WEIGHT: f64 = 0.5;
const TOKEN_SET_WEIGHT: f64 = 0.2;

/// `1 - distance / max_len`; two empty strings are identical.
pub fn levenshtein(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Jaro-Winkler with the standard 0.1 prefix bonus over at most four characters.
pub fn jaro_winkler(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(&a.to_lowercase(), &b.to_lowercase())
}

/// Jaccard ratio of the lower-cased token sets; two empty sets are identical.
pub fn token_set_ratio<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> f64 {
    let a: BTreeSet<String> = a.iter().map(|t| t.as_ref().to_lowercase()).collect();
    let b: BTreeSet<String> = b.iter().map(|t| t.as_ref().to_lowercase()).collect();

    let union = a.union(&b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Weighted blend: Levenshtein 0.3, Jaro-Winkler 0.5, token set 0.2.
pub fn combined(a: &str, b: &str) -> f64 {
    let a_tokens: Vec<&str> = a.split(' ').collect();
    let b_tokens: Vec<&str> = b.split(' ').collect();

    levenshtein(a, b) * LEVENSHTEIN_WEIGHT
        + jaro_winkler(a, b) * JARO_WINKLER_WEIGHT
        + token_set_ratio(&a_tokens, &b_tokens) * TOKEN_SET_WEIGHT
}

fn soundex_digit(c: char) -> Option<char> {
    match c {
        'b' | 'f' | 'p' | 'v' => Some('1'),
        'c' | 'g' | 'j' | 'k' | 'q' | 's' | 'x' | 'z' => Some('2'),
        'd' | 't' => Some('3'),
        'l' => Some('4'),
        'm' | 'n' => Some('5'),
        'r' => Some('6'),
        _ => None,
    }
}

/// American Soundex over the ASCII letters of `s`; `None` when there are none.
pub fn soundex(s: &str) -> Option<String> {
    let mut letters = s
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase());

    let first = letters.next()?;
    let mut code = String::with_capacity(4);
    code.push(first.to_ascii_uppercase());

    let mut last = soundex_digit(first);
    for c in letters {
        if code.len() == 4 {
            break;
        }
        match soundex_digit(c) {
            Some(d) if Some(d) != last => {
                code.push(d);
                last = Some(d);
            }
            Some(_) => {}
            // h and w do not separate equal codes, vowels do
            None if c == 'h' || c == 'w' => {}
            None => last = None,
        }
    }

    while code.len() < 4 {
        code.push('0');
    }
    Some(code)
}

pub fn soundex_match(a: &str, b: &str) -> bool {
    match (soundex(a.trim()), soundex(b.trim())) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
