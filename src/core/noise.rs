//! OCR noise model - single-character confusions shared by the bill and name matchers
//!
//! Tesseract misreads look-alike glyphs (0/O, 1/l/I, 5/S, 8/B ...) but it does not
//! invent or drop characters inside a chyron line, so every variation produced here
//! has exactly the length of its input and differs from it at one position only.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Default cap for name variations (original text included).
pub const DEFAULT_NAME_VARIATION_LIMIT: usize = 10;

/// Look-alike pairs, registered in both directions.
const OCR_CONFUSION_PAIRS: &[(char, char)] = &[
    ('0', 'O'),
    ('0', 'o'),
    ('1', 'l'),
    ('1', 'I'),
    ('l', 'I'),
    ('5', 'S'),
    ('5', 's'),
    ('8', 'B'),
    ('2', 'Z'),
    ('6', 'G'),
];

static OCR_CONFUSIONS: Lazy<ConfusionMap> = Lazy::new(|| ConfusionMap::from_pairs(OCR_CONFUSION_PAIRS));

/// Symmetric character-confusion table.
///
/// Replacement order per character is insertion order, which fixes the scan order
/// of [`variations`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfusionMap {
    table: BTreeMap<char, Vec<char>>,
}

impl ConfusionMap {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: &[(char, char)]) -> Self {
        let mut map = Self::empty();
        for &(a, b) in pairs {
            map.insert_pair(a, b);
        }
        map
    }

    /// The built-in OCR table.
    pub fn ocr() -> &'static ConfusionMap {
        &OCR_CONFUSIONS
    }

    pub fn insert_pair(&mut self, a: char, b: char) {
        if a == b {
            return;
        }
        self.push(a, b);
        self.push(b, a);
    }

    fn push(&mut self, from: char, to: char) {
        let entry = self.table.entry(from).or_default();
        if !entry.contains(&to) {
            entry.push(to);
        }
    }

    pub fn confusions(&self, c: char) -> &[char] {
        self.table.get(&c).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// All single-position substitutions of `input`, in scan order.
///
/// The input itself is never part of the result.
pub fn variations(input: &str, map: &ConfusionMap) -> Vec<String> {
    variations_limited(input, map, usize::MAX)
}

/// Same as [`variations`], truncated to the first `limit` entries.
pub fn variations_limited(input: &str, map: &ConfusionMap, limit: usize) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = Vec::new();

    for (i, &c) in chars.iter().enumerate() {
        for &replacement in map.confusions(c) {
            if out.len() >= limit {
                return out;
            }
            let mut variant = chars.clone();
            variant[i] = replacement;
            out.push(variant.into_iter().collect());
        }
    }

    out
}

/// Lower-case with whitespace and periods removed.
pub fn fold(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Noise model - confusion table plus the variation helpers the matchers need
#[derive(Debug, Clone)]
pub struct NoiseModel {
    map: ConfusionMap,
}

impl NoiseModel {
    pub fn new(map: ConfusionMap) -> Self {
        Self { map }
    }

    pub fn ocr() -> Self {
        Self::new(ConfusionMap::ocr().clone())
    }

    pub fn confusion_map(&self) -> &ConfusionMap {
        &self.map
    }

    pub fn variations(&self, input: &str) -> Vec<String> {
        variations(input, &self.map)
    }

    pub fn variations_limited(&self, input: &str, limit: usize) -> Vec<String> {
        variations_limited(input, &self.map, limit)
    }

    /// Name candidates: the original first, then substitutions, `limit` in total.
    pub fn name_variations(&self, input: &str, limit: usize) -> Vec<String> {
        if limit == 0 {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(limit.min(16));
        out.push(input.to_string());
        out.extend(self.variations_limited(input, limit - 1));
        out
    }

    /// True when `a`, or one of its name variations, folds to the same text as `b`.
    ///
    /// Substitutions are applied to `a` as read, before folding, so confusions that
    /// depend on case (`I` vs `l`) still apply.
    pub fn matches_with_one_substitution(&self, a: &str, b: &str, limit: usize) -> bool {
        let target = fold(b);
        self.name_variations(a, limit).iter().any(|v| fold(v) == target)
    }
}

impl Default for NoiseModel {
    fn default() -> Self {
        Self::ocr()
    }
}
