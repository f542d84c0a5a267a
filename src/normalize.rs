// 🔤 Name Normalizer - canonical form for comparing person names
//
// "Müller", "MULLER" and " muller. " all become "muller"
// Hyphens and apostrophes survive inside a token ("o'neil", "jean-luc")

use serde::Serialize;
use std::fmt;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// NORMALIZED NAME
// ============================================================================

/// Lowercase, diacritic-free, whitespace-collapsed name
///
/// Only `normalize` builds one, so every instance is already canonical.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct NormalizedName(String);

impl NormalizedName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Space-separated tokens (never empty strings)
    pub fn tokens(&self) -> Vec<&str> {
        self.0.split(' ').filter(|t| !t.is_empty()).collect()
    }

    /// Join two normalized names with a single space, skipping empty parts
    pub fn join(a: &NormalizedName, b: &NormalizedName) -> NormalizedName {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => NormalizedName::default(),
            (false, true) => a.clone(),
            (true, false) => b.clone(),
            (false, false) => NormalizedName(format!("{} {}", a.0, b.0)),
        }
    }
}

impl fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Canonicalize a raw name string
///
/// - NFKD + drop combining marks ("é" → "e")
/// - lowercase + transliterate letters without a decomposition ("ß" → "ss")
/// - keep `-` / `'` only between two alphanumerics
/// - every other non-alphanumeric is a separator; runs collapse to one space
pub fn normalize(raw: &str) -> NormalizedName {
    let folded = fold_chars(raw);

    let mut out = String::with_capacity(folded.len());
    let mut pending_space = false;

    for (i, &c) in folded.iter().enumerate() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else if is_joiner(c) {
            let prev_alnum = !pending_space && out.chars().last().is_some_and(|p| p.is_alphanumeric());
            let next_alnum = folded.get(i + 1).is_some_and(|n| n.is_alphanumeric());
            if prev_alnum && next_alnum {
                out.push(c);
            } else {
                pending_space = true;
            }
        } else {
            pending_space = true;
        }
    }

    NormalizedName(out)
}

/// Decompose, strip marks, lowercase and transliterate into a flat char list
fn fold_chars(raw: &str) -> Vec<char> {
    let mut folded = Vec::with_capacity(raw.len());

    for c in raw.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        for lower in c.to_lowercase() {
            if is_combining_mark(lower) {
                continue;
            }
            match transliterate(lower) {
                Some(replacement) => folded.extend(replacement.chars()),
                None => folded.push(fold_punctuation(lower)),
            }
        }
    }

    folded
}

/// Letters that survive NFKD unchanged but have a plain Latin spelling
fn transliterate(c: char) -> Option<&'static str> {
    let replacement = match c {
        'ß' => "ss",
        'æ' => "ae",
        'œ' => "oe",
        'ø' => "o",
        'ł' => "l",
        'đ' | 'ð' => "d",
        'þ' => "th",
        'ı' => "i",
        'ħ' => "h",
        'ŧ' => "t",
        _ => return None,
    };
    Some(replacement)
}

/// Typographic apostrophes and hyphens fold to their ASCII form
fn fold_punctuation(c: char) -> char {
    match c {
        '\u{2019}' | '\u{2018}' | '\u{02BC}' | '\u{00B4}' | '`' => '\'',
        '\u{2010}' | '\u{2011}' => '-',
        other => other,
    }
}

fn is_joiner(c: char) -> bool {
    c == '-' || c == '\''
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_and_whitespace() {
        assert_eq!(normalize("  Daniel   CREMERS \t").as_str(), "daniel cremers");
    }

    #[test]
    fn test_diacritics_are_stripped() {
        assert_eq!(normalize("Müller"), normalize("Muller"));
        assert_eq!(normalize("José Álvarez").as_str(), "jose alvarez");
        assert_eq!(normalize("Björn Ømmer").as_str(), "bjorn ommer");
        assert_eq!(normalize("Strauß").as_str(), "strauss");
        assert_eq!(normalize("Łukasz").as_str(), "lukasz");
    }

    #[test]
    fn test_hyphen_and_apostrophe_kept_inside_tokens() {
        assert_eq!(normalize("Jean-Luc O'Neil").as_str(), "jean-luc o'neil");
        assert_eq!(normalize("D\u{2019}Angelo").as_str(), "d'angelo");
        assert_eq!(normalize("Anna\u{2010}Lena").as_str(), "anna-lena");
    }

    #[test]
    fn test_edge_joiners_become_separators() {
        assert_eq!(normalize("-Anna- 'Lena'").as_str(), "anna lena");
        assert_eq!(normalize("a - b").as_str(), "a b");
        assert_eq!(normalize("a'-b").as_str(), "a b");
    }

    #[test]
    fn test_other_punctuation_splits_tokens() {
        assert_eq!(normalize("Prof. Dr. Cremers, Daniel").as_str(), "prof dr cremers daniel");
        assert_eq!(normalize("Smith(Jr.)").as_str(), "smith jr");
    }

    #[test]
    fn test_empty_and_whitespace_only() {
        assert!(normalize("").is_empty());
        assert!(normalize("   \t\n ").is_empty());
        assert!(normalize(".,;!").is_empty());
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Müller-Lüdenscheidt",
            "  O'Brien , Seán ",
            "İstanbul Ærø",
            "a'-b -c- d''e",
            "ﬁnn Straße",
            "Zoë   D\u{2019}Souza",
            "",
            "--",
        ];
        for s in samples {
            let once = normalize(s);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_tokens_and_join() {
        let first = normalize("Daniel");
        let last = normalize("Cremers");
        let joined = NormalizedName::join(&first, &last);
        assert_eq!(joined.as_str(), "daniel cremers");
        assert_eq!(joined.tokens(), vec!["daniel", "cremers"]);
        assert_eq!(NormalizedName::join(&normalize(""), &last), last);
    }
}
