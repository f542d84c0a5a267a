// 👤 Person Record - one listing scraped from the directory
//
// Records are immutable values: they are created by an export and replaced
// wholesale by the next one.

use crate::error::{LookupError, Result};
use crate::normalize::normalize;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Host of the directory the scraper crawls; links here count as "internal"
pub const DIRECTORY_BASE: &str = "https://mcml.ai";

/// Role used when the page gives no better label
pub const DEFAULT_ROLE: &str = "Member";

/// Academic titles skipped when splitting a display name (compared without the trailing dot)
const NAME_TITLES: [&str; 6] = ["prof", "professor", "dr", "pd", "apl", "hon"];

// ============================================================================
// PERSON RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    /// Full name as shown on the source page
    pub display_name: String,

    /// First token of the display name (may be empty)
    #[serde(default)]
    pub first_name: String,

    /// Remaining tokens of the display name (may be empty)
    #[serde(default)]
    pub last_name: String,

    /// Role or section label ("Director", "PhD Students", ...)
    #[serde(default)]
    pub role: String,

    /// Short affiliation note, usually the research-group link text
    #[serde(default)]
    pub note: String,

    /// Best-effort link: group page, profile page or personal homepage
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub profile_url: Option<String>,

    /// Page the record was scraped from
    #[serde(default)]
    pub source_page: String,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

impl PersonRecord {
    /// Build a record from a display name, splitting it into first / last
    ///
    /// Leading titles stay in `display_name` but not in the name parts.
    pub fn from_display_name(display_name: &str, source_page: &str) -> Self {
        let display_name = collapse_whitespace(display_name);
        let (first_name, last_name) = split_display_name(&display_name);

        PersonRecord {
            display_name,
            first_name,
            last_name,
            role: DEFAULT_ROLE.to_string(),
            note: String::new(),
            profile_url: None,
            source_page: source_page.to_string(),
        }
    }

    /// Builder pattern: add role
    pub fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    /// Builder pattern: add note
    pub fn with_note(mut self, note: &str) -> Self {
        self.note = note.to_string();
        self
    }

    /// Builder pattern: add profile URL
    pub fn with_profile_url(mut self, url: &str) -> Self {
        self.profile_url = Some(url.to_string());
        self
    }

    /// Name used for display and tie-breaking
    ///
    /// Falls back to "first last" when the page gave no display name.
    pub fn shown_name(&self) -> String {
        if !self.display_name.trim().is_empty() {
            return self.display_name.clone();
        }
        [self.first_name.trim(), self.last_name.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check the stored-record invariants
    ///
    /// - non-empty display name, or non-empty first + last name
    /// - profile URL, when present, is an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        let has_display = !self.display_name.trim().is_empty();
        let has_parts = !self.first_name.trim().is_empty() && !self.last_name.trim().is_empty();
        if !has_display && !has_parts {
            return Err(LookupError::InvalidRecord(format!(
                "record from {} has neither a display name nor first + last name",
                self.source_page
            )));
        }

        if let Some(url) = &self.profile_url {
            if !is_absolute_url(url) {
                return Err(LookupError::InvalidRecord(format!(
                    "profile URL {:?} for {} is not an absolute URL",
                    url,
                    self.shown_name()
                )));
            }
        }

        Ok(())
    }

    /// Duplicate-suppression key: (first, last, profile URL), case-insensitive
    pub fn identity_key(&self) -> (String, String, String) {
        (
            self.first_name.trim().to_lowercase(),
            self.last_name.trim().to_lowercase(),
            self.profile_url.as_deref().unwrap_or("").trim().to_lowercase(),
        )
    }

    /// How much useful detail this record carries
    ///
    /// Used to pick one record when the same person appears on several pages.
    pub fn richness(&self) -> u8 {
        let mut score = 0;
        if let Some(url) = &self.profile_url {
            score += 1;
            if url.starts_with(DIRECTORY_BASE) {
                score += 1;
            }
        }
        if !self.note.is_empty() {
            score += 1;
        }
        if !self.role.is_empty() && !self.role.eq_ignore_ascii_case(DEFAULT_ROLE) {
            score += 1;
        }
        score
    }

    /// Key for merging the same person across pages
    pub fn merge_key(&self) -> String {
        normalize(&self.shown_name()).as_str().to_string()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Split "Daniel Cremers" into ("Daniel", "Cremers"); a single token is a first name
pub fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let first = parts.next().unwrap_or("").to_string();
    let rest = parts.collect::<Vec<_>>().join(" ");
    (first, rest)
}

/// `split_name` after dropping leading titles
///
/// "Prof. Dr. Daniel Cremers" → ("Daniel", "Cremers"). A name made only of
/// titles is split as-is.
pub fn split_display_name(display_name: &str) -> (String, String) {
    let tokens: Vec<&str> = display_name.split_whitespace().collect();
    let skip = tokens.iter().take_while(|t| is_title(t)).count();
    if skip == tokens.len() {
        return split_name(display_name);
    }
    split_name(&tokens[skip..].join(" "))
}

fn is_title(token: &str) -> bool {
    let bare = token.trim_end_matches('.').to_lowercase();
    NAME_TITLES.contains(&bare.as_str())
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Absolute http(s) URL with a host
pub fn is_absolute_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_display_name_splits_first_and_rest() {
        let p = PersonRecord::from_display_name("  Daniel   Cremers ", "https://mcml.ai/team/");
        assert_eq!(p.display_name, "Daniel Cremers");
        assert_eq!(p.first_name, "Daniel");
        assert_eq!(p.last_name, "Cremers");
        assert_eq!(p.role, DEFAULT_ROLE);

        let p = PersonRecord::from_display_name("Anna Maria van der Berg", "x");
        assert_eq!(p.first_name, "Anna");
        assert_eq!(p.last_name, "Maria van der Berg");
    }

    #[test]
    fn test_split_single_token() {
        assert_eq!(split_name("Plato"), ("Plato".to_string(), String::new()));
        assert_eq!(split_name(""), (String::new(), String::new()));
    }

    #[test]
    fn test_titles_are_kept_in_display_name_only() {
        let p = PersonRecord::from_display_name("Prof. Dr. Daniel Cremers", "https://mcml.ai/team/");
        assert_eq!(p.display_name, "Prof. Dr. Daniel Cremers");
        assert_eq!(p.first_name, "Daniel");
        assert_eq!(p.last_name, "Cremers");

        assert_eq!(
            split_display_name("PD Dr Anna-Lena O'Neil"),
            ("Anna-Lena".to_string(), "O'Neil".to_string())
        );
        assert_eq!(split_display_name("Prof. Dr."), ("Prof.".to_string(), "Dr.".to_string()));
        assert_eq!(split_display_name("Drew Carey"), ("Drew".to_string(), "Carey".to_string()));
    }

    #[test]
    fn test_validate_requires_a_name() {
        let mut p = PersonRecord::from_display_name("Daniel Cremers", "https://mcml.ai/team/");
        assert!(p.validate().is_ok());

        p.display_name = String::new();
        assert!(p.validate().is_ok(), "first + last is enough");

        p.last_name = String::new();
        assert!(matches!(p.validate(), Err(LookupError::InvalidRecord(_))));
    }

    #[test]
    fn test_validate_profile_url() {
        let p = PersonRecord::from_display_name("Daniel Cremers", "https://mcml.ai/team/")
            .with_profile_url("https://mcml.ai/research/groups/cremers/");
        assert!(p.validate().is_ok());

        let p = p.with_profile_url("/research/groups/cremers/");
        assert!(p.validate().is_err());

        let p = p.with_profile_url("mailto:someone@mcml.ai");
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_identity_key_is_case_insensitive() {
        let a = PersonRecord::from_display_name("Daniel Cremers", "a")
            .with_profile_url("https://mcml.ai/X/");
        let b = PersonRecord::from_display_name("DANIEL CREMERS", "b")
            .with_profile_url("https://mcml.ai/x/");
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn test_richness_prefers_internal_links_and_notes() {
        let bare = PersonRecord::from_display_name("Daniel Cremers", "a");
        let external = bare.clone().with_profile_url("https://cvg.cit.tum.de/");
        let internal = bare
            .clone()
            .with_profile_url("https://mcml.ai/research/groups/cremers/")
            .with_note("Group Daniel Cremers")
            .with_role("Director");

        assert_eq!(bare.richness(), 0);
        assert_eq!(external.richness(), 1);
        assert_eq!(internal.richness(), 4);
    }

    #[test]
    fn test_shown_name_falls_back_to_parts() {
        let mut p = PersonRecord::from_display_name("Daniel Cremers", "a");
        p.display_name = String::new();
        assert_eq!(p.shown_name(), "Daniel Cremers");
        assert_eq!(p.merge_key(), "daniel cremers");
    }
}
