// 📥 Person Sources - where an export gets its people from
//
// The crawler, a CSV fixture file and a fixed in-memory list all produce the
// same thing: the complete list of people for one replace-all export.

pub mod directory;
pub mod html;

pub use directory::{DirectorySource, HttpFetcher, PageFetcher, SEED_PAGES, TEAM_ROOT};

use crate::error::{LookupError, Result};
use crate::person::{collapse_whitespace, split_display_name, PersonRecord, DEFAULT_ROLE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Produces the full list of people for an export
///
/// Implementations return everything or an error; a partial list is never
/// returned, so a failure cannot reach the store.
pub trait PersonSource {
    /// Label recorded with the export ("https://mcml.ai/team/", a file path, ...)
    fn name(&self) -> String;

    fn fetch_people(&self) -> Result<Vec<PersonRecord>>;
}

// ============================================================================
// STATIC SOURCE
// ============================================================================

/// Fixed list of people
pub struct StaticSource {
    name: String,
    people: Vec<PersonRecord>,
}

impl StaticSource {
    pub fn new(name: &str, people: Vec<PersonRecord>) -> Self {
        StaticSource {
            name: name.to_string(),
            people,
        }
    }
}

impl PersonSource for StaticSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn fetch_people(&self) -> Result<Vec<PersonRecord>> {
        Ok(self.people.clone())
    }
}

// ============================================================================
// CSV SOURCE
// ============================================================================

/// One CSV row; every column is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CsvRow {
    display_name: String,
    first_name: String,
    last_name: String,
    role: String,
    note: String,
    profile_url: String,
    source_page: String,
}

/// People from a CSV file with a header row
///
/// Columns: display_name, first_name, last_name, role, note, profile_url,
/// source_page. Missing first/last names are split from the display name.
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        CsvSource {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn row_to_record(&self, row: CsvRow) -> PersonRecord {
        let display_name = collapse_whitespace(&row.display_name);
        let (mut first_name, mut last_name) = (row.first_name.trim().to_string(), row.last_name.trim().to_string());
        if first_name.is_empty() && last_name.is_empty() {
            (first_name, last_name) = split_display_name(&display_name);
        }

        let role = match row.role.trim() {
            "" => DEFAULT_ROLE.to_string(),
            role => role.to_string(),
        };
        let source_page = match row.source_page.trim() {
            "" => self.path.display().to_string(),
            page => page.to_string(),
        };
        let profile_url = Some(row.profile_url.trim().to_string()).filter(|u| !u.is_empty());

        PersonRecord {
            display_name,
            first_name,
            last_name,
            role,
            note: row.note.trim().to_string(),
            profile_url,
            source_page,
        }
    }
}

impl PersonSource for CsvSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch_people(&self) -> Result<Vec<PersonRecord>> {
        let page = self.name();
        let mut rdr = csv::Reader::from_path(&self.path).map_err(|e| LookupError::scrape(&page, e))?;

        let mut people = Vec::new();
        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            // header is line 1
            let row = result.map_err(|e| LookupError::scrape(&page, format!("row {}: {}", line + 2, e)))?;
            people.push(self.row_to_record(row));
        }

        debug!(path = %page, rows = people.len(), "loaded people from CSV");
        Ok(people)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_static_source_returns_its_people() {
        let people = vec![PersonRecord::from_display_name("Daniel Cremers", "fixture")];
        let source = StaticSource::new("fixture", people.clone());
        assert_eq!(source.name(), "fixture");
        assert_eq!(source.fetch_people().unwrap(), people);
    }

    #[test]
    fn test_csv_source_fills_missing_columns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "display_name,first_name,last_name,role,profile_url").unwrap();
        writeln!(file, "Daniel Cremers,,,Director,https://mcml.ai/research/groups/cremers/").unwrap();
        writeln!(file, "\"van der Berg, Anna\",Anna,van der Berg,,").unwrap();

        let source = CsvSource::new(file.path());
        let people = source.fetch_people().unwrap();
        assert_eq!(people.len(), 2);

        assert_eq!(people[0].first_name, "Daniel");
        assert_eq!(people[0].last_name, "Cremers");
        assert_eq!(people[0].role, "Director");
        assert_eq!(
            people[0].profile_url.as_deref(),
            Some("https://mcml.ai/research/groups/cremers/")
        );
        assert_eq!(people[0].source_page, source.name());

        assert_eq!(people[1].last_name, "van der Berg");
        assert_eq!(people[1].role, DEFAULT_ROLE);
        assert_eq!(people[1].profile_url, None);
    }

    #[test]
    fn test_missing_csv_is_a_scrape_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvSource::new(dir.path().join("missing.csv"));
        let err = source.fetch_people().unwrap_err();
        assert!(matches!(err, LookupError::ScrapeFailure { .. }));
        assert_eq!(err.exit_code(), 3);
    }
}
