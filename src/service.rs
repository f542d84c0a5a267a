// 🔎 Query/Check Service - normalize → score all → rank → threshold
//
// Every call reads the current snapshot from the store; nothing is cached
// because an export may have replaced the data since the last call.

use crate::config::MatchPolicy;
use crate::db::{ExportSummary, Store, StoreMetadata};
use crate::error::{LookupError, Result};
use crate::matcher::{rank, NormalizedQuery, RankedMatch, ScoreTuple};
use crate::person::split_name;
use crate::sources::PersonSource;
use serde::Serialize;
use tracing::{debug, info, warn};

// ============================================================================
// QUERY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersonQuery {
    pub first: String,
    pub last: String,
}

impl PersonQuery {
    pub fn new(first: impl Into<String>, last: impl Into<String>) -> Self {
        PersonQuery {
            first: first.into(),
            last: last.into(),
        }
    }

    /// "Daniel Cremers" → first "Daniel", last "Cremers"
    ///
    /// A single token is taken as the last name: "Cremers" → last "Cremers".
    pub fn from_full_name(name: &str) -> Self {
        let (first, last) = split_name(name);
        if last.is_empty() {
            return PersonQuery { first: last, last: first };
        }
        PersonQuery { first, last }
    }

    /// Combine `--first` / `--last` / `--name` style inputs
    ///
    /// Explicit first/last win; the full name only fills the fields left empty.
    pub fn from_parts(first: Option<&str>, last: Option<&str>, name: Option<&str>) -> Self {
        let mut query = PersonQuery::new(first.unwrap_or(""), last.unwrap_or(""));
        if let Some(name) = name {
            let from_name = PersonQuery::from_full_name(name);
            if query.first.trim().is_empty() && query.last.trim().is_empty() {
                return from_name;
            }
            if query.first.trim().is_empty() {
                query.first = from_name.first;
            }
            if query.last.trim().is_empty() {
                query.last = from_name.last;
            }
        }
        query
    }

    /// Normalize both fields; fails when nothing is left to match on
    pub fn normalized(&self) -> Result<NormalizedQuery> {
        let normalized = NormalizedQuery::new(&self.first, &self.last);
        if normalized.is_empty() {
            return Err(LookupError::InvalidQuery(
                "provide a first and/or last name".to_string(),
            ));
        }
        Ok(normalized)
    }

    pub fn validate(&self) -> Result<()> {
        self.normalized().map(|_| ())
    }

    /// Human-readable form for titles and logs
    pub fn label(&self) -> String {
        [self.first.trim(), self.last.trim()]
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub is_member: bool,
    pub matches: Vec<RankedMatch>,
}

/// Ranked candidates, best first, at most `limit` (clamped to the policy)
pub fn search(
    store: &Store,
    query: &PersonQuery,
    limit: Option<usize>,
    policy: &MatchPolicy,
) -> Result<Vec<RankedMatch>> {
    let normalized = query.normalized()?;
    let records = store.fetch_all()?;

    if records.is_empty() {
        debug!("search on empty store");
        return Ok(Vec::new());
    }

    let mut ranked = rank(&normalized, &records, policy);
    ranked.truncate(policy.effective_limit(limit));

    debug!(
        query = %query.label(),
        scanned = records.len(),
        returned = ranked.len(),
        "search complete"
    );
    Ok(ranked)
}

/// Membership answer plus the top matches
pub fn check(store: &Store, query: &PersonQuery, policy: &MatchPolicy) -> Result<CheckOutcome> {
    let normalized = query.normalized()?;
    let records = store.fetch_all()?;

    let mut matches = rank(&normalized, &records, policy);
    let is_member = matches
        .first()
        .is_some_and(|top| confirms_membership(&top.score, policy));
    matches.truncate(policy.check_limit);

    debug!(query = %query.label(), is_member, "check complete");
    Ok(CheckOutcome { is_member, matches })
}

/// Top score clears the threshold and, for queries with a surname, the surname floor
pub fn confirms_membership(score: &ScoreTuple, policy: &MatchPolicy) -> bool {
    score.combined >= policy.membership_threshold
        && score
            .last_name_token
            .map_or(true, |s| s >= policy.last_name_floor)
}

pub fn info(store: &Store) -> Result<StoreMetadata> {
    store.metadata()
}

/// Collect every person from `source`, then replace the stored dataset
///
/// The store is only touched after the source has fully succeeded, so a
/// failed crawl leaves the previous export in place.
pub fn export(store: &mut Store, source: &dyn PersonSource) -> Result<ExportSummary> {
    let source_name = source.name();
    info!(source = %source_name, "collecting people");

    let people = source.fetch_people()?;

    let mut valid = Vec::with_capacity(people.len());
    for person in people {
        match person.validate() {
            Ok(()) => valid.push(person),
            Err(e) => warn!(error = %e, "skipping invalid record"),
        }
    }

    if valid.is_empty() {
        return Err(LookupError::scrape(
            source_name,
            "no people found; keeping the existing data",
        ));
    }

    info!(records = valid.len(), "replacing stored dataset");
    store.replace_all(&valid, &source_name)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::person::PersonRecord;
    use crate::sources::StaticSource;
    use pretty_assertions::assert_eq;

    fn store_with(names: &[&str]) -> Store {
        let mut store = Store::in_memory().unwrap();
        let people: Vec<PersonRecord> = names
            .iter()
            .map(|n| PersonRecord::from_display_name(n, "https://mcml.ai/team/"))
            .collect();
        if !people.is_empty() {
            store.replace_all(&people, "test").unwrap();
        }
        store
    }

    #[test]
    fn test_from_parts_prefers_explicit_fields() {
        let q = PersonQuery::from_parts(None, None, Some("Daniel Cremers"));
        assert_eq!(q, PersonQuery::new("Daniel", "Cremers"));

        let q = PersonQuery::from_parts(None, Some("Kremers"), Some("Daniel Cremers"));
        assert_eq!(q, PersonQuery::new("Daniel", "Kremers"));

        let q = PersonQuery::from_parts(None, None, Some("  Cremers "));
        assert_eq!(q, PersonQuery::new("", "Cremers"));

        let q = PersonQuery::from_parts(Some("Anna"), None, None);
        assert_eq!(q, PersonQuery::new("Anna", ""));
        assert_eq!(q.label(), "Anna");
    }

    #[test]
    fn test_empty_query_is_invalid() {
        let store = store_with(&["Daniel Cremers"]);
        let err = search(&store, &PersonQuery::new("", "  "), None, &MatchPolicy::default())
            .unwrap_err();
        assert!(matches!(err, LookupError::InvalidQuery(_)));

        let err = check(&store, &PersonQuery::new("..", ""), &MatchPolicy::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_empty_store_returns_no_matches() {
        let store = store_with(&[]);
        let policy = MatchPolicy::default();

        let results = search(&store, &PersonQuery::new("Daniel", "Cremers"), None, &policy).unwrap();
        assert!(results.is_empty());

        let outcome = check(&store, &PersonQuery::new("Daniel", "Cremers"), &policy).unwrap();
        assert!(!outcome.is_member);
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn test_search_limit_is_clamped() {
        let store = store_with(&["Anna Berg", "Anna Bergmann", "Anne Berg", "Hanna Berg"]);
        let policy = MatchPolicy::default();
        let query = PersonQuery::new("Anna", "Berg");

        let one = search(&store, &query, Some(1), &policy).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].record.display_name, "Anna Berg");

        let zero = search(&store, &query, Some(0), &policy).unwrap();
        assert_eq!(zero.len(), 1);
    }

    #[test]
    fn test_check_rejects_different_surname() {
        let store = store_with(&["Daniel Cremers", "David Kremers"]);
        let policy = MatchPolicy::default();

        let yes = check(&store, &PersonQuery::new("Daniel", "Cremers"), &policy).unwrap();
        assert!(yes.is_member);
        assert_eq!(yes.matches[0].record.display_name, "Daniel Cremers");

        let no = check(&store, &PersonQuery::new("Daniel", "Smith"), &policy).unwrap();
        assert!(!no.is_member);
    }

    #[test]
    fn test_check_single_name_token_as_surname() {
        let store = store_with(&["Daniel Cremers", "Anna Berg"]);
        let policy = MatchPolicy::default();

        let outcome = check(&store, &PersonQuery::from_full_name("Cremers"), &policy).unwrap();
        assert!(outcome.is_member);
        assert_eq!(outcome.matches[0].record.display_name, "Daniel Cremers");
        assert_eq!(outcome.matches[0].score.last_name_token, Some(1.0));
    }

    #[test]
    fn test_check_display_only_record() {
        let mut store = Store::in_memory().unwrap();
        let mut record = PersonRecord::from_display_name("Daniel Cremers", "https://mcml.ai/team/");
        record.first_name.clear();
        record.last_name.clear();
        store.replace_all(&[record], "test").unwrap();

        let outcome = check(&store, &PersonQuery::new("Daniel", "Cremers"), &MatchPolicy::default()).unwrap();
        assert!(outcome.is_member);
        assert_eq!(outcome.matches[0].score.combined, 1.0);
    }

    #[test]
    fn test_surname_floor_only_applies_with_surname() {
        let policy = MatchPolicy::default();
        let mut score = ScoreTuple {
            combined: 0.9,
            edit: 0.9,
            token: 0.9,
            full_name: 0.9,
            first_name: Some(0.9),
            last_name: None,
            last_name_token: None,
            last_name_exact: false,
        };
        assert!(confirms_membership(&score, &policy));

        score.last_name_token = Some(0.5);
        assert!(!confirms_membership(&score, &policy));

        score.last_name_token = Some(0.8);
        score.combined = 0.7;
        assert!(!confirms_membership(&score, &policy));
    }

    #[test]
    fn test_export_replaces_and_reports() {
        let mut store = store_with(&["Old Person"]);
        let source = StaticSource::new(
            "fixture",
            vec![
                PersonRecord::from_display_name("Daniel Cremers", "https://mcml.ai/team/"),
                PersonRecord::from_display_name("Anna Berg", "https://mcml.ai/team/")
                    .with_profile_url("relative/link"),
            ],
        );

        let summary = export(&mut store, &source).unwrap();
        // the record with a relative URL is skipped
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.source, "fixture");

        let meta = info(&store).unwrap();
        assert_eq!(meta.record_count, 1);
    }

    #[test]
    fn test_export_with_nothing_keeps_old_data() {
        let mut store = store_with(&["Daniel Cremers"]);
        let err = export(&mut store, &StaticSource::new("empty", Vec::new())).unwrap_err();

        assert!(matches!(err, LookupError::ScrapeFailure { .. }));
        assert_eq!(store.verify_count().unwrap(), 1);
    }
}
