// 🎯 Fuzzy Matcher - score a name query against stored people
//
// Two signals:
// - edit distance catches typos ("Cremres") but punishes abbreviations ("Dan")
// - token/prefix overlap catches abbreviations and reordering but misses typos
//
// combined = (edit_weight * edit + token_weight * token) / (edit_weight + token_weight)

use crate::config::MatchPolicy;
use crate::normalize::{normalize, NormalizedName};
use crate::person::{split_display_name, PersonRecord};
use serde::Serialize;
use std::cmp::Ordering;
use strsim::levenshtein;

// ============================================================================
// SCORE TUPLE
// ============================================================================

/// Per-candidate score breakdown, all values in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreTuple {
    /// Weighted blend used for ranking and membership
    pub combined: f64,

    /// Edit-distance signal (weighted average of the field similarities)
    pub edit: f64,

    /// Token/prefix signal
    pub token: f64,

    /// Full-name edit similarity
    pub full_name: f64,

    /// First-vs-first similarity (None when the query has no first name)
    pub first_name: Option<f64>,

    /// Last-vs-last similarity (None when the query has no last name)
    pub last_name: Option<f64>,

    /// Token score of the query's last name against the candidate's last name
    pub last_name_token: Option<f64>,

    /// Normalized last names are identical
    pub last_name_exact: bool,
}

impl ScoreTuple {
    fn zero() -> Self {
        ScoreTuple {
            combined: 0.0,
            edit: 0.0,
            token: 0.0,
            full_name: 0.0,
            first_name: None,
            last_name: None,
            last_name_token: None,
            last_name_exact: false,
        }
    }
}

// ============================================================================
// QUERY + CANDIDATE FORMS
// ============================================================================

/// Normalized first / last / full query
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    pub first: NormalizedName,
    pub last: NormalizedName,
    pub full: NormalizedName,
}

impl NormalizedQuery {
    pub fn new(first: &str, last: &str) -> Self {
        let first = normalize(first);
        let last = normalize(last);
        let full = NormalizedName::join(&first, &last);
        NormalizedQuery { first, last, full }
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_empty() && self.last.is_empty()
    }
}

/// Normalized forms of one stored record
#[derive(Debug, Clone)]
pub struct CandidateName {
    pub display: NormalizedName,
    pub first: NormalizedName,
    pub last: NormalizedName,
    /// "first last"
    pub joined: NormalizedName,
    tokens: Vec<String>,
}

impl CandidateName {
    /// Name parts come from the display name when the record has none
    pub fn from_record(record: &PersonRecord) -> Self {
        let display = normalize(&record.display_name);
        let (mut first, mut last) = (normalize(&record.first_name), normalize(&record.last_name));
        if first.is_empty() && last.is_empty() {
            let (first_part, last_part) = split_display_name(&record.display_name);
            first = normalize(&first_part);
            last = normalize(&last_part);
        }
        let joined = NormalizedName::join(&first, &last);

        let mut tokens: Vec<String> = Vec::new();
        for name in [&display, &first, &last] {
            for token in name.tokens() {
                if !tokens.iter().any(|t| t == token) {
                    tokens.push(token.to_string());
                }
            }
        }

        CandidateName {
            display,
            first,
            last,
            joined,
            tokens,
        }
    }

    fn token_refs(&self) -> Vec<&str> {
        self.tokens.iter().map(String::as_str).collect()
    }
}

// ============================================================================
// SIMILARITY PRIMITIVES
// ============================================================================

/// `1 - levenshtein / max(len_a, len_b, 1)`, clamped to [0, 1]
///
/// An empty side never matches: the result is 0.
pub fn edit_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let distance = levenshtein(a, b);
    let max_len = a.chars().count().max(b.chars().count()).max(1);
    (1.0 - distance as f64 / max_len as f64).clamp(0.0, 1.0)
}

/// Score one query token against one candidate token
///
/// exact → 1.0, prefix ("dan" → "daniel") → prefix_score, else edit similarity.
/// Directional: the query token must be the prefix.
pub fn token_similarity(query_token: &str, candidate_token: &str, prefix_score: f64) -> f64 {
    if query_token.is_empty() || candidate_token.is_empty() {
        return 0.0;
    }
    if query_token == candidate_token {
        return 1.0;
    }
    let edit = edit_similarity(query_token, candidate_token);
    if candidate_token.starts_with(query_token) {
        return edit.max(prefix_score);
    }
    edit
}

/// Average over query tokens of the best candidate-token score
pub fn token_score(query_tokens: &[&str], candidate_tokens: &[&str], prefix_score: f64) -> f64 {
    if query_tokens.is_empty() || candidate_tokens.is_empty() {
        return 0.0;
    }

    let total: f64 = query_tokens
        .iter()
        .map(|q| {
            candidate_tokens
                .iter()
                .map(|c| token_similarity(q, c, prefix_score))
                .fold(0.0, f64::max)
        })
        .sum();

    total / query_tokens.len() as f64
}

fn blend(edit: f64, token: f64, policy: &MatchPolicy) -> f64 {
    let total = policy.edit_weight + policy.token_weight;
    if total <= 0.0 {
        return 0.0;
    }
    ((policy.edit_weight * edit + policy.token_weight * token) / total).clamp(0.0, 1.0)
}

// ============================================================================
// SCORING
// ============================================================================

/// Score a query name against a candidate name (no field structure)
///
/// Not symmetric: prefix credit only flows from query to candidate.
pub fn score_names(
    query: &NormalizedName,
    candidate: &NormalizedName,
    policy: &MatchPolicy,
) -> ScoreTuple {
    if query.is_empty() || candidate.is_empty() {
        return ScoreTuple::zero();
    }

    let full_name = edit_similarity(query.as_str(), candidate.as_str());
    let token = token_score(&query.tokens(), &candidate.tokens(), policy.prefix_score);

    ScoreTuple {
        combined: blend(full_name, token, policy),
        edit: full_name,
        token,
        full_name,
        first_name: None,
        last_name: None,
        last_name_token: None,
        last_name_exact: false,
    }
}

/// Score a first/last query against a stored record
///
/// Empty query fields are left out of the edit average instead of counting
/// as a mismatch, so a last-name-only query is not penalized.
pub fn score_record(
    query: &NormalizedQuery,
    candidate: &CandidateName,
    policy: &MatchPolicy,
) -> ScoreTuple {
    if query.is_empty() || candidate.tokens.is_empty() {
        return ScoreTuple::zero();
    }

    let full_name = edit_similarity(query.full.as_str(), candidate.display.as_str())
        .max(edit_similarity(query.full.as_str(), candidate.joined.as_str()));

    let first_name = (!query.first.is_empty())
        .then(|| edit_similarity(query.first.as_str(), candidate.first.as_str()));
    let last_name = (!query.last.is_empty())
        .then(|| edit_similarity(query.last.as_str(), candidate.last.as_str()));

    let mut weighted = policy.full_name_weight * full_name;
    let mut weight_total = policy.full_name_weight;
    if let Some(sim) = first_name {
        weighted += policy.first_name_weight * sim;
        weight_total += policy.first_name_weight;
    }
    if let Some(sim) = last_name {
        weighted += policy.last_name_weight * sim;
        weight_total += policy.last_name_weight;
    }
    let edit = if weight_total > 0.0 {
        (weighted / weight_total).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let token = token_score(&query.full.tokens(), &candidate.token_refs(), policy.prefix_score);

    let last_name_token = (!query.last.is_empty()).then(|| {
        token_score(&query.last.tokens(), &candidate.last.tokens(), policy.prefix_score)
    });
    let last_name_exact = !query.last.is_empty() && query.last == candidate.last;

    ScoreTuple {
        combined: blend(edit, token, policy),
        edit,
        token,
        full_name,
        first_name,
        last_name,
        last_name_token,
        last_name_exact,
    }
}

// ============================================================================
// RANKING
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RankedMatch {
    pub record: PersonRecord,
    pub score: ScoreTuple,
}

/// Score every record, drop those below `min_score`, sort best first
///
/// Ties: exact last name first, then shorter display name, then lexical order.
pub fn rank(query: &NormalizedQuery, records: &[PersonRecord], policy: &MatchPolicy) -> Vec<RankedMatch> {
    let mut matches: Vec<RankedMatch> = records
        .iter()
        .filter_map(|record| {
            let candidate = CandidateName::from_record(record);
            let score = score_record(query, &candidate, policy);
            if score.combined > 0.0 && score.combined >= policy.min_score {
                Some(RankedMatch {
                    record: record.clone(),
                    score,
                })
            } else {
                None
            }
        })
        .collect();

    matches.sort_by(compare_ranked);
    matches
}

/// Deterministic ordering for ranked matches
pub fn compare_ranked(a: &RankedMatch, b: &RankedMatch) -> Ordering {
    let a_name = a.record.shown_name();
    let b_name = b.record.shown_name();

    b.score
        .combined
        .total_cmp(&a.score.combined)
        .then_with(|| b.score.last_name_exact.cmp(&a.score.last_name_exact))
        .then_with(|| a_name.chars().count().cmp(&b_name.chars().count()))
        .then_with(|| a_name.cmp(&b_name))
        .then_with(|| a.record.first_name.cmp(&b.record.first_name))
        .then_with(|| a.record.last_name.cmp(&b.record.last_name))
        .then_with(|| a.record.profile_url.cmp(&b.record.profile_url))
        .then_with(|| a.record.source_page.cmp(&b.record.source_page))
}

// ============================================================================
// TESTS
// ============================================================================
