// ⚙️ Configuration - database location and match policy
//
// Nothing here is global: the CLI and server build a Config and pass it down,
// so tests can point the store at a temp file or an in-memory database.

use crate::error::{LookupError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "mcml";
pub const DB_FILENAME: &str = "mcml.sqlite";

/// Environment variable overriding the database path
pub const DB_ENV_VAR: &str = "MCML_DB";

// ============================================================================
// MATCH POLICY
// ============================================================================

/// Weights and thresholds used by the matcher and the check operation
///
/// These are tuned against the live directory and can be overridden with a
/// JSON file; every field is optional there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    /// Share of the combined score taken by the edit-distance signal
    pub edit_weight: f64,

    /// Share of the combined score taken by the token/prefix signal
    pub token_weight: f64,

    /// Weight of the full-name similarity inside the edit signal
    pub full_name_weight: f64,

    /// Weight of first-vs-first similarity inside the edit signal
    pub first_name_weight: f64,

    /// Weight of last-vs-last similarity inside the edit signal
    pub last_name_weight: f64,

    /// Token score when a query token is a prefix of a candidate token ("dan" → "daniel")
    pub prefix_score: f64,

    /// Minimum combined score of the top match for `check` to answer yes
    pub membership_threshold: f64,

    /// Minimum last-name token score for `check` to answer yes
    pub last_name_floor: f64,

    /// Candidates scoring below this are not returned at all
    pub min_score: f64,

    /// Result count for `search` when no limit is given
    pub default_limit: usize,

    /// Upper bound for a caller-provided limit
    pub max_limit: usize,

    /// Number of matches shown alongside a `check` answer
    pub check_limit: usize,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        MatchPolicy {
            edit_weight: 0.5,
            token_weight: 0.5,
            full_name_weight: 0.4,
            first_name_weight: 0.2,
            last_name_weight: 0.4,
            prefix_score: 0.9,
            membership_threshold: 0.82,
            last_name_floor: 0.75,
            min_score: 0.55,
            default_limit: 10,
            max_limit: 50,
            check_limit: 5,
        }
    }
}

impl MatchPolicy {
    /// Load a policy from a JSON file, filling missing fields with defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LookupError::Policy(format!("failed to read {}: {}", path.display(), e))
        })?;

        let policy: MatchPolicy = serde_json::from_str(&content).map_err(|e| {
            LookupError::Policy(format!("failed to parse {}: {}", path.display(), e))
        })?;

        policy.validate()?;
        Ok(policy)
    }

    /// Reject weights and thresholds that would break the [0, 1] score range
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("edit_weight", self.edit_weight),
            ("token_weight", self.token_weight),
            ("full_name_weight", self.full_name_weight),
            ("first_name_weight", self.first_name_weight),
            ("last_name_weight", self.last_name_weight),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(LookupError::Policy(format!("{} must be >= 0, got {}", name, value)));
            }
        }

        if self.edit_weight + self.token_weight <= 0.0 {
            return Err(LookupError::Policy(
                "edit_weight + token_weight must be positive".to_string(),
            ));
        }
        if self.full_name_weight <= 0.0 {
            return Err(LookupError::Policy("full_name_weight must be positive".to_string()));
        }

        let unit = [
            ("prefix_score", self.prefix_score),
            ("membership_threshold", self.membership_threshold),
            ("last_name_floor", self.last_name_floor),
            ("min_score", self.min_score),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(LookupError::Policy(format!("{} must be in [0, 1], got {}", name, value)));
            }
        }

        if self.default_limit == 0 || self.max_limit == 0 || self.check_limit == 0 {
            return Err(LookupError::Policy("limits must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Clamp a caller-provided limit into 1..=max_limit
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub policy: MatchPolicy,
}

impl Config {
    /// Resolve the database path and policy
    ///
    /// Path order: explicit value → `MCML_DB` → XDG data dir → ~/.local/share
    pub fn resolve(db_path: Option<PathBuf>, policy_path: Option<&Path>) -> Result<Self> {
        let db_path = match db_path {
            Some(path) => path,
            None => std::env::var_os(DB_ENV_VAR)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path),
        };

        let policy = match policy_path {
            Some(path) => MatchPolicy::from_file(path)?,
            None => MatchPolicy::default(),
        };

        Ok(Config { db_path, policy })
    }
}

/// `$XDG_DATA_HOME/mcml/mcml.sqlite`, falling back to `~/.local/share`
pub fn default_db_path() -> PathBuf {
    let base = std::env::var_os("XDG_DATA_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("share"))
        })
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_NAME).join(DB_FILENAME)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_policy_is_valid() {
        assert!(MatchPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_partial_policy_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"membership_threshold": 0.9, "check_limit": 3}}"#).unwrap();

        let policy = MatchPolicy::from_file(file.path()).unwrap();
        assert_eq!(policy.membership_threshold, 0.9);
        assert_eq!(policy.check_limit, 3);
        assert_eq!(policy.prefix_score, MatchPolicy::default().prefix_score);
    }

    #[test]
    fn test_out_of_range_policy_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"min_score": 1.5}}"#).unwrap();

        let err = MatchPolicy::from_file(file.path()).unwrap_err();
        assert!(matches!(err, LookupError::Policy(_)));
    }

    #[test]
    fn test_zero_weights_rejected() {
        let policy = MatchPolicy {
            edit_weight: 0.0,
            token_weight: 0.0,
            ..MatchPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_effective_limit_clamps() {
        let policy = MatchPolicy::default();
        assert_eq!(policy.effective_limit(None), 10);
        assert_eq!(policy.effective_limit(Some(0)), 1);
        assert_eq!(policy.effective_limit(Some(500)), 50);
        assert_eq!(policy.effective_limit(Some(7)), 7);
    }

    #[test]
    fn test_explicit_db_path_wins() {
        let config = Config::resolve(Some(PathBuf::from("/tmp/people.sqlite")), None).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/people.sqlite"));
        assert_eq!(config.policy, MatchPolicy::default());
    }

    #[test]
    fn test_default_db_path_ends_with_app_file() {
        let path = default_db_path();
        assert!(path.ends_with(Path::new(APP_NAME).join(DB_FILENAME)));
    }
}
