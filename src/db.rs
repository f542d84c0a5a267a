// 🗄️ Record Store - SQLite table of people + export history
//
// Export is replace-all inside one write transaction. With WAL enabled a
// reader keeps seeing the last committed dataset until the export commits.

use crate::error::{LookupError, Result};
use crate::person::PersonRecord;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// How long a reader waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// METADATA TYPES
// ============================================================================

/// Store summary for `info`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreMetadata {
    pub record_count: i64,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub last_source: Option<String>,
    pub fingerprint: Option<String>,
}

/// Result of a committed export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub export_id: String,
    pub exported_at: DateTime<Utc>,
    pub inserted: usize,
    pub duplicates_skipped: usize,
    pub source: String,
    /// SHA-256 over the sorted identity keys of the stored records
    pub fingerprint: String,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Readers see the last committed snapshot while an export is running
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS people (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            display_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            role TEXT NOT NULL,
            note TEXT NOT NULL,
            profile_url TEXT,
            source_page TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // One row per export; the newest row is the store metadata
    conn.execute(
        "CREATE TABLE IF NOT EXISTS exports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            export_id TEXT UNIQUE NOT NULL,
            exported_at TEXT NOT NULL,
            record_count INTEGER NOT NULL,
            duplicates_skipped INTEGER NOT NULL,
            source TEXT NOT NULL,
            fingerprint TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_people_identity
         ON people(lower(first_name), lower(last_name), lower(COALESCE(profile_url, '')))",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_people_last_name ON people(last_name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_people_first_name ON people(first_name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_people_display_name ON people(display_name)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// STORE
// ============================================================================

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) a file-backed store
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        setup_database(&conn)?;
        debug!(path = %path.display(), "opened record store");

        Ok(Store { conn })
    }

    /// In-memory store (tests, dry runs)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(Store { conn })
    }

    /// Start a replace-all export: the table is cleared inside the transaction
    pub fn begin_export(&mut self) -> Result<ExportBatch<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let cleared = tx.execute("DELETE FROM people", [])?;
        debug!(cleared, "export started");

        Ok(ExportBatch {
            tx,
            inserted: 0,
            duplicates: 0,
            keys: Vec::new(),
        })
    }

    /// Atomically replace the whole dataset
    ///
    /// Every record is validated before the table is touched.
    pub fn replace_all(&mut self, records: &[PersonRecord], source: &str) -> Result<ExportSummary> {
        for record in records {
            record.validate()?;
        }

        let mut batch = self.begin_export()?;
        for record in records {
            batch.insert(record)?;
        }
        batch.finish(source)
    }

    /// Full scan, ordered by last name, first name, display name
    pub fn fetch_all(&self) -> Result<Vec<PersonRecord>> {
        let tx = self.conn.unchecked_transaction()?;

        let records = {
            let mut stmt = tx.prepare(
                "SELECT display_name, first_name, last_name, role, note, profile_url, source_page
                 FROM people
                 ORDER BY last_name = '', last_name, first_name, display_name, id",
            )?;

            let rows = stmt.query_map([], |row| {
                Ok(PersonRecord {
                    display_name: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    role: row.get(3)?,
                    note: row.get(4)?,
                    profile_url: row.get(5)?,
                    source_page: row.get(6)?,
                })
            })?;

            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        tx.commit()?;
        Ok(records)
    }

    pub fn verify_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM people", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Record count and last export, read from one snapshot
    pub fn metadata(&self) -> Result<StoreMetadata> {
        let tx = self.conn.unchecked_transaction()?;

        let record_count: i64 = tx.query_row("SELECT COUNT(*) FROM people", [], |row| row.get(0))?;

        let last_export = tx
            .query_row(
                "SELECT exported_at, source, fingerprint
                 FROM exports
                 ORDER BY id DESC
                 LIMIT 1",
                [],
                |row| {
                    let exported_at: String = row.get(0)?;
                    let exported_at = DateTime::parse_from_rfc3339(&exported_at)
                        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?
                        .with_timezone(&Utc);
                    Ok((exported_at, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                },
            )
            .optional()?;

        tx.commit()?;

        let (last_updated_at, last_source, fingerprint) = match last_export {
            Some((at, source, fingerprint)) => (Some(at), Some(source), Some(fingerprint)),
            None => (None, None, None),
        };

        Ok(StoreMetadata {
            record_count,
            last_updated_at,
            last_source,
            fingerprint,
        })
    }

    /// Most recent exports, newest first
    pub fn export_history(&self, limit: usize) -> Result<Vec<ExportSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT export_id, exported_at, record_count, duplicates_skipped, source, fingerprint
             FROM exports
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let history = stmt
            .query_map(params![limit as i64], |row| {
                let exported_at: String = row.get(1)?;
                let exported_at = DateTime::parse_from_rfc3339(&exported_at)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?
                    .with_timezone(&Utc);
                let inserted: i64 = row.get(2)?;
                let duplicates: i64 = row.get(3)?;

                Ok(ExportSummary {
                    export_id: row.get(0)?,
                    exported_at,
                    inserted: inserted as usize,
                    duplicates_skipped: duplicates as usize,
                    source: row.get(4)?,
                    fingerprint: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(history)
    }
}

// ============================================================================
// EXPORT BATCH
// ============================================================================

/// An in-progress replace-all export
///
/// Nothing is visible to readers until `finish`; dropping the batch rolls back.
pub struct ExportBatch<'conn> {
    tx: rusqlite::Transaction<'conn>,
    inserted: usize,
    duplicates: usize,
    keys: Vec<(String, String, String)>,
}

impl ExportBatch<'_> {
    /// Insert one record; returns false when it duplicates an earlier one
    pub fn insert(&mut self, record: &PersonRecord) -> Result<bool> {
        let result = self.tx.execute(
            "INSERT INTO people (
                display_name, first_name, last_name, role, note, profile_url, source_page
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.display_name,
                record.first_name,
                record.last_name,
                record.role,
                record.note,
                record.profile_url,
                record.source_page,
            ],
        );

        match result {
            Ok(_) => {
                self.inserted += 1;
                self.keys.push(record.identity_key());
                Ok(true)
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                self.duplicates += 1;
                debug!(name = %record.shown_name(), "skipped duplicate record");
                Ok(false)
            }
            Err(e) => Err(LookupError::StoreAccess(e)),
        }
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Record the export and commit
    pub fn finish(mut self, source: &str) -> Result<ExportSummary> {
        let export_id = uuid::Uuid::new_v4().to_string();
        let exported_at = Utc::now();
        let fingerprint = fingerprint(&mut self.keys);

        self.tx.execute(
            "INSERT INTO exports (
                export_id, exported_at, record_count, duplicates_skipped, source, fingerprint
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                export_id,
                exported_at.to_rfc3339(),
                self.inserted as i64,
                self.duplicates as i64,
                source,
                fingerprint,
            ],
        )?;

        self.tx.commit()?;

        info!(
            inserted = self.inserted,
            duplicates = self.duplicates,
            source,
            "export committed"
        );

        Ok(ExportSummary {
            export_id,
            exported_at,
            inserted: self.inserted,
            duplicates_skipped: self.duplicates,
            source: source.to_string(),
            fingerprint,
        })
    }
}

/// Order-independent hash of the stored identity keys
fn fingerprint(keys: &mut [(String, String, String)]) -> String {
    keys.sort();
    let mut hasher = Sha256::new();
    for (first, last, url) in keys.iter() {
        hasher.update(first.as_bytes());
        hasher.update([0x1f]);
        hasher.update(last.as_bytes());
        hasher.update([0x1f]);
        hasher.update(url.as_bytes());
        hasher.update([0x1e]);
    }
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn create_test_person(name: &str, url: Option<&str>) -> PersonRecord {
        let record = PersonRecord::from_display_name(name, "https://mcml.ai/team/");
        match url {
            Some(u) => record.with_profile_url(u),
            None => record,
        }
    }

    #[test]
    fn test_empty_store_metadata() {
        let store = Store::in_memory().unwrap();
        let meta = store.metadata().unwrap();

        assert_eq!(meta.record_count, 0);
        assert_eq!(meta.last_updated_at, None);
        assert!(store.fetch_all().unwrap().is_empty());
    }

    #[test]
    fn test_replace_all_and_fetch() {
        let mut store = Store::in_memory().unwrap();
        let people = vec![
            create_test_person("Daniel Cremers", Some("https://mcml.ai/research/groups/cremers/")),
            create_test_person("Anna Berg", None),
        ];

        let summary = store.replace_all(&people, "test").unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.duplicates_skipped, 0);
        assert_eq!(summary.fingerprint.len(), 64);

        let fetched = store.fetch_all().unwrap();
        assert_eq!(fetched.len(), 2);
        // Ordered by last name
        assert_eq!(fetched[0].last_name, "Berg");
        assert_eq!(fetched[1], people[0]);

        let meta = store.metadata().unwrap();
        assert_eq!(meta.record_count, 2);
        assert_eq!(meta.last_source.as_deref(), Some("test"));
        assert!(meta.last_updated_at.is_some());
    }

    #[test]
    fn test_duplicate_identity_skipped() {
        let mut store = Store::in_memory().unwrap();
        let people = vec![
            create_test_person("Daniel Cremers", Some("https://mcml.ai/x/")),
            create_test_person("daniel cremers", Some("https://mcml.ai/X/")),
            create_test_person("Daniel Cremers", None),
        ];

        let summary = store.replace_all(&people, "test").unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.duplicates_skipped, 1);
        assert_eq!(store.verify_count().unwrap(), 2);
    }

    #[test]
    fn test_second_export_replaces_everything() {
        let mut store = Store::in_memory().unwrap();
        store
            .replace_all(&[create_test_person("Daniel Cremers", None)], "first")
            .unwrap();
        store
            .replace_all(
                &[
                    create_test_person("Anna Berg", None),
                    create_test_person("David Kremers", None),
                ],
                "second",
            )
            .unwrap();

        let names: Vec<String> = store
            .fetch_all()
            .unwrap()
            .into_iter()
            .map(|p| p.display_name)
            .collect();
        assert_eq!(names, vec!["Anna Berg".to_string(), "David Kremers".to_string()]);

        let history = store.export_history(10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].source, "second");
    }

    #[test]
    fn test_invalid_record_leaves_store_untouched() {
        let mut store = Store::in_memory().unwrap();
        store
            .replace_all(&[create_test_person("Daniel Cremers", None)], "first")
            .unwrap();

        let bad = create_test_person("Anna Berg", Some("not a url"));
        let err = store
            .replace_all(&[create_test_person("David Kremers", None), bad], "second")
            .unwrap_err();

        assert!(matches!(err, LookupError::InvalidRecord(_)));
        let fetched = store.fetch_all().unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].display_name, "Daniel Cremers");
    }

    #[test]
    fn test_dropped_batch_rolls_back() {
        let mut store = Store::in_memory().unwrap();
        store
            .replace_all(&[create_test_person("Daniel Cremers", None)], "first")
            .unwrap();

        {
            let mut batch = store.begin_export().unwrap();
            batch.insert(&create_test_person("Anna Berg", None)).unwrap();
            assert_eq!(batch.inserted(), 1);
            // dropped without finish
        }

        let fetched = store.fetch_all().unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].display_name, "Daniel Cremers");
        assert_eq!(store.export_history(10).unwrap().len(), 1);
    }

    #[test]
    fn test_fingerprint_ignores_order() {
        let a = create_test_person("Daniel Cremers", None);
        let b = create_test_person("Anna Berg", None);

        let mut store = Store::in_memory().unwrap();
        let first = store.replace_all(&[a.clone(), b.clone()], "x").unwrap();
        let second = store.replace_all(&[b, a], "x").unwrap();

        assert_eq!(first.fingerprint, second.fingerprint);
        assert_ne!(first.export_id, second.export_id);
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mcml.sqlite");

        let store = Store::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.verify_count().unwrap(), 0);
    }
}
