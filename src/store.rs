// Append-only CSV table store
//
// Each output table is an append-only log of discovered entities: existing
// rows are never rewritten or deleted. Opening a store parses whatever is
// already on disk, indexes natural key → id, and remembers the max numeric
// id so the allocator can be seeded above it. Appending filters out keys
// that already exist; processing the same inputs twice therefore appends
// nothing the second time.

use anyhow::{bail, Context, Result};
use chrono::Local;
use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Placeholder for a never-set `deleted_by` column.
pub const NULL_MARKER: &str = "\\N";

/// Timestamp format used in every `created_at` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `created_at, updated_at, is_deleted, deleted_at, deleted_by` stamp for a
/// freshly appended row.
pub fn soft_delete_stamp() -> [String; 5] {
    let now = Local::now().format(TIMESTAMP_FORMAT).to_string();
    [
        now,
        String::new(),
        "false".to_string(),
        String::new(),
        NULL_MARKER.to_string(),
    ]
}

/// Natural-key extractor: given a parsed row (header order), produce the
/// key that identifies the logical entity, or None for rows that carry no
/// usable key (those are kept on disk but not indexed).
pub type KeyFn = fn(&[String]) -> Option<String>;

/// A row ready to append, carrying its natural key for the exists check.
#[derive(Debug, Clone)]
pub struct KeyedRow {
    pub key: String,
    pub record: Vec<String>,
}

// ============================================================================
// APPEND STORE
// ============================================================================

pub struct AppendStore {
    path: PathBuf,
    headers: &'static [&'static str],
    delimiter: u8,
    key_fn: KeyFn,

    /// Keys present on disk or appended this run.
    keys: HashSet<String>,
    /// Subset of `keys` whose id column parsed as a number.
    key_to_id: HashMap<String, i64>,
    max_id: i64,
    skipped_rows: usize,
}

impl AppendStore {
    /// Open the store, loading and indexing existing output if present.
    ///
    /// Rows that are shorter than the header, or whose key cannot be
    /// derived, are skipped (counted, logged at debug) - the index is
    /// best-effort over whatever parses.
    pub fn open(
        path: &Path,
        headers: &'static [&'static str],
        delimiter: u8,
        key_fn: KeyFn,
    ) -> Result<Self> {
        let mut store = AppendStore {
            path: path.to_path_buf(),
            headers,
            delimiter,
            key_fn,
            keys: HashSet::new(),
            key_to_id: HashMap::new(),
            max_id: 0,
            skipped_rows: 0,
        };
        if path.exists() {
            store.load_existing()?;
        }
        Ok(store)
    }

    fn load_existing(&mut self) -> Result<()> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .flexible(true)
            .has_headers(true)
            .from_path(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;

        for result in reader.records() {
            let record = match result {
                Ok(r) => r,
                Err(err) => {
                    self.skipped_rows += 1;
                    debug!(path = %self.path.display(), %err, "skipping unreadable row");
                    continue;
                }
            };
            let fields: Vec<String> = record.iter().map(|f| f.to_string()).collect();
            if fields.len() < self.headers.len() {
                self.skipped_rows += 1;
                debug!(path = %self.path.display(), width = fields.len(), "skipping short row");
                continue;
            }

            if let Ok(id) = fields[0].trim().parse::<i64>() {
                if id > self.max_id {
                    self.max_id = id;
                }
                if let Some(key) = (self.key_fn)(&fields) {
                    self.key_to_id.insert(key.clone(), id);
                    self.keys.insert(key);
                }
            } else if let Some(key) = (self.key_fn)(&fields) {
                // Tables with non-numeric ids still get existence tracking
                self.keys.insert(key);
            }
        }
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn id_for(&self, key: &str) -> Option<i64> {
        self.key_to_id.get(key).copied()
    }

    /// Max numeric id seen on disk (0 if none). Feed this to
    /// `IdSequence::raise_floor` / `IdRegistry::seeded`.
    pub fn max_id(&self) -> i64 {
        self.max_id
    }

    /// Recovered key→id assignments, for seeding an `IdRegistry`.
    pub fn existing_ids(&self) -> &HashMap<String, i64> {
        &self.key_to_id
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    /// Append the rows whose keys are not yet present; returns how many
    /// were written. Creates the file with a header when absent. Existing
    /// rows are never touched.
    pub fn append_rows(&mut self, rows: Vec<KeyedRow>) -> Result<usize> {
        // Drop keys already on disk and duplicates within the batch itself
        let mut batch_keys: HashSet<String> = HashSet::new();
        let fresh: Vec<KeyedRow> = rows
            .into_iter()
            .filter(|row| !self.keys.contains(&row.key) && batch_keys.insert(row.key.clone()))
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }

        let create = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {} for append", self.path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_writer(file);

        if create {
            writer.write_record(self.headers)?;
        }

        let mut written = 0;
        for row in fresh {
            if row.record.len() != self.headers.len() {
                bail!(
                    "row width {} does not match {} header width {}",
                    row.record.len(),
                    self.path.display(),
                    self.headers.len()
                );
            }
            writer.write_record(&row.record)?;
            if let Ok(id) = row.record[0].trim().parse::<i64>() {
                if id > self.max_id {
                    self.max_id = id;
                }
                self.key_to_id.insert(row.key.clone(), id);
            }
            self.keys.insert(row.key);
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const HEADERS: &[&str] = &["id", "name", "created_at"];

    fn tmp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("busline_store_{}_{}.csv", name, std::process::id()));
        let _ = fs::remove_file(&p);
        p
    }

    fn name_key(fields: &[String]) -> Option<String> {
        Some(fields[1].clone())
    }

    fn keyed(id: i64, name: &str) -> KeyedRow {
        KeyedRow {
            key: name.to_string(),
            record: vec![id.to_string(), name.to_string(), "2024-01-01 00:00:00".into()],
        }
    }

    #[test]
    fn test_create_then_reload() {
        let path = tmp_path("create");
        let mut store = AppendStore::open(&path, HEADERS, b';', name_key).unwrap();
        assert_eq!(store.max_id(), 0);
        let n = store
            .append_rows(vec![keyed(1500, "alpha"), keyed(1501, "beta")])
            .unwrap();
        assert_eq!(n, 2);

        // Reopen: header row parsed, keys and max id recovered
        let store = AppendStore::open(&path, HEADERS, b';', name_key).unwrap();
        assert_eq!(store.max_id(), 1501);
        assert_eq!(store.id_for("alpha"), Some(1500));
        assert!(store.contains("beta"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_append_skips_existing_keys() {
        let path = tmp_path("skip");
        let mut store = AppendStore::open(&path, HEADERS, b';', name_key).unwrap();
        store.append_rows(vec![keyed(1500, "alpha")]).unwrap();

        let mut store = AppendStore::open(&path, HEADERS, b';', name_key).unwrap();
        let n = store
            .append_rows(vec![keyed(9999, "alpha"), keyed(1501, "gamma")])
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.id_for("alpha"), Some(1500)); // untouched

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3); // header + 2 rows
        assert!(!content.contains("9999"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_double_append_is_idempotent() {
        let path = tmp_path("idem");
        let rows = vec![keyed(1500, "alpha"), keyed(1501, "beta")];

        let mut store = AppendStore::open(&path, HEADERS, b';', name_key).unwrap();
        assert_eq!(store.append_rows(rows.clone()).unwrap(), 2);
        let first = fs::read_to_string(&path).unwrap();

        let mut store = AppendStore::open(&path, HEADERS, b';', name_key).unwrap();
        assert_eq!(store.append_rows(rows).unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_short_rows_are_skipped_not_fatal() {
        let path = tmp_path("short");
        fs::write(&path, "id;name;created_at\n1500;alpha;t\nbroken\n").unwrap();
        let store = AppendStore::open(&path, HEADERS, b';', name_key).unwrap();
        assert_eq!(store.skipped_rows(), 1);
        assert!(store.contains("alpha"));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_row_width_mismatch_is_an_error() {
        let path = tmp_path("width");
        let mut store = AppendStore::open(&path, HEADERS, b';', name_key).unwrap();
        let bad = KeyedRow {
            key: "x".into(),
            record: vec!["1500".into(), "x".into()],
        };
        assert!(store.append_rows(vec![bad]).is_err());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_in_batch_duplicate_keys_collapse() {
        let path = tmp_path("batch_dup");
        let mut store = AppendStore::open(&path, HEADERS, b';', name_key).unwrap();
        let n = store
            .append_rows(vec![keyed(1500, "alpha"), keyed(1500, "alpha")])
            .unwrap();
        assert_eq!(n, 1);
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2); // header + 1 row
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_soft_delete_stamp_shape() {
        let stamp = soft_delete_stamp();
        assert_eq!(stamp.len(), 5);
        assert_eq!(stamp[2], "false");
        assert_eq!(stamp[4], NULL_MARKER);
        assert!(stamp[1].is_empty() && stamp[3].is_empty());
    }
}
