//! JSON-file record store
//!
//! Layout under the store directory:
//! - `index.json`: one entry per roast id
//! - `records/<id>.json`: the flat record plus envelope
//! - `sources/<id>.alog`: the original log bytes
//! - `images/<id>.<ext>`: the paired photo, when there is one
//!
//! The store is the only place that enforces one record per roast id.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use roastlog::validation::validate_image_file_name;
use roastlog::{sort_newest_first, RoastFilter, RoastRecord, RoastSummary};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{ImportError, ImportResult};

const INDEX_FILE: &str = "index.json";

/// What to do when a roast id is already stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    Skip,
    Update,
}

/// Index entry for one stored roast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredRoast {
    /// Store-assigned identifier
    pub id: Uuid,
    pub roast_uuid: String,
    pub source_file: String,
    /// SHA-256 of the original log bytes, hex
    pub source_sha256: String,
    pub image_file: Option<String>,
    pub imported_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub summary: RoastSummary,
}

/// Record file contents
#[derive(Debug, Serialize)]
struct RecordEnvelope<'a> {
    id: Uuid,
    source_file: &'a str,
    source_sha256: &'a str,
    image_file: Option<&'a str>,
    updated_at: DateTime<Utc>,
    warnings: usize,
    record: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Created(Uuid),
    Updated(Uuid),
}

impl StoreOutcome {
    pub fn id(&self) -> Uuid {
        match self {
            StoreOutcome::Created(id) | StoreOutcome::Updated(id) => *id,
        }
    }
}

/// Hex SHA-256 digest of a source file
pub fn source_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Roast records persisted as JSON files
#[derive(Debug)]
pub struct RoastStore {
    dir: PathBuf,
    index: BTreeMap<String, StoredRoast>,
}

impl RoastStore {
    /// Open (or create) a store directory
    pub fn open(dir: impl Into<PathBuf>) -> ImportResult<Self> {
        let dir = dir.into();
        for sub in ["records", "sources", "images"] {
            let path = dir.join(sub);
            fs::create_dir_all(&path).map_err(|e| ImportError::io(&path, e))?;
        }

        let index_path = dir.join(INDEX_FILE);
        let index = if index_path.exists() {
            let text = fs::read_to_string(&index_path).map_err(|e| ImportError::io(&index_path, e))?;
            serde_json::from_str(&text)?
        } else {
            BTreeMap::new()
        };

        tracing::debug!("Opened store {} with {} roasts", dir.display(), index.len());
        Ok(Self { dir, index })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, roast_uuid: &str) -> bool {
        self.index.contains_key(roast_uuid)
    }

    pub fn get(&self, roast_uuid: &str) -> Option<&StoredRoast> {
        self.index.get(roast_uuid)
    }

    /// Stored summaries matching a filter, newest first
    pub fn summaries(&self, filter: &RoastFilter) -> Vec<RoastSummary> {
        let mut list: Vec<RoastSummary> = self
            .index
            .values()
            .map(|entry| entry.summary.clone())
            .filter(|summary| filter.matches(summary))
            .collect();
        sort_newest_first(&mut list);
        list
    }

    /// Persist one record
    ///
    /// A known roast id is rejected with [`ImportError::DuplicateIdentifier`]
    /// under [`DuplicatePolicy::Skip`] and overwritten in place, keeping its
    /// store id, under [`DuplicatePolicy::Update`]. An update without a photo
    /// keeps the stored one; a photo with another extension replaces it.
    /// Files written by a failed save are removed again.
    pub fn save(
        &mut self,
        record: &RoastRecord,
        source_name: &str,
        source_bytes: &[u8],
        image: Option<&Path>,
        policy: DuplicatePolicy,
    ) -> ImportResult<StoreOutcome> {
        let roast_uuid = record.roast_uuid().to_string();
        let now = Utc::now();

        let previous = self.index.get(&roast_uuid).cloned();
        let outcome = match (&previous, policy) {
            (Some(_), DuplicatePolicy::Skip) => {
                return Err(ImportError::DuplicateIdentifier { roast_uuid });
            }
            (Some(existing), DuplicatePolicy::Update) => StoreOutcome::Updated(existing.id),
            (None, _) => StoreOutcome::Created(Uuid::new_v4()),
        };
        let id = outcome.id();

        if let Some(path) = image {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if validate_image_file_name(&filename).is_err() {
                return Err(ImportError::InvalidFileType { filename });
            }
        }

        let previous_image = previous.as_ref().and_then(|p| p.image_file.clone());
        let mut created = Vec::new();
        let digest = source_digest(source_bytes);
        let written = self.write_artifacts(
            id,
            record,
            (source_name, source_bytes, digest.as_str()),
            image,
            previous_image.as_deref(),
            now,
            &mut created,
        );
        let new_image = match written {
            Ok(new_image) => new_image,
            Err(e) => {
                self.remove_files(&created);
                return Err(e);
            }
        };

        let image_file = new_image.clone().or_else(|| previous_image.clone());
        self.index.insert(
            roast_uuid.clone(),
            StoredRoast {
                id,
                roast_uuid: roast_uuid.clone(),
                source_file: source_name.to_string(),
                source_sha256: digest,
                image_file,
                imported_at: previous.as_ref().map_or(now, |p| p.imported_at),
                updated_at: now,
                summary: record.summary(),
            },
        );
        if let Err(e) = self.persist_index() {
            match previous {
                Some(entry) => self.index.insert(roast_uuid, entry),
                None => self.index.remove(&roast_uuid),
            };
            self.remove_files(&created);
            return Err(e);
        }

        if let (Some(old), Some(new)) = (&previous_image, &new_image) {
            if old != new {
                self.remove_files(&[self.dir.join(old)]);
            }
        }

        Ok(outcome)
    }

    /// Source copy, photo and record file; returns the stored photo path
    ///
    /// `source` is the file name, its bytes and their digest. Every file that
    /// did not exist before is pushed onto `created`.
    fn write_artifacts(
        &self,
        id: Uuid,
        record: &RoastRecord,
        source: (&str, &[u8], &str),
        image: Option<&Path>,
        kept_image: Option<&str>,
        now: DateTime<Utc>,
        created: &mut Vec<PathBuf>,
    ) -> ImportResult<Option<String>> {
        let (source_name, source_bytes, digest) = source;
        let source_path = self.dir.join("sources").join(format!("{}.alog", id));
        track_new(&source_path, created);
        write_file(&source_path, source_bytes)?;

        let image_file = match image {
            Some(path) => Some(self.copy_image(id, path, created)?),
            None => None,
        };

        let envelope = RecordEnvelope {
            id,
            source_file: source_name,
            source_sha256: digest,
            image_file: image_file.as_deref().or(kept_image),
            updated_at: now,
            warnings: record.warnings.len(),
            record: record.to_flat_map(),
        };
        let record_path = self.dir.join("records").join(format!("{}.json", id));
        track_new(&record_path, created);
        write_file(&record_path, serde_json::to_string_pretty(&envelope)?.as_bytes())?;

        Ok(image_file)
    }

    fn copy_image(&self, id: Uuid, image: &Path, created: &mut Vec<PathBuf>) -> ImportResult<String> {
        let ext = image
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_else(|| "jpg".to_string());
        let name = format!("{}.{}", id, ext);
        let target = self.dir.join("images").join(&name);
        track_new(&target, created);
        fs::copy(image, &target).map_err(|e| ImportError::io(image, e))?;
        Ok(format!("images/{}", name))
    }

    fn remove_files(&self, paths: &[PathBuf]) {
        for path in paths {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }

    fn persist_index(&self) -> ImportResult<()> {
        let text = serde_json::to_string_pretty(&self.index)?;
        write_file(&self.dir.join(INDEX_FILE), text.as_bytes())
    }
}

fn track_new(path: &Path, created: &mut Vec<PathBuf>) {
    if !path.exists() {
        created.push(path.to_path_buf());
    }
}

/// Write through a temporary file and rename into place
fn write_file(path: &Path, bytes: &[u8]) -> ImportResult<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|e| ImportError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| ImportError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use roastlog::{ingest_str, EngineConfig, RoastLevel};

    fn record(uuid: &str, date: &str, drop_bt: f64) -> RoastRecord {
        let text = format!(
            "{{'roastUUID': '{}', 'title': 'Store test', 'roastisodate': '{}', 'beans': 'Kenya AA', \
             'timex': [0.0, 2.0], 'temp1': [220.0, 215.0], 'temp2': [200.0, 190.0], \
             'computed': {{'DROP_time': 2.0, 'DROP_BT': {:?}}}}}",
            uuid, date, drop_bt
        );
        ingest_str(&text, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RoastStore::open(dir.path()).unwrap();
        let rec = record("a", "2024-01-01", 208.0);

        let outcome = store
            .save(&rec, "a.alog", b"{...}", None, DuplicatePolicy::Skip)
            .unwrap();
        assert!(matches!(outcome, StoreOutcome::Created(_)));
        assert!(dir
            .path()
            .join("records")
            .join(format!("{}.json", outcome.id()))
            .exists());

        let reopened = RoastStore::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        let entry = reopened.get("a").unwrap();
        assert_eq!(entry.id, outcome.id());
        assert_eq!(entry.source_sha256, source_digest(b"{...}"));
        assert_eq!(entry.summary.roast_level, Some(RoastLevel::Medium));
    }

    #[test]
    fn test_duplicate_identifier_policy() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RoastStore::open(dir.path()).unwrap();
        let first = store
            .save(&record("a", "2024-01-01", 208.0), "a.alog", b"1", None, DuplicatePolicy::Skip)
            .unwrap();

        let err = store
            .save(&record("a", "2024-01-02", 190.0), "b.alog", b"2", None, DuplicatePolicy::Skip)
            .unwrap_err();
        assert!(matches!(err, ImportError::DuplicateIdentifier { .. }));
        assert_eq!(store.get("a").unwrap().source_file, "a.alog");

        let updated = store
            .save(&record("a", "2024-01-02", 190.0), "b.alog", b"2", None, DuplicatePolicy::Update)
            .unwrap();
        assert_eq!(updated, StoreOutcome::Updated(first.id()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").unwrap().summary.roast_level, Some(RoastLevel::Light));
    }

    #[test]
    fn test_image_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("photo.JPG");
        fs::write(&image, b"jpeg").unwrap();

        let mut store = RoastStore::open(dir.path().join("store")).unwrap();
        let outcome = store
            .save(&record("a", "2024-01-01", 208.0), "a.alog", b"1", Some(&image), DuplicatePolicy::Skip)
            .unwrap();
        let expected = format!("images/{}.jpg", outcome.id());
        assert_eq!(store.get("a").unwrap().image_file.as_deref(), Some(expected.as_str()));
        assert!(store.dir().join(&expected).exists());
    }

    #[test]
    fn test_failed_save_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RoastStore::open(dir.path().join("store")).unwrap();
        let missing = dir.path().join("missing.jpg");

        let err = store
            .save(&record("a", "2024-01-01", 208.0), "a.alog", b"1", Some(&missing), DuplicatePolicy::Skip)
            .unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));
        assert!(store.is_empty());
        for sub in ["sources", "records", "images"] {
            assert_eq!(fs::read_dir(store.dir().join(sub)).unwrap().count(), 0, "{}", sub);
        }

        let gif = dir.path().join("photo.gif");
        fs::write(&gif, b"gif").unwrap();
        let err = store
            .save(&record("a", "2024-01-01", 208.0), "a.alog", b"1", Some(&gif), DuplicatePolicy::Skip)
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidFileType { .. }));
        assert_eq!(fs::read_dir(store.dir().join("sources")).unwrap().count(), 0);
    }

    #[test]
    fn test_update_replaces_stale_image() {
        let dir = tempfile::tempdir().unwrap();
        let jpg = dir.path().join("photo.jpg");
        let png = dir.path().join("photo.png");
        fs::write(&jpg, b"jpeg").unwrap();
        fs::write(&png, b"png").unwrap();
        let mut store = RoastStore::open(dir.path().join("store")).unwrap();

        let first = store
            .save(&record("a", "2024-01-01", 208.0), "a.alog", b"1", Some(&jpg), DuplicatePolicy::Skip)
            .unwrap();
        store
            .save(&record("a", "2024-01-01", 208.0), "a.alog", b"2", None, DuplicatePolicy::Update)
            .unwrap();
        let kept = format!("images/{}.jpg", first.id());
        assert_eq!(store.get("a").unwrap().image_file.as_deref(), Some(kept.as_str()));

        store
            .save(&record("a", "2024-01-01", 208.0), "a.alog", b"3", Some(&png), DuplicatePolicy::Update)
            .unwrap();
        let replaced = format!("images/{}.png", first.id());
        assert_eq!(store.get("a").unwrap().image_file.as_deref(), Some(replaced.as_str()));
        let images: Vec<String> = fs::read_dir(store.dir().join("images"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(images, vec![format!("{}.png", first.id())]);
    }

    #[test]
    fn test_filtered_summaries_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RoastStore::open(dir.path()).unwrap();
        for (uuid, date, drop) in [("a", "2024-01-01", 208.0), ("b", "2024-03-01", 210.0), ("c", "2024-02-01", 225.0)] {
            store
                .save(&record(uuid, date, drop), "x.alog", b"x", None, DuplicatePolicy::Skip)
                .unwrap();
        }

        let filter = RoastFilter {
            roast_level: Some(RoastLevel::Medium),
            ..Default::default()
        };
        let list: Vec<String> = store.summaries(&filter).into_iter().map(|s| s.roast_uuid).collect();
        assert_eq!(list, vec!["b", "a"]);
        assert_eq!(store.summaries(&RoastFilter::default()).len(), 3);
    }
}
