use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::DateTime;
use simd_r_drive::storage_engine::DataStore;
use simd_r_drive::storage_engine::traits::{DataStoreReader, DataStoreWriter};
use tracing::debug;

use crate::constants::artifacts::{
    ARTIFACT_PREFIX, BITCODE_PREFIX, DEFAULT_STORE_DIR, DEFAULT_STORE_FILENAME,
    IDENTIFIER_SET_RECORD_VERSION, USER_SAMPLE_RECORD_VERSION,
};
use crate::errors::JoinError;
use crate::types::{IdentifierSet, JoinKey, UserId};
use crate::validation::{SampleEntry, UserSample};

/// Opaque name-keyed persistence for expensive single-pass results.
///
/// The core only caches computed objects here (identifier sets, user
/// samples) so a full-stream pass is paid for once; it does not depend on
/// the storage format beyond its own payload encoding.
pub trait ArtifactStore: Send + Sync {
    /// Persist `payload` under `name`, replacing any previous value.
    fn put(&self, name: &str, payload: &[u8]) -> Result<(), JoinError>;
    /// Fetch the payload stored under `name`, if any.
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, JoinError>;
}

/// File-backed artifact store for persistent runs.
pub struct DriveArtifactStore {
    store: DataStore,
}

impl DriveArtifactStore {
    /// Open (or create) a file-backed artifact store at `path`.
    ///
    /// A directory path is coerced to the default store filename inside it.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, JoinError> {
        let path = coerce_store_path(path.into());
        ensure_parent_dir(&path)?;
        let store = DataStore::open(path.as_path()).map_err(map_store_err)?;
        Ok(Self { store })
    }

    /// Default artifact-store file path under the default store directory.
    pub fn default_path() -> PathBuf {
        Path::new(DEFAULT_STORE_DIR).join(DEFAULT_STORE_FILENAME)
    }
}

impl ArtifactStore for DriveArtifactStore {
    fn put(&self, name: &str, payload: &[u8]) -> Result<(), JoinError> {
        self.store
            .write(&artifact_key(name), payload)
            .map_err(map_store_err)?;
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, JoinError> {
        self.store
            .read(&artifact_key(name))
            .map_err(map_store_err)?
            .map(|entry| Ok(entry.as_ref().to_vec()))
            .transpose()
    }
}

/// In-memory artifact store for tests and single-run pipelines.
#[derive(Default)]
pub struct MemoryArtifactStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, name: &str, payload: &[u8]) -> Result<(), JoinError> {
        self.entries
            .write()
            .map_err(|_| JoinError::ArtifactStore("lock poisoned".into()))?
            .insert(name.to_string(), payload.to_vec());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<Vec<u8>>, JoinError> {
        Ok(self
            .entries
            .read()
            .map_err(|_| JoinError::ArtifactStore("lock poisoned".into()))?
            .get(name)
            .cloned())
    }
}

/// Persist an identifier set under `name`.
///
/// Keys are sorted before encoding so payloads are byte-stable across runs.
pub fn put_identifier_set(
    store: &dyn ArtifactStore,
    name: &str,
    ids: &IdentifierSet,
) -> Result<(), JoinError> {
    let mut sorted: Vec<JoinKey> = ids.iter().copied().collect();
    sorted.sort_unstable();
    let payload = encode_payload(IDENTIFIER_SET_RECORD_VERSION, &bitcode::encode(&sorted));
    store.put(name, &payload)
}

/// Fetch the identifier set stored under `name`, if present.
pub fn get_identifier_set(
    store: &dyn ArtifactStore,
    name: &str,
) -> Result<Option<IdentifierSet>, JoinError> {
    let Some(bytes) = store.get(name)? else {
        return Ok(None);
    };
    let raw = decode_payload(IDENTIFIER_SET_RECORD_VERSION, &bytes)?;
    let sorted: Vec<JoinKey> = bitcode::decode(&raw)
        .map_err(|err| JoinError::ArtifactStore(format!("corrupt identifier set record: {err}")))?;
    Ok(Some(sorted.into_iter().collect()))
}

/// Return the identifier set cached under `name`, building and persisting
/// it on a miss.
pub fn cached_identifier_set(
    store: &dyn ArtifactStore,
    name: &str,
    build: impl FnOnce() -> Result<IdentifierSet, JoinError>,
) -> Result<IdentifierSet, JoinError> {
    if let Some(ids) = get_identifier_set(store, name)? {
        debug!(name, size = ids.len(), "identifier set artifact hit");
        return Ok(ids);
    }
    let ids = build()?;
    put_identifier_set(store, name, &ids)?;
    debug!(name, size = ids.len(), "identifier set artifact built");
    Ok(ids)
}

/// Persist a user sample under `name`.
pub fn put_user_sample(
    store: &dyn ArtifactStore,
    name: &str,
    sample: &UserSample,
) -> Result<(), JoinError> {
    let rows: Vec<(JoinKey, UserId, i64)> = sample
        .iter()
        .map(|(&key, entry)| {
            (
                key,
                entry.user_id,
                entry.searched_at.and_utc().timestamp_micros(),
            )
        })
        .collect();
    let payload = encode_payload(USER_SAMPLE_RECORD_VERSION, &bitcode::encode(&rows));
    store.put(name, &payload)
}

/// Fetch the user sample stored under `name`, if present.
pub fn get_user_sample(
    store: &dyn ArtifactStore,
    name: &str,
) -> Result<Option<UserSample>, JoinError> {
    let Some(bytes) = store.get(name)? else {
        return Ok(None);
    };
    let raw = decode_payload(USER_SAMPLE_RECORD_VERSION, &bytes)?;
    let rows: Vec<(JoinKey, UserId, i64)> = bitcode::decode(&raw)
        .map_err(|err| JoinError::ArtifactStore(format!("corrupt user sample record: {err}")))?;
    let mut sample = UserSample::new();
    for (key, user_id, micros) in rows {
        let searched_at = DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| {
                JoinError::ArtifactStore(format!("corrupt user sample timestamp {micros}"))
            })?
            .naive_utc();
        sample.insert(key, SampleEntry {
            user_id,
            searched_at,
        });
    }
    Ok(Some(sample))
}

fn artifact_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(ARTIFACT_PREFIX.len() + name.len());
    key.extend_from_slice(ARTIFACT_PREFIX);
    key.extend_from_slice(name.as_bytes());
    key
}

fn encode_payload(version: u8, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + bytes.len());
    out.push(version);
    out.push(BITCODE_PREFIX);
    out.extend_from_slice(bytes);
    out
}

fn decode_payload(version: u8, bytes: &[u8]) -> Result<Vec<u8>, JoinError> {
    if bytes.first().copied() != Some(version) {
        return Err(JoinError::ArtifactStore(
            "artifact record version mismatch".into(),
        ));
    }
    if bytes.get(1).copied() != Some(BITCODE_PREFIX) {
        return Err(JoinError::ArtifactStore(
            "artifact payload missing expected prefix".into(),
        ));
    }
    Ok(bytes[2..].to_vec())
}

fn coerce_store_path(path: PathBuf) -> PathBuf {
    if path.is_dir() {
        return path.join(DEFAULT_STORE_FILENAME);
    }
    path
}

fn ensure_parent_dir(path: &Path) -> Result<(), JoinError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn map_store_err(err: io::Error) -> JoinError {
    JoinError::ArtifactStore(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::Cell;
    use tempfile::tempdir;

    fn ids(keys: &[JoinKey]) -> IdentifierSet {
        keys.iter().copied().collect()
    }

    #[test]
    fn memory_store_round_trips_identifier_sets() {
        let store = MemoryArtifactStore::new();
        let original = ids(&[5, 1, 9]);
        put_identifier_set(&store, "validation_ids", &original).unwrap();
        let loaded = get_identifier_set(&store, "validation_ids").unwrap().unwrap();
        assert_eq!(loaded, original);
        assert!(get_identifier_set(&store, "other").unwrap().is_none());
    }

    #[test]
    fn drive_store_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("artifacts.bin");
        let original = ids(&[3, 7]);
        {
            let store = DriveArtifactStore::open(&path).unwrap();
            put_identifier_set(&store, "validation_ids", &original).unwrap();
        }
        let store = DriveArtifactStore::open(&path).unwrap();
        let loaded = get_identifier_set(&store, "validation_ids").unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn drive_store_accepts_directory_paths() {
        let dir = tempdir().unwrap();
        let store = DriveArtifactStore::open(dir.path()).unwrap();
        store.put("probe", b"x").unwrap();
        assert!(dir.path().join(DEFAULT_STORE_FILENAME).is_file());
    }

    #[test]
    fn cached_identifier_set_builds_only_on_miss() {
        let store = MemoryArtifactStore::new();
        let builds = Cell::new(0u32);
        let build = || {
            builds.set(builds.get() + 1);
            Ok(ids(&[2, 4]))
        };
        let first = cached_identifier_set(&store, "validation_ids", build).unwrap();
        assert_eq!(builds.get(), 1);

        let second = cached_identifier_set(&store, "validation_ids", || {
            builds.set(builds.get() + 1);
            Ok(ids(&[99]))
        })
        .unwrap();
        assert_eq!(builds.get(), 1, "cache hit must not rebuild");
        assert_eq!(first, second);
    }

    #[test]
    fn corrupt_payloads_are_rejected() {
        let store = MemoryArtifactStore::new();
        store.put("validation_ids", &[0xFF, 0xFF]).unwrap();
        let err = get_identifier_set(&store, "validation_ids").unwrap_err();
        assert!(matches!(
            err,
            JoinError::ArtifactStore(msg) if msg.contains("version mismatch")
        ));

        store
            .put("validation_ids", &[IDENTIFIER_SET_RECORD_VERSION, 0x00])
            .unwrap();
        let err = get_identifier_set(&store, "validation_ids").unwrap_err();
        assert!(matches!(
            err,
            JoinError::ArtifactStore(msg) if msg.contains("missing expected prefix")
        ));
    }

    #[test]
    fn user_samples_round_trip_with_timestamps() {
        let store = MemoryArtifactStore::new();
        let searched_at = NaiveDate::from_ymd_opt(2015, 5, 12)
            .unwrap()
            .and_hms_opt(9, 30, 15)
            .unwrap();
        let mut sample = UserSample::new();
        sample.insert(11, SampleEntry {
            user_id: 7,
            searched_at,
        });
        put_user_sample(&store, "user_sample", &sample).unwrap();
        let loaded = get_user_sample(&store, "user_sample").unwrap().unwrap();
        assert_eq!(loaded, sample);
    }

    #[test]
    fn default_path_uses_the_store_directory() {
        let path = DriveArtifactStore::default_path();
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some(DEFAULT_STORE_FILENAME)
        );
        assert!(path.starts_with(DEFAULT_STORE_DIR));
    }
}
