use super::{CommitReceipt, ZoneCommit, ZoneRepository};
use crate::error::{MutationFailure, PersistenceError, ValidationError, ValidationErrorKind};
use crate::zone::{SoaRecord, StagedChange, Zone, ZoneId};
use fs4::fs_std::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug)]
struct StoreState {
    zones: HashMap<ZoneId, Zone>,
    next_zone_id: u64,
}

/// On-disk form of the whole store
#[derive(Debug, Serialize, Deserialize)]
struct StoreSnapshot {
    version: u32,
    next_zone_id: u64,
    zones: Vec<Zone>,
}

/// Zone repository held in memory, optionally mirrored to a JSON file after
/// every write.
///
/// Several repositories, in one process or many, may share a snapshot file.
/// Writes take an exclusive lock on `<file>.lock` and reload the file before
/// checking revisions, so a commit based on stale state fails with
/// [`PersistenceError::Conflict`] instead of overwriting a newer one.
pub struct MemoryZoneRepository {
    state: Arc<RwLock<StoreState>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryZoneRepository {
    /// Create an empty, memory-only repository
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState {
                zones: HashMap::new(),
                next_zone_id: 1,
            })),
            snapshot_path: None,
        }
    }

    /// Mirror every committed write to `path`
    pub fn with_snapshot_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Load the snapshot at `path` if it exists, else start empty; writes
    /// are mirrored back to `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_json(path)
        } else {
            debug!(
                "Store file {} does not exist, starting with an empty store",
                path.display()
            );
            Ok(Self::new().with_snapshot_file(path))
        }
    }

    /// Load a repository from a JSON snapshot; writes are mirrored back to it
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let state = read_snapshot(path)?;
        info!("Loaded {} zones from {}", state.zones.len(), path.display());

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            snapshot_path: Some(path.to_path_buf()),
        })
    }

    /// Write the whole store to `path` atomically
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let state = self.state.read();
        write_snapshot(path.as_ref(), &state)
    }

    /// Create a zone with an empty record set
    pub fn create_zone(&self, apex: &str, soa: SoaRecord) -> Result<Zone, MutationFailure> {
        let _file_lock = self.lock_snapshot()?;
        let mut state = self.state.write();
        self.refresh(&mut state)?;
        let id = ZoneId(state.next_zone_id);
        let zone = Zone::new(id, apex, soa)?;

        if state.zones.values().any(|z| z.apex == zone.apex) {
            return Err(ValidationError::name(
                ValidationErrorKind::DuplicateZone,
                format!("zone {} already exists", zone.apex),
            )
            .into());
        }

        state.zones.insert(id, zone.clone());
        state.next_zone_id += 1;
        if let Err(e) = self.persist(&state) {
            state.zones.remove(&id);
            state.next_zone_id -= 1;
            return Err(e.into());
        }

        info!("Created zone {} ({}) with serial {}", zone.apex, id, zone.serial());
        Ok(zone)
    }

    /// Find a zone by apex name
    pub fn find_zone(&self, apex: &str) -> Option<Zone> {
        let apex = crate::zone::name::canonical(apex);
        let state = self.state.read();
        state.zones.values().find(|z| z.apex == apex).cloned()
    }

    /// Ids and apexes of all zones, ordered by id
    pub fn list_zones(&self) -> Vec<(ZoneId, String)> {
        let state = self.state.read();
        let mut zones: Vec<_> = state
            .zones
            .values()
            .map(|z| (z.id, z.apex.clone()))
            .collect();
        zones.sort();
        zones
    }

    pub fn zone_count(&self) -> usize {
        self.state.read().zones.len()
    }

    /// Copies of all zones, ordered by id
    pub fn snapshot(&self) -> Vec<Zone> {
        let state = self.state.read();
        let mut zones: Vec<Zone> = state.zones.values().cloned().collect();
        zones.sort_by_key(|z| z.id);
        zones
    }

    /// Take the exclusive cross-process lock guarding the snapshot file.
    /// It is released when the returned file is dropped.
    fn lock_snapshot(&self) -> Result<Option<File>, PersistenceError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(None);
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut lock_path = path.as_os_str().to_owned();
        lock_path.push(".lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;
        file.lock_exclusive()?;
        Ok(Some(file))
    }

    /// Replace the in-memory state with the snapshot file, which another
    /// repository may have written since we last looked
    fn refresh(&self, state: &mut StoreState) -> Result<(), PersistenceError> {
        match &self.snapshot_path {
            Some(path) if path.is_file() => {
                *state = read_snapshot(path)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn persist(&self, state: &StoreState) -> Result<(), PersistenceError> {
        match &self.snapshot_path {
            Some(path) => write_snapshot(path, state),
            None => Ok(()),
        }
    }
}

impl Default for MemoryZoneRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ZoneRepository for MemoryZoneRepository {
    fn load_zone(&self, zone_id: ZoneId) -> Result<Zone, PersistenceError> {
        let state = self.state.read();
        state
            .zones
            .get(&zone_id)
            .cloned()
            .ok_or(PersistenceError::ZoneNotFound(zone_id))
    }

    fn read_soa_serial(&self, zone_id: ZoneId) -> Result<u32, PersistenceError> {
        let state = self.state.read();
        state
            .zones
            .get(&zone_id)
            .map(Zone::serial)
            .ok_or(PersistenceError::ZoneNotFound(zone_id))
    }

    fn write_records_and_serial(
        &self,
        commit: &ZoneCommit,
    ) -> Result<CommitReceipt, PersistenceError> {
        let _file_lock = self.lock_snapshot()?;
        let mut state = self.state.write();
        self.refresh(&mut state)?;
        let current = state
            .zones
            .get(&commit.zone_id)
            .ok_or(PersistenceError::ZoneNotFound(commit.zone_id))?;

        if current.revision != commit.expected_revision {
            return Err(PersistenceError::Conflict {
                zone_id: commit.zone_id,
                expected: commit.expected_revision,
                found: current.revision,
            });
        }

        // Work on a copy so a failed write leaves the stored zone untouched
        let mut updated = current.clone();
        let mut applied = Vec::with_capacity(commit.changes.len());
        for change in &commit.changes {
            let effect = updated.apply(change).ok_or_else(|| match change {
                StagedChange::Replace { id, .. }
                | StagedChange::Remove { id } => PersistenceError::MissingRecord {
                    zone_id: commit.zone_id,
                    record_id: *id,
                },
                StagedChange::Insert(_) => {
                    PersistenceError::Unavailable("insert was not applied".to_string())
                }
            })?;
            applied.push(effect);
        }
        updated.soa = commit.soa.clone();
        updated.revision += 1;

        let previous = state.zones.insert(commit.zone_id, updated);
        if let Err(e) = self.persist(&state) {
            warn!("Failed to persist zone {}: {}", commit.zone_id, e);
            if let Some(previous) = previous {
                state.zones.insert(commit.zone_id, previous);
            }
            return Err(e);
        }

        let revision = commit.expected_revision + 1;
        debug!(
            "Zone {} committed {} changes at revision {} (serial {})",
            commit.zone_id,
            applied.len(),
            revision,
            commit.soa.serial
        );

        Ok(CommitReceipt {
            zone_id: commit.zone_id,
            revision,
            serial: commit.soa.serial,
            applied,
        })
    }
}

fn read_snapshot(path: &Path) -> Result<StoreState, PersistenceError> {
    let data = std::fs::read(path)?;
    let snapshot: StoreSnapshot = serde_json::from_slice(&data)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(PersistenceError::Serialization(format!(
            "unsupported snapshot version {}",
            snapshot.version
        )));
    }

    let mut state = StoreState {
        zones: HashMap::with_capacity(snapshot.zones.len()),
        next_zone_id: snapshot.next_zone_id,
    };
    for zone in snapshot.zones {
        state.next_zone_id = state.next_zone_id.max(zone.id.0 + 1);
        state.zones.insert(zone.id, zone);
    }
    debug!("Read {} zones from {} ({} bytes)", state.zones.len(), path.display(), data.len());
    Ok(state)
}

fn write_snapshot(path: &Path, state: &StoreState) -> Result<(), PersistenceError> {
    let mut zones: Vec<&Zone> = state.zones.values().collect();
    zones.sort_by_key(|z| z.id);

    #[derive(Serialize)]
    struct SnapshotRef<'a> {
        version: u32,
        next_zone_id: u64,
        zones: Vec<&'a Zone>,
    }

    let data = serde_json::to_vec_pretty(&SnapshotRef {
        version: SNAPSHOT_VERSION,
        next_zone_id: state.next_zone_id,
        zones,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    // Write to temporary file first, then rename for atomic operation
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    std::fs::write(&temp_path, &data)?;
    std::fs::rename(&temp_path, path)?;

    debug!("Saved store to {} ({} bytes)", path.display(), data.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::{NormalizedRecord, RecordId, RecordType};

    fn soa(serial: u32) -> SoaRecord {
        SoaRecord {
            mname: "ns1.example.com.".to_string(),
            rname: "hostmaster.example.com.".to_string(),
            serial,
            refresh: 3600,
            retry: 900,
            expire: 604800,
            minimum: 300,
            ttl: 3600,
        }
    }

    fn insert(owner: &str) -> StagedChange {
        StagedChange::Insert(NormalizedRecord {
            name: owner.to_string(),
            rtype: RecordType::A,
            content: "192.0.2.1".to_string(),
            ttl: 300,
            priority: None,
        })
    }

    #[test]
    fn test_create_and_find() {
        let repo = MemoryZoneRepository::new();
        let zone = repo.create_zone("Example.com", soa(1)).unwrap();
        assert_eq!(zone.id, ZoneId(1));
        assert_eq!(repo.find_zone("example.com").unwrap().id, zone.id);

        let second = repo.create_zone("example.org.", soa(1)).unwrap();
        assert_eq!(second.id, ZoneId(2));
        assert_eq!(
            repo.list_zones(),
            vec![
                (ZoneId(1), "example.com.".to_string()),
                (ZoneId(2), "example.org.".to_string())
            ]
        );

        let err = repo.create_zone("example.com.", soa(1)).unwrap_err();
        assert!(matches!(
            err,
            MutationFailure::Validation(ref e) if e.kind == ValidationErrorKind::DuplicateZone
        ));
        assert_eq!(repo.zone_count(), 2);
    }

    #[test]
    fn test_commit_checks_revision() {
        let repo = MemoryZoneRepository::new();
        let zone = repo.create_zone("example.com", soa(5)).unwrap();

        let commit = ZoneCommit {
            zone_id: zone.id,
            expected_revision: 0,
            changes: vec![insert("www.example.com.")],
            soa: soa(6),
        };
        let receipt = repo.write_records_and_serial(&commit).unwrap();
        assert_eq!(receipt.revision, 1);
        assert_eq!(receipt.serial, 6);
        assert_eq!(receipt.applied.len(), 1);
        assert_eq!(repo.read_soa_serial(zone.id).unwrap(), 6);

        // Replaying the same commit is stale now
        let err = repo.write_records_and_serial(&commit).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(repo.load_zone(zone.id).unwrap().record_count(), 1);
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let repo = MemoryZoneRepository::new();
        let zone = repo.create_zone("example.com", soa(5)).unwrap();

        let commit = ZoneCommit {
            zone_id: zone.id,
            expected_revision: 0,
            changes: vec![insert("www.example.com."), StagedChange::Remove { id: RecordId(42) }],
            soa: soa(6),
        };
        let err = repo.write_records_and_serial(&commit).unwrap_err();
        assert!(matches!(err, PersistenceError::MissingRecord { .. }));

        let stored = repo.load_zone(zone.id).unwrap();
        assert_eq!(stored.record_count(), 0);
        assert_eq!(stored.serial(), 5);
        assert_eq!(stored.revision, 0);
    }

    #[test]
    fn test_unknown_zone() {
        let repo = MemoryZoneRepository::new();
        assert_eq!(
            repo.load_zone(ZoneId(9)).unwrap_err(),
            PersistenceError::ZoneNotFound(ZoneId(9))
        );
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.json");

        let repo = MemoryZoneRepository::open(&path).unwrap();
        let zone = repo.create_zone("example.com", soa(2024010100)).unwrap();
        repo.write_records_and_serial(&ZoneCommit {
            zone_id: zone.id,
            expected_revision: 0,
            changes: vec![insert("www.example.com.")],
            soa: soa(2024010101),
        })
        .unwrap();
        assert!(path.exists());

        let reopened = MemoryZoneRepository::load_json(&path).unwrap();
        assert_eq!(reopened.snapshot(), repo.snapshot());
        let next = reopened.create_zone("example.net", soa(1)).unwrap();
        assert_eq!(next.id, ZoneId(2));
    }

    #[test]
    fn test_failed_snapshot_write_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let repo = MemoryZoneRepository::new();
        let zone = repo.create_zone("example.com", soa(7)).unwrap();

        // A directory where the snapshot file should be makes the rename fail
        let blocked = dir.path().join("blocked");
        std::fs::create_dir_all(blocked.join("child")).unwrap();
        let repo = MemoryZoneRepository {
            state: repo.state.clone(),
            snapshot_path: Some(blocked),
        };

        let err = repo
            .write_records_and_serial(&ZoneCommit {
                zone_id: zone.id,
                expected_revision: 0,
                changes: vec![insert("www.example.com.")],
                soa: soa(8),
            })
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Io(_)));

        let stored = repo.load_zone(zone.id).unwrap();
        assert_eq!(stored.serial(), 7);
        assert_eq!(stored.revision, 0);
    }

    #[test]
    fn test_shared_file_rejects_stale_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.json");

        let first = MemoryZoneRepository::open(&path).unwrap();
        let zone = first.create_zone("example.com", soa(1)).unwrap();
        let second = MemoryZoneRepository::open(&path).unwrap();

        first
            .write_records_and_serial(&ZoneCommit {
                zone_id: zone.id,
                expected_revision: 0,
                changes: vec![insert("a.example.com.")],
                soa: soa(2),
            })
            .unwrap();

        // The second handle still holds revision 0 in memory
        assert_eq!(second.load_zone(zone.id).unwrap().revision, 0);
        let err = second
            .write_records_and_serial(&ZoneCommit {
                zone_id: zone.id,
                expected_revision: 0,
                changes: vec![insert("b.example.com.")],
                soa: soa(2),
            })
            .unwrap_err();
        assert!(err.is_conflict());

        // The failed commit picked up the other handle's write
        let refreshed = second.load_zone(zone.id).unwrap();
        assert_eq!(refreshed.revision, 1);
        assert_eq!(refreshed.serial(), 2);

        let other = second.create_zone("example.net", soa(1)).unwrap();
        assert_eq!(other.id, ZoneId(2));
    }
}
