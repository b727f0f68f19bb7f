//! Common test utilities for zonewarden tests

#![allow(dead_code)] // Not every test file uses every helper

use chrono::NaiveDate;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use zonewarden::clock::FixedClock;
use zonewarden::config::EngineConfig;
use zonewarden::coordinator::ZoneMutationCoordinator;
use zonewarden::error::PersistenceError;
use zonewarden::store::{CommitReceipt, MemoryZoneRepository, ZoneCommit, ZoneRepository};
use zonewarden::zone::{RecordChange, RecordType, ResourceRecord, SoaRecord, Zone, ZoneId};

pub const APEX: &str = "example.com.";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

/// The day the sample zone was last edited
pub fn release_day() -> NaiveDate {
    date(2011, 5, 26)
}

pub fn test_soa(serial: u32) -> SoaRecord {
    SoaRecord {
        mname: "ns1.example.com.".to_string(),
        rname: "hostmaster.example.com.".to_string(),
        serial,
        refresh: 28800,
        retry: 7200,
        expire: 604800,
        minimum: 86400,
        ttl: 86400,
    }
}

pub fn create(name: &str, rtype: RecordType, content: &str) -> RecordChange {
    RecordChange::Create(ResourceRecord::new(name, rtype, content))
}

pub type TestCoordinator<R> = ZoneMutationCoordinator<R, Arc<FixedClock>>;

/// A memory repository holding `example.com.` with the given serial
pub fn create_test_repository(serial: u32) -> (Arc<MemoryZoneRepository>, ZoneId) {
    let repository = Arc::new(MemoryZoneRepository::new());
    let zone = repository
        .create_zone(APEX, test_soa(serial))
        .expect("create test zone");
    (repository, zone.id)
}

/// A coordinator over a fresh repository, with the clock set to
/// [`release_day`]
pub fn create_test_coordinator(
    serial: u32,
) -> (
    TestCoordinator<MemoryZoneRepository>,
    Arc<FixedClock>,
    ZoneId,
) {
    let (repository, zone_id) = create_test_repository(serial);
    let clock = Arc::new(FixedClock::new(release_day()));
    let coordinator =
        ZoneMutationCoordinator::new(repository, clock.clone(), &EngineConfig::default());
    (coordinator, clock, zone_id)
}

/// Repository that lets another writer commit first, `conflicts` times, so
/// the caller's commit hits a stale revision
pub struct RacingRepository {
    pub inner: MemoryZoneRepository,
    conflicts: AtomicU32,
    pub writes: AtomicU32,
}

impl RacingRepository {
    pub fn new(inner: MemoryZoneRepository, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts: AtomicU32::new(conflicts),
            writes: AtomicU32::new(0),
        }
    }

    fn race(&self, zone_id: ZoneId) -> Result<(), PersistenceError> {
        let zone = self.inner.load_zone(zone_id)?;
        self.inner.write_records_and_serial(&ZoneCommit {
            zone_id,
            expected_revision: zone.revision,
            changes: Vec::new(),
            soa: zone.soa.with_serial(zone.serial() + 1),
        })?;
        Ok(())
    }
}

impl ZoneRepository for RacingRepository {
    fn load_zone(&self, zone_id: ZoneId) -> Result<Zone, PersistenceError> {
        self.inner.load_zone(zone_id)
    }

    fn write_records_and_serial(
        &self,
        commit: &ZoneCommit,
    ) -> Result<CommitReceipt, PersistenceError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let pending = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if pending {
            self.race(commit.zone_id)?;
        }
        self.inner.write_records_and_serial(commit)
    }
}

/// Repository whose writes always fail
pub struct UnavailableRepository {
    pub inner: MemoryZoneRepository,
}

impl ZoneRepository for UnavailableRepository {
    fn load_zone(&self, zone_id: ZoneId) -> Result<Zone, PersistenceError> {
        self.inner.load_zone(zone_id)
    }

    fn write_records_and_serial(
        &self,
        _commit: &ZoneCommit,
    ) -> Result<CommitReceipt, PersistenceError> {
        Err(PersistenceError::Unavailable(
            "database connection lost".to_string(),
        ))
    }
}
