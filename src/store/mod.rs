//! Persistence boundary of the engine

mod memory;

pub use memory::MemoryZoneRepository;

use crate::error::PersistenceError;
use crate::zone::{AppliedChange, SoaRecord, StagedChange, Zone, ZoneId};

/// Storage the coordinator commits zone mutations to.
///
/// Implementations must apply a [`ZoneCommit`] atomically: either every
/// change and the new SOA become visible together, or nothing does.
pub trait ZoneRepository: Send + Sync {
    /// Read a consistent snapshot of a zone
    fn load_zone(&self, zone_id: ZoneId) -> Result<Zone, PersistenceError>;

    /// Read only the current SOA serial
    fn read_soa_serial(&self, zone_id: ZoneId) -> Result<u32, PersistenceError> {
        self.load_zone(zone_id).map(|zone| zone.serial())
    }

    /// Apply record changes and the new SOA as one unit. Fails with
    /// [`PersistenceError::Conflict`] if the zone's revision is no longer
    /// `commit.expected_revision`.
    fn write_records_and_serial(&self, commit: &ZoneCommit)
    -> Result<CommitReceipt, PersistenceError>;
}

/// Everything a single mutation writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneCommit {
    pub zone_id: ZoneId,
    /// Revision of the snapshot the changes were validated against
    pub expected_revision: u64,
    pub changes: Vec<StagedChange>,
    pub soa: SoaRecord,
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub zone_id: ZoneId,
    /// Revision of the zone after the commit
    pub revision: u64,
    pub serial: u32,
    pub applied: Vec<AppliedChange>,
}
