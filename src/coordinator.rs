//! Zone mutation coordinator
//!
//! Every mutation moves through the same states:
//!
//! ```text
//! Pending -> Validated -> SerialComputed -> Committed
//!    |           |              |
//!    +-----------+-> Rejected   +-> RolledBack
//! ```
//!
//! Record changes and the recomputed SOA serial are handed to the repository
//! as one [`ZoneCommit`], so a committed mutation always carries exactly one
//! serial bump however many records it touched.

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{
    MutationError, MutationFailure, PersistenceError, RecordField, Result, SerialError,
    ValidationError, ValidationErrorKind,
};
use crate::serial::{self, serial_gt};
use crate::store::{CommitReceipt, ZoneCommit, ZoneRepository};
use crate::validation::{RecordValidator, zone_rules};
use crate::zone::{
    AppliedChange, RecordChange, RecordId, RecordType, ResourceRecord, SoaRecord, StagedChange,
    StoredRecord, Zone, ZoneId,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle state of a mutation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStage {
    Pending,
    Validated,
    SerialComputed,
    Committed,
    Rejected,
    RolledBack,
}

impl fmt::Display for MutationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationStage::Pending => "pending",
            MutationStage::Validated => "validated",
            MutationStage::SerialComputed => "serial computed",
            MutationStage::Committed => "committed",
            MutationStage::Rejected => "rejected",
            MutationStage::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

/// Who asked for a mutation; used for logging only
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub requester: Option<String>,
    pub client_addr: Option<IpAddr>,
}

impl RequestContext {
    pub fn new(requester: impl Into<String>) -> Self {
        Self {
            requester: Some(requester.into()),
            client_addr: None,
        }
    }

    pub fn with_client_addr(mut self, addr: IpAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.requester.as_deref().unwrap_or("anonymous"))?;
        if let Some(addr) = self.client_addr {
            write!(f, "@{}", addr)?;
        }
        Ok(())
    }
}

/// What a committed mutation did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub zone_id: ZoneId,
    pub previous_serial: u32,
    pub serial: u32,
    /// Store revision of the zone after the commit
    pub revision: u64,
    pub created: Vec<StoredRecord>,
    pub updated: Vec<StoredRecord>,
    pub deleted: Vec<RecordId>,
    /// Commit attempts, including retries after concurrent writes
    pub attempts: u32,
}

/// Changes ready to commit, plus the SOA an `UpdateSoa` asked for
struct StagedBatch {
    changes: Vec<StagedChange>,
    submitted_soa: Option<SoaRecord>,
}

/// Validates record changes, recomputes the SOA serial and commits both as
/// one unit. Mutations of the same zone are serialized.
pub struct ZoneMutationCoordinator<R, C> {
    repository: Arc<R>,
    clock: C,
    validator: RecordValidator,
    locks: DashMap<ZoneId, Arc<Mutex<()>>>,
    max_commit_retries: u32,
}

impl<R: ZoneRepository, C: Clock> ZoneMutationCoordinator<R, C> {
    pub fn new(repository: Arc<R>, clock: C, config: &EngineConfig) -> Self {
        Self {
            repository,
            clock,
            validator: RecordValidator::new(config.validator_config()),
            locks: DashMap::new(),
            max_commit_retries: config.max_commit_retries,
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn validator(&self) -> &RecordValidator {
        &self.validator
    }

    /// Apply a single record change
    pub fn apply_mutation(
        &self,
        zone_id: ZoneId,
        change: RecordChange,
        ctx: &RequestContext,
    ) -> Result<MutationOutcome> {
        self.apply_batch(zone_id, std::slice::from_ref(&change), ctx)
    }

    /// Bump the serial without touching any record
    pub fn bump_serial(&self, zone_id: ZoneId, ctx: &RequestContext) -> Result<MutationOutcome> {
        self.apply_batch(zone_id, &[], ctx)
    }

    /// Apply several changes as one mutation with a single serial bump.
    /// Either all of them are committed or none is.
    pub fn apply_batch(
        &self,
        zone_id: ZoneId,
        changes: &[RecordChange],
        ctx: &RequestContext,
    ) -> Result<MutationOutcome> {
        let lock = self.zone_lock(zone_id);
        let result = {
            let _guard = lock.lock();
            self.apply_locked(zone_id, changes, ctx)
        };
        drop(lock);

        if let Err(MutationError {
            cause: MutationFailure::Persistence(PersistenceError::ZoneNotFound(_)),
            ..
        }) = &result
        {
            // Only drop the entry if no other caller holds the lock
            self.locks
                .remove_if(&zone_id, |_, lock| Arc::strong_count(lock) == 1);
        }
        result
    }

    fn apply_locked(
        &self,
        zone_id: ZoneId,
        changes: &[RecordChange],
        ctx: &RequestContext,
    ) -> Result<MutationOutcome> {
        debug!(
            "Mutation of zone {} by {}: {} changes [{}]",
            zone_id,
            ctx,
            changes.len(),
            changes
                .iter()
                .map(RecordChange::kind)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut attempts = 0;
        loop {
            attempts += 1;

            let zone = self
                .repository
                .load_zone(zone_id)
                .map_err(|e| reject(zone_id, MutationStage::Pending, e))?;

            let staged = self
                .stage(&zone, changes)
                .map_err(|e| reject(zone_id, MutationStage::Pending, e))?;
            transition(zone_id, MutationStage::Pending, MutationStage::Validated);

            let soa = self
                .next_soa(&zone, staged.submitted_soa)
                .map_err(|e| reject(zone_id, MutationStage::Validated, e))?;
            transition(zone_id, MutationStage::Validated, MutationStage::SerialComputed);

            let commit = ZoneCommit {
                zone_id,
                expected_revision: zone.revision,
                changes: staged.changes,
                soa,
            };

            match self.repository.write_records_and_serial(&commit) {
                Ok(receipt) => {
                    transition(zone_id, MutationStage::SerialComputed, MutationStage::Committed);
                    info!(
                        "Zone {} ({}) committed by {}: serial {} -> {}, {} changes, revision {}",
                        zone.apex,
                        zone_id,
                        ctx,
                        zone.serial(),
                        receipt.serial,
                        receipt.applied.len(),
                        receipt.revision
                    );
                    return Ok(outcome(zone.serial(), receipt, attempts));
                }
                Err(e) if e.is_conflict() && attempts <= self.max_commit_retries => {
                    warn!(
                        "Zone {} changed during mutation (attempt {}/{}): {}",
                        zone_id,
                        attempts,
                        self.max_commit_retries + 1,
                        e
                    );
                }
                Err(e) => {
                    let error = MutationError::new(zone_id, MutationStage::SerialComputed, e);
                    warn!("{} ({})", error, error.terminal_state());
                    return Err(error);
                }
            }
        }
    }

    fn zone_lock(&self, zone_id: ZoneId) -> Arc<Mutex<()>> {
        self.locks.entry(zone_id).or_default().value().clone()
    }

    /// Validate every change against the zone, applying each to a working
    /// copy so later changes see the earlier ones
    fn stage(
        &self,
        zone: &Zone,
        changes: &[RecordChange],
    ) -> std::result::Result<StagedBatch, ValidationError> {
        let mut working = zone.clone();
        let mut batch = StagedBatch {
            changes: Vec::with_capacity(changes.len()),
            submitted_soa: None,
        };

        for change in changes {
            let staged = match change {
                RecordChange::Create(record) => {
                    StagedChange::Insert(self.validator.validate(record, &zone.apex)?)
                }
                RecordChange::Update { id, record } => StagedChange::Replace {
                    id: *id,
                    record: self.validator.validate(record, &zone.apex)?,
                },
                RecordChange::Delete { id } => StagedChange::Remove { id: *id },
                RecordChange::UpdateSoa(_) if batch.submitted_soa.is_some() => {
                    return Err(ValidationError::new(
                        ValidationErrorKind::ExtraField,
                        RecordField::Type,
                        "only one SOA update is allowed per mutation",
                    ));
                }
                RecordChange::UpdateSoa(record) => {
                    batch.submitted_soa = Some(self.stage_soa(record, &zone.apex)?);
                    continue;
                }
            };

            zone_rules::check(&working, &staged)?;
            if working.apply(&staged).is_none() {
                return Err(ValidationError::new(
                    ValidationErrorKind::RecordNotFound,
                    RecordField::Id,
                    "record disappeared while staging",
                ));
            }
            batch.changes.push(staged);
        }

        Ok(batch)
    }

    fn stage_soa(
        &self,
        record: &ResourceRecord,
        apex: &str,
    ) -> std::result::Result<SoaRecord, ValidationError> {
        if record.rtype != RecordType::SOA {
            return Err(ValidationError::new(
                ValidationErrorKind::UnsupportedType,
                RecordField::Type,
                format!("expected an SOA record, got {}", record.rtype),
            ));
        }
        let normalized = self.validator.validate(record, apex)?;
        SoaRecord::from_normalized(&normalized).ok_or_else(|| {
            ValidationError::value(
                ValidationErrorKind::MissingField,
                "SOA content must have seven fields",
            )
        })
    }

    /// The SOA to commit: the stored one (or the submitted replacement) with
    /// the next serial
    fn next_soa(
        &self,
        zone: &Zone,
        submitted: Option<SoaRecord>,
    ) -> std::result::Result<SoaRecord, SerialError> {
        let current = zone.serial();
        let computed = serial::next_serial(current, self.clock.today());

        let Some(submitted) = submitted else {
            return Ok(zone.soa.with_serial(computed?));
        };

        // A submitted serial only wins if it moves the zone further ahead
        let serial = match computed {
            Ok(next) if serial_gt(submitted.serial, next) => submitted.serial,
            Ok(next) => next,
            Err(_) if serial_gt(submitted.serial, current) => submitted.serial,
            Err(e) => return Err(e),
        };
        Ok(submitted.with_serial(serial))
    }
}

fn reject(
    zone_id: ZoneId,
    stage: MutationStage,
    cause: impl Into<MutationFailure>,
) -> MutationError {
    let error = MutationError::new(zone_id, stage, cause);
    debug!("Zone {} mutation {}: {}", zone_id, error.terminal_state(), error);
    error
}

fn transition(zone_id: ZoneId, from: MutationStage, to: MutationStage) {
    debug!("Zone {} mutation {} -> {}", zone_id, from, to);
}

fn outcome(previous_serial: u32, receipt: CommitReceipt, attempts: u32) -> MutationOutcome {
    let mut result = MutationOutcome {
        zone_id: receipt.zone_id,
        previous_serial,
        serial: receipt.serial,
        revision: receipt.revision,
        created: Vec::new(),
        updated: Vec::new(),
        deleted: Vec::new(),
        attempts,
    };
    for applied in receipt.applied {
        match applied {
            AppliedChange::Created(record) => result.created.push(record),
            AppliedChange::Updated(record) => result.updated.push(record),
            AppliedChange::Deleted(record) => result.deleted.push(record.id),
        }
    }
    result
}
