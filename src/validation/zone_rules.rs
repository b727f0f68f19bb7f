//! Checks that need the zone a change is applied to

use crate::error::{RecordField, ValidationError, ValidationErrorKind};
use crate::zone::{NormalizedRecord, RecordId, RecordType, StagedChange, StoredRecord, Zone};

/// Check a staged change against the zone it will be applied to.
///
/// `zone` must already reflect the earlier changes of the same batch.
pub fn check(zone: &Zone, change: &StagedChange) -> Result<(), ValidationError> {
    match change {
        StagedChange::Insert(record) => check_record(zone, record, None),
        StagedChange::Replace { id, record } => {
            require_existing(zone, *id)?;
            check_record(zone, record, Some(*id))
        }
        StagedChange::Remove { id } => require_existing(zone, *id).map(|_| ()),
    }
}

fn require_existing(zone: &Zone, id: RecordId) -> Result<&StoredRecord, ValidationError> {
    zone.record(id).ok_or_else(|| {
        ValidationError::new(
            ValidationErrorKind::RecordNotFound,
            RecordField::Id,
            format!("record {} does not exist in zone {}", id, zone.apex),
        )
    })
}

fn check_record(
    zone: &Zone,
    record: &NormalizedRecord,
    replacing: Option<RecordId>,
) -> Result<(), ValidationError> {
    if record.rtype == RecordType::SOA {
        return Err(ValidationError::new(
            ValidationErrorKind::SoaNotAllowed,
            RecordField::Type,
            "the SOA record can only be changed as a whole",
        ));
    }
    if !zone.is_authoritative_for(&record.name) {
        return Err(ValidationError::name(
            ValidationErrorKind::OutOfZone,
            format!("{} is outside zone {}", record.name, zone.apex),
        ));
    }

    if others(zone, replacing).any(|r| r.same_data(record)) {
        return Err(ValidationError::value(
            ValidationErrorKind::DuplicateRecord,
            format!(
                "{} {} {} already exists",
                record.name, record.rtype, record.content
            ),
        ));
    }

    let mut neighbours = others(zone, replacing).filter(|r| r.name == record.name);
    if record.rtype == RecordType::CNAME {
        if let Some(existing) = neighbours.next() {
            return Err(ValidationError::name(
                ValidationErrorKind::CnameConflict,
                format!(
                    "{} already has a {} record; a CNAME must be the only record at its name",
                    record.name, existing.rtype
                ),
            ));
        }
        let pointer =
            others(zone, replacing).find(|r| alias_target(r) == Some(record.name.as_str()));
        if let Some(pointer) = pointer {
            return Err(ValidationError::name(
                ValidationErrorKind::TargetIsAlias,
                format!(
                    "{} {} points at {}, which cannot become a CNAME",
                    pointer.name, pointer.rtype, record.name
                ),
            ));
        }
    } else if neighbours.any(|r| r.rtype == RecordType::CNAME) {
        return Err(ValidationError::name(
            ValidationErrorKind::CnameConflict,
            format!("{} is a CNAME and cannot hold other records", record.name),
        ));
    }

    if let Some(target) = alias_target(record) {
        if others(zone, replacing).any(|r| r.rtype == RecordType::CNAME && r.name == target) {
            return Err(ValidationError::value(
                ValidationErrorKind::TargetIsAlias,
                format!("{} target {} is a CNAME", record.rtype, target),
            ));
        }
    }

    Ok(())
}

/// Records of the zone other than the one being replaced
fn others(
    zone: &Zone,
    replacing: Option<RecordId>,
) -> impl Iterator<Item = &NormalizedRecord> + '_ {
    zone.records()
        .filter(move |r| Some(r.id) != replacing)
        .map(|r| &r.record)
}

/// Target of records that may not point at an alias (MX, NS and SRV).
/// The target is the last field; a null target `.` never conflicts.
fn alias_target(record: &NormalizedRecord) -> Option<&str> {
    match record.rtype {
        RecordType::CNAME | RecordType::PTR => None,
        rtype if rtype.has_host_target() => record
            .content
            .split_whitespace()
            .last()
            .filter(|target| *target != "."),
        _ => None,
    }
}
