use super::name;
use super::record::{NormalizedRecord, RecordId, RecordType, StoredRecord, ZoneId};
use super::soa::SoaRecord;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// A DNS zone: its apex, SOA and every other record it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    /// Canonical apex name (e.g. "example.com.")
    pub apex: String,
    pub soa: SoaRecord,
    /// Bumped on every committed write; used to detect concurrent writers
    pub revision: u64,
    /// Records other than the SOA, ordered by id
    records: Vec<StoredRecord>,
    next_record_id: u64,
}

/// A validated change ready to be applied to a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StagedChange {
    Insert(NormalizedRecord),
    Replace { id: RecordId, record: NormalizedRecord },
    Remove { id: RecordId },
}

/// The effect a staged change had on a zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedChange {
    Created(StoredRecord),
    Updated(StoredRecord),
    Deleted(StoredRecord),
}

impl Zone {
    /// Create an empty zone; the apex is normalized
    pub fn new(id: ZoneId, apex: &str, soa: SoaRecord) -> Result<Self, ValidationError> {
        Ok(Self {
            id,
            apex: name::normalize_apex(apex)?,
            soa,
            revision: 0,
            records: Vec::new(),
            next_record_id: 1,
        })
    }

    pub fn serial(&self) -> u32 {
        self.soa.serial
    }

    /// Iterate over all records except the SOA
    pub fn records(&self) -> impl Iterator<Item = &StoredRecord> {
        self.records.iter()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, id: RecordId) -> Option<&StoredRecord> {
        self.records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|index| &self.records[index])
    }

    /// Records owned by a canonical name, optionally of a single type
    pub fn records_at<'a>(
        &'a self,
        owner: &'a str,
        rtype: Option<RecordType>,
    ) -> impl Iterator<Item = &'a StoredRecord> + 'a {
        self.records.iter().filter(move |r| {
            r.record.name == owner && rtype.is_none_or(|t| r.record.rtype == t)
        })
    }

    /// Check if this zone is authoritative for a canonical name
    pub fn is_authoritative_for(&self, owner: &str) -> bool {
        name::is_within(owner, &self.apex)
    }

    /// Apply a staged change. Returns `None` if it targets a missing record.
    pub fn apply(&mut self, change: &StagedChange) -> Option<AppliedChange> {
        match change {
            StagedChange::Insert(record) => {
                let stored = StoredRecord {
                    id: RecordId(self.next_record_id),
                    zone_id: self.id,
                    record: record.clone(),
                };
                self.next_record_id += 1;
                // Ids only grow, so pushing keeps the vector sorted
                self.records.push(stored.clone());
                Some(AppliedChange::Created(stored))
            }
            StagedChange::Replace { id, record } => {
                let index = self.records.binary_search_by_key(id, |r| r.id).ok()?;
                let slot = &mut self.records[index];
                slot.record = record.clone();
                Some(AppliedChange::Updated(slot.clone()))
            }
            StagedChange::Remove { id } => {
                let index = self.records.binary_search_by_key(id, |r| r.id).ok()?;
                Some(AppliedChange::Deleted(self.records.remove(index)))
            }
        }
    }

    /// Get zone statistics
    pub fn stats(&self) -> ZoneStats {
        let mut stats = ZoneStats {
            total_records: self.records.len() + 1,
            soa_records: 1,
            ..Default::default()
        };

        for record in &self.records {
            match record.record.rtype {
                RecordType::A => stats.a_records += 1,
                RecordType::AAAA => stats.aaaa_records += 1,
                RecordType::NS => stats.ns_records += 1,
                RecordType::CNAME => stats.cname_records += 1,
                RecordType::MX => stats.mx_records += 1,
                RecordType::TXT => stats.txt_records += 1,
                _ => stats.other_records += 1,
            }
        }

        stats
    }
}

/// Zone statistics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneStats {
    pub total_records: usize,
    pub a_records: usize,
    pub aaaa_records: usize,
    pub ns_records: usize,
    pub cname_records: usize,
    pub mx_records: usize,
    pub txt_records: usize,
    pub soa_records: usize,
    pub other_records: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soa() -> SoaRecord {
        SoaRecord {
            mname: "ns1.example.com.".to_string(),
            rname: "hostmaster.example.com.".to_string(),
            serial: 2024010101,
            refresh: 3600,
            retry: 900,
            expire: 604800,
            minimum: 86400,
            ttl: 3600,
        }
    }

    fn a_record(owner: &str, addr: &str) -> NormalizedRecord {
        NormalizedRecord {
            name: owner.to_string(),
            rtype: RecordType::A,
            content: addr.to_string(),
            ttl: 300,
            priority: None,
        }
    }

    #[test]
    fn test_zone_creation() {
        let zone = Zone::new(ZoneId(1), "Example.COM", soa()).unwrap();
        assert_eq!(zone.apex, "example.com.");
        assert_eq!(zone.serial(), 2024010101);
        assert_eq!(zone.record_count(), 0);
        assert!(Zone::new(ZoneId(1), ".", soa()).is_err());
    }

    #[test]
    fn test_is_authoritative() {
        let zone = Zone::new(ZoneId(1), "example.com", soa()).unwrap();

        assert!(zone.is_authoritative_for("example.com."));
        assert!(zone.is_authoritative_for("www.example.com."));
        assert!(zone.is_authoritative_for("sub.domain.example.com."));
        assert!(!zone.is_authoritative_for("example.org."));
        assert!(!zone.is_authoritative_for("com."));
        assert!(!zone.is_authoritative_for("badexample.com."));
    }

    #[test]
    fn test_apply_changes() {
        let mut zone = Zone::new(ZoneId(3), "example.com", soa()).unwrap();

        let created = zone
            .apply(&StagedChange::Insert(a_record("www.example.com.", "192.0.2.1")))
            .unwrap();
        let AppliedChange::Created(first) = created else {
            panic!("expected a created record");
        };
        assert_eq!(first.id, RecordId(1));
        assert_eq!(first.zone_id, ZoneId(3));

        zone.apply(&StagedChange::Insert(a_record("www.example.com.", "192.0.2.2")))
            .unwrap();
        assert_eq!(zone.records_at("www.example.com.", Some(RecordType::A)).count(), 2);

        let updated = zone
            .apply(&StagedChange::Replace {
                id: first.id,
                record: a_record("web.example.com.", "192.0.2.9"),
            })
            .unwrap();
        assert!(matches!(updated, AppliedChange::Updated(ref r) if r.record.content == "192.0.2.9"));

        zone.apply(&StagedChange::Remove { id: first.id }).unwrap();
        assert!(zone.record(first.id).is_none());
        assert!(zone.apply(&StagedChange::Remove { id: first.id }).is_none());

        // Removed ids are never reused
        let AppliedChange::Created(third) = zone
            .apply(&StagedChange::Insert(a_record("ftp.example.com.", "192.0.2.3")))
            .unwrap()
        else {
            panic!("expected a created record");
        };
        assert_eq!(third.id, RecordId(3));
    }

    #[test]
    fn test_stats() {
        let mut zone = Zone::new(ZoneId(1), "example.com", soa()).unwrap();
        zone.apply(&StagedChange::Insert(a_record("www.example.com.", "192.0.2.1")))
            .unwrap();
        let stats = zone.stats();
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.a_records, 1);
        assert_eq!(stats.soa_records, 1);
    }
}
