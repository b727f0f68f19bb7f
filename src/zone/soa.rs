use super::record::{NormalizedRecord, RecordType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Start of authority data of a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoaRecord {
    /// Primary nameserver
    pub mname: String,
    /// Responsible mailbox in domain-name form
    pub rname: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
    pub ttl: u32,
}

impl SoaRecord {
    /// Build from a validated SOA record, whose content is always the seven
    /// canonical fields
    pub fn from_normalized(record: &NormalizedRecord) -> Option<Self> {
        if record.rtype != RecordType::SOA {
            return None;
        }
        let fields: Vec<&str> = record.content.split_whitespace().collect();
        let [mname, rname, serial, refresh, retry, expire, minimum] = fields.as_slice() else {
            return None;
        };
        Some(Self {
            mname: mname.to_string(),
            rname: rname.to_string(),
            serial: serial.parse().ok()?,
            refresh: refresh.parse().ok()?,
            retry: retry.parse().ok()?,
            expire: expire.parse().ok()?,
            minimum: minimum.parse().ok()?,
            ttl: record.ttl,
        })
    }

    /// Presentation-format content
    pub fn content(&self) -> String {
        format!(
            "{} {} {} {} {} {} {}",
            self.mname,
            self.rname,
            self.serial,
            self.refresh,
            self.retry,
            self.expire,
            self.minimum
        )
    }

    pub fn with_serial(&self, serial: u32) -> Self {
        Self {
            serial,
            ..self.clone()
        }
    }

    /// The SOA as a normalized record owned by `apex`
    pub fn to_record(&self, apex: &str) -> NormalizedRecord {
        NormalizedRecord {
            name: apex.to_string(),
            rtype: RecordType::SOA,
            content: self.content(),
            ttl: self.ttl,
            priority: None,
        }
    }
}

impl fmt::Display for SoaRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_record() {
        let soa = SoaRecord {
            mname: "ns1.example.com.".to_string(),
            rname: "hostmaster.example.com.".to_string(),
            serial: 2011052600,
            refresh: 28800,
            retry: 7200,
            expire: 604800,
            minimum: 86400,
            ttl: 86400,
        };
        let record = soa.to_record("example.com.");
        assert_eq!(
            record.content,
            "ns1.example.com. hostmaster.example.com. 2011052600 28800 7200 604800 86400"
        );
        assert_eq!(SoaRecord::from_normalized(&record), Some(soa.clone()));
        assert_eq!(soa.with_serial(7).serial, 7);
    }

    #[test]
    fn test_rejects_other_types() {
        let record = NormalizedRecord {
            name: "example.com.".to_string(),
            rtype: RecordType::NS,
            content: "ns1.example.com.".to_string(),
            ttl: 3600,
            priority: None,
        };
        assert!(SoaRecord::from_normalized(&record).is_none());
    }
}
