use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a zone in the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub u64);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a record, unique within its zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resource record types managed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    AAAA,
    CAA,
    CNAME,
    DS,
    HINFO,
    LOC,
    MX,
    NS,
    PTR,
    SOA,
    SPF,
    SRV,
    TXT,
}

impl RecordType {
    pub const ALL: [RecordType; 14] = [
        RecordType::A,
        RecordType::AAAA,
        RecordType::CAA,
        RecordType::CNAME,
        RecordType::DS,
        RecordType::HINFO,
        RecordType::LOC,
        RecordType::MX,
        RecordType::NS,
        RecordType::PTR,
        RecordType::SOA,
        RecordType::SPF,
        RecordType::SRV,
        RecordType::TXT,
    ];

    /// Content is an IP address literal
    pub fn has_address(self) -> bool {
        matches!(self, RecordType::A | RecordType::AAAA)
    }

    /// Content names another host
    pub fn has_host_target(self) -> bool {
        matches!(
            self,
            RecordType::CNAME | RecordType::MX | RecordType::NS | RecordType::PTR | RecordType::SRV
        )
    }

    /// Record carries a priority alongside its content
    pub fn has_priority(self) -> bool {
        matches!(self, RecordType::MX | RecordType::SRV)
    }

    /// Content is made of character strings
    pub fn has_text(self) -> bool {
        matches!(
            self,
            RecordType::TXT | RecordType::SPF | RecordType::HINFO | RecordType::CAA
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
            RecordType::CAA => "CAA",
            RecordType::CNAME => "CNAME",
            RecordType::DS => "DS",
            RecordType::HINFO => "HINFO",
            RecordType::LOC => "LOC",
            RecordType::MX => "MX",
            RecordType::NS => "NS",
            RecordType::PTR => "PTR",
            RecordType::SOA => "SOA",
            RecordType::SPF => "SPF",
            RecordType::SRV => "SRV",
            RecordType::TXT => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        RecordType::ALL
            .into_iter()
            .find(|rtype| rtype.as_str() == upper)
            .ok_or_else(|| format!("unsupported record type: {}", s.trim()))
    }
}

/// A record as submitted by a caller, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Owner name, relative to the zone apex or absolute with a trailing dot
    pub name: String,
    pub rtype: RecordType,
    /// Record data in presentation format
    pub content: String,
    /// Time to live; `None` selects the configured default
    pub ttl: Option<i64>,
    pub priority: Option<i64>,
}

impl ResourceRecord {
    pub fn new(name: impl Into<String>, rtype: RecordType, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rtype,
            content: content.into(),
            ttl: None,
            priority: None,
        }
    }

    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// A record that passed validation, in canonical form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Lowercase fully-qualified owner name with trailing dot
    pub name: String,
    pub rtype: RecordType,
    pub content: String,
    pub ttl: u32,
    /// Present only for types that carry a priority
    pub priority: Option<u16>,
}

impl NormalizedRecord {
    /// Same owner, type and data; TTL and priority are not part of identity
    pub fn same_data(&self, other: &NormalizedRecord) -> bool {
        self.rtype == other.rtype && self.name == other.name && self.content == other.content
    }
}

impl From<NormalizedRecord> for ResourceRecord {
    fn from(record: NormalizedRecord) -> Self {
        Self {
            name: record.name,
            rtype: record.rtype,
            content: record.content,
            ttl: Some(i64::from(record.ttl)),
            priority: record.priority.map(i64::from),
        }
    }
}

/// A committed record, owned by the zone identified by `zone_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: RecordId,
    pub zone_id: ZoneId,
    #[serde(flatten)]
    pub record: NormalizedRecord,
}

/// A change to a zone's record set requested by a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RecordChange {
    Create(ResourceRecord),
    Update { id: RecordId, record: ResourceRecord },
    Delete { id: RecordId },
    /// Replace the zone's SOA fields; the serial is managed by the engine
    UpdateSoa(ResourceRecord),
}

impl RecordChange {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordChange::Create(_) => "create",
            RecordChange::Update { .. } => "update",
            RecordChange::Delete { .. } => "delete",
            RecordChange::UpdateSoa(_) => "update_soa",
        }
    }
}
