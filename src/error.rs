use crate::coordinator::MutationStage;
use crate::zone::{RecordId, ZoneId};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid default TTL: {0}")]
    InvalidDefaultTtl(String),

    #[error("Invalid hostmaster: {0}")]
    InvalidHostmaster(String),

    #[error("Invalid retry limit: {0}")]
    InvalidRetryLimit(String),

    #[error("Invalid UTC offset: {0}")]
    InvalidUtcOffset(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// The record field a validation failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    Name,
    Type,
    Value,
    Ttl,
    Priority,
    Id,
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordField::Name => "name",
            RecordField::Type => "type",
            RecordField::Value => "value",
            RecordField::Ttl => "ttl",
            RecordField::Priority => "priority",
            RecordField::Id => "id",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    // Names
    NameTooLong,
    LabelLength,
    TooManyLabels,
    InvalidCharacters,
    InvalidWildcard,
    OutOfZone,
    InvalidServiceName,
    ApexAlias,

    // Values
    UnsupportedType,
    InvalidAddress,
    InvalidHostname,
    MissingField,
    ExtraField,
    InvalidNumber,
    InvalidText,
    SegmentTooLong,
    TextTooLong,
    InvalidMailbox,
    NotAtApex,
    InvalidTtl,
    InvalidPriority,

    // Zone context
    DuplicateRecord,
    CnameConflict,
    TargetIsAlias,
    RecordNotFound,
    SoaNotAllowed,
    DuplicateZone,
}

/// A record failed validation; nothing was normalized or stored.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub field: RecordField,
    pub reason: String,
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, field: RecordField, reason: impl Into<String>) -> Self {
        Self {
            kind,
            field,
            reason: reason.into(),
        }
    }

    pub fn name(kind: ValidationErrorKind, reason: impl Into<String>) -> Self {
        Self::new(kind, RecordField::Name, reason)
    }

    pub fn value(kind: ValidationErrorKind, reason: impl Into<String>) -> Self {
        Self::new(kind, RecordField::Value, reason)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerialError {
    /// The daily revision of a date-encoded serial is already 99
    #[error("daily serial revision exhausted at {serial}")]
    Overflow { serial: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("Zone not found: {0}")]
    ZoneNotFound(ZoneId),

    #[error("Zone {zone_id} was modified concurrently (expected revision {expected}, found {found})")]
    Conflict {
        zone_id: ZoneId,
        expected: u64,
        found: u64,
    },

    #[error("Record {record_id} not found in zone {zone_id}")]
    MissingRecord { zone_id: ZoneId, record_id: RecordId },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PersistenceError {
    /// Whether retrying against a freshly read zone may succeed
    pub fn is_conflict(&self) -> bool {
        matches!(self, PersistenceError::Conflict { .. })
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        PersistenceError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationFailure {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Serial(#[from] SerialError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// A mutation request failed. `stage` is the state the mutation was in when
/// the failure happened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("mutation of zone {zone_id} failed at {stage}: {cause}")]
pub struct MutationError {
    pub zone_id: ZoneId,
    pub stage: MutationStage,
    #[source]
    pub cause: MutationFailure,
}

impl MutationError {
    pub fn new(zone_id: ZoneId, stage: MutationStage, cause: impl Into<MutationFailure>) -> Self {
        Self {
            zone_id,
            stage,
            cause: cause.into(),
        }
    }

    /// The terminal state the mutation ended in
    pub fn terminal_state(&self) -> MutationStage {
        match self.stage {
            MutationStage::SerialComputed => MutationStage::RolledBack,
            _ => MutationStage::Rejected,
        }
    }

    pub fn validation_error(&self) -> Option<&ValidationError> {
        match &self.cause {
            MutationFailure::Validation(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_serial_overflow(&self) -> bool {
        matches!(self.cause, MutationFailure::Serial(SerialError::Overflow { .. }))
    }

    pub fn is_persistence_failure(&self) -> bool {
        matches!(self.cause, MutationFailure::Persistence(_))
    }
}

pub type Result<T> = std::result::Result<T, MutationError>;
